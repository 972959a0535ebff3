use std::collections::BTreeSet;

use super::{Nfa, Symbol};

/// The set of symbols a group of automata is defined over.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alphabet {
    symbols: BTreeSet<Symbol>,
}

impl Alphabet {
    pub fn new() -> Self {
        Alphabet::default()
    }

    /// Collects the symbols of every arc in the given automata.
    pub fn from_automata<'a, I>(automata: I) -> Self
    where
        I: IntoIterator<Item = &'a Nfa>,
    {
        let mut alphabet = Alphabet::new();
        for aut in automata {
            alphabet.add_symbols_from(aut);
        }
        alphabet
    }

    pub fn add_symbols_from(&mut self, aut: &Nfa) {
        for arc in aut.list_arcs() {
            self.symbols.insert(arc.label);
        }
    }

    pub fn insert(&mut self, symbol: Symbol) {
        self.symbols.insert(symbol);
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        self.symbols.contains(&symbol)
    }

    pub fn size(&self) -> usize {
        self.symbols.len()
    }

    /// The symbols in ascending order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// A symbol strictly greater than every symbol in the alphabet.
    pub fn fresh_symbol(&self) -> Symbol {
        self.symbols.iter().next_back().map_or(0, |&max| max + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::super::Nfa;
    use super::*;

    #[test]
    fn collects_symbols_and_hands_out_a_fresh_one() {
        let mut a = Nfa::new();
        a.add_arc(0, 3, 1);
        a.add_arc(1, 1, 0);
        let mut b = Nfa::new();
        b.add_arc(0, 5, 0);

        let alphabet = Alphabet::from_automata(vec![&a, &b]);
        assert_eq!(alphabet.size(), 3);
        assert_eq!(
            alphabet.symbols().cloned().collect::<Vec<_>>(),
            vec![1, 3, 5]
        );
        assert_eq!(alphabet.fresh_symbol(), 6);
        assert!(alphabet.contains(3));
        assert!(!alphabet.contains(6));
    }

    #[test]
    fn fresh_symbol_of_the_empty_alphabet() {
        assert_eq!(Alphabet::new().fresh_symbol(), 0);
    }
}
