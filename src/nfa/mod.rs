use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use bit_set::BitSet;
use integeriser::{HashIntegeriser, Integeriser};

use crate::util::{IntMap, IntSet};

pub mod alphabet;
pub mod noodlify;
pub mod segmentation;

mod afa;

pub use self::alphabet::Alphabet;
pub use self::noodlify::{
    noodlify, noodlify_for_equation, Anchor, Noodle, NoodleSequence, NoodlifyError,
};
pub use self::segmentation::{Segmentation, SegmentationError};

/// A state of an `Nfa`. States are consecutive indices starting at `0`.
pub type State = usize;
/// A terminal symbol of an `Nfa`.
pub type Symbol = usize;

/// A single labelled arc between two states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FiniteArc {
    pub from: State,
    pub label: Symbol,
    pub to: State,
}

/// A nondeterministic finite automaton over integerised symbols.
///
/// The transition relation is stored per source state as a map from
/// symbols to target sets. All three fields use ordered containers, so
/// every iteration over the automaton is reproducible.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nfa {
    pub arcs: Vec<BTreeMap<Symbol, BTreeSet<State>>>,
    pub initials: BTreeSet<State>,
    pub finals: BTreeSet<State>,
}

impl Nfa {
    pub fn new() -> Self {
        Nfa::default()
    }

    /// Creates an automaton with `n` states and no arcs.
    pub fn with_states(n: usize) -> Self {
        Nfa {
            arcs: vec![BTreeMap::new(); n],
            initials: BTreeSet::new(),
            finals: BTreeSet::new(),
        }
    }

    pub fn num_states(&self) -> usize {
        self.arcs.len()
    }

    fn ensure_state(&mut self, q: State) {
        if q >= self.arcs.len() {
            self.arcs.resize(q + 1, BTreeMap::new());
        }
    }

    pub fn add_arc(&mut self, from: State, label: Symbol, to: State) {
        self.ensure_state(from.max(to));
        self.arcs[from]
            .entry(label)
            .or_insert_with(BTreeSet::new)
            .insert(to);
    }

    pub fn add_initial(&mut self, q: State) {
        self.ensure_state(q);
        self.initials.insert(q);
    }

    pub fn add_final(&mut self, q: State) {
        self.ensure_state(q);
        self.finals.insert(q);
    }

    /// The outgoing transitions of `from`, grouped by symbol and
    /// ordered ascendingly.
    pub fn transitions_from(
        &self,
        from: State,
    ) -> impl Iterator<Item = (&Symbol, &BTreeSet<State>)> {
        self.arcs.get(from).into_iter().flatten()
    }

    /// Lists every arc of the automaton in `(from, label, to)` order.
    pub fn list_arcs<'a>(&'a self) -> Box<dyn Iterator<Item = FiniteArc> + 'a> {
        Box::new(self.arcs.iter().enumerate().flat_map(|(from, moves)| {
            moves.iter().flat_map(move |(&label, targets)| {
                targets.iter().map(move |&to| FiniteArc { from, label, to })
            })
        }))
    }

    /// All states that are reachable from an initial state.
    pub fn reachable_states(&self) -> BTreeSet<State> {
        let mut visited = BitSet::with_capacity(self.num_states());
        let mut queue: VecDeque<State> = VecDeque::new();

        for &q in &self.initials {
            if visited.insert(q) {
                queue.push_back(q);
            }
        }
        while let Some(q) = queue.pop_front() {
            for (_, targets) in self.transitions_from(q) {
                for &t in targets {
                    if visited.insert(t) {
                        queue.push_back(t);
                    }
                }
            }
        }

        visited.iter().collect()
    }

    /// Removes every state that is not both reachable from an initial
    /// state and co-reachable from a final state. The remaining states
    /// are renumbered densely in ascending order.
    pub fn trim(&mut self) {
        let forward = self.reachable_states();
        let backward = self.reverse().reachable_states();
        let useful: Vec<State> = forward.intersection(&backward).cloned().collect();

        let mut renumber: IntMap<State> = IntMap::default();
        for (new, &old) in useful.iter().enumerate() {
            renumber.insert(old, new);
        }

        let mut arcs: Vec<BTreeMap<Symbol, BTreeSet<State>>> = vec![BTreeMap::new(); useful.len()];
        for (new, &old) in useful.iter().enumerate() {
            for (&label, targets) in &self.arcs[old] {
                let kept: BTreeSet<State> = targets
                    .iter()
                    .filter_map(|t| renumber.get(t).cloned())
                    .collect();
                if !kept.is_empty() {
                    arcs[new].insert(label, kept);
                }
            }
        }

        self.arcs = arcs;
        self.initials = self
            .initials
            .iter()
            .filter_map(|q| renumber.get(q).cloned())
            .collect();
        self.finals = self
            .finals
            .iter()
            .filter_map(|q| renumber.get(q).cloned())
            .collect();
    }

    pub fn is_lang_empty(&self) -> bool {
        self.reachable_states().is_disjoint(&self.finals)
    }

    /// Decides membership of `word` by subset simulation. Every symbol
    /// is taken literally; there is no ε-interpretation.
    pub fn accepts(&self, word: &[Symbol]) -> bool {
        let mut current: IntSet = self.initials.iter().cloned().collect();
        for label in word {
            let mut next = IntSet::default();
            for &q in &current {
                if let Some(targets) = self.arcs.get(q).and_then(|moves| moves.get(label)) {
                    next.extend(targets.iter().cloned());
                }
            }
            if next.is_empty() {
                return false;
            }
            current = next;
        }
        current.iter().any(|q| self.finals.contains(q))
    }

    /// The reversal of the automaton: arcs are flipped, initial and
    /// final states swap roles. State numbering is preserved, so
    /// reversing twice reproduces the automaton arc for arc.
    pub fn reverse(&self) -> Nfa {
        let mut reversed = Nfa::with_states(self.num_states());
        for arc in self.list_arcs() {
            reversed.add_arc(arc.to, arc.label, arc.from);
        }
        reversed.initials = self.finals.clone();
        reversed.finals = self.initials.clone();
        reversed
    }

    /// Merges forward-bisimilar states. The partition starts with the
    /// split into final and non-final states and is refined on
    /// `(block, labelled successor blocks)` signatures until it is
    /// stable. Blocks are numbered by their least member, so the result
    /// is reproducible.
    pub fn reduce(&self) -> Nfa {
        let n = self.num_states();
        if n == 0 {
            return self.clone();
        }

        let mut blocks: Vec<usize> = Vec::with_capacity(n);
        let mut count = {
            let mut ids: HashMap<bool, usize> = HashMap::new();
            for q in 0..n {
                let fresh = ids.len();
                blocks.push(*ids.entry(self.finals.contains(&q)).or_insert(fresh));
            }
            ids.len()
        };

        loop {
            let mut ids: HashMap<(usize, Vec<(Symbol, BTreeSet<usize>)>), usize> = HashMap::new();
            let mut refined: Vec<usize> = Vec::with_capacity(n);
            for q in 0..n {
                let signature: Vec<(Symbol, BTreeSet<usize>)> = self.arcs[q]
                    .iter()
                    .map(|(&label, targets)| {
                        (label, targets.iter().map(|&t| blocks[t]).collect())
                    })
                    .collect();
                let fresh = ids.len();
                refined.push(*ids.entry((blocks[q], signature)).or_insert(fresh));
            }
            if ids.len() == count {
                break;
            }
            count = ids.len();
            blocks = refined;
        }

        let mut quotient = Nfa::with_states(count);
        for q in 0..n {
            for (&label, targets) in &self.arcs[q] {
                for &t in targets {
                    quotient.add_arc(blocks[q], label, blocks[t]);
                }
            }
        }
        for &q in &self.initials {
            quotient.add_initial(blocks[q]);
        }
        for &q in &self.finals {
            quotient.add_final(blocks[q]);
        }
        quotient
    }

    /// Replaces multiple initial states by a single fresh one that
    /// copies their outgoing arcs. A single (or absent) initial state
    /// is left untouched.
    pub fn unify_initial(&mut self) {
        if self.initials.len() <= 1 {
            return;
        }
        let fresh = self.num_states();
        self.ensure_state(fresh);

        let olds: Vec<State> = self.initials.iter().cloned().collect();
        let mut is_final = false;
        for &q in &olds {
            if self.finals.contains(&q) {
                is_final = true;
            }
            let moves = self.arcs[q].clone();
            for (label, targets) in moves {
                for t in targets {
                    self.add_arc(fresh, label, t);
                }
            }
        }

        self.initials.clear();
        self.initials.insert(fresh);
        if is_final {
            self.finals.insert(fresh);
        }
    }

    /// Replaces multiple final states by a single fresh one that copies
    /// their incoming arcs. A single (or absent) final state is left
    /// untouched.
    pub fn unify_final(&mut self) {
        if self.finals.len() <= 1 {
            return;
        }
        let fresh = self.num_states();
        self.ensure_state(fresh);

        let is_initial = self.finals.iter().any(|q| self.initials.contains(q));
        let incoming: Vec<FiniteArc> = self
            .list_arcs()
            .filter(|arc| self.finals.contains(&arc.to))
            .collect();
        for arc in incoming {
            self.add_arc(arc.from, arc.label, fresh);
        }

        self.finals.clear();
        self.finals.insert(fresh);
        if is_initial {
            self.initials.insert(fresh);
        }
    }
}

/// Concatenates two automata by linking every final state of `a` to
/// every initial state of `b` with an `epsilon`-labelled arc. The
/// states of `b` are shifted behind those of `a`.
pub fn concatenate(a: &Nfa, b: &Nfa, epsilon: Symbol) -> Nfa {
    let offset = a.num_states();
    let mut result = Nfa::with_states(offset + b.num_states());

    for arc in a.list_arcs() {
        result.add_arc(arc.from, arc.label, arc.to);
    }
    for arc in b.list_arcs() {
        result.add_arc(arc.from + offset, arc.label, arc.to + offset);
    }
    for &f in &a.finals {
        for &i in &b.initials {
            result.add_arc(f, epsilon, i + offset);
        }
    }

    result.initials = a.initials.clone();
    result.finals = b.finals.iter().map(|&f| f + offset).collect();
    result
}

/// The synchronized product of `a` and `b` that keeps `epsilon`-arcs.
///
/// Both automata step together on shared symbols, while an
/// `epsilon`-arc advances its own side alone. Only state pairs reachable
/// from `I_a × I_b` are constructed; they are numbered in discovery
/// order.
pub fn intersection(a: &Nfa, b: &Nfa, epsilon: Symbol) -> Nfa {
    let mut pairs: HashIntegeriser<(State, State)> = HashIntegeriser::new();
    let mut agenda: Vec<(State, State)> = Vec::new();
    let mut product = Nfa::new();

    for &p in &a.initials {
        for &q in &b.initials {
            product.add_initial(pairs.integerise((p, q)));
            agenda.push((p, q));
        }
    }

    while let Some((p, q)) = agenda.pop() {
        let from = pairs.find_key(&(p, q)).unwrap();

        for (&label, targets) in a.transitions_from(p) {
            if label == epsilon {
                for &t in targets {
                    let to = discover(&mut pairs, &mut agenda, (t, q));
                    product.add_arc(from, epsilon, to);
                }
            } else if let Some(partners) = b.arcs.get(q).and_then(|moves| moves.get(&label)) {
                for &t in targets {
                    for &u in partners {
                        let to = discover(&mut pairs, &mut agenda, (t, u));
                        product.add_arc(from, label, to);
                    }
                }
            }
        }
        if let Some(partners) = b.arcs.get(q).and_then(|moves| moves.get(&epsilon)) {
            for &u in partners {
                let to = discover(&mut pairs, &mut agenda, (p, u));
                product.add_arc(from, epsilon, to);
            }
        }
    }

    for id in 0..pairs.size() {
        let &(p, q) = pairs.find_value(id).unwrap();
        if a.finals.contains(&p) && b.finals.contains(&q) {
            product.add_final(id);
        }
    }
    product
}

fn discover(
    pairs: &mut HashIntegeriser<(State, State)>,
    agenda: &mut Vec<(State, State)>,
    pair: (State, State),
) -> usize {
    match pairs.find_key(&pair) {
        Some(id) => id,
        None => {
            agenda.push(pair);
            pairs.integerise(pair)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(labels: &[Symbol]) -> Nfa {
        let mut aut = Nfa::new();
        for (i, &label) in labels.iter().enumerate() {
            aut.add_arc(i, label, i + 1);
        }
        aut.add_initial(0);
        aut.add_final(labels.len());
        aut
    }

    #[test]
    fn accepts_and_emptiness() {
        let aut = chain(&[1, 2]);
        assert!(aut.accepts(&[1, 2]));
        assert!(!aut.accepts(&[1]));
        assert!(!aut.accepts(&[2, 1]));
        assert!(!aut.is_lang_empty());

        let mut no_finals = chain(&[1]);
        no_finals.finals.clear();
        assert!(no_finals.is_lang_empty());
    }

    #[test]
    fn trim_removes_useless_states() {
        let mut aut = chain(&[1, 2]);
        aut.add_arc(0, 7, 3);
        aut.add_arc(4, 7, 2);
        assert_eq!(aut.num_states(), 5);

        aut.trim();
        assert_eq!(aut.num_states(), 3);
        assert!(aut.accepts(&[1, 2]));
        assert!(!aut.accepts(&[7]));
    }

    #[test]
    fn trim_of_empty_language_has_no_states() {
        let mut aut = chain(&[1]);
        aut.finals.clear();
        aut.trim();
        assert_eq!(aut.num_states(), 0);
        assert!(aut.initials.is_empty());
    }

    #[test]
    fn reverse_is_an_involution() {
        let mut aut = chain(&[1, 2, 3]);
        aut.add_arc(1, 4, 1);
        assert!(aut.reverse().accepts(&[3, 2, 1]));
        assert_eq!(aut.reverse().reverse(), aut);
    }

    #[test]
    fn reduce_merges_parallel_branches() {
        let mut aut = Nfa::new();
        aut.add_arc(0, 1, 1);
        aut.add_arc(0, 1, 2);
        aut.add_arc(1, 2, 3);
        aut.add_arc(2, 2, 4);
        aut.add_initial(0);
        aut.add_final(3);
        aut.add_final(4);

        let reduced = aut.reduce();
        assert_eq!(reduced.num_states(), 3);
        assert!(reduced.accepts(&[1, 2]));
        assert!(!reduced.accepts(&[1]));
    }

    #[test]
    fn reduce_keeps_distinct_behaviour_apart() {
        let aut = chain(&[1, 2]);
        let reduced = aut.reduce();
        assert_eq!(reduced.num_states(), aut.num_states());
        assert!(reduced.accepts(&[1, 2]));
    }

    #[test]
    fn unify_initial_collapses_to_one_state() {
        let mut aut = Nfa::new();
        aut.add_arc(0, 1, 2);
        aut.add_arc(1, 2, 2);
        aut.add_initial(0);
        aut.add_initial(1);
        aut.add_final(2);

        aut.unify_initial();
        assert_eq!(aut.initials.len(), 1);
        assert!(aut.accepts(&[1]));
        assert!(aut.accepts(&[2]));
    }

    #[test]
    fn unify_final_collapses_to_one_state() {
        let mut aut = Nfa::new();
        aut.add_arc(0, 1, 1);
        aut.add_arc(0, 2, 2);
        aut.add_initial(0);
        aut.add_final(1);
        aut.add_final(2);

        aut.unify_final();
        assert_eq!(aut.finals.len(), 1);
        assert!(aut.accepts(&[1]));
        assert!(aut.accepts(&[2]));
        assert!(!aut.accepts(&[1, 2]));
    }

    #[test]
    fn concatenate_links_over_epsilon() {
        let left = chain(&[1]);
        let right = chain(&[2]);
        let linked = concatenate(&left, &right, 99);

        assert_eq!(linked.num_states(), 4);
        assert!(linked.accepts(&[1, 99, 2]));
        assert!(!linked.accepts(&[1, 2]));
    }

    #[test]
    fn intersection_synchronizes_on_shared_symbols() {
        let mut a = Nfa::new();
        a.add_arc(0, 1, 1);
        a.add_arc(0, 2, 1);
        a.add_initial(0);
        a.add_final(1);
        let b = chain(&[1]);

        let product = intersection(&a, &b, 99);
        assert!(product.accepts(&[1]));
        assert!(!product.accepts(&[2]));
    }

    #[test]
    fn intersection_keeps_epsilon_arcs() {
        let left = concatenate(&chain(&[1]), &chain(&[2]), 99);
        let right = chain(&[1, 2]);

        let product = intersection(&left, &right, 99);
        assert!(product.accepts(&[1, 99, 2]));
        assert!(product
            .list_arcs()
            .any(|arc| arc.label == 99));
    }
}
