use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::util::IntMap;

use super::alphabet::Alphabet;
use super::segmentation::Segmentation;
use super::{Nfa, State, Symbol};

/// Renumbers symbols densely in first-seen order and renders them as
/// formula fragments, either as a conjunction of bit atoms or as
/// `symbol@track` literals.
pub struct SymbolRemapper {
    assignment: IntMap<usize>,
    needed_bits: usize,
    use_bits: bool,
}

impl SymbolRemapper {
    pub fn new(alphabet_size: usize, use_bits: bool) -> Self {
        let needed_bits = if alphabet_size > 1 {
            (usize::BITS - (alphabet_size - 1).leading_zeros()) as usize
        } else {
            1
        };
        SymbolRemapper {
            assignment: IntMap::default(),
            needed_bits,
            use_bits,
        }
    }

    fn remap(&mut self, symbol: Symbol) -> usize {
        let fresh = self.assignment.len();
        *self.assignment.entry(symbol).or_insert(fresh)
    }

    /// Renders `symbol` on the given track. In bits mode, atom
    /// `a_{track * needed_bits + i}` carries bit `i` of the renumbered
    /// symbol and is negated where that bit is zero.
    pub fn formula(&mut self, symbol: Symbol, track: usize) -> String {
        let remapped = self.remap(symbol);
        if self.use_bits {
            let mut rendered = String::new();
            for i in 0..self.needed_bits {
                if i != 0 {
                    rendered.push_str(" & ");
                }
                if (remapped >> i) & 1 == 0 {
                    rendered.push('!');
                }
                rendered.push_str(&format!("a{}", track * self.needed_bits + i));
            }
            rendered
        } else {
            format!("{}@t{}", remapped, track)
        }
    }
}

/// Writes the alternating-automaton rendition of a segmented automaton
/// to `out`.
///
/// The format opens with `%Initial` and `%Final` formulas over `q<s>`
/// atoms, followed by one transition line per reachable state of every
/// segment a variable occupies, primed self-loops for the initial
/// states of all segments after the first, and a fixed terminator
/// line. Initial states of later segments additionally appear as
/// primed atoms `q<s>'` that record the commitment to one segment
/// boundary per concatenated occurrence.
pub fn write_afa<W: Write>(
    out: &mut W,
    aut: &Nfa,
    segmentation: &Segmentation,
    variable_locations: &[Vec<usize>],
    alphabet: &Alphabet,
    use_bits: bool,
) -> io::Result<()> {
    let segments = segmentation.segments();

    if use_bits {
        writeln!(out, "@AFA-bits")?;
    } else {
        writeln!(out, "@AFA-explicit")?;
        writeln!(out, "%Alphabet-numbers")?;
        writeln!(out, "%Tracks-auto")?;
    }

    write!(out, "%Initial (")?;
    for (i, q) in aut.initials.iter().enumerate() {
        if i != 0 {
            write!(out, " | ")?;
        }
        write!(out, "q{}", q)?;
    }
    write!(out, ")")?;

    // Reachable states per segment, the Cartesian product of the
    // initial sets of all later segments, and for every such initial
    // state the reachable states of the segment before it.
    let mut segment_reachable: Vec<Vec<State>> =
        vec![segments[0].reachable_states().into_iter().collect()];
    let mut initial_noodles: Vec<Vec<State>> = vec![Vec::new()];
    let mut later_initials: Vec<State> = Vec::new();
    let mut previous_live: BTreeMap<State, Vec<State>> = BTreeMap::new();

    for segment in &segments[1..] {
        let unextended = std::mem::replace(&mut initial_noodles, Vec::new());
        for &init in &segment.initials {
            previous_live.insert(init, segment_reachable.last().unwrap().clone());
            later_initials.push(init);
            for noodle in &unextended {
                let mut extended = noodle.clone();
                extended.push(init);
                initial_noodles.push(extended);
            }
        }
        segment_reachable.push(segment.reachable_states().into_iter().collect());
    }

    write!(out, " & (")?;
    for (i, noodle) in initial_noodles.iter().enumerate() {
        if i != 0 {
            write!(out, " | ")?;
        }
        write!(out, "(")?;
        for (j, init) in noodle.iter().enumerate() {
            if j != 0 {
                write!(out, " & ")?;
            }
            write!(out, "q{0} & q{0}'", init)?;
        }
        write!(out, ")")?;
    }
    writeln!(out, ")")?;

    // A committed boundary state must not leave any state of the
    // preceding segment live, except the source of the ε-arc that
    // committed it.
    for depth in segmentation.epsilon_depths() {
        for arc in depth {
            if let Some(live) = previous_live.get_mut(&arc.to) {
                live.retain(|&s| s != arc.from);
            }
        }
    }

    write!(out, "%Final ")?;
    let last_segment = &segments[segments.len() - 1];
    let last_non_final: Vec<State> = segment_reachable
        .last()
        .unwrap()
        .iter()
        .cloned()
        .filter(|q| !last_segment.finals.contains(q))
        .collect();
    if last_non_final.is_empty() {
        write!(out, "true")?;
    } else {
        write!(out, "(")?;
        for (i, q) in last_non_final.iter().enumerate() {
            if i != 0 {
                write!(out, " & ")?;
            }
            write!(out, "!q{}", q)?;
        }
        write!(out, ")")?;
    }
    for (init, live) in &previous_live {
        if live.is_empty() {
            continue;
        }
        write!(out, " & (!q{}' | (", init)?;
        for (i, q) in live.iter().enumerate() {
            if i != 0 {
                write!(out, " & ")?;
            }
            write!(out, "!q{}", q)?;
        }
        write!(out, "))")?;
    }
    writeln!(out)?;

    let mut remapper = SymbolRemapper::new(alphabet.size(), use_bits);
    for (track, locations) in variable_locations.iter().enumerate() {
        for &location in locations {
            let segment = &segments[location];
            for &q in &segment_reachable[location] {
                if segment.transitions_from(q).next().is_none() {
                    continue;
                }
                write!(out, "q{} ", q)?;
                for (i, (&label, targets)) in segment.transitions_from(q).enumerate() {
                    if i != 0 {
                        write!(out, " | ")?;
                    }
                    write!(out, "({} & (", remapper.formula(label, track))?;
                    for (j, target) in targets.iter().enumerate() {
                        if j != 0 {
                            write!(out, " | ")?;
                        }
                        write!(out, "q{}", target)?;
                    }
                    write!(out, "))")?;
                }
                writeln!(out)?;
            }
        }
    }

    for init in &later_initials {
        writeln!(out, "q{0}' q{0}'", init)?;
    }

    writeln!(out, "#AFA was fully printed")?;
    Ok(())
}
