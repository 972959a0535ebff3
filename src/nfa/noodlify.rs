use std::collections::BTreeMap;
use std::io::{self, Write};
use std::rc::Rc;

use super::afa::write_afa;
use super::alphabet::Alphabet;
use super::segmentation::{Segmentation, SegmentationError};
use super::{concatenate, intersection, FiniteArc, Nfa, State, Symbol};

/// One coherent choice of ε-arcs, as the sequence of trimmed segment
/// automata it induces. Segments are shared between noodles and must
/// not be mutated.
pub type Noodle = Vec<Rc<Nfa>>;
pub type NoodleSequence = Vec<Noodle>;

/// One end of a catalogue segment: either pinned to a single state or
/// left as the segment's natural initial respectively final set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Anchor {
    Any,
    State(State),
}

#[derive(Debug, thiserror::Error)]
pub enum NoodlifyError {
    #[error(transparent)]
    Layering(#[from] SegmentationError),
    #[error("could not write the AFA document: {0}")]
    Afa(#[from] io::Error),
}

type SegmentCatalogue = BTreeMap<(Anchor, Anchor), Rc<Nfa>>;

/// Decomposes an automaton with designated ε-arcs into noodles.
///
/// Every combination that picks one ε-arc per depth yields a candidate
/// noodle; its segments are looked up in a catalogue of trimmed
/// `(initial, final)`-pinned segment copies. Combinations whose
/// catalogue entry is missing describe an empty segment and are
/// skipped. Besides the noodles, an alternating-automaton rendition of
/// the segmented input is written to `afa_out`; `variable_locations`
/// lists for every variable of the underlying equation the segments it
/// occupies, and `use_bits` selects the symbol encoding.
///
/// `epsilon` must not occur in `alphabet`. With `include_empty`,
/// segments that trim to zero states are kept instead of dropped.
pub fn noodlify<W: Write>(
    aut: &Nfa,
    epsilon: Symbol,
    variable_locations: &[Vec<usize>],
    alphabet: &Alphabet,
    include_empty: bool,
    use_bits: bool,
    afa_out: &mut W,
) -> Result<NoodleSequence, NoodlifyError> {
    let segmentation = Segmentation::new(aut, epsilon)?;

    if segmentation.segments().len() == 1 {
        let mut segment = aut.clone();
        segment.trim();
        if segment.num_states() > 0 || include_empty {
            return Ok(vec![vec![Rc::new(segment)]]);
        }
        return Ok(NoodleSequence::new());
    }

    let catalogue = build_catalogue(segmentation.segments(), include_empty);

    write_afa(
        afa_out,
        aut,
        &segmentation,
        variable_locations,
        alphabet,
        use_bits,
    )?;

    Ok(assemble_noodles(&catalogue, segmentation.epsilon_depths()))
}

/// For every `(initial, final)` pair a segment admits at its position,
/// a trimmed copy of the segment pinned to that pair. The first
/// segment always keeps its full initial set, the last one its full
/// final set. Pairs whose copy trims away entirely get no entry unless
/// `include_empty` is set.
fn build_catalogue(segments: &[Nfa], include_empty: bool) -> SegmentCatalogue {
    let mut catalogue = SegmentCatalogue::new();
    let last = segments.len() - 1;

    for (d, segment) in segments.iter().enumerate() {
        if d == 0 {
            for &f in &segment.finals {
                insert_pinned(
                    &mut catalogue,
                    segment,
                    Anchor::Any,
                    Anchor::State(f),
                    include_empty,
                );
            }
        } else if d == last {
            for &i in &segment.initials {
                insert_pinned(
                    &mut catalogue,
                    segment,
                    Anchor::State(i),
                    Anchor::Any,
                    include_empty,
                );
            }
        } else {
            for &i in &segment.initials {
                for &f in &segment.finals {
                    insert_pinned(
                        &mut catalogue,
                        segment,
                        Anchor::State(i),
                        Anchor::State(f),
                        include_empty,
                    );
                }
            }
        }
    }

    catalogue
}

fn insert_pinned(
    catalogue: &mut SegmentCatalogue,
    segment: &Nfa,
    initial: Anchor,
    fin: Anchor,
    include_empty: bool,
) {
    let mut pinned = segment.clone();
    if let Anchor::State(q) = initial {
        pinned.initials.clear();
        pinned.initials.insert(q);
    }
    if let Anchor::State(q) = fin {
        pinned.finals.clear();
        pinned.finals.insert(q);
    }
    pinned.trim();

    if pinned.num_states() > 0 || include_empty {
        catalogue.insert((initial, fin), Rc::new(pinned));
    }
}

/// Enumerates all combinations of one ε-arc per depth in mixed-radix
/// order, depth 0 least significant, and assembles each into a noodle
/// by catalogue lookups. A missing entry means the combination pins
/// some segment to an empty automaton; it is skipped.
fn assemble_noodles(
    catalogue: &SegmentCatalogue,
    epsilon_depths: &[Vec<FiniteArc>],
) -> NoodleSequence {
    let num_combinations: usize = epsilon_depths.iter().map(|arcs| arcs.len()).product();
    let mut noodles = NoodleSequence::new();

    'combination: for index in 0..num_combinations {
        let mut rest = index;
        let mut chosen: Vec<&FiniteArc> = Vec::with_capacity(epsilon_depths.len());
        for arcs in epsilon_depths {
            chosen.push(&arcs[rest % arcs.len()]);
            rest /= arcs.len();
        }

        let mut noodle = Noodle::with_capacity(epsilon_depths.len() + 1);
        match catalogue.get(&(Anchor::Any, Anchor::State(chosen[0].from))) {
            Some(segment) => noodle.push(Rc::clone(segment)),
            None => continue,
        }
        for pair in chosen.windows(2) {
            match catalogue.get(&(Anchor::State(pair[0].to), Anchor::State(pair[1].from))) {
                Some(segment) => noodle.push(Rc::clone(segment)),
                None => continue 'combination,
            }
        }
        let last = chosen[chosen.len() - 1];
        match catalogue.get(&(Anchor::State(last.to), Anchor::Any)) {
            Some(segment) => noodle.push(Rc::clone(segment)),
            None => continue,
        }

        noodles.push(noodle);
    }

    noodles
}

/// Noodlifies the language equation `L₁·L₂·…·Lₙ = R`.
///
/// Every left automaton gets a unified initial and final state, the
/// left side is concatenated over a fresh ε-symbol and intersected
/// with `right`; the trimmed product is then decomposed by
/// [`noodlify`]. Returns the empty sequence without touching `afa_out`
/// when `left` is empty or the product has an empty language.
///
/// Recognized `params` keys are `"reduce"` with values `"forward"`,
/// `"backward"` or `"bidirectional"`, and `"afa-type"` with values
/// `"bits"` (the default) or `"tracks"`. Unknown keys and values are
/// ignored.
pub fn noodlify_for_equation<W: Write>(
    left: &mut [Nfa],
    right: &Nfa,
    variable_locations: &[Vec<usize>],
    include_empty: bool,
    params: &BTreeMap<String, String>,
    afa_out: &mut W,
) -> Result<NoodleSequence, NoodlifyError> {
    for aut in left.iter_mut() {
        aut.unify_initial();
        aut.unify_final();
    }

    if left.is_empty() || right.is_lang_empty() {
        return Ok(NoodleSequence::new());
    }

    let mut alphabet = Alphabet::from_automata(left.iter());
    alphabet.add_symbols_from(right);
    let epsilon = alphabet.fresh_symbol();

    let concatenated = left[1..]
        .iter()
        .fold(left[0].clone(), |linked, next| {
            concatenate(&linked, next, epsilon)
        });

    let mut product = intersection(&concatenated, right, epsilon);
    product.trim();
    if product.is_lang_empty() {
        return Ok(NoodleSequence::new());
    }

    if let Some(reduction) = params.get("reduce") {
        if reduction == "forward" || reduction == "bidirectional" {
            product = product.reduce();
        }
        if reduction == "backward" || reduction == "bidirectional" {
            product = product.reverse().reduce().reverse();
        }
    }

    let use_bits = params.get("afa-type").map(String::as_str) != Some("tracks");

    noodlify(
        &product,
        epsilon,
        variable_locations,
        &alphabet,
        include_empty,
        use_bits,
        afa_out,
    )
}
