use std::collections::VecDeque;

use crate::util::vec_entry;

use super::{FiniteArc, Nfa, State, Symbol};

/// Failures of the ε-depth analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SegmentationError {
    /// Some state can be reached by two paths with a different number
    /// of ε-arcs on them, so it belongs to no unique segment.
    #[error("state {state} occurs at ε-depth {first} as well as {second}")]
    InconsistentLayering {
        state: State,
        first: usize,
        second: usize,
    },
}

/// The decomposition of an automaton into maximal ε-free layers.
///
/// The ε-depth of a state is the number of ε-arcs on a path from an
/// initial state to it. Segment `d` is the sub-automaton induced by
/// the states of depth `d`; the ε-arcs bridging depth `d` and `d + 1`
/// are collected in `epsilon_depths[d]`.
///
/// Segments keep the state numbering of the segmented automaton. The
/// first segment inherits its initial states, the last one its final
/// states; everywhere else the boundary ε-arcs determine the initial
/// and final sets.
#[derive(Clone, Debug)]
pub struct Segmentation {
    segments: Vec<Nfa>,
    epsilon_depths: Vec<Vec<FiniteArc>>,
}

impl Segmentation {
    pub fn new(aut: &Nfa, epsilon: Symbol) -> Result<Self, SegmentationError> {
        let (depths, epsilon_depths) = Segmentation::explore(aut, epsilon)?;
        let segments = Segmentation::split(aut, epsilon, &depths, &epsilon_depths);
        Ok(Segmentation {
            segments,
            epsilon_depths,
        })
    }

    /// The segments in depth order. There is always at least one.
    pub fn segments(&self) -> &[Nfa] {
        &self.segments
    }

    /// For every boundary, the ε-arcs crossing it in discovery order.
    pub fn epsilon_depths(&self) -> &[Vec<FiniteArc>] {
        &self.epsilon_depths
    }

    /// Breadth-first search from the initial states that assigns every
    /// visited state its ε-depth and records the ε-arcs per depth.
    fn explore(
        aut: &Nfa,
        epsilon: Symbol,
    ) -> Result<(Vec<Option<usize>>, Vec<Vec<FiniteArc>>), SegmentationError> {
        let mut depths: Vec<Option<usize>> = vec![None; aut.num_states()];
        let mut epsilon_depths: Vec<Vec<FiniteArc>> = Vec::new();
        let mut queue: VecDeque<(State, usize)> = VecDeque::new();

        for &q in &aut.initials {
            depths[q] = Some(0);
            queue.push_back((q, 0));
        }

        while let Some((q, depth)) = queue.pop_front() {
            for (&label, targets) in aut.transitions_from(q) {
                let next_depth = if label == epsilon { depth + 1 } else { depth };
                for &t in targets {
                    match depths[t] {
                        None => {
                            depths[t] = Some(next_depth);
                            queue.push_back((t, next_depth));
                        }
                        Some(seen) if seen == next_depth => (),
                        Some(seen) => {
                            return Err(SegmentationError::InconsistentLayering {
                                state: t,
                                first: seen,
                                second: next_depth,
                            });
                        }
                    }
                    if label == epsilon {
                        vec_entry(&mut epsilon_depths, depth).push(FiniteArc {
                            from: q,
                            label,
                            to: t,
                        });
                    }
                }
            }
        }

        Ok((depths, epsilon_depths))
    }

    fn split(
        aut: &Nfa,
        epsilon: Symbol,
        depths: &[Option<usize>],
        epsilon_depths: &[Vec<FiniteArc>],
    ) -> Vec<Nfa> {
        let k = epsilon_depths.len() + 1;
        let mut segments: Vec<Nfa> = (0..k).map(|_| Nfa::with_states(aut.num_states())).collect();

        for (q, depth) in depths.iter().enumerate() {
            if let Some(d) = *depth {
                for (&label, targets) in aut.transitions_from(q) {
                    if label == epsilon {
                        continue;
                    }
                    for &t in targets {
                        segments[d].add_arc(q, label, t);
                    }
                }
            }
        }

        for (d, segment) in segments.iter_mut().enumerate() {
            if d == 0 {
                for &q in &aut.initials {
                    segment.add_initial(q);
                }
            } else {
                for arc in &epsilon_depths[d - 1] {
                    segment.add_initial(arc.to);
                }
            }
            if d == k - 1 {
                for &q in &aut.finals {
                    if depths[q] == Some(d) {
                        segment.add_final(q);
                    }
                }
            } else {
                for arc in &epsilon_depths[d] {
                    segment.add_final(arc.from);
                }
            }
        }

        segments
    }
}

#[cfg(test)]
mod tests {
    use super::super::Nfa;
    use super::*;

    const EPS: usize = 99;

    fn two_segment_automaton() -> Nfa {
        let mut aut = Nfa::new();
        aut.add_arc(0, 1, 1);
        aut.add_arc(1, EPS, 2);
        aut.add_arc(2, 2, 3);
        aut.add_initial(0);
        aut.add_final(3);
        aut
    }

    #[test]
    fn splits_at_the_epsilon_boundary() {
        let aut = two_segment_automaton();
        let segmentation = Segmentation::new(&aut, EPS).unwrap();

        assert_eq!(segmentation.segments().len(), 2);
        assert_eq!(segmentation.epsilon_depths().len(), 1);
        assert_eq!(
            segmentation.epsilon_depths()[0],
            vec![FiniteArc {
                from: 1,
                label: EPS,
                to: 2
            }]
        );

        let first = &segmentation.segments()[0];
        assert_eq!(first.initials.iter().cloned().collect::<Vec<_>>(), vec![0]);
        assert_eq!(first.finals.iter().cloned().collect::<Vec<_>>(), vec![1]);
        assert!(first.accepts(&[1]));
        assert!(!first.list_arcs().any(|arc| arc.label == EPS));

        let second = &segmentation.segments()[1];
        assert_eq!(second.initials.iter().cloned().collect::<Vec<_>>(), vec![2]);
        assert_eq!(second.finals.iter().cloned().collect::<Vec<_>>(), vec![3]);
        assert!(second.accepts(&[2]));
    }

    #[test]
    fn records_fanning_arcs_in_discovery_order() {
        let mut aut = Nfa::new();
        aut.add_arc(0, 1, 1);
        aut.add_arc(1, EPS, 2);
        aut.add_arc(1, EPS, 3);
        aut.add_arc(2, 2, 4);
        aut.add_arc(3, 2, 5);
        aut.add_initial(0);
        aut.add_final(4);
        aut.add_final(5);

        let segmentation = Segmentation::new(&aut, EPS).unwrap();
        assert_eq!(
            segmentation.epsilon_depths()[0]
                .iter()
                .map(|arc| (arc.from, arc.to))
                .collect::<Vec<_>>(),
            vec![(1, 2), (1, 3)]
        );

        let second = &segmentation.segments()[1];
        assert_eq!(
            second.initials.iter().cloned().collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert_eq!(
            second.finals.iter().cloned().collect::<Vec<_>>(),
            vec![4, 5]
        );
    }

    #[test]
    fn four_segments_with_internal_fan_out() {
        let mut aut = Nfa::new();
        aut.add_arc(0, 1, 1);
        aut.add_arc(1, EPS, 2);
        aut.add_arc(1, EPS, 3);
        aut.add_arc(2, 2, 4);
        aut.add_arc(3, 2, 6);
        aut.add_arc(4, EPS, 5);
        aut.add_arc(4, EPS, 7);
        aut.add_arc(6, EPS, 7);
        aut.add_arc(5, 3, 8);
        aut.add_arc(7, 3, 9);
        aut.add_arc(8, EPS, 10);
        aut.add_arc(9, EPS, 11);
        aut.add_arc(10, 4, 12);
        aut.add_arc(11, 4, 13);
        aut.add_initial(0);
        aut.add_final(12);
        aut.add_final(13);

        let segmentation = Segmentation::new(&aut, EPS).unwrap();
        assert_eq!(segmentation.segments().len(), 4);
        assert_eq!(
            segmentation
                .epsilon_depths()
                .iter()
                .map(|arcs| arcs.iter().map(|arc| (arc.from, arc.to)).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            vec![
                vec![(1, 2), (1, 3)],
                vec![(4, 5), (4, 7), (6, 7)],
                vec![(8, 10), (9, 11)],
            ]
        );

        let second = &segmentation.segments()[1];
        assert_eq!(
            second.initials.iter().cloned().collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert_eq!(
            second.finals.iter().cloned().collect::<Vec<_>>(),
            vec![4, 6]
        );

        let third = &segmentation.segments()[2];
        assert_eq!(
            third.initials.iter().cloned().collect::<Vec<_>>(),
            vec![5, 7]
        );
        assert_eq!(
            third.finals.iter().cloned().collect::<Vec<_>>(),
            vec![8, 9]
        );

        let last = &segmentation.segments()[3];
        assert_eq!(
            last.finals.iter().cloned().collect::<Vec<_>>(),
            vec![12, 13]
        );
    }

    #[test]
    fn automaton_without_epsilon_is_one_segment() {
        let mut aut = Nfa::new();
        aut.add_arc(0, 1, 1);
        aut.add_initial(0);
        aut.add_final(1);

        let segmentation = Segmentation::new(&aut, EPS).unwrap();
        assert_eq!(segmentation.segments().len(), 1);
        assert!(segmentation.epsilon_depths().is_empty());
        assert!(segmentation.segments()[0].accepts(&[1]));
    }

    #[test]
    fn empty_automaton_yields_a_single_empty_segment() {
        let segmentation = Segmentation::new(&Nfa::new(), EPS).unwrap();
        assert_eq!(segmentation.segments().len(), 1);
        assert_eq!(segmentation.segments()[0].num_states(), 0);
    }

    #[test]
    fn inconsistent_layering_is_reported() {
        let mut aut = Nfa::new();
        aut.add_arc(0, 1, 1);
        aut.add_arc(0, EPS, 1);
        aut.add_initial(0);
        aut.add_final(1);

        assert_eq!(
            Segmentation::new(&aut, EPS).err(),
            Some(SegmentationError::InconsistentLayering {
                state: 1,
                first: 0,
                second: 1
            })
        );
    }

    #[test]
    fn final_states_outside_the_last_depth_are_dropped() {
        let mut aut = two_segment_automaton();
        aut.add_final(1);

        let segmentation = Segmentation::new(&aut, EPS).unwrap();
        let last = &segmentation.segments()[1];
        assert_eq!(last.finals.iter().cloned().collect::<Vec<_>>(), vec![3]);
    }
}
