use crate::core::graph::Cycle;
use crate::core::types::ThreadId;
use std::collections::BTreeSet;

/// Result of feeding one scan's cycles into the [`Confirmer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No cycle this scan
    Clear,
    /// Cycles seen for the first time; they need one more scan
    Candidate(Vec<Cycle>),
    /// Cycles whose membership matched a candidate of the previous scan
    Confirmed(Vec<Cycle>),
}

/// Two-scan confirmation of candidate cycles
///
/// A cycle is confirmed only when the previous scan produced a candidate
/// with exactly the same set of threads. Cycles from a confirming scan
/// that match nothing replace the candidates.
#[derive(Debug, Default)]
pub struct Confirmer {
    candidates: Vec<BTreeSet<ThreadId>>,
}

impl Confirmer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a candidate is waiting for its confirming scan
    pub fn is_confirming(&self) -> bool {
        !self.candidates.is_empty()
    }

    pub fn reset(&mut self) {
        self.candidates.clear();
    }

    pub fn observe(&mut self, cycles: Vec<Cycle>) -> Verdict {
        if cycles.is_empty() {
            self.candidates.clear();
            return Verdict::Clear;
        }

        let (confirmed, fresh): (Vec<Cycle>, Vec<Cycle>) = cycles
            .into_iter()
            .partition(|cycle| self.candidates.contains(&cycle.members()));

        if confirmed.is_empty() {
            self.candidates = fresh.iter().map(Cycle::members).collect();
            Verdict::Candidate(fresh)
        } else {
            self.candidates.clear();
            Verdict::Confirmed(confirmed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cycle(ids: &[ThreadId]) -> Cycle {
        Cycle::new(ids.to_vec())
    }

    #[test]
    fn same_cycle_twice_is_confirmed() {
        let mut confirmer = Confirmer::new();
        assert_eq!(
            confirmer.observe(vec![cycle(&[1, 2])]),
            Verdict::Candidate(vec![cycle(&[1, 2])])
        );
        assert!(confirmer.is_confirming());
        assert_eq!(
            confirmer.observe(vec![cycle(&[2, 1])]),
            Verdict::Confirmed(vec![cycle(&[1, 2])])
        );
        assert!(!confirmer.is_confirming());
    }

    #[test]
    fn vanished_cycle_returns_to_clear() {
        let mut confirmer = Confirmer::new();
        confirmer.observe(vec![cycle(&[1, 2])]);
        assert_eq!(confirmer.observe(Vec::new()), Verdict::Clear);
        assert_eq!(
            confirmer.observe(vec![cycle(&[1, 2])]),
            Verdict::Candidate(vec![cycle(&[1, 2])])
        );
    }

    #[test]
    fn different_membership_becomes_new_candidate() {
        let mut confirmer = Confirmer::new();
        confirmer.observe(vec![cycle(&[1, 2])]);
        assert_eq!(
            confirmer.observe(vec![cycle(&[1, 3])]),
            Verdict::Candidate(vec![cycle(&[1, 3])])
        );
        assert_eq!(
            confirmer.observe(vec![cycle(&[1, 3])]),
            Verdict::Confirmed(vec![cycle(&[1, 3])])
        );
    }

    #[test]
    fn only_matching_cycles_are_confirmed() {
        let mut confirmer = Confirmer::new();
        confirmer.observe(vec![cycle(&[1, 2])]);
        assert_eq!(
            confirmer.observe(vec![cycle(&[1, 2]), cycle(&[5, 6, 7])]),
            Verdict::Confirmed(vec![cycle(&[1, 2])])
        );
    }

    fn cycle_set() -> impl Strategy<Value = Vec<Cycle>> {
        prop::collection::vec(
            prop::collection::btree_set(1..6usize, 1..4)
                .prop_map(|ids| Cycle::new(ids.into_iter().collect())),
            0..3,
        )
    }

    proptest! {
        #[test]
        fn confirmation_requires_identical_membership_on_consecutive_scans(
            scans in prop::collection::vec(cycle_set(), 1..12)
        ) {
            let mut confirmer = Confirmer::new();
            let mut previous: Vec<Cycle> = Vec::new();

            for scan in scans {
                let verdict = confirmer.observe(scan.clone());
                if let Verdict::Confirmed(confirmed) = &verdict {
                    prop_assert!(!confirmed.is_empty());
                    for cycle in confirmed {
                        prop_assert!(scan.iter().any(|c| c.members() == cycle.members()));
                        prop_assert!(previous.iter().any(|c| c.members() == cycle.members()));
                    }
                }
                // After a confirmation the next scan starts from scratch
                previous = match verdict {
                    Verdict::Confirmed(_) | Verdict::Clear => Vec::new(),
                    Verdict::Candidate(_) => scan,
                };
            }
        }
    }
}
