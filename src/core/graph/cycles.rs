//! Cycle detection over a wait-for graph
//!
//! Depth-first traversal with three marks per node. Reaching a node that is
//! still in progress means the current path loops back on itself; the
//! cycle is the suffix of the path starting at that node. Finished nodes
//! are never expanded again, so one pass costs O(nodes + edges).

use crate::core::graph::WaitForGraph;
use crate::core::types::ThreadId;
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An ordered cycle of threads, each waiting on the next and the last on the first
///
/// Stored rotated so the smallest thread id comes first; two cycles over the
/// same path compare equal regardless of where traversal entered them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cycle(Vec<ThreadId>);

impl Cycle {
    pub fn new(mut threads: Vec<ThreadId>) -> Self {
        if let Some(pos) = threads
            .iter()
            .enumerate()
            .min_by_key(|(_, id)| **id)
            .map(|(pos, _)| pos)
        {
            threads.rotate_left(pos);
        }
        Cycle(threads)
    }

    pub fn threads(&self) -> &[ThreadId] {
        &self.0
    }

    /// Membership, ignoring order
    pub fn members(&self) -> BTreeSet<ThreadId> {
        self.0.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, thread_id: ThreadId) -> bool {
        self.0.contains(&thread_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Find the distinct cycles reachable from any node of the graph
///
/// Returns an empty vector when there is no cycle. Pure: the same graph
/// always yields the same cycles in the same order.
pub fn find_cycles(graph: &WaitForGraph) -> Vec<Cycle> {
    let mut marks: FxHashMap<ThreadId, Mark> = FxHashMap::default();
    let mut found: BTreeSet<Cycle> = BTreeSet::new();

    for start in graph.nodes() {
        if marks.contains_key(&start) {
            continue;
        }

        // Explicit stack of (node, successors, next successor index)
        let mut stack: Vec<(ThreadId, Vec<ThreadId>, usize)> = Vec::new();
        let mut path: Vec<ThreadId> = Vec::new();

        marks.insert(start, Mark::InProgress);
        stack.push((start, graph.successors(start).collect(), 0));
        path.push(start);

        while let Some((node, successors, next)) = stack.last_mut() {
            if let Some(&succ) = successors.get(*next) {
                *next += 1;
                match marks.get(&succ).copied() {
                    None => {
                        marks.insert(succ, Mark::InProgress);
                        stack.push((succ, graph.successors(succ).collect(), 0));
                        path.push(succ);
                    }
                    Some(Mark::InProgress) => {
                        if let Some(pos) = path.iter().position(|&t| t == succ) {
                            found.insert(Cycle::new(path[pos..].to_vec()));
                        }
                    }
                    Some(Mark::Done) => {}
                }
            } else {
                marks.insert(*node, Mark::Done);
                stack.pop();
                path.pop();
            }
        }
    }

    found.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_thread_cycle() {
        let graph = WaitForGraph::from_edges([(1, 2), (2, 1)]);
        let cycles = find_cycles(&graph);
        assert_eq!(cycles, vec![Cycle::new(vec![1, 2])]);
        assert_eq!(cycles[0].len(), 2);
    }

    #[test]
    fn three_thread_cycle_in_either_rotation() {
        let graph = WaitForGraph::from_edges([(10, 20), (20, 30), (30, 10)]);
        let cycles = find_cycles(&graph);

        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].members(), BTreeSet::from([10, 20, 30]));
        assert_eq!(cycles[0], Cycle::new(vec![20, 30, 10]));
        assert_eq!(cycles[0], Cycle::new(vec![30, 10, 20]));
    }

    #[test]
    fn no_edges_means_no_cycles_every_time() {
        let graph = WaitForGraph::default();
        assert!(find_cycles(&graph).is_empty());
        assert!(find_cycles(&graph).is_empty());

        let chain = WaitForGraph::from_edges([(1, 2), (2, 3), (4, 3)]);
        assert!(find_cycles(&chain).is_empty());
    }

    #[test]
    fn finds_disjoint_cycles() {
        let graph = WaitForGraph::from_edges([(1, 2), (2, 1), (5, 6), (6, 7), (7, 5)]);
        let cycles = find_cycles(&graph);
        assert_eq!(
            cycles,
            vec![Cycle::new(vec![1, 2]), Cycle::new(vec![5, 6, 7])]
        );
    }

    #[test]
    fn tail_into_cycle_is_not_part_of_it() {
        // 1 waits on 2, which is stuck in the 2 <-> 3 cycle
        let graph = WaitForGraph::from_edges([(1, 2), (2, 3), (3, 2)]);
        let cycles = find_cycles(&graph);
        assert_eq!(cycles, vec![Cycle::new(vec![2, 3])]);
        assert!(!cycles[0].contains(1));
    }

    #[test]
    fn self_loop_is_a_cycle_of_one() {
        let graph = WaitForGraph::from_edges([(4, 4)]);
        assert_eq!(find_cycles(&graph), vec![Cycle::new(vec![4])]);
    }

    #[test]
    fn long_ring_does_not_overflow() {
        let n = 10_000;
        let graph = WaitForGraph::from_edges((0..n).map(|i| (i, (i + 1) % n)));
        let cycles = find_cycles(&graph);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), n);
        assert_eq!(cycles[0].threads()[0], 0);
    }

    #[test]
    fn rotation_is_canonical() {
        assert_eq!(Cycle::new(vec![3, 1, 2]).threads(), &[1, 2, 3]);
        assert_eq!(Cycle::new(vec![]).threads(), &[] as &[ThreadId]);
    }
}
