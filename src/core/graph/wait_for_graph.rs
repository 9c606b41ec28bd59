//! Wait-For Graph built from a registry snapshot
//!
//! Nodes are the threads that are blocked at snapshot time. An edge
//! `A -> B` means A waits for a lock that B currently owns. The graph is
//! rebuilt from scratch on every monitor tick and never mutated afterwards.

use crate::core::registry::RegistrySnapshot;
use crate::core::types::{LockId, ThreadId};
use fxhash::FxHashMap;
use std::collections::BTreeSet;

/// Directed graph of thread wait relationships
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitForGraph {
    /// Blocked threads, ordered so traversal is deterministic
    pub(crate) nodes: BTreeSet<ThreadId>,
    /// Outgoing edges: waiter -> owners it waits for
    pub(crate) edges: FxHashMap<ThreadId, BTreeSet<ThreadId>>,
    /// The lock behind each waiter's outgoing edge
    pub(crate) waits_on: FxHashMap<ThreadId, LockId>,
}

impl WaitForGraph {
    /// Derive the graph from a snapshot
    ///
    /// A blocked thread whose lock has no owner in the snapshot (a release
    /// raced the snapshot) is still a node but gets no edge this tick.
    pub fn from_snapshot(snapshot: &RegistrySnapshot) -> Self {
        let mut graph = WaitForGraph::default();

        for (waiter, lock_id) in snapshot.blocked_threads() {
            graph.nodes.insert(waiter);
            graph.waits_on.insert(waiter, lock_id);

            if let Some(owner) = snapshot.owner_of(lock_id)
                && owner != waiter
            {
                graph.edges.entry(waiter).or_default().insert(owner);
            }
        }

        graph
    }

    /// Build a graph directly from `(waiter, owner)` pairs
    pub fn from_edges(edges: impl IntoIterator<Item = (ThreadId, ThreadId)>) -> Self {
        let mut graph = WaitForGraph::default();
        for (from, to) in edges {
            graph.nodes.insert(from);
            graph.edges.entry(from).or_default().insert(to);
        }
        graph
    }

    pub fn nodes(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.nodes.iter().copied()
    }

    /// Threads `thread_id` is waiting for, in ascending id order
    pub fn successors(&self, thread_id: ThreadId) -> impl Iterator<Item = ThreadId> + '_ {
        self.edges
            .get(&thread_id)
            .into_iter()
            .flat_map(|targets| targets.iter().copied())
    }

    pub fn has_edge(&self, from: ThreadId, to: ThreadId) -> bool {
        self.edges.get(&from).is_some_and(|targets| targets.contains(&to))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Lock a blocked thread is waiting for
    pub fn awaited_lock(&self, thread_id: ThreadId) -> Option<LockId> {
        self.waits_on.get(&thread_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::{LockSnapshot, ThreadSnapshot};
    use crate::core::types::ThreadState;
    use std::sync::Arc;

    fn snapshot_of(
        locks: &[(LockId, Option<ThreadId>)],
        threads: &[(ThreadId, ThreadState)],
    ) -> RegistrySnapshot {
        let mut snapshot = RegistrySnapshot::default();
        for &(id, owner) in locks {
            snapshot.locks.insert(
                id,
                LockSnapshot {
                    id,
                    name: Arc::from(format!("L{id}")),
                    owner,
                    waiters: Vec::new(),
                },
            );
        }
        for &(id, state) in threads {
            if let Some(lock) = state.awaited_lock() {
                snapshot.locks.get_mut(&lock).unwrap().waiters.push(id);
            }
            snapshot.threads.insert(
                id,
                ThreadSnapshot {
                    id,
                    name: Arc::from(format!("T{id}")),
                    state,
                    trace: None,
                },
            );
        }
        snapshot
    }

    #[test]
    fn crossed_waits_produce_both_edges() {
        // T1 holds L1 and waits on L2; T2 holds L2 and waits on L1
        let snapshot = snapshot_of(
            &[(1, Some(1)), (2, Some(2))],
            &[(1, ThreadState::BlockedOn(2)), (2, ThreadState::BlockedOn(1))],
        );
        let graph = WaitForGraph::from_snapshot(&snapshot);

        assert!(graph.has_edge(1, 2));
        assert!(graph.has_edge(2, 1));
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.awaited_lock(1), Some(2));
        assert_eq!(graph.awaited_lock(2), Some(1));
    }

    #[test]
    fn running_threads_are_not_nodes() {
        let snapshot = snapshot_of(
            &[(1, Some(1))],
            &[(1, ThreadState::Running), (2, ThreadState::BlockedOn(1))],
        );
        let graph = WaitForGraph::from_snapshot(&snapshot);

        assert_eq!(graph.nodes().collect::<Vec<_>>(), vec![2]);
        assert!(graph.has_edge(2, 1));
        assert_eq!(graph.successors(1).count(), 0);
    }

    #[test]
    fn unowned_awaited_lock_yields_no_edge() {
        let snapshot = snapshot_of(&[(1, None)], &[(2, ThreadState::BlockedOn(1))]);
        let graph = WaitForGraph::from_snapshot(&snapshot);

        assert_eq!(graph.nodes().collect::<Vec<_>>(), vec![2]);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn empty_snapshot_gives_empty_graph() {
        let graph = WaitForGraph::from_snapshot(&RegistrySnapshot::default());
        assert!(graph.is_empty());
        assert_eq!(graph, WaitForGraph::default());
    }
}
