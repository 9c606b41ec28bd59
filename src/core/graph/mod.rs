//! Graph module for deadlock detection
//!
//! - Wait-for graph: which blocked threads wait for which owners, built
//!   fresh from a registry snapshot
//! - Cycles: depth-first cycle search over that graph

pub mod cycles;
pub mod wait_for_graph;

pub use cycles::{Cycle, find_cycles};
pub use wait_for_graph::WaitForGraph;
