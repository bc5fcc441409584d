//! Generic Dependency Sorter
//!
//! Orders opaque nodes under "must-precede" edges with a caller-supplied
//! tie-break comparator. The sorter knows nothing about steps, phases, or
//! scopes; the [`crate::constraint`] module feeds it and the scheduler caches
//! its output.
//!
//! # Ordering Semantics
//!
//! The sort is a round-based variant of Kahn's algorithm. Each round takes a
//! snapshot of the nodes whose dependencies are fully resolved, orders that
//! snapshot with the comparator, and emits it whole. Nodes freed during a
//! round join the *next* round. The tie-break is therefore applied dynamically
//! to the evolving ready set, not as a static pre-sort over all nodes: a node
//! that compares smallest overall is still emitted late when it only becomes
//! ready after other nodes complete.
//!
//! # Cycle Reporting
//!
//! When the graph is not acyclic the sorter reports exactly the cyclic
//! portion: the nodes that sit on at least one cycle, each mapped to its
//! in-cycle predecessors. Nodes that are merely blocked downstream of a cycle
//! are excluded from the report.

mod error;
mod sorter;

pub use error::CycleError;
pub use sorter::DependencySorter;
