//! Error type for dependency sorting.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

/// Returned when the dependency graph contains at least one cycle.
///
/// The cycle map covers only the cyclic subgraph: every node that sits on a
/// cycle, mapped to the subset of its predecessors that are themselves part
/// of the cyclic set. Nodes blocked downstream of a cycle, and edges arriving
/// from outside the cyclic set, do not appear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<N: Eq + Hash> {
    cycle: HashMap<N, HashSet<N>>,
}

impl<N: Eq + Hash> CycleError<N> {
    pub(crate) fn new(cycle: HashMap<N, HashSet<N>>) -> Self {
        Self { cycle }
    }

    /// The cyclic subgraph: node to its in-cycle predecessors.
    pub fn cycle(&self) -> &HashMap<N, HashSet<N>> {
        &self.cycle
    }

    /// Consumes the error, yielding the cycle map.
    pub fn into_cycle(self) -> HashMap<N, HashSet<N>> {
        self.cycle
    }

    /// Returns true if the node is part of the cyclic set.
    pub fn contains(&self, node: &N) -> bool {
        self.cycle.contains_key(node)
    }

    /// Number of nodes in the cyclic set.
    pub fn len(&self) -> usize {
        self.cycle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycle.is_empty()
    }
}

impl<N: Eq + Hash + fmt::Display> fmt::Display for CycleError<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<String> = self
            .cycle
            .iter()
            .map(|(node, preds)| {
                let mut names: Vec<String> = preds.iter().map(|p| p.to_string()).collect();
                names.sort();
                format!("{} <- [{}]", node, names.join(", "))
            })
            .collect();
        entries.sort();
        write!(
            f,
            "dependency cycle among {} node(s): {}",
            self.cycle.len(),
            entries.join("; ")
        )
    }
}

impl<N: Eq + Hash + fmt::Debug + fmt::Display> std::error::Error for CycleError<N> {}
