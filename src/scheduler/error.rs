//! Scheduler-level error types.

use crate::constraint::ConstraintError;
use crate::sort::CycleError;
use crate::step::QualifiedName;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised while computing a (phase, scope) order.
///
/// All of these are configuration errors: they abort startup and re-raise on
/// every call until the underlying descriptor set changes.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    /// The constraint graph is not acyclic. The map covers exactly the
    /// cyclic subgraph: each offending step and its in-cycle predecessors.
    #[error("dependency cycle among {} step(s): {}", .cycle.len(), format_cycle(.cycle))]
    DependencyCycle {
        cycle: HashMap<QualifiedName, HashSet<QualifiedName>>,
    },
}

impl From<CycleError<QualifiedName>> for SchedulerError {
    fn from(err: CycleError<QualifiedName>) -> Self {
        Self::DependencyCycle {
            cycle: err.into_cycle(),
        }
    }
}

fn format_cycle(cycle: &HashMap<QualifiedName, HashSet<QualifiedName>>) -> String {
    let mut entries: Vec<(&QualifiedName, &HashSet<QualifiedName>)> = cycle.iter().collect();
    entries.sort_by_key(|(name, _)| *name);
    entries
        .iter()
        .map(|(name, preds)| {
            let mut preds: Vec<&QualifiedName> = preds.iter().collect();
            preds.sort();
            let preds: Vec<String> = preds.iter().map(|p| p.to_string()).collect();
            format!("'{}' <- [{}]", name, preds.join(", "))
        })
        .collect::<Vec<_>>()
        .join("; ")
}
