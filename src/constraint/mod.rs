//! Constraint Builder
//!
//! Translates the metadata of one (phase, scope) descriptor set into
//! "must-precede" edges for the [`DependencySorter`]:
//!
//! - `before` targets become `step -> target` edges,
//! - `after` targets become `target -> step` edges,
//! - a declared input is matched against declared outputs in the same set;
//!   a unique producer yields an implicit `producer -> consumer` edge.
//!
//! An input with no producer in the set is assumed externally satisfied. An
//! input with several producers is ambiguous and fails fast rather than
//! picking one arbitrarily. Before/after references to names absent from the
//! set are skipped — a module may legitimately be deployed without its
//! neighbor.

use crate::sort::DependencySorter;
use crate::step::{ContextKey, QualifiedName, StepDescriptor};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while resolving constraints into edges.
#[derive(Debug, Error)]
pub enum ConstraintError {
    /// More than one step in the set produces a type another step consumes.
    #[error(
        "ambiguous producers for input {input} of step '{consumer}': {}",
        format_names(.providers)
    )]
    AmbiguousProvider {
        consumer: QualifiedName,
        input: &'static str,
        providers: Vec<QualifiedName>,
    },
}

fn format_names(names: &[QualifiedName]) -> String {
    names
        .iter()
        .map(|n| format!("'{}'", n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds a loaded sorter from the descriptors of one (phase, scope).
pub fn build_graph(
    descriptors: &[Arc<StepDescriptor>],
) -> Result<DependencySorter<QualifiedName>, ConstraintError> {
    let known: HashSet<&QualifiedName> = descriptors.iter().map(|d| d.name()).collect();

    let mut producers: HashMap<ContextKey, Vec<QualifiedName>> = HashMap::new();
    for descriptor in descriptors {
        for key in descriptor.outputs() {
            producers
                .entry(*key)
                .or_default()
                .push(descriptor.name().clone());
        }
    }

    let mut sorter = DependencySorter::new();
    for descriptor in descriptors {
        sorter.add(descriptor.name().clone());

        for target in descriptor.before() {
            if known.contains(target) {
                sorter.add_dependency(descriptor.name().clone(), target.clone());
            } else {
                tracing::debug!(
                    step = %descriptor.name(),
                    target = %target,
                    "before target not in set; constraint skipped"
                );
            }
        }

        for target in descriptor.after() {
            if known.contains(target) {
                sorter.add_dependency(target.clone(), descriptor.name().clone());
            } else {
                tracing::debug!(
                    step = %descriptor.name(),
                    target = %target,
                    "after target not in set; constraint skipped"
                );
            }
        }

        for input in descriptor.inputs() {
            match producers.get(input).map(Vec::as_slice) {
                // No producer in the set: the input is externally satisfied.
                None | Some([]) => {}
                Some([producer]) => {
                    if producer != descriptor.name() {
                        sorter.add_dependency(producer.clone(), descriptor.name().clone());
                    }
                }
                Some(candidates) => {
                    return Err(ConstraintError::AmbiguousProvider {
                        consumer: descriptor.name().clone(),
                        input: input.type_name(),
                        providers: candidates.to_vec(),
                    });
                }
            }
        }
    }

    Ok(sorter)
}
