//! Lifecycle Step Scheduler
//!
//! Orchestrates the constraint builder and the dependency sorter once per
//! (phase, scope) and caches the resulting order for the life of the
//! scheduler. The runner replays cached orders; only [`Scheduler::invalidate`]
//! (module hot reload) forces a rebuild.

mod error;

pub use error::SchedulerError;

use crate::constraint;
use crate::step::{Phase, QualifiedName, Scope, StepDescriptor, StepRegistry};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Tie-break comparator for simultaneously-ready steps.
///
/// Defaults to qualified-name lexicographic order; pluggable because
/// unrelated modules may register into the same namespace set.
pub type NameComparator = Arc<dyn Fn(&QualifiedName, &QualifiedName) -> Ordering + Send + Sync>;

/// The cached, immutable execution order for one (phase, scope).
#[derive(Debug)]
pub struct StepOrder {
    phase: Phase,
    scope: Scope,
    steps: Vec<Arc<StepDescriptor>>,
}

impl StepOrder {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Descriptors in execution order.
    pub fn steps(&self) -> &[Arc<StepDescriptor>] {
        &self.steps
    }

    /// Qualified names in execution order.
    pub fn names(&self) -> Vec<QualifiedName> {
        self.steps.iter().map(|s| s.name().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Computes and caches step orders per (phase, scope).
///
/// Cached reads take no exclusive lock; the first build for a key holds that
/// key's cache entry, excluding concurrent reads and writes for it. Build
/// failures leave the cache empty for the key and re-raise on every call.
pub struct Scheduler {
    registry: Arc<StepRegistry>,
    cache: DashMap<(Phase, Scope), Arc<StepOrder>>,
    compare: NameComparator,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(registry: Arc<StepRegistry>) -> Self {
        Self::with_comparator(registry, Arc::new(|a, b| a.cmp(b)))
    }

    /// Creates a scheduler with a custom tie-break comparator.
    pub fn with_comparator(registry: Arc<StepRegistry>, compare: NameComparator) -> Self {
        Self {
            registry,
            cache: DashMap::new(),
            compare,
        }
    }

    pub fn registry(&self) -> &Arc<StepRegistry> {
        &self.registry
    }

    /// Returns the cached order for (phase, scope), building it on first use.
    ///
    /// Idempotent: repeated calls return the same `Arc` until
    /// [`Scheduler::invalidate`] is called.
    pub fn order_for(&self, phase: Phase, scope: Scope) -> Result<Arc<StepOrder>, SchedulerError> {
        // Cached reads stay on the shared-lock path; only a first build for
        // a key takes its entry exclusively.
        if let Some(order) = self.cache.get(&(phase, scope)) {
            return Ok(Arc::clone(order.value()));
        }
        match self.cache.entry((phase, scope)) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(slot) => {
                let order = self.build_order(phase, scope)?;
                let entry = slot.insert(Arc::new(order));
                Ok(Arc::clone(entry.value()))
            }
        }
    }

    fn build_order(&self, phase: Phase, scope: Scope) -> Result<StepOrder, SchedulerError> {
        let descriptors = self.registry.descriptors_for(phase, scope);
        let sorter = constraint::build_graph(&descriptors)?;
        let names = sorter.sort_by(|a, b| (self.compare)(a, b))?;

        let by_name: HashMap<&QualifiedName, &Arc<StepDescriptor>> =
            descriptors.iter().map(|d| (d.name(), d)).collect();
        let steps: Vec<Arc<StepDescriptor>> = names
            .iter()
            .filter_map(|name| by_name.get(name).map(|d| Arc::clone(*d)))
            .collect();

        tracing::debug!(
            %phase,
            %scope,
            steps = steps.len(),
            "computed lifecycle step order"
        );
        Ok(StepOrder {
            phase,
            scope,
            steps,
        })
    }

    /// Clears every cached order. Used when the descriptor set changes.
    pub fn invalidate(&self) {
        self.cache.clear();
        tracing::debug!("lifecycle order cache invalidated");
    }

    /// Diagnostic accessor: the computed order as a list of names, for
    /// operators troubleshooting before/after declarations.
    pub fn explain(&self, phase: Phase, scope: Scope) -> Result<Vec<QualifiedName>, SchedulerError> {
        Ok(self.order_for(phase, scope)?.names())
    }
}
