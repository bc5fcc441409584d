//! Scope-appropriate storage for step outputs.
//!
//! Process-scoped outputs live in a process-wide holder shared behind an
//! `Arc`; unit-of-work outputs live in storage owned by one unit and are
//! discarded when that unit ends. Step handles see both through a
//! [`StepContext`] view whose writes land in the innermost scope.

use crate::step::ContextKey;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// Process-wide holder for values produced by Process-scoped steps.
///
/// Concurrent reads take no exclusive lock; insertion is keyed by value
/// type, so a later producer of the same type replaces the earlier value.
pub struct ProcessContext {
    values: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessContext").finish_non_exhaustive()
    }
}

impl Default for ProcessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessContext {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
        }
    }

    pub fn insert<T: Any + Send + Sync>(&self, value: T) {
        self.values.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|entry| Arc::clone(entry.value()).downcast::<T>().ok())
    }

    pub fn contains(&self, key: &ContextKey) -> bool {
        self.values.contains_key(&key.type_id())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Storage owned by a single unit of work.
///
/// Reads fall back to the parent [`ProcessContext`]; writes stay local and
/// are dropped with the unit. No cross-unit locking is involved — each unit
/// owns its context exclusively.
pub struct UnitOfWorkContext {
    values: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    process: Arc<ProcessContext>,
}

impl std::fmt::Debug for UnitOfWorkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWorkContext")
            .field("process", &self.process)
            .finish_non_exhaustive()
    }
}

impl UnitOfWorkContext {
    pub(crate) fn new(process: Arc<ProcessContext>) -> Self {
        Self {
            values: DashMap::new(),
            process,
        }
    }

    pub fn insert<T: Any + Send + Sync>(&self, value: T) {
        self.values.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Looks up a value in this unit, then in the process context.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.get_local::<T>().or_else(|| self.process.get::<T>())
    }

    /// Looks up a value in this unit only.
    pub fn get_local<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|entry| Arc::clone(entry.value()).downcast::<T>().ok())
    }

    pub fn process(&self) -> &Arc<ProcessContext> {
        &self.process
    }
}

/// The view a [`crate::step::StepHandle`] receives during a pass.
///
/// Reads search the unit-of-work storage first (when the pass is
/// unit-scoped) and fall back to the process context; writes go to the
/// innermost scope of the running pass.
pub struct StepContext<'a> {
    process: &'a ProcessContext,
    unit: Option<&'a UnitOfWorkContext>,
}

impl<'a> StepContext<'a> {
    pub(crate) fn process_scoped(process: &'a ProcessContext) -> Self {
        Self {
            process,
            unit: None,
        }
    }

    pub(crate) fn unit_scoped(unit: &'a UnitOfWorkContext) -> Self {
        Self {
            process: unit.process(),
            unit: Some(unit),
        }
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self.unit {
            Some(unit) => unit.get::<T>(),
            None => self.process.get::<T>(),
        }
    }

    /// Like [`StepContext::get`], but fails with a descriptive error when
    /// the value is missing — the usual shape for declared inputs.
    pub fn require<T: Any + Send + Sync>(&self) -> anyhow::Result<Arc<T>> {
        self.get::<T>().ok_or_else(|| {
            anyhow::anyhow!("missing context value: {}", std::any::type_name::<T>())
        })
    }

    pub fn insert<T: Any + Send + Sync>(&self, value: T) {
        match self.unit {
            Some(unit) => unit.insert(value),
            None => self.process.insert(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(PartialEq, Debug)]
    struct Settings(u32);

    #[derive(PartialEq, Debug)]
    struct Session(&'static str);

    #[test]
    fn test_process_context_roundtrip() {
        let ctx = ProcessContext::new();
        assert!(ctx.get::<Settings>().is_none());

        ctx.insert(Settings(7));
        assert_eq!(*ctx.get::<Settings>().unwrap(), Settings(7));
        assert!(ctx.contains(&ContextKey::of::<Settings>()));
    }

    #[test]
    fn test_unit_context_falls_back_to_process() {
        let process = Arc::new(ProcessContext::new());
        process.insert(Settings(1));

        let unit = UnitOfWorkContext::new(Arc::clone(&process));
        assert_eq!(*unit.get::<Settings>().unwrap(), Settings(1));
        assert!(unit.get_local::<Settings>().is_none());
    }

    #[test]
    fn test_unit_writes_stay_local() {
        let process = Arc::new(ProcessContext::new());
        let unit = UnitOfWorkContext::new(Arc::clone(&process));

        unit.insert(Session("abc"));
        assert_eq!(*unit.get::<Session>().unwrap(), Session("abc"));
        assert!(process.get::<Session>().is_none());
    }

    #[test]
    fn test_step_context_writes_to_innermost_scope() {
        let process = Arc::new(ProcessContext::new());
        let unit = UnitOfWorkContext::new(Arc::clone(&process));

        let process_view = StepContext::process_scoped(&process);
        process_view.insert(Settings(2));

        let unit_view = StepContext::unit_scoped(&unit);
        unit_view.insert(Session("xyz"));

        assert_eq!(*unit_view.get::<Settings>().unwrap(), Settings(2));
        assert!(process.get::<Session>().is_none());
        assert!(unit.get_local::<Session>().is_some());
    }

    #[test]
    fn test_require_reports_missing_type() {
        let process = ProcessContext::new();
        let view = StepContext::process_scoped(&process);
        let err = view.require::<Settings>().unwrap_err();
        assert!(err.to_string().contains("Settings"));
    }
}
