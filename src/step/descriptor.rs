//! Step descriptors and the invocable handle contract.

use super::{ContextKey, Phase, QualifiedName, Scope};
use crate::runner::StepContext;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The invocable side of a step.
///
/// Handles read their declared inputs from the context and install their
/// declared outputs into it. Singleton-bound handles are ordinary values
/// behind an `Arc`; no global statics are involved.
///
/// # Example
///
/// ```rust,ignore
/// struct OpenPool {
///     config: PoolConfig,
/// }
///
/// #[async_trait]
/// impl StepHandle for OpenPool {
///     async fn invoke(&self, ctx: &StepContext<'_>) -> anyhow::Result<()> {
///         let settings = ctx.require::<Settings>()?;
///         ctx.insert(Pool::connect(&settings.url).await?);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait StepHandle: Send + Sync {
    async fn invoke(&self, ctx: &StepContext<'_>) -> anyhow::Result<()>;
}

/// Immutable metadata for one lifecycle step.
///
/// Created once at discovery time via [`StepDescriptor::builder`]; the
/// scheduler and runner only ever read it.
#[derive(Clone)]
pub struct StepDescriptor {
    name: QualifiedName,
    phase: Phase,
    scope: Scope,
    before: Vec<QualifiedName>,
    after: Vec<QualifiedName>,
    inputs: Vec<ContextKey>,
    outputs: Vec<ContextKey>,
    handle: Arc<dyn StepHandle>,
}

impl StepDescriptor {
    /// Starts building a descriptor around its handle.
    pub fn builder(
        name: impl Into<QualifiedName>,
        phase: Phase,
        scope: Scope,
        handle: impl StepHandle + 'static,
    ) -> StepDescriptorBuilder {
        StepDescriptorBuilder {
            name: name.into(),
            phase,
            scope,
            before: Vec::new(),
            after: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            handle: Arc::new(handle),
        }
    }

    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Steps this step must precede.
    pub fn before(&self) -> &[QualifiedName] {
        &self.before
    }

    /// Steps this step must follow.
    pub fn after(&self) -> &[QualifiedName] {
        &self.after
    }

    /// Context types the handle requires.
    pub fn inputs(&self) -> &[ContextKey] {
        &self.inputs
    }

    /// Context types the handle is known to produce.
    pub fn outputs(&self) -> &[ContextKey] {
        &self.outputs
    }

    pub fn handle(&self) -> &Arc<dyn StepHandle> {
        &self.handle
    }
}

impl fmt::Debug for StepDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDescriptor")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("scope", &self.scope)
            .field("before", &self.before)
            .field("after", &self.after)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`StepDescriptor`].
pub struct StepDescriptorBuilder {
    name: QualifiedName,
    phase: Phase,
    scope: Scope,
    before: Vec<QualifiedName>,
    after: Vec<QualifiedName>,
    inputs: Vec<ContextKey>,
    outputs: Vec<ContextKey>,
    handle: Arc<dyn StepHandle>,
}

impl StepDescriptorBuilder {
    /// Declares that this step must run before `target`.
    pub fn before(mut self, target: impl Into<QualifiedName>) -> Self {
        self.before.push(target.into());
        self
    }

    /// Declares that this step must run after `target`.
    pub fn after(mut self, target: impl Into<QualifiedName>) -> Self {
        self.after.push(target.into());
        self
    }

    /// Declares a context type the handle requires as input.
    pub fn input<T: Any + Send + Sync>(mut self) -> Self {
        self.inputs.push(ContextKey::of::<T>());
        self
    }

    /// Declares a context type the handle produces.
    pub fn output<T: Any + Send + Sync>(mut self) -> Self {
        self.outputs.push(ContextKey::of::<T>());
        self
    }

    pub fn build(self) -> StepDescriptor {
        StepDescriptor {
            name: self.name,
            phase: self.phase,
            scope: self.scope,
            before: self.before,
            after: self.after,
            inputs: self.inputs,
            outputs: self.outputs,
            handle: self.handle,
        }
    }
}
