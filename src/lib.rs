//! # Stagecraft
//!
//! A two-phase, two-scope lifecycle step scheduler for Rust applications.
//!
//! Stagecraft discovers initialization/teardown steps contributed by
//! unrelated modules, orders them under partial ordering constraints
//! (explicit before/after declarations plus implicit data dependencies),
//! reports ordering cycles precisely, and replays the computed order at two
//! scopes: once per process, and once per logical unit of work such as a
//! request.
//!
//! ## Concepts
//!
//! - **Step**: a named unit of init or teardown logic with declared
//!   constraints and an invocable handle.
//! - **Phase**: `Start` or `Stop` — two independently-ordered passes. The
//!   stop order is *not* the reverse of the start order.
//! - **Scope**: `Process` (once per application lifetime) or `UnitOfWork`
//!   (once per logical task). Orders are sorted once and cached; only
//!   invocation repeats per unit.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagecraft::prelude::*;
//!
//! struct OpenPool;
//!
//! #[async_trait]
//! impl StepHandle for OpenPool {
//!     async fn invoke(&self, ctx: &StepContext<'_>) -> anyhow::Result<()> {
//!         let settings = ctx.require::<Settings>()?;
//!         ctx.insert(Pool::connect(&settings.url).await?);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runner = Runner::builder()
//!         .step(
//!             StepDescriptor::builder("config:load", Phase::Start, Scope::Process, LoadConfig)
//!                 .output::<Settings>()
//!                 .build(),
//!         )
//!         .step(
//!             StepDescriptor::builder("db:open-pool", Phase::Start, Scope::Process, OpenPool)
//!                 .input::<Settings>()   // implicitly ordered after config:load
//!                 .output::<Pool>()
//!                 .build(),
//!         )
//!         .build()?;
//!
//!     runner.start().await?;
//!
//!     let unit = runner.begin_unit().await?;
//!     // ... handle one request ...
//!     unit.finish().await?;
//!
//!     runner.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod constraint;
pub mod error;
pub mod runner;
pub mod scheduler;
pub mod sort;
pub mod step;

// Re-export core types
pub use error::{Result, StagecraftError};
pub use runner::{ProcessContext, Runner, RunnerBuilder, StepContext, UnitOfWork, UnitOfWorkContext};
pub use scheduler::{Scheduler, StepOrder};
pub use sort::DependencySorter;
pub use step::{
    Phase, QualifiedName, Scope, StaticDiscovery, StepDescriptor, StepDiscovery, StepHandle,
    StepRegistry,
};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;

/// Prelude module for convenient imports
///
/// ```
/// use stagecraft::prelude::*;
/// ```
pub mod prelude {
    pub use crate::constraint::ConstraintError;
    pub use crate::error::{Result, StagecraftError};
    pub use crate::runner::{
        ProcessContext, Runner, RunnerBuilder, RunnerError, StepContext, UnitOfWork,
        UnitOfWorkContext,
    };
    pub use crate::scheduler::{NameComparator, Scheduler, SchedulerError, StepOrder};
    pub use crate::sort::{CycleError, DependencySorter};
    pub use crate::step::{
        ContextKey, Phase, QualifiedName, RegistryError, Scope, StaticDiscovery, StepDescriptor,
        StepDescriptorBuilder, StepDiscovery, StepHandle, StepRegistry,
    };
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
