//! Step Metadata and Registry
//!
//! A *step* is a named unit of initialization or teardown logic contributed
//! by some module of the host application. Steps carry metadata only —
//! qualified name, phase, scope, explicit before/after constraints, declared
//! context inputs/outputs — plus an invocable handle. Discovery of steps is a
//! host concern; the registry accepts descriptors from any
//! [`StepDiscovery`] implementation and rejects duplicates.

mod descriptor;
mod discovery;
mod name;
mod registry;

pub use descriptor::{StepDescriptor, StepDescriptorBuilder, StepHandle};
pub use discovery::{StaticDiscovery, StepDiscovery};
pub use name::{ContextKey, Phase, QualifiedName, Scope};
pub use registry::{RegistryError, StepRegistry};
