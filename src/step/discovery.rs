//! Discovery collaborator contract.

use super::StepDescriptor;

/// Locates step registration sources and yields their descriptors.
///
/// How steps are found — module manifests, configuration files, explicit
/// registration calls — is entirely the implementor's business. The
/// scheduler calls this once at process start, and again only on an
/// explicit reload.
pub trait StepDiscovery: Send + Sync {
    fn discover_steps(&self) -> Vec<StepDescriptor>;
}

/// Discovery backed by an explicit registration list.
///
/// The in-tree implementation for hosts that assemble their step set in
/// code.
///
/// # Example
///
/// ```rust,ignore
/// let discovery = StaticDiscovery::new()
///     .with_step(load_config)
///     .with_step(open_pool);
/// let runner = Runner::builder().discover(&discovery).build()?;
/// ```
#[derive(Default)]
pub struct StaticDiscovery {
    steps: Vec<StepDescriptor>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, descriptor: StepDescriptor) -> Self {
        self.steps.push(descriptor);
        self
    }

    pub fn push(&mut self, descriptor: StepDescriptor) {
        self.steps.push(descriptor);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl StepDiscovery for StaticDiscovery {
    fn discover_steps(&self) -> Vec<StepDescriptor> {
        self.steps.clone()
    }
}
