use thiserror::Error;

use crate::constraint::ConstraintError;
use crate::runner::RunnerError;
use crate::scheduler::SchedulerError;
use crate::step::RegistryError;

pub type Result<T> = std::result::Result<T, StagecraftError>;

/// Crate-level error for hosts that funnel every failure into one type.
///
/// All variants are configuration or programming errors: they surface to the
/// operator and are never retried.
#[derive(Debug, Error)]
pub enum StagecraftError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}
