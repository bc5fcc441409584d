//! Lifecycle Runner
//!
//! Walks cached step orders and invokes each handle at the right moment:
//! process start/stop once per application lifetime, unit-of-work begin/end
//! once per logical task. The sort is never recomputed per unit — only
//! invocation happens per unit.
//!
//! # Failure Policy
//!
//! A Start-pass failure aborts the remaining steps and propagates; already-
//! run steps are not unwound, because the Stop graph is computed
//! independently and is not guaranteed to invert the Start graph. Teardown
//! of partially-started state is each step's own responsibility (idempotent
//! teardown). Stop passes log a failing step and keep going, returning the
//! first error once the pass completes. A unit of work whose begin pass
//! fails still gets its stop pass before the error propagates.

mod context;

pub use context::{ProcessContext, StepContext, UnitOfWorkContext};

use crate::scheduler::{NameComparator, Scheduler, SchedulerError, StepOrder};
use crate::step::{
    Phase, QualifiedName, RegistryError, Scope, StepDescriptor, StepDiscovery, StepRegistry,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

/// Errors raised while executing lifecycle passes.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// A step handle failed during a pass.
    #[error("step '{name}' failed during {phase} pass ({scope}): {source}")]
    StepInvocation {
        name: QualifiedName,
        phase: Phase,
        scope: Scope,
        #[source]
        source: anyhow::Error,
    },

    /// A pass exceeded its configured deadline.
    #[error("{phase} pass ({scope}) timed out after {timeout:?}")]
    Timeout {
        phase: Phase,
        scope: Scope,
        timeout: Duration,
    },

    #[error(transparent)]
    Schedule(#[from] SchedulerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A specialized Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Executes lifecycle passes against the orders cached by the [`Scheduler`].
///
/// # Example
///
/// ```rust,ignore
/// let runner = Runner::builder()
///     .discover(&discovery)
///     .start_timeout(Duration::from_secs(30))
///     .build()?;
///
/// runner.start().await?;
/// let unit = runner.begin_unit().await?;
/// // ... handle one request ...
/// unit.finish().await?;
/// runner.stop().await?;
/// ```
#[derive(Debug)]
pub struct Runner {
    scheduler: Arc<Scheduler>,
    process: Arc<ProcessContext>,
    start_timeout: Option<Duration>,
    stop_timeout: Option<Duration>,
}

impl Runner {
    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::new()
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Holder for values produced by Process-scoped steps.
    pub fn process_context(&self) -> &Arc<ProcessContext> {
        &self.process
    }

    /// Diagnostic accessor for the computed order of a (phase, scope).
    pub fn explain(&self, phase: Phase, scope: Scope) -> Result<Vec<QualifiedName>> {
        Ok(self.scheduler.explain(phase, scope)?)
    }

    /// Runs the (Start, Process) pass. Called once at application start.
    pub async fn start(&self) -> Result<()> {
        let pass = self.run_process_pass(Phase::Start);
        match self.start_timeout {
            Some(timeout) => tokio::time::timeout(timeout, pass).await.map_err(|_| {
                RunnerError::Timeout {
                    phase: Phase::Start,
                    scope: Scope::Process,
                    timeout,
                }
            })?,
            None => pass.await,
        }
    }

    /// Runs the (Stop, Process) pass. Called once at application shutdown.
    ///
    /// The stop order is computed independently of the start order.
    pub async fn stop(&self) -> Result<()> {
        let pass = self.run_process_pass(Phase::Stop);
        match self.stop_timeout {
            Some(timeout) => tokio::time::timeout(timeout, pass).await.map_err(|_| {
                RunnerError::Timeout {
                    phase: Phase::Stop,
                    scope: Scope::Process,
                    timeout,
                }
            })?,
            None => pass.await,
        }
    }

    async fn run_process_pass(&self, phase: Phase) -> Result<()> {
        let order = self.scheduler.order_for(phase, Scope::Process)?;
        let ctx = StepContext::process_scoped(&self.process);
        run_steps(&order, &ctx, abort_on_error(phase)).await
    }

    /// Begins one unit of work: replays the cached (Start, UnitOfWork)
    /// order against a fresh context.
    ///
    /// If the begin pass fails, the unit's stop pass runs over the same
    /// context before the error propagates — a unit that fails to start must
    /// not proceed to normal processing, but still gets its cleanup.
    pub async fn begin_unit(&self) -> Result<UnitOfWork> {
        let context = UnitOfWorkContext::new(Arc::clone(&self.process));
        let id = Uuid::new_v4();
        let span = tracing::info_span!("unit_of_work", unit = %id);

        let order = self.scheduler.order_for(Phase::Start, Scope::UnitOfWork)?;
        let ctx = StepContext::unit_scoped(&context);
        if let Err(err) = run_steps(&order, &ctx, true).instrument(span.clone()).await {
            match self.scheduler.order_for(Phase::Stop, Scope::UnitOfWork) {
                Ok(stop_order) => {
                    // Cleanup errors are logged by the pass itself.
                    let _ = run_steps(&stop_order, &ctx, false).instrument(span).await;
                }
                Err(schedule_err) => {
                    tracing::error!(
                        unit = %id,
                        error = %schedule_err,
                        "unit cleanup pass skipped: stop order unavailable"
                    );
                }
            }
            return Err(err);
        }

        Ok(UnitOfWork {
            id,
            context,
            scheduler: Arc::clone(&self.scheduler),
            span,
        })
    }
}

/// One in-flight unit of work and its scoped storage.
///
/// Dropping a unit without calling [`UnitOfWork::finish`] skips its stop
/// pass; hosts that cancel a unit externally should still call `finish` so
/// teardown steps run.
#[derive(Debug)]
pub struct UnitOfWork {
    id: Uuid,
    context: UnitOfWorkContext,
    scheduler: Arc<Scheduler>,
    span: tracing::Span,
}

impl UnitOfWork {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &UnitOfWorkContext {
        &self.context
    }

    /// Runs the (Stop, UnitOfWork) pass and discards the unit's storage.
    ///
    /// A failing teardown step is logged and the pass continues; the first
    /// error is returned once the pass completes.
    pub async fn finish(self) -> Result<()> {
        let order = self.scheduler.order_for(Phase::Stop, Scope::UnitOfWork)?;
        let ctx = StepContext::unit_scoped(&self.context);
        run_steps(&order, &ctx, false)
            .instrument(self.span.clone())
            .await
    }
}

fn abort_on_error(phase: Phase) -> bool {
    match phase {
        Phase::Start => true,
        Phase::Stop => false,
    }
}

/// Invokes every step of an order strictly sequentially.
///
/// `abort` selects the failure policy: abort-and-propagate (Start passes)
/// or log-and-continue returning the first error (Stop passes).
async fn run_steps(order: &StepOrder, ctx: &StepContext<'_>, abort: bool) -> Result<()> {
    tracing::info!(
        phase = %order.phase(),
        scope = %order.scope(),
        steps = order.len(),
        "running lifecycle pass"
    );

    let mut first_error: Option<RunnerError> = None;
    for step in order.steps() {
        tracing::debug!(step = %step.name(), "invoking lifecycle step");
        if let Err(source) = step.handle().invoke(ctx).await {
            tracing::error!(
                step = %step.name(),
                phase = %order.phase(),
                scope = %order.scope(),
                error = %source,
                "lifecycle step failed"
            );
            let err = RunnerError::StepInvocation {
                name: step.name().clone(),
                phase: order.phase(),
                scope: order.scope(),
                source,
            };
            if abort {
                return Err(err);
            }
            if first_error.is_none() {
                first_error = Some(err);
            }
        }
    }

    tracing::info!(
        phase = %order.phase(),
        scope = %order.scope(),
        "lifecycle pass complete"
    );
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Builder for [`Runner`], in charge of registering the discovered steps.
pub struct RunnerBuilder {
    steps: Vec<StepDescriptor>,
    compare: Option<NameComparator>,
    start_timeout: Option<Duration>,
    stop_timeout: Option<Duration>,
}

impl Default for RunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RunnerBuilder {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            compare: None,
            start_timeout: None,
            stop_timeout: None,
        }
    }

    /// Adds one descriptor directly.
    pub fn step(mut self, descriptor: StepDescriptor) -> Self {
        self.steps.push(descriptor);
        self
    }

    /// Pulls every descriptor from a discovery collaborator.
    pub fn discover(mut self, discovery: &dyn StepDiscovery) -> Self {
        self.steps.extend(discovery.discover_steps());
        self
    }

    /// Overrides the tie-break comparator used by the scheduler.
    pub fn comparator(mut self, compare: NameComparator) -> Self {
        self.compare = Some(compare);
        self
    }

    /// Deadline for the (Start, Process) pass.
    pub fn start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = Some(timeout);
        self
    }

    /// Deadline for the (Stop, Process) pass.
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = Some(timeout);
        self
    }

    /// Registers all collected steps and builds the runner.
    ///
    /// Fails with [`RegistryError::DuplicateStep`] when two descriptors
    /// collide on (phase, scope, name).
    pub fn build(self) -> Result<Runner> {
        let registry = StepRegistry::new();
        for descriptor in self.steps {
            registry.register(descriptor)?;
        }
        let registry = Arc::new(registry);

        let scheduler = match self.compare {
            Some(compare) => Scheduler::with_comparator(registry, compare),
            None => Scheduler::new(registry),
        };
        tracing::info!(steps = scheduler.registry().len(), "lifecycle runner ready");

        Ok(Runner {
            scheduler: Arc::new(scheduler),
            process: Arc::new(ProcessContext::new()),
            start_timeout: self.start_timeout,
            stop_timeout: self.stop_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepHandle;
    use async_trait::async_trait;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Record {
        log: Log,
        label: &'static str,
    }

    #[async_trait]
    impl StepHandle for Record {
        async fn invoke(&self, _ctx: &StepContext<'_>) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(self.label.to_string());
            Ok(())
        }
    }

    struct Fail {
        log: Log,
        label: &'static str,
    }

    #[async_trait]
    impl StepHandle for Fail {
        async fn invoke(&self, _ctx: &StepContext<'_>) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(self.label.to_string());
            Err(anyhow::anyhow!("{} exploded", self.label))
        }
    }

    fn record(log: &Log, label: &'static str) -> Record {
        Record {
            log: Arc::clone(log),
            label,
        }
    }

    fn fail(log: &Log, label: &'static str) -> Fail {
        Fail {
            log: Arc::clone(log),
            label,
        }
    }

    fn taken(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_start_runs_process_steps_in_order() {
        let log: Log = Arc::default();
        let runner = Runner::builder()
            .step(
                StepDescriptor::builder("a:second", Phase::Start, Scope::Process, record(&log, "second"))
                    .after("a:first")
                    .build(),
            )
            .step(
                StepDescriptor::builder("a:first", Phase::Start, Scope::Process, record(&log, "first"))
                    .build(),
            )
            .build()
            .unwrap();

        runner.start().await.unwrap();
        assert_eq!(taken(&log), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_start_failure_aborts_remaining_steps() {
        let log: Log = Arc::default();
        let runner = Runner::builder()
            .step(
                StepDescriptor::builder("a:boom", Phase::Start, Scope::Process, fail(&log, "boom"))
                    .build(),
            )
            .step(
                StepDescriptor::builder("b:later", Phase::Start, Scope::Process, record(&log, "later"))
                    .after("a:boom")
                    .build(),
            )
            .build()
            .unwrap();

        let err = runner.start().await.unwrap_err();
        match err {
            RunnerError::StepInvocation { name, phase, scope, .. } => {
                assert_eq!(name, QualifiedName::from("a:boom"));
                assert_eq!(phase, Phase::Start);
                assert_eq!(scope, Scope::Process);
            }
            other => panic!("expected step invocation error, got {other}"),
        }
        // "later" never ran: no unwind, no continuation.
        assert_eq!(taken(&log), vec!["boom"]);
    }

    #[tokio::test]
    async fn test_stop_failure_continues_pass() {
        let log: Log = Arc::default();
        let runner = Runner::builder()
            .step(
                StepDescriptor::builder("a:boom", Phase::Stop, Scope::Process, fail(&log, "boom"))
                    .build(),
            )
            .step(
                StepDescriptor::builder("b:after", Phase::Stop, Scope::Process, record(&log, "after"))
                    .after("a:boom")
                    .build(),
            )
            .build()
            .unwrap();

        let err = runner.stop().await.unwrap_err();
        assert!(matches!(err, RunnerError::StepInvocation { .. }));
        // The failing step did not stop the teardown pass.
        assert_eq!(taken(&log), vec!["boom", "after"]);
    }

    #[tokio::test]
    async fn test_duplicate_step_fails_at_build() {
        let log: Log = Arc::default();
        let result = Runner::builder()
            .step(
                StepDescriptor::builder("a:x", Phase::Start, Scope::Process, record(&log, "one"))
                    .build(),
            )
            .step(
                StepDescriptor::builder("a:x", Phase::Start, Scope::Process, record(&log, "two"))
                    .build(),
            )
            .build();

        assert!(matches!(
            result.unwrap_err(),
            RunnerError::Registry(RegistryError::DuplicateStep { .. })
        ));
    }

    #[tokio::test]
    async fn test_unit_passes_replay_cached_order() {
        let log: Log = Arc::default();
        let runner = Runner::builder()
            .step(
                StepDescriptor::builder("u:begin", Phase::Start, Scope::UnitOfWork, record(&log, "begin"))
                    .build(),
            )
            .step(
                StepDescriptor::builder("u:end", Phase::Stop, Scope::UnitOfWork, record(&log, "end"))
                    .build(),
            )
            .build()
            .unwrap();

        let first = runner.begin_unit().await.unwrap();
        first.finish().await.unwrap();
        let second = runner.begin_unit().await.unwrap();
        second.finish().await.unwrap();

        assert_eq!(taken(&log), vec!["begin", "end", "begin", "end"]);
        // The order was computed once per (phase, scope) and replayed.
        let start_order = runner
            .scheduler()
            .order_for(Phase::Start, Scope::UnitOfWork)
            .unwrap();
        let again = runner
            .scheduler()
            .order_for(Phase::Start, Scope::UnitOfWork)
            .unwrap();
        assert!(Arc::ptr_eq(&start_order, &again));
    }

    #[tokio::test]
    async fn test_unit_contexts_are_isolated() {
        struct Marker(u32);

        struct WriteMarker;

        #[async_trait]
        impl StepHandle for WriteMarker {
            async fn invoke(&self, ctx: &StepContext<'_>) -> anyhow::Result<()> {
                let next = ctx.get::<Marker>().map_or(1, |m| m.0 + 1);
                ctx.insert(Marker(next));
                Ok(())
            }
        }

        let runner = Runner::builder()
            .step(
                StepDescriptor::builder("u:mark", Phase::Start, Scope::UnitOfWork, WriteMarker)
                    .build(),
            )
            .build()
            .unwrap();

        let first = runner.begin_unit().await.unwrap();
        let second = runner.begin_unit().await.unwrap();

        // Each unit saw an empty context: both markers are 1.
        assert_eq!(first.context().get_local::<Marker>().unwrap().0, 1);
        assert_eq!(second.context().get_local::<Marker>().unwrap().0, 1);
        assert!(runner.process_context().get::<Marker>().is_none());

        first.finish().await.unwrap();
        second.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_begin_runs_unit_stop_pass() {
        let log: Log = Arc::default();
        let runner = Runner::builder()
            .step(
                StepDescriptor::builder("u:boom", Phase::Start, Scope::UnitOfWork, fail(&log, "boom"))
                    .build(),
            )
            .step(
                StepDescriptor::builder("u:cleanup", Phase::Stop, Scope::UnitOfWork, record(&log, "cleanup"))
                    .build(),
            )
            .build()
            .unwrap();

        let err = runner.begin_unit().await.unwrap_err();
        assert!(matches!(err, RunnerError::StepInvocation { .. }));
        assert_eq!(taken(&log), vec!["boom", "cleanup"]);
    }

    #[tokio::test]
    async fn test_failed_begin_keeps_its_error_when_stop_order_is_unusable() {
        let log: Log = Arc::default();
        // The unit stop steps form a cycle, so no cleanup order exists; the
        // begin failure must still be the error that propagates.
        let runner = Runner::builder()
            .step(
                StepDescriptor::builder("u:boom", Phase::Start, Scope::UnitOfWork, fail(&log, "boom"))
                    .build(),
            )
            .step(
                StepDescriptor::builder("u:a", Phase::Stop, Scope::UnitOfWork, record(&log, "a"))
                    .before("u:b")
                    .build(),
            )
            .step(
                StepDescriptor::builder("u:b", Phase::Stop, Scope::UnitOfWork, record(&log, "b"))
                    .before("u:a")
                    .build(),
            )
            .build()
            .unwrap();

        let err = runner.begin_unit().await.unwrap_err();
        assert!(matches!(err, RunnerError::StepInvocation { .. }));
        assert_eq!(taken(&log), vec!["boom"]);
    }

    #[tokio::test]
    async fn test_process_outputs_visible_to_unit_steps() {
        struct Settings(&'static str);

        struct Install;

        #[async_trait]
        impl StepHandle for Install {
            async fn invoke(&self, ctx: &StepContext<'_>) -> anyhow::Result<()> {
                ctx.insert(Settings("prod"));
                Ok(())
            }
        }

        struct ReadBack {
            log: Log,
        }

        #[async_trait]
        impl StepHandle for ReadBack {
            async fn invoke(&self, ctx: &StepContext<'_>) -> anyhow::Result<()> {
                let settings = ctx.require::<Settings>()?;
                self.log.lock().unwrap().push(settings.0.to_string());
                Ok(())
            }
        }

        let log: Log = Arc::default();
        let runner = Runner::builder()
            .step(
                StepDescriptor::builder("p:install", Phase::Start, Scope::Process, Install)
                    .output::<Settings>()
                    .build(),
            )
            .step(
                StepDescriptor::builder("u:read", Phase::Start, Scope::UnitOfWork, ReadBack { log: Arc::clone(&log) })
                    .input::<Settings>()
                    .build(),
            )
            .build()
            .unwrap();

        runner.start().await.unwrap();
        let unit = runner.begin_unit().await.unwrap();
        unit.finish().await.unwrap();

        assert_eq!(taken(&log), vec!["prod"]);
    }

    #[tokio::test]
    async fn test_start_timeout_surfaces_as_error() {
        struct Sleepy;

        #[async_trait]
        impl StepHandle for Sleepy {
            async fn invoke(&self, _ctx: &StepContext<'_>) -> anyhow::Result<()> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        }

        let runner = Runner::builder()
            .step(StepDescriptor::builder("a:slow", Phase::Start, Scope::Process, Sleepy).build())
            .start_timeout(Duration::from_millis(20))
            .build()
            .unwrap();

        let err = runner.start().await.unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { phase: Phase::Start, .. }));
    }
}
