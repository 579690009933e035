//! Step pipeline
//!
//! Executes deployment steps strictly in order, persists state after each
//! success, downgrades optional-step failures to warnings, and performs
//! reverse-order best-effort rollback when a required step fails.

pub mod steps;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::cancel::CancelSignal;
use crate::context::DeployContext;
use crate::errors::DeployError;

/// What `execute` did to the world.
///
/// Rollback must undo only what a run created, so a step that found its
/// work already done reports `Unchanged` and is left alone on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step created or reconfigured resources this run
    Changed,
    /// Everything was already in place; there is nothing to undo
    Unchanged,
}

/// A named unit of orchestration work.
///
/// All four declared properties are fixed at construction; steps are
/// stateless and mutate only through the shared [`DeployContext`].
#[async_trait]
pub trait Step: Send + Sync {
    /// Stable step name, used in error wrapping and logs
    fn name(&self) -> &'static str;

    /// Human description for progress display
    fn description(&self) -> &'static str;

    /// Whether a failure aborts the pipeline
    fn required(&self) -> bool {
        true
    }

    /// Whether this step defines an undo
    fn can_rollback(&self) -> bool {
        false
    }

    /// Duration estimate, for progress display only
    fn estimate(&self) -> Duration;

    /// Perform the step's work, reporting whether anything was changed
    async fn execute(&self, ctx: &DeployContext, cancel: &CancelSignal)
        -> Result<StepOutcome, DeployError>;

    /// Undo what this step created; only called when `can_rollback` is true
    async fn rollback(
        &self,
        _ctx: &DeployContext,
        _cancel: &CancelSignal,
    ) -> Result<(), DeployError> {
        Ok(())
    }
}

/// Ordered step pipeline
pub struct Pipeline {
    steps: Vec<Arc<dyn Step>>,
}

impl Pipeline {
    pub fn new(steps: Vec<Arc<dyn Step>>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    /// Run every step in order.
    ///
    /// On a required-step failure the original error is returned wrapped
    /// with the step name; rollback errors are logged, never propagated.
    pub async fn run(&self, ctx: &DeployContext, cancel: &CancelSignal) -> Result<(), DeployError> {
        let total = self.steps.len();
        let mut completed: Vec<(Arc<dyn Step>, StepOutcome)> = Vec::new();

        for (index, step) in self.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                let err = DeployError::Cancelled.in_step(step.name());
                self.rollback_completed(&completed, ctx, cancel).await;
                return Err(err);
            }

            ctx.progress
                .step_started(index + 1, total, step.description(), step.estimate());
            info!("Step {}/{}: {}", index + 1, total, step.name());

            match step.execute(ctx, cancel).await {
                Ok(outcome) => {
                    completed.push((step.clone(), outcome));
                    ctx.progress.step_done(step.description());

                    // The world already changed; a failed save must not
                    // roll back live resources
                    if let Err(e) = ctx.save().await {
                        warn!("Failed to persist state after '{}': {}", step.name(), e);
                        ctx.progress
                            .warn(&format!("state could not be saved: {}", e));
                    }
                }
                Err(e) if step.required() => {
                    error!("Required step '{}' failed: {}", step.name(), e);
                    ctx.progress.error(&format!("{} failed: {}", step.name(), e));
                    self.rollback_completed(&completed, ctx, cancel).await;
                    return Err(e.in_step(step.name()));
                }
                Err(e) => {
                    warn!("Optional step '{}' failed: {}", step.name(), e);
                    ctx.progress
                        .warn(&format!("{} failed ({}), continuing", step.name(), e));
                }
            }
        }

        Ok(())
    }

    /// Roll back completed steps in reverse order, best-effort.
    ///
    /// Steps that reported `Unchanged` reused resources that predate this
    /// run; those are never touched.
    async fn rollback_completed(
        &self,
        completed: &[(Arc<dyn Step>, StepOutcome)],
        ctx: &DeployContext,
        cancel: &CancelSignal,
    ) {
        let mut rolled_back = false;
        for (step, outcome) in completed.iter().rev() {
            if !step.can_rollback() || *outcome == StepOutcome::Unchanged {
                continue;
            }
            info!("Rolling back step '{}'", step.name());
            rolled_back = true;
            if let Err(e) = step.rollback(ctx, cancel).await {
                // Never mask the original failure, never stop early
                error!("Rollback of '{}' failed: {}", step.name(), e);
                ctx.progress
                    .warn(&format!("rollback of {} failed: {}", step.name(), e));
            }
        }

        // Rollbacks mutate the state document; without this the on-disk
        // copy would still record the resources that were just removed
        if rolled_back {
            if let Err(e) = ctx.save().await {
                warn!("Failed to persist state after rollback: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ClusterInfo, ClusterSpec, InfraOps};
    use crate::config::DeployConfig;
    use crate::storage::layout::StorageLayout;
    use std::sync::Mutex;

    struct NoInfra;

    #[async_trait]
    impl InfraOps for NoInfra {
        async fn create_cluster(&self, _s: &ClusterSpec) -> Result<ClusterInfo, DeployError> {
            Err(DeployError::Internal("unused".to_string()))
        }
        async fn destroy_cluster(&self) -> Result<(), DeployError> {
            Ok(())
        }
        async fn wait_ready(&self, _c: &CancelSignal) -> Result<(), DeployError> {
            Ok(())
        }
        async fn describe_cluster(&self) -> Result<Option<ClusterInfo>, DeployError> {
            Ok(None)
        }
    }

    fn context() -> DeployContext {
        let dir = tempfile::tempdir().unwrap();
        DeployContext::new(
            DeployConfig::default(),
            StorageLayout::new(dir.keep()),
            Arc::new(NoInfra),
            Box::new(|_| unreachable!()),
            Box::new(|_| unreachable!()),
        )
        .with_silent_progress()
    }

    /// Scripted step that records execute/rollback events in a shared log
    struct Scripted {
        name: &'static str,
        required: bool,
        rollback: bool,
        fail: bool,
        outcome: StepOutcome,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Step for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }
        fn description(&self) -> &'static str {
            self.name
        }
        fn required(&self) -> bool {
            self.required
        }
        fn can_rollback(&self) -> bool {
            self.rollback
        }
        fn estimate(&self) -> Duration {
            Duration::from_secs(1)
        }
        async fn execute(
            &self,
            _ctx: &DeployContext,
            _cancel: &CancelSignal,
        ) -> Result<StepOutcome, DeployError> {
            self.log.lock().unwrap().push(format!("exec:{}", self.name));
            if self.fail {
                Err(DeployError::Internal("boom".to_string()))
            } else {
                Ok(self.outcome)
            }
        }
        async fn rollback(
            &self,
            _ctx: &DeployContext,
            _cancel: &CancelSignal,
        ) -> Result<(), DeployError> {
            self.log.lock().unwrap().push(format!("undo:{}", self.name));
            Ok(())
        }
    }

    fn step(
        name: &'static str,
        required: bool,
        rollback: bool,
        fail: bool,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Arc<dyn Step> {
        Arc::new(Scripted {
            name,
            required,
            rollback,
            fail,
            outcome: StepOutcome::Changed,
            log: log.clone(),
        })
    }

    /// Rollback-capable step that found its work already done
    fn reusing_step(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Step> {
        Arc::new(Scripted {
            name,
            required: true,
            rollback: true,
            fail: false,
            outcome: StepOutcome::Unchanged,
            log: log.clone(),
        })
    }

    #[tokio::test]
    async fn test_required_failure_rolls_back_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            step("one", true, true, false, &log),
            step("two", true, false, false, &log),
            step("three", true, true, false, &log),
            step("four", true, true, true, &log),
            step("five", true, true, false, &log),
        ]);

        let ctx = context();
        let cancel = CancelSignal::new();
        let err = pipeline.run(&ctx, &cancel).await.unwrap_err();
        assert!(err.to_string().contains("four"));

        let events = log.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "exec:one", "exec:two", "exec:three", "exec:four",
                // Reverse order, rollback-capable only, failed step excluded
                "undo:three", "undo:one",
            ]
        );
    }

    #[tokio::test]
    async fn test_rollback_leaves_reused_resources_alone() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            // Found an existing cluster and reused it
            reusing_step("infrastructure", &log),
            step("application", true, true, false, &log),
            step("verify", true, false, true, &log),
        ]);

        let ctx = context();
        let cancel = CancelSignal::new();
        pipeline.run(&ctx, &cancel).await.unwrap_err();

        let events = log.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "exec:infrastructure",
                "exec:application",
                "exec:verify",
                // The reused infrastructure is not this run's to destroy
                "undo:application",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_state_save_does_not_abort_the_run() {
        // A regular file where the state directory should be makes every
        // save fail without faking the filesystem
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();

        let ctx = DeployContext::new(
            DeployConfig::default(),
            StorageLayout::new(blocked),
            Arc::new(NoInfra),
            Box::new(|_| unreachable!()),
            Box::new(|_| unreachable!()),
        )
        .with_silent_progress();

        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            step("one", true, false, false, &log),
            step("two", true, false, false, &log),
        ]);

        pipeline.run(&ctx, &CancelSignal::new()).await.unwrap();
        assert_eq!(log.lock().unwrap().as_slice(), ["exec:one", "exec:two"]);
    }

    #[tokio::test]
    async fn test_optional_failure_continues() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            step("one", true, false, false, &log),
            step("monitoring", false, false, true, &log),
            step("three", true, false, false, &log),
        ]);

        let ctx = context();
        let cancel = CancelSignal::new();
        pipeline.run(&ctx, &cancel).await.unwrap();

        let events = log.lock().unwrap().clone();
        assert_eq!(events, vec!["exec:one", "exec:monitoring", "exec:three"]);
    }

    #[tokio::test]
    async fn test_cancellation_before_step_triggers_rollback() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            step("one", true, true, false, &log),
            step("two", true, true, false, &log),
        ]);

        let ctx = context();
        let cancel = CancelSignal::new();
        cancel.cancel();

        let err = pipeline.run(&ctx, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(log.lock().unwrap().is_empty());
    }
}
