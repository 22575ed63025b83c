//! Run orchestration: event in, one reported outcome out.

use crate::matrix::MatrixExpander;
use crate::triggers::TriggerEvaluator;
use crosscheck_core::event::Event;
use crosscheck_core::ids::RunId;
use crosscheck_core::ports::StatusReporter;
use crosscheck_core::run::{JobResult, JobStatus, RunOutcome};
use crosscheck_core::workflow::WorkflowConfig;
use crosscheck_core::{Error, Result};
use crosscheck_runner::JobRunner;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn};

/// Policies the source configuration leaves open.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunPolicy {
    /// Cancel still-running siblings after the first failure. Off by
    /// default: every job's result is observed and reported.
    pub fail_fast: bool,
}

/// The top-level coordinator.
///
/// Consumes trigger-evaluator output, invokes the matrix expander, schedules
/// job instances with full fan-out, aggregates results, and surfaces the
/// aggregate through the reporting port exactly once per launched run.
pub struct Orchestrator {
    config: Arc<WorkflowConfig>,
    runner: Arc<JobRunner>,
    reporter: Arc<dyn StatusReporter>,
    evaluator: TriggerEvaluator,
    expander: MatrixExpander,
    policy: RunPolicy,
}

/// A launched run that can be superseded.
pub struct RunHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<Result<Option<RunOutcome>>>,
}

impl RunHandle {
    /// Request cancellation of all in-flight instances. Cancelled instances
    /// aggregate as cancelled, not failure.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Await the run's terminal outcome.
    pub async fn outcome(self) -> Result<Option<RunOutcome>> {
        self.task
            .await
            .map_err(|e| Error::Internal(format!("run task failed: {}", e)))?
    }
}

impl Orchestrator {
    pub fn new(
        config: Arc<WorkflowConfig>,
        runner: Arc<JobRunner>,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            config,
            runner,
            reporter,
            evaluator: TriggerEvaluator::new(),
            expander: MatrixExpander::new(),
            policy: RunPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RunPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Evaluate an event and, when applicable, drive the run to completion.
    /// Returns `None` when the event launches nothing; the reporter is only
    /// invoked for launched runs.
    pub async fn handle_event(&self, event: Event) -> Result<Option<RunOutcome>> {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.run(event, cancel_tx, cancel_rx).await
    }

    /// Launch a run in the background, returning a handle a host can use to
    /// cancel it when a superseding event arrives.
    pub fn launch(self: &Arc<Self>, event: Event) -> RunHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let orchestrator = Arc::clone(self);
        let tx = cancel_tx.clone();
        let task = tokio::spawn(async move { orchestrator.run(event, tx, cancel_rx).await });
        RunHandle {
            cancel: cancel_tx,
            task,
        }
    }

    async fn run(
        &self,
        event: Event,
        cancel_tx: watch::Sender<bool>,
        cancel_rx: watch::Receiver<bool>,
    ) -> Result<Option<RunOutcome>> {
        let specs = self.evaluator.applicable(&self.config, &event);
        if specs.is_empty() {
            info!(event = %event.describe(), "No applicable jobs, run not launched");
            return Ok(None);
        }

        let run_id = RunId::new();
        let started_at = chrono::Utc::now();

        let mut instances = Vec::new();
        for spec in specs {
            instances.extend(self.expander.expand(&self.config, spec));
        }

        info!(
            run_id = %run_id,
            event = %event.describe(),
            instances = instances.len(),
            "Launching run"
        );

        // Full fan-out: one task per instance, no ordering between them and
        // no shared mutable state. Aggregation below is the barrier.
        let mut join_set = JoinSet::new();
        for instance in instances {
            let runner = Arc::clone(&self.runner);
            let cancel = cancel_rx.clone();
            join_set.spawn(async move { runner.execute(instance, cancel).await });
        }

        let mut results: Vec<JobResult> = Vec::new();
        let mut fail_fast_sent = false;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => {
                    if self.policy.fail_fast
                        && !fail_fast_sent
                        && result.status == JobStatus::Failure
                    {
                        warn!(
                            run_id = %run_id,
                            job = %result.display_name,
                            "Job failed, cancelling remaining instances"
                        );
                        let _ = cancel_tx.send(true);
                        fail_fast_sent = true;
                    }
                    results.push(result);
                }
                Err(e) => {
                    return Err(Error::Internal(format!("job instance task failed: {}", e)));
                }
            }
        }

        // Instances complete in any order; reporting follows declaration
        // order (job table order, then axis order).
        let job_order: HashMap<&str, usize> = self
            .config
            .jobs
            .iter()
            .enumerate()
            .map(|(i, j)| (j.name.as_str(), i))
            .collect();
        results.sort_by_key(|r| {
            (
                job_order.get(r.job_name.as_str()).copied().unwrap_or(usize::MAX),
                r.index,
            )
        });

        let outcome = RunOutcome::aggregate(
            run_id,
            self.config.name.clone(),
            event,
            started_at,
            results,
        );

        info!(run_id = %run_id, status = ?outcome.status, "Run completed");
        self.reporter.report(&outcome).await?;

        Ok(Some(outcome))
    }
}
