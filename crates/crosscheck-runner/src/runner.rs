//! The job runner: one instance in, one result out.

use crate::capability::{CapabilityContext, CapabilityRegistry};
use crate::environment::{Environment, HostEnvironment};
use crate::shell::{self, CommandStatus};
use crosscheck_core::interpolation::InterpolationContext;
use crosscheck_core::ports::CacheStore;
use crosscheck_core::run::{JobInstance, JobResult, JobStatus, StepReport, StepStatus};
use crosscheck_core::workflow::StepAction;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{info, warn};

/// Configuration for job execution.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Root under which each instance gets its own workspace.
    pub workspace_root: PathBuf,
    pub step_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir().join("crosscheck"),
            step_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Executes job instances: steps strictly sequential, first non-success
/// halts the remainder, no retry. Each call produces exactly one result.
pub struct JobRunner {
    cache: Arc<dyn CacheStore>,
    registry: CapabilityRegistry,
    config: RunnerConfig,
}

enum StepOutcome {
    Report(StepReport),
    Cancelled(StepReport),
}

impl JobRunner {
    pub fn new(cache: Arc<dyn CacheStore>, config: RunnerConfig) -> Self {
        Self {
            cache,
            registry: CapabilityRegistry::builtin(),
            config,
        }
    }

    /// Execute one instance to its terminal state. The instance is consumed:
    /// its result is the only thing that survives it.
    pub async fn execute(
        &self,
        instance: JobInstance,
        mut cancel: watch::Receiver<bool>,
    ) -> JobResult {
        let start = std::time::Instant::now();
        info!(
            job = %instance.display_name,
            os = %instance.environment.os,
            "Starting job instance"
        );

        let environment = HostEnvironment::for_instance(&self.config.workspace_root, &instance);
        if let Err(e) = environment.prepare().await {
            warn!(job = %instance.display_name, error = %e, "Environment provisioning failed");
            return self.provisioning_failure(instance, e.to_string(), start);
        }

        let interp = InterpolationContext {
            env: instance.env.clone(),
            matrix: instance.matrix.clone(),
        };

        let mut steps: Vec<StepReport> = Vec::new();
        let mut status = JobStatus::Success;
        let mut failed_step = None;
        let mut deferred_saves: Vec<String> = Vec::new();
        let mut provisioned_from_cache = false;

        for (index, step) in instance.steps.iter().enumerate() {
            let label = step.label();

            if *cancel.borrow() {
                info!(job = %instance.display_name, "Cancellation observed before step");
                status = JobStatus::Cancelled;
                steps.extend(
                    instance.steps[index..]
                        .iter()
                        .map(|s| StepReport::skipped(s.label())),
                );
                break;
            }

            let outcome = match &step.action {
                StepAction::Run { run } => {
                    self.run_command(&label, run, &interp, &environment, &mut cancel)
                        .await
                }
                StepAction::Uses { uses, with } => {
                    self.run_capability(
                        &label,
                        uses,
                        with,
                        &interp,
                        &instance,
                        &environment,
                        &mut provisioned_from_cache,
                        &mut deferred_saves,
                    )
                    .await
                }
            };

            match outcome {
                StepOutcome::Report(report) => {
                    let step_failed = report.status == StepStatus::Failure;
                    steps.push(report);
                    if step_failed {
                        failed_step = Some(label);
                        status = JobStatus::Failure;
                        steps.extend(
                            instance.steps[index + 1..]
                                .iter()
                                .map(|s| StepReport::skipped(s.label())),
                        );
                        break;
                    }
                }
                StepOutcome::Cancelled(report) => {
                    steps.push(report);
                    status = JobStatus::Cancelled;
                    steps.extend(
                        instance.steps[index + 1..]
                            .iter()
                            .map(|s| StepReport::skipped(s.label())),
                    );
                    break;
                }
            }
        }

        if status == JobStatus::Success {
            let payload = serde_json::to_vec(&instance.environment).unwrap_or_default();
            for key in deferred_saves {
                if let Err(e) = self.cache.save(&key, &payload).await {
                    warn!(key = %key, error = %e, "Deferred cache save failed");
                }
            }
        }

        if let Err(e) = environment.cleanup().await {
            warn!(job = %instance.display_name, error = %e, "Workspace cleanup failed");
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            job = %instance.display_name,
            status = ?status,
            duration_ms,
            "Job instance finished"
        );

        JobResult {
            instance_id: instance.id,
            job_name: instance.job_name,
            display_name: instance.display_name,
            index: instance.index,
            status,
            steps,
            failed_step,
            duration_ms,
        }
    }

    async fn run_command(
        &self,
        label: &str,
        command: &str,
        interp: &InterpolationContext,
        environment: &HostEnvironment,
        cancel: &mut watch::Receiver<bool>,
    ) -> StepOutcome {
        let command = interp.interpolate(command);
        let start = std::time::Instant::now();

        let result = shell::execute_command(
            &command,
            environment.working_dir(),
            &interp.env,
            self.config.step_timeout,
            cancel,
        )
        .await;

        match result {
            Ok(outcome) => {
                let report = match outcome.status {
                    CommandStatus::Exited(code) => StepReport {
                        name: label.to_string(),
                        status: if code == 0 {
                            StepStatus::Success
                        } else {
                            StepStatus::Failure
                        },
                        exit_code: Some(code),
                        output: outcome.output,
                        duration_ms: outcome.duration_ms,
                    },
                    CommandStatus::TimedOut => StepReport {
                        name: label.to_string(),
                        status: StepStatus::Failure,
                        exit_code: None,
                        output: {
                            let mut output = outcome.output;
                            output.push(format!(
                                "step timed out after {} seconds",
                                self.config.step_timeout.as_secs()
                            ));
                            output
                        },
                        duration_ms: outcome.duration_ms,
                    },
                    CommandStatus::Cancelled => {
                        return StepOutcome::Cancelled(StepReport {
                            name: label.to_string(),
                            status: StepStatus::Cancelled,
                            exit_code: None,
                            output: outcome.output,
                            duration_ms: outcome.duration_ms,
                        });
                    }
                };
                StepOutcome::Report(report)
            }
            Err(e) => StepOutcome::Report(StepReport {
                name: label.to_string(),
                status: StepStatus::Failure,
                exit_code: None,
                output: vec![e.to_string()],
                duration_ms: start.elapsed().as_millis() as u64,
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_capability(
        &self,
        label: &str,
        name: &str,
        params: &HashMap<String, String>,
        interp: &InterpolationContext,
        instance: &JobInstance,
        environment: &HostEnvironment,
        provisioned_from_cache: &mut bool,
        deferred_saves: &mut Vec<String>,
    ) -> StepOutcome {
        let start = std::time::Instant::now();

        let Some(capability) = self.registry.get(name) else {
            return StepOutcome::Report(StepReport {
                name: label.to_string(),
                status: StepStatus::Failure,
                exit_code: None,
                output: vec![format!("capability not found: {}", name)],
                duration_ms: 0,
            });
        };

        // Toolchain provisioning is where the advisory cache pays off: a hit
        // on the instance's key lets the capability skip redundant work.
        if name == "toolchain" && let Some(key) = &instance.cache_key {
            *provisioned_from_cache = match self.cache.restore(key).await {
                Ok(Some(_)) => true,
                Ok(None) => false,
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache restore failed, treating as miss");
                    false
                }
            };
            if !*provisioned_from_cache {
                deferred_saves.push(key.clone());
            }
        }

        let interpolated_params: HashMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.clone(), interp.interpolate(v)))
            .collect();

        let ctx = CapabilityContext {
            instance,
            workspace: environment.working_dir(),
            params: interpolated_params,
            cache: self.cache.as_ref(),
            provisioned_from_cache: *provisioned_from_cache,
        };

        let report = match capability.invoke(ctx).await {
            Ok(outcome) => {
                if let Some(key) = outcome.deferred_save {
                    deferred_saves.push(key);
                }
                let mut output = outcome.output;
                if let Some(detail) = outcome.detail {
                    output.push(detail);
                }
                StepReport {
                    name: label.to_string(),
                    status: if outcome.success {
                        StepStatus::Success
                    } else {
                        StepStatus::Failure
                    },
                    exit_code: None,
                    output,
                    duration_ms: start.elapsed().as_millis() as u64,
                }
            }
            Err(e) => StepReport {
                name: label.to_string(),
                status: StepStatus::Failure,
                exit_code: None,
                output: vec![e.to_string()],
                duration_ms: start.elapsed().as_millis() as u64,
            },
        };

        StepOutcome::Report(report)
    }

    /// A provisioning failure is a step failure for the owning instance: the
    /// synthetic provision step fails and every declared step is skipped.
    fn provisioning_failure(
        &self,
        instance: JobInstance,
        message: String,
        start: std::time::Instant,
    ) -> JobResult {
        let mut steps = vec![StepReport {
            name: "provision environment".to_string(),
            status: StepStatus::Failure,
            exit_code: None,
            output: vec![message],
            duration_ms: start.elapsed().as_millis() as u64,
        }];
        steps.extend(instance.steps.iter().map(|s| StepReport::skipped(s.label())));

        JobResult {
            instance_id: instance.id,
            job_name: instance.job_name,
            display_name: instance.display_name,
            index: instance.index,
            status: JobStatus::Failure,
            steps,
            failed_step: Some("provision environment".to_string()),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}
