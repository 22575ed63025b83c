//! Run and execution types.

use crate::event::Event;
use crate::ids::{InstanceId, RunId};
use crate::workflow::{StepDefinition, ToolchainSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The isolated execution context one job instance is bound to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    /// Operating-system identifier, the expanded axis value.
    pub os: String,
    pub toolchain: Option<ToolchainSpec>,
}

/// One concrete execution of a job spec against one axis value.
///
/// Created by the matrix expander at run start; consumed exactly once by the
/// job runner, which records its result and releases its resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInstance {
    pub id: InstanceId,
    pub job_name: String,
    pub display_name: String,
    /// Position within the axis-value declaration order.
    pub index: usize,
    pub environment: EnvironmentDescriptor,
    /// Matrix variable bindings for interpolation, e.g. `os` -> axis value.
    pub matrix: HashMap<String, String>,
    /// Workflow-level environment variables.
    pub env: HashMap<String, String>,
    /// Derived cache key for provisioning artifacts, if caching is enabled.
    pub cache_key: Option<String>,
    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failure,
    Cancelled,
    Skipped,
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StepStatus::Success | StepStatus::Skipped)
    }
}

/// Outcome of a single step within a job instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    /// Captured output lines, stdout and stderr interleaved.
    pub output: Vec<String>,
    pub duration_ms: u64,
}

impl StepReport {
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Skipped,
            exit_code: None,
            output: Vec::new(),
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failure,
    Cancelled,
}

/// Terminal outcome of one job instance. Produced exactly once by the job
/// runner; read-only afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub instance_id: InstanceId,
    pub job_name: String,
    pub display_name: String,
    /// Position within the axis-value declaration order, for reporting.
    pub index: usize,
    pub status: JobStatus,
    pub steps: Vec<StepReport>,
    /// Name of the first failing step, when the status is failure.
    pub failed_step: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failure,
    Cancelled,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

/// Aggregate status of all job instances for one event.
///
/// The orchestrator is the sole writer; the status is failure iff at least
/// one instance failed, cancelled iff at least one instance was cancelled
/// and none failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub workflow: String,
    pub event: Event,
    pub status: RunStatus,
    pub jobs: Vec<JobResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunOutcome {
    /// Reduce a full set of job results to the aggregate run status.
    pub fn aggregate(
        run_id: RunId,
        workflow: impl Into<String>,
        event: Event,
        started_at: DateTime<Utc>,
        jobs: Vec<JobResult>,
    ) -> Self {
        let status = if jobs.iter().any(|j| j.status == JobStatus::Failure) {
            RunStatus::Failure
        } else if jobs.iter().any(|j| j.status == JobStatus::Cancelled) {
            RunStatus::Cancelled
        } else {
            RunStatus::Success
        };

        let completed_at = Utc::now();
        let duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;

        Self {
            run_id,
            workflow: workflow.into(),
            event,
            status,
            jobs,
            started_at,
            completed_at,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, status: JobStatus) -> JobResult {
        JobResult {
            instance_id: InstanceId::new(),
            job_name: name.to_string(),
            display_name: name.to_string(),
            index: 0,
            status,
            steps: vec![],
            failed_step: None,
            duration_ms: 0,
        }
    }

    fn outcome(jobs: Vec<JobResult>) -> RunOutcome {
        RunOutcome::aggregate(
            RunId::new(),
            "verify",
            Event::Push {
                branch: "main".to_string(),
            },
            Utc::now(),
            jobs,
        )
    }

    #[test]
    fn test_all_success_aggregates_success() {
        let run = outcome(vec![
            result("build", JobStatus::Success),
            result("lint", JobStatus::Success),
        ]);
        assert_eq!(run.status, RunStatus::Success);
    }

    #[test]
    fn test_single_failure_aggregates_failure() {
        let run = outcome(vec![
            result("build", JobStatus::Failure),
            result("fmt", JobStatus::Success),
            result("lint", JobStatus::Success),
        ]);
        assert_eq!(run.status, RunStatus::Failure);
    }

    #[test]
    fn test_cancelled_without_failure_aggregates_cancelled() {
        let run = outcome(vec![
            result("build", JobStatus::Cancelled),
            result("lint", JobStatus::Success),
        ]);
        assert_eq!(run.status, RunStatus::Cancelled);
    }

    #[test]
    fn test_failure_wins_over_cancelled() {
        let run = outcome(vec![
            result("build", JobStatus::Cancelled),
            result("lint", JobStatus::Failure),
        ]);
        assert_eq!(run.status, RunStatus::Failure);
    }
}
