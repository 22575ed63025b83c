//! Workflow definition types.
//!
//! These types represent the user-authored workflow YAML configuration: the
//! trigger rules plus the table of named verification jobs. The configuration
//! is loaded once per run and threaded through the trigger evaluator, matrix
//! expander, and orchestrator unchanged.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub name: String,
    #[serde(rename = "on", default)]
    pub triggers: TriggerRules,
    /// Workflow-level environment variables, inherited by every job instance.
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub jobs: Vec<JobSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerRules {
    #[serde(default)]
    pub push: Option<PushRule>,
    #[serde(default)]
    pub pull_request: Option<PullRequestRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushRule {
    #[serde(default)]
    pub branches: Vec<String>,
}

/// Pull request runs apply regardless of target branch, so the rule carries
/// no filters; its presence alone enables the trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullRequestRule {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    /// Target-environment axis: a single value or a matrix of values.
    pub runs_on: Axis,
    #[serde(default)]
    pub toolchain: Option<ToolchainSpec>,
    #[serde(default)]
    pub cache: Option<CacheSettings>,
    pub steps: Vec<StepDefinition>,
}

impl JobSpec {
    pub fn is_matrix(&self) -> bool {
        self.runs_on.values().len() > 1
    }
}

/// A scalar-or-list axis of target environments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Axis {
    One(String),
    Many(Vec<String>),
}

impl Axis {
    pub fn values(&self) -> &[String] {
        match self {
            Axis::One(value) => std::slice::from_ref(value),
            Axis::Many(values) => values,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainSpec {
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default)]
    pub components: Vec<String>,
}

fn default_channel() -> String {
    "stable".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Namespace prepended to the derived key, so jobs with different
    /// provisioning needs never share entries. Defaults to the job name.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Lockfiles folded into the key fingerprint; missing files are skipped.
    #[serde(default)]
    pub lockfiles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub action: StepAction,
}

/// A step either invokes a named external capability with parameters or runs
/// a shell command. The two cases are dispatched through a single execute
/// seam in the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepAction {
    Uses {
        uses: String,
        #[serde(default)]
        with: HashMap<String, String>,
    },
    Run {
        run: String,
    },
}

impl StepDefinition {
    /// Display label: the explicit name, else the capability or command.
    pub fn label(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match &self.action {
            StepAction::Uses { uses, .. } => uses.clone(),
            StepAction::Run { run } => run.lines().next().unwrap_or(run).to_string(),
        }
    }
}

impl WorkflowConfig {
    /// Parse a workflow document from YAML.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: WorkflowConfig =
            serde_yaml::from_str(content).map_err(|e| Error::InvalidWorkflow(e.to_string()))?;
        Ok(config)
    }

    pub fn job(&self, name: &str) -> Option<&JobSpec> {
        self.jobs.iter().find(|j| j.name == name)
    }

    /// Validate the configuration before any run starts.
    ///
    /// `capabilities` is the set of capability names the runner can dispatch;
    /// a `uses` step naming anything else is a configuration error.
    pub fn validate(&self, capabilities: &[&str]) -> Result<()> {
        if self.jobs.is_empty() {
            return Err(Error::WorkflowValidation(
                "workflow defines no jobs".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if !seen.insert(job.name.as_str()) {
                return Err(Error::WorkflowValidation(format!(
                    "duplicate job name: {}",
                    job.name
                )));
            }

            let values = job.runs_on.values();
            if values.is_empty() {
                return Err(Error::WorkflowValidation(format!(
                    "job {} has an empty runs_on axis",
                    job.name
                )));
            }
            let mut axis_seen = HashSet::new();
            for value in values {
                if value.trim().is_empty() {
                    return Err(Error::WorkflowValidation(format!(
                        "job {} has a blank runs_on value",
                        job.name
                    )));
                }
                if !axis_seen.insert(value.as_str()) {
                    return Err(Error::WorkflowValidation(format!(
                        "job {} repeats runs_on value {}",
                        job.name, value
                    )));
                }
            }

            if job.steps.is_empty() {
                return Err(Error::WorkflowValidation(format!(
                    "job {} has no steps",
                    job.name
                )));
            }

            for step in &job.steps {
                if let StepAction::Uses { uses, .. } = &step.action
                    && !capabilities.contains(&uses.as_str())
                {
                    return Err(Error::WorkflowValidation(format!(
                        "job {} step {} uses unknown capability {}",
                        job.name,
                        step.label(),
                        uses
                    )));
                }
            }

            if let Some(cache) = &job.cache {
                for lockfile in &cache.lockfiles {
                    if std::path::Path::new(lockfile).is_absolute() {
                        return Err(Error::WorkflowValidation(format!(
                            "job {} cache lockfile must be a relative path: {}",
                            job.name, lockfile
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPS: &[&str] = &["checkout", "toolchain", "cache"];

    fn minimal(jobs: &str) -> String {
        format!(
            "name: verify\non:\n  push:\n    branches: [main]\njobs:\n{}",
            jobs
        )
    }

    #[test]
    fn test_validate_rejects_empty_jobs() {
        let config = WorkflowConfig {
            name: "verify".to_string(),
            triggers: TriggerRules::default(),
            env: HashMap::new(),
            jobs: vec![],
        };
        assert!(matches!(
            config.validate(CAPS),
            Err(Error::WorkflowValidation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_job_names() {
        let yaml = minimal(
            "  - name: build\n    runs_on: linux\n    steps:\n      - run: \"true\"\n  - name: build\n    runs_on: linux\n    steps:\n      - run: \"true\"\n",
        );
        let config = WorkflowConfig::from_yaml(&yaml).unwrap();
        let err = config.validate(CAPS).unwrap_err();
        assert!(err.to_string().contains("duplicate job name"));
    }

    #[test]
    fn test_validate_rejects_unknown_capability() {
        let yaml = minimal(
            "  - name: build\n    runs_on: linux\n    steps:\n      - uses: teleport\n",
        );
        let config = WorkflowConfig::from_yaml(&yaml).unwrap();
        let err = config.validate(CAPS).unwrap_err();
        assert!(err.to_string().contains("unknown capability teleport"));
    }

    #[test]
    fn test_validate_rejects_repeated_axis_value() {
        let yaml = minimal(
            "  - name: build\n    runs_on: [linux, linux]\n    steps:\n      - run: \"true\"\n",
        );
        let config = WorkflowConfig::from_yaml(&yaml).unwrap();
        assert!(config.validate(CAPS).is_err());
    }
}
