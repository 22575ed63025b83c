//! Matrix expansion: job specs into concrete job instances.

use crosscheck_cache::keys;
use crosscheck_core::ids::InstanceId;
use crosscheck_core::run::{EnvironmentDescriptor, JobInstance};
use crosscheck_core::workflow::{JobSpec, WorkflowConfig};
use std::collections::HashMap;

/// Expands a job spec over its target-environment axis.
///
/// Expansion is deterministic and order-preserving: one instance per axis
/// value in declaration order, each bound to a distinct environment
/// descriptor and its own cache key. A scalar axis yields exactly one
/// instance.
pub struct MatrixExpander;

impl MatrixExpander {
    pub fn new() -> Self {
        Self
    }

    pub fn expand(&self, config: &WorkflowConfig, spec: &JobSpec) -> Vec<JobInstance> {
        let matrix_job = spec.is_matrix();

        spec.runs_on
            .values()
            .iter()
            .enumerate()
            .map(|(index, os)| {
                let display_name = if matrix_job {
                    format!("{} (os={})", spec.name, os)
                } else {
                    spec.name.clone()
                };

                let cache_key = spec
                    .cache
                    .as_ref()
                    .map(|_| keys::instance_key(spec, os))
                    .or_else(|| {
                        // Toolchain provisioning is cacheable even without
                        // explicit settings; the default key is job + os.
                        spec.toolchain
                            .as_ref()
                            .map(|_| keys::instance_key(spec, os))
                    });

                JobInstance {
                    id: InstanceId::new(),
                    job_name: spec.name.clone(),
                    display_name,
                    index,
                    environment: EnvironmentDescriptor {
                        os: os.clone(),
                        toolchain: spec.toolchain.clone(),
                    },
                    matrix: HashMap::from([("os".to_string(), os.clone())]),
                    env: config.env.clone(),
                    cache_key,
                    steps: spec.steps.clone(),
                }
            })
            .collect()
    }
}

impl Default for MatrixExpander {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosscheck_core::workflow::{Axis, CacheSettings, StepAction, StepDefinition};

    fn step() -> StepDefinition {
        StepDefinition {
            name: None,
            action: StepAction::Run {
                run: "cargo check".to_string(),
            },
        }
    }

    fn workflow(jobs: Vec<JobSpec>) -> WorkflowConfig {
        WorkflowConfig {
            name: "verify".to_string(),
            triggers: Default::default(),
            env: HashMap::from([("CARGO_TERM_COLOR".to_string(), "always".to_string())]),
            jobs,
        }
    }

    #[test]
    fn test_matrix_axis_yields_one_instance_per_value() {
        let spec = JobSpec {
            name: "build".to_string(),
            runs_on: Axis::Many(vec![
                "ubuntu-latest".to_string(),
                "windows-latest".to_string(),
                "macos-latest".to_string(),
            ]),
            toolchain: None,
            cache: None,
            steps: vec![step()],
        };
        let config = workflow(vec![spec.clone()]);

        let instances = MatrixExpander::new().expand(&config, &spec);

        assert_eq!(instances.len(), 3);
        let os_values: Vec<&str> = instances
            .iter()
            .map(|i| i.environment.os.as_str())
            .collect();
        assert_eq!(os_values, ["ubuntu-latest", "windows-latest", "macos-latest"]);
        assert_eq!(instances[1].index, 1);
        assert_eq!(instances[1].display_name, "build (os=windows-latest)");
        assert_eq!(instances[1].matrix.get("os").unwrap(), "windows-latest");
    }

    #[test]
    fn test_scalar_axis_yields_single_instance() {
        let spec = JobSpec {
            name: "lint".to_string(),
            runs_on: Axis::One("ubuntu-latest".to_string()),
            toolchain: None,
            cache: None,
            steps: vec![step()],
        };
        let config = workflow(vec![spec.clone()]);

        let instances = MatrixExpander::new().expand(&config, &spec);

        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].display_name, "lint");
        assert!(instances[0].cache_key.is_none());
    }

    #[test]
    fn test_instances_inherit_steps_and_env() {
        let spec = JobSpec {
            name: "build".to_string(),
            runs_on: Axis::Many(vec!["a".to_string(), "b".to_string()]),
            toolchain: None,
            cache: None,
            steps: vec![step(), step()],
        };
        let config = workflow(vec![spec.clone()]);

        let instances = MatrixExpander::new().expand(&config, &spec);

        for instance in &instances {
            assert_eq!(instance.steps.len(), 2);
            assert_eq!(instance.env.get("CARGO_TERM_COLOR").unwrap(), "always");
        }
        assert_ne!(instances[0].id, instances[1].id);
    }

    #[test]
    fn test_cache_namespace_keeps_jobs_apart() {
        let mut spec = JobSpec {
            name: "lint".to_string(),
            runs_on: Axis::One("ubuntu-latest".to_string()),
            toolchain: None,
            cache: Some(CacheSettings {
                namespace: Some("lint".to_string()),
                lockfiles: vec![],
            }),
            steps: vec![step()],
        };
        let config = workflow(vec![spec.clone()]);

        let lint_key = MatrixExpander::new().expand(&config, &spec)[0]
            .cache_key
            .clone()
            .unwrap();

        spec.name = "build".to_string();
        spec.cache = Some(CacheSettings::default());
        let build_key = MatrixExpander::new().expand(&config, &spec)[0]
            .cache_key
            .clone()
            .unwrap();

        assert_eq!(lint_key, "lint-ubuntu-latest");
        assert_eq!(build_key, "build-ubuntu-latest");
        assert_ne!(lint_key, build_key);
    }
}
