//! CLI command handlers.

use crate::reporter::{ConsoleReporter, JsonReporter};
use anyhow::Context;
use console::style;
use crosscheck_cache::FilesystemStore;
use crosscheck_core::Error;
use crosscheck_core::event::Event;
use crosscheck_core::ports::{CacheStore, StatusReporter};
use crosscheck_core::run::RunStatus;
use crosscheck_core::workflow::WorkflowConfig;
use crosscheck_runner::{BUILTIN_CAPABILITIES, JobRunner, RunnerConfig};
use crosscheck_scheduler::{MatrixExpander, Orchestrator, RunPolicy, TriggerEvaluator};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

const STARTER_WORKFLOW: &str = r#"name: verify
on:
  push:
    branches: [main]
  pull_request: {}
jobs:
  - name: build
    runs_on: [ubuntu-latest, windows-latest, macos-latest]
    toolchain:
      channel: stable
    cache:
      namespace: build
    steps:
      - name: checkout
        uses: checkout
      - name: install toolchain
        uses: toolchain
      - name: compile
        run: cargo check --workspace
  - name: fmt
    runs_on: ubuntu-latest
    toolchain:
      channel: stable
      components: [rustfmt]
    steps:
      - uses: checkout
      - uses: toolchain
      - run: cargo fmt --all -- --check
  - name: lint
    runs_on: ubuntu-latest
    toolchain:
      channel: stable
      components: [clippy]
    cache:
      namespace: lint
    steps:
      - uses: checkout
      - uses: toolchain
      - run: cargo clippy --workspace -- -D warnings
"#;

const DEFAULT_WORKFLOW_FILE: &str = "crosscheck.yaml";

/// Find the workflow file in standard locations.
pub fn find_workflow_file(path: Option<&str>) -> Option<PathBuf> {
    if let Some(p) = path {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
        return None;
    }

    let candidates = [
        "crosscheck.yaml",
        "crosscheck.yml",
        ".crosscheck.yaml",
        ".crosscheck/workflow.yaml",
    ];

    for candidate in candidates {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Some(path);
        }
    }

    None
}

/// Load and parse a workflow file.
pub fn load_workflow(path: &Path) -> anyhow::Result<WorkflowConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = WorkflowConfig::from_yaml(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(config)
}

fn discover_workflow(path: Option<&str>) -> anyhow::Result<WorkflowConfig> {
    let file = find_workflow_file(path)
        .with_context(|| match path {
            Some(p) => format!("workflow file not found: {}", p),
            None => "no workflow file found (expected crosscheck.yaml)".to_string(),
        })?;
    load_workflow(&file)
}

/// Build an event from CLI flags. Unrecognized kinds are the fail-safe path:
/// a warning and no run, rather than a guess.
fn parse_event(kind: &str, branch: Option<&str>) -> anyhow::Result<Option<Event>> {
    match Event::from_kind(kind, branch) {
        Ok(event) => Ok(Some(event)),
        Err(Error::UnrecognizedEvent(k)) => {
            println!(
                "{} unrecognized event kind {}, nothing to run",
                style("⚠").yellow(),
                style(&k).bold()
            );
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn default_cache_dir(cache_dir: Option<PathBuf>) -> PathBuf {
    cache_dir.unwrap_or_else(|| PathBuf::from(".crosscheck/cache"))
}

pub async fn init() -> anyhow::Result<ExitCode> {
    let path = Path::new(DEFAULT_WORKFLOW_FILE);
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    tokio::fs::write(path, STARTER_WORKFLOW).await?;
    println!("{} Wrote {}", style("✓").green().bold(), path.display());
    Ok(ExitCode::SUCCESS)
}

pub async fn validate(path: Option<&str>) -> anyhow::Result<ExitCode> {
    let config = discover_workflow(path)?;
    config.validate(BUILTIN_CAPABILITIES)?;
    println!(
        "{} Workflow {} is valid ({} jobs)",
        style("✓").green().bold(),
        style(&config.name).bold(),
        config.jobs.len()
    );
    Ok(ExitCode::SUCCESS)
}

pub async fn plan(
    config_path: Option<&str>,
    event_kind: &str,
    branch: Option<&str>,
) -> anyhow::Result<ExitCode> {
    let config = discover_workflow(config_path)?;
    config.validate(BUILTIN_CAPABILITIES)?;

    let Some(event) = parse_event(event_kind, branch)? else {
        return Ok(ExitCode::SUCCESS);
    };

    let evaluator = TriggerEvaluator::new();
    let specs = evaluator.applicable(&config, &event);
    if specs.is_empty() {
        println!(
            "{} does not match the trigger rules; no run would be launched",
            style(event.describe()).bold()
        );
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{} launches {} job(s):",
        style(event.describe()).bold(),
        specs.len()
    );
    let expander = MatrixExpander::new();
    for spec in specs {
        for instance in expander.expand(&config, spec) {
            println!(
                "  {} {} [{} steps]{}",
                style("▶").cyan(),
                instance.display_name,
                instance.steps.len(),
                match &instance.cache_key {
                    Some(key) => format!(" cache={}", key),
                    None => String::new(),
                }
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

pub async fn run(
    config_path: Option<&str>,
    event_kind: &str,
    branch: Option<&str>,
    fail_fast: bool,
    json: bool,
    cache_dir: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    let config = discover_workflow(config_path)?;
    config.validate(BUILTIN_CAPABILITIES)?;

    let Some(event) = parse_event(event_kind, branch)? else {
        return Ok(ExitCode::SUCCESS);
    };

    let cache: Arc<dyn CacheStore> =
        Arc::new(FilesystemStore::new(default_cache_dir(cache_dir)));
    let runner = Arc::new(JobRunner::new(cache, RunnerConfig::default()));
    let reporter: Arc<dyn StatusReporter> = if json {
        Arc::new(JsonReporter)
    } else {
        Arc::new(ConsoleReporter)
    };

    let orchestrator = Orchestrator::new(Arc::new(config), runner, reporter)
        .with_policy(RunPolicy { fail_fast });

    match orchestrator.handle_event(event).await? {
        None => {
            println!("event does not match the trigger rules; no run launched");
            Ok(ExitCode::SUCCESS)
        }
        Some(outcome) => Ok(match outcome.status {
            RunStatus::Success => ExitCode::SUCCESS,
            RunStatus::Failure | RunStatus::Cancelled => ExitCode::FAILURE,
        }),
    }
}

pub async fn list_cache(cache_dir: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let store = FilesystemStore::new(default_cache_dir(cache_dir));
    let entries = store.list(None).await?;
    if entries.is_empty() {
        println!("cache is empty");
        return Ok(ExitCode::SUCCESS);
    }
    for entry in entries {
        println!(
            "{}  {} bytes  {}",
            entry.key,
            entry.size_bytes,
            entry.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn clear_cache(
    prefix: Option<&str>,
    cache_dir: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    let store = FilesystemStore::new(default_cache_dir(cache_dir));
    let entries = store.list(prefix).await?;
    let count = entries.len();
    for entry in entries {
        store.delete(&entry.key).await?;
    }
    println!("cleared {} cache entr{}", count, if count == 1 { "y" } else { "ies" });
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosscheck_core::workflow::StepAction;

    #[test]
    fn test_starter_workflow_parses_and_validates() {
        let config = WorkflowConfig::from_yaml(STARTER_WORKFLOW).expect("starter parses");
        config
            .validate(BUILTIN_CAPABILITIES)
            .expect("starter validates");

        assert_eq!(config.jobs.len(), 3);
        let build = config.job("build").unwrap();
        assert_eq!(build.runs_on.values().len(), 3);
        assert!(matches!(
            build.steps[2].action,
            StepAction::Run { .. }
        ));
    }

    #[test]
    fn test_parse_event_fail_safe_on_unknown_kind() {
        let event = parse_event("schedule", None).expect("no hard error");
        assert!(event.is_none());
    }

    #[test]
    fn test_parse_event_push() {
        let event = parse_event("push", Some("main")).unwrap().unwrap();
        assert_eq!(
            event,
            Event::Push {
                branch: "main".to_string()
            }
        );
    }

    #[test]
    fn test_find_workflow_file_explicit_missing_path() {
        assert!(find_workflow_file(Some("/definitely/not/here.yaml")).is_none());
    }

    #[test]
    fn test_load_workflow_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflow.yaml");
        std::fs::write(&path, STARTER_WORKFLOW).unwrap();

        let found = find_workflow_file(path.to_str()).expect("explicit path found");
        assert_eq!(found, path);

        let config = load_workflow(&found).expect("loads");
        assert_eq!(config.name, "verify");
    }
}
