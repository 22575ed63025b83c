//! Trigger matching and evaluation.

use crosscheck_core::event::Event;
use crosscheck_core::workflow::{JobSpec, WorkflowConfig};

/// Decides, from an incoming event, which jobs to launch.
///
/// Pure function of configuration and event: a push applies when its branch
/// matches the configured push filter, a pull request applies whenever the
/// rule is present, and event kinds with no configured rule produce the
/// empty set so no run is launched.
pub struct TriggerEvaluator;

impl TriggerEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Return the jobs applicable to an event. All or nothing: the job table
    /// is not filtered per job, only per trigger rule.
    pub fn applicable<'a>(&self, config: &'a WorkflowConfig, event: &Event) -> Vec<&'a JobSpec> {
        if self.matches(config, event) {
            config.jobs.iter().collect()
        } else {
            Vec::new()
        }
    }

    fn matches(&self, config: &WorkflowConfig, event: &Event) -> bool {
        match event {
            Event::Push { branch } => match &config.triggers.push {
                Some(rule) => self.branch_matches(&rule.branches, branch),
                None => false,
            },
            Event::PullRequest { .. } => config.triggers.pull_request.is_some(),
        }
    }

    fn branch_matches(&self, patterns: &[String], branch: &str) -> bool {
        if patterns.is_empty() {
            return true; // Match all branches if no patterns specified
        }
        patterns.iter().any(|p| self.glob_match(p, branch))
    }

    fn glob_match(&self, pattern: &str, text: &str) -> bool {
        if pattern == "*" || pattern == "**" {
            return true;
        }
        if let Some(prefix) = pattern.strip_suffix("/**") {
            return text.starts_with(prefix);
        }
        if let Some(prefix) = pattern.strip_suffix("/*") {
            let prefix_slash = format!("{}/", prefix);
            if text.starts_with(&prefix_slash) {
                return !text[prefix_slash.len()..].contains('/');
            }
            return false;
        }
        if pattern.contains('*') {
            let parts: Vec<&str> = pattern.split('*').collect();
            if parts.len() == 2 {
                return text.starts_with(parts[0]) && text.ends_with(parts[1]);
            }
        }
        pattern == text
    }
}

impl Default for TriggerEvaluator {
    fn default() -> Self {
        Self::new()
    }
}
