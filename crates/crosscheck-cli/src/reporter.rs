//! Status-reporting adapters for the local runner.

use async_trait::async_trait;
use console::style;
use crosscheck_core::Result;
use crosscheck_core::ports::StatusReporter;
use crosscheck_core::run::{JobStatus, RunOutcome, RunStatus, StepStatus};

/// Prints a styled per-job report to the terminal.
pub struct ConsoleReporter;

#[async_trait]
impl StatusReporter for ConsoleReporter {
    async fn report(&self, outcome: &RunOutcome) -> Result<()> {
        println!();
        for job in &outcome.jobs {
            let marker = match job.status {
                JobStatus::Success => style("✓").green().bold(),
                JobStatus::Failure => style("✗").red().bold(),
                JobStatus::Cancelled => style("⊘").yellow().bold(),
            };
            println!(
                "{} {} ({:.2}s)",
                marker,
                style(&job.display_name).bold(),
                job.duration_ms as f64 / 1000.0
            );

            if job.status == JobStatus::Failure {
                for step in &job.steps {
                    if step.status == StepStatus::Failure {
                        match step.exit_code {
                            Some(code) => println!(
                                "    {} step {} failed with exit code {}",
                                style("✗").red(),
                                style(&step.name).bold(),
                                code
                            ),
                            None => println!(
                                "    {} step {} failed",
                                style("✗").red(),
                                style(&step.name).bold()
                            ),
                        }
                        for line in step.output.iter().rev().take(10).rev() {
                            println!("      {}", style(line).dim());
                        }
                    }
                }
            }
        }

        println!();
        let summary = match outcome.status {
            RunStatus::Success => style("Run passed").green().bold(),
            RunStatus::Failure => style("Run failed").red().bold(),
            RunStatus::Cancelled => style("Run cancelled").yellow().bold(),
        };
        println!(
            "{} — {} ({} jobs, {:.2}s)",
            summary,
            outcome.event.describe(),
            outcome.jobs.len(),
            outcome.duration_ms as f64 / 1000.0
        );

        Ok(())
    }
}

/// Emits the full outcome as JSON, for machine consumers.
pub struct JsonReporter;

#[async_trait]
impl StatusReporter for JsonReporter {
    async fn report(&self, outcome: &RunOutcome) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        Ok(())
    }
}
