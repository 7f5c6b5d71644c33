//! Test runner implementation
//!
//! Runs scenarios one after another: submit the manifest, wait for a
//! terminal phase, evaluate expectations. A scenario's failure is captured
//! in its result and never stops the scenarios after it.

use std::time::{Duration, Instant};

use colored::Colorize;

use crate::common::Result;
use crate::workflow::{NodeTreeResolver, PodApi, PollingWatcher, WorkflowApi};

use super::config::TestScenario;
use super::evaluator::ExpectationEvaluator;
use super::loader::load_manifest;

/// Result of one scenario
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub name: String,
    /// Scenario file name
    pub file: String,
    pub passed: bool,
    /// Failure message, verbatim from the error that ended the scenario
    pub error: Option<String>,
    /// Name the server gave the submitted workflow, if submission got that far
    pub workflow_name: Option<String>,
    pub duration: Duration,
}

/// Aggregated results of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub results: Vec<ScenarioResult>,
    pub duration: Duration,
}

impl RunSummary {
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// True when at least one scenario ran and none failed
    pub fn all_passed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| r.passed)
    }

    pub fn failures(&self) -> Vec<&ScenarioResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }
}

/// Drives scenarios against a cluster
pub struct ScenarioRunner<'a> {
    workflows: &'a dyn WorkflowApi,
    pods: &'a dyn PodApi,
    watcher: PollingWatcher,
    resolver: NodeTreeResolver,
    cleanup: bool,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(workflows: &'a dyn WorkflowApi, pods: &'a dyn PodApi) -> Self {
        Self {
            workflows,
            pods,
            watcher: PollingWatcher::default(),
            resolver: NodeTreeResolver::default(),
            cleanup: false,
        }
    }

    pub fn with_watcher(mut self, watcher: PollingWatcher) -> Self {
        self.watcher = watcher;
        self
    }

    pub fn with_resolver(mut self, resolver: NodeTreeResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Delete each submitted workflow once its result is known
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Run scenarios sequentially, in order
    pub async fn run_all(&self, scenarios: &[TestScenario]) -> RunSummary {
        let start = Instant::now();
        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            results.push(self.run_scenario(scenario).await);
        }
        RunSummary {
            results,
            duration: start.elapsed(),
        }
    }

    /// Run one scenario; never fails, errors become a failed result
    pub async fn run_scenario(&self, scenario: &TestScenario) -> ScenarioResult {
        let start = Instant::now();

        println!("\n{} {}", "=== RUN:".blue().bold(), scenario.name.white().bold());
        println!("  file: {}", scenario.file_name().dimmed());
        if !scenario.description.is_empty() {
            println!("  {}", scenario.description.dimmed());
        }
        let tags: Vec<&str> = scenario.tags.iter().map(String::as_str).collect();
        println!(
            "  tags={:?} ns={} timeout={}s",
            tags, scenario.namespace, scenario.timeout_secs
        );

        let mut submitted = None;
        let outcome = self.execute(scenario, &mut submitted).await;

        if self.cleanup {
            if let Some(name) = &submitted {
                match self.workflows.delete(&scenario.namespace, name).await {
                    Ok(()) => tracing::debug!(workflow = %name, "deleted"),
                    Err(e) => tracing::warn!(workflow = %name, "cleanup failed: {}", e),
                }
            }
        }

        let wf = submitted.as_deref().unwrap_or("-");
        match &outcome {
            Ok(()) => println!(
                "{} {} (wf={})",
                "✓ PASSED:".green().bold(),
                scenario.file_name(),
                wf
            ),
            Err(e) => println!("{} {}: {}", "✗ FAILED:".red().bold(), scenario.file_name(), e),
        }

        ScenarioResult {
            name: scenario.name.clone(),
            file: scenario.file_name(),
            passed: outcome.is_ok(),
            error: outcome.err().map(|e| e.to_string()),
            workflow_name: submitted,
            duration: start.elapsed(),
        }
    }

    async fn execute(&self, scenario: &TestScenario, submitted: &mut Option<String>) -> Result<()> {
        let manifest = load_manifest(scenario)?;
        let name = self.workflows.submit(&scenario.namespace, &manifest).await?;
        println!("  submitted: {}/{}", scenario.namespace, name);
        tracing::debug!(namespace = %scenario.namespace, workflow = %name, "submitted");
        *submitted = Some(name.clone());

        let waited = self
            .watcher
            .wait(
                self.workflows,
                &scenario.namespace,
                &name,
                Duration::from_secs(scenario.timeout_secs),
            )
            .await?;

        let mut workflow = waited.workflow;
        if workflow.metadata.namespace.is_empty() {
            workflow.metadata.namespace = scenario.namespace.clone();
        }
        if workflow.metadata.name.is_empty() {
            workflow.metadata.name = name;
        }
        println!("  finished: phase={}", workflow.status.phase);

        ExpectationEvaluator::new(self.pods, &self.resolver)
            .evaluate(&workflow, &scenario.expect)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(passed: bool) -> ScenarioResult {
        ScenarioResult {
            name: "s".to_string(),
            file: "s.yaml".to_string(),
            passed,
            error: (!passed).then(|| "boom".to_string()),
            workflow_name: None,
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary {
            results: vec![result(true), result(false), result(true)],
            duration: Duration::ZERO,
        };
        assert_eq!(summary.passed_count(), 2);
        assert_eq!(summary.failed_count(), 1);
        assert!(!summary.all_passed());
        assert_eq!(summary.failures().len(), 1);
    }

    #[test]
    fn test_empty_run_is_not_a_pass() {
        assert!(!RunSummary::default().all_passed());
    }
}
