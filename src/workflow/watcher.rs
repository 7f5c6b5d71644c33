//! Waiting for a workflow to finish
//!
//! Polls the workflow at a fixed interval until a terminal phase is seen or
//! the deadline, measured from the start of the wait, passes.

use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::common::{Error, Result};

use super::client::WorkflowApi;
use super::types::{Phase, Workflow};

/// Default time between status fetches
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default number of back-to-back failed fetches tolerated during a wait
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// What a finished wait observed
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    /// The snapshot carrying the terminal phase
    pub workflow: Workflow,
    /// Distinct phases in the order they were first observed
    pub phases: Vec<Phase>,
    /// Number of status fetches issued, failed ones included
    pub polls: u32,
}

/// Blocks until a workflow reaches Succeeded, Failed or Error
#[derive(Debug, Clone)]
pub struct PollingWatcher {
    interval: Duration,
    max_consecutive_failures: u32,
}

impl Default for PollingWatcher {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl PollingWatcher {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }

    /// Give up after this many failed fetches in a row (values below 1 act as 1)
    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max.max(1);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `namespace/name` until it is terminal or `timeout` elapses
    pub async fn wait(
        &self,
        api: &dyn WorkflowApi,
        namespace: &str,
        name: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome> {
        let deadline = Instant::now() + timeout;
        let mut last_phase: Option<Phase> = None;
        let mut phases = Vec::new();
        let mut polls = 0u32;
        let mut failures = 0u32;

        while Instant::now() < deadline {
            polls += 1;
            match api.get(namespace, name).await {
                Ok(workflow) => {
                    failures = 0;
                    let phase = workflow.status.phase;
                    if last_phase != Some(phase) {
                        tracing::info!(workflow = %format!("{}/{}", namespace, name), "phase={}", phase);
                        phases.push(phase);
                        last_phase = Some(phase);
                    }
                    if phase.is_terminal() {
                        return Ok(WaitOutcome {
                            workflow,
                            phases,
                            polls,
                        });
                    }
                }
                Err(e) if e.is_transient() => {
                    failures += 1;
                    if failures >= self.max_consecutive_failures {
                        return Err(e);
                    }
                    tracing::warn!(
                        attempt = failures,
                        max = self.max_consecutive_failures,
                        "status fetch failed, retrying: {}",
                        e
                    );
                }
                Err(e) => return Err(e),
            }

            sleep(self.interval).await;
        }

        Err(Error::Timeout {
            namespace: namespace.to_string(),
            name: name.to_string(),
            timeout_secs: timeout.as_secs(),
            last_phase: last_phase.unwrap_or_default(),
        })
    }
}
