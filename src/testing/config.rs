//! Test scenario configuration types
//!
//! `*Document` types mirror the YAML layout and are only used while loading;
//! the loader validates them into the immutable model types below.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::workflow::{Phase, WorkflowManifest};

use super::duration::DurationValue;

/// Namespace used when a scenario does not name one
pub const DEFAULT_NAMESPACE: &str = "argo";

/// Timeout used when a scenario does not set one
pub const DEFAULT_TIMEOUT: &str = "10m";

/// A validated test scenario
#[derive(Debug, Clone)]
pub struct TestScenario {
    /// File the scenario was loaded from
    pub path: PathBuf,
    pub name: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub timeout_secs: u64,
    pub namespace: String,
    pub expect: ExpectationSpec,
    pub source: WorkflowSource,
}

impl TestScenario {
    /// File name of the scenario, for progress output
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Where the workflow to submit comes from
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowSource {
    /// Manifest embedded in the scenario file
    Inline(WorkflowManifest),
    /// Manifest file, already resolved against the scenario's directory
    File(PathBuf),
}

/// Declared expectations about the finished workflow
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpectationSpec {
    pub workflow_phase: Option<Phase>,
    pub max_duration_secs: Option<u64>,
    pub nodes: Vec<NodeExpectation>,
}

/// Expectations about the step(s) carrying one display name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeExpectation {
    pub display_name: String,
    pub phase: Option<Phase>,
    /// Substrings that must all appear in the step's pod logs
    pub logs_contain: Vec<String>,
}

/// A scenario file as written
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDocument {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub timeout: Option<DurationValue>,
    pub namespace: Option<String>,
    /// Inline manifest
    pub workflow: Option<serde_yaml::Value>,
    /// Manifest path relative to the scenario file
    pub workflow_file: Option<PathBuf>,
    pub expect: Option<ExpectDocument>,
}

/// The `expect` block
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExpectDocument {
    pub workflow_phase: Option<String>,
    pub max_duration: Option<DurationValue>,
    pub nodes: Option<Vec<NodeExpectDocument>>,
}

/// One entry of `expect.nodes`
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodeExpectDocument {
    pub selector: Option<SelectorDocument>,
    /// Legacy spelling of `selector.displayName`
    pub display_name: Option<String>,
    pub phase: Option<String>,
    pub logs: Option<LogsDocument>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SelectorDocument {
    pub display_name: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct LogsDocument {
    pub contains: Option<Vec<String>>,
}
