//! Error types for the acceptance harness
//!
//! Every message is meant to be read after the fact, when the cluster may
//! no longer be inspectable, so variants carry the identifiers that were
//! tried and the alternatives that were available.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::workflow::Phase;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the acceptance harness
#[derive(Error, Debug)]
pub enum Error {
    // === Scenario Loading Errors ===
    #[error("{}: {message}", path.display())]
    Validation { path: PathBuf, message: String },

    #[error("Invalid duration '{0}': expected an integer optionally suffixed with ms, s, m or h")]
    DurationFormat(String),

    #[error("No *.yaml scenarios found in: {}", .0.display())]
    NoScenarios(PathBuf),

    #[error("Failed to read scenario '{}': {error}", path.display())]
    ScenarioRead { path: PathBuf, error: String },

    // === Remote API Errors ===
    #[error("Failed to submit workflow to namespace '{namespace}': {message}")]
    Submission { namespace: String, message: String },

    #[error("Failed to fetch {target}: {message}")]
    Fetch { target: String, message: String },

    #[error("Workflow {namespace}/{name} did not finish within {timeout_secs}s (last phase: {last_phase})")]
    Timeout {
        namespace: String,
        name: String,
        timeout_secs: u64,
        last_phase: Phase,
    },

    // === Node Resolution Errors ===
    #[error("Node '{display_name}' not found in workflow status.nodes. Available displayNames (sample): {available:?}")]
    NodeNotFound {
        display_name: String,
        available: Vec<String>,
    },

    #[error("Node '{display_name}' found, but podName not resolvable via children.\n  - {}", candidates.join("\n  - "))]
    PodUnresolved {
        display_name: String,
        candidates: Vec<String>,
    },

    // === Assertion Errors ===
    #[error("{0}")]
    Expectation(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a validation error for a scenario file
    pub fn validation(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a submission error
    pub fn submission(namespace: &str, message: impl Into<String>) -> Self {
        Self::Submission {
            namespace: namespace.to_string(),
            message: message.into(),
        }
    }

    /// Create a fetch error for a remote object such as `workflow argo/hello-x7k2p`
    pub fn fetch(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Whether this error is remote-API noise rather than a workflow outcome
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Fetch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_target_and_phase() {
        let err = Error::Timeout {
            namespace: "argo".to_string(),
            name: "hello-abc12".to_string(),
            timeout_secs: 60,
            last_phase: Phase::Running,
        };
        let msg = err.to_string();
        assert!(msg.contains("argo/hello-abc12"));
        assert!(msg.contains("60s"));
        assert!(msg.contains("Running"));
    }

    #[test]
    fn test_pod_unresolved_lists_each_candidate() {
        let err = Error::PodUnresolved {
            display_name: "step1".to_string(),
            candidates: vec!["id=a type=Steps".to_string(), "id=b type=Retry".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("  - id=a type=Steps"));
        assert!(msg.contains("  - id=b type=Retry"));
    }

    #[test]
    fn test_only_fetch_errors_are_transient() {
        assert!(Error::fetch("workflow argo/x", "connection reset").is_transient());
        assert!(!Error::submission("argo", "forbidden").is_transient());
        assert!(!Error::Expectation("boom".to_string()).is_transient());
    }
}
