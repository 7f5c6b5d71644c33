//! Scenario discovery and validation
//!
//! A directory is loaded all-or-nothing: one malformed scenario aborts the
//! whole load with an error naming its file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::common::{Error, Result};
use crate::workflow::{Phase, WorkflowManifest};

use super::config::{
    ExpectDocument, ExpectationSpec, NodeExpectation, ScenarioDocument, TestScenario,
    WorkflowSource, DEFAULT_NAMESPACE, DEFAULT_TIMEOUT,
};
use super::duration::DurationValue;

/// Load every `*.yaml`/`*.yml` scenario in `dir`, ordered by file name
pub fn load_scenarios(dir: &Path) -> Result<Vec<TestScenario>> {
    let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Error::NoScenarios(dir)),
        Err(e) => {
            return Err(Error::ScenarioRead {
                path: dir,
                error: e.to_string(),
            })
        }
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if paths.is_empty() {
        return Err(Error::NoScenarios(dir));
    }

    paths.iter().map(|path| load_scenario_file(path)).collect()
}

/// Load and validate a single scenario file
pub fn load_scenario_file(path: &Path) -> Result<TestScenario> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::ScenarioRead {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    if content.trim().is_empty() {
        return Err(Error::validation(path, "scenario file is empty"));
    }
    let document: ScenarioDocument = serde_yaml::from_str(&content)
        .map_err(|e| Error::validation(path, format!("invalid scenario: {}", e)))?;
    validate(path, document)
}

/// Turn a parsed document into a scenario, enforcing every rule
pub fn validate(path: &Path, document: ScenarioDocument) -> Result<TestScenario> {
    let name = match document.name {
        Some(name) if !name.trim().is_empty() => name,
        _ => return Err(Error::validation(path, "missing required field 'name'")),
    };

    let workflow_file = document.workflow_file.filter(|file| !file.as_os_str().is_empty());
    let source = match (document.workflow, workflow_file) {
        (Some(inline), None) => {
            let json = serde_json::to_value(inline).map_err(|e| {
                Error::validation(path, format!("inline workflow is not a JSON-compatible document: {}", e))
            })?;
            WorkflowSource::Inline(WorkflowManifest::new(json))
        }
        (None, Some(file)) => {
            let base = path.parent().unwrap_or(Path::new("."));
            WorkflowSource::File(base.join(file))
        }
        _ => return Err(Error::validation(path, "define exactly one of workflow OR workflowFile")),
    };

    let timeout = document
        .timeout
        .unwrap_or_else(|| DurationValue::Text(DEFAULT_TIMEOUT.to_string()));
    let timeout_secs = timeout
        .to_secs()
        .map_err(|e| Error::validation(path, format!("timeout: {}", e)))?;

    Ok(TestScenario {
        path: path.to_path_buf(),
        name,
        description: document.description.unwrap_or_default(),
        tags: document.tags.unwrap_or_default().into_iter().collect(),
        timeout_secs,
        namespace: document
            .namespace
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        expect: validate_expect(path, document.expect.unwrap_or_default())?,
        source,
    })
}

fn parse_phase(path: &Path, field: &str, value: Option<String>) -> Result<Option<Phase>> {
    match value {
        Some(text) if !text.is_empty() => text
            .parse()
            .map(Some)
            .map_err(|e| Error::validation(path, format!("{}: {}", field, e))),
        _ => Ok(None),
    }
}

fn validate_expect(path: &Path, expect: ExpectDocument) -> Result<ExpectationSpec> {
    let workflow_phase = parse_phase(path, "expect.workflowPhase", expect.workflow_phase)?;

    let max_duration_secs = match expect.max_duration {
        Some(DurationValue::Text(text)) if text.is_empty() => None,
        Some(value) => Some(
            value
                .to_secs()
                .map_err(|e| Error::validation(path, format!("expect.maxDuration: {}", e)))?,
        ),
        None => None,
    };

    let mut nodes = Vec::new();
    for (i, node) in expect.nodes.unwrap_or_default().into_iter().enumerate() {
        let display_name = node
            .selector
            .and_then(|s| s.display_name)
            .or(node.display_name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                Error::validation(
                    path,
                    format!("expect.nodes[{}] missing displayName (use nodes[].selector.displayName)", i),
                )
            })?;
        let phase = parse_phase(path, &format!("expect.nodes[{}].phase", i), node.phase)?;
        let logs_contain = node.logs.and_then(|l| l.contains).unwrap_or_default();
        nodes.push(NodeExpectation {
            display_name,
            phase,
            logs_contain,
        });
    }

    Ok(ExpectationSpec {
        workflow_phase,
        max_duration_secs,
        nodes,
    })
}

/// The manifest to submit for a scenario, reading the file if needed
pub fn load_manifest(scenario: &TestScenario) -> Result<WorkflowManifest> {
    match &scenario.source {
        WorkflowSource::Inline(manifest) => Ok(manifest.clone()),
        WorkflowSource::File(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
            let document: serde_yaml::Value = serde_yaml::from_str(&content)?;
            Ok(WorkflowManifest::new(serde_json::to_value(document)?))
        }
    }
}

/// Keep scenarios carrying every tag in `tags` and whose name contains
/// `name`; both comparisons ignore case
pub fn filter_scenarios(scenarios: Vec<TestScenario>, tags: &[String], name: Option<&str>) -> Vec<TestScenario> {
    let wanted: BTreeSet<String> = tags.iter().map(|t| t.to_lowercase()).collect();
    let needle = name.map(str::to_lowercase);

    scenarios
        .into_iter()
        .filter(|s| match &needle {
            Some(needle) => s.name.to_lowercase().contains(needle.as_str()),
            None => true,
        })
        .filter(|s| {
            let have: BTreeSet<String> = s.tags.iter().map(|t| t.to_lowercase()).collect();
            wanted.is_subset(&have)
        })
        .collect()
}
