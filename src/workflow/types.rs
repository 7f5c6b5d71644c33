//! Workflow resource types
//!
//! Typed views over the parts of an Argo `Workflow` object the harness reads.
//! Each fetch produces a fresh snapshot; nothing here is mutated after
//! deserialization.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse lifecycle state of a workflow or node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum Phase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Error,
    /// Absent, empty, or any phase this harness does not recognise
    #[default]
    #[serde(other)]
    Unknown,
}

impl Phase {
    /// Succeeded, Failed and Error end a workflow
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed | Phase::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Pending => "Pending",
            Phase::Running => "Running",
            Phase::Succeeded => "Succeeded",
            Phase::Failed => "Failed",
            Phase::Error => "Error",
            Phase::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    /// Strict parse used for scenario files, where a typo must not silently
    /// become `Unknown`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Phase::Pending),
            "Running" => Ok(Phase::Running),
            "Succeeded" => Ok(Phase::Succeeded),
            "Failed" => Ok(Phase::Failed),
            "Error" => Ok(Phase::Error),
            "Unknown" => Ok(Phase::Unknown),
            other => Err(format!(
                "unknown phase '{}' (expected one of Pending, Running, Succeeded, Failed, Error, Unknown)",
                other
            )),
        }
    }
}

/// An opaque workflow document, submitted exactly as written
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowManifest(serde_json::Value);

impl WorkflowManifest {
    pub fn new(document: serde_json::Value) -> Self {
        Self(document)
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Name/namespace identity of a remote resource
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

/// A workflow object as returned by the API server
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: WorkflowStatus,
}

impl Workflow {
    /// `namespace/name`, as used in log and error messages
    pub fn identity(&self) -> String {
        format!("{}/{}", self.metadata.namespace, self.metadata.name)
    }
}

/// Status block of a workflow
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    #[serde(default, deserialize_with = "deserialize_phase")]
    pub phase: Phase,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_nodes")]
    pub nodes: NodeTree,
}

/// Node identifier to node record
pub type NodeTree = BTreeMap<String, NodeStatus>;

/// Structural or pod-backed kind of a status node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A unit that ran in a pod
    Pod,
    Steps,
    StepGroup,
    Dag,
    TaskGroup,
    Retry,
    Skipped,
    Suspend,
    /// Any other discriminator, kept verbatim for diagnostics
    Other(String),
}

impl NodeKind {
    fn from_raw(kind: Option<String>) -> Self {
        match kind.as_deref() {
            Some("Pod") => NodeKind::Pod,
            Some("Steps") => NodeKind::Steps,
            Some("StepGroup") => NodeKind::StepGroup,
            Some("DAG") => NodeKind::Dag,
            Some("TaskGroup") => NodeKind::TaskGroup,
            Some("Retry") => NodeKind::Retry,
            Some("Skipped") => NodeKind::Skipped,
            Some("Suspend") => NodeKind::Suspend,
            Some(other) => NodeKind::Other(other.to_string()),
            None => NodeKind::Other(String::new()),
        }
    }

    /// The discriminator as the orchestrator spells it
    pub fn name(&self) -> &str {
        match self {
            NodeKind::Pod => "Pod",
            NodeKind::Steps => "Steps",
            NodeKind::StepGroup => "StepGroup",
            NodeKind::Dag => "DAG",
            NodeKind::TaskGroup => "TaskGroup",
            NodeKind::Retry => "Retry",
            NodeKind::Skipped => "Skipped",
            NodeKind::Suspend => "Suspend",
            NodeKind::Other(name) => name,
        }
    }

    pub fn is_pod(&self) -> bool {
        matches!(self, NodeKind::Pod)
    }
}

/// One node of the execution-status DAG
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub id: String,
    pub display_name: String,
    pub phase: Phase,
    pub kind: NodeKind,
    /// Pod name as reported by the orchestrator, on whatever kind of node
    pub pod_name: Option<String>,
    pub template_name: Option<String>,
    /// Child node identifiers in declared order
    pub children: Vec<String>,
}

impl NodeStatus {
    /// Pod name reported directly by the orchestrator, if any
    pub fn pod_name(&self) -> Option<&str> {
        self.pod_name.as_deref().filter(|name| !name.is_empty())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "deserialize_phase")]
    phase: Phase,
    #[serde(default)]
    pod_name: Option<String>,
    #[serde(default)]
    template_name: Option<String>,
    #[serde(default)]
    children: Option<Vec<String>>,
}

impl RawNode {
    fn into_node(self, key: &str) -> NodeStatus {
        NodeStatus {
            id: self.id.unwrap_or_else(|| key.to_string()),
            display_name: self.display_name.unwrap_or_default(),
            phase: self.phase,
            kind: NodeKind::from_raw(self.kind),
            pod_name: self.pod_name,
            template_name: self.template_name.filter(|name| !name.is_empty()),
            children: self.children.unwrap_or_default(),
        }
    }
}

fn deserialize_phase<'de, D>(deserializer: D) -> std::result::Result<Phase, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Phase>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_nodes<'de, D>(deserializer: D) -> std::result::Result<NodeTree, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, RawNode>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .map(|(key, node)| {
            let node = node.into_node(&key);
            (key, node)
        })
        .collect())
}
