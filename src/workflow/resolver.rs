//! Mapping a step's display name to the pod that ran it
//!
//! Display names are not unique (retries, loop expansions), so every node
//! carrying the name is a candidate root. Each candidate's subtree is
//! searched depth-first, children in declared order, for the first node
//! whose pod name can be determined.

use std::collections::{BTreeSet, HashSet};

use crate::common::config::PodNaming;
use crate::common::{Error, Result};

use super::types::{NodeStatus, NodeTree};

/// How many display names a not-found error lists
const AVAILABLE_SAMPLE: usize = 30;

/// Reconstructs a pod name for a pod node the orchestrator did not label
///
/// The naming convention depends on the orchestrator version and its
/// configuration, so it is pluggable.
pub trait PodNameStrategy: Send + Sync {
    fn derive(&self, workflow_name: &str, node: &NodeStatus) -> Option<String>;
}

/// `{workflow}-{template}-{suffix}`, where suffix is the node id with the
/// `{workflow}-` prefix removed
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSuffixNaming;

impl PodNameStrategy for TemplateSuffixNaming {
    fn derive(&self, workflow_name: &str, node: &NodeStatus) -> Option<String> {
        let template = node.template_name.as_deref()?;
        let suffix = node.id.strip_prefix(workflow_name)?.strip_prefix('-')?;
        if suffix.is_empty() {
            return None;
        }
        Some(format!("{}-{}-{}", workflow_name, template, suffix))
    }
}

/// Pod name equals the node id
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeIdNaming;

impl PodNameStrategy for NodeIdNaming {
    fn derive(&self, _workflow_name: &str, node: &NodeStatus) -> Option<String> {
        (!node.id.is_empty()).then(|| node.id.clone())
    }
}

/// Only pod names reported by the orchestrator are trusted
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportedOnly;

impl PodNameStrategy for ReportedOnly {
    fn derive(&self, _workflow_name: &str, _node: &NodeStatus) -> Option<String> {
        None
    }
}

/// Sorted, de-duplicated sample of the display names present in a tree
pub fn available_display_names(nodes: &NodeTree) -> Vec<String> {
    nodes
        .values()
        .filter(|n| !n.display_name.is_empty())
        .map(|n| n.display_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(AVAILABLE_SAMPLE)
        .collect()
}

/// Finds the pod behind a display name
pub struct NodeTreeResolver {
    naming: Box<dyn PodNameStrategy>,
}

impl Default for NodeTreeResolver {
    fn default() -> Self {
        Self::new(Box::new(TemplateSuffixNaming))
    }
}

impl NodeTreeResolver {
    pub fn new(naming: Box<dyn PodNameStrategy>) -> Self {
        Self { naming }
    }

    pub fn from_naming(naming: PodNaming) -> Self {
        match naming {
            PodNaming::TemplateSuffix => Self::new(Box::new(TemplateSuffixNaming)),
            PodNaming::NodeId => Self::new(Box::new(NodeIdNaming)),
            PodNaming::None => Self::new(Box::new(ReportedOnly)),
        }
    }

    /// Resolve the pod that executed the step labelled `display_name`
    pub fn resolve(&self, nodes: &NodeTree, workflow_name: &str, display_name: &str) -> Result<String> {
        let roots: Vec<&NodeStatus> = nodes
            .values()
            .filter(|n| n.display_name == display_name)
            .collect();

        if roots.is_empty() {
            return Err(Error::NodeNotFound {
                display_name: display_name.to_string(),
                available: available_display_names(nodes),
            });
        }

        let mut visited = HashSet::new();
        for root in roots.iter().copied() {
            if let Some(pod) = self.search(nodes, root, workflow_name, &mut visited) {
                return Ok(pod);
            }
        }

        Err(Error::PodUnresolved {
            display_name: display_name.to_string(),
            candidates: roots
                .iter()
                .map(|n| {
                    format!(
                        "id={} type={} templateName={} phase={} children={}",
                        n.id,
                        n.kind.name(),
                        n.template_name.as_deref().unwrap_or("None"),
                        n.phase,
                        n.children.len()
                    )
                })
                .collect(),
        })
    }

    /// Pod name of a single node, reported or reconstructed
    pub fn pod_name_of(&self, workflow_name: &str, node: &NodeStatus) -> Option<String> {
        if let Some(pod) = node.pod_name() {
            return Some(pod.to_string());
        }
        if node.kind.is_pod() {
            return self.naming.derive(workflow_name, node);
        }
        None
    }

    /// Iterative pre-order DFS; `visited` guards against cycles in
    /// malformed status data
    fn search<'a>(
        &self,
        nodes: &'a NodeTree,
        root: &'a NodeStatus,
        workflow_name: &str,
        visited: &mut HashSet<&'a str>,
    ) -> Option<String> {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !visited.insert(node.id.as_str()) {
                continue;
            }
            if let Some(pod) = self.pod_name_of(workflow_name, node) {
                return Some(pod);
            }
            for child in node.children.iter().rev() {
                if let Some(child) = nodes.get(child) {
                    stack.push(child);
                }
            }
        }
        None
    }
}
