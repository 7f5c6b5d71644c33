//! Checking a finished workflow against a scenario's expectations
//!
//! Checks run in a fixed order and stop at the first failure: workflow
//! phase, duration, then each node expectation as declared.

use std::collections::BTreeMap;

use crate::common::{Error, Result};
use crate::workflow::resolver::available_display_names;
use crate::workflow::{LogAggregator, NodeStatus, NodeTreeResolver, PodApi, Workflow};

use super::config::{ExpectationSpec, NodeExpectation};

/// Evaluates expectations, reading pod logs when a node expectation asks for them
pub struct ExpectationEvaluator<'a> {
    pods: &'a dyn PodApi,
    resolver: &'a NodeTreeResolver,
}

impl<'a> ExpectationEvaluator<'a> {
    pub fn new(pods: &'a dyn PodApi, resolver: &'a NodeTreeResolver) -> Self {
        Self { pods, resolver }
    }

    pub async fn evaluate(&self, workflow: &Workflow, expect: &ExpectationSpec) -> Result<()> {
        let status = &workflow.status;

        if let Some(expected) = expect.workflow_phase {
            if status.phase != expected {
                return Err(Error::Expectation(format!(
                    "Expected workflowPhase={}, got {}",
                    expected, status.phase
                )));
            }
        }

        if let (Some(bound), Some(started), Some(finished)) =
            (expect.max_duration_secs, status.started_at, status.finished_at)
        {
            let elapsed_ms = (finished - started).num_milliseconds();
            let bound_ms = i64::try_from(bound.saturating_mul(1000)).unwrap_or(i64::MAX);
            if elapsed_ms > bound_ms {
                return Err(Error::Expectation(format!(
                    "Expected duration <= {}s, got {:.1}s",
                    bound,
                    elapsed_ms as f64 / 1000.0
                )));
            }
        }

        if expect.nodes.is_empty() {
            return Ok(());
        }

        let mut by_display: BTreeMap<&str, Vec<&NodeStatus>> = BTreeMap::new();
        for node in status.nodes.values() {
            if !node.display_name.is_empty() {
                by_display.entry(node.display_name.as_str()).or_default().push(node);
            }
        }

        for node_expect in &expect.nodes {
            self.evaluate_node(workflow, &by_display, node_expect).await?;
        }
        Ok(())
    }

    async fn evaluate_node(
        &self,
        workflow: &Workflow,
        by_display: &BTreeMap<&str, Vec<&NodeStatus>>,
        expect: &NodeExpectation,
    ) -> Result<()> {
        let name = expect.display_name.as_str();
        let Some(group) = by_display.get(name) else {
            return Err(Error::NodeNotFound {
                display_name: name.to_string(),
                available: available_display_names(&workflow.status.nodes),
            });
        };

        // Retried steps share a display name; one attempt in the phase is enough.
        if let Some(expected) = expect.phase {
            if !group.iter().any(|n| n.phase == expected) {
                let phases: Vec<String> = group.iter().map(|n| n.phase.to_string()).collect();
                return Err(Error::Expectation(format!(
                    "Node '{}': expected phase={}, got phases={:?}",
                    name, expected, phases
                )));
            }
        }

        if expect.logs_contain.is_empty() {
            return Ok(());
        }

        let pod = match group.iter().find_map(|n| n.pod_name()) {
            Some(pod) => pod.to_string(),
            None => self
                .resolver
                .resolve(&workflow.status.nodes, &workflow.metadata.name, name)?,
        };
        tracing::debug!(node = name, pod = %pod, "reading pod logs");

        let logs = LogAggregator::new(self.pods)
            .aggregate(&workflow.metadata.namespace, &pod)
            .await?;

        for needle in &expect.logs_contain {
            if !logs.contains(needle.as_str()) {
                return Err(Error::Expectation(format!(
                    "Node '{}': expected logs to contain '{}', but not found.\n--- logs ---\n{}",
                    name, needle, logs
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{NodeKind, ObjectMeta, Phase, PodContainers, WorkflowStatus};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    /// Serves a single-container pod and records which pods were read
    #[derive(Default)]
    struct Pods {
        log: String,
        read: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PodApi for Pods {
        async fn containers(&self, _: &str, pod: &str) -> Result<PodContainers> {
            self.read.lock().unwrap().push(pod.to_string());
            Ok(PodContainers {
                init: Vec::new(),
                regular: vec!["main".to_string()],
            })
        }

        async fn container_log(&self, _: &str, _: &str, _: &str) -> Result<String> {
            Ok(self.log.clone())
        }
    }

    fn node(id: &str, display: &str, phase: Phase, kind: NodeKind, template: Option<&str>) -> NodeStatus {
        NodeStatus {
            id: id.to_string(),
            display_name: display.to_string(),
            phase,
            kind,
            pod_name: None,
            template_name: template.map(str::to_string),
            children: Vec::new(),
        }
    }

    fn reporting(mut node: NodeStatus, pod_name: &str) -> NodeStatus {
        node.pod_name = Some(pod_name.to_string());
        node
    }

    fn workflow(phase: Phase, nodes: Vec<NodeStatus>) -> Workflow {
        Workflow {
            metadata: ObjectMeta {
                name: "wf".to_string(),
                namespace: "argo".to_string(),
            },
            status: WorkflowStatus {
                phase,
                nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
                ..WorkflowStatus::default()
            },
        }
    }

    fn expect_node(name: &str, phase: Option<Phase>, logs: &[&str]) -> ExpectationSpec {
        ExpectationSpec {
            nodes: vec![NodeExpectation {
                display_name: name.to_string(),
                phase,
                logs_contain: logs.iter().map(|s| s.to_string()).collect(),
            }],
            ..ExpectationSpec::default()
        }
    }

    async fn run(pods: &Pods, wf: &Workflow, spec: &ExpectationSpec) -> Result<()> {
        let resolver = NodeTreeResolver::default();
        ExpectationEvaluator::new(pods, &resolver).evaluate(wf, spec).await
    }

    #[tokio::test]
    async fn test_workflow_phase_mismatch_names_both() {
        let wf = workflow(Phase::Failed, Vec::new());
        let spec = ExpectationSpec {
            workflow_phase: Some(Phase::Succeeded),
            ..ExpectationSpec::default()
        };
        let err = run(&Pods::default(), &wf, &spec).await.unwrap_err();
        assert_eq!(err.to_string(), "Expected workflowPhase=Succeeded, got Failed");
    }

    #[tokio::test]
    async fn test_duration_bound_is_inclusive() {
        let mut wf = workflow(Phase::Succeeded, Vec::new());
        wf.status.started_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        wf.status.finished_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 1, 0).unwrap());

        let at_bound = ExpectationSpec {
            max_duration_secs: Some(60),
            ..ExpectationSpec::default()
        };
        run(&Pods::default(), &wf, &at_bound).await.unwrap();

        let below = ExpectationSpec {
            max_duration_secs: Some(59),
            ..ExpectationSpec::default()
        };
        let err = run(&Pods::default(), &wf, &below).await.unwrap_err();
        assert_eq!(err.to_string(), "Expected duration <= 59s, got 60.0s");
    }

    #[tokio::test]
    async fn test_duration_skipped_without_timestamps() {
        let wf = workflow(Phase::Succeeded, Vec::new());
        let spec = ExpectationSpec {
            max_duration_secs: Some(1),
            ..ExpectationSpec::default()
        };
        run(&Pods::default(), &wf, &spec).await.unwrap();
    }

    #[tokio::test]
    async fn test_any_retry_attempt_satisfies_phase() {
        let wf = workflow(
            Phase::Succeeded,
            vec![
                node("wf-1", "retry-step", Phase::Failed, NodeKind::Pod, None),
                node("wf-2", "retry-step", Phase::Succeeded, NodeKind::Pod, None),
            ],
        );
        run(&Pods::default(), &wf, &expect_node("retry-step", Some(Phase::Succeeded), &[]))
            .await
            .unwrap();

        let err = run(&Pods::default(), &wf, &expect_node("retry-step", Some(Phase::Error), &[]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains(r#"got phases=["Failed", "Succeeded"]"#));
    }

    #[tokio::test]
    async fn test_unknown_node_lists_known_names() {
        let wf = workflow(
            Phase::Succeeded,
            vec![node("wf-1", "build", Phase::Succeeded, NodeKind::Steps, None)],
        );
        let err = run(&Pods::default(), &wf, &expect_node("deploy", None, &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NodeNotFound { .. }));
        assert!(err.to_string().contains("[\"build\"]"));
    }

    #[tokio::test]
    async fn test_logs_read_from_reported_pod() {
        let wf = workflow(
            Phase::Succeeded,
            vec![reporting(
                node("wf-1", "say", Phase::Succeeded, NodeKind::Pod, None),
                "wf-say-pod",
            )],
        );
        let pods = Pods {
            log: "hello world\n".to_string(),
            ..Pods::default()
        };
        run(&pods, &wf, &expect_node("say", None, &["hello", "world"])).await.unwrap();
        assert_eq!(*pods.read.lock().unwrap(), vec!["wf-say-pod".to_string()]);
    }

    #[tokio::test]
    async fn test_logs_read_from_pod_reported_on_retry_node() {
        let wf = workflow(
            Phase::Succeeded,
            vec![reporting(
                node("wf-1", "step1", Phase::Succeeded, NodeKind::Retry, None),
                "wf-step1-pod",
            )],
        );
        let pods = Pods {
            log: "done\n".to_string(),
            ..Pods::default()
        };
        run(&pods, &wf, &expect_node("step1", None, &["done"])).await.unwrap();
        assert_eq!(*pods.read.lock().unwrap(), vec!["wf-step1-pod".to_string()]);
    }

    #[tokio::test]
    async fn test_logs_read_from_resolved_pod() {
        let mut step = node("wf-1", "say", Phase::Succeeded, NodeKind::Steps, None);
        step.children = vec!["wf-2".to_string()];
        let wf = workflow(
            Phase::Succeeded,
            vec![
                step,
                node("wf-2", "say[0]", Phase::Succeeded, NodeKind::Pod, Some("whalesay")),
            ],
        );
        let pods = Pods {
            log: "hello world\n".to_string(),
            ..Pods::default()
        };
        run(&pods, &wf, &expect_node("say", None, &["hello world"])).await.unwrap();
        assert_eq!(*pods.read.lock().unwrap(), vec!["wf-whalesay-2".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_substring_includes_full_logs() {
        let wf = workflow(
            Phase::Succeeded,
            vec![reporting(node("wf-1", "say", Phase::Succeeded, NodeKind::Pod, None), "p")],
        );
        let pods = Pods {
            log: "goodbye\n".to_string(),
            ..Pods::default()
        };
        let err = run(&pods, &wf, &expect_node("say", None, &["hello"])).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Node 'say': expected logs to contain 'hello', but not found."));
        assert!(msg.contains("--- logs ---\n--- container: main ---\ngoodbye\n"));
    }
}
