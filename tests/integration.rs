//! End-to-end tests for the scenario runner
//!
//! These tests drive the full submit → wait → evaluate flow against an
//! in-memory cluster that implements the workflow and pod APIs, so no
//! Kubernetes cluster is required.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use argo_acceptance::testing::{load_scenarios, ExpectationSpec, ScenarioRunner, TestScenario, WorkflowSource};
use argo_acceptance::workflow::{
    PodApi, PodContainers, PollingWatcher, Workflow, WorkflowApi, WorkflowManifest,
};
use argo_acceptance::{Error, Result};

/// Builds the status JSON returned for poll number `poll` (0-based) of a workflow
type StatusScript = Box<dyn Fn(&str, usize) -> Value + Send + Sync>;

/// In-memory stand-in for the API server
struct FakeCluster {
    script: StatusScript,
    submitted: Mutex<Vec<(String, Value)>>,
    polls: Mutex<HashMap<String, usize>>,
    deleted: Mutex<Vec<String>>,
    pods: HashMap<String, (PodContainers, HashMap<String, String>)>,
    reject_submissions: bool,
}

impl FakeCluster {
    fn new(script: impl Fn(&str, usize) -> Value + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            submitted: Mutex::new(Vec::new()),
            polls: Mutex::new(HashMap::new()),
            deleted: Mutex::new(Vec::new()),
            pods: HashMap::new(),
            reject_submissions: false,
        }
    }

    /// Every workflow reports `status` on every poll
    fn fixed(status: Value) -> Self {
        Self::new(move |_, _| status.clone())
    }

    fn with_pod(mut self, name: &str, regular: &[&str], logs: &[(&str, &str)]) -> Self {
        let containers = PodContainers {
            init: Vec::new(),
            regular: regular.iter().map(|s| s.to_string()).collect(),
        };
        let logs = logs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        self.pods.insert(name.to_string(), (containers, logs));
        self
    }

    fn submitted_names(&self) -> Vec<String> {
        self.submitted.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    fn polls_of(&self, name: &str) -> usize {
        self.polls.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

#[async_trait]
impl WorkflowApi for FakeCluster {
    async fn submit(&self, namespace: &str, manifest: &WorkflowManifest) -> Result<String> {
        if self.reject_submissions {
            return Err(Error::submission(namespace, "HTTP 403 Forbidden: workflows.argoproj.io is forbidden"));
        }
        let mut submitted = self.submitted.lock().unwrap();
        let prefix = manifest.as_json()["metadata"]["generateName"]
            .as_str()
            .unwrap_or("wf-")
            .to_string();
        let name = format!("{}{:05}", prefix, submitted.len() + 1);
        submitted.push((name.clone(), manifest.as_json().clone()));
        Ok(name)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Workflow> {
        let poll = {
            let mut polls = self.polls.lock().unwrap();
            let count = polls.entry(name.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };
        let status = (self.script)(name, poll);
        let workflow = json!({
            "metadata": {"name": name, "namespace": namespace},
            "status": status,
        });
        Ok(serde_json::from_value(workflow)?)
    }

    async fn delete(&self, _namespace: &str, name: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

#[async_trait]
impl PodApi for FakeCluster {
    async fn containers(&self, namespace: &str, pod: &str) -> Result<PodContainers> {
        self.pods
            .get(pod)
            .map(|(containers, _)| containers.clone())
            .ok_or_else(|| Error::fetch(format!("pod {}/{}", namespace, pod), "HTTP 404 Not Found"))
    }

    async fn container_log(&self, namespace: &str, pod: &str, container: &str) -> Result<String> {
        self.pods
            .get(pod)
            .and_then(|(_, logs)| logs.get(container).cloned())
            .ok_or_else(|| Error::fetch(format!("logs of {}/{} container {}", namespace, pod, container), "not found"))
    }
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join("scenarios")
}

fn fast_watcher() -> PollingWatcher {
    PollingWatcher::new(Duration::from_millis(1))
}

fn inline_scenario(name: &str, expect: ExpectationSpec) -> TestScenario {
    TestScenario {
        path: PathBuf::from(format!("{}.yaml", name)),
        name: name.to_string(),
        description: String::new(),
        tags: Default::default(),
        timeout_secs: 30,
        namespace: "argo".to_string(),
        expect,
        source: WorkflowSource::Inline(WorkflowManifest::new(json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Workflow",
            "metadata": {"generateName": format!("{}-", name)},
        }))),
    }
}

#[tokio::test]
async fn test_fixture_directory_runs_green() {
    let scenarios = load_scenarios(&fixtures_dir()).expect("fixtures load");
    assert_eq!(scenarios.len(), 2);

    let cluster = FakeCluster::new(|name, poll| {
        if poll < 2 {
            return json!({"phase": if poll == 0 { "Pending" } else { "Running" }});
        }
        if name.starts_with("hello-") {
            json!({
                "phase": "Succeeded",
                "startedAt": "2024-05-01T10:00:00Z",
                "finishedAt": "2024-05-01T10:00:20Z",
                "nodes": {
                    name: {
                        "id": name, "displayName": name, "type": "Steps",
                        "phase": "Succeeded", "templateName": "main",
                        "children": [format!("{}-1", name)]
                    },
                    format!("{}-1", name): {
                        "id": format!("{}-1", name), "displayName": "[0]", "type": "StepGroup",
                        "phase": "Succeeded", "children": [format!("{}-2", name)]
                    },
                    format!("{}-2", name): {
                        "id": format!("{}-2", name), "displayName": "say", "type": "Pod",
                        "phase": "Succeeded", "templateName": "whalesay"
                    }
                }
            })
        } else {
            json!({
                "phase": "Succeeded",
                "nodes": {
                    name: {
                        "id": name, "displayName": name, "type": "Retry",
                        "phase": "Succeeded",
                        "children": [format!("{}-1", name), format!("{}-2", name)]
                    },
                    format!("{}-1", name): {
                        "id": format!("{}-1", name), "displayName": "flaky", "type": "Pod",
                        "phase": "Failed", "templateName": "flaky"
                    },
                    format!("{}-2", name): {
                        "id": format!("{}-2", name), "displayName": "flaky", "type": "Pod",
                        "phase": "Succeeded", "templateName": "flaky"
                    }
                }
            })
        }
    })
    .with_pod("hello-00001-whalesay-2", &["wait", "main"], &[("main", "hello world\n"), ("wait", "")]);

    let summary = ScenarioRunner::new(&cluster, &cluster)
        .with_watcher(fast_watcher())
        .run_all(&scenarios)
        .await;

    for result in &summary.results {
        assert!(result.passed, "{} failed: {:?}", result.name, result.error);
    }
    assert!(summary.all_passed());
    assert_eq!(cluster.submitted_names(), vec!["hello-00001", "retry-00002"]);
    assert_eq!(cluster.polls_of("hello-00001"), 3);

    // The workflowFile manifest was read from disk and submitted as written.
    let submitted = cluster.submitted.lock().unwrap();
    assert_eq!(submitted[1].1["spec"]["entrypoint"], "flaky");
}

#[tokio::test]
async fn test_already_succeeded_without_timestamps_passes() {
    let cluster = FakeCluster::fixed(json!({"phase": "Succeeded"}));
    let scenario = inline_scenario(
        "quick",
        ExpectationSpec {
            max_duration_secs: Some(1),
            ..ExpectationSpec::default()
        },
    );

    let result = ScenarioRunner::new(&cluster, &cluster)
        .with_watcher(fast_watcher())
        .run_scenario(&scenario)
        .await;

    assert!(result.passed, "{:?}", result.error);
    assert_eq!(result.workflow_name.as_deref(), Some("quick-00001"));
    assert_eq!(cluster.polls_of("quick-00001"), 1);
}

#[tokio::test]
async fn test_phase_mismatch_fails_with_both_phases() {
    let cluster = FakeCluster::fixed(json!({"phase": "Failed"}));
    let scenario = inline_scenario(
        "broken",
        ExpectationSpec {
            workflow_phase: Some("Succeeded".parse().unwrap()),
            ..ExpectationSpec::default()
        },
    );

    let result = ScenarioRunner::new(&cluster, &cluster)
        .with_watcher(fast_watcher())
        .run_scenario(&scenario)
        .await;

    assert!(!result.passed);
    let error = result.error.unwrap();
    assert!(error.contains("Succeeded"), "{error}");
    assert!(error.contains("Failed"), "{error}");
}

#[tokio::test]
async fn test_failure_does_not_stop_later_scenarios() {
    let cluster = FakeCluster::fixed(json!({"phase": "Succeeded"}));
    let mut missing_file = inline_scenario("missing", ExpectationSpec::default());
    missing_file.source = WorkflowSource::File(PathBuf::from("/nonexistent/workflow.yaml"));
    let fine = inline_scenario("fine", ExpectationSpec::default());

    let summary = ScenarioRunner::new(&cluster, &cluster)
        .with_watcher(fast_watcher())
        .run_all(&[missing_file, fine])
        .await;

    assert_eq!(summary.passed_count(), 1);
    assert_eq!(summary.failed_count(), 1);
    let failure = &summary.failures()[0];
    assert_eq!(failure.name, "missing");
    assert!(failure.workflow_name.is_none());
    assert!(failure.error.as_deref().unwrap().contains("/nonexistent/workflow.yaml"));
    assert_eq!(cluster.submitted_names(), vec!["fine-00001"]);
}

#[tokio::test]
async fn test_submission_error_is_reported() {
    let mut cluster = FakeCluster::fixed(json!({"phase": "Succeeded"}));
    cluster.reject_submissions = true;
    let scenario = inline_scenario("denied", ExpectationSpec::default());

    let result = ScenarioRunner::new(&cluster, &cluster)
        .with_watcher(fast_watcher())
        .run_scenario(&scenario)
        .await;

    assert!(!result.passed);
    assert!(result.error.unwrap().contains("403 Forbidden"));
}

#[tokio::test]
async fn test_timeout_becomes_failed_result() {
    let cluster = FakeCluster::fixed(json!({"phase": "Running"}));
    let mut scenario = inline_scenario("slow", ExpectationSpec::default());
    scenario.timeout_secs = 1;

    let result = ScenarioRunner::new(&cluster, &cluster)
        .with_watcher(PollingWatcher::new(Duration::from_millis(50)))
        .run_scenario(&scenario)
        .await;

    assert!(!result.passed);
    let error = result.error.unwrap();
    assert!(error.contains("argo/slow-00001"), "{error}");
    assert!(error.contains("last phase: Running"), "{error}");
}

#[tokio::test]
async fn test_cleanup_is_opt_in() {
    let cluster = FakeCluster::fixed(json!({"phase": "Failed"}));
    let scenario = inline_scenario("tidy", ExpectationSpec::default());

    ScenarioRunner::new(&cluster, &cluster)
        .with_watcher(fast_watcher())
        .run_scenario(&scenario)
        .await;
    assert!(cluster.deleted.lock().unwrap().is_empty());

    ScenarioRunner::new(&cluster, &cluster)
        .with_watcher(fast_watcher())
        .with_cleanup(true)
        .run_scenario(&scenario)
        .await;
    assert_eq!(*cluster.deleted.lock().unwrap(), vec!["tidy-00002".to_string()]);
}

#[tokio::test]
async fn test_log_expectation_failure_carries_logs() {
    let cluster = FakeCluster::fixed(json!({
        "phase": "Succeeded",
        "nodes": {
            "n1": {"id": "n1", "displayName": "print", "type": "Pod", "phase": "Succeeded", "podName": "print-pod"}
        }
    }))
    .with_pod("print-pod", &["wait", "main"], &[("main", "goodbye\n")]);

    let mut scenario = inline_scenario("logs", ExpectationSpec::default());
    scenario.expect.nodes.push(argo_acceptance::testing::NodeExpectation {
        display_name: "print".to_string(),
        phase: None,
        logs_contain: vec!["hello".to_string()],
    });

    let result = ScenarioRunner::new(&cluster, &cluster)
        .with_watcher(fast_watcher())
        .run_scenario(&scenario)
        .await;

    assert!(!result.passed);
    let error = result.error.unwrap();
    assert!(error.contains("expected logs to contain 'hello'"), "{error}");
    assert!(error.contains("--- container: main ---\ngoodbye"), "{error}");
    assert!(error.contains("<failed to read container logs:"), "{error}");
}
