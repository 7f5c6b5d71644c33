//! Per-container log aggregation
//!
//! Asking for a pod's logs without naming a container can return the output
//! of a sidecar such as Argo's `wait` container. Logs are therefore read
//! container by container and concatenated in a fixed order: init containers
//! as declared, then regular containers with `main` moved to the front.

use crate::common::Result;

use super::client::PodApi;

/// Name of the container that runs the user's step
pub const MAIN_CONTAINER: &str = "main";

/// Move `main` to the front, keeping the relative order of the rest
pub fn main_first(names: &[String]) -> Vec<String> {
    let mut ordered: Vec<String> = names.iter().filter(|n| *n == MAIN_CONTAINER).cloned().collect();
    ordered.extend(names.iter().filter(|n| *n != MAIN_CONTAINER).cloned());
    ordered
}

/// Fetches and combines logs for every container of a pod
pub struct LogAggregator<'a> {
    pods: &'a dyn PodApi,
}

impl<'a> LogAggregator<'a> {
    pub fn new(pods: &'a dyn PodApi) -> Self {
        Self { pods }
    }

    /// Combined log text of `namespace/pod`
    ///
    /// Failing to list the pod's containers is an error. Failing to read a
    /// single container is not: its section holds a placeholder with the
    /// failure so the other sections stay usable.
    pub async fn aggregate(&self, namespace: &str, pod: &str) -> Result<String> {
        let containers = self.pods.containers(namespace, pod).await?;

        let mut combined = String::new();
        for name in &containers.init {
            let log = self.read(namespace, pod, name, "init container").await;
            push_section(&mut combined, "initContainer", name, &log);
        }
        for name in main_first(&containers.regular) {
            let log = self.read(namespace, pod, &name, "container").await;
            push_section(&mut combined, "container", &name, &log);
        }
        Ok(combined)
    }

    async fn read(&self, namespace: &str, pod: &str, container: &str, kind: &str) -> String {
        match self.pods.container_log(namespace, pod, container).await {
            Ok(log) => log,
            Err(e) => {
                tracing::warn!(pod = %format!("{}/{}", namespace, pod), container, "log read failed: {}", e);
                format!("<failed to read {} logs: {}>", kind, e)
            }
        }
    }
}

fn push_section(out: &mut String, kind: &str, name: &str, log: &str) {
    out.push_str(&format!("--- {}: {} ---\n", kind, name));
    out.push_str(log);
    if !log.ends_with('\n') {
        out.push('\n');
    }
}
