//! Remote API access
//!
//! Two capabilities are needed from the cluster: creating and reading
//! workflow objects, and reading pod container logs. Both are traits so the
//! runner can be driven by in-memory implementations; [`KubeClient`]
//! implements them over the Kubernetes REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::common::config::{ClusterConfig, ResourceCoordinate};
use crate::common::paths;
use crate::common::{Error, Result};

use super::types::{Workflow, WorkflowManifest};

/// Create/read access to workflow resources
///
/// Not idempotent: every `submit` creates a new remote object. No retries
/// happen here; callers decide.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Create a workflow and return the name the server assigned to it
    async fn submit(&self, namespace: &str, manifest: &WorkflowManifest) -> Result<String>;

    /// Fetch the current state of a workflow
    async fn get(&self, namespace: &str, name: &str) -> Result<Workflow>;

    /// Delete a workflow (only used when cleanup is requested)
    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;
}

/// Container names of a pod, each list in declared order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodContainers {
    pub init: Vec<String>,
    pub regular: Vec<String>,
}

/// Read access to pods and their logs
#[async_trait]
pub trait PodApi: Send + Sync {
    async fn containers(&self, namespace: &str, pod: &str) -> Result<PodContainers>;

    async fn container_log(&self, namespace: &str, pod: &str, container: &str) -> Result<String>;
}

/// Kubernetes REST client for workflows and pods
pub struct KubeClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    workflows: ResourceCoordinate,
}

impl KubeClient {
    /// Build a client from configuration, falling back to the in-cluster
    /// service account when no server is configured
    pub fn from_config(cluster: &ClusterConfig, workflows: ResourceCoordinate) -> Result<Self> {
        let (base_url, token, ca_file) = match &cluster.server {
            Some(server) => {
                let token = match (&cluster.token, &cluster.token_file) {
                    (Some(token), _) => Some(token.clone()),
                    (None, Some(file)) => Some(read_trimmed(file)?),
                    (None, None) => None,
                };
                (server.clone(), token, cluster.ca_file.clone())
            }
            None => {
                let (host, port) = match (
                    std::env::var("KUBERNETES_SERVICE_HOST"),
                    std::env::var("KUBERNETES_SERVICE_PORT"),
                ) {
                    (Ok(host), Ok(port)) => (host, port),
                    _ => {
                        return Err(Error::Config(
                            "No API server configured. Set [cluster].server in the config file, \
                             ARGO_ACCEPTANCE_SERVER, or run inside a cluster"
                                .to_string(),
                        ))
                    }
                };
                let host = if host.contains(':') {
                    format!("[{}]", host)
                } else {
                    host
                };
                let token = match &cluster.token {
                    Some(token) => token.clone(),
                    None => read_trimmed(&paths::service_account_token())?,
                };
                let ca = cluster.ca_file.clone().or_else(|| {
                    let ca = paths::service_account_ca();
                    ca.exists().then_some(ca)
                });
                (format!("https://{}:{}", host, port), Some(token), ca)
            }
        };

        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(30));
        if let Some(ca_file) = ca_file {
            let pem = std::fs::read(&ca_file).map_err(|e| Error::FileRead {
                path: ca_file.display().to_string(),
                error: e.to_string(),
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| Error::Config(format!("Invalid CA bundle '{}': {}", ca_file.display(), e)))?;
            builder = builder.add_root_certificate(cert);
        }
        if cluster.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            workflows,
        })
    }

    fn workflows_url(&self, namespace: &str) -> String {
        format!(
            "{}/apis/{}/{}/namespaces/{}/{}",
            self.base_url,
            self.workflows.group,
            self.workflows.version,
            namespace,
            self.workflows.plural
        )
    }

    fn pod_url(&self, namespace: &str, pod: &str) -> String {
        format!("{}/api/v1/namespaces/{}/pods/{}", self.base_url, namespace, pod)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn read_trimmed(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })
}

/// Turn a non-2xx response into a message carrying status and body
async fn expect_success(response: reqwest::Response) -> std::result::Result<reqwest::Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(format!("HTTP {}: {}", status, body.trim()))
}

#[derive(Deserialize)]
struct Pod {
    #[serde(default)]
    spec: PodSpec,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PodSpec {
    #[serde(default)]
    containers: Vec<Container>,
    #[serde(default)]
    init_containers: Option<Vec<Container>>,
}

#[derive(Deserialize)]
struct Container {
    name: String,
}

#[async_trait]
impl WorkflowApi for KubeClient {
    async fn submit(&self, namespace: &str, manifest: &WorkflowManifest) -> Result<String> {
        let request = self.http.post(self.workflows_url(namespace)).json(manifest.as_json());
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| Error::submission(namespace, e.to_string()))?;
        let response = expect_success(response)
            .await
            .map_err(|message| Error::submission(namespace, message))?;
        let created: Workflow = response
            .json()
            .await
            .map_err(|e| Error::submission(namespace, format!("unreadable response: {}", e)))?;

        if created.metadata.name.is_empty() {
            return Err(Error::submission(namespace, "server returned a workflow without a name"));
        }
        Ok(created.metadata.name)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Workflow> {
        let target = format!("workflow {}/{}", namespace, name);
        let url = format!("{}/{}", self.workflows_url(namespace), name);
        let response = self
            .authorized(self.http.get(url))
            .send()
            .await
            .map_err(|e| Error::fetch(&target, e.to_string()))?;
        let response = expect_success(response)
            .await
            .map_err(|message| Error::fetch(&target, message))?;
        response
            .json()
            .await
            .map_err(|e| Error::fetch(&target, format!("unreadable response: {}", e)))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let target = format!("workflow {}/{}", namespace, name);
        let url = format!("{}/{}", self.workflows_url(namespace), name);
        let response = self
            .authorized(self.http.delete(url))
            .send()
            .await
            .map_err(|e| Error::fetch(&target, e.to_string()))?;
        expect_success(response)
            .await
            .map_err(|message| Error::fetch(&target, message))?;
        Ok(())
    }
}

#[async_trait]
impl PodApi for KubeClient {
    async fn containers(&self, namespace: &str, pod: &str) -> Result<PodContainers> {
        let target = format!("pod {}/{}", namespace, pod);
        let response = self
            .authorized(self.http.get(self.pod_url(namespace, pod)))
            .send()
            .await
            .map_err(|e| Error::fetch(&target, e.to_string()))?;
        let response = expect_success(response)
            .await
            .map_err(|message| Error::fetch(&target, message))?;
        let pod: Pod = response
            .json()
            .await
            .map_err(|e| Error::fetch(&target, format!("unreadable response: {}", e)))?;

        Ok(PodContainers {
            init: pod
                .spec
                .init_containers
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.name)
                .collect(),
            regular: pod.spec.containers.into_iter().map(|c| c.name).collect(),
        })
    }

    async fn container_log(&self, namespace: &str, pod: &str, container: &str) -> Result<String> {
        let target = format!("logs of {}/{} container {}", namespace, pod, container);
        let url = format!("{}/log", self.pod_url(namespace, pod));
        let request = self
            .http
            .get(url)
            .query(&[("container", container), ("timestamps", "false")]);
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| Error::fetch(&target, e.to_string()))?;
        let response = expect_success(response)
            .await
            .map_err(|message| Error::fetch(&target, message))?;
        response
            .text()
            .await
            .map_err(|e| Error::fetch(&target, e.to_string()))
    }
}
