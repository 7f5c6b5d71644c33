//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// API server connection
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Workflow custom-resource coordinate
    #[serde(default)]
    pub workflows: ResourceCoordinate,

    /// Status polling settings
    #[serde(default)]
    pub polling: PollingConfig,

    /// Pod resolution settings
    #[serde(default)]
    pub pods: PodsConfig,

    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,
}

/// API server connection settings
///
/// When `server` is unset the in-cluster service account is used.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ClusterConfig {
    /// Base URL of the Kubernetes API server
    pub server: Option<String>,

    /// Bearer token
    pub token: Option<String>,

    /// File containing the bearer token
    pub token_file: Option<PathBuf>,

    /// PEM bundle used to verify the API server
    pub ca_file: Option<PathBuf>,

    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

/// Group/version/plural of the workflow kind
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ResourceCoordinate {
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_plural")]
    pub plural: String,
}

impl Default for ResourceCoordinate {
    fn default() -> Self {
        Self {
            group: default_group(),
            version: default_version(),
            plural: default_plural(),
        }
    }
}

fn default_group() -> String {
    "argoproj.io".to_string()
}
fn default_version() -> String {
    "v1alpha1".to_string()
}
fn default_plural() -> String {
    "workflows".to_string()
}

/// Status polling settings
#[derive(Debug, Deserialize)]
pub struct PollingConfig {
    /// Seconds between status fetches
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Consecutive failed fetches tolerated before the wait gives up
    #[serde(default = "default_max_fetch_failures")]
    pub max_consecutive_fetch_failures: u32,
}

impl PollingConfig {
    /// Poll interval, never shorter than one second
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            max_consecutive_fetch_failures: default_max_fetch_failures(),
        }
    }
}

fn default_interval() -> u64 {
    2
}
fn default_max_fetch_failures() -> u32 {
    5
}

/// How pod names are reconstructed for nodes that do not report one
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PodNaming {
    /// `{workflow}-{template}-{node id suffix}`
    #[default]
    TemplateSuffix,
    /// Pod name equals the node identifier
    NodeId,
    /// Never reconstruct; only reported pod names are used
    None,
}

/// Pod resolution settings
#[derive(Debug, Deserialize, Default)]
pub struct PodsConfig {
    #[serde(default)]
    pub naming: PodNaming,
}

/// Default settings
#[derive(Debug, Deserialize)]
pub struct Defaults {
    /// Scenario directory used when `--dir` is not given
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
}

impl Default for Defaults {
    fn default() -> Self {
        Self { dir: default_dir() }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from("tests_yaml")
}

impl Config {
    /// Load configuration from an explicit path, or from the default config
    /// file
    ///
    /// Returns default configuration if the default file doesn't exist. An
    /// explicit path must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    fn apply_env(&mut self) {
        if let Ok(server) = std::env::var("ARGO_ACCEPTANCE_SERVER") {
            if !server.is_empty() {
                self.cluster.server = Some(server);
            }
        }
        if let Ok(token) = std::env::var("ARGO_ACCEPTANCE_TOKEN") {
            if !token.is_empty() {
                self.cluster.token = Some(token);
            }
        }
    }
}
