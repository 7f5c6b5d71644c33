//! Configuration and in-cluster credential paths

use std::path::{Path, PathBuf};

/// Application name used for platform directories
const APP_NAME: &str = "argo-acceptance";

/// Directory holding the in-cluster service-account credentials
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/argo-acceptance/`
/// - macOS: `~/Library/Application Support/argo-acceptance/`
/// - Windows: `%APPDATA%\argo-acceptance\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Service-account token mounted into pods
pub fn service_account_token() -> PathBuf {
    Path::new(SERVICE_ACCOUNT_DIR).join("token")
}

/// Cluster CA bundle mounted into pods
pub fn service_account_ca() -> PathBuf {
    Path::new(SERVICE_ACCOUNT_DIR).join("ca.crt")
}
