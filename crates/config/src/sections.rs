//! Configuration sections shared across crates

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Root of the artifact cache
    pub cache_dir: Option<PathBuf>,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub timeout: u64, // seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64, // seconds
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Signing defaults used when a repository does not name its own backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Key used by `sign` and `keygen` when none is given on the command line
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    /// Accept signatures in the historical legacy encoding
    #[serde(default)]
    pub allow_legacy: bool,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            key_path: None,
            allow_legacy: false,
        }
    }
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("pkgcore/{}", env!("CARGO_PKG_VERSION"))
}

pub(crate) fn default_backend() -> String {
    crate::constants::DEFAULT_SIGNING_BACKEND.to_string()
}
