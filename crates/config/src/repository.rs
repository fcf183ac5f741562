use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub url: String,
    /// Backend used to authenticate the catalog; falls back to `[signing].backend`
    #[serde(default)]
    pub signing_backend: Option<String>,
    /// Public key file for catalog verification
    #[serde(default)]
    pub public_key: Option<PathBuf>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Named repositories keyed by their `[repositories.<name>]` table
pub type Repositories = BTreeMap<String, RepositoryConfig>;

fn default_enabled() -> bool {
    true
}
