#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for pkgcore
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/pkgcore/config.toml)
//! - Environment variables
//! - CLI flags

pub mod constants;
pub mod sections;
pub mod repository;

pub use sections::{NetworkConfig, PathConfig, SigningConfig};
pub use repository::{Repositories, RepositoryConfig};

use pkgcore_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub signing: SigningConfig,

    #[serde(default)]
    pub repositories: Repositories,
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir
            .join("pkgcore")
            .join(constants::CONFIG_FILE_NAME))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        // PKGCORE_CACHE_DIR
        if let Ok(dir) = std::env::var("PKGCORE_CACHE_DIR") {
            if dir.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "PKGCORE_CACHE_DIR".to_string(),
                    value: dir,
                }
                .into());
            }
            self.paths.cache_dir = Some(PathBuf::from(dir));
        }

        // PKGCORE_SIGNING_BACKEND
        if let Ok(backend) = std::env::var("PKGCORE_SIGNING_BACKEND") {
            if backend.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "PKGCORE_SIGNING_BACKEND".to_string(),
                    value: backend,
                }
                .into());
            }
            self.signing.backend = backend;
        }

        // PKGCORE_ALLOW_LEGACY_SIGNATURES
        if let Ok(legacy) = std::env::var("PKGCORE_ALLOW_LEGACY_SIGNATURES") {
            self.signing.allow_legacy = match legacy.as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "PKGCORE_ALLOW_LEGACY_SIGNATURES".to_string(),
                        value: legacy,
                    }
                    .into())
                }
            };
        }

        // PKGCORE_TIMEOUT
        if let Ok(timeout) = std::env::var("PKGCORE_TIMEOUT") {
            self.network.timeout = timeout.parse().map_err(|_| ConfigError::InvalidValue {
                field: "PKGCORE_TIMEOUT".to_string(),
                value: timeout,
            })?;
        }

        Ok(())
    }

    /// Get the cache root (with default)
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.paths
            .cache_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_CACHE_DIR))
    }

    /// Look up a configured repository by name
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownRepository` if no such table exists.
    pub fn repository(&self, name: &str) -> Result<&RepositoryConfig, Error> {
        self.repositories.get(name).ok_or_else(|| {
            ConfigError::UnknownRepository {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Signing backend a repository's catalog is verified with
    #[must_use]
    pub fn signing_backend_for<'a>(&'a self, repo: &'a RepositoryConfig) -> &'a str {
        repo.signing_backend
            .as_deref()
            .unwrap_or(&self.signing.backend)
    }

    /// Enabled repositories in name order
    pub fn enabled_repositories(&self) -> impl Iterator<Item = (&str, &RepositoryConfig)> {
        self.repositories
            .iter()
            .filter(|(_, repo)| repo.enabled)
            .map(|(name, repo)| (name.as_str(), repo))
    }
}
