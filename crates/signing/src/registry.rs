//! Name-to-constructor table for signing backends

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use pkgcore_errors::{ConfigError, Error};

use crate::backend::SigningBackend;
use crate::ed25519::Ed25519Backend;
use crate::minisign::MinisignBackend;

/// Builds a backend instance for the key material at a path
pub type BackendConstructor =
    Arc<dyn Fn(&Path) -> Result<Box<dyn SigningBackend>, Error> + Send + Sync>;

/// Registered signing backends, selected by name
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, BackendConstructor>,
}

impl BackendRegistry {
    /// Registry with no backends
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in `minisign` and `ed25519` backends
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(MinisignBackend::NAME, MinisignBackend::constructor);
        registry.register(Ed25519Backend::NAME, Ed25519Backend::constructor);
        registry
    }

    /// Add or replace a backend
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&Path) -> Result<Box<dyn SigningBackend>, Error> + Send + Sync + 'static,
    {
        self.backends.insert(name.into(), Arc::new(constructor));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    /// Look up the constructor for `name`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownSigningBackend` for unregistered names.
    pub fn constructor(&self, name: &str) -> Result<BackendConstructor, Error> {
        self.backends.get(name).cloned().ok_or_else(|| {
            ConfigError::UnknownSigningBackend {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Construct the backend named `name` for the key at `key_path`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownSigningBackend` for unregistered names and
    /// the backend's own constructor failure otherwise.
    pub fn create(&self, name: &str, key_path: &Path) -> Result<Box<dyn SigningBackend>, Error> {
        let constructor = self.constructor(name)?;
        constructor(key_path)
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
