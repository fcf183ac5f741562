//! Repository handle: base URL plus the context that authenticates its catalog

use std::path::PathBuf;

use pkgcore_config::RepositoryConfig;
use pkgcore_errors::{Error, SigningError};
use pkgcore_net::parse_url;
use pkgcore_signing::{BackendRegistry, SigningContext};

const LOCAL_SCHEME: &str = "file:";

#[derive(Debug)]
pub struct Repository {
    name: String,
    url: String,
    signing: Option<SigningContext>,
}

impl Repository {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            signing: None,
        }
    }

    /// Build a repository from its configuration table
    ///
    /// A verification context is opened when the table names a public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the signing backend is unknown or cannot load the
    /// public key.
    pub fn from_config(
        name: &str,
        config: &RepositoryConfig,
        default_backend: &str,
        registry: &BackendRegistry,
    ) -> Result<Self, Error> {
        let mut repo = Self::new(name, config.url.clone());
        if let Some(key) = &config.public_key {
            let backend = config.signing_backend.as_deref().unwrap_or(default_backend);
            repo.signing = Some(SigningContext::new_for_verification(
                registry, backend, key,
            )?);
        }
        Ok(repo)
    }

    #[must_use]
    pub fn with_signing(mut self, context: SigningContext) -> Self {
        self.signing = Some(context);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn signing(&self) -> Option<&SigningContext> {
        self.signing.as_ref()
    }

    /// Whether the repository lives on the local filesystem (`file:` URL)
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.url
            .get(..LOCAL_SCHEME.len())
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case(LOCAL_SCHEME))
    }

    /// Filesystem root of a local repository
    ///
    /// `None` for remote repositories and for `file:` URLs that carry a host
    /// or otherwise do not map onto a local path.
    #[must_use]
    pub fn local_root(&self) -> Option<PathBuf> {
        if !self.is_local() {
            return None;
        }
        parse_url(&self.url).ok()?.to_file_path().ok()
    }

    /// `<url>/<repopath>` with exactly one separator between the two
    #[must_use]
    pub fn artifact_url(&self, repopath: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            repopath.trim_start_matches('/')
        )
    }

    /// Verify the catalog signature over its checksum text
    ///
    /// # Errors
    ///
    /// Returns `SigningError::Unsupported` when the repository has no signing
    /// context, otherwise the context's verification failure.
    pub fn verify_catalog(
        &self,
        digest_hex: &str,
        raw_signature: &[u8],
        allow_legacy: bool,
    ) -> Result<(), Error> {
        let context = self.signing.as_ref().ok_or_else(|| SigningError::Unsupported {
            backend: "none".to_string(),
            operation: "verify".to_string(),
        })?;
        context.verify_raw(digest_hex, raw_signature, allow_legacy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_url_single_separator() {
        let plain = Repository::new("main", "https://pkg.example.org/All");
        let slashed = Repository::new("main", "https://pkg.example.org/All/");
        assert_eq!(
            plain.artifact_url("foo-1.2.pkg"),
            "https://pkg.example.org/All/foo-1.2.pkg"
        );
        assert_eq!(
            slashed.artifact_url("foo-1.2.pkg"),
            plain.artifact_url("foo-1.2.pkg")
        );
        assert_eq!(
            slashed.artifact_url("/foo-1.2.pkg"),
            plain.artifact_url("foo-1.2.pkg")
        );
    }

    #[test]
    fn test_local_detection() {
        let local = Repository::new("local", "file:///srv/repo");
        assert!(local.is_local());
        assert_eq!(local.local_root(), Some(PathBuf::from("/srv/repo")));

        let short = Repository::new("local", "FILE:/srv/repo/");
        assert!(short.is_local());
        assert_eq!(short.local_root(), Some(PathBuf::from("/srv/repo/")));

        let hosted = Repository::new("local", "file://srv/repo");
        assert!(hosted.is_local());
        assert_eq!(hosted.local_root(), None);

        let escaped = Repository::new("local", "file:///srv/my%20repo");
        assert_eq!(escaped.local_root(), Some(PathBuf::from("/srv/my repo")));

        let remote = Repository::new("main", "https://pkg.example.org");
        assert!(!remote.is_local());
        assert_eq!(remote.local_root(), None);
    }

    #[test]
    fn test_verify_catalog_without_context() {
        let repo = Repository::new("main", "https://pkg.example.org");
        let err = repo.verify_catalog("abc123", b"sig", false).unwrap_err();
        assert!(matches!(
            err,
            Error::Signing(SigningError::Unsupported { .. })
        ));
    }
}
