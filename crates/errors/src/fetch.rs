//! Cached-fetch error types
//!
//! Every variant names the package as `<name>-<version>` so operator output
//! can be traced back to a catalog entry.

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

const REFRESH_HINT: &str = "Force a catalog refresh (`pkgcore update --force`) and retry.";

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum FetchError {
    #[error("{package}: not fetchable: {reason}")]
    NotFetchable { package: String, reason: String },

    #[error("{package}: cannot create directory {path}: {message}")]
    DirectoryCreation {
        package: String,
        path: String,
        message: String,
    },

    #[error("{package}: repository {repository} has no URL defined")]
    UrlNotConfigured { package: String, repository: String },

    #[error("{package}: fetching {url} failed: {message}")]
    Transport {
        package: String,
        url: String,
        message: String,
    },

    #[error("{package}: {url} does not name a local directory")]
    LocalPathUnresolvable { package: String, url: String },

    #[error("cached package {package}: {url} is missing from repo")]
    MissingFromRepository { package: String, url: String },

    #[error("cached package {package}: missing or size mismatch at {path} (expected {expected} bytes), cannot continue")]
    SizeMismatch {
        package: String,
        path: String,
        expected: u64,
        actual: Option<u64>,
    },

    #[error("{package} missing from repository: {path} vanished before checksum")]
    ChecksumFileMissing { package: String, path: String },

    #[error("{package} failed checksum from repository: expected {expected}, got {actual}")]
    ChecksumMismatch {
        package: String,
        expected: String,
        actual: String,
    },

    #[error("cannot publish link {link}: {message}")]
    LinkPublication { link: String, message: String },
}

impl FetchError {
    /// Package identity carried by this error, when there is one
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        match self {
            Self::NotFetchable { package, .. }
            | Self::DirectoryCreation { package, .. }
            | Self::UrlNotConfigured { package, .. }
            | Self::Transport { package, .. }
            | Self::LocalPathUnresolvable { package, .. }
            | Self::MissingFromRepository { package, .. }
            | Self::SizeMismatch { package, .. }
            | Self::ChecksumFileMissing { package, .. }
            | Self::ChecksumMismatch { package, .. } => Some(package),
            Self::LinkPublication { .. } => None,
        }
    }
}

impl UserFacingError for FetchError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::SizeMismatch { .. }
            | Self::ChecksumMismatch { .. }
            | Self::ChecksumFileMissing { .. }
            | Self::MissingFromRepository { .. } => Some(REFRESH_HINT),
            Self::UrlNotConfigured { .. } => {
                Some("Set the repository url in the configuration file.")
            }
            Self::LocalPathUnresolvable { .. } => {
                Some("Use a file:///absolute/path URL without a host for local repositories.")
            }
            Self::DirectoryCreation { .. } => {
                Some("Ensure the cache directory is writable or point cache_dir elsewhere.")
            }
            Self::Transport { .. } => Some("Check network connectivity and retry."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotFetchable { .. } => "fetch.not_fetchable",
            Self::DirectoryCreation { .. } => "fetch.directory_creation",
            Self::UrlNotConfigured { .. } => "fetch.url_not_configured",
            Self::Transport { .. } => "fetch.transport",
            Self::LocalPathUnresolvable { .. } => "fetch.local_path_unresolvable",
            Self::MissingFromRepository { .. } => "fetch.missing_from_repository",
            Self::SizeMismatch { .. } => "fetch.size_mismatch",
            Self::ChecksumFileMissing { .. } => "fetch.checksum_file_missing",
            Self::ChecksumMismatch { .. } => "fetch.checksum_mismatch",
            Self::LinkPublication { .. } => "fetch.link_publication",
        };
        Some(code)
    }
}
