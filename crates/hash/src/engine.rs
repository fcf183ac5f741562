//! Checksum validation seam used by the fetch state machine

use crate::Checksum;
use async_trait::async_trait;
use pkgcore_errors::{Error, StorageError};
use std::path::Path;

/// Outcome of validating a file against an expected checksum
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Match,
    Mismatch { actual: Checksum },
    /// The file disappeared before it could be hashed
    NotFound,
}

/// Validates files against catalog checksums
#[async_trait]
pub trait ChecksumEngine: Send + Sync {
    /// Hash `path` with the algorithm of `expected` and compare.
    ///
    /// # Errors
    ///
    /// Returns an error for I/O failures other than a missing file, which is
    /// reported as [`Validation::NotFound`].
    async fn validate_file(&self, path: &Path, expected: &Checksum) -> Result<Validation, Error>;
}

/// Streaming file validator backed by [`Checksum::of_file`]
#[derive(Debug, Default, Clone, Copy)]
pub struct FileValidator;

#[async_trait]
impl ChecksumEngine for FileValidator {
    async fn validate_file(&self, path: &Path, expected: &Checksum) -> Result<Validation, Error> {
        match Checksum::of_file(expected.algorithm(), path).await {
            Ok(actual) if actual == *expected => Ok(Validation::Match),
            Ok(actual) => Ok(Validation::Mismatch { actual }),
            Err(Error::Storage(StorageError::PathNotFound { .. })) => Ok(Validation::NotFound),
            Err(e) => Err(e),
        }
    }
}
