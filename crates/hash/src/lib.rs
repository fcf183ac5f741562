#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Content checksums for pkgcore
//!
//! Catalog entries carry an algorithm-tagged checksum for every artifact.
//! This crate parses those checksums, hashes files in streaming fashion and
//! exposes the [`ChecksumEngine`] seam used by the fetch state machine.

mod engine;

pub use engine::{ChecksumEngine, FileValidator, Validation};

use pkgcore_errors::{Error, StorageError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Size of chunks for streaming hash computation
const CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// Hash algorithm a checksum was produced with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Sha256,
    Blake3,
}

impl ChecksumAlgorithm {
    /// Tag used in the textual checksum form
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "sha256" => Some(Self::Sha256),
            "blake3" => Some(Self::Blake3),
            _ => None,
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// An algorithm-tagged content checksum
///
/// The textual form is `<algorithm>:<hex>`. Untagged hex is read as SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    algorithm: ChecksumAlgorithm,
    digest: String,
}

impl Checksum {
    /// Build a checksum from an algorithm and hex digest
    ///
    /// # Errors
    /// Returns an error if `digest` is empty or not hexadecimal.
    pub fn new(algorithm: ChecksumAlgorithm, digest: &str) -> Result<Self, Error> {
        if digest.is_empty() || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StorageError::CorruptedData {
                message: format!("invalid checksum digest: {digest:?}"),
            }
            .into());
        }
        Ok(Self {
            algorithm,
            digest: digest.to_ascii_lowercase(),
        })
    }

    /// Parse the textual form (`sha256:<hex>`, `blake3:<hex>` or bare hex)
    ///
    /// # Errors
    /// Returns an error for unknown algorithm tags or non-hex digests.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        match s.split_once(':') {
            Some((tag, digest)) => {
                let algorithm =
                    ChecksumAlgorithm::from_tag(tag).ok_or_else(|| StorageError::CorruptedData {
                        message: format!("unknown checksum algorithm: {tag}"),
                    })?;
                Self::new(algorithm, digest)
            }
            None => Self::new(ChecksumAlgorithm::Sha256, s),
        }
    }

    /// Compute the checksum of a byte slice
    #[must_use]
    pub fn of_bytes(algorithm: ChecksumAlgorithm, data: &[u8]) -> Self {
        let digest = match algorithm {
            ChecksumAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
            ChecksumAlgorithm::Blake3 => blake3::hash(data).to_hex().to_string(),
        };
        Self { algorithm, digest }
    }

    /// Compute the checksum of a file by streaming it
    ///
    /// # Errors
    /// Returns `StorageError::PathNotFound` when the file does not exist and an
    /// I/O error for any other read failure.
    pub async fn of_file(algorithm: ChecksumAlgorithm, path: &Path) -> Result<Self, Error> {
        let mut file = File::open(path)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, path))?;
        let mut buffer = vec![0; CHUNK_SIZE];

        let digest = match algorithm {
            ChecksumAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                loop {
                    let n = file.read(&mut buffer).await?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buffer[..n]);
                }
                hex::encode(hasher.finalize())
            }
            ChecksumAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                loop {
                    let n = file.read(&mut buffer).await?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buffer[..n]);
                }
                hasher.finalize().to_hex().to_string()
            }
        };

        Ok(Self { algorithm, digest })
    }

    #[must_use]
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Lowercase hex digest without the algorithm tag
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

impl FromStr for Checksum {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Checksum {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_known_digests() {
        let sha = Checksum::of_bytes(ChecksumAlgorithm::Sha256, b"hello world");
        assert_eq!(
            sha.digest(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );

        // Known BLAKE3 hash of "hello world"
        let b3 = Checksum::of_bytes(ChecksumAlgorithm::Blake3, b"hello world");
        assert_eq!(
            b3.digest(),
            "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
        );
    }

    #[test]
    fn test_parse_tagged_and_untagged() {
        let tagged = Checksum::parse("blake3:ABC123").unwrap();
        assert_eq!(tagged.algorithm(), ChecksumAlgorithm::Blake3);
        assert_eq!(tagged.digest(), "abc123");
        assert_eq!(tagged.to_string(), "blake3:abc123");

        let bare = Checksum::parse("abc123").unwrap();
        assert_eq!(bare.algorithm(), ChecksumAlgorithm::Sha256);

        assert!(Checksum::parse("md5:abc").is_err());
        assert!(Checksum::parse("sha256:xyz").is_err());
        assert!(Checksum::parse("").is_err());
    }

    #[test]
    fn test_checksum_serialization() {
        let sum = Checksum::of_bytes(ChecksumAlgorithm::Sha256, b"test");
        let json = serde_json::to_string(&sum).unwrap();
        assert!(json.starts_with("\"sha256:"));
        let back: Checksum = serde_json::from_str(&json).unwrap();
        assert_eq!(sum, back);
    }

    #[tokio::test]
    async fn test_of_file_matches_of_bytes() {
        use std::io::Write;
        let mut temp = NamedTempFile::new().unwrap();
        let data = vec![7u8; CHUNK_SIZE * 2 + 13];
        temp.write_all(&data).unwrap();

        for algorithm in [ChecksumAlgorithm::Sha256, ChecksumAlgorithm::Blake3] {
            let from_file = Checksum::of_file(algorithm, temp.path()).await.unwrap();
            assert_eq!(from_file, Checksum::of_bytes(algorithm, &data));
        }
    }

    #[tokio::test]
    async fn test_of_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Checksum::of_file(ChecksumAlgorithm::Sha256, &dir.path().join("nope"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::PathNotFound { .. })
        ));
    }
}
