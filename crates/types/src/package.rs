//! Package-related type definitions

use pkgcore_errors::FetchError;
use pkgcore_hash::Checksum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a package
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageId {
    pub name: String,
    pub version: String,
}

impl PackageId {
    /// Create a new package ID
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// Where a package record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageOrigin {
    /// Listed in a remote repository catalog
    Remote,
    /// Recorded in the local package database
    Installed,
}

/// Package attributes as supplied by the metadata layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    #[serde(flatten)]
    pub id: PackageId,
    pub origin: PackageOrigin,
    /// Path of the artifact relative to the repository URL
    #[serde(default)]
    pub repopath: Option<String>,
    /// Expected artifact size in bytes
    #[serde(default)]
    pub pkgsize: Option<u64>,
    #[serde(default)]
    pub sum: Option<Checksum>,
}

impl Package {
    /// Create a remote package record with every fetch attribute populated
    pub fn remote(
        name: impl Into<String>,
        version: impl Into<String>,
        repopath: impl Into<String>,
        pkgsize: u64,
        sum: Checksum,
    ) -> Self {
        Self {
            id: PackageId::new(name, version),
            origin: PackageOrigin::Remote,
            repopath: Some(repopath.into()),
            pkgsize: Some(pkgsize),
            sum: Some(sum),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.id.name
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.id.version
    }

    /// Borrow the attributes required to fetch this package.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::NotFetchable` unless the package is remote and its
    /// repopath, size and checksum are all populated.
    pub fn fetch_target(&self) -> Result<FetchTarget<'_>, FetchError> {
        let not_fetchable = |reason: &str| FetchError::NotFetchable {
            package: self.id.to_string(),
            reason: reason.to_string(),
        };

        if self.origin != PackageOrigin::Remote {
            return Err(not_fetchable("package is not from a remote repository"));
        }
        let repopath = self
            .repopath
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| not_fetchable("repopath is not set"))?;
        let size = self.pkgsize.ok_or_else(|| not_fetchable("size is not set"))?;
        let sum = self
            .sum
            .as_ref()
            .ok_or_else(|| not_fetchable("checksum is not set"))?;

        Ok(FetchTarget {
            id: &self.id,
            repopath,
            size,
            sum,
        })
    }
}

/// A fetchable view of a [`Package`]
#[derive(Debug, Clone, Copy)]
pub struct FetchTarget<'a> {
    pub id: &'a PackageId,
    pub repopath: &'a str,
    pub size: u64,
    pub sum: &'a Checksum,
}

impl FetchTarget<'_> {
    /// File extension of the artifact including the leading dot, if any
    ///
    /// Dots inside a leading `<name>-<version>` are part of the version, not
    /// an extension.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        let file_name = self.repopath.rsplit('/').next().unwrap_or(self.repopath);
        let stem = self.id.to_string();
        let tail = file_name.strip_prefix(stem.as_str()).unwrap_or(file_name);
        let idx = tail.rfind('.')?;
        Some(&file_name[file_name.len() - tail.len() + idx..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum() -> Checksum {
        Checksum::parse("abc123").unwrap()
    }

    #[test]
    fn test_package_id_display() {
        let id = PackageId::new("foo", "1.2");
        assert_eq!(id.to_string(), "foo-1.2");
    }

    #[test]
    fn test_fetch_target_requires_remote_fields() {
        let pkg = Package::remote("foo", "1.2", "All/foo-1.2.pkg", 1000, sum());
        let target = pkg.fetch_target().unwrap();
        assert_eq!(target.size, 1000);
        assert_eq!(target.extension(), Some(".pkg"));

        let mut installed = pkg.clone();
        installed.origin = PackageOrigin::Installed;
        assert!(matches!(
            installed.fetch_target(),
            Err(FetchError::NotFetchable { .. })
        ));

        let mut no_path = pkg.clone();
        no_path.repopath = None;
        assert!(no_path.fetch_target().is_err());

        let mut no_size = pkg;
        no_size.pkgsize = None;
        let err = no_size.fetch_target().unwrap_err();
        assert!(err.to_string().contains("foo-1.2"));
    }

    #[test]
    fn test_extension_ignores_directory_dots() {
        let pkg = Package::remote("foo", "1.2", "v1.0/foo", 10, sum());
        assert_eq!(pkg.fetch_target().unwrap().extension(), None);

        let pkg = Package::remote("foo", "1.2", "All/foo-1.2.tar.zst", 10, sum());
        assert_eq!(pkg.fetch_target().unwrap().extension(), Some(".zst"));
    }

    #[test]
    fn test_version_dots_are_not_an_extension() {
        let pkg = Package::remote("foo", "1.2", "All/foo-1.2", 10, sum());
        assert_eq!(pkg.fetch_target().unwrap().extension(), None);

        let pkg = Package::remote("libfoo", "2.4.1nb3", "All/libfoo-2.4.1nb3.tgz", 10, sum());
        assert_eq!(pkg.fetch_target().unwrap().extension(), Some(".tgz"));

        // Names that do not follow <name>-<version> fall back to the last dot
        let pkg = Package::remote("foo", "1.2", "All/foo_1.2.pkg", 10, sum());
        assert_eq!(pkg.fetch_target().unwrap().extension(), Some(".pkg"));
    }
}
