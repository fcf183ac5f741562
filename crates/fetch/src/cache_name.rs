//! Cache file naming and friendly-name link publication
//!
//! A cached artifact is stored as `<name>-<version>~<digest><ext>`. The
//! checksum in the name keeps two builds of the same version apart; the
//! friendly link `<name>-<version><ext>` always points at the newest one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use pkgcore_errors::{Error, FetchError};
use pkgcore_types::FetchTarget;
use tokio::fs;

use crate::repository::Repository;

/// Separates the version from the checksum in canonical file names
pub const CHECKSUM_SEPARATOR: char = '~';

const TEMP_LINK_SUFFIX: &str = ".new";

/// What a size check found at the computed cache path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Local repository; the repository file is the cache
    Local,
    /// A file of the expected size is present
    SizeMatches,
    /// Nothing usable is present; the caller should fetch
    Miss,
    /// The artifact has no extension and the size was not checked
    Unchecked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePath {
    pub path: PathBuf,
    pub status: CacheStatus,
}

/// Maps packages to paths under an explicit cache root
#[derive(Debug, Clone)]
pub struct CacheNamer {
    cache_dir: PathBuf,
}

impl CacheNamer {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `<name>-<version>~<digest><ext>`
    #[must_use]
    pub fn canonical_file_name(target: &FetchTarget<'_>) -> String {
        format!(
            "{}{CHECKSUM_SEPARATOR}{}{}",
            target.id,
            target.sum.digest(),
            target.extension().unwrap_or_default()
        )
    }

    /// `<name>-<version><ext>`
    #[must_use]
    pub fn friendly_file_name(target: &FetchTarget<'_>) -> String {
        format!("{}{}", target.id, target.extension().unwrap_or_default())
    }

    /// Path the artifact is cached at, without touching the filesystem
    #[must_use]
    pub fn canonical_path(&self, repo: &Repository, target: &FetchTarget<'_>) -> PathBuf {
        match repo.local_root() {
            Some(root) => root.join(target.repopath),
            None => self.cache_dir.join(Self::canonical_file_name(target)),
        }
    }

    /// Locate the cached artifact and check its size
    ///
    /// A size mismatch is reported as [`CacheStatus::Miss`], never as an error.
    pub async fn cache_path(&self, repo: &Repository, target: &FetchTarget<'_>) -> CachePath {
        let path = self.canonical_path(repo, target);
        let status = if repo.is_local() {
            CacheStatus::Local
        } else if target.extension().is_none() {
            CacheStatus::Unchecked
        } else {
            match fs::metadata(&path).await {
                Ok(meta) if meta.len() == target.size => CacheStatus::SizeMatches,
                _ => CacheStatus::Miss,
            }
        };
        CachePath { path, status }
    }

    /// Destination of a mirror fetch: `<dest_dir>/<repopath>` verbatim
    #[must_use]
    pub fn mirror_path(dest_dir: &Path, target: &FetchTarget<'_>) -> PathBuf {
        dest_dir.join(target.repopath.trim_start_matches('/'))
    }

    /// Point `<base_dir>/<name>-<version><ext>` at `full_path`
    ///
    /// The link is written under a `.new` sibling name and renamed into
    /// place. A stale temporary link from an earlier run is removed first.
    /// The link target is the bare file name of `full_path`, so the link is
    /// relative to `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::LinkPublication` if the temporary link cannot be
    /// created or renamed. Callers treat this as non-fatal.
    pub async fn create_published_link(
        target: &FetchTarget<'_>,
        full_path: &Path,
        base_dir: &Path,
    ) -> Result<PathBuf, Error> {
        let link = base_dir.join(Self::friendly_file_name(target));
        let mut temp = link.clone().into_os_string();
        temp.push(TEMP_LINK_SUFFIX);
        let temp = PathBuf::from(temp);

        let failed = |message: String| FetchError::LinkPublication {
            link: link.display().to_string(),
            message,
        };

        match fs::remove_file(&temp).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(failed(format!("remove {}: {e}", temp.display())).into()),
        }

        let pointee = full_path.file_name().map_or(full_path, Path::new);
        symlink(pointee, &temp)
            .await
            .map_err(|e| failed(format!("symlink: {e}")))?;

        if let Err(e) = fs::rename(&temp, &link).await {
            let _ = fs::remove_file(&temp).await;
            return Err(failed(format!("rename: {e}")).into());
        }

        Ok(link)
    }
}

#[cfg(unix)]
async fn symlink(original: &Path, link: &Path) -> std::io::Result<()> {
    fs::symlink(original, link).await
}

#[cfg(not(unix))]
async fn symlink(_original: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}
