//! Resumable, checksum-gated artifact fetch
//!
//! One call runs at most two attempts. An attempt stats the destination,
//! resumes or skips the transfer, then checks size and checksum. A stale
//! cache entry (wrong size, or a checksum mismatch on bytes that were not
//! freshly downloaded) is deleted and the attempt repeated once. Anything
//! else that goes wrong is terminal and removes the destination.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use pkgcore_errors::{Error, FetchError};
use pkgcore_events::{EventEmitter, EventSender, FailureContext, FetchEvent};
use pkgcore_hash::{ChecksumEngine, Validation};
use pkgcore_net::{FetchRequest, Transport};
use pkgcore_types::{FetchTarget, Package};
use tokio::fs;

use crate::cache_name::CacheNamer;
use crate::repository::Repository;

/// Result of a successful fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Verified artifact on disk
    pub path: PathBuf,
    /// Friendly link, when one was published
    pub link: Option<PathBuf>,
    /// Bytes moved by the transport across all attempts
    pub transferred: u64,
    /// Whether the one allowed retry was used
    pub retried: bool,
}

#[derive(Debug, Clone, Copy)]
enum Mode<'a> {
    Cache,
    Mirror(&'a Path),
}

/// Evidence that the destination does not hold the artifact
#[derive(Debug)]
enum Stale {
    Size { actual: Option<u64> },
    Checksum { actual: String, fresh: bool },
}

impl Stale {
    fn reason(&self) -> &'static str {
        match self {
            Self::Size { .. } => "missing or size mismatch, fetching from remote",
            Self::Checksum { .. } => "checksum mismatch, fetching from remote",
        }
    }

    fn into_error(self, package: String, dest: &Path, target: &FetchTarget<'_>) -> Error {
        match self {
            Self::Size { actual } => FetchError::SizeMismatch {
                package,
                path: dest.display().to_string(),
                expected: target.size,
                actual,
            },
            Self::Checksum { actual, .. } => FetchError::ChecksumMismatch {
                package,
                expected: target.sum.to_string(),
                actual,
            },
        }
        .into()
    }
}

enum Outcome {
    Verified { transferred: u64 },
    /// Local repository file exists; nothing was copied
    Present,
    Stale { stale: Stale, transferred: u64 },
}

/// Fetches package artifacts into the cache or a mirror directory
pub struct Fetcher<T, C> {
    namer: CacheNamer,
    transport: T,
    checksum: C,
    event_sender: Option<EventSender>,
}

impl<T: Transport, C: ChecksumEngine> Fetcher<T, C> {
    pub fn new(namer: CacheNamer, transport: T, checksum: C) -> Self {
        Self {
            namer,
            transport,
            checksum,
            event_sender: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = Some(sender);
        self
    }

    #[must_use]
    pub fn namer(&self) -> &CacheNamer {
        &self.namer
    }

    /// Fetch into the cache and publish the friendly link
    ///
    /// For a local (`file:`) repository nothing is copied; the repository
    /// file itself is returned.
    ///
    /// # Errors
    ///
    /// Returns a `FetchError` naming the package for every terminal failure.
    /// Link publication failures are reported as events only.
    pub async fn fetch(&self, repo: &Repository, package: &Package) -> Result<Fetched, Error> {
        self.run(repo, package, Mode::Cache).await
    }

    /// Fetch to `<dest_dir>/<repopath>`, skipping cache naming and links
    ///
    /// # Errors
    ///
    /// See [`Fetcher::fetch`].
    pub async fn mirror(
        &self,
        repo: &Repository,
        package: &Package,
        dest_dir: &Path,
    ) -> Result<Fetched, Error> {
        self.run(repo, package, Mode::Mirror(dest_dir)).await
    }

    async fn run(
        &self,
        repo: &Repository,
        package: &Package,
        mode: Mode<'_>,
    ) -> Result<Fetched, Error> {
        let target = package.fetch_target()?;
        let name = target.id.to_string();
        let local = repo.is_local() && matches!(mode, Mode::Cache);
        if local && repo.local_root().is_none() {
            let e: Error = FetchError::LocalPathUnresolvable {
                package: name.clone(),
                url: repo.url().to_string(),
            }
            .into();
            self.emit_fetch(FetchEvent::Failed {
                package: name,
                failure: FailureContext::from_error(&e),
            });
            return Err(e);
        }
        let dest = match mode {
            Mode::Cache => {
                let cached = self.namer.cache_path(repo, &target).await;
                self.emit_debug(format!(
                    "{name}: {:?} at {}",
                    cached.status,
                    cached.path.display()
                ));
                cached.path
            }
            Mode::Mirror(dir) => CacheNamer::mirror_path(dir, &target),
        };

        let mut already_tried = false;
        let mut transferred = 0;
        let result = loop {
            match self.attempt(repo, &target, &dest, mode).await {
                Ok(Outcome::Verified { transferred: bytes }) => {
                    break Ok(transferred + bytes);
                }
                Ok(Outcome::Present) => break Ok(0),
                Ok(Outcome::Stale {
                    stale,
                    transferred: bytes,
                }) => {
                    transferred += bytes;
                    let fresh = matches!(stale, Stale::Checksum { fresh: true, .. });
                    if already_tried || fresh || local {
                        break Err(stale.into_error(name.clone(), &dest, &target));
                    }
                    self.emit_fetch(FetchEvent::Retrying {
                        package: name.clone(),
                        reason: stale.reason().to_string(),
                    });
                    self.discard(&dest).await;
                    already_tried = true;
                }
                Err(e) => break Err(e),
            }
        };

        let transferred = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                if !local {
                    self.discard(&dest).await;
                }
                self.emit_fetch(FetchEvent::Failed {
                    package: name,
                    failure: FailureContext::from_error(&e),
                });
                return Err(e);
            }
        };

        let link = if matches!(mode, Mode::Cache) && !local {
            self.publish_link(&target, &dest).await
        } else {
            None
        };

        self.emit_fetch(FetchEvent::Completed {
            package: name,
            path: dest.clone(),
            bytes: transferred,
        });

        Ok(Fetched {
            path: dest,
            link,
            transferred,
            retried: already_tried,
        })
    }

    async fn attempt(
        &self,
        repo: &Repository,
        target: &FetchTarget<'_>,
        dest: &Path,
        mode: Mode<'_>,
    ) -> Result<Outcome, Error> {
        let name = target.id.to_string();
        // Anything that cannot be stat'ed is fetched from scratch
        let existing = fs::metadata(dest).await.ok().map(|meta| meta.len());

        let mut transferred = 0;
        let mut fresh = false;
        match existing {
            Some(len) if len >= target.size => {
                self.emit_fetch(FetchEvent::CacheHit {
                    package: name.clone(),
                    path: dest.to_path_buf(),
                });
            }
            resume_offset => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|e| FetchError::DirectoryCreation {
                            package: name.clone(),
                            path: parent.display().to_string(),
                            message: e.to_string(),
                        })?;
                }

                if repo.url().is_empty() {
                    return Err(FetchError::UrlNotConfigured {
                        package: name,
                        repository: repo.name().to_string(),
                    }
                    .into());
                }
                let url = repo.artifact_url(target.repopath);

                if repo.is_local() && matches!(mode, Mode::Cache) {
                    return match fs::try_exists(dest).await {
                        Ok(true) => Ok(Outcome::Present),
                        _ => Err(FetchError::MissingFromRepository { package: name, url }.into()),
                    };
                }

                if let Some(offset) = resume_offset {
                    self.emit_fetch(FetchEvent::Resuming {
                        package: name.clone(),
                        offset,
                        expected_size: target.size,
                    });
                }
                self.emit_fetch(FetchEvent::Started {
                    package: name.clone(),
                    url: url.clone(),
                    dest: dest.to_path_buf(),
                    expected_size: target.size,
                });

                let request = FetchRequest {
                    url,
                    remote_path: target.repopath.to_string(),
                    dest: dest.to_path_buf(),
                    resume_offset,
                    expected_size: target.size,
                };
                transferred = self.transport.fetch(&request).await.map_err(|e| {
                    FetchError::Transport {
                        package: name.clone(),
                        url: request.url.clone(),
                        message: e.to_string(),
                    }
                })?;
                fresh = resume_offset.is_none();
            }
        }

        // A wrong size already disproves the checksum
        let actual = fs::metadata(dest).await.ok().map(|meta| meta.len());
        if actual != Some(target.size) {
            return Ok(Outcome::Stale {
                stale: Stale::Size { actual },
                transferred,
            });
        }

        match self.checksum.validate_file(dest, target.sum).await? {
            Validation::Match => Ok(Outcome::Verified { transferred }),
            Validation::NotFound => Err(FetchError::ChecksumFileMissing {
                package: name,
                path: dest.display().to_string(),
            }
            .into()),
            Validation::Mismatch { actual } => Ok(Outcome::Stale {
                stale: Stale::Checksum {
                    actual: actual.to_string(),
                    fresh,
                },
                transferred,
            }),
        }
    }

    async fn discard(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => self.emit_warning(format!("cannot remove {}: {e}", path.display())),
        }
    }

    async fn publish_link(&self, target: &FetchTarget<'_>, dest: &Path) -> Option<PathBuf> {
        let base_dir = dest.parent().unwrap_or(self.namer.cache_dir());
        match CacheNamer::create_published_link(target, dest, base_dir).await {
            Ok(link) => {
                self.emit_fetch(FetchEvent::LinkPublished {
                    link: link.clone(),
                    target: CacheNamer::canonical_file_name(target),
                });
                Some(link)
            }
            Err(e) => {
                let link = base_dir.join(CacheNamer::friendly_file_name(target));
                self.emit_fetch(FetchEvent::LinkFailed {
                    link,
                    message: e.to_string(),
                });
                None
            }
        }
    }
}

impl<T, C> EventEmitter for Fetcher<T, C> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}
