//! Byte transfer into a destination path, with resume

mod file;
mod http;

pub use file::FileTransport;
pub use http::HttpTransport;

use async_trait::async_trait;
use pkgcore_errors::{Error, NetworkError};
use std::path::PathBuf;

use crate::client::{NetClient, NetConfig};
use crate::parse_url;

/// One transfer request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Fully resolved source URL
    pub url: String,
    /// Path of the artifact relative to the repository root
    pub remote_path: String,
    pub dest: PathBuf,
    /// Continue an existing partial file from this byte offset
    pub resume_offset: Option<u64>,
    pub expected_size: u64,
}

impl FetchRequest {
    fn offset(&self) -> u64 {
        self.resume_offset.unwrap_or(0)
    }
}

/// Copies bytes for a [`FetchRequest`] into `dest`
///
/// Implementations leave whatever they wrote in place when they fail; the
/// caller decides whether to keep or remove it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transfer the artifact and return the number of bytes written
    ///
    /// # Errors
    ///
    /// Returns a network or I/O error when the transfer does not complete.
    async fn fetch(&self, request: &FetchRequest) -> Result<u64, Error>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn fetch(&self, request: &FetchRequest) -> Result<u64, Error> {
        (**self).fetch(request).await
    }
}

/// Dispatches on URL scheme to the HTTP or local-file transport
#[derive(Debug, Clone)]
pub struct RepoTransport {
    http: HttpTransport,
    file: FileTransport,
}

impl RepoTransport {
    #[must_use]
    pub fn new(client: NetClient) -> Self {
        Self {
            http: HttpTransport::new(client),
            file: FileTransport,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: NetConfig) -> Result<Self, Error> {
        Ok(Self::new(NetClient::new(config)?))
    }
}

#[async_trait]
impl Transport for RepoTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<u64, Error> {
        let url = parse_url(&request.url)?;
        match url.scheme() {
            "http" | "https" => self.http.fetch(request).await,
            "file" => self.file.fetch(request).await,
            other => Err(NetworkError::UnsupportedProtocol {
                protocol: other.to_string(),
            }
            .into()),
        }
    }
}
