#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network transport for pkgcore
//!
//! This crate moves artifact bytes from a repository URL into a local path.
//! HTTP transfers resume with `Range` requests; `file:` URLs are copied.
//! Verification and cleanup belong to the caller.

mod client;
mod transport;

pub use client::{NetClient, NetConfig};
pub use transport::{FetchRequest, FileTransport, HttpTransport, RepoTransport, Transport};

use pkgcore_errors::{Error, NetworkError};
use url::Url;

/// Parse and validate a URL
///
/// # Errors
///
/// Returns an error if the URL string is malformed or invalid according to RFC 3986.
pub fn parse_url(url: &str) -> Result<Url, Error> {
    Url::parse(url).map_err(|e| NetworkError::InvalidUrl(e.to_string()).into())
}
