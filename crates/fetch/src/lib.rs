#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Cached package retrieval
//!
//! [`Fetcher`] moves one package artifact from a [`Repository`] into the
//! local cache (or a mirror directory), resuming partial files and accepting
//! the result only once its size and checksum match the catalog.
//! [`CacheNamer`] decides where artifacts live and publishes the
//! human-readable link next to them.

mod cache_name;
mod orchestrator;
mod repository;

pub use cache_name::{CacheNamer, CachePath, CacheStatus, CHECKSUM_SEPARATOR};
pub use orchestrator::{Fetched, Fetcher};
pub use repository::Repository;
