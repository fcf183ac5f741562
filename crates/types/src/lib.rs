#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for pkgcore
//!
//! Package records arrive from the metadata layer; this crate gives them a
//! typed shape and a checked view of the attributes a fetch needs.

pub mod package;

pub use package::{FetchTarget, Package, PackageId, PackageOrigin};

use serde::{Deserialize, Serialize};

/// Output format for CLI rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Tty,
    /// Newline-delimited JSON
    Json,
}
