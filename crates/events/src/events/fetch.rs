use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::FailureContext;

/// Events emitted by the cached-fetch state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetchEvent {
    /// A transfer is about to begin
    Started {
        package: String,
        url: String,
        dest: PathBuf,
        expected_size: u64,
    },

    /// A partial file was found and the transfer continues from `offset`
    Resuming {
        package: String,
        offset: u64,
        expected_size: u64,
    },

    /// The destination already had the expected size; only verification runs
    CacheHit { package: String, path: PathBuf },

    /// The destination was discarded and the fetch restarts from scratch
    Retrying { package: String, reason: String },

    Completed {
        package: String,
        path: PathBuf,
        bytes: u64,
    },

    LinkPublished { link: PathBuf, target: String },

    /// Symlink publication failed; the cached artifact is still valid
    LinkFailed { link: PathBuf, message: String },

    Failed {
        package: String,
        failure: FailureContext,
    },
}
