use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Events emitted by signing contexts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SigningEvent {
    ContextCreated {
        backend: String,
        key_path: PathBuf,
        purpose: String, // "signing" or "verification"
    },

    Signed { backend: String, bytes: usize },

    Verified {
        backend: String,
        legacy_allowed: bool,
    },

    VerificationFailed { backend: String, reason: String },

    KeyGenerated { backend: String, key_path: PathBuf },
}
