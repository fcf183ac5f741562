//! Signing error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum SigningError {
    #[error("signing key not found: {path}")]
    KeyNotFound { path: String },

    #[error("malformed key {path}: {reason}")]
    MalformedKey { path: String, reason: String },

    #[error("unsupported key format in {path}")]
    UnsupportedFormat { path: String },

    #[error("{backend} backend does not support {operation}")]
    Unsupported {
        backend: String,
        operation: String,
    },

    #[error("passphrase unavailable: {reason}")]
    Passphrase { reason: String },

    #[error("signing failed: {reason}")]
    SigningFailed { reason: String },

    #[error("signature verification failed: {reason}")]
    VerificationFailed { reason: String },

    #[error("invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("invalid public key format: {0}")]
    InvalidPublicKey(String),

    #[error("signature was produced by {found}, context uses {expected}")]
    BackendMismatch { expected: String, found: String },

    #[error("key generation failed: {reason}")]
    KeyGeneration { reason: String },

    #[error("invalid key parameter: {reason}")]
    InvalidParameter { reason: String },
}

impl UserFacingError for SigningError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::KeyNotFound { .. } => Some("Check the key path or generate a key first."),
            Self::Passphrase { .. } => {
                Some("Set PKGCORE_PASSPHRASE or provide a passphrase for the encrypted key.")
            }
            Self::VerificationFailed { .. } => Some(
                "The signature does not match the trusted key. Refresh the repository keys or contact the repository maintainer.",
            ),
            Self::BackendMismatch { .. } => {
                Some("Select the signing backend named in the signature marker.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::KeyNotFound { .. } => "signing.key_not_found",
            Self::MalformedKey { .. } => "signing.malformed_key",
            Self::UnsupportedFormat { .. } => "signing.unsupported_format",
            Self::Unsupported { .. } => "signing.unsupported_operation",
            Self::Passphrase { .. } => "signing.passphrase",
            Self::SigningFailed { .. } => "signing.signing_failed",
            Self::VerificationFailed { .. } => "signing.verification_failed",
            Self::InvalidSignatureFormat(_) => "signing.invalid_signature_format",
            Self::InvalidPublicKey(_) => "signing.invalid_public_key",
            Self::BackendMismatch { .. } => "signing.backend_mismatch",
            Self::KeyGeneration { .. } => "signing.key_generation",
            Self::InvalidParameter { .. } => "signing.invalid_parameter",
        };
        Some(code)
    }
}
