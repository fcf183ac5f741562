#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Pluggable signing for repository catalogs and packages
//!
//! A [`SigningContext`] binds one [`SigningBackend`] instance, chosen by name
//! from a [`BackendRegistry`], to a key path and an optional passphrase
//! provider. Backends sign and verify the hexadecimal text of content
//! checksums; signatures can carry a `$PKGSIGN:<backend>$` marker so that
//! multi-backend repositories describe themselves.

pub mod backend;
pub mod context;
pub mod ed25519;
pub mod envelope;
pub mod minisign;
pub mod registry;

pub use backend::{
    Capabilities, Credentials, KeyInfoEntry, KeyParam, Operation, PassphraseProvider,
    SigningBackend,
};
pub use context::{verify_detached, Purpose, SigningContext};
pub use ed25519::Ed25519Backend;
pub use envelope::{Signature, PKGSIGN_HEAD};
pub use self::minisign::MinisignBackend;
pub use registry::{BackendConstructor, BackendRegistry};
