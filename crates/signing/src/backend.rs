//! The pluggable signing backend interface

use pkgcore_errors::{Error, SigningError};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// An operation a backend may offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Sign,
    Verify,
    VerifyCert,
    Generate,
    KeyInfo,
    PublicKey,
    SignData,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::Sign,
        Operation::Verify,
        Operation::VerifyCert,
        Operation::Generate,
        Operation::KeyInfo,
        Operation::PublicKey,
        Operation::SignData,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sign => "sign",
            Self::Verify => "verify",
            Self::VerifyCert => "verify_cert",
            Self::Generate => "generate",
            Self::KeyInfo => "key_info",
            Self::PublicKey => "public_key",
            Self::SignData => "sign_data",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of operations a backend instance offers
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn with(mut self, op: Operation) -> Self {
        self.0 |= op.bit();
        self
    }

    #[must_use]
    pub fn without(mut self, op: Operation) -> Self {
        self.0 &= !op.bit();
        self
    }

    #[must_use]
    pub fn contains(self, op: Operation) -> bool {
        self.0 & op.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Operation> {
        Operation::ALL.into_iter().filter(move |op| self.contains(*op))
    }
}

impl FromIterator<Operation> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Supplies passphrases for encrypted key material
///
/// `confirm` is set when a new passphrase is being chosen (key generation).
/// Returning `Ok(None)` means "no passphrase": the key is used or written
/// unencrypted.
pub trait PassphraseProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the passphrase cannot be obtained.
    fn passphrase(&self, key_path: &Path, confirm: bool) -> Result<Option<String>, Error>;
}

impl<F> PassphraseProvider for F
where
    F: Fn(&Path, bool) -> Result<Option<String>, Error> + Send + Sync,
{
    fn passphrase(&self, key_path: &Path, confirm: bool) -> Result<Option<String>, Error> {
        self(key_path, confirm)
    }
}

/// Key path and passphrase source handed to every backend call
#[derive(Clone, Copy)]
pub struct Credentials<'a> {
    pub key_path: &'a Path,
    pub passphrase: Option<&'a Arc<dyn PassphraseProvider>>,
}

impl<'a> Credentials<'a> {
    #[must_use]
    pub fn new(key_path: &'a Path) -> Self {
        Self {
            key_path,
            passphrase: None,
        }
    }

    /// Ask the provider for a passphrase, if one is bound
    ///
    /// # Errors
    ///
    /// Propagates provider failures.
    pub fn passphrase(&self, confirm: bool) -> Result<Option<String>, Error> {
        match self.passphrase {
            Some(provider) => provider.passphrase(self.key_path, confirm),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for Credentials<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key_path", &self.key_path)
            .field("passphrase", &self.passphrase.is_some())
            .finish()
    }
}

/// A named key-generation parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParam {
    pub name: String,
    pub value: Vec<u8>,
}

impl KeyParam {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One descriptive entry about the active key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfoEntry {
    pub name: String,
    pub value: String,
}

impl KeyInfoEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A cryptographic signing backend
///
/// `sign`, `verify` and `verify_cert` are required. The remaining operations
/// are optional; a backend advertises what it offers through
/// [`SigningBackend::capabilities`] and the default bodies report
/// [`SigningError::Unsupported`]. Backend-held key material is released when
/// the instance is dropped.
pub trait SigningBackend: Send + Sync {
    /// Registry name of this backend
    fn name(&self) -> &str;

    /// Operations this instance can perform with the key material it holds
    fn capabilities(&self) -> Capabilities;

    /// Sign the hexadecimal text of a content checksum
    ///
    /// # Errors
    ///
    /// Returns an error if no secret key is available or signing fails.
    fn sign(&self, creds: &Credentials<'_>, digest_hex: &str) -> Result<Vec<u8>, Error>;

    /// Verify a signature over the hexadecimal text of a content checksum
    ///
    /// # Errors
    ///
    /// Returns `SigningError::VerificationFailed` when the signature does not
    /// match, or a format error when it cannot be parsed.
    fn verify(
        &self,
        creds: &Credentials<'_>,
        digest_hex: &str,
        signature: &[u8],
        allow_legacy: bool,
    ) -> Result<(), Error>;

    /// Verify against an explicitly supplied public key instead of the
    /// context's key file
    ///
    /// # Errors
    ///
    /// Same as [`SigningBackend::verify`], plus `InvalidPublicKey`.
    fn verify_cert(
        &self,
        creds: &Credentials<'_>,
        public_key: &[u8],
        digest_hex: &str,
        signature: &[u8],
        allow_legacy: bool,
    ) -> Result<(), Error>;

    /// Create new key material at the credentials' key path
    ///
    /// # Errors
    ///
    /// Returns `SigningError::Unsupported` unless overridden.
    fn generate(&mut self, creds: &Credentials<'_>, params: &[KeyParam]) -> Result<(), Error> {
        let _ = (creds, params);
        Err(self.unsupported(Operation::Generate))
    }

    /// # Errors
    ///
    /// Returns `SigningError::Unsupported` unless overridden.
    fn key_info(&self, creds: &Credentials<'_>) -> Result<Vec<KeyInfoEntry>, Error> {
        let _ = creds;
        Err(self.unsupported(Operation::KeyInfo))
    }

    /// Exportable public key in the backend's textual form
    ///
    /// # Errors
    ///
    /// Returns `SigningError::Unsupported` unless overridden.
    fn public_key(&self, creds: &Credentials<'_>) -> Result<Vec<u8>, Error> {
        let _ = creds;
        Err(self.unsupported(Operation::PublicKey))
    }

    /// Sign arbitrary bytes rather than checksum text
    ///
    /// # Errors
    ///
    /// Returns `SigningError::Unsupported` unless overridden.
    fn sign_data(&self, creds: &Credentials<'_>, data: &[u8]) -> Result<Vec<u8>, Error> {
        let _ = (creds, data);
        Err(self.unsupported(Operation::SignData))
    }

    /// Error describing a missing capability of this backend
    fn unsupported(&self, op: Operation) -> Error {
        SigningError::Unsupported {
            backend: self.name().to_string(),
            operation: op.as_str().to_string(),
        }
        .into()
    }
}

/// Read a key file, mapping absence to `KeyNotFound`
pub(crate) fn read_key_file(path: &Path) -> Result<Option<String>, Error> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SigningError::MalformedKey {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
        .into()),
    }
}

pub(crate) fn key_not_found(path: &Path) -> Error {
    SigningError::KeyNotFound {
        path: path.display().to_string(),
    }
    .into()
}

/// `<key>.pub` next to a secret key
pub(crate) fn public_key_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".pub");
    std::path::PathBuf::from(name)
}
