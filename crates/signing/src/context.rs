//! Signing context: one backend instance plus the credentials it operates with

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pkgcore_errors::{Error, SigningError};
use pkgcore_events::{EventEmitter, EventSender, SigningEvent};

use crate::backend::{
    Capabilities, Credentials, KeyInfoEntry, KeyParam, Operation, PassphraseProvider,
    SigningBackend,
};
use crate::envelope::Signature;
use crate::registry::{BackendConstructor, BackendRegistry};

/// What a context was opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Signing,
    Verification,
}

impl Purpose {
    fn required(self) -> Operation {
        match self {
            Self::Signing => Operation::Sign,
            Self::Verification => Operation::Verify,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Signing => "signing",
            Self::Verification => "verification",
        }
    }
}

/// An open handle bound to exactly one backend instance
///
/// Every backend operation is routed through the context, which supplies the
/// key path and passphrase provider and turns a missing capability into
/// `SigningError::Unsupported` without calling the backend. Dropping the
/// context (or calling [`SigningContext::close`]) releases the backend and
/// the key material it holds.
pub struct SigningContext {
    name: String,
    purpose: Purpose,
    constructor: BackendConstructor,
    backend: Box<dyn SigningBackend>,
    key_path: PathBuf,
    passphrase: Option<Arc<dyn PassphraseProvider>>,
    event_sender: Option<EventSender>,
}

impl SigningContext {
    /// Open a context that must be able to sign
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownSigningBackend` for an unregistered name,
    /// the backend's constructor failure, or `SigningError::Unsupported` when
    /// the loaded key cannot sign (for example a public key).
    pub fn new_for_signing(
        registry: &BackendRegistry,
        backend: &str,
        key_path: impl Into<PathBuf>,
    ) -> Result<Self, Error> {
        Self::open(registry, backend, key_path.into(), Purpose::Signing)
    }

    /// Open a context that must be able to verify
    ///
    /// # Errors
    ///
    /// Same as [`SigningContext::new_for_signing`], checked against `verify`.
    pub fn new_for_verification(
        registry: &BackendRegistry,
        backend: &str,
        key_path: impl Into<PathBuf>,
    ) -> Result<Self, Error> {
        Self::open(registry, backend, key_path.into(), Purpose::Verification)
    }

    fn open(
        registry: &BackendRegistry,
        name: &str,
        key_path: PathBuf,
        purpose: Purpose,
    ) -> Result<Self, Error> {
        let constructor = registry.constructor(name)?;
        let backend = constructor(&key_path)?;
        let context = Self {
            name: name.to_string(),
            purpose,
            constructor,
            backend,
            key_path,
            passphrase: None,
            event_sender: None,
        };
        context.require(purpose.required())?;
        Ok(context)
    }

    /// Attach an event sender for signing events
    #[must_use]
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = Some(sender);
        self.emit_signing(SigningEvent::ContextCreated {
            backend: self.name.clone(),
            key_path: self.key_path.clone(),
            purpose: self.purpose.as_str().to_string(),
        });
        self
    }

    /// Attach a passphrase provider, keeping the current key path
    #[must_use]
    pub fn with_passphrase(mut self, provider: Arc<dyn PassphraseProvider>) -> Self {
        self.passphrase = Some(provider);
        self
    }

    /// Rebind the passphrase provider and key path
    ///
    /// The backend is rebuilt for the new path so that it holds the matching
    /// key material. On failure the context keeps its previous binding.
    ///
    /// # Errors
    ///
    /// Returns the backend's constructor failure for the new path.
    pub fn set_credentials(
        &mut self,
        passphrase: Option<Arc<dyn PassphraseProvider>>,
        key_path: impl Into<PathBuf>,
    ) -> Result<(), Error> {
        let key_path = key_path.into();
        if key_path != self.key_path {
            self.backend = (self.constructor)(&key_path)?;
            self.key_path = key_path;
        }
        self.passphrase = passphrase;
        Ok(())
    }

    /// Release the backend and its key material
    pub fn close(self) {
        drop(self);
    }

    #[must_use]
    pub fn backend_name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    #[must_use]
    pub fn purpose(&self) -> Purpose {
        self.purpose
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    /// Sign checksum text; the result is tagged with this context's backend
    ///
    /// # Errors
    ///
    /// Returns `SigningError::Unsupported` if the backend cannot sign, or the
    /// backend's failure.
    pub fn sign(&self, digest_hex: &str) -> Result<Signature, Error> {
        self.require(Operation::Sign)?;
        let payload = self.backend.sign(&self.credentials(), digest_hex)?;
        self.emit_signing(SigningEvent::Signed {
            backend: self.name.clone(),
            bytes: payload.len(),
        });
        Ok(Signature::tagged(self.name.clone(), payload))
    }

    /// Verify a signature over checksum text
    ///
    /// An untagged signature is attributed to this context's backend.
    ///
    /// # Errors
    ///
    /// Returns `SigningError::BackendMismatch` when the signature names another
    /// backend, `SigningError::VerificationFailed` when it does not match.
    pub fn verify(
        &self,
        digest_hex: &str,
        signature: &Signature,
        allow_legacy: bool,
    ) -> Result<(), Error> {
        self.require(Operation::Verify)?;
        self.check_backend(signature)?;
        let result = self.backend.verify(
            &self.credentials(),
            digest_hex,
            signature.payload(),
            allow_legacy,
        );
        self.report_verification(&result, allow_legacy);
        result
    }

    /// Verify raw signature bytes, honouring a `$PKGSIGN:` marker
    ///
    /// # Errors
    ///
    /// See [`SigningContext::verify`].
    pub fn verify_raw(&self, digest_hex: &str, raw: &[u8], allow_legacy: bool) -> Result<(), Error> {
        let signature = Signature::parse(raw)?;
        self.verify(digest_hex, &signature, allow_legacy)
    }

    /// Verify against an explicitly supplied public key
    ///
    /// # Errors
    ///
    /// See [`SigningContext::verify`].
    pub fn verify_cert(
        &self,
        public_key: &[u8],
        digest_hex: &str,
        signature: &Signature,
        allow_legacy: bool,
    ) -> Result<(), Error> {
        self.require(Operation::VerifyCert)?;
        self.check_backend(signature)?;
        let result = self.backend.verify_cert(
            &self.credentials(),
            public_key,
            digest_hex,
            signature.payload(),
            allow_legacy,
        );
        self.report_verification(&result, allow_legacy);
        result
    }

    /// Generate new key material at the context's key path
    ///
    /// # Errors
    ///
    /// Returns `SigningError::Unsupported` if the backend cannot generate keys
    /// for this instance, or the backend's failure.
    pub fn generate(&mut self, params: &[KeyParam]) -> Result<(), Error> {
        self.require(Operation::Generate)?;
        let creds = Credentials {
            key_path: &self.key_path,
            passphrase: self.passphrase.as_ref(),
        };
        self.backend.generate(&creds, params)?;
        self.emit_signing(SigningEvent::KeyGenerated {
            backend: self.name.clone(),
            key_path: self.key_path.clone(),
        });
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SigningError::Unsupported` if the backend offers no key info.
    pub fn key_info(&self) -> Result<Vec<KeyInfoEntry>, Error> {
        self.require(Operation::KeyInfo)?;
        self.backend.key_info(&self.credentials())
    }

    /// # Errors
    ///
    /// Returns `SigningError::Unsupported` if the backend has no exportable
    /// public key.
    pub fn public_key(&self) -> Result<Vec<u8>, Error> {
        self.require(Operation::PublicKey)?;
        self.backend.public_key(&self.credentials())
    }

    /// Sign arbitrary bytes
    ///
    /// # Errors
    ///
    /// Returns `SigningError::Unsupported` if the backend cannot sign raw data.
    pub fn sign_data(&self, data: &[u8]) -> Result<Signature, Error> {
        self.require(Operation::SignData)?;
        let payload = self.backend.sign_data(&self.credentials(), data)?;
        self.emit_signing(SigningEvent::Signed {
            backend: self.name.clone(),
            bytes: payload.len(),
        });
        Ok(Signature::tagged(self.name.clone(), payload))
    }

    fn credentials(&self) -> Credentials<'_> {
        Credentials {
            key_path: &self.key_path,
            passphrase: self.passphrase.as_ref(),
        }
    }

    fn require(&self, op: Operation) -> Result<(), Error> {
        if self.backend.capabilities().contains(op) {
            Ok(())
        } else {
            Err(SigningError::Unsupported {
                backend: self.name.clone(),
                operation: op.as_str().to_string(),
            }
            .into())
        }
    }

    fn check_backend(&self, signature: &Signature) -> Result<(), Error> {
        match signature.backend() {
            Some(found) if found != self.name => Err(SigningError::BackendMismatch {
                expected: self.name.clone(),
                found: found.to_string(),
            }
            .into()),
            _ => Ok(()),
        }
    }

    fn report_verification(&self, result: &Result<(), Error>, allow_legacy: bool) {
        match result {
            Ok(()) => self.emit_signing(SigningEvent::Verified {
                backend: self.name.clone(),
                legacy_allowed: allow_legacy,
            }),
            Err(e) => self.emit_signing(SigningEvent::VerificationFailed {
                backend: self.name.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

impl EventEmitter for SigningContext {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningContext")
            .field("backend", &self.name)
            .field("purpose", &self.purpose)
            .field("key_path", &self.key_path)
            .field("capabilities", &self.capabilities())
            .finish_non_exhaustive()
    }
}

/// Verify a detached signature, choosing the backend from its marker
///
/// Untagged signatures are verified with `default_backend`.
///
/// # Errors
///
/// Returns `ConfigError::UnknownSigningBackend` if the marker names an
/// unregistered backend, otherwise see [`SigningContext::verify`].
pub fn verify_detached(
    registry: &BackendRegistry,
    default_backend: &str,
    key_path: &Path,
    digest_hex: &str,
    raw: &[u8],
    allow_legacy: bool,
) -> Result<(), Error> {
    let signature = Signature::parse(raw)?;
    let backend = signature.backend().unwrap_or(default_backend);
    let context = SigningContext::new_for_verification(registry, backend, key_path)?;
    context.verify(digest_hex, &signature, allow_legacy)
}
