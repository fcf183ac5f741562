//! Plain Ed25519 backend
//!
//! Key files are single lines of the form `ed25519-secret:<base64 seed>` or
//! `ed25519-public:<base64 key>`; generated secret keys get their public half
//! written to `<key>.pub`. Signatures are base64 text. This scheme has no
//! legacy encoding, so `allow_legacy` never changes the outcome.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use pkgcore_errors::{Error, SigningError};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::backend::{
    key_not_found, public_key_path, read_key_file, Capabilities, Credentials, KeyInfoEntry,
    KeyParam, Operation, SigningBackend,
};

const SECRET_PREFIX: &str = "ed25519-secret:";
const PUBLIC_PREFIX: &str = "ed25519-public:";

enum KeyMaterial {
    Absent,
    Public(VerifyingKey),
    Secret(SigningKey),
}

/// Signing backend using raw Ed25519 keys
pub struct Ed25519Backend {
    key: KeyMaterial,
}

impl Ed25519Backend {
    pub const NAME: &'static str = "ed25519";

    /// # Errors
    ///
    /// Returns `MalformedKey` or `UnsupportedFormat` when the file exists but
    /// does not hold an Ed25519 key line.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let key = match read_key_file(path)? {
            Some(contents) => parse_key(path, &contents)?,
            None => KeyMaterial::Absent,
        };
        Ok(Self { key })
    }

    /// Registry constructor
    ///
    /// # Errors
    ///
    /// See [`Ed25519Backend::load`].
    pub fn constructor(path: &Path) -> Result<Box<dyn SigningBackend>, Error> {
        Ok(Box::new(Self::load(path)?))
    }

    fn signing_key(&self, creds: &Credentials<'_>) -> Result<&SigningKey, Error> {
        match &self.key {
            KeyMaterial::Secret(sk) => Ok(sk),
            KeyMaterial::Public(_) => Err(self.unsupported(Operation::Sign)),
            KeyMaterial::Absent => Err(key_not_found(creds.key_path)),
        }
    }

    fn verifying_key(&self, creds: &Credentials<'_>) -> Result<VerifyingKey, Error> {
        match &self.key {
            KeyMaterial::Secret(sk) => Ok(sk.verifying_key()),
            KeyMaterial::Public(vk) => Ok(*vk),
            KeyMaterial::Absent => Err(key_not_found(creds.key_path)),
        }
    }

    fn sign_bytes(&self, creds: &Credentials<'_>, data: &[u8]) -> Result<Vec<u8>, Error> {
        let signature = self.signing_key(creds)?.sign(data);
        Ok(BASE64.encode(signature.to_bytes()).into_bytes())
    }
}

impl SigningBackend for Ed25519Backend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capabilities(&self) -> Capabilities {
        let all: Capabilities = Operation::ALL.into_iter().collect();
        match self.key {
            KeyMaterial::Absent => all,
            KeyMaterial::Secret(_) => all.without(Operation::Generate),
            KeyMaterial::Public(_) => all
                .without(Operation::Sign)
                .without(Operation::SignData)
                .without(Operation::Generate),
        }
    }

    fn sign(&self, creds: &Credentials<'_>, digest_hex: &str) -> Result<Vec<u8>, Error> {
        self.sign_bytes(creds, digest_hex.as_bytes())
    }

    fn verify(
        &self,
        creds: &Credentials<'_>,
        digest_hex: &str,
        signature: &[u8],
        _allow_legacy: bool,
    ) -> Result<(), Error> {
        let key = self.verifying_key(creds)?;
        verify_with(&key, digest_hex.as_bytes(), signature)
    }

    fn verify_cert(
        &self,
        _creds: &Credentials<'_>,
        public_key: &[u8],
        digest_hex: &str,
        signature: &[u8],
        _allow_legacy: bool,
    ) -> Result<(), Error> {
        let key = decode_public_key(public_key)?;
        verify_with(&key, digest_hex.as_bytes(), signature)
    }

    fn generate(&mut self, creds: &Credentials<'_>, params: &[KeyParam]) -> Result<(), Error> {
        let mut seed = None;
        for param in params {
            match param.name.as_str() {
                "seed" => {
                    let bytes: [u8; 32] = param.value.as_slice().try_into().map_err(|_| {
                        SigningError::InvalidParameter {
                            reason: format!("seed must be 32 bytes, got {}", param.value.len()),
                        }
                    })?;
                    seed = Some(bytes);
                }
                other => {
                    return Err(SigningError::InvalidParameter {
                        reason: format!("ed25519 does not accept parameter {other:?}"),
                    }
                    .into())
                }
            }
        }

        if !matches!(self.key, KeyMaterial::Absent) || creds.key_path.exists() {
            return Err(SigningError::KeyGeneration {
                reason: format!("{} already exists", creds.key_path.display()),
            }
            .into());
        }

        let signing_key = match seed {
            Some(bytes) => SigningKey::from_bytes(&bytes),
            None => SigningKey::generate(&mut OsRng),
        };

        write_key(
            creds.key_path,
            &format!("{SECRET_PREFIX}{}\n", BASE64.encode(signing_key.to_bytes())),
        )?;
        write_key(
            &public_key_path(creds.key_path),
            &encode_public_key(&signing_key.verifying_key()),
        )?;

        self.key = KeyMaterial::Secret(signing_key);
        Ok(())
    }

    fn key_info(&self, creds: &Credentials<'_>) -> Result<Vec<KeyInfoEntry>, Error> {
        let key = self.verifying_key(creds)?;
        let kind = match self.key {
            KeyMaterial::Secret(_) => "secret",
            _ => "public",
        };
        Ok(vec![
            KeyInfoEntry::new("algorithm", "Ed25519"),
            KeyInfoEntry::new("fingerprint", fingerprint(&key)),
            KeyInfoEntry::new("kind", kind),
        ])
    }

    fn public_key(&self, creds: &Credentials<'_>) -> Result<Vec<u8>, Error> {
        let key = self.verifying_key(creds)?;
        Ok(encode_public_key(&key).into_bytes())
    }

    fn sign_data(&self, creds: &Credentials<'_>, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.sign_bytes(creds, data)
    }
}

/// SHA-256 fingerprint of a public key, hex encoded
#[must_use]
pub fn fingerprint(key: &VerifyingKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

fn encode_public_key(key: &VerifyingKey) -> String {
    format!("{PUBLIC_PREFIX}{}\n", BASE64.encode(key.as_bytes()))
}

fn parse_key(path: &Path, contents: &str) -> Result<KeyMaterial, Error> {
    let line = contents.trim();
    if let Some(b64) = line.strip_prefix(SECRET_PREFIX) {
        let bytes = decode_32(b64).map_err(|reason| malformed(path, reason))?;
        Ok(KeyMaterial::Secret(SigningKey::from_bytes(&bytes)))
    } else if let Some(b64) = line.strip_prefix(PUBLIC_PREFIX) {
        let bytes = decode_32(b64).map_err(|reason| malformed(path, reason))?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|e| malformed(path, e))?;
        Ok(KeyMaterial::Public(key))
    } else {
        Err(SigningError::UnsupportedFormat {
            path: path.display().to_string(),
        }
        .into())
    }
}

/// Accepts the textual `ed25519-public:` form or 32 raw key bytes
fn decode_public_key(public_key: &[u8]) -> Result<VerifyingKey, Error> {
    let bytes: [u8; 32] = if let Ok(raw) = <[u8; 32]>::try_from(public_key) {
        raw
    } else {
        let text = std::str::from_utf8(public_key)
            .map_err(|_| SigningError::InvalidPublicKey("public key is not UTF-8".to_string()))?;
        let b64 = text
            .trim()
            .strip_prefix(PUBLIC_PREFIX)
            .ok_or_else(|| SigningError::InvalidPublicKey("missing ed25519-public prefix".into()))?;
        decode_32(b64).map_err(SigningError::InvalidPublicKey)?
    };
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| SigningError::InvalidPublicKey(e.to_string()).into())
}

fn decode_32(b64: &str) -> Result<[u8; 32], String> {
    let bytes = BASE64.decode(b64.trim()).map_err(|e| e.to_string())?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| format!("key must be 32 bytes, got {len}"))
}

fn verify_with(key: &VerifyingKey, message: &[u8], signature: &[u8]) -> Result<(), Error> {
    let text = std::str::from_utf8(signature).map_err(|_| {
        SigningError::InvalidSignatureFormat("signature is not UTF-8".to_string())
    })?;
    let bytes = BASE64
        .decode(text.trim())
        .map_err(|e| SigningError::InvalidSignatureFormat(e.to_string()))?;
    let signature = Signature::from_slice(&bytes)
        .map_err(|e| SigningError::InvalidSignatureFormat(e.to_string()))?;
    key.verify(message, &signature)
        .map_err(|e| SigningError::VerificationFailed {
            reason: e.to_string(),
        })?;
    Ok(())
}

fn write_key(path: &Path, contents: &str) -> Result<(), Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
    }
    std::fs::write(path, contents).map_err(|e| Error::io_with_path(&e, path))
}

fn malformed(path: &Path, reason: impl ToString) -> Error {
    SigningError::MalformedKey {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
    .into()
}
