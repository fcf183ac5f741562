//! Minisign backend
//!
//! Keys are minisign boxes: a secret-key box (with its public box stored at
//! `<key>.pub`) or a bare public-key box for verification-only use. Signing
//! goes through the `minisign` crate, verification through `minisign-verify`.
//!
//! Minisign records the signature algorithm inside the signature itself:
//! `Ed` signatures cover the raw message (the legacy encoding), `ED`
//! signatures cover its BLAKE2b-512 prehash. Legacy signatures are only
//! accepted when the caller asks for it.

use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ::minisign::{KeyPair, SecretKeyBox};
use pkgcore_errors::{Error, SigningError};

use crate::backend::{
    key_not_found, public_key_path, read_key_file, Capabilities, Credentials, KeyInfoEntry,
    KeyParam, Operation, SigningBackend,
};

const PUBLIC_KEY_LEN: usize = 42;
const SECRET_KEY_LEN: usize = 158;

const TRUSTED_COMMENT: &str = "pkgcore signature";
const UNTRUSTED_COMMENT: &str = "signature from pkgcore secret key";

#[derive(Debug)]
enum KeyMaterial {
    Absent,
    /// Base64 payload of a public-key box
    Public(String),
    /// Complete secret-key box text
    Secret(String),
}

/// Signing backend built on minisign key and signature boxes
#[derive(Debug)]
pub struct MinisignBackend {
    key: KeyMaterial,
}

impl MinisignBackend {
    pub const NAME: &'static str = "minisign";

    /// Load whatever key material exists at `path`
    ///
    /// A missing file is not an error: the instance can still generate a key
    /// or verify against explicitly supplied public keys.
    ///
    /// # Errors
    ///
    /// Returns `MalformedKey` or `UnsupportedFormat` when the file exists but
    /// is not a minisign key box.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let key = match read_key_file(path)? {
            Some(contents) => classify(path, &contents)?,
            None => KeyMaterial::Absent,
        };
        Ok(Self { key })
    }

    /// Registry constructor
    ///
    /// # Errors
    ///
    /// See [`MinisignBackend::load`].
    pub fn constructor(path: &Path) -> Result<Box<dyn SigningBackend>, Error> {
        Ok(Box::new(Self::load(path)?))
    }

    /// Unlock the secret key
    ///
    /// The empty password is tried first; the passphrase provider is only
    /// consulted for keys that are actually encrypted.
    fn secret_key(&self, creds: &Credentials<'_>) -> Result<::minisign::SecretKey, Error> {
        let sk_box = match &self.key {
            KeyMaterial::Secret(sk_box) => sk_box,
            KeyMaterial::Public(_) => return Err(self.unsupported(Operation::Sign)),
            KeyMaterial::Absent => return Err(key_not_found(creds.key_path)),
        };

        match unlock(sk_box, String::new()) {
            Ok(sk) => return Ok(sk),
            Err(e) if !is_wrong_password(&e) => return Err(malformed(creds.key_path, e)),
            Err(_) => {}
        }

        let password = creds
            .passphrase(false)?
            .ok_or_else(|| SigningError::Passphrase {
                reason: format!(
                    "{} is encrypted and no passphrase was supplied",
                    creds.key_path.display()
                ),
            })?;
        unlock(sk_box, password).map_err(|e| {
            if is_wrong_password(&e) {
                SigningError::Passphrase {
                    reason: format!("wrong passphrase for {}", creds.key_path.display()),
                }
                .into()
            } else {
                malformed(creds.key_path, e)
            }
        })
    }

    /// Base64 payload of the active public key
    fn public_key_base64(&self, creds: &Credentials<'_>) -> Result<String, Error> {
        match &self.key {
            KeyMaterial::Public(b64) => Ok(b64.clone()),
            KeyMaterial::Absent => Err(key_not_found(creds.key_path)),
            KeyMaterial::Secret(_) => {
                let pub_path = public_key_path(creds.key_path);
                if let Some(contents) = read_key_file(&pub_path)? {
                    if let KeyMaterial::Public(b64) = classify(&pub_path, &contents)? {
                        return Ok(b64);
                    }
                }
                let sk = self.secret_key(creds)?;
                let pk = ::minisign::PublicKey::from_secret_key(&sk)
                    .map_err(|e| malformed(creds.key_path, e))?;
                let pk_box = pk.to_box().map_err(|e| malformed(creds.key_path, e))?;
                box_payload(&pk_box.into_string())
                    .map(str::to_string)
                    .ok_or_else(|| malformed(creds.key_path, "derived public key is empty"))
            }
        }
    }

    fn sign_bytes(&self, creds: &Credentials<'_>, data: &[u8]) -> Result<Vec<u8>, Error> {
        let sk = self.secret_key(creds)?;
        let signature = ::minisign::sign(
            None,
            &sk,
            Cursor::new(data),
            Some(TRUSTED_COMMENT),
            Some(UNTRUSTED_COMMENT),
        )
        .map_err(|e| SigningError::SigningFailed {
            reason: e.to_string(),
        })?;
        Ok(signature.into_string().into_bytes())
    }
}

impl SigningBackend for MinisignBackend {
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
        allow_legacy: bool,
    ) -> Result<(), Error> {
        let public_key = self.public_key_base64(creds)?;
        verify_with(&public_key, digest_hex.as_bytes(), signature, allow_legacy)
    }

    fn verify_cert(
        &self,
        _creds: &Credentials<'_>,
        public_key: &[u8],
        digest_hex: &str,
        signature: &[u8],
        allow_legacy: bool,
    ) -> Result<(), Error> {
        let text = std::str::from_utf8(public_key)
            .map_err(|_| SigningError::InvalidPublicKey("public key is not UTF-8".to_string()))?;
        let b64 = box_payload(text)
            .ok_or_else(|| SigningError::InvalidPublicKey("empty public key".to_string()))?;
        verify_with(b64, digest_hex.as_bytes(), signature, allow_legacy)
    }

    fn generate(&mut self, creds: &Credentials<'_>, params: &[KeyParam]) -> Result<(), Error> {
        let mut comment = None;
        for param in params {
            match param.name.as_str() {
                "comment" => {
                    comment = Some(String::from_utf8(param.value.clone()).map_err(|_| {
                        SigningError::InvalidParameter {
                            reason: "comment must be UTF-8".to_string(),
                        }
                    })?);
                }
                other => {
                    return Err(SigningError::InvalidParameter {
                        reason: format!("minisign does not accept parameter {other:?}"),
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

        let keygen_err = |e: ::minisign::PError| SigningError::KeyGeneration {
            reason: e.to_string(),
        };
        // An empty password leaves the key unencrypted but still checksummed
        let password = creds.passphrase(true)?.unwrap_or_default();
        let KeyPair { pk, sk } =
            KeyPair::generate_encrypted_keypair(Some(password)).map_err(keygen_err)?;

        let sk_box = sk
            .to_box(comment.as_deref())
            .map_err(keygen_err)?
            .into_string();
        let pk_box = pk.to_box().map_err(keygen_err)?.into_string();

        write_key(creds.key_path, &sk_box)?;
        write_key(&public_key_path(creds.key_path), &pk_box)?;

        self.key = classify(creds.key_path, &sk_box)?;
        Ok(())
    }

    fn key_info(&self, creds: &Credentials<'_>) -> Result<Vec<KeyInfoEntry>, Error> {
        let b64 = self.public_key_base64(creds)?;
        let bytes = BASE64
            .decode(b64.as_bytes())
            .map_err(|e| malformed(creds.key_path, e))?;

        let mut info = vec![
            KeyInfoEntry::new("algorithm", "Ed25519 (minisign)"),
            KeyInfoEntry::new("key_id", key_id(&bytes)),
        ];
        match &self.key {
            KeyMaterial::Secret(sk_box) => {
                let encrypted = unlock(sk_box, String::new()).is_err();
                info.push(KeyInfoEntry::new("kind", "secret"));
                info.push(KeyInfoEntry::new("encrypted", encrypted.to_string()));
            }
            _ => info.push(KeyInfoEntry::new("kind", "public")),
        }
        Ok(info)
    }

    fn public_key(&self, creds: &Credentials<'_>) -> Result<Vec<u8>, Error> {
        let b64 = self.public_key_base64(creds)?;
        Ok(format!("untrusted comment: minisign public key\n{b64}\n").into_bytes())
    }

    fn sign_data(&self, creds: &Credentials<'_>, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.sign_bytes(creds, data)
    }
}

/// Base64 line of a minisign box, or the text itself when it is bare base64
fn box_payload(text: &str) -> Option<&str> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = lines.next()?;
    if first.starts_with("untrusted comment:") {
        lines.next()
    } else {
        Some(first)
    }
}

fn classify(path: &Path, contents: &str) -> Result<KeyMaterial, Error> {
    let unsupported = || SigningError::UnsupportedFormat {
        path: path.display().to_string(),
    };
    let payload = box_payload(contents).ok_or_else(unsupported)?;
    let bytes = BASE64
        .decode(payload.as_bytes())
        .map_err(|e| malformed(path, e))?;
    if bytes.len() < 4 || &bytes[..2] != b"Ed" {
        return Err(unsupported().into());
    }

    match bytes.len() {
        PUBLIC_KEY_LEN => Ok(KeyMaterial::Public(payload.to_string())),
        SECRET_KEY_LEN => Ok(KeyMaterial::Secret(format!(
            "untrusted comment: minisign secret key\n{payload}\n"
        ))),
        n => Err(malformed(path, format!("unexpected key length {n}"))),
    }
}

fn unlock(sk_box: &str, password: String) -> Result<::minisign::SecretKey, ::minisign::PError> {
    SecretKeyBox::from_string(sk_box)?.into_secret_key(Some(password))
}

/// minisign reports a failed key checksum only through its message
fn is_wrong_password(err: &::minisign::PError) -> bool {
    err.to_string().starts_with("Wrong password")
}

fn verify_with(
    public_key_b64: &str,
    message: &[u8],
    signature: &[u8],
    allow_legacy: bool,
) -> Result<(), Error> {
    let pk = minisign_verify::PublicKey::from_base64(public_key_b64)
        .map_err(|e| SigningError::InvalidPublicKey(e.to_string()))?;
    let text = std::str::from_utf8(signature).map_err(|_| {
        SigningError::InvalidSignatureFormat("signature is not UTF-8".to_string())
    })?;
    let sig = minisign_verify::Signature::decode(text)
        .map_err(|e| SigningError::InvalidSignatureFormat(e.to_string()))?;
    pk.verify(message, &sig, allow_legacy)
        .map_err(|e| SigningError::VerificationFailed {
            reason: e.to_string(),
        })?;
    Ok(())
}

fn key_id(public_key: &[u8]) -> String {
    public_key
        .get(2..10)
        .map(hex::encode_upper)
        .unwrap_or_default()
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_box_payload() {
        assert_eq!(
            box_payload("untrusted comment: x\nRWQabc\n"),
            Some("RWQabc")
        );
        assert_eq!(box_payload("RWQabc"), Some("RWQabc"));
        assert_eq!(box_payload("\n\n"), None);
    }

    #[test]
    fn test_missing_key_offers_generation() {
        let dir = TempDir::new().unwrap();
        let backend = MinisignBackend::load(&dir.path().join("none.key")).unwrap();
        assert!(backend.capabilities().contains(Operation::Generate));
        assert!(backend.capabilities().contains(Operation::Sign));
    }

    #[test]
    fn test_garbage_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.key");
        std::fs::write(&path, "untrusted comment: nope\nbm90IGEga2V5\n").unwrap();
        let err = MinisignBackend::load(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::Signing(SigningError::UnsupportedFormat { .. })
        ));

        std::fs::write(&path, "untrusted comment: nope\n!!!\n").unwrap();
        assert!(matches!(
            MinisignBackend::load(&path).unwrap_err(),
            Error::Signing(SigningError::MalformedKey { .. })
        ));
    }
}
