//! Integration tests for signing contexts and backends

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey};
use pkgcore_errors::{ConfigError, Error, SigningError};
use pkgcore_events::{AppEvent, SigningEvent};
use pkgcore_signing::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const DIGEST: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

fn pub_path(key: &Path) -> PathBuf {
    let mut s = key.as_os_str().to_os_string();
    s.push(".pub");
    PathBuf::from(s)
}

fn passphrase(value: Option<&'static str>) -> Arc<dyn PassphraseProvider> {
    Arc::new(move |_: &Path, _: bool| -> Result<Option<String>, Error> {
        Ok(value.map(str::to_string))
    })
}

fn keygen(registry: &BackendRegistry, backend: &str, path: &Path) {
    let mut ctx = SigningContext::new_for_signing(registry, backend, path).unwrap();
    ctx.generate(&[]).unwrap();
    ctx.close();
}

/// A minisign public key and a signature in the legacy `Ed` encoding, which
/// signs the raw message instead of its prehash.
fn legacy_minisign_fixture(message: &[u8]) -> (String, String) {
    let sk = SigningKey::from_bytes(&[9; 32]);
    let key_id = [1u8, 2, 3, 4, 5, 6, 7, 8];

    let mut pk_bytes = b"Ed".to_vec();
    pk_bytes.extend_from_slice(&key_id);
    pk_bytes.extend_from_slice(sk.verifying_key().as_bytes());
    let public_box = format!(
        "untrusted comment: legacy public key\n{}\n",
        BASE64.encode(&pk_bytes)
    );

    let signature = sk.sign(message).to_bytes();
    let mut sig_bytes = b"Ed".to_vec();
    sig_bytes.extend_from_slice(&key_id);
    sig_bytes.extend_from_slice(&signature);

    let trusted = "legacy signature";
    let mut global = signature.to_vec();
    global.extend_from_slice(trusted.as_bytes());
    let global_sig = sk.sign(&global).to_bytes();

    let sig_box = format!(
        "untrusted comment: legacy\n{}\ntrusted comment: {}\n{}\n",
        BASE64.encode(&sig_bytes),
        trusted,
        BASE64.encode(global_sig)
    );
    (public_box, sig_box)
}

#[test]
fn test_minisign_sign_and_verify_with_public_key() {
    let dir = TempDir::new().unwrap();
    let registry = BackendRegistry::with_defaults();
    let key = dir.path().join("repo.key");
    keygen(&registry, "minisign", &key);
    assert!(pub_path(&key).exists());

    let signer = SigningContext::new_for_signing(&registry, "minisign", &key).unwrap();
    let signature = signer.sign(DIGEST).unwrap();
    assert_eq!(signature.backend(), Some("minisign"));

    let verifier =
        SigningContext::new_for_verification(&registry, "minisign", pub_path(&key)).unwrap();
    verifier.verify(DIGEST, &signature, false).unwrap();

    let err = verifier
        .verify(&DIGEST.replace('b', "c"), &signature, false)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Signing(SigningError::VerificationFailed { .. })
    ));
}

#[test]
fn test_minisign_legacy_signatures_need_opt_in() {
    let dir = TempDir::new().unwrap();
    let registry = BackendRegistry::with_defaults();
    let (public_box, sig_box) = legacy_minisign_fixture(DIGEST.as_bytes());
    let key = dir.path().join("legacy.pub");
    std::fs::write(&key, &public_box).unwrap();

    let ctx = SigningContext::new_for_verification(&registry, "minisign", &key).unwrap();
    let signature = Signature::untagged(sig_box.as_bytes());

    assert!(matches!(
        ctx.verify(DIGEST, &signature, false).unwrap_err(),
        Error::Signing(SigningError::VerificationFailed { .. })
    ));
    ctx.verify(DIGEST, &signature, true).unwrap();

    // Same rules on the fingerprint path
    assert!(ctx
        .verify_cert(public_box.as_bytes(), DIGEST, &signature, false)
        .is_err());
    ctx.verify_cert(public_box.as_bytes(), DIGEST, &signature, true)
        .unwrap();
}

#[test]
fn test_modern_minisign_signature_accepted_in_both_modes() {
    let dir = TempDir::new().unwrap();
    let registry = BackendRegistry::with_defaults();
    let key = dir.path().join("repo.key");
    keygen(&registry, "minisign", &key);

    let ctx = SigningContext::new_for_signing(&registry, "minisign", &key).unwrap();
    let signature = ctx.sign(DIGEST).unwrap();
    let public_key = ctx.public_key().unwrap();

    ctx.verify(DIGEST, &signature, false).unwrap();
    ctx.verify(DIGEST, &signature, true).unwrap();
    ctx.verify_cert(&public_key, DIGEST, &signature, false)
        .unwrap();
}

#[test]
fn test_minisign_generated_key_signs_without_passphrase() {
    let dir = TempDir::new().unwrap();
    let registry = BackendRegistry::with_defaults();
    let key = dir.path().join("plain.key");
    keygen(&registry, "minisign", &key);

    // No provider at all: an unencrypted key must not ask for one
    let ctx = SigningContext::new_for_signing(&registry, "minisign", &key).unwrap();
    let signature = ctx.sign(DIGEST).unwrap();
    ctx.verify(DIGEST, &signature, false).unwrap();

    // A provider that would answer is never needed either
    let ctx = SigningContext::new_for_signing(&registry, "minisign", &key)
        .unwrap()
        .with_passphrase(passphrase(Some("unused")));
    ctx.sign(DIGEST).unwrap();
}

#[test]
fn test_minisign_encrypted_key_needs_passphrase() {
    let dir = TempDir::new().unwrap();
    let registry = BackendRegistry::with_defaults();
    let key = dir.path().join("locked.key");

    let mut ctx = SigningContext::new_for_signing(&registry, "minisign", &key)
        .unwrap()
        .with_passphrase(passphrase(Some("hunter2")));
    ctx.generate(&[]).unwrap();
    ctx.close();

    let ctx = SigningContext::new_for_signing(&registry, "minisign", &key)
        .unwrap()
        .with_passphrase(passphrase(Some("hunter2")));
    let signature = ctx.sign(DIGEST).unwrap();
    let info = ctx.key_info().unwrap();
    assert!(info
        .iter()
        .any(|e| e.name == "encrypted" && e.value == "true"));

    let verifier =
        SigningContext::new_for_verification(&registry, "minisign", pub_path(&key)).unwrap();
    verifier.verify(DIGEST, &signature, false).unwrap();

    let no_provider = SigningContext::new_for_signing(&registry, "minisign", &key).unwrap();
    assert!(matches!(
        no_provider.sign(DIGEST).unwrap_err(),
        Error::Signing(SigningError::Passphrase { .. })
    ));

    let wrong = SigningContext::new_for_signing(&registry, "minisign", &key)
        .unwrap()
        .with_passphrase(passphrase(Some("letmein")));
    assert!(matches!(
        wrong.sign(DIGEST).unwrap_err(),
        Error::Signing(SigningError::Passphrase { .. })
    ));
}

#[test]
fn test_public_key_context_cannot_sign() {
    let dir = TempDir::new().unwrap();
    let registry = BackendRegistry::with_defaults();
    let key = dir.path().join("repo.key");
    keygen(&registry, "ed25519", &key);

    let err = SigningContext::new_for_signing(&registry, "ed25519", pub_path(&key)).unwrap_err();
    match err {
        Error::Signing(SigningError::Unsupported { backend, operation }) => {
            assert_eq!(backend, "ed25519");
            assert_eq!(operation, "sign");
        }
        other => panic!("unexpected error: {other}"),
    }

    let verifier =
        SigningContext::new_for_verification(&registry, "ed25519", pub_path(&key)).unwrap();
    assert!(!verifier.capabilities().contains(Operation::SignData));
    assert!(matches!(
        verifier.sign_data(b"payload").unwrap_err(),
        Error::Signing(SigningError::Unsupported { .. })
    ));
}

#[test]
fn test_unknown_backend_is_config_error() {
    let registry = BackendRegistry::with_defaults();
    let err = SigningContext::new_for_verification(&registry, "rsa", "/nonexistent").unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::UnknownSigningBackend { .. })
    ));
}

#[test]
fn test_missing_key_reported_at_use() {
    let dir = TempDir::new().unwrap();
    let registry = BackendRegistry::with_defaults();
    let ctx =
        SigningContext::new_for_signing(&registry, "minisign", dir.path().join("absent.key"))
            .unwrap();
    assert!(matches!(
        ctx.sign(DIGEST).unwrap_err(),
        Error::Signing(SigningError::KeyNotFound { .. })
    ));
}

#[test]
fn test_tagged_signatures_select_backend() {
    let dir = TempDir::new().unwrap();
    let registry = BackendRegistry::with_defaults();
    let key = dir.path().join("repo.key");
    keygen(&registry, "ed25519", &key);

    let signer = SigningContext::new_for_signing(&registry, "ed25519", &key).unwrap();
    let raw = signer.sign(DIGEST).unwrap().encode();
    assert!(raw.starts_with(b"$PKGSIGN:ed25519$"));

    // A context for another backend refuses the signature outright
    let minisign_ctx =
        SigningContext::new_for_verification(&registry, "minisign", dir.path().join("none"))
            .unwrap();
    assert!(matches!(
        minisign_ctx.verify_raw(DIGEST, &raw, false).unwrap_err(),
        Error::Signing(SigningError::BackendMismatch { .. })
    ));

    // Detached verification follows the marker regardless of the default
    verify_detached(&registry, "minisign", &pub_path(&key), DIGEST, &raw, false).unwrap();

    // Untagged payloads fall back to the default backend
    let untagged = Signature::parse(&raw).unwrap().into_payload();
    verify_detached(&registry, "ed25519", &pub_path(&key), DIGEST, &untagged, false).unwrap();
    assert!(
        verify_detached(&registry, "minisign", &pub_path(&key), DIGEST, &untagged, false)
            .is_err()
    );
}

#[test]
fn test_set_credentials_rebinds_key() {
    let dir = TempDir::new().unwrap();
    let registry = BackendRegistry::with_defaults();
    let first = dir.path().join("first.key");
    let second = dir.path().join("second.key");
    keygen(&registry, "ed25519", &first);
    keygen(&registry, "ed25519", &second);

    let mut ctx = SigningContext::new_for_signing(&registry, "ed25519", &first).unwrap();
    let from_first = ctx.sign(DIGEST).unwrap();

    ctx.set_credentials(Some(passphrase(None)), &second).unwrap();
    assert_eq!(ctx.key_path(), second.as_path());
    let from_second = ctx.sign(DIGEST).unwrap();
    assert_ne!(from_first, from_second);

    assert!(ctx.verify(DIGEST, &from_first, false).is_err());
    ctx.verify(DIGEST, &from_second, false).unwrap();

    // A failed rebind leaves the context usable
    let bad = dir.path().join("bad.key");
    std::fs::write(&bad, "not a key").unwrap();
    assert!(ctx.set_credentials(None, &bad).is_err());
    assert_eq!(ctx.key_path(), second.as_path());
}

#[test]
fn test_key_info_per_backend() {
    let dir = TempDir::new().unwrap();
    let registry = BackendRegistry::with_defaults();

    let ed_key = dir.path().join("ed.key");
    keygen(&registry, "ed25519", &ed_key);
    let ctx = SigningContext::new_for_verification(&registry, "ed25519", &ed_key).unwrap();
    let info = ctx.key_info().unwrap();
    let fingerprint = info.iter().find(|e| e.name == "fingerprint").unwrap();
    assert_eq!(fingerprint.value.len(), 64);

    let ms_key = dir.path().join("ms.key");
    keygen(&registry, "minisign", &ms_key);
    let ctx = SigningContext::new_for_verification(&registry, "minisign", &ms_key).unwrap();
    let info = ctx.key_info().unwrap();
    assert!(info.iter().any(|e| e.name == "key_id" && e.value.len() == 16));
    assert!(info
        .iter()
        .any(|e| e.name == "encrypted" && e.value == "false"));
}

#[test]
fn test_generate_refuses_existing_key() {
    let dir = TempDir::new().unwrap();
    let registry = BackendRegistry::with_defaults();
    let key = dir.path().join("repo.key");
    keygen(&registry, "minisign", &key);

    let mut ctx = SigningContext::new_for_signing(&registry, "minisign", &key).unwrap();
    assert!(matches!(
        ctx.generate(&[]).unwrap_err(),
        Error::Signing(SigningError::Unsupported { .. })
    ));
}

#[test]
fn test_custom_backend_registration() {
    struct NullBackend;

    impl SigningBackend for NullBackend {
        fn name(&self) -> &str {
            "null"
        }

        fn capabilities(&self) -> Capabilities {
            [Operation::Sign, Operation::Verify, Operation::VerifyCert]
                .into_iter()
                .collect()
        }

        fn sign(&self, _: &Credentials<'_>, digest_hex: &str) -> Result<Vec<u8>, Error> {
            Ok(digest_hex.as_bytes().to_vec())
        }

        fn verify(
            &self,
            _: &Credentials<'_>,
            digest_hex: &str,
            signature: &[u8],
            _: bool,
        ) -> Result<(), Error> {
            if signature == digest_hex.as_bytes() {
                Ok(())
            } else {
                Err(SigningError::VerificationFailed {
                    reason: "mismatch".into(),
                }
                .into())
            }
        }

        fn verify_cert(
            &self,
            creds: &Credentials<'_>,
            _: &[u8],
            digest_hex: &str,
            signature: &[u8],
            allow_legacy: bool,
        ) -> Result<(), Error> {
            self.verify(creds, digest_hex, signature, allow_legacy)
        }
    }

    let mut registry = BackendRegistry::with_defaults();
    registry.register("null", |_: &Path| {
        Ok(Box::new(NullBackend) as Box<dyn SigningBackend>)
    });
    assert_eq!(
        registry.names().collect::<Vec<_>>(),
        vec!["ed25519", "minisign", "null"]
    );

    let mut ctx = SigningContext::new_for_signing(&registry, "null", "/dev/null").unwrap();
    let sig = ctx.sign(DIGEST).unwrap();
    ctx.verify(DIGEST, &sig, false).unwrap();

    for result in [
        ctx.key_info().map(|_| ()),
        ctx.public_key().map(|_| ()),
        ctx.generate(&[]),
    ] {
        assert!(matches!(
            result.unwrap_err(),
            Error::Signing(SigningError::Unsupported { .. })
        ));
    }
}

#[tokio::test]
async fn test_context_emits_signing_events() {
    let dir = TempDir::new().unwrap();
    let registry = BackendRegistry::with_defaults();
    let key = dir.path().join("repo.key");
    let (tx, mut rx) = pkgcore_events::channel();

    let mut ctx = SigningContext::new_for_signing(&registry, "ed25519", &key)
        .unwrap()
        .with_event_sender(tx);
    ctx.generate(&[KeyParam::new("seed", [3u8; 32])]).unwrap();
    let sig = ctx.sign(DIGEST).unwrap();
    ctx.verify(DIGEST, &sig, true).unwrap();
    drop(ctx);

    let mut events = Vec::new();
    while let Some(message) = rx.recv().await {
        if let AppEvent::Signing(event) = message.event {
            events.push(event);
        }
    }

    assert!(matches!(events[0], SigningEvent::ContextCreated { .. }));
    assert!(matches!(events[1], SigningEvent::KeyGenerated { .. }));
    assert!(matches!(events[2], SigningEvent::Signed { bytes, .. } if bytes > 0));
    assert!(matches!(
        events[3],
        SigningEvent::Verified {
            legacy_allowed: true,
            ..
        }
    ));
}
