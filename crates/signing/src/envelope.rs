//! Self-describing signature envelope
//!
//! Newer signatures start with `$PKGSIGN:<backend>$` followed by the
//! backend's own payload. Signatures without the marker predate it and are
//! attributed to whichever backend the verifier was configured with.

use pkgcore_errors::{Error, SigningError};

/// Marker that precedes the backend name
pub const PKGSIGN_HEAD: &str = "$PKGSIGN:";

/// A backend-defined signature payload, optionally tagged with its backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    backend: Option<String>,
    payload: Vec<u8>,
}

impl Signature {
    /// Signature attributed to a named backend
    pub fn tagged(backend: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            backend: Some(backend.into()),
            payload: payload.into(),
        }
    }

    /// Signature without a backend marker
    pub fn untagged(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            backend: None,
            payload: payload.into(),
        }
    }

    /// Split a raw signature into marker and payload
    ///
    /// # Errors
    ///
    /// Returns `SigningError::InvalidSignatureFormat` when the marker is
    /// present but unterminated or names no backend.
    pub fn parse(raw: &[u8]) -> Result<Self, Error> {
        let Some(rest) = raw.strip_prefix(PKGSIGN_HEAD.as_bytes()) else {
            return Ok(Self::untagged(raw));
        };

        let end = rest.iter().position(|&b| b == b'$').ok_or_else(|| {
            SigningError::InvalidSignatureFormat("unterminated $PKGSIGN marker".to_string())
        })?;
        let name = std::str::from_utf8(&rest[..end]).map_err(|_| {
            SigningError::InvalidSignatureFormat("backend name is not UTF-8".to_string())
        })?;
        if name.is_empty() {
            return Err(SigningError::InvalidSignatureFormat(
                "empty backend name in $PKGSIGN marker".to_string(),
            )
            .into());
        }

        Ok(Self::tagged(name, &rest[end + 1..]))
    }

    /// Serialize with the marker when a backend is known
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match &self.backend {
            Some(name) => {
                let mut out =
                    Vec::with_capacity(PKGSIGN_HEAD.len() + name.len() + 1 + self.payload.len());
                out.extend_from_slice(PKGSIGN_HEAD.as_bytes());
                out.extend_from_slice(name.as_bytes());
                out.push(b'$');
                out.extend_from_slice(&self.payload);
                out
            }
            None => self.payload.clone(),
        }
    }

    #[must_use]
    pub fn backend(&self) -> Option<&str> {
        self.backend.as_deref()
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    #[must_use]
    pub fn is_tagged(&self) -> bool {
        self.backend.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_signature_encoding() {
        let sig = Signature::tagged("ed25519", b"c2lnbmF0dXJl".to_vec());
        let raw = sig.encode();
        assert_eq!(raw, b"$PKGSIGN:ed25519$c2lnbmF0dXJl");

        let parsed = Signature::parse(&raw).unwrap();
        assert_eq!(parsed.backend(), Some("ed25519"));
        assert_eq!(parsed.payload(), b"c2lnbmF0dXJl");
    }

    #[test]
    fn test_payload_may_contain_dollar() {
        let parsed = Signature::parse(b"$PKGSIGN:minisign$a$b").unwrap();
        assert_eq!(parsed.backend(), Some("minisign"));
        assert_eq!(parsed.payload(), b"a$b");
    }

    #[test]
    fn test_untagged_signature() {
        let parsed = Signature::parse(b"untrusted comment: x\nRWQ").unwrap();
        assert!(!parsed.is_tagged());
        assert_eq!(parsed.encode(), b"untrusted comment: x\nRWQ");
    }

    #[test]
    fn test_malformed_markers() {
        assert!(Signature::parse(b"$PKGSIGN:ed25519").is_err());
        assert!(Signature::parse(b"$PKGSIGN:$payload").is_err());
    }
}
