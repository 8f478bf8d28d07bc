//! HMAC-SHA1 authentication codes over canonical request trees.
//!
//! The signing key is either a distributor shared secret (20 bytes delivered
//! as 28 base64 characters) or the SHA-1 digest of a password. The console
//! password hashed this way is the default distributor's shared secret.
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};
use uuid::Uuid;

use crate::canonical;
use crate::error::{Error, Result};
use crate::tree::Element;

pub(crate) type HmacSha1 = Hmac<Sha1>;

/// Key bytes fed to HMAC-SHA1.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SigningKey").field(&"..").finish()
    }
}

impl SigningKey {
    /// Derive the key from a shared secret or password.
    ///
    /// A 28 character value ending in `=` that decodes as base64 is used as
    /// raw key bytes. Anything else, including such a value that fails to
    /// decode, is treated as a password and hashed with SHA-1. This never fails.
    #[must_use]
    pub fn derive(secret: &str) -> Self {
        if secret.len() == 28 && secret.ends_with('=') {
            if let Ok(raw) = base64::engine::general_purpose::STANDARD.decode(secret) {
                return Self(raw);
            }
        }
        Self(Sha1::digest(secret.as_bytes()).to_vec())
    }

    /// Use raw bytes as the key.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Fresh HMAC-SHA1 state keyed with this key.
    pub(crate) fn mac(&self) -> Result<HmacSha1> {
        <HmacSha1 as Mac>::new_from_slice(&self.0)
            .map_err(|e| Error::Validation(format!("Unusable signing key: {}", e)))
    }
}

/// Compute the base64 authentication code of `root` under `secret`.
///
/// Any Adept `signature` element in the tree is left out of the MAC input.
pub fn compute(secret: &str, root: &Element) -> Result<String> {
    compute_with_key(&SigningKey::derive(secret), root)
}

/// Compute the base64 authentication code of `root` under an already derived key.
pub fn compute_with_key(key: &SigningKey, root: &Element) -> Result<String> {
    let mut mac = key.mac()?;
    canonical::serialize(root, &mut mac)?;
    let code = mac.finalize().into_bytes();
    Ok(base64::engine::general_purpose::STANDARD.encode(code))
}

/// Like [`compute`], also returning the canonical trace for diagnosis.
pub fn compute_traced(secret: &str, root: &Element) -> Result<(String, String)> {
    let trace = canonical::trace(root)?;
    let code = compute(secret, root)?;
    Ok((code, trace))
}

/// Generate a random distributor shared secret in the form the server expects.
///
/// The value is the base64 SHA-1 digest of a fresh `urn:uuid:` string.
#[must_use]
pub fn make_shared_secret() -> String {
    let urn = Uuid::new_v4().urn().to_string();
    base64::engine::general_purpose::STANDARD.encode(Sha1::digest(urn.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ADEPT_NS;

    const SECRET: &str = "dGVzdHNlY3JldHRlc3RzZWNyZXQ=";

    fn sealed_request() -> Element {
        Element::in_default_namespace(ADEPT_NS, "request")
            .with_attribute("action", "get")
            .with_attribute("auth", "builtin")
            .with_child(Element::new("distributor").with_text("urn:uuid:1"))
            .with_child(Element::new("expiration").with_text("2020-01-01T00:00:00+00:00"))
            .with_child(Element::new("nonce").with_text("AAAAAAAAAAAAAAAAAAAA"))
    }

    #[test]
    fn shared_secret_decodes_to_raw_key() {
        let key = SigningKey::derive(SECRET);
        assert_eq!(key.as_bytes(), b"testsecrettestsecret");
    }

    #[test]
    fn password_is_hashed() {
        let key = SigningKey::derive("hunter2");
        assert_eq!(key.as_bytes(), Sha1::digest(b"hunter2").as_slice());
    }

    #[test]
    fn undecodable_secret_falls_back_to_hash() {
        let bogus = "!!!!!!!!!!!!!!!!!!!!!!!!!!!=";
        assert_eq!(bogus.len(), 28);
        let key = SigningKey::derive(bogus);
        assert_eq!(key.as_bytes(), Sha1::digest(bogus.as_bytes()).as_slice());
    }

    #[test]
    fn golden_code_for_shared_secret() {
        let code = compute(SECRET, &sealed_request()).expect("compute");
        assert_eq!(code, "ix7WV0F7S/nWuOfHQGym7t5NG9s=");
    }

    #[test]
    fn golden_code_for_password() {
        let code = compute("hunter2", &sealed_request()).expect("compute");
        assert_eq!(code, "y3VUTIoRVuG+fkgyyf0plb0kRZc=");
    }

    #[test]
    fn code_is_deterministic() {
        let root = sealed_request();
        assert_eq!(compute(SECRET, &root).unwrap(), compute(SECRET, &root).unwrap());
    }

    #[test]
    fn code_changes_with_content() {
        let base = compute(SECRET, &sealed_request()).unwrap();

        let mut attr = sealed_request();
        attr.set_attribute("action", "count");
        assert_ne!(compute(SECRET, &attr).unwrap(), base);

        let text = Element::in_default_namespace(ADEPT_NS, "request")
            .with_attribute("action", "get")
            .with_attribute("auth", "builtin")
            .with_child(Element::new("distributor").with_text("urn:uuid:2"))
            .with_child(Element::new("expiration").with_text("2020-01-01T00:00:00+00:00"))
            .with_child(Element::new("nonce").with_text("AAAAAAAAAAAAAAAAAAAA"));
        assert_ne!(compute(SECRET, &text).unwrap(), base);

        let order = Element::in_default_namespace(ADEPT_NS, "request")
            .with_attribute("action", "get")
            .with_attribute("auth", "builtin")
            .with_child(Element::new("distributor").with_text("urn:uuid:1"))
            .with_child(Element::new("nonce").with_text("AAAAAAAAAAAAAAAAAAAA"))
            .with_child(Element::new("expiration").with_text("2020-01-01T00:00:00+00:00"));
        assert_ne!(compute(SECRET, &order).unwrap(), base);
    }

    #[test]
    fn traced_code_matches_plain_code() {
        let root = sealed_request();
        let (code, trace) = compute_traced(SECRET, &root).unwrap();
        assert_eq!(code, compute(SECRET, &root).unwrap());
        assert!(trace.contains("BEGIN_ELEMENT"));
    }

    #[test]
    fn shared_secret_has_expected_shape() {
        let secret = make_shared_secret();
        assert_eq!(secret.len(), 28);
        assert!(secret.ends_with('='));
        assert_eq!(SigningKey::derive(&secret).as_bytes().len(), 20);
    }
}
