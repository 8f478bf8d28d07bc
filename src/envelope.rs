//! Anti-replay envelope appended to every signed request.
//!
//! The request root receives `<expiration>` and `<nonce>` children, the HMAC
//! is computed over the whole tree, and the code is appended as `<hmac>`.
use base64::Engine;
use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::auth;
use crate::canonical;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::tree::{Element, ADEPT_NS};

/// strftime pattern of expiration timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+00:00";
/// Length of a generated nonce.
pub const NONCE_LEN: usize = 20;

const ENVELOPE_ELEMENTS: [&str; 3] = ["expiration", "nonce", "hmac"];

/// A signed request ready to be posted.
#[derive(Debug, Clone)]
pub struct SealedRequest {
    /// Request tree including the envelope elements.
    pub document: Element,
    /// Wire form of `document`.
    pub body: String,
}

impl SealedRequest {
    pub fn as_bytes(&self) -> &[u8] {
        self.body.as_bytes()
    }

    /// Text of the appended `<hmac>` element.
    pub fn hmac(&self) -> Option<&str> {
        self.document.child_text("hmac")
    }
}

/// Format a UTC time the way the server expects it.
#[must_use]
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Timestamp `seconds` after `now`.
pub fn make_expiration(now: DateTime<Utc>, seconds: u64) -> Result<String> {
    let expires = i64::try_from(seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| Error::Validation(format!("Expiration of {} seconds is out of range", seconds)))?;
    Ok(format_timestamp(expires))
}

/// Fresh 20 character nonce from 20 random bytes.
#[must_use]
pub fn make_nonce() -> String {
    let mut bytes = [0u8; 20];
    OsRng.fill_bytes(&mut bytes);
    let mut nonce = base64::engine::general_purpose::STANDARD.encode(bytes);
    nonce.truncate(NONCE_LEN);
    nonce
}

/// Seal `root` using the current time.
pub fn seal(root: Element, secret: &str, config: &Config) -> Result<SealedRequest> {
    seal_at(root, secret, config, Utc::now())
}

/// Seal `root` as of `now`.
///
/// Envelope elements already present on the root are replaced. Fixed nonce
/// and expiration values from `config` take precedence over generated ones.
pub fn seal_at(
    mut root: Element,
    secret: &str,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<SealedRequest> {
    let scope = root.scope_default(None).map(str::to_owned);
    root.remove_children(|c| {
        ENVELOPE_ELEMENTS
            .iter()
            .any(|name| c.is(scope.as_deref(), ADEPT_NS, name))
    });

    let expiration = match &config.expiration {
        Some(fixed) => fixed.clone(),
        None => make_expiration(now, config.expiration_secs)?,
    };
    let nonce = config.nonce.clone().unwrap_or_else(make_nonce);

    root.subelement("expiration", expiration);
    root.subelement("nonce", nonce);

    if config.show_serialization {
        debug!("Canonical serialization:\n{}", canonical::trace(&root)?);
    }

    let code = auth::compute(secret, &root)?;
    root.subelement("hmac", code);

    let body = root.to_xml();
    Ok(SealedRequest {
        document: root,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "dGVzdHNlY3JldHRlc3RzZWNyZXQ=";

    fn request() -> Element {
        Element::in_default_namespace(ADEPT_NS, "request")
            .with_attribute("action", "get")
            .with_attribute("auth", "builtin")
            .with_child(Element::new("distributor").with_text("urn:uuid:1"))
    }

    fn fixed() -> Config {
        Config::default().with_fixed_envelope("AAAAAAAAAAAAAAAAAAAA", "2020-01-01T00:00:00+00:00")
    }

    #[test]
    fn golden_envelope() {
        let sealed = seal(request(), SECRET, &fixed()).expect("seal");
        let names: Vec<&str> = sealed
            .document
            .children()
            .iter()
            .map(|c| c.name.local.as_str())
            .collect();
        assert_eq!(names, vec!["distributor", "expiration", "nonce", "hmac"]);
        assert_eq!(sealed.hmac(), Some("ix7WV0F7S/nWuOfHQGym7t5NG9s="));
        assert_eq!(
            sealed.body,
            concat!(
                "<?xml version='1.0' encoding='utf-8'?>\n",
                "<request xmlns=\"http://ns.adobe.com/adept\" action=\"get\" auth=\"builtin\">",
                "<distributor>urn:uuid:1</distributor>",
                "<expiration>2020-01-01T00:00:00+00:00</expiration>",
                "<nonce>AAAAAAAAAAAAAAAAAAAA</nonce>",
                "<hmac>ix7WV0F7S/nWuOfHQGym7t5NG9s=</hmac>",
                "</request>"
            )
        );
    }

    #[test]
    fn hmac_verifies_over_unsigned_body() {
        let sealed = seal(request(), SECRET, &fixed()).expect("seal");
        let mut unsigned = sealed.document.clone();
        unsigned.remove_children(|c| c.name.local == "hmac");
        assert_eq!(
            sealed.hmac().map(str::to_owned),
            Some(auth::compute(SECRET, &unsigned).unwrap())
        );
    }

    #[test]
    fn resealing_replaces_envelope() {
        let once = seal(request(), SECRET, &fixed()).expect("seal");
        let twice = seal(once.document.clone(), SECRET, &fixed()).expect("reseal");
        assert_eq!(once.body, twice.body);
    }

    #[test]
    fn generated_expiration_uses_horizon() {
        let now = Utc.with_ymd_and_hms(2010, 6, 26, 7, 5, 58).unwrap();
        let config = Config::default();
        let sealed = seal_at(request(), SECRET, &config, now).expect("seal");
        assert_eq!(
            sealed.document.child_text("expiration"),
            Some("2010-06-26T07:35:58+00:00")
        );
        assert_eq!(sealed.document.child_text("nonce").map(str::len), Some(NONCE_LEN));
    }

    #[test]
    fn nonces_are_fresh() {
        let a = make_nonce();
        let b = make_nonce();
        assert_eq!(a.len(), NONCE_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn expiration_overflow_is_rejected() {
        let now = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(make_expiration(now, u64::MAX), Err(Error::Validation(_))));
        assert_eq!(make_expiration(now, 0).unwrap(), "2020-01-01T00:00:00+00:00");
    }

    #[test]
    fn unresolved_namespace_fails_sealing() {
        let orphan = Element::new("request");
        assert!(matches!(
            seal(orphan, SECRET, &fixed()),
            Err(Error::Validation(_))
        ));
    }
}
