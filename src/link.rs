//! Pre-authenticated fulfillment links.
//!
//! A link carries an ordered query string signed with HMAC-SHA1 under the
//! distributor's shared secret. The server recomputes the tag over the query
//! exactly as sent, so parameter order is fixed and never sorted.
//!
//! Minting does not contact the server.
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::Mac;
use uuid::Uuid;

use crate::auth::SigningKey;
use crate::config::DEFAULT_PORT;
use crate::envelope::format_timestamp;
use crate::error::{Error, Result};

/// Link protocol version sent as `gblver`.
pub const LINK_VERSION: &str = "4";
/// Path of the fulfillment link endpoint.
pub const LINK_PATH: &str = "/fulfillment/URLLink.acsm";

/// What the reader's fulfillment of the link does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MintAction {
    /// Lend the resource.
    #[default]
    EnterLoan,
    /// Sell the resource.
    EnterOrder,
}

impl MintAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MintAction::EnterLoan => "enterloan",
            MintAction::EnterOrder => "enterorder",
        }
    }
}

impl fmt::Display for MintAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MintAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "enterloan" => Ok(MintAction::EnterLoan),
            "enterorder" => Ok(MintAction::EnterOrder),
            other => Err(Error::Validation(format!(
                "Mint action should be enterloan or enterorder, got {:?}",
                other
            ))),
        }
    }
}

/// Parameters of one fulfillment link.
///
/// `order_id` must be unique (case-insensitively) within the link expiration
/// window or loan fulfillment fails on the server. A random `urn:uuid:` id is
/// used when none is given.
#[derive(Debug, Clone, Default)]
pub struct LinkRequest {
    /// Resource id.
    pub resource: String,
    pub action: MintAction,
    /// Store name shown to the reader.
    pub order_source: String,
    /// Extra rights restrictions, e.g. `$lrt#86400$$prn#2#3600$`.
    pub rights: Option<String>,
    pub order_id: Option<String>,
}

impl LinkRequest {
    pub fn new(resource: impl Into<String>, order_source: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            order_source: order_source.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_action(mut self, action: MintAction) -> Self {
        self.action = action;
        self
    }

    #[must_use]
    pub fn with_rights(mut self, rights: impl Into<String>) -> Self {
        self.rights = Some(rights.into());
        self
    }

    #[must_use]
    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    /// Query parameters in wire order.
    fn params(&self, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let order_id = self
            .order_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().urn().to_string());
        let mut params = vec![
            ("action", self.action.as_str().to_string()),
            ("ordersource", self.order_source.clone()),
            ("orderid", order_id),
            ("resid", self.resource.clone()),
            ("gbauthdate", format_timestamp(now)),
            ("dateval", now.timestamp().to_string()),
            ("gblver", LINK_VERSION.to_string()),
        ];
        if let Some(rights) = &self.rights {
            params.push(("rights", rights.clone()));
        }
        params
    }
}

/// Mint a fulfillment link using the current time.
pub fn mint(host: &str, port: u16, shared_secret: &str, request: &LinkRequest) -> Result<String> {
    mint_at(host, port, shared_secret, request, Utc::now())
}

/// Mint a fulfillment link as of `now`.
///
/// `shared_secret` must be the base64 distributor secret. Unlike request
/// signing there is no password fallback.
///
/// The query is form-encoded by `url`, which leaves `*` unescaped. The tag is
/// computed over the query exactly as sent, so links verify either way.
pub fn mint_at(
    host: &str,
    port: u16,
    shared_secret: &str,
    request: &LinkRequest,
    now: DateTime<Utc>,
) -> Result<String> {
    let key = base64::engine::general_purpose::STANDARD
        .decode(shared_secret)
        .map_err(|e| Error::Validation(format!("Shared secret is not valid base64: {}", e)))?;

    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(request.params(now))
        .finish();

    let mut mac = SigningKey::from_bytes(key).mac()?;
    mac.update(query.as_bytes());
    let auth = hex::encode(mac.finalize().into_bytes());

    let port = if port == DEFAULT_PORT {
        String::new()
    } else {
        format!(":{}", port)
    };
    Ok(format!(
        "http://{}{}{}?{}&auth={}",
        host, port, LINK_PATH, query, auth
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "dGVzdHNlY3JldHRlc3RzZWNyZXQ=";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    fn request() -> LinkRequest {
        LinkRequest::new("urn:uuid:res-1", "My Store").with_order_id("urn:uuid:order-1")
    }

    const QUERY: &str = concat!(
        "action=enterloan&ordersource=My+Store&orderid=urn%3Auuid%3Aorder-1",
        "&resid=urn%3Auuid%3Ares-1&gbauthdate=2020-01-01T00%3A00%3A00%2B00%3A00",
        "&dateval=1577836800&gblver=4"
    );

    #[test]
    fn golden_link() {
        let link = mint_at("acs.example.org", 80, SECRET, &request(), now()).expect("mint");
        assert_eq!(
            link,
            format!(
                "http://acs.example.org/fulfillment/URLLink.acsm?{}&auth={}",
                QUERY, "38efbc3a78336a62caafe95d0486f4ba735d348f"
            )
        );
    }

    #[test]
    fn rights_are_appended_last() {
        let link = mint_at(
            "acs.example.org",
            80,
            SECRET,
            &request().with_rights("$lrt#86400$"),
            now(),
        )
        .expect("mint");
        assert!(link.ends_with(
            "&gblver=4&rights=%24lrt%2386400%24&auth=ffc25dd7fbde36c9a017474ac8994defecc109ef"
        ));
    }

    #[test]
    fn port_formatting() {
        let default = mint_at("h", 80, SECRET, &request(), now()).unwrap();
        assert!(default.starts_with("http://h/fulfillment/"));
        let custom = mint_at("h", 8080, SECRET, &request(), now()).unwrap();
        assert!(custom.starts_with("http://h:8080/fulfillment/"));
    }

    #[test]
    fn bogus_action_is_rejected() {
        assert!(matches!("bogus".parse::<MintAction>(), Err(Error::Validation(_))));
        assert_eq!("enterorder".parse::<MintAction>().unwrap(), MintAction::EnterOrder);
    }

    #[test]
    fn order_action_is_signed() {
        let loan = mint_at("h", 80, SECRET, &request(), now()).unwrap();
        let order = mint_at(
            "h",
            80,
            SECRET,
            &request().with_action(MintAction::EnterOrder),
            now(),
        )
        .unwrap();
        assert!(order.contains("?action=enterorder&"));
        assert_ne!(loan.rsplit("auth=").next(), order.rsplit("auth=").next());
    }

    #[test]
    fn missing_order_id_is_generated() {
        let request = LinkRequest::new("urn:uuid:res-1", "My Store");
        let a = mint_at("h", 80, SECRET, &request, now()).unwrap();
        let b = mint_at("h", 80, SECRET, &request, now()).unwrap();
        assert!(a.contains("&orderid=urn%3Auuid%3A"));
        assert_ne!(a, b);
    }

    #[test]
    fn secret_must_be_base64() {
        assert!(matches!(
            mint_at("h", 80, "not base64!", &request(), now()),
            Err(Error::Validation(_))
        ));
    }
}
