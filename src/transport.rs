//! HTTP transport and response classification.
use reqwest::blocking::Client;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::tree::{Element, ADEPT_NS};

/// Content type of signed request bodies.
pub const CONTENT_TYPE: &str = "application/vnd.adobe.adept+xml";

/// Blocking HTTP client posting signed requests to a content server.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    debug: bool,
    dry_run: bool,
}

impl Transport {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder().user_agent("rsacs4");
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            debug: config.debug,
            dry_run: config.dry_run,
        })
    }

    /// POST `body` to `http://host:port{path}` and classify the reply.
    ///
    /// Returns `Ok(None)` without touching the network in dry-run mode. The
    /// HTTP status is ignored; only the body decides success.
    pub fn send(&self, host: &str, port: u16, path: &str, body: &[u8]) -> Result<Option<Element>> {
        if self.debug {
            info!("{}\n{}", path, String::from_utf8_lossy(body));
        }
        if self.dry_run {
            info!("Dry run, not posting to {}", path);
            return Ok(None);
        }

        let url = format!("http://{}:{}{}", host, port, path);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(body.to_vec())
            .send()?;
        let status = response.status();
        let data = response.bytes()?;

        if self.debug {
            info!("{} {}\n{}", status, url, String::from_utf8_lossy(&data));
        }
        if !status.is_success() {
            warn!("{} answered {}", url, status);
        }

        validate_response(&data).map(Some)
    }
}

/// Classify a raw server reply.
///
/// A root `error` element, Adept-qualified or unqualified, becomes
/// [`Error::Server`] carrying its URL-decoded `data` attribute.
pub fn validate_response(data: &[u8]) -> Result<Element> {
    let root = Element::parse_bytes(data).map_err(|e| Error::MalformedResponse {
        reason: format!("Couldn't parse server response as XML: {}", e),
        raw: data.to_vec(),
    })?;

    let is_error = root.name.local == "error"
        && matches!(root.name.namespace.as_deref(), None | Some(ADEPT_NS));
    if is_error {
        let message = match root.attribute("data") {
            Some(encoded) => urlencoding::decode(encoded)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| encoded.to_string()),
            None => "Server returned an error without details".to_string(),
        };
        return Err(Error::Server(message));
    }
    Ok(root)
}
