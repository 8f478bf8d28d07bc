//! Client configuration.
//!
//! Every knob that affects signing or transport lives here and is passed
//! explicitly to the envelope builder, link minter and transport.
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Seconds a signed request stays valid by default.
pub const DEFAULT_EXPIRATION_SECS: u64 = 1800;
/// Default server port.
pub const DEFAULT_PORT: u16 = 80;

/// Signing and transport configuration, loadable from YAML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log request and response bodies.
    pub debug: bool,
    /// Log the canonical serialization trace of each signed request.
    pub show_serialization: bool,
    /// Sign and serialize requests but never send them.
    pub dry_run: bool,
    /// Fixed nonce instead of a random one, for reproducible requests.
    pub nonce: Option<String>,
    /// Fixed expiration timestamp, e.g. `2010-06-26T07:35:58+00:00`.
    pub expiration: Option<String>,
    /// Validity horizon of signed requests.
    pub expiration_secs: u64,
    /// Server port.
    pub port: u16,
    /// HTTP timeout. `None` keeps the HTTP client's default.
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            show_serialization: false,
            dry_run: false,
            nonce: None,
            expiration: None,
            expiration_secs: DEFAULT_EXPIRATION_SECS,
            port: DEFAULT_PORT,
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Parse a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load a YAML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// HTTP timeout as a duration.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Copy of this config with fixed nonce and expiration.
    #[must_use]
    pub fn with_fixed_envelope(mut self, nonce: impl Into<String>, expiration: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self.expiration = Some(expiration.into());
        self
    }

    /// Copy of this config with dry run switched on or off.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
