//! rsacs4 - Rust client for the Adobe Content Server 4 admin API.
//!
//! This crate provides:
//! - An element tree model with namespace resolution.
//! - The canonical byte serialization signed by the server.
//! - HMAC-SHA1 request authentication and the anti-replay envelope.
//! - Admin, query and packaging request builders.
//! - Pre-authenticated fulfillment link minting.
//! - A blocking HTTP transport and response classification.
//!
//! Feature flags:
//! - `log` (default): emit diagnostics through the `log` facade.
//! - `tracing`: emit diagnostics through `tracing` instead.
#![allow(clippy::result_large_err)]

#[macro_use]
mod macros;

/// HMAC-SHA1 authentication codes and signing keys.
pub mod auth;
/// Canonical serialization of element trees.
pub mod canonical;
/// Content server admin client.
pub mod client;
/// Signing and transport configuration.
pub mod config;
/// Anti-replay envelope and request sealing.
pub mod envelope;
/// Common error types and Result alias.
pub mod error;
/// Request argument values.
pub mod fragment;
/// Fulfillment link minting.
pub mod link;
/// Admin, query and packaging request documents.
pub mod request;
/// HTTP transport and response classification.
pub mod transport;
/// Element tree model.
pub mod tree;

pub use client::{ContentServer, Reply};
pub use config::Config;
pub use error::{Error, Result};
pub use fragment::Fragment;
pub use link::{LinkRequest, MintAction};
pub use request::{Action, AdminRequest, Api, PackageRequest, QueryResourceItems};
pub use tree::Element;
