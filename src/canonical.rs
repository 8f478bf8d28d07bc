//! Canonical byte serialization used as HMAC input.
//!
//! The walk is pre-order over the element tree. Every string is written as a
//! big-endian `u16` byte length followed by its UTF-8 bytes:
//!
//! ```text
//! BEGIN_ELEMENT ns local
//!   (ATTRIBUTE "" name value)*      sorted by name bytes
//! END_ATTRIBUTES
//!   (TEXT_NODE chunk)*              trimmed text, <= 32767 bytes per chunk
//!   children...
//! END_ELEMENT
//! ```
//!
//! A `signature` element in the Adept namespace is skipped together with its
//! subtree. Output is pushed into a [`Sink`], so it can be streamed straight
//! into a MAC without building a buffer.

use std::fmt::Write as _;

use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::{Error, Result};
use crate::tree::{Element, ADEPT_NS};

/// Maximum number of bytes carried by a single text chunk.
pub const MAX_TEXT_CHUNK: usize = 0x7fff;

/// Single-byte markers framing the canonical stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Marker {
    BeginElement = 0x01,
    EndAttributes = 0x02,
    EndElement = 0x03,
    TextNode = 0x04,
    Attribute = 0x05,
}

impl Marker {
    /// Marker name as shown in serialization traces.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Marker::BeginElement => "BEGIN_ELEMENT",
            Marker::EndAttributes => "END_ATTRIBUTES",
            Marker::EndElement => "END_ELEMENT",
            Marker::TextNode => "TEXT_NODE",
            Marker::Attribute => "ATTRIBUTE",
        }
    }
}

/// Consumer of the canonical stream.
pub trait Sink {
    /// Feed raw bytes.
    fn update(&mut self, data: &[u8]);

    /// Feed a framing marker.
    fn marker(&mut self, marker: Marker) {
        self.update(&[marker as u8]);
    }

    /// Feed a length-prefixed string. The caller guarantees `data.len() <= u16::MAX`.
    fn string(&mut self, data: &[u8]) {
        self.update(&(data.len() as u16).to_be_bytes());
        self.update(data);
    }
}

impl Sink for Vec<u8> {
    fn update(&mut self, data: &[u8]) {
        self.extend_from_slice(data);
    }
}

impl Sink for Hmac<Sha1> {
    fn update(&mut self, data: &[u8]) {
        Mac::update(self, data);
    }
}

/// Human-readable rendering of the canonical stream, one token per line.
///
/// Only meant for chasing HMAC mismatches against the server.
#[derive(Debug, Default)]
pub struct TraceSink {
    out: String,
}

impl TraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the sink and return the rendered trace.
    pub fn into_string(self) -> String {
        self.out
    }
}

impl Sink for TraceSink {
    fn update(&mut self, data: &[u8]) {
        let _ = writeln!(self.out, "{}", String::from_utf8_lossy(data));
    }

    fn marker(&mut self, marker: Marker) {
        let _ = writeln!(self.out, "{:#04x} {}", marker as u8, marker.as_str());
    }

    fn string(&mut self, data: &[u8]) {
        let _ = writeln!(self.out, "[{}] {}", data.len(), String::from_utf8_lossy(data));
    }
}

/// Serialize `root` into `sink`.
///
/// Fails if an element's namespace cannot be resolved or a name or value is
/// too long to be length prefixed.
pub fn serialize<S: Sink + ?Sized>(root: &Element, sink: &mut S) -> Result<()> {
    serialize_element(root, None, sink)
}

/// Serialize `root` into a fresh buffer.
pub fn to_bytes(root: &Element) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    serialize(root, &mut out)?;
    Ok(out)
}

/// Render the canonical stream of `root` as a readable trace.
pub fn trace(root: &Element) -> Result<String> {
    let mut sink = TraceSink::new();
    serialize(root, &mut sink)?;
    Ok(sink.into_string())
}

/// Split trimmed text into the chunks emitted as `TEXT_NODE`s.
pub fn text_chunks(text: &str) -> impl Iterator<Item = &[u8]> {
    text.trim().as_bytes().chunks(MAX_TEXT_CHUNK)
}

fn serialize_element<S: Sink + ?Sized>(
    el: &Element,
    inherited: Option<&str>,
    sink: &mut S,
) -> Result<()> {
    let namespace = el.resolved_namespace(inherited).ok_or_else(|| {
        Error::Validation(format!(
            "Element <{}> has no resolvable namespace",
            el.name.local
        ))
    })?;

    if namespace == ADEPT_NS && el.name.local == "signature" {
        return Ok(());
    }

    sink.marker(Marker::BeginElement);
    string(sink, namespace)?;
    string(sink, &el.name.local)?;

    let mut attributes: Vec<&(String, String)> = el.attributes().iter().collect();
    attributes.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    for (name, value) in attributes {
        sink.marker(Marker::Attribute);
        // Attribute namespaces are always written empty.
        string(sink, "")?;
        string(sink, name)?;
        string(sink, value)?;
    }
    sink.marker(Marker::EndAttributes);

    for chunk in text_chunks(el.text()) {
        sink.marker(Marker::TextNode);
        sink.string(chunk);
    }

    let scope = el.scope_default(inherited);
    for child in el.children() {
        serialize_element(child, scope, sink)?;
    }

    sink.marker(Marker::EndElement);
    Ok(())
}

fn string<S: Sink + ?Sized>(sink: &mut S, s: &str) -> Result<()> {
    if s.len() > usize::from(u16::MAX) {
        return Err(Error::Validation(format!(
            "Value of {} bytes is too long to serialize",
            s.len()
        )));
    }
    sink.string(s.as_bytes());
    Ok(())
}
