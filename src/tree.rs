//! Ordered XML element tree.
//!
//! Requests are assembled as [`Element`] trees, signed over their canonical
//! form and then written out as markup. Responses are parsed back into the
//! same model with roxmltree.
//!
//! An element without an explicit namespace inherits the nearest default
//! namespace declaration (`xmlns="..."`) found on itself or an ancestor.

use crate::error::{Error, Result};

/// Adept control namespace used by every admin request and response.
pub const ADEPT_NS: &str = "http://ns.adobe.com/adept";
/// Dublin Core namespace used by resource metadata.
pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
/// Namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Qualified element name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QName {
    /// Explicit namespace URI; `None` inherits the in-scope default.
    pub namespace: Option<String>,
    /// Local name.
    pub local: String,
}

impl QName {
    /// Unqualified name that inherits the in-scope default namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
        }
    }

    /// Name bound to an explicit namespace.
    pub fn qualified(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local: local.into(),
        }
    }
}

/// An XML element with ordered attributes, leading text and ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Element name.
    pub name: QName,
    /// Default namespace declared on this element, if any.
    pub default_namespace: Option<String>,
    text: String,
    children: Vec<Element>,
    attributes: Vec<(String, String)>,
}

impl Element {
    /// Create an unqualified element.
    pub fn new(local: impl Into<String>) -> Self {
        Self {
            name: QName::local(local),
            ..Default::default()
        }
    }

    /// Create an element in an explicit namespace.
    pub fn qualified(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            name: QName::qualified(namespace, local),
            ..Default::default()
        }
    }

    /// Create an unqualified element that declares `namespace` as the default
    /// for itself and its descendants.
    pub fn in_default_namespace(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self::new(local).with_default_namespace(namespace)
    }

    #[must_use]
    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Set an attribute, replacing any existing value under the same name.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Look up an attribute value by name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attributes in insertion order.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Append a child element.
    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Append an unqualified child holding `text` and return it.
    pub fn subelement(&mut self, local: impl Into<String>, text: impl Into<String>) -> &mut Element {
        self.children.push(Element::new(local).with_text(text));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Text content preceding the first child.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Child elements in document order.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Resolve this element's namespace given the default inherited from its parent.
    pub fn resolved_namespace<'a>(&'a self, inherited: Option<&'a str>) -> Option<&'a str> {
        self.name
            .namespace
            .as_deref()
            .or_else(|| self.scope_default(inherited))
    }

    /// Default namespace in scope for this element's children.
    pub fn scope_default<'a>(&'a self, inherited: Option<&'a str>) -> Option<&'a str> {
        self.default_namespace.as_deref().or(inherited)
    }

    /// Whether this element resolves to `namespace`/`local` under `inherited`.
    pub fn is(&self, inherited: Option<&str>, namespace: &str, local: &str) -> bool {
        self.name.local == local && self.resolved_namespace(inherited) == Some(namespace)
    }

    /// First descendant (excluding `self`) with the given resolved namespace and local name.
    pub fn find(&self, namespace: &str, local: &str) -> Option<&Element> {
        self.find_all(namespace, local).into_iter().next()
    }

    /// All descendants (excluding `self`) with the given resolved namespace and
    /// local name, in document order.
    pub fn find_all(&self, namespace: &str, local: &str) -> Vec<&Element> {
        fn walk<'a>(
            el: &'a Element,
            inherited: Option<&'a str>,
            namespace: &str,
            local: &str,
            out: &mut Vec<&'a Element>,
        ) {
            let scope = el.scope_default(inherited);
            for child in &el.children {
                if child.is(scope, namespace, local) {
                    out.push(child);
                }
                walk(child, scope, namespace, local, out);
            }
        }

        let mut out = Vec::new();
        walk(self, None, namespace, local, &mut out);
        out
    }

    /// First unqualified descendant (excluding `self`) with the given local
    /// name whose namespace is not otherwise resolvable.
    pub fn find_unqualified(&self, local: &str) -> Option<&Element> {
        fn walk<'a>(el: &'a Element, inherited: Option<&'a str>, local: &str) -> Option<&'a Element> {
            let scope = el.scope_default(inherited);
            for child in &el.children {
                if child.name.local == local && child.resolved_namespace(scope).is_none() {
                    return Some(child);
                }
                if let Some(found) = walk(child, scope, local) {
                    return Some(found);
                }
            }
            None
        }

        walk(self, None, local)
    }

    /// Text of the first direct child with the given local name.
    pub fn child_text(&self, local: &str) -> Option<&str> {
        self.children
            .iter()
            .find(|c| c.name.local == local)
            .map(|c| c.text.as_str())
    }

    /// Remove every direct child matching `predicate`.
    pub fn remove_children(&mut self, mut predicate: impl FnMut(&Element) -> bool) {
        self.children.retain(|c| !predicate(c));
    }

    /// Parse markup into an element tree.
    ///
    /// Namespaced attributes are stored under their `{uri}local` name.
    pub fn parse(text: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(text).map_err(|e| Error::XmlParse(e.to_string()))?;
        Ok(Self::from_node(doc.root_element()))
    }

    /// Parse UTF-8 encoded markup into an element tree.
    pub fn parse_bytes(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::XmlParse(format!("invalid UTF-8: {}", e)))?;
        Self::parse(text)
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let tag = node.tag_name();
        let mut el = Element {
            name: QName {
                namespace: tag.namespace().map(str::to_owned),
                local: tag.name().to_owned(),
            },
            text: node.text().unwrap_or_default().to_owned(),
            ..Default::default()
        };
        for attr in node.attributes() {
            let name = match attr.namespace() {
                Some(ns) => format!("{{{}}}{}", ns, attr.name()),
                None => attr.name().to_owned(),
            };
            el.attributes.push((name, attr.value().to_owned()));
        }
        el.children = node
            .children()
            .filter(|n| n.is_element())
            .map(Self::from_node)
            .collect();
        el
    }

    /// Write the element as a standalone UTF-8 document with an XML declaration.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version='1.0' encoding='utf-8'?>\n");
        self.write_markup(&mut out, None);
        out
    }

    /// Write the element as markup without an XML declaration.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out, None);
        out
    }

    fn write_markup(&self, out: &mut String, in_scope: Option<&str>) {
        let mut decls = String::new();
        let mut scope = in_scope;
        let mut next_prefix = 0usize;
        let mut fresh_prefix = |decls: &mut String, uri: &str| {
            let prefix = format!("ns{}", next_prefix);
            next_prefix += 1;
            decls.push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape_attr(uri)));
            prefix
        };

        if let Some(default) = self.default_namespace.as_deref() {
            if scope != Some(default) {
                decls.push_str(&format!(" xmlns=\"{}\"", escape_attr(default)));
            }
            scope = Some(default);
        }

        let tag = match self.name.namespace.as_deref() {
            Some(ns) if scope != Some(ns) => {
                let prefix = fresh_prefix(&mut decls, ns);
                format!("{}:{}", prefix, self.name.local)
            }
            _ => self.name.local.clone(),
        };

        let mut attrs = String::new();
        for (name, value) in &self.attributes {
            let name = match split_clark(name) {
                Some((XML_NS, local)) => format!("xml:{}", local),
                Some((uri, local)) => format!("{}:{}", fresh_prefix(&mut decls, uri), local),
                None => name.clone(),
            };
            attrs.push_str(&format!(" {}=\"{}\"", name, escape_attr(value)));
        }

        out.push('<');
        out.push_str(&tag);
        out.push_str(&decls);
        out.push_str(&attrs);
        if self.text.is_empty() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        out.push_str(&escape_text(&self.text));
        for child in &self.children {
            child.write_markup(out, scope);
        }
        out.push_str("</");
        out.push_str(&tag);
        out.push('>');
    }
}

fn split_clark(name: &str) -> Option<(&str, &str)> {
    let rest = name.strip_prefix('{')?;
    let end = rest.find('}')?;
    Some((&rest[..end], &rest[end + 1..]))
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Element {
        Element::in_default_namespace(ADEPT_NS, "request")
            .with_attribute("action", "get")
            .with_attribute("auth", "builtin")
            .with_child(Element::new("distributor").with_text("urn:uuid:1"))
    }

    #[test]
    fn children_inherit_default_namespace() {
        let root = request();
        let scope = root.scope_default(None);
        assert_eq!(root.resolved_namespace(None), Some(ADEPT_NS));
        assert_eq!(root.children()[0].resolved_namespace(scope), Some(ADEPT_NS));
        assert!(root.find(ADEPT_NS, "distributor").is_some());
    }

    #[test]
    fn set_attribute_replaces_existing() {
        let mut el = Element::new("x").with_attribute("a", "1");
        el.set_attribute("a", "2");
        assert_eq!(el.attributes().len(), 1);
        assert_eq!(el.attribute("a"), Some("2"));
    }

    #[test]
    fn markup_round_trips_through_parser() {
        let root = request().with_child(Element::new("note").with_text("a < b & \"c\""));
        let xml = root.to_xml();
        assert!(xml.starts_with("<?xml version='1.0' encoding='utf-8'?>\n<request xmlns=\"http://ns.adobe.com/adept\""));

        let parsed = Element::parse(&xml).expect("parse");
        assert_eq!(parsed.name, QName::qualified(ADEPT_NS, "request"));
        assert_eq!(parsed.attribute("auth"), Some("builtin"));
        let note = parsed.find(ADEPT_NS, "note").expect("note");
        assert_eq!(note.text(), "a < b & \"c\"");
    }

    #[test]
    fn foreign_namespace_gets_local_prefix() {
        let root = Element::in_default_namespace(ADEPT_NS, "metadata")
            .with_child(Element::qualified(DC_NS, "title").with_text("Book"))
            .with_child(Element::new("after"));
        let markup = root.to_markup();
        assert!(markup.contains("<ns0:title xmlns:ns0=\"http://purl.org/dc/elements/1.1/\">Book</ns0:title>"));

        let parsed = Element::parse(&markup).expect("parse");
        assert!(parsed.find(DC_NS, "title").is_some());
        assert!(parsed.find(ADEPT_NS, "after").is_some());
    }

    #[test]
    fn parse_keeps_namespaced_attribute_in_clark_form() {
        let parsed = Element::parse(r#"<a xmlns:x="urn:x" x:id="7" plain="p"/>"#).expect("parse");
        assert_eq!(parsed.attribute("{urn:x}id"), Some("7"));
        assert_eq!(parsed.attribute("plain"), Some("p"));
        assert!(parsed.to_markup().contains("ns0:id=\"7\""));
    }

    #[test]
    fn xml_namespace_attribute_keeps_reserved_prefix() {
        let parsed = Element::parse(r#"<title xml:lang="en">Book</title>"#).expect("parse");
        assert_eq!(parsed.attribute("{http://www.w3.org/XML/1998/namespace}lang"), Some("en"));

        let markup = parsed.to_markup();
        assert_eq!(markup, r#"<title xml:lang="en">Book</title>"#);

        let reparsed = Element::parse(&markup).expect("reparse");
        assert_eq!(reparsed, parsed);
    }

    #[test]
    fn parse_bytes_rejects_invalid_utf8() {
        assert!(matches!(
            Element::parse_bytes(&[0x3c, 0xff, 0xfe]),
            Err(Error::XmlParse(_))
        ));
    }

    #[test]
    fn find_unqualified_skips_namespaced_matches() {
        let parsed =
            Element::parse(r#"<wrap><x:permissions xmlns:x="urn:x"/><permissions/></wrap>"#).expect("parse");
        let found = parsed.find_unqualified("permissions").expect("found");
        assert_eq!(found.name.namespace, None);
    }
}
