//! Request argument values.
//!
//! Arguments may arrive as plain text, as markup, as an already built tree
//! or as a name/value map. [`Fragment::into_element`] is the one place that
//! turns any of them into an element.
use crate::error::{Error, Result};
use crate::tree::{Element, ADEPT_NS, DC_NS};

/// A request argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Text content of an element named after the argument.
    Text(String),
    /// Markup containing an element named after the argument.
    Markup(String),
    /// Tree containing an element named after the argument.
    Tree(Element),
    /// Ordered name/value entries.
    Map(Vec<(String, Fragment)>),
}

impl Fragment {
    /// Whether this value is left out when added as a top-level request argument.
    pub fn is_empty(&self) -> bool {
        match self {
            Fragment::Text(s) | Fragment::Markup(s) => s.is_empty(),
            Fragment::Tree(_) => false,
            Fragment::Map(entries) => entries.is_empty(),
        }
    }

    /// Build a map fragment from string pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Fragment::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), Fragment::Text(v.into())))
                .collect(),
        )
    }

    /// Resolve this value into an element called `name`.
    ///
    /// Markup and trees are searched for `name`: the root itself, then the
    /// first Adept descendant, then the first unqualified descendant. Maps
    /// named `metadata` become Dublin Core children and maps named `count`
    /// become attributes.
    pub fn into_element(self, name: &str) -> Result<Element> {
        match self {
            Fragment::Text(text) => Ok(Element::new(name).with_text(text)),
            Fragment::Markup(markup) => select(Element::parse(&markup)?, name),
            Fragment::Tree(tree) => select(tree, name),
            Fragment::Map(entries) => match name {
                "metadata" => {
                    let mut el = Element::new(name);
                    for (key, value) in entries {
                        el.push(Element::qualified(DC_NS, key).with_text(value.into_text(&key_path(name))?));
                    }
                    Ok(el)
                }
                "count" => {
                    let mut el = Element::new(name);
                    for (key, value) in entries {
                        el.set_attribute(key, value.into_text(&key_path(name))?);
                    }
                    Ok(el)
                }
                _ => {
                    let mut el = Element::new(name);
                    for (key, value) in entries {
                        let child = value.into_element(&key)?;
                        el.push(child);
                    }
                    Ok(el)
                }
            },
        }
    }

    fn into_text(self, context: &str) -> Result<String> {
        match self {
            Fragment::Text(text) => Ok(text),
            _ => Err(Error::Validation(format!(
                "Entries of {} must be plain text",
                context
            ))),
        }
    }
}

impl From<&str> for Fragment {
    fn from(value: &str) -> Self {
        Fragment::Text(value.to_string())
    }
}

impl From<String> for Fragment {
    fn from(value: String) -> Self {
        Fragment::Text(value)
    }
}

impl From<Element> for Fragment {
    fn from(value: Element) -> Self {
        Fragment::Tree(value)
    }
}

fn key_path(name: &str) -> String {
    format!("<{}>", name)
}

fn select(tree: Element, name: &str) -> Result<Element> {
    let root_matches = tree.name.local == name
        && matches!(tree.name.namespace.as_deref(), None | Some(ADEPT_NS));
    if root_matches {
        return Ok(tree);
    }
    tree.find(ADEPT_NS, name)
        .or_else(|| tree.find_unqualified(name))
        .cloned()
        .ok_or_else(|| Error::XmlParse(format!("No {} element in supplied xml", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_becomes_element() {
        let el = Fragment::from("Example").into_element("name").unwrap();
        assert_eq!(el.name.local, "name");
        assert_eq!(el.text(), "Example");
    }

    #[test]
    fn markup_root_is_selected() {
        let el = Fragment::Markup("<permissions><display/></permissions>".into())
            .into_element("permissions")
            .unwrap();
        assert_eq!(el.children().len(), 1);
    }

    #[test]
    fn markup_prefers_adept_descendant() {
        let markup = r#"<wrap><permissions/><a:permissions xmlns:a="http://ns.adobe.com/adept"><play/></a:permissions></wrap>"#;
        let el = Fragment::Markup(markup.into()).into_element("permissions").unwrap();
        assert_eq!(el.name.namespace.as_deref(), Some(ADEPT_NS));
        assert_eq!(el.children()[0].name.local, "play");
    }

    #[test]
    fn markup_falls_back_to_unqualified_descendant() {
        let el = Fragment::Markup("<wrap><x><permissions>p</permissions></x></wrap>".into())
            .into_element("permissions")
            .unwrap();
        assert_eq!(el.text(), "p");
    }

    #[test]
    fn missing_element_is_reported() {
        assert!(matches!(
            Fragment::Markup("<wrap/>".into()).into_element("permissions"),
            Err(Error::XmlParse(_))
        ));
        assert!(matches!(
            Fragment::Markup("<wrap>".into()).into_element("permissions"),
            Err(Error::XmlParse(_))
        ));
    }

    #[test]
    fn metadata_map_uses_dublin_core() {
        let el = Fragment::map([("title", "Book"), ("creator", "Author")])
            .into_element("metadata")
            .unwrap();
        assert_eq!(el.children().len(), 2);
        assert!(el
            .children()
            .iter()
            .all(|c| c.name.namespace.as_deref() == Some(DC_NS)));
        assert_eq!(el.children()[0].name.local, "title");
    }

    #[test]
    fn count_map_uses_attributes() {
        let el = Fragment::map([("initial", "1"), ("max", "3")])
            .into_element("count")
            .unwrap();
        assert_eq!(el.attribute("max"), Some("3"));
        assert!(el.children().is_empty());
    }

    #[test]
    fn nested_maps_become_children() {
        let perms = Fragment::Map(vec![
            ("display".into(), Fragment::Map(vec![("device".into(), "".into())])),
            (
                "count".into(),
                Fragment::map([("initial", "10")]),
            ),
            ("empty".into(), Fragment::Text(String::new())),
        ]);
        let el = perms.into_element("permissions").unwrap();
        let names: Vec<&str> = el.children().iter().map(|c| c.name.local.as_str()).collect();
        assert_eq!(names, vec!["display", "count", "empty"]);
        assert_eq!(el.children()[0].children()[0].name.local, "device");
        assert_eq!(el.children()[1].attribute("initial"), Some("10"));
    }
}
