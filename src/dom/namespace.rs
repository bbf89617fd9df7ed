//! Namespace Table
//!
//! Prefix -> URI bindings owned by a form model. Seeded from the declarations
//! on the primary instance root and extended with the namespaces the form
//! dialect requires.

use super::{NodeId, XmlDocument};

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
    pub const OPENROSA: &str = "http://openrosa.org/xforms";
    pub const JAVAROSA: &str = "http://openrosa.org/javarosa";
    pub const ENKETO: &str = "http://enketo.org/xforms";
}

/// Ordered prefix -> URI table
#[derive(Debug, Clone)]
pub struct NamespaceTable {
    bindings: Vec<(String, String)>,
}

impl Default for NamespaceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceTable {
    /// Create a table with only the `xml` prefix bound
    pub fn new() -> Self {
        NamespaceTable {
            bindings: vec![("xml".to_string(), ns::XML.to_string())],
        }
    }

    /// Bind a prefix, replacing any previous binding of the same prefix
    pub fn declare(&mut self, prefix: &str, uri: &str) {
        match self.bindings.iter_mut().find(|(p, _)| p == prefix) {
            Some(binding) => binding.1 = uri.to_string(),
            None => self.bindings.push((prefix.to_string(), uri.to_string())),
        }
    }

    /// Look up the URI bound to a prefix
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// First prefix bound to a URI
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, u)| u == uri)
            .map(|(p, _)| p.as_str())
    }

    /// Make sure `uri` has a prefix and return it.
    ///
    /// An existing binding for the URI wins. Otherwise `preferred` is used,
    /// unless it is already taken by another URI, in which case a private
    /// alias (`__preferred`, then `__preferred2`, ...) is minted.
    pub fn require(&mut self, preferred: &str, uri: &str) -> String {
        if let Some(prefix) = self.prefix_for(uri) {
            return prefix.to_string();
        }
        let mut candidate = preferred.to_string();
        let mut n = 1;
        while self.resolve(&candidate).is_some() {
            candidate = if n == 1 {
                format!("__{}", preferred)
            } else {
                format!("__{}{}", preferred, n)
            };
            n += 1;
        }
        self.declare(&candidate, uri);
        candidate
    }

    /// Import every `xmlns:prefix` declaration carried by an element
    pub fn declare_from_element(&mut self, doc: &XmlDocument, id: NodeId) {
        let declared: Vec<(String, String)> = doc
            .attributes(id)
            .filter_map(|(name, value)| {
                name.strip_prefix("xmlns:")
                    .map(|prefix| (prefix.to_string(), value.to_string()))
            })
            .collect();
        for (prefix, uri) in declared {
            self.declare(&prefix, &uri);
        }
    }

    /// Iterate over (prefix, URI) bindings in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_and_resolve() {
        let mut table = NamespaceTable::new();
        assert_eq!(table.resolve("xml"), Some(ns::XML));
        table.declare("jr", ns::JAVAROSA);
        assert_eq!(table.resolve("jr"), Some(ns::JAVAROSA));
        assert_eq!(table.prefix_for(ns::JAVAROSA), Some("jr"));
        assert_eq!(table.resolve("orx"), None);
    }

    #[test]
    fn test_require_reuses_existing_prefix() {
        let mut table = NamespaceTable::new();
        table.declare("odk", ns::OPENROSA);
        assert_eq!(table.require("orx", ns::OPENROSA), "odk");
        assert_eq!(table.resolve("orx"), None);
    }

    #[test]
    fn test_require_mints_alias_on_collision() {
        let mut table = NamespaceTable::new();
        table.declare("orx", "http://example.org/other");
        assert_eq!(table.require("orx", ns::OPENROSA), "__orx");
        assert_eq!(table.resolve("__orx"), Some(ns::OPENROSA));
        assert_eq!(table.resolve("orx"), Some("http://example.org/other"));
    }

    #[test]
    fn test_declare_from_element() {
        let doc = XmlDocument::parse(
            r#"<data xmlns:jr="http://openrosa.org/javarosa" xmlns="http://x" id="f"/>"#,
        )
        .unwrap();
        let mut table = NamespaceTable::new();
        table.declare_from_element(&doc, doc.root_element().unwrap());
        assert_eq!(table.resolve("jr"), Some(ns::JAVAROSA));
        assert_eq!(table.iter().count(), 2);
    }
}
