//! XPath Value Types
//!
//! XPath 1.0 has four data types: node-set, boolean, number, and string.
//! The form dialect adds a fifth, `date`, so that comparisons between dates
//! and date-like strings order chronologically.

use super::date;
use crate::dom::{DocumentAccess, NodeId};
use chrono::{DateTime, FixedOffset};

/// XPath value types
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum XPathValue {
    /// A set of nodes (ordered, no duplicates)
    NodeSet(Vec<NodeId>),
    /// Boolean value
    Boolean(bool),
    /// Floating-point number
    Number(f64),
    /// String value
    String(String),
    /// List of strings (for attribute values)
    StringList(Vec<String>),
    /// Date-time; `None` is the invalid date
    Date(Option<DateTime<FixedOffset>>),
}

impl XPathValue {
    /// Create an empty node set
    pub fn empty_nodeset() -> Self {
        XPathValue::NodeSet(Vec::new())
    }

    /// Create a node set with a single node
    pub fn single_node(id: NodeId) -> Self {
        XPathValue::NodeSet(vec![id])
    }

    /// Convert to boolean (XPath boolean() function semantics)
    pub fn to_boolean(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::Boolean(b) => *b,
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::StringList(list) => !list.is_empty(),
            XPathValue::Date(d) => d.is_some(),
        }
    }

    /// Convert to number (XPath number() function semantics).
    ///
    /// Node-sets need document access; use [`XPathValue::to_number_in`].
    pub fn to_number(&self) -> f64 {
        match self {
            XPathValue::NodeSet(_) => f64::NAN,
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XPathValue::Number(n) => *n,
            XPathValue::String(s) => parse_number(s),
            XPathValue::StringList(list) => list.first().map_or(f64::NAN, |s| parse_number(s)),
            XPathValue::Date(d) => d.as_ref().map_or(f64::NAN, date::days_since_epoch),
        }
    }

    /// Convert to string (XPath string() function semantics).
    ///
    /// **Warning:** For `NodeSet` values, this returns an empty string because
    /// proper XPath 1.0 string conversion requires document access to extract
    /// text content. Use [`XPathValue::to_string_in`] when a document is at hand.
    pub fn to_string_value(&self) -> String {
        match self {
            XPathValue::NodeSet(_) => String::new(),
            XPathValue::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            XPathValue::Number(n) => number_to_string(*n),
            XPathValue::String(s) => s.clone(),
            XPathValue::StringList(list) => list.first().cloned().unwrap_or_default(),
            XPathValue::Date(Some(d)) => date::format_iso_local(d),
            XPathValue::Date(None) => date::INVALID_DATE.to_string(),
        }
    }

    /// String value, reading the first node of a node-set from `doc`
    pub fn to_string_in<D: DocumentAccess + ?Sized>(&self, doc: &D) -> String {
        match self {
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map(|&first| doc.string_value(first))
                .unwrap_or_default(),
            _ => self.to_string_value(),
        }
    }

    /// Number value, reading the first node of a node-set from `doc`
    pub fn to_number_in<D: DocumentAccess + ?Sized>(&self, doc: &D) -> f64 {
        match self {
            XPathValue::NodeSet(_) => parse_number(&self.to_string_in(doc)),
            _ => self.to_number(),
        }
    }

    /// String values of every member: all nodes of a node-set, all strings
    /// of a list, or the single value otherwise
    pub fn to_strings_in<D: DocumentAccess + ?Sized>(&self, doc: &D) -> Vec<String> {
        match self {
            XPathValue::NodeSet(nodes) => nodes.iter().map(|&n| doc.string_value(n)).collect(),
            XPathValue::StringList(list) => list.clone(),
            _ => vec![self.to_string_value()],
        }
    }

    /// Check if this is a node set
    pub fn is_nodeset(&self) -> bool {
        matches!(self, XPathValue::NodeSet(_))
    }

    /// Check if this is a string list (attribute values)
    pub fn is_string_list(&self) -> bool {
        matches!(self, XPathValue::StringList(_))
    }

    /// Get as node set, or None
    pub fn as_nodeset(&self) -> Option<&Vec<NodeId>> {
        match self {
            XPathValue::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }
}

/// XPath number() on a string: trimmed decimal notation, else NaN
pub fn parse_number(s: &str) -> f64 {
    let t = s.trim();
    let valid = !t.is_empty()
        && t.bytes()
            .enumerate()
            .all(|(i, b)| b.is_ascii_digit() || b == b'.' || (i == 0 && b == b'-'))
        && t.bytes().filter(|&b| b == b'.').count() <= 1
        && t.bytes().any(|b| b.is_ascii_digit());
    if valid {
        t.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// XPath string() on a number
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl Default for XPathValue {
    fn default() -> Self {
        XPathValue::NodeSet(Vec::new())
    }
}

impl From<bool> for XPathValue {
    fn from(b: bool) -> Self {
        XPathValue::Boolean(b)
    }
}

impl From<f64> for XPathValue {
    fn from(n: f64) -> Self {
        XPathValue::Number(n)
    }
}

impl From<String> for XPathValue {
    fn from(s: String) -> Self {
        XPathValue::String(s)
    }
}

impl From<&str> for XPathValue {
    fn from(s: &str) -> Self {
        XPathValue::String(s.to_string())
    }
}

impl From<Vec<NodeId>> for XPathValue {
    fn from(nodes: Vec<NodeId>) -> Self {
        XPathValue::NodeSet(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::XmlDocument;

    #[test]
    fn test_boolean_conversion() {
        assert!(XPathValue::NodeSet(vec![1]).to_boolean());
        assert!(!XPathValue::NodeSet(vec![]).to_boolean());
        assert!(XPathValue::Boolean(true).to_boolean());
        assert!(!XPathValue::Boolean(false).to_boolean());
        assert!(XPathValue::Number(1.0).to_boolean());
        assert!(!XPathValue::Number(0.0).to_boolean());
        assert!(XPathValue::String("hello".to_string()).to_boolean());
        assert!(!XPathValue::String(String::new()).to_boolean());
        assert!(!XPathValue::Date(None).to_boolean());
    }

    #[test]
    fn test_number_conversion() {
        assert_eq!(XPathValue::Boolean(true).to_number(), 1.0);
        assert_eq!(XPathValue::Boolean(false).to_number(), 0.0);
        assert_eq!(XPathValue::String(" 42 ".to_string()).to_number(), 42.0);
        assert_eq!(XPathValue::String("-1.5".to_string()).to_number(), -1.5);
        assert!(XPathValue::String("abc".to_string()).to_number().is_nan());
        assert!(XPathValue::String("1e3".to_string()).to_number().is_nan());
        assert!(XPathValue::String("inf".to_string()).to_number().is_nan());
    }

    #[test]
    fn test_string_conversion() {
        assert_eq!(XPathValue::Boolean(true).to_string_value(), "true");
        assert_eq!(XPathValue::Number(42.0).to_string_value(), "42");
        assert_eq!(XPathValue::Number(3.25).to_string_value(), "3.25");
        assert_eq!(XPathValue::Number(f64::NAN).to_string_value(), "NaN");
        assert_eq!(XPathValue::Date(None).to_string_value(), "Invalid Date");
    }

    #[test]
    fn test_nodeset_conversion_with_document() {
        let doc = XmlDocument::parse("<r><a>7</a><a>8</a></r>").unwrap();
        let nodes: Vec<_> = doc.descendants(doc.root_element().unwrap()).filter(|&n| doc.is_element(n)).collect();
        let value = XPathValue::NodeSet(nodes);
        assert_eq!(value.to_string_in(&doc), "7");
        assert_eq!(value.to_number_in(&doc), 7.0);
        assert_eq!(value.to_strings_in(&doc), vec!["7", "8"]);
    }
}
