//! XML Node representation
//!
//! Uses NodeId (u32) for compact, cache-friendly node references.

/// Compact node identifier (index into arena)
pub type NodeId = u32;

/// Type of XML node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Document root
    Document,
    /// Element node
    Element,
    /// Text content
    Text,
    /// CDATA section
    CData,
    /// Comment
    Comment,
    /// Processing instruction
    ProcessingInstruction,
}

/// An XML node in the arena
///
/// Nodes are never freed: detaching only unlinks them, so a `NodeId` stays
/// valid for the lifetime of its document. Detached subtrees are how repeat
/// templates are kept out of the live tree.
#[derive(Debug, Clone)]
pub struct XmlNode {
    /// Type of this node
    pub kind: NodeKind,
    /// Parent node (None for document root and detached nodes)
    pub parent: Option<NodeId>,
    /// First child node
    pub first_child: Option<NodeId>,
    /// Last child node
    pub last_child: Option<NodeId>,
    /// Previous sibling
    pub prev_sibling: Option<NodeId>,
    /// Next sibling
    pub next_sibling: Option<NodeId>,
    /// Index into string pool for the qualified name (elements, PI targets)
    pub name_id: u32,
    /// Index into string pool for character data (text, CDATA, comments, PI data)
    pub value_id: u32,
    /// Element attributes in document order
    pub attributes: Vec<XmlAttribute>,
}

impl XmlNode {
    fn blank(kind: NodeKind) -> Self {
        XmlNode {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            name_id: 0,
            value_id: 0,
            attributes: Vec::new(),
        }
    }

    /// Create a new document root node
    pub fn document() -> Self {
        Self::blank(NodeKind::Document)
    }

    /// Create a new element node
    pub fn element(name_id: u32) -> Self {
        XmlNode {
            name_id,
            ..Self::blank(NodeKind::Element)
        }
    }

    /// Create a character data node (text, CDATA or comment)
    pub fn character_data(kind: NodeKind, value_id: u32) -> Self {
        XmlNode {
            value_id,
            ..Self::blank(kind)
        }
    }

    /// Create a processing instruction node
    pub fn processing_instruction(name_id: u32, value_id: u32) -> Self {
        XmlNode {
            name_id,
            value_id,
            ..Self::blank(NodeKind::ProcessingInstruction)
        }
    }

    /// Check if this is an element node
    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    /// Check if this is a text or CDATA node
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text | NodeKind::CData)
    }

    /// Check if this node has children
    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }
}

/// Stored attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Index into string pool for the qualified attribute name
    pub name_id: u32,
    /// Index into string pool for attribute value
    pub value_id: u32,
}

impl XmlAttribute {
    pub fn new(name_id: u32, value_id: u32) -> Self {
        XmlAttribute { name_id, value_id }
    }
}

/// Split a qualified name into prefix and local name
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.find(':') {
        Some(pos) => (Some(&name[..pos]), &name[pos + 1..]),
        None => (None, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_creation() {
        let doc = XmlNode::document();
        assert_eq!(doc.kind, NodeKind::Document);
        assert!(doc.parent.is_none());
        assert!(!doc.has_children());
    }

    #[test]
    fn test_element_node() {
        let elem = XmlNode::element(1);
        assert!(elem.is_element());
        assert_eq!(elem.name_id, 1);
        assert!(elem.attributes.is_empty());
    }

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("jr:template"), (Some("jr"), "template"));
        assert_eq!(split_qname("data"), (None, "data"));
    }
}
