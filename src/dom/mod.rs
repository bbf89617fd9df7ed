//! DOM Module - Arena-based mutable XML Document
//!
//! Implements the document the form engine works on:
//! - Arena allocation for nodes
//! - NodeId (u32) indices for cache-friendly traversal
//! - String interning for names and values
//! - Mutation, cloning and cross-document import
//! - Namespace table, serialization and a two-source merge

pub mod document;
pub mod merge;
pub mod namespace;
pub mod node;
pub mod serialize;
pub mod strings;

pub use document::{DomError, XmlDocument, DOCUMENT_NODE};
pub use merge::{merge_documents, merge_into, MergeError};
pub use namespace::{ns, NamespaceTable};
pub use node::{split_qname, NodeId, NodeKind, XmlAttribute, XmlNode};
pub use serialize::SerializeOptions;
pub use strings::StringPool;

/// Read-only document access used by the XPath engine
pub trait DocumentAccess {
    /// The document node
    fn document_node_id(&self) -> NodeId;

    /// Get root element ID
    fn root_element_id(&self) -> Option<NodeId>;

    fn node_kind(&self, id: NodeId) -> Option<NodeKind>;

    fn parent_of(&self, id: NodeId) -> Option<NodeId>;

    fn next_sibling_of(&self, id: NodeId) -> Option<NodeId>;

    fn prev_sibling_of(&self, id: NodeId) -> Option<NodeId>;

    /// Children in document order - returns collected Vec for trait object compatibility
    fn children_vec(&self, id: NodeId) -> Vec<NodeId>;

    /// Descendants in document order - returns collected Vec for trait object compatibility
    fn descendants_vec(&self, id: NodeId) -> Vec<NodeId>;

    /// Qualified node name (empty for nodes without a name)
    fn node_name(&self, id: NodeId) -> &str;

    /// Node local name (without prefix)
    fn node_local_name(&self, id: NodeId) -> &str {
        split_qname(self.node_name(id)).1
    }

    /// Namespace prefix of the node name
    fn node_prefix(&self, id: NodeId) -> Option<&str> {
        split_qname(self.node_name(id)).0
    }

    /// Namespace URI in scope for the node's prefix
    fn node_namespace_uri(&self, id: NodeId) -> Option<&str>;

    /// Get attribute value by name
    fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str>;

    /// Get all attribute names and values
    fn get_attribute_values(&self, id: NodeId) -> Vec<(&str, &str)>;

    /// XPath string-value of a node
    fn string_value(&self, id: NodeId) -> String;

    /// Sort into document order, removing duplicates
    fn sort_document_order(&self, nodes: &mut Vec<NodeId>);

    fn is_element(&self, id: NodeId) -> bool {
        self.node_kind(id) == Some(NodeKind::Element)
    }
}
