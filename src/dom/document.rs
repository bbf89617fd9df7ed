//! XML Document - Arena-based mutable DOM
//!
//! Efficient DOM storage with:
//! - Arena allocation for nodes
//! - NodeId indices for traversal
//! - String interning for names, values and character data
//! - A lazily rebuilt document-order index
//!
//! Node ids are handed out in allocation order, which stops matching
//! document order as soon as nodes are cloned or inserted. Every mutation
//! drops the order index; the next query that needs ordering rebuilds it.

use super::node::{split_qname, NodeId, NodeKind, XmlAttribute, XmlNode};
use super::strings::StringPool;
use super::DocumentAccess;
use crate::reader::{ParseError, SliceReader, XmlEvent};
use std::borrow::Cow;
use std::cell::RefCell;

/// The document node is always the first arena slot
pub const DOCUMENT_NODE: NodeId = 0;

/// Well-formedness errors raised while building a document
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomError {
    #[error(transparent)]
    Syntax(#[from] ParseError),
    #[error("tag mismatch: <{open}> closed with </{close}>")]
    TagMismatch { open: String, close: String },
    #[error("unexpected end tag </{0}> without matching start tag")]
    UnexpectedEndTag(String),
    #[error("unclosed tag <{0}>")]
    UnclosedTag(String),
    #[error("document has multiple root elements")]
    MultipleRoots,
    #[error("text content not allowed outside the root element")]
    TextOutsideRoot,
    #[error("document has no root element")]
    NoRootElement,
}

/// An XML document stored in arena format
#[derive(Debug, Clone)]
pub struct XmlDocument {
    /// Arena of nodes
    nodes: Vec<XmlNode>,
    /// Interned strings
    strings: StringPool,
    /// Document-order position per node id, `u32::MAX` for detached nodes
    order: RefCell<Option<Vec<u32>>>,
}

impl Default for XmlDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlDocument {
    /// Create an empty document holding only the document node
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(256);
        nodes.push(XmlNode::document());
        XmlDocument {
            nodes,
            strings: StringPool::new(),
            order: RefCell::new(None),
        }
    }

    /// Parse a well-formed XML document
    pub fn parse(input: &str) -> Result<Self, DomError> {
        let mut doc = XmlDocument::new();
        let mut stack: Vec<NodeId> = vec![DOCUMENT_NODE];
        let mut seen_root = false;

        for event in SliceReader::new(input.as_bytes()) {
            let parent = *stack.last().unwrap_or(&DOCUMENT_NODE);
            match event? {
                XmlEvent::StartElement(elem) => {
                    let id = doc.open_element(&elem, parent, &mut seen_root)?;
                    stack.push(id);
                }
                XmlEvent::EmptyElement(elem) => {
                    doc.open_element(&elem, parent, &mut seen_root)?;
                }
                XmlEvent::EndElement(end) => {
                    let close = String::from_utf8_lossy(end.name);
                    if stack.len() == 1 {
                        return Err(DomError::UnexpectedEndTag(close.into_owned()));
                    }
                    let open = doc.name(parent);
                    if open != close {
                        return Err(DomError::TagMismatch {
                            open: open.to_string(),
                            close: close.into_owned(),
                        });
                    }
                    stack.pop();
                }
                XmlEvent::Text(content) => {
                    if parent == DOCUMENT_NODE {
                        if content.iter().all(|b| b.is_ascii_whitespace()) {
                            continue;
                        }
                        return Err(DomError::TextOutsideRoot);
                    }
                    let text = doc.create_character_data(NodeKind::Text, &lossy(&content));
                    doc.append_child(parent, text);
                }
                XmlEvent::CData(content) => {
                    if parent == DOCUMENT_NODE {
                        return Err(DomError::TextOutsideRoot);
                    }
                    let cdata = doc.create_character_data(NodeKind::CData, &lossy(content));
                    doc.append_child(parent, cdata);
                }
                XmlEvent::Comment(content) => {
                    let comment = doc.create_character_data(NodeKind::Comment, &lossy(content));
                    doc.append_child(parent, comment);
                }
                XmlEvent::ProcessingInstruction { target, data } => {
                    let name_id = doc.strings.intern(&lossy(target));
                    let value_id = doc.strings.intern(&lossy(data.unwrap_or_default()));
                    let pi = doc.push(XmlNode::processing_instruction(name_id, value_id));
                    doc.append_child(parent, pi);
                }
                XmlEvent::XmlDeclaration | XmlEvent::DocType(_) => {}
            }
        }

        if let Some(&open) = stack.get(1) {
            return Err(DomError::UnclosedTag(doc.name(open).to_string()));
        }
        if !seen_root {
            return Err(DomError::NoRootElement);
        }
        Ok(doc)
    }

    fn open_element(
        &mut self,
        elem: &crate::reader::StartElement<'_>,
        parent: NodeId,
        seen_root: &mut bool,
    ) -> Result<NodeId, DomError> {
        if parent == DOCUMENT_NODE {
            if *seen_root {
                return Err(DomError::MultipleRoots);
            }
            *seen_root = true;
        }
        let id = self.create_element(&lossy(elem.name));
        for attr in &elem.attributes {
            let name_id = self.strings.intern(&lossy(&attr.name));
            let value_id = self.strings.intern(&lossy(&attr.value));
            self.nodes[id as usize]
                .attributes
                .push(XmlAttribute::new(name_id, value_id));
        }
        self.append_child(parent, id);
        Ok(id)
    }

    fn push(&mut self, node: XmlNode) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        self.invalidate();
        id
    }

    #[inline]
    fn invalidate(&self) {
        self.order.borrow_mut().take();
    }

    // =========================================================================
    // Node access
    // =========================================================================

    /// Get a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&XmlNode> {
        self.nodes.get(id as usize)
    }

    /// Get the node kind
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get_node(id).map(|n| n.kind)
    }

    /// Check if a node is an element
    pub fn is_element(&self, id: NodeId) -> bool {
        self.get_node(id).is_some_and(XmlNode::is_element)
    }

    /// Get the root element (first element child of the document node)
    pub fn root_element(&self) -> Option<NodeId> {
        self.element_children(DOCUMENT_NODE).next()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.last_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.next_sibling
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.prev_sibling
    }

    /// Next sibling that is an element
    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let mut sibling = self.next_sibling(id);
        while let Some(sib) = sibling {
            if self.is_element(sib) {
                return Some(sib);
            }
            sibling = self.next_sibling(sib);
        }
        None
    }

    /// Previous sibling that is an element
    pub fn prev_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let mut sibling = self.prev_sibling(id);
        while let Some(sib) = sibling {
            if self.is_element(sib) {
                return Some(sib);
            }
            sibling = self.prev_sibling(sib);
        }
        None
    }

    /// Iterate over children of a node
    pub fn children(&self, id: NodeId) -> ChildIter<'_> {
        ChildIter {
            doc: self,
            next: self.first_child(id),
        }
    }

    /// Iterate over element children of a node
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(move |&c| self.is_element(c))
    }

    /// Iterate over all descendants of a node in document order
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_> {
        // Children go on the stack in reverse order so the first is processed first
        let mut stack = Vec::new();
        let mut child = self.last_child(id);
        while let Some(cid) = child {
            stack.push(cid);
            child = self.prev_sibling(cid);
        }
        DescendantIter { doc: self, stack }
    }

    /// Walk up the tree, starting with the node itself
    pub fn ancestors_or_self(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |&n| self.parent(n))
    }

    /// Whether the node is reachable from the document node
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.ancestors_or_self(id).any(|n| n == DOCUMENT_NODE)
    }

    /// Check if an element has no element children
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.element_children(id).next().is_none()
    }

    // =========================================================================
    // Names and values
    // =========================================================================

    /// Qualified name of an element or PI target, empty for other nodes
    pub fn name(&self, id: NodeId) -> &str {
        self.get_node(id)
            .map_or("", |n| self.strings.get(n.name_id))
    }

    /// Local name (without prefix)
    pub fn local_name(&self, id: NodeId) -> &str {
        split_qname(self.name(id)).1
    }

    /// Namespace prefix of an element name
    pub fn prefix(&self, id: NodeId) -> Option<&str> {
        split_qname(self.name(id)).0
    }

    /// Resolve the namespace URI of an element from in-scope declarations
    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        if !self.is_element(id) {
            return None;
        }
        self.lookup_namespace_uri(id, self.prefix(id))
    }

    /// Resolve a prefix (or the default namespace) in scope at a node
    pub fn lookup_namespace_uri(&self, id: NodeId, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(super::namespace::ns::XML);
        }
        let decl: Cow<'_, str> = match prefix {
            Some(p) => Cow::Owned(format!("xmlns:{}", p)),
            None => Cow::Borrowed("xmlns"),
        };
        self.ancestors_or_self(id)
            .find_map(|n| self.attribute(n, &decl))
            .filter(|uri| !uri.is_empty())
    }

    /// Character data of a text, CDATA, comment or PI node
    pub fn value(&self, id: NodeId) -> &str {
        self.get_node(id)
            .map_or("", |n| self.strings.get(n.value_id))
    }

    /// XPath string-value: concatenated descendant text for elements
    pub fn string_value(&self, id: NodeId) -> String {
        match self.kind(id) {
            Some(NodeKind::Element) | Some(NodeKind::Document) => self
                .descendants(id)
                .filter(|&d| self.get_node(d).is_some_and(XmlNode::is_text))
                .map(|d| self.value(d))
                .collect(),
            Some(_) => self.value(id).to_string(),
            None => String::new(),
        }
    }

    /// Get attribute value by qualified name
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        let name_id = self.strings.lookup(name)?;
        self.get_node(id)?
            .attributes
            .iter()
            .find(|a| a.name_id == name_id)
            .map(|a| self.strings.get(a.value_id))
    }

    /// All attributes of an element as (name, value) pairs
    pub fn attributes(&self, id: NodeId) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.get_node(id)
            .map(|n| n.attributes.as_slice())
            .unwrap_or_default()
            .iter()
            .map(move |a| (self.strings.get(a.name_id), self.strings.get(a.value_id)))
    }

    /// Check whether an element carries an attribute
    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    /// Access the string pool
    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    /// Get total number of nodes in the arena
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Create a detached element
    pub fn create_element(&mut self, name: &str) -> NodeId {
        let name_id = self.strings.intern(name);
        self.push(XmlNode::element(name_id))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.create_character_data(NodeKind::Text, text)
    }

    /// Create a detached comment
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.create_character_data(NodeKind::Comment, text)
    }

    fn create_character_data(&mut self, kind: NodeKind, text: &str) -> NodeId {
        let value_id = self.strings.intern(text);
        self.push(XmlNode::character_data(kind, value_id))
    }

    /// Set (or add) an attribute, keeping the position of an existing one
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let name_id = self.strings.intern(name);
        let value_id = self.strings.intern(value);
        let Some(node) = self.nodes.get_mut(id as usize) else {
            return;
        };
        match node.attributes.iter_mut().find(|a| a.name_id == name_id) {
            Some(attr) => attr.value_id = value_id,
            None => node.attributes.push(XmlAttribute::new(name_id, value_id)),
        }
    }

    /// Remove an attribute; returns whether it was present
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> bool {
        let Some(name_id) = self.strings.lookup(name) else {
            return false;
        };
        let Some(node) = self.nodes.get_mut(id as usize) else {
            return false;
        };
        let before = node.attributes.len();
        node.attributes.retain(|a| a.name_id != name_id);
        node.attributes.len() != before
    }

    /// Rename an attribute in place
    pub fn rename_attribute(&mut self, id: NodeId, from: &str, to: &str) -> bool {
        let Some(from_id) = self.strings.lookup(from) else {
            return false;
        };
        let to_id = self.strings.intern(to);
        let Some(node) = self.nodes.get_mut(id as usize) else {
            return false;
        };
        match node.attributes.iter_mut().find(|a| a.name_id == from_id) {
            Some(attr) => {
                attr.name_id = to_id;
                true
            }
            None => false,
        }
    }

    /// Replace the character data of a text, comment or PI node
    pub fn set_value(&mut self, id: NodeId, text: &str) {
        let value_id = self.strings.intern(text);
        if let Some(node) = self.nodes.get_mut(id as usize) {
            node.value_id = value_id;
        }
    }

    /// Replace all children of an element with a single text node
    /// (no text node at all for an empty string)
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if !self.is_element(id) {
            self.set_value(id, text);
            return;
        }
        let children: Vec<NodeId> = self.children(id).collect();
        for child in children {
            self.detach(child);
        }
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node);
        }
    }

    /// Unlink a node from its parent and siblings
    pub fn detach(&mut self, id: NodeId) {
        let Some(node) = self.get_node(id) else {
            return;
        };
        let (parent, prev, next) = (node.parent, node.prev_sibling, node.next_sibling);
        match prev {
            Some(p) => self.nodes[p as usize].next_sibling = next,
            None => {
                if let Some(par) = parent {
                    self.nodes[par as usize].first_child = next;
                }
            }
        }
        match next {
            Some(n) => self.nodes[n as usize].prev_sibling = prev,
            None => {
                if let Some(par) = parent {
                    self.nodes[par as usize].last_child = prev;
                }
            }
        }
        let node = &mut self.nodes[id as usize];
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
        self.invalidate();
    }

    /// Append a node as the last child of `parent`, moving it if attached
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.get_node(parent).is_none() || self.get_node(child).is_none() {
            return;
        }
        self.detach(child);
        let last = self.nodes[parent as usize].last_child;
        match last {
            Some(last_id) => {
                self.nodes[child as usize].prev_sibling = Some(last_id);
                self.nodes[last_id as usize].next_sibling = Some(child);
            }
            None => self.nodes[parent as usize].first_child = Some(child),
        }
        self.nodes[parent as usize].last_child = Some(child);
        self.nodes[child as usize].parent = Some(parent);
        self.invalidate();
    }

    /// Insert `node` immediately before `reference`
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        let Some(parent) = self.parent(reference) else {
            return;
        };
        if node == reference {
            return;
        }
        self.detach(node);
        let prev = self.nodes[reference as usize].prev_sibling;
        match prev {
            Some(p) => self.nodes[p as usize].next_sibling = Some(node),
            None => self.nodes[parent as usize].first_child = Some(node),
        }
        let n = &mut self.nodes[node as usize];
        n.parent = Some(parent);
        n.prev_sibling = prev;
        n.next_sibling = Some(reference);
        self.nodes[reference as usize].prev_sibling = Some(node);
        self.invalidate();
    }

    /// Insert `node` immediately after `reference`
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        match self.next_sibling(reference) {
            Some(next) => self.insert_before(next, node),
            None => {
                if let Some(parent) = self.parent(reference) {
                    self.append_child(parent, node);
                }
            }
        }
    }

    /// Deep-copy a subtree within this document; the copy is detached
    pub fn deep_clone(&mut self, id: NodeId) -> Option<NodeId> {
        let node = self.get_node(id)?;
        let mut copy = node.clone();
        copy.parent = None;
        copy.first_child = None;
        copy.last_child = None;
        copy.prev_sibling = None;
        copy.next_sibling = None;
        let children: Vec<NodeId> = self.children(id).collect();
        let copy_id = self.push(copy);
        for child in children {
            if let Some(child_copy) = self.deep_clone(child) {
                self.append_child(copy_id, child_copy);
            }
        }
        Some(copy_id)
    }

    /// Copy a subtree from another document into this one; the copy is detached
    pub fn import(&mut self, source: &XmlDocument, id: NodeId) -> Option<NodeId> {
        let node = source.get_node(id)?;
        let name_id = self.strings.intern(source.strings.get(node.name_id));
        let value_id = self.strings.intern(source.strings.get(node.value_id));
        let mut copy = XmlNode {
            name_id,
            value_id,
            attributes: Vec::with_capacity(node.attributes.len()),
            ..XmlNode::document()
        };
        copy.kind = node.kind;
        for attr in &node.attributes {
            copy.attributes.push(XmlAttribute::new(
                self.strings.intern(source.strings.get(attr.name_id)),
                self.strings.intern(source.strings.get(attr.value_id)),
            ));
        }
        let copy_id = self.push(copy);
        for child in source.children(id) {
            if let Some(child_copy) = self.import(source, child) {
                self.append_child(copy_id, child_copy);
            }
        }
        Some(copy_id)
    }

    // =========================================================================
    // Document order
    // =========================================================================

    /// Position of a node in document order, `None` when detached
    pub fn document_position(&self, id: NodeId) -> Option<u32> {
        let mut order = self.order.borrow_mut();
        let index = order.get_or_insert_with(|| self.build_order());
        index.get(id as usize).copied().filter(|&pos| pos != u32::MAX)
    }

    fn build_order(&self) -> Vec<u32> {
        let mut index = vec![u32::MAX; self.nodes.len()];
        index[DOCUMENT_NODE as usize] = 0;
        for (pos, id) in self.descendants(DOCUMENT_NODE).enumerate() {
            index[id as usize] = pos as u32 + 1;
        }
        index
    }

    /// Sort node ids into document order and drop duplicates; detached
    /// nodes sort last in id order
    pub fn sort_document_order(&self, nodes: &mut Vec<NodeId>) {
        let mut order = self.order.borrow_mut();
        let index = order.get_or_insert_with(|| self.build_order());
        nodes.sort_by_key(|&id| (index.get(id as usize).copied().unwrap_or(u32::MAX), id));
        nodes.dedup();
    }
}

fn lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Iterator over child nodes
pub struct ChildIter<'d> {
    doc: &'d XmlDocument,
    next: Option<NodeId>,
}

impl Iterator for ChildIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.next_sibling(current);
        Some(current)
    }
}

/// Iterator over descendant nodes (depth-first, document order)
pub struct DescendantIter<'d> {
    doc: &'d XmlDocument,
    stack: Vec<NodeId>,
}

impl Iterator for DescendantIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;

        // Add children to stack in reverse order (so first child is processed first)
        let mut child = self.doc.last_child(current);
        while let Some(id) = child {
            self.stack.push(id);
            child = self.doc.prev_sibling(id);
        }

        Some(current)
    }
}

// =============================================================================
// DocumentAccess trait implementation
// =============================================================================

impl DocumentAccess for XmlDocument {
    fn document_node_id(&self) -> NodeId {
        DOCUMENT_NODE
    }

    fn root_element_id(&self) -> Option<NodeId> {
        self.root_element()
    }

    fn node_kind(&self, id: NodeId) -> Option<NodeKind> {
        self.kind(id)
    }

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id)
    }

    fn next_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        self.next_sibling(id)
    }

    fn prev_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        self.prev_sibling(id)
    }

    fn children_vec(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id).collect()
    }

    fn descendants_vec(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id).collect()
    }

    fn node_name(&self, id: NodeId) -> &str {
        self.name(id)
    }

    fn node_namespace_uri(&self, id: NodeId) -> Option<&str> {
        self.namespace_uri(id)
    }

    fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attribute(id, name)
    }

    fn get_attribute_values(&self, id: NodeId) -> Vec<(&str, &str)> {
        self.attributes(id).collect()
    }

    fn string_value(&self, id: NodeId) -> String {
        XmlDocument::string_value(self, id)
    }

    fn sort_document_order(&self, nodes: &mut Vec<NodeId>) {
        XmlDocument::sort_document_order(self, nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(doc: &XmlDocument, parent: NodeId, n: usize) -> NodeId {
        doc.element_children(parent).nth(n).unwrap()
    }

    #[test]
    fn test_parse_simple() {
        let doc = XmlDocument::parse("<root>hello</root>").unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.name(root), "root");
        assert_eq!(doc.string_value(root), "hello");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            XmlDocument::parse("<a><b></a>"),
            Err(DomError::TagMismatch { .. })
        ));
        assert!(matches!(
            XmlDocument::parse("<a/><b/>"),
            Err(DomError::MultipleRoots)
        ));
        assert!(matches!(
            XmlDocument::parse("<a>"),
            Err(DomError::UnclosedTag(name)) if name == "a"
        ));
        assert!(matches!(XmlDocument::parse("  "), Err(DomError::NoRootElement)));
        assert!(matches!(
            XmlDocument::parse("<a><!-- x</a>"),
            Err(DomError::Syntax(_))
        ));
    }

    #[test]
    fn test_descendants() {
        let doc = XmlDocument::parse("<root><a/><b><c/></b></root>").unwrap();
        let root = doc.root_element().unwrap();
        let names: Vec<_> = doc.descendants(root).map(|d| doc.name(d)).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_attributes() {
        let mut doc = XmlDocument::parse("<r a=\"1\" b=\"2\"/>").unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.attribute(root, "b"), Some("2"));
        doc.set_attribute(root, "a", "9");
        doc.set_attribute(root, "c", "3");
        let attrs: Vec<_> = doc.attributes(root).collect();
        assert_eq!(attrs, vec![("a", "9"), ("b", "2"), ("c", "3")]);
        assert!(doc.remove_attribute(root, "b"));
        assert!(!doc.remove_attribute(root, "b"));
        assert!(doc.rename_attribute(root, "c", "d"));
        assert_eq!(doc.attribute(root, "d"), Some("3"));
    }

    #[test]
    fn test_namespace_lookup() {
        let doc = XmlDocument::parse(
            "<data xmlns:orx=\"http://openrosa.org/xforms\"><orx:meta><x/></orx:meta></data>",
        )
        .unwrap();
        let root = doc.root_element().unwrap();
        let meta = child(&doc, root, 0);
        assert_eq!(doc.local_name(meta), "meta");
        assert_eq!(doc.namespace_uri(meta), Some("http://openrosa.org/xforms"));
        assert_eq!(doc.namespace_uri(child(&doc, meta, 0)), None);
    }

    #[test]
    fn test_clone_and_document_order() {
        let mut doc = XmlDocument::parse("<r><a>1</a><b/></r>").unwrap();
        let root = doc.root_element().unwrap();
        let a = child(&doc, root, 0);
        let b = child(&doc, root, 1);
        let copy = doc.deep_clone(a).unwrap();
        assert!(!doc.is_attached(copy));
        assert_eq!(doc.document_position(copy), None);

        doc.insert_after(a, copy);
        assert!(doc.is_attached(copy));
        assert_eq!(doc.string_value(copy), "1");

        let mut nodes = vec![b, copy, a, copy];
        doc.sort_document_order(&mut nodes);
        assert_eq!(nodes, vec![a, copy, b]);
    }

    #[test]
    fn test_detach_and_insert_before() {
        let mut doc = XmlDocument::parse("<r><a/><b/><c/></r>").unwrap();
        let root = doc.root_element().unwrap();
        let (a, b, c) = (child(&doc, root, 0), child(&doc, root, 1), child(&doc, root, 2));
        doc.detach(b);
        assert_eq!(doc.next_sibling(a), Some(c));
        doc.insert_before(a, b);
        let names: Vec<_> = doc.element_children(root).map(|n| doc.name(n)).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        doc.detach(c);
        assert_eq!(doc.last_child(root), Some(a));
    }

    #[test]
    fn test_set_text_and_import() {
        let mut doc = XmlDocument::parse("<r><x>old<y/></x></r>").unwrap();
        let root = doc.root_element().unwrap();
        let x = child(&doc, root, 0);
        doc.set_text(x, "new");
        assert!(doc.is_leaf(x));
        assert_eq!(doc.string_value(x), "new");
        doc.set_text(x, "");
        assert!(doc.first_child(x).is_none());

        let other = XmlDocument::parse("<z k=\"v\">text</z>").unwrap();
        let z = doc.import(&other, other.root_element().unwrap()).unwrap();
        doc.append_child(root, z);
        assert_eq!(doc.attribute(z, "k"), Some("v"));
        assert_eq!(doc.string_value(z), "text");
    }
}
