//! XPath Axes Implementation
//!
//! All 13 XPath 1.0 axes:
//! - child, parent, self
//! - descendant, descendant-or-self
//! - ancestor, ancestor-or-self
//! - following, following-sibling
//! - preceding, preceding-sibling
//! - attribute, namespace
//!
//! Forward axes return nodes in document order, reverse axes in reverse
//! document order, so predicate positions count outward from the context.

use super::compiler::CompiledNodeTest;
use super::parser::Axis;
use crate::dom::{DocumentAccess, NamespaceTable, NodeId, NodeKind};
use std::collections::HashSet;

/// Navigate along an axis from a context node
pub fn navigate<D: DocumentAccess>(doc: &D, context: NodeId, axis: Axis) -> Vec<NodeId> {
    match axis {
        Axis::Child => doc.children_vec(context),
        Axis::Descendant => doc.descendants_vec(context),
        Axis::DescendantOrSelf => descendant_or_self_axis(doc, context),
        Axis::Parent => doc.parent_of(context).into_iter().collect(),
        Axis::Ancestor => ancestor_axis(doc, context),
        Axis::AncestorOrSelf => {
            let mut result = vec![context];
            result.extend(ancestor_axis(doc, context));
            result
        }
        Axis::FollowingSibling => sibling_axis(doc, context, D::next_sibling_of),
        Axis::PrecedingSibling => sibling_axis(doc, context, D::prev_sibling_of),
        Axis::Following => following_axis(doc, context),
        Axis::Preceding => preceding_axis(doc, context),
        Axis::Self_ => vec![context],
        // Attributes and namespaces are not nodes in this DOM; the evaluator
        // reads attribute values directly
        Axis::Attribute | Axis::Namespace => Vec::new(),
    }
}

/// descendant-or-self:: axis - context node plus all descendants
fn descendant_or_self_axis<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    let descendants = doc.descendants_vec(context);
    let mut result = Vec::with_capacity(1 + descendants.len());
    result.push(context);
    result.extend(descendants);
    result
}

/// ancestor:: axis - parent, grandparent, ... up to the document node
fn ancestor_axis<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut current = context;

    while let Some(parent) = doc.parent_of(current) {
        result.push(parent);
        current = parent;
    }

    result
}

fn sibling_axis<D: DocumentAccess>(
    doc: &D,
    context: NodeId,
    step: fn(&D, NodeId) -> Option<NodeId>,
) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut sibling = step(doc, context);
    while let Some(sib_id) = sibling {
        result.push(sib_id);
        sibling = step(doc, sib_id);
    }
    result
}

/// following:: axis - all nodes after in document order (not descendants)
fn following_axis<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut current = Some(context);

    while let Some(node) = current {
        let mut sibling = doc.next_sibling_of(node);
        while let Some(sib_id) = sibling {
            result.push(sib_id);
            result.extend(doc.descendants_vec(sib_id));
            sibling = doc.next_sibling_of(sib_id);
        }
        current = doc.parent_of(node);
    }

    result
}

/// preceding:: axis - all nodes before in document order (not ancestors)
fn preceding_axis<D: DocumentAccess>(doc: &D, context: NodeId) -> Vec<NodeId> {
    let ancestors: HashSet<NodeId> = ancestor_axis(doc, context).into_iter().collect();
    let mut result = Vec::new();

    for node in doc.descendants_vec(doc.document_node_id()) {
        if node == context {
            break;
        }
        if !ancestors.contains(&node) {
            result.push(node);
        }
    }

    result.reverse();
    result
}

/// Check if a node matches a node test
///
/// Unprefixed names match elements without a prefix. Prefixed names compare
/// namespace URIs when the prefix is known to the table, and fall back to
/// comparing the literal prefix otherwise.
pub fn matches_node_test<D: DocumentAccess>(
    doc: &D,
    namespaces: &NamespaceTable,
    node_id: NodeId,
    node_test: &CompiledNodeTest,
) -> bool {
    let Some(kind) = doc.node_kind(node_id) else {
        return false;
    };

    match node_test {
        CompiledNodeTest::Any => kind == NodeKind::Element,
        CompiledNodeTest::Name(name) => {
            kind == NodeKind::Element
                && doc.node_prefix(node_id).is_none()
                && doc.node_local_name(node_id) == name
        }
        CompiledNodeTest::QName(prefix, local) => {
            kind == NodeKind::Element
                && doc.node_local_name(node_id) == local
                && prefix_matches(doc, namespaces, node_id, prefix)
        }
        CompiledNodeTest::NamespaceWildcard(prefix) => {
            kind == NodeKind::Element && prefix_matches(doc, namespaces, node_id, prefix)
        }
        CompiledNodeTest::Node => true,
        CompiledNodeTest::Text => kind == NodeKind::Text || kind == NodeKind::CData,
        CompiledNodeTest::Comment => kind == NodeKind::Comment,
        CompiledNodeTest::ProcessingInstruction(target) => {
            kind == NodeKind::ProcessingInstruction
                && target
                    .as_deref()
                    .is_none_or(|expected| doc.node_name(node_id) == expected)
        }
    }
}

fn prefix_matches<D: DocumentAccess>(
    doc: &D,
    namespaces: &NamespaceTable,
    node_id: NodeId,
    prefix: &str,
) -> bool {
    match (namespaces.resolve(prefix), doc.node_namespace_uri(node_id)) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => doc.node_prefix(node_id) == Some(prefix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::XmlDocument;

    fn named(doc: &XmlDocument, nodes: Vec<NodeId>) -> Vec<&str> {
        nodes.into_iter().map(|n| doc.name(n)).collect()
    }

    #[test]
    fn test_child_axis() {
        let doc = XmlDocument::parse("<root><a/><b/></root>").unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(named(&doc, navigate(&doc, root, Axis::Child)), vec!["a", "b"]);
    }

    #[test]
    fn test_ancestor_axis() {
        let doc = XmlDocument::parse("<root><a><b/></a></root>").unwrap();
        let b = doc.descendants(0).find(|&n| doc.name(n) == "b").unwrap();
        let ancestors = navigate(&doc, b, Axis::Ancestor);
        assert_eq!(ancestors.len(), 3); // a, root, document
        assert_eq!(doc.name(ancestors[0]), "a");
    }

    #[test]
    fn test_sibling_axes_order() {
        let doc = XmlDocument::parse("<r><a/><b/><c/><d/></r>").unwrap();
        let c = doc.descendants(0).find(|&n| doc.name(n) == "c").unwrap();
        assert_eq!(named(&doc, navigate(&doc, c, Axis::PrecedingSibling)), vec!["b", "a"]);
        assert_eq!(named(&doc, navigate(&doc, c, Axis::FollowingSibling)), vec!["d"]);
    }

    #[test]
    fn test_following_and_preceding() {
        let doc = XmlDocument::parse("<r><a><x/></a><b><y/></b><c/></r>").unwrap();
        let b = doc.descendants(0).find(|&n| doc.name(n) == "b").unwrap();
        assert_eq!(named(&doc, navigate(&doc, b, Axis::Following)), vec!["c"]);
        assert_eq!(named(&doc, navigate(&doc, b, Axis::Preceding)), vec!["x", "a"]);
    }

    #[test]
    fn test_namespace_aware_name_tests() {
        let doc = XmlDocument::parse(
            r#"<data xmlns:odk="http://openrosa.org/xforms"><odk:meta/><meta/></data>"#,
        )
        .unwrap();
        let root = doc.root_element().unwrap();
        let children = doc.children_vec(root);
        let mut table = NamespaceTable::new();
        table.declare("orx", crate::dom::ns::OPENROSA);

        let qname = CompiledNodeTest::QName("orx".into(), "meta".into());
        assert!(matches_node_test(&doc, &table, children[0], &qname));
        assert!(!matches_node_test(&doc, &table, children[1], &qname));

        let plain = CompiledNodeTest::Name("meta".into());
        assert!(!matches_node_test(&doc, &table, children[0], &plain));
        assert!(matches_node_test(&doc, &table, children[1], &plain));
    }
}
