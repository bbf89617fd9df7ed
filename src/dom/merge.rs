//! Two-source element merge
//!
//! Non-joining, order-preserving merge of a second element tree into a first
//! one whose root has the same name. The first tree provides the skeleton and
//! its document order; the second tree provides values.
//!
//! - attributes of the second source override those of the first
//! - non-blank direct text of the second source replaces the first's direct text
//! - element children are paired by qualified name and same-name position
//! - unpaired children are imported after the last same-name sibling, or after
//!   the previously paired sibling, or appended

use super::document::XmlDocument;
use super::node::{NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MergeError {
    #[error("cannot merge <{second}> into <{first}>: root names differ")]
    RootMismatch { first: String, second: String },
    #[error("merge source has no root element")]
    MissingRoot,
}

/// Merge the root of `second` into a copy of `first`
pub fn merge_documents(first: &XmlDocument, second: &XmlDocument) -> Result<XmlDocument, MergeError> {
    let first_root = first.root_element().ok_or(MergeError::MissingRoot)?;
    let second_root = second.root_element().ok_or(MergeError::MissingRoot)?;
    let mut merged = XmlDocument::new();
    let root = merged
        .import(first, first_root)
        .ok_or(MergeError::MissingRoot)?;
    merged.append_child(crate::dom::DOCUMENT_NODE, root);
    merge_into(&mut merged, root, second, second_root)?;
    Ok(merged)
}

/// Merge `source_id` of `source` into the element `target_id` of `target`
pub fn merge_into(
    target: &mut XmlDocument,
    target_id: NodeId,
    source: &XmlDocument,
    source_id: NodeId,
) -> Result<(), MergeError> {
    if target.name(target_id) != source.name(source_id) {
        return Err(MergeError::RootMismatch {
            first: target.name(target_id).to_string(),
            second: source.name(source_id).to_string(),
        });
    }
    merge_element(target, target_id, source, source_id);
    Ok(())
}

fn merge_element(target: &mut XmlDocument, t: NodeId, source: &XmlDocument, s: NodeId) {
    for (name, value) in source.attributes(s) {
        target.set_attribute(t, name, value);
    }

    let text: String = source
        .children(s)
        .filter(|&c| source.get_node(c).is_some_and(|n| n.is_text()))
        .map(|c| source.value(c))
        .collect();
    if !text.trim().is_empty() {
        replace_direct_text(target, t, &text);
    }

    let mut anchor: Option<NodeId> = None;
    let mut seen: Vec<(&str, usize)> = Vec::new();
    for child in source.element_children(s) {
        let name = source.name(child);
        let position = match seen.iter_mut().find(|(n, _)| *n == name) {
            Some((_, count)) => {
                *count += 1;
                *count
            }
            None => {
                seen.push((name, 0));
                0
            }
        };

        let same_name: Vec<NodeId> = target
            .element_children(t)
            .filter(|&c| target.name(c) == name)
            .collect();
        let paired = match same_name.get(position) {
            Some(&existing) => {
                merge_element(target, existing, source, child);
                Some(existing)
            }
            None => target.import(source, child).map(|copy| {
                match same_name.last().copied().or(anchor) {
                    Some(after) => target.insert_after(after, copy),
                    None => target.append_child(t, copy),
                }
                copy
            }),
        };
        if paired.is_some() {
            anchor = paired;
        }
    }
}

fn replace_direct_text(target: &mut XmlDocument, t: NodeId, text: &str) {
    let existing: Vec<NodeId> = target
        .children(t)
        .filter(|&c| target.kind(c) == Some(NodeKind::Text) || target.kind(c) == Some(NodeKind::CData))
        .collect();
    match existing.split_first() {
        Some((&first, rest)) => {
            target.set_value(first, text);
            for &extra in rest {
                target.detach(extra);
            }
        }
        None => {
            let node = target.create_text(text);
            match target.first_child(t) {
                Some(first) => target.insert_before(first, node),
                None => target.append_child(t, node),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge(first: &str, second: &str) -> String {
        let first = XmlDocument::parse(first).unwrap();
        let second = XmlDocument::parse(second).unwrap();
        let merged = merge_documents(&first, &second).unwrap();
        merged.to_xml(merged.root_element().unwrap())
    }

    #[test]
    fn test_values_override() {
        assert_eq!(
            merge("<d v=\"1\"><a>x</a><b/></d>", "<d v=\"2\"><b>y</b></d>"),
            "<d v=\"2\"><a>x</a><b>y</b></d>"
        );
    }

    #[test]
    fn test_blank_source_text_keeps_target() {
        assert_eq!(merge("<d><a>x</a></d>", "<d><a> </a></d>"), "<d><a>x</a></d>");
    }

    #[test]
    fn test_repeats_pair_by_position() {
        assert_eq!(
            merge(
                "<d><r><v/></r><r><v/></r><z/></d>",
                "<d><r><v>1</v></r><r><v>2</v></r><r><v>3</v></r></d>"
            ),
            "<d><r><v>1</v></r><r><v>2</v></r><r><v>3</v></r><z/></d>"
        );
    }

    #[test]
    fn test_unpaired_child_follows_previous_sibling() {
        assert_eq!(
            merge("<d><a/><c/></d>", "<d><a/><b>new</b></d>"),
            "<d><a/><b>new</b><c/></d>"
        );
    }

    #[test]
    fn test_root_mismatch() {
        let first = XmlDocument::parse("<d/>").unwrap();
        let second = XmlDocument::parse("<e/>").unwrap();
        assert!(matches!(
            merge_documents(&first, &second),
            Err(MergeError::RootMismatch { .. })
        ));
    }
}
