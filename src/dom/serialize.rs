//! Subtree serialization
//!
//! Writes any node back to XML text. Uses an explicit stack so deeply nested
//! instances cannot overflow the call stack.

use super::document::XmlDocument;
use super::node::{NodeId, NodeKind};
use crate::core::entities::{encode_attribute, encode_text};

/// Output tweaks applied while serializing
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeOptions<'o> {
    /// Drop comments whose content starts with this text
    pub skip_comments_starting_with: Option<&'o str>,
    /// Omit `xmlns:p` declarations already made identically by an ancestor
    /// inside the serialized subtree
    pub collapse_namespace_declarations: bool,
}

enum StackEntry {
    Enter(NodeId),
    Close(NodeId),
}

impl XmlDocument {
    /// Serialize a node and its descendants with default options
    pub fn to_xml(&self, id: NodeId) -> String {
        self.to_xml_with(id, &SerializeOptions::default())
    }

    /// Serialize a node and its descendants
    pub fn to_xml_with(&self, id: NodeId, options: &SerializeOptions<'_>) -> String {
        let mut buf = String::with_capacity(1024);
        let mut stack: Vec<StackEntry> = Vec::with_capacity(64);
        stack.push(StackEntry::Enter(id));

        while let Some(entry) = stack.pop() {
            match entry {
                StackEntry::Close(current) => {
                    buf.push_str("</");
                    buf.push_str(self.name(current));
                    buf.push('>');
                }
                StackEntry::Enter(current) => {
                    let Some(kind) = self.kind(current) else {
                        continue;
                    };
                    match kind {
                        NodeKind::Element => {
                            buf.push('<');
                            buf.push_str(self.name(current));
                            self.write_attributes(current, id, options, &mut buf);

                            if self.first_child(current).is_none() {
                                buf.push_str("/>");
                            } else {
                                buf.push('>');
                                stack.push(StackEntry::Close(current));
                                let mut child = self.last_child(current);
                                while let Some(cid) = child {
                                    stack.push(StackEntry::Enter(cid));
                                    child = self.prev_sibling(cid);
                                }
                            }
                        }
                        NodeKind::Text => buf.push_str(&encode_text(self.value(current))),
                        NodeKind::CData => {
                            buf.push_str("<![CDATA[");
                            buf.push_str(self.value(current));
                            buf.push_str("]]>");
                        }
                        NodeKind::Comment => {
                            let content = self.value(current);
                            let skip = options
                                .skip_comments_starting_with
                                .is_some_and(|marker| content.starts_with(marker));
                            if !skip {
                                buf.push_str("<!--");
                                buf.push_str(content);
                                buf.push_str("-->");
                            }
                        }
                        NodeKind::ProcessingInstruction => {
                            buf.push_str("<?");
                            buf.push_str(self.name(current));
                            let data = self.value(current);
                            if !data.is_empty() {
                                buf.push(' ');
                                buf.push_str(data);
                            }
                            buf.push_str("?>");
                        }
                        NodeKind::Document => {
                            let mut child = self.last_child(current);
                            while let Some(cid) = child {
                                stack.push(StackEntry::Enter(cid));
                                child = self.prev_sibling(cid);
                            }
                        }
                    }
                }
            }
        }

        buf
    }

    fn write_attributes(
        &self,
        current: NodeId,
        top: NodeId,
        options: &SerializeOptions<'_>,
        buf: &mut String,
    ) {
        for (name, value) in self.attributes(current) {
            if options.collapse_namespace_declarations
                && name.starts_with("xmlns:")
                && self.declared_above(current, top, name, value)
            {
                continue;
            }
            buf.push(' ');
            buf.push_str(name);
            buf.push_str("=\"");
            buf.push_str(&encode_attribute(value));
            buf.push('"');
        }
    }

    fn declared_above(&self, current: NodeId, top: NodeId, name: &str, value: &str) -> bool {
        if current == top {
            return false;
        }
        let mut node = self.parent(current);
        while let Some(ancestor) = node {
            if self.attribute(ancestor, name) == Some(value) {
                return true;
            }
            if ancestor == top {
                break;
            }
            node = self.parent(ancestor);
        }
        false
    }
}
