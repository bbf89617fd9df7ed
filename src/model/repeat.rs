//! Repeat templates, series and ordinals
//!
//! Each series of repeat instances is preceded in the tree by a marker
//! comment `repeat:<path>`. Series are found by counting those markers, so
//! a nested repeat has one series per instance of its parent. Markers are
//! dropped when the model is serialized.

use super::events::{DataUpdate, ModelEvent};
use super::FormModel;
use crate::dom::{ns, NodeId, NodeKind, XmlDocument, DOCUMENT_NODE};
use tracing::{debug, error, warn};

/// Text that starts every series marker comment
pub const MARKER_PREFIX: &str = "repeat:";

pub(crate) fn marker_text(path: &str) -> String {
    format!("{}{}", MARKER_PREFIX, path)
}

/// Name path of `node` below `stop`, e.g. `/data/rep/x`. With `positioned`,
/// every step below the top one carries its 1-based position among
/// same-name siblings.
pub fn element_path(doc: &XmlDocument, node: NodeId, stop: Option<NodeId>, positioned: bool) -> String {
    let mut steps = Vec::new();
    for n in doc.ancestors_or_self(node) {
        if Some(n) == stop || n == DOCUMENT_NODE || !doc.is_element(n) {
            break;
        }
        let top = match doc.parent(n) {
            Some(parent) => Some(parent) == stop || parent == DOCUMENT_NODE,
            None => true,
        };
        if positioned && !top {
            steps.push(format!("{}[{}]", doc.name(n), same_name_position(doc, n)));
        } else {
            steps.push(doc.name(n).to_string());
        }
    }
    steps.reverse();
    format!("/{}", steps.join("/"))
}

/// 1-based position among same-name element siblings
pub fn same_name_position(doc: &XmlDocument, node: NodeId) -> usize {
    let name = doc.name(node);
    let mut position = 1;
    let mut current = doc.prev_element_sibling(node);
    while let Some(sibling) = current {
        if doc.name(sibling) == name {
            position += 1;
        }
        current = doc.prev_element_sibling(sibling);
    }
    position
}

/// Whether another element child of the same parent has the same name
pub fn has_same_name_siblings(doc: &XmlDocument, node: NodeId) -> bool {
    let Some(parent) = doc.parent(node) else {
        return false;
    };
    let name = doc.name(node);
    doc.element_children(parent)
        .any(|sibling| sibling != node && doc.name(sibling) == name)
}

/// Remove the text content of `node` without touching its other children
pub(crate) fn clear_text(doc: &mut XmlDocument, node: NodeId) {
    let text: Vec<NodeId> = doc
        .children(node)
        .filter(|&c| matches!(doc.kind(c), Some(NodeKind::Text | NodeKind::CData)))
        .collect();
    for child in text {
        doc.detach(child);
    }
}

/// Empty every leaf element of a subtree
pub(crate) fn blank_leaves(doc: &mut XmlDocument, node: NodeId) {
    let leaves: Vec<NodeId> = std::iter::once(node)
        .chain(doc.descendants(node))
        .filter(|&n| doc.is_element(n) && doc.is_leaf(n))
        .collect();
    for leaf in leaves {
        clear_text(doc, leaf);
    }
}

impl FormModel {
    fn ordinal_attribute(&self) -> String {
        format!("{}:ordinal", self.enk_prefix)
    }

    fn last_ordinal_attribute(&self) -> String {
        format!("{}:last-used-ordinal", self.enk_prefix)
    }

    /// `jr:template` or an unprefixed `template` attribute
    fn template_marker(&self, node: NodeId) -> Option<String> {
        self.doc
            .attributes(node)
            .map(|(name, _)| name)
            .find(|name| match name.split_once(':') {
                None => *name == "template",
                Some((prefix, local)) => {
                    // detached clones resolve through the model's table
                    local == "template"
                        && self
                            .doc
                            .lookup_namespace_uri(node, Some(prefix))
                            .or_else(|| self.namespaces.resolve(prefix))
                            == Some(ns::JAVAROSA)
                }
            })
            .map(str::to_string)
    }

    /// Live elements of the primary instance at a repeat path, in document order
    pub(crate) fn nodes_at_path(&self, path: &str) -> Vec<NodeId> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        let name = path.rsplit('/').next().unwrap_or(path);
        std::iter::once(root)
            .chain(self.doc.descendants(root))
            .filter(|&n| self.doc.is_element(n) && self.doc.name(n) == name)
            .filter(|&n| self.node_path(n) == path)
            .collect()
    }

    /// Move every authored template out of the primary instance, leaving a
    /// marker in front of each series
    pub(crate) fn extract_templates(&mut self) {
        let Some(root) = self.root else {
            return;
        };
        let mut marked: Vec<NodeId> = self
            .doc
            .descendants(root)
            .filter(|&n| self.doc.is_element(n) && self.template_marker(n).is_some())
            .collect();
        // innermost first, so outer templates are cloned without nested ones
        marked.reverse();

        for node in marked {
            let path = self.node_path(node);
            self.add_repeat_comments(&path);
            if !self.templates.contains_key(&path) {
                if let Some(template) = self.make_template(node, false) {
                    debug!(path = %path, "extracted repeat template");
                    self.templates.insert(path, template);
                }
            }
            self.doc.detach(node);
        }
    }

    /// Put a marker in front of the first instance of every series at `path`
    pub(crate) fn add_repeat_comments(&mut self, path: &str) {
        let marker = marker_text(path);
        for node in self.nodes_at_path(path) {
            if self.is_first_of_series(node, &marker) {
                let comment = self.doc.create_comment(&marker);
                self.doc.insert_before(node, comment);
            }
        }
    }

    fn is_first_of_series(&self, node: NodeId, marker: &str) -> bool {
        let name = self.doc.name(node);
        let mut current = self.doc.prev_sibling(node);
        while let Some(sibling) = current {
            match self.doc.kind(sibling) {
                Some(NodeKind::Comment) if self.doc.value(sibling) == marker => return false,
                Some(NodeKind::Element) => return self.doc.name(sibling) != name,
                _ => {}
            }
            current = self.doc.prev_sibling(sibling);
        }
        true
    }

    /// Detached copy of `node` without template markers
    fn make_template(&mut self, node: NodeId, empty: bool) -> Option<NodeId> {
        let template = self.doc.deep_clone(node)?;
        let elements: Vec<NodeId> = std::iter::once(template)
            .chain(self.doc.descendants(template))
            .filter(|&n| self.doc.is_element(n))
            .collect();
        for element in elements {
            if let Some(marker) = self.template_marker(element) {
                self.doc.remove_attribute(element, &marker);
            }
        }
        if empty {
            blank_leaves(&mut self.doc, template);
            self.strip_ordinals(template);
        }
        Some(template)
    }

    /// The template for `path`, synthesized from the first live instance
    /// when the form did not declare one
    pub(crate) fn ensure_template(&mut self, path: &str) -> Option<NodeId> {
        if let Some(&template) = self.templates.get(path) {
            return Some(template);
        }
        let first = *self.nodes_at_path(path).first()?;
        self.add_repeat_comments(path);
        let template = self.make_template(first, true)?;
        debug!(path = %path, "synthesized repeat template");
        self.templates.insert(path.to_string(), template);
        Some(template)
    }

    fn series_marker(&self, path: &str, series_index: usize) -> Option<NodeId> {
        let root = self.root?;
        let marker = marker_text(path);
        self.doc
            .descendants(root)
            .filter(|&n| {
                self.doc.kind(n) == Some(NodeKind::Comment) && self.doc.value(n) == marker
            })
            .nth(series_index)
    }

    /// Instances of one series, in order. Empty when the series has no marker.
    pub fn get_repeat_series(&self, path: &str, series_index: usize) -> Vec<NodeId> {
        match self.series_marker(path, series_index) {
            Some(marker) => self.series_after(marker, path).0,
            None => Vec::new(),
        }
    }

    /// Same-name siblings following a marker, and whether a foreign element
    /// ended the run
    fn series_after(&self, marker: NodeId, path: &str) -> (Vec<NodeId>, bool) {
        let name = path.rsplit('/').next().unwrap_or(path);
        let mut members = Vec::new();
        let mut current = self.doc.next_sibling(marker);
        while let Some(sibling) = current {
            match self.doc.kind(sibling) {
                Some(NodeKind::Element) if self.doc.name(sibling) == name => members.push(sibling),
                Some(NodeKind::Element) => return (members, true),
                Some(NodeKind::Comment) if self.doc.value(sibling).starts_with(MARKER_PREFIX) => {
                    return (members, false)
                }
                _ => {}
            }
            current = self.doc.next_sibling(sibling);
        }
        (members, false)
    }

    /// Append a new instance to a series. While merging a record the new
    /// instance is left blank and no notification is queued.
    pub fn add_repeat(&mut self, path: &str, series_index: usize, merge: bool) -> Option<NodeId> {
        let Some(template) = self.ensure_template(path) else {
            warn!(path = %path, "no template for repeat");
            return None;
        };
        let Some(marker) = self.series_marker(path, series_index) else {
            error!(path = %path, series_index, "could not find repeat series to add to");
            return None;
        };
        let (members, foreign) = self.series_after(marker, path);
        if foreign && members.is_empty() {
            warn!(path = %path, "repeat marker is followed by a different element");
        }

        if !merge && self.config().ordinals {
            for &member in &members {
                self.ensure_ordinal(member, members[0]);
            }
        }

        let anchor = members.last().copied().unwrap_or(marker);
        let clone = self.doc.deep_clone(template)?;
        self.strip_ordinals(clone);
        self.doc.insert_after(anchor, clone);

        if merge {
            blank_leaves(&mut self.doc, clone);
        } else {
            if self.config().ordinals {
                if let Some(last) = self.retired_counters.remove(&marker) {
                    let last_attribute = self.last_ordinal_attribute();
                    self.doc.set_attribute(clone, &last_attribute, &last);
                }
                let holder = members.first().copied().unwrap_or(clone);
                self.assign_ordinal(clone, holder);
            }
            let repeat_index = self.determine_index(clone).unwrap_or(0);
            self.push_event(ModelEvent::DataUpdate(DataUpdate {
                repeat_path: Some(path.to_string()),
                repeat_index: Some(repeat_index),
                ..Default::default()
            }));
        }
        Some(clone)
    }

    fn strip_ordinals(&mut self, node: NodeId) {
        let ordinal = self.ordinal_attribute();
        let last = self.last_ordinal_attribute();
        let elements: Vec<NodeId> = std::iter::once(node)
            .chain(self.doc.descendants(node))
            .filter(|&n| self.doc.is_element(n))
            .collect();
        for element in elements {
            self.doc.remove_attribute(element, &ordinal);
            self.doc.remove_attribute(element, &last);
        }
    }

    fn ensure_ordinal(&mut self, node: NodeId, holder: NodeId) {
        if !self.doc.has_attribute(node, &self.ordinal_attribute()) {
            self.assign_ordinal(node, holder);
        }
    }

    /// Next ordinal from the counter on the series' first instance
    fn assign_ordinal(&mut self, node: NodeId, holder: NodeId) {
        let last_attribute = self.last_ordinal_attribute();
        let last: usize = self
            .doc
            .attribute(holder, &last_attribute)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        let next = (last + 1).to_string();
        self.doc.set_attribute(holder, &last_attribute, &next);
        let ordinal = self.ordinal_attribute();
        self.doc.set_attribute(node, &ordinal, &next);
    }

    /// Move the ordinal counter off an instance about to be removed, onto the
    /// next instance of its series. The last instance leaves it on the
    /// series marker.
    pub(crate) fn hand_over_counter(&mut self, node: NodeId) {
        let last_attribute = self.last_ordinal_attribute();
        let Some(last) = self.doc.attribute(node, &last_attribute).map(str::to_string) else {
            return;
        };
        let name = self.doc.name(node).to_string();
        let mut current = self.doc.next_sibling(node);
        while let Some(sibling) = current {
            if self.doc.is_element(sibling) {
                if self.doc.name(sibling) == name {
                    self.doc.set_attribute(sibling, &last_attribute, &last);
                    return;
                }
                break;
            }
            current = self.doc.next_sibling(sibling);
        }
        let mut current = self.doc.prev_sibling(node);
        while let Some(sibling) = current {
            if self.doc.kind(sibling) == Some(NodeKind::Comment)
                && self.doc.value(sibling).starts_with(MARKER_PREFIX)
            {
                self.retired_counters.insert(sibling, last);
                return;
            }
            current = self.doc.prev_sibling(sibling);
        }
    }

    /// 0-based position of a repeat instance among every live node with the
    /// same path; `None` when it is the only one
    pub fn determine_index(&self, node: NodeId) -> Option<usize> {
        let same = self.nodes_at_path(&self.node_path(node));
        if same.len() <= 1 {
            return None;
        }
        same.iter().position(|&n| n == node)
    }

    /// Path and index of the closest repeat instance containing `node`
    pub fn enclosing_repeat(&self, node: NodeId) -> Option<(String, usize)> {
        for n in self.doc.ancestors_or_self(node) {
            if Some(n) == self.root || !self.doc.is_element(n) {
                break;
            }
            let path = self.node_path(n);
            if has_same_name_siblings(&self.doc, n) || self.templates.contains_key(&path) {
                return Some((path, self.determine_index(n).unwrap_or(0)));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EvalResult, EventData, FormData, ModelConfig, ModelEvent, NodeFilter, ResultKind};
    use rstest::rstest;

    const FORM: &str = r#"<model xmlns:jr="http://openrosa.org/javarosa"><instance><data><rep jr:template=""><a>default</a><sub jr:template=""><b/></sub></rep><rep><a>one</a></rep><meta><instanceID>x</instanceID></meta></data></instance></model>"#;

    fn load(config: ModelConfig) -> FormModel {
        let mut model = FormModel::new(FormData::new(FORM), config);
        assert!(model.init().is_empty());
        model
    }

    fn count(model: &mut FormModel, expr: &str) -> f64 {
        match model.evaluate(expr, ResultKind::Number, None, None, false).unwrap() {
            EvalResult::Number(n) => n,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_element_path() {
        let doc = XmlDocument::parse("<data><g/><g><x/></g></data>").unwrap();
        let x = doc.descendants(DOCUMENT_NODE).find(|&n| doc.name(n) == "x").unwrap();
        assert_eq!(element_path(&doc, x, None, false), "/data/g/x");
        assert_eq!(element_path(&doc, x, None, true), "/data/g[2]/x[1]");
    }

    #[test]
    fn test_templates_and_markers() {
        let model = load(ModelConfig::default());
        assert!(model.template("/data/rep").is_some());
        assert!(model.template("/data/rep/sub").is_some());
        let series = model.get_repeat_series("/data/rep", 0);
        assert_eq!(series.len(), 1);
        assert!(model.get_repeat_series("/data/rep", 1).is_empty());
        let template = model.template("/data/rep").unwrap();
        assert!(!model.document().to_xml(template).contains("template"));
    }

    #[test]
    fn test_add_repeat_with_ordinals() {
        let config = ModelConfig {
            ordinals: true,
            ..Default::default()
        };
        let mut model = load(config);
        let added = model.add_repeat("/data/rep", 0, false).unwrap();
        assert_eq!(count(&mut model, "count(/data/rep)"), 2.0);

        let series = model.get_repeat_series("/data/rep", 0);
        assert_eq!(series[1], added);
        let doc = model.document();
        assert_eq!(doc.attribute(series[0], "enk:ordinal"), Some("1"));
        assert_eq!(doc.attribute(added, "enk:ordinal"), Some("2"));
        assert_eq!(doc.attribute(series[0], "enk:last-used-ordinal"), Some("2"));
        assert!(model.get_str().contains(r#"xmlns:enk="http://enketo.org/xforms""#));

        let events = model.drain_events();
        assert_eq!(events.len(), 1);
        let ModelEvent::DataUpdate(update) = &events[0] else {
            panic!("expected a data update");
        };
        assert_eq!(update.repeat_path.as_deref(), Some("/data/rep"));
        assert_eq!(update.repeat_index, Some(1));
        assert!(update.nodes.is_none());
    }

    #[test]
    fn test_ordinals_strictly_increase() {
        let config = ModelConfig {
            ordinals: true,
            ..Default::default()
        };
        let mut model = load(config);
        for _ in 0..3 {
            model.add_repeat("/data/rep", 0, false);
        }
        let ordinals: Vec<usize> = model
            .get_repeat_series("/data/rep", 0)
            .into_iter()
            .filter_map(|n| model.document().attribute(n, "enk:ordinal")?.parse().ok())
            .collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4]);
    }

    fn ordinals(model: &FormModel) -> Vec<usize> {
        model
            .get_repeat_series("/data/rep", 0)
            .into_iter()
            .filter_map(|n| model.document().attribute(n, "enk:ordinal")?.parse().ok())
            .collect()
    }

    #[rstest]
    #[case::first(&[0], vec![2, 3, 4, 5])]
    #[case::middle(&[2], vec![1, 2, 4, 5])]
    #[case::first_twice(&[0, 0], vec![3, 4, 5])]
    #[case::everything(&[0, 0, 0, 0], vec![5])]
    fn test_ordinals_not_reused_after_remove(#[case] removals: &[usize], #[case] expected: Vec<usize>) {
        let mut model = load(ModelConfig {
            ordinals: true,
            ..Default::default()
        });
        for _ in 0..3 {
            model.add_repeat("/data/rep", 0, false);
        }
        for &index in removals {
            let removed = model
                .node(Some("/data/rep"), Some(index), NodeFilter::default())
                .remove(EventData::new())
                .unwrap();
            assert!(removed);
        }
        let added = model.add_repeat("/data/rep", 0, false).unwrap();
        assert_eq!(model.document().attribute(added, "enk:ordinal"), Some("5"));
        assert_eq!(ordinals(&model), expected);

        let first = model.get_repeat_series("/data/rep", 0)[0];
        assert_eq!(model.document().attribute(first, "enk:last-used-ordinal"), Some("5"));
    }

    #[test]
    fn test_nested_series() {
        let mut model = load(ModelConfig::default());
        // the first rep was authored without <sub>, only the template has it
        assert!(model.add_repeat("/data/rep/sub", 0, false).is_none());
        model.add_repeat("/data/rep", 0, false);
        assert!(model.add_repeat("/data/rep/sub", 0, false).is_some());
        assert!(model.add_repeat("/data/rep/sub", 0, false).is_some());
        assert_eq!(model.get_repeat_series("/data/rep/sub", 0).len(), 2);
        assert_eq!(count(&mut model, "count(/data/rep[2]/sub)"), 2.0);
    }

    #[test]
    fn test_determine_index_and_enclosing_repeat() {
        let mut model = load(ModelConfig::default());
        let first = model.get_repeat_series("/data/rep", 0)[0];
        assert_eq!(model.determine_index(first), None);
        let second = model.add_repeat("/data/rep", 0, false).unwrap();
        assert_eq!(model.determine_index(second), Some(1));

        let a = model.document().element_children(second).next().unwrap();
        assert_eq!(
            model.enclosing_repeat(a),
            Some(("/data/rep".to_string(), 1))
        );
        let meta = model
            .document()
            .descendants(model.root_element().unwrap())
            .find(|&n| model.document().name(n) == "instanceID")
            .unwrap();
        assert_eq!(model.enclosing_repeat(meta), None);
    }

    #[test]
    fn test_fake_template_is_blank() {
        let form = r#"<model><instance><data><item><v>kept</v></item><meta><instanceID>x</instanceID></meta></data></instance></model>"#;
        let mut model = FormModel::new(FormData::new(form), ModelConfig::default());
        assert!(model.init().is_empty());
        let added = model.add_repeat("/data/item", 0, false).unwrap();
        assert_eq!(model.document().string_value(added), "");
        assert_eq!(
            model.get_str(),
            "<data><item><v>kept</v></item><item><v/></item><meta><instanceID>x</instanceID></meta></data>"
        );
    }
}
