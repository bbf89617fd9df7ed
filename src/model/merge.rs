//! Loading a saved record into the primary instance
//!
//! The record is cleaned, every repeat instance it has that the model lacks
//! is created first, defaults the record deliberately left empty are
//! cleared, and then the record is merged in place.

use super::error::LoadError;
use super::repeat::{blank_leaves, clear_text, element_path, has_same_name_siblings, same_name_position};
use super::FormModel;
use crate::dom::{merge_into, NodeId, NodeKind, XmlDocument, DOCUMENT_NODE};
use tracing::{debug, warn};

/// Drop default namespace declarations, comments and template nodes
fn clean_record(record: &mut XmlDocument) {
    let nodes: Vec<NodeId> = record.descendants(DOCUMENT_NODE).collect();
    for node in nodes {
        match record.kind(node) {
            Some(NodeKind::Comment) => record.detach(node),
            Some(NodeKind::Element) => {
                record.remove_attribute(node, "xmlns");
                let is_template = record
                    .attributes(node)
                    .any(|(name, _)| name.rsplit(':').next() == Some("template"));
                if is_template {
                    record.detach(node);
                }
            }
            _ => {}
        }
    }
}

fn record_elements(record: &XmlDocument, root: NodeId) -> Vec<NodeId> {
    std::iter::once(root)
        .chain(record.descendants(root))
        .filter(|&n| record.is_element(n) && record.is_attached(n))
        .collect()
}

impl FormModel {
    /// Merge a saved record into the primary instance
    pub fn merge_record(&mut self, record: &str) -> Result<(), LoadError> {
        if record.trim().is_empty() {
            return Ok(());
        }
        if self.primary.is_none() {
            return Err(LoadError::MissingPrimaryInstance);
        }
        let root = self.primary_child().ok_or(LoadError::CorruptPrimaryInstance)?;

        let mut record = XmlDocument::parse(record).map_err(LoadError::RecordXml)?;
        clean_record(&mut record);
        let Some(record_root) = record.root_element() else {
            return Ok(());
        };

        self.expand_repeats(&record, record_root);
        self.suppress_defaults(&record, record_root);

        merge_into(&mut self.doc, root, &record, record_root).map_err(LoadError::Merge)?;
        self.root = self.primary_child();
        debug!("merged record into primary instance");
        Ok(())
    }

    fn is_record_repeat(&self, record: &XmlDocument, node: NodeId) -> bool {
        let path = element_path(record, node, None, false);
        self.templates.contains_key(&path) || has_same_name_siblings(record, node)
    }

    /// Series a record repeat instance belongs to: the position of its
    /// closest repeat ancestor
    fn record_series_index(&self, record: &XmlDocument, node: NodeId) -> usize {
        record
            .ancestors_or_self(node)
            .skip(1)
            .take_while(|&n| record.is_element(n))
            .find(|&n| self.is_record_repeat(record, n))
            .map_or(0, |n| same_name_position(record, n) - 1)
    }

    /// Create the repeat instances the record has and the model does not
    fn expand_repeats(&mut self, record: &XmlDocument, record_root: NodeId) {
        for node in record_elements(record, record_root) {
            if node == record_root || !self.is_record_repeat(record, node) {
                continue;
            }
            let positioned = element_path(record, node, None, true);
            match self.evaluate_nodes(&positioned) {
                Ok(existing) if !existing.is_empty() => continue,
                Ok(_) => {}
                Err(err) => {
                    warn!(path = %positioned, error = %err, "could not look up record repeat");
                    continue;
                }
            }
            let path = element_path(record, node, None, false);
            let series_index = self.record_series_index(record, node);
            if self.add_repeat(&path, series_index, true).is_none() {
                warn!(path = %positioned, "could not create repeat instance for record");
            }
        }
    }

    /// Clear model defaults where the record has an empty leaf
    fn suppress_defaults(&mut self, record: &XmlDocument, record_root: NodeId) {
        for node in record_elements(record, record_root) {
            if !record.is_leaf(node) || !record.string_value(node).trim().is_empty() {
                continue;
            }
            let positioned = element_path(record, node, None, true);
            let targets = match self.evaluate_nodes(&positioned) {
                Ok(targets) => targets,
                Err(err) => {
                    warn!(path = %positioned, error = %err, "could not look up record leaf");
                    continue;
                }
            };
            if let Some(&target) = targets.first() {
                if self.doc.is_leaf(target) {
                    clear_text(&mut self.doc, target);
                } else {
                    blank_leaves(&mut self.doc, target);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FormData, ModelConfig};

    const FORM: &str = r#"<model xmlns:jr="http://openrosa.org/javarosa"><instance><data id="f"><name>default</name><age>1</age><rep jr:template=""><x>dx</x><sub jr:template=""><y>dy</y></sub></rep><meta><instanceID/></meta></data></instance></model>"#;

    fn load(record: &str) -> FormModel {
        let data = FormData::new(FORM).with_instance(record);
        let mut model = FormModel::new(data, ModelConfig::default());
        let errors = model.init();
        assert!(errors.is_empty(), "{:?}", errors);
        model
    }

    fn eval(model: &mut FormModel, expr: &str) -> String {
        model.evaluate_string(expr).unwrap()
    }

    #[test]
    fn test_clean_record() {
        let mut record = XmlDocument::parse(
            r#"<data xmlns="http://x"><!--c--><rep jr:template="" xmlns:jr="http://openrosa.org/javarosa"/><a/></data>"#,
        )
        .unwrap();
        clean_record(&mut record);
        let root = record.root_element().unwrap();
        assert_eq!(record.to_xml(root), "<data><a/></data>");
    }

    #[test]
    fn test_record_repeat_cardinality() {
        let mut model = load(
            r#"<data id="f"><name>Ann</name><age>40</age><rep><x>a</x></rep><rep><x>b</x><sub><y>b1</y></sub><sub><y>b2</y></sub></rep><rep><x>c</x></rep><meta><instanceID>uuid:1</instanceID></meta></data>"#,
        );
        assert_eq!(eval(&mut model, "count(/data/rep)"), "3");
        assert_eq!(eval(&mut model, "count(/data/rep[2]/sub)"), "2");
        assert_eq!(eval(&mut model, "count(/data/rep[1]/sub)"), "0");
        assert_eq!(eval(&mut model, "/data/rep[3]/x"), "c");
        assert_eq!(eval(&mut model, "/data/rep[2]/sub[2]/y"), "b2");
        assert_eq!(eval(&mut model, "/data/name"), "Ann");
        assert_eq!(model.instance_id().as_deref(), Some("uuid:1"));
    }

    #[test]
    fn test_empty_record_leaf_clears_default() {
        let mut model = load(r#"<data id="f"><name/><meta><instanceID>uuid:1</instanceID></meta></data>"#);
        assert_eq!(eval(&mut model, "/data/name"), "");
        assert_eq!(eval(&mut model, "/data/age"), "1");
    }

    #[test]
    fn test_created_instances_take_no_template_defaults() {
        let mut model = load(r#"<data id="f"><rep><sub/></rep><meta><instanceID>uuid:1</instanceID></meta></data>"#);
        assert_eq!(eval(&mut model, "count(/data/rep)"), "1");
        assert_eq!(eval(&mut model, "/data/rep/x"), "");
        assert_eq!(eval(&mut model, "/data/rep/sub/y"), "");
        assert!(model.drain_events().is_empty());
    }

    #[test]
    fn test_merge_errors() {
        let data = FormData::new(FORM).with_instance("<other/>");
        let mut model = FormModel::new(data, ModelConfig::default());
        let errors = model.init();
        assert!(matches!(errors.as_slice(), [LoadError::Merge(_)]), "{:?}", errors);

        let data = FormData::new(FORM).with_instance("<data>");
        let mut model = FormModel::new(data, ModelConfig::default());
        assert!(matches!(model.init().as_slice(), [LoadError::RecordXml(_)]));
    }
}
