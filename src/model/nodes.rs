//! Node queries, value writes, validation and removal
//!
//! A [`Nodeset`] is a selector plus an optional index into its matches,
//! borrowed from the model for the duration of one operation.

use super::error::FormLogicError;
use super::evaluate::{EvalResult, ResultKind};
use super::events::{DataUpdate, EventData, ModelEvent, RemovedEvent};
use super::types::DataType;
use super::FormModel;
use crate::dom::{NodeId, NodeKind};
use tracing::{debug, warn};

/// Narrowing applied to the nodes a selector matched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeFilter {
    /// Keep only elements without element children
    pub only_leaf: bool,
    /// Keep only leaves with a non-blank value
    pub no_empty: bool,
}

/// Options of [`Nodeset::set_val`]
#[derive(Debug, Clone, Default)]
pub struct SetValueOptions<'o> {
    pub constraint: Option<&'o str>,
    pub data_type: DataType,
    pub required: Option<&'o str>,
    /// Skip continuous validation for this write
    pub skip_validation: bool,
    pub extra: EventData,
}

pub struct Nodeset<'m> {
    model: &'m mut FormModel,
    selector: Option<String>,
    index: Option<usize>,
    filter: NodeFilter,
}

impl FormModel {
    /// The nodes matched by `selector` (the answer root when `None`), or
    /// only the `index`-th of them
    pub fn node(&mut self, selector: Option<&str>, index: Option<usize>, filter: NodeFilter) -> Nodeset<'_> {
        Nodeset {
            model: self,
            selector: selector.map(str::to_string),
            index,
            filter,
        }
    }
}

impl Nodeset<'_> {
    pub fn get_elements(&mut self) -> Result<Vec<NodeId>, FormLogicError> {
        let nodes = match &self.selector {
            Some(selector) => self.model.evaluate_nodes(selector)?,
            None => self.model.root.into_iter().collect(),
        };
        let nodes = match self.index {
            Some(index) => nodes.get(index).copied().into_iter().collect(),
            None => nodes,
        };
        let doc = &self.model.doc;
        Ok(nodes
            .into_iter()
            .filter(|&n| !self.filter.only_leaf || doc.is_leaf(n))
            .filter(|&n| {
                !self.filter.no_empty || (doc.is_leaf(n) && !doc.string_value(n).trim().is_empty())
            })
            .collect())
    }

    /// Value of the first matched node
    pub fn get_val(&mut self) -> Result<Option<String>, FormLogicError> {
        let nodes = self.get_elements()?;
        Ok(nodes.first().map(|&n| self.model.doc.string_value(n)))
    }

    fn single_node(&mut self, operation: &str) -> Result<Option<NodeId>, FormLogicError> {
        let nodes = self.get_elements()?;
        match nodes.as_slice() {
            [node] => Ok(Some(*node)),
            [] => {
                warn!(selector = ?self.selector, index = ?self.index, "{}: no node matched", operation);
                Ok(None)
            }
            _ => {
                warn!(selector = ?self.selector, count = nodes.len(), "{}: more than one node matched", operation);
                Ok(None)
            }
        }
    }

    /// Write a value to the single matched node. Returns the queued
    /// notification, or `None` when nothing was written.
    pub fn set_val(
        &mut self,
        value: &str,
        options: SetValueOptions<'_>,
    ) -> Result<Option<DataUpdate>, FormLogicError> {
        let Some(node) = self.single_node("set_val")? else {
            return Ok(None);
        };
        let value = options.data_type.convert(value);
        let current = self.model.doc.string_value(node);
        if value.trim() == current.trim() {
            debug!(selector = ?self.selector, "value unchanged");
            return Ok(None);
        }

        self.model.doc.set_text(node, &value);
        if options.data_type == DataType::Binary {
            if value.is_empty() {
                self.model.doc.remove_attribute(node, "type");
            } else {
                self.model.doc.set_attribute(node, "type", "file");
            }
        }

        let validity = if self.model.config().validate_continuously && !options.skip_validation {
            let valid = self.validate_constraint_and_type(options.constraint, options.data_type)?
                && self.validate_required(options.required)?;
            Some(valid)
        } else {
            None
        };

        let (repeat_path, repeat_index) = match self.model.enclosing_repeat(node) {
            Some((path, index)) => (Some(path), Some(index)),
            None => (None, None),
        };
        let update = DataUpdate {
            nodes: Some(vec![self.model.doc.name(node).to_string()]),
            repeat_path,
            repeat_index,
            removed: false,
            validity,
            extra: options.extra,
        };
        self.model.push_event(ModelEvent::DataUpdate(update.clone()));
        Ok(Some(update))
    }

    /// Whether the value passes its datatype check and constraint. An empty
    /// value always passes.
    pub fn validate_constraint_and_type(
        &mut self,
        constraint: Option<&str>,
        data_type: DataType,
    ) -> Result<bool, FormLogicError> {
        let value = self.get_val()?.unwrap_or_default();
        if value.is_empty() {
            return Ok(true);
        }
        if !data_type.validate(&value) {
            return Ok(false);
        }
        match constraint {
            Some(constraint) if !constraint.trim().is_empty() => self.evaluate_boolean(constraint),
            _ => Ok(true),
        }
    }

    /// Whether a required value is present. Without a required expression,
    /// or with a value, this is always true.
    pub fn validate_required(&mut self, required: Option<&str>) -> Result<bool, FormLogicError> {
        let value = self.get_val()?.unwrap_or_default();
        match required {
            Some(required) if value.is_empty() && !required.trim().is_empty() => {
                Ok(!self.evaluate_boolean(required)?)
            }
            _ => Ok(true),
        }
    }

    fn evaluate_boolean(&mut self, expression: &str) -> Result<bool, FormLogicError> {
        let result = self.model.evaluate(
            expression,
            ResultKind::Boolean,
            self.selector.as_deref(),
            self.index,
            true,
        )?;
        Ok(matches!(result, EvalResult::Boolean(true)))
    }

    /// Remove the single matched repeat instance. Queues one update for the
    /// removed node, one per instance that moved up, then a removal event.
    pub fn remove(&mut self, extra: EventData) -> Result<bool, FormLogicError> {
        let Some(node) = self.single_node("remove")? else {
            return Ok(false);
        };
        let model = &mut *self.model;
        let path = model.node_path(node);
        if model.ensure_template(&path).is_none() {
            warn!(path = %path, "removing a node that has no repeat template");
        }
        let index = model.determine_index(node).unwrap_or(0);
        let name = model.doc.name(node).to_string();

        let mut followers = 0;
        let mut current = model.doc.next_sibling(node);
        while let Some(sibling) = current {
            match model.doc.kind(sibling) {
                Some(NodeKind::Element) if model.doc.name(sibling) == name => followers += 1,
                Some(NodeKind::Element) => break,
                _ => {}
            }
            current = model.doc.next_sibling(sibling);
        }

        model.hand_over_counter(node);
        model.doc.detach(node);
        debug!(path = %path, index, "removed repeat instance");

        model.push_event(ModelEvent::DataUpdate(DataUpdate {
            nodes: Some(vec![name]),
            repeat_path: Some(path.clone()),
            repeat_index: Some(index),
            removed: true,
            extra: extra.clone(),
            ..Default::default()
        }));
        for i in 0..followers {
            model.push_event(ModelEvent::DataUpdate(DataUpdate {
                repeat_path: Some(path.clone()),
                repeat_index: Some(index + i),
                ..Default::default()
            }));
        }
        model.push_event(ModelEvent::Removed(RemovedEvent {
            repeat_path: Some(path),
            repeat_index: Some(index),
            extra,
        }));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FormData, ModelConfig};
    use rstest::rstest;

    const FORM: &str = r#"<model xmlns:jr="http://openrosa.org/javarosa"><instance><data><age>30</age><note/><pic/><rep jr:template=""><x/></rep><rep><x>1</x></rep><rep><x>2</x></rep><rep><x>3</x></rep><meta><instanceID>x</instanceID></meta></data></instance></model>"#;

    fn model(config: ModelConfig) -> FormModel {
        let mut model = FormModel::new(FormData::new(FORM), config);
        assert!(model.init().is_empty());
        model
    }

    #[test]
    fn test_get_elements_and_filters() {
        let mut model = model(ModelConfig::default());
        assert_eq!(model.node(Some("/data/rep/x"), None, NodeFilter::default()).get_elements().unwrap().len(), 3);
        assert_eq!(model.node(Some("/data/rep/x"), Some(1), NodeFilter::default()).get_val().unwrap().as_deref(), Some("2"));
        assert!(model.node(Some("/data/rep/x"), Some(9), NodeFilter::default()).get_elements().unwrap().is_empty());

        let leaves = NodeFilter {
            only_leaf: true,
            ..Default::default()
        };
        assert!(model.node(Some("/data/rep"), None, leaves).get_elements().unwrap().is_empty());

        let filled = NodeFilter {
            no_empty: true,
            ..Default::default()
        };
        let nodes = model.node(Some("/data/*"), None, filled).get_elements().unwrap();
        assert_eq!(nodes.len(), 1);

        let root = model.node(None, None, NodeFilter::default()).get_elements().unwrap();
        assert_eq!(root, model.root_element().into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_set_val() {
        let mut model = model(ModelConfig::default());
        let update = model
            .node(Some("/data/rep/x"), Some(2), NodeFilter::default())
            .set_val("9", SetValueOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(update.nodes, Some(vec!["x".to_string()]));
        assert_eq!(update.repeat_path.as_deref(), Some("/data/rep"));
        assert_eq!(update.repeat_index, Some(2));
        assert_eq!(update.validity, None);
        assert_eq!(model.evaluate_string("/data/rep[3]/x").unwrap(), "9");
        assert_eq!(model.drain_events().len(), 1);
    }

    #[rstest]
    #[case("30")]
    #[case(" 30 ")]
    fn test_set_val_unchanged_is_a_noop(#[case] value: &str) {
        let mut model = model(ModelConfig::default());
        let result = model
            .node(Some("/data/age"), None, NodeFilter::default())
            .set_val(value, SetValueOptions::default())
            .unwrap();
        assert!(result.is_none());
        assert!(model.drain_events().is_empty());
    }

    #[test]
    fn test_set_val_needs_exactly_one_node() {
        let mut model = model(ModelConfig::default());
        let many = model
            .node(Some("/data/rep/x"), None, NodeFilter::default())
            .set_val("1", SetValueOptions::default())
            .unwrap();
        assert!(many.is_none());
        let none = model
            .node(Some("/data/missing"), None, NodeFilter::default())
            .set_val("1", SetValueOptions::default())
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_set_val_converts_and_marks_files() {
        let mut model = model(ModelConfig::default());
        let options = SetValueOptions {
            data_type: DataType::Int,
            ..Default::default()
        };
        model.node(Some("/data/age"), None, NodeFilter::default()).set_val("31.6", options).unwrap();
        assert_eq!(model.evaluate_string("/data/age").unwrap(), "32");

        let options = SetValueOptions {
            data_type: DataType::Binary,
            ..Default::default()
        };
        model.node(Some("/data/pic"), None, NodeFilter::default()).set_val("a.jpg", options).unwrap();
        assert!(model.get_str().contains(r#"<pic type="file">a.jpg</pic>"#));
    }

    #[test]
    fn test_continuous_validation() {
        let config = ModelConfig {
            validate_continuously: true,
            ..Default::default()
        };
        let mut model = model(config);
        let options = SetValueOptions {
            constraint: Some(". > 18"),
            data_type: DataType::Int,
            ..Default::default()
        };
        let update = model.node(Some("/data/age"), None, NodeFilter::default()).set_val("12", options).unwrap().unwrap();
        assert_eq!(update.validity, Some(false));

        let options = SetValueOptions {
            constraint: Some(". > 18"),
            skip_validation: true,
            ..Default::default()
        };
        let update = model.node(Some("/data/age"), None, NodeFilter::default()).set_val("13", options).unwrap().unwrap();
        assert_eq!(update.validity, None);
    }

    #[rstest]
    #[case("/data/age", Some(". > 18"), DataType::Int, true)]
    #[case("/data/age", Some(". > 40"), DataType::Int, false)]
    #[case("/data/age", None, DataType::Date, false)]
    #[case("/data/note", Some("false()"), DataType::String, true)]
    fn test_validate_constraint_and_type(
        #[case] selector: &str,
        #[case] constraint: Option<&str>,
        #[case] data_type: DataType,
        #[case] expected: bool,
    ) {
        let mut model = model(ModelConfig::default());
        let valid = model
            .node(Some(selector), None, NodeFilter::default())
            .validate_constraint_and_type(constraint, data_type)
            .unwrap();
        assert_eq!(valid, expected);
    }

    #[rstest]
    #[case("/data/note", Some("true()"), false)]
    #[case("/data/note", Some("false()"), true)]
    #[case("/data/note", None, true)]
    #[case("/data/age", Some("true()"), true)]
    fn test_validate_required(#[case] selector: &str, #[case] required: Option<&str>, #[case] expected: bool) {
        let mut model = model(ModelConfig::default());
        let valid = model
            .node(Some(selector), None, NodeFilter::default())
            .validate_required(required)
            .unwrap();
        assert_eq!(valid, expected);
    }

    #[test]
    fn test_remove_emits_updates_for_followers() {
        let mut model = model(ModelConfig::default());
        let mut extra = EventData::new();
        extra.insert("source".to_string(), "user".to_string());
        assert!(model.node(Some("/data/rep"), Some(0), NodeFilter::default()).remove(extra.clone()).unwrap());

        let events = model.drain_events();
        assert_eq!(events.len(), 4);
        let first = events[0].as_data_update().unwrap();
        assert!(first.removed);
        assert_eq!(first.repeat_index, Some(0));
        assert_eq!(first.extra, extra);
        let shifted: Vec<Option<usize>> = events[1..3]
            .iter()
            .filter_map(|e| e.as_data_update())
            .map(|u| u.repeat_index)
            .collect();
        assert_eq!(shifted, vec![Some(0), Some(1)]);
        assert!(matches!(&events[3], ModelEvent::Removed(r) if r.repeat_path.as_deref() == Some("/data/rep")));
        assert_eq!(model.evaluate_string("count(/data/rep)").unwrap(), "2");
        assert_eq!(model.evaluate_string("/data/rep[1]/x").unwrap(), "2");
    }

    #[test]
    fn test_remove_last_instance_keeps_a_template() {
        let form = r#"<model><instance><data><item><v>1</v></item><meta><instanceID>x</instanceID></meta></data></instance></model>"#;
        let mut model = FormModel::new(FormData::new(form), ModelConfig::default());
        assert!(model.init().is_empty());
        assert!(model.node(Some("/data/item"), None, NodeFilter::default()).remove(EventData::new()).unwrap());
        assert_eq!(model.evaluate_string("count(/data/item)").unwrap(), "0");
        assert!(model.template("/data/item").is_some());
        assert!(model.add_repeat("/data/item", 0, false).is_some());
        assert_eq!(model.evaluate_string("count(/data/item)").unwrap(), "1");
    }
}
