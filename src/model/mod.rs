//! Form Model
//!
//! The in-memory data model of one form:
//! - Load pipeline: model, external instances, namespaces, templates, record
//! - Expression rewriting and evaluation with a per-model cache
//! - Node queries, value writes, validation and removal
//! - Repeat templates, series and ordinals
//! - Record merging

pub mod cache;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod events;
pub mod merge;
pub mod nodes;
pub mod repeat;
pub mod rewrite;
pub mod types;

pub use cache::{CacheKey, CachedExpression, ExpressionCache};
pub use config::{ExternalInstance, FormData, ModelConfig};
pub use error::{FormLogicError, LoadError};
pub use evaluate::{EvalResult, ResultKind};
pub use events::{DataUpdate, EventData, ModelEvent, RemovedEvent};
pub use nodes::{NodeFilter, Nodeset, SetValueOptions};
pub use types::DataType;

use crate::dom::{ns, NamespaceTable, NodeId, SerializeOptions, XmlDocument, DOCUMENT_NODE};
use std::collections::HashMap;
use tracing::{debug, error, warn};

/// Path of the primary instance, prefixed to absolute answer paths
pub const PRIMARY_INSTANCE_PATH: &str = "/model/instance[1]";

/// One form's data model
pub struct FormModel {
    config: ModelConfig,
    data: FormData,
    pub(crate) doc: XmlDocument,
    pub(crate) namespaces: NamespaceTable,
    /// The `<model>` element
    pub(crate) model_root: Option<NodeId>,
    /// The first `<instance>` element
    pub(crate) primary: Option<NodeId>,
    /// The answer element inside the primary instance
    pub(crate) root: Option<NodeId>,
    /// Detached repeat templates by repeat path
    pub(crate) templates: HashMap<String, NodeId>,
    /// Ordinal counters of emptied series, by series marker
    pub(crate) retired_counters: HashMap<NodeId, String>,
    pub(crate) cache: ExpressionCache,
    /// Prefix bound to the engine namespace, used for ordinal attributes
    pub(crate) enk_prefix: String,
    events: Vec<ModelEvent>,
}

impl FormModel {
    pub fn new(data: FormData, config: ModelConfig) -> Self {
        FormModel {
            config,
            data,
            doc: XmlDocument::new(),
            namespaces: NamespaceTable::new(),
            model_root: None,
            primary: None,
            root: None,
            templates: HashMap::new(),
            retired_counters: HashMap::new(),
            cache: ExpressionCache::new(),
            enk_prefix: "enk".to_string(),
            events: Vec::new(),
        }
    }

    /// Build the model; returns every problem found. An empty list means the
    /// form is usable.
    pub fn init(&mut self) -> Vec<LoadError> {
        let mut errors = Vec::new();
        self.load(&mut errors);
        for err in &errors {
            error!(error = %err, "form load error");
        }
        errors
    }

    fn load(&mut self, errors: &mut Vec<LoadError>) {
        self.doc = match XmlDocument::parse(&self.data.model) {
            Ok(doc) => doc,
            Err(err) => {
                errors.push(LoadError::ModelXml(err));
                return;
            }
        };
        self.model_root = self.doc.root_element();
        let instances = self.instance_elements();
        self.primary = instances.first().copied();

        self.load_external_instances(&instances, errors);
        if !self.config.full_model {
            for &secondary in instances.iter().skip(1) {
                self.doc.detach(secondary);
            }
        }

        if self.primary.is_none() {
            errors.push(LoadError::MissingPrimaryInstance);
            return;
        }
        self.root = self.primary_child();
        if self.root.is_none() {
            errors.push(LoadError::CorruptPrimaryInstance);
            return;
        }

        self.setup_namespaces();
        self.trim_values();
        self.extract_templates();

        if let Some(record) = self.data.instance.clone() {
            if let Err(err) = self.merge_record(&record) {
                errors.push(err);
            }
        }

        if let Err(err) = self.set_instance_id_and_deprecated_id() {
            errors.push(err);
        }
    }

    /// `<instance>` children of the model element, primary first
    fn instance_elements(&self) -> Vec<NodeId> {
        let Some(model) = self.model_root else {
            return Vec::new();
        };
        self.doc
            .element_children(model)
            .filter(|&n| self.doc.local_name(n) == "instance")
            .collect()
    }

    /// Fill `<instance id=".." src="..">` elements from the supplied payloads
    fn load_external_instances(&mut self, instances: &[NodeId], errors: &mut Vec<LoadError>) {
        for &instance in instances.iter().skip(1) {
            if !self.doc.has_attribute(instance, "src") {
                continue;
            }
            let id = self.doc.attribute(instance, "id").unwrap_or("").to_string();
            let payload = self.data.external.iter().find(|e| e.id == id).map(|e| e.xml.clone());

            if let Some(xml) = payload.filter(|xml| !xml.trim().is_empty()) {
                match XmlDocument::parse(&xml) {
                    Ok(external) => {
                        if let Some(copy) = external
                            .root_element()
                            .and_then(|root| self.doc.import(&external, root))
                        {
                            for child in self.doc.children(instance).collect::<Vec<_>>() {
                                self.doc.detach(child);
                            }
                            self.doc.append_child(instance, copy);
                        }
                    }
                    Err(source) => {
                        errors.push(LoadError::ExternalInstanceXml { id, source });
                        continue;
                    }
                }
            }

            if self.doc.element_children(instance).next().is_none() {
                errors.push(LoadError::EmptyExternalInstance { id });
            }
        }
    }

    fn setup_namespaces(&mut self) {
        let mut namespaces = NamespaceTable::new();
        if let Some(model) = self.model_root {
            namespaces.declare_from_element(&self.doc, model);
        }
        if let Some(root) = self.root {
            namespaces.declare_from_element(&self.doc, root);
        }
        namespaces.require("orx", ns::OPENROSA);
        namespaces.require("jr", ns::JAVAROSA);
        self.enk_prefix = namespaces.require("enk", ns::ENKETO);
        self.namespaces = namespaces;

        if let (true, Some(root)) = (self.config.ordinals, self.root) {
            if self.doc.lookup_namespace_uri(root, Some(self.enk_prefix.as_str())) != Some(ns::ENKETO) {
                let declaration = format!("xmlns:{}", self.enk_prefix);
                self.doc.set_attribute(root, &declaration, ns::ENKETO);
            }
        }
    }

    /// Trim whitespace around leaf values of the primary instance
    fn trim_values(&mut self) {
        let Some(root) = self.root else {
            return;
        };
        let leaves: Vec<NodeId> = std::iter::once(root)
            .chain(self.doc.descendants(root))
            .filter(|&n| self.doc.is_element(n) && self.doc.is_leaf(n))
            .collect();
        for leaf in leaves {
            let value = self.doc.string_value(leaf);
            let trimmed = value.trim();
            if trimmed.len() != value.len() {
                let trimmed = trimmed.to_string();
                self.doc.set_text(leaf, &trimmed);
            }
        }
    }

    /// The answer element: first element child of the primary instance
    pub(crate) fn primary_child(&self) -> Option<NodeId> {
        self.doc.element_children(self.primary?).next()
    }

    /// Whether absolute paths are shifted into the primary instance
    pub(crate) fn has_instance_root(&self) -> bool {
        self.primary.is_some()
            && self
                .model_root
                .is_some_and(|model| self.doc.name(model) == "model")
    }

    /// Whether a secondary instance with this id exists
    pub(crate) fn instance_exists(&self, id: &str) -> bool {
        self.instance_elements()
            .into_iter()
            .any(|n| self.doc.attribute(n, "id") == Some(id))
    }

    // =========================================================================
    // Instance identity
    // =========================================================================

    /// `meta/<local>` below the answer element, whatever the prefixes
    fn meta_node(&self, local: &str) -> Option<NodeId> {
        let root = self.root?;
        self.doc.descendants(root).find(|&n| {
            self.doc.is_element(n)
                && self.doc.local_name(n) == local
                && self
                    .doc
                    .parent(n)
                    .is_some_and(|p| self.doc.local_name(p) == "meta")
        })
    }

    fn meta_value(&self, local: &str) -> Option<String> {
        self.meta_node(local).map(|n| self.doc.string_value(n))
    }

    pub fn instance_id(&self) -> Option<String> {
        self.meta_value("instanceID")
    }

    pub fn deprecated_id(&self) -> Option<String> {
        self.meta_value("deprecatedID")
    }

    /// The answer element's `version` attribute
    pub fn version(&self) -> Option<String> {
        self.root
            .and_then(|root| self.doc.attribute(root, "version"))
            .map(str::to_string)
    }

    /// Give the record an instanceID. A previously submitted record moves its
    /// old one to deprecatedID and gets a new one.
    pub fn set_instance_id_and_deprecated_id(&mut self) -> Result<(), LoadError> {
        let id_node = self.meta_node("instanceID").ok_or(LoadError::MissingInstanceId)?;
        let current = self.doc.string_value(id_node).trim().to_string();

        if self.data.submitted && !current.is_empty() {
            let deprecated = match self.meta_node("deprecatedID") {
                Some(node) => node,
                None => {
                    let name = match self.doc.prefix(id_node) {
                        Some(prefix) => format!("{}:deprecatedID", prefix),
                        None => "deprecatedID".to_string(),
                    };
                    let node = self.doc.create_element(&name);
                    if let Some(meta) = self.doc.parent(id_node) {
                        self.doc.append_child(meta, node);
                    }
                    node
                }
            };
            self.doc.set_text(deprecated, &current);
            self.doc.set_text(id_node, &new_instance_id());
            debug!(deprecated = %current, "replaced instanceID of submitted record");
        } else if current.is_empty() {
            self.doc.set_text(id_node, &new_instance_id());
        }
        Ok(())
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// The primary instance as XML, without repeat markers
    pub fn get_str(&self) -> String {
        let Some(root) = self.root else {
            warn!("serializing a model without a primary instance");
            return String::new();
        };
        let options = SerializeOptions {
            skip_comments_starting_with: Some(repeat::MARKER_PREFIX),
            collapse_namespace_declarations: true,
            ..Default::default()
        };
        self.doc.to_xml_with(root, &options)
    }

    pub fn document(&self) -> &XmlDocument {
        &self.doc
    }

    pub fn root_element(&self) -> Option<NodeId> {
        self.root
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn cache(&self) -> &ExpressionCache {
        &self.cache
    }

    /// Template cached for a repeat path
    pub fn template(&self, path: &str) -> Option<NodeId> {
        self.templates.get(path).copied()
    }

    pub(crate) fn push_event(&mut self, event: ModelEvent) {
        self.events.push(event);
    }

    /// Take every queued notification
    pub fn drain_events(&mut self) -> Vec<ModelEvent> {
        std::mem::take(&mut self.events)
    }

    /// Name path of an element below the primary instance, e.g. `/data/rep/x`
    pub fn node_path(&self, node: NodeId) -> String {
        repeat::element_path(&self.doc, node, self.primary, false)
    }

    /// Node used as context when no selector is given
    pub(crate) fn default_context(&self) -> NodeId {
        self.root
            .or_else(|| self.doc.root_element())
            .unwrap_or(DOCUMENT_NODE)
    }
}

fn new_instance_id() -> String {
    format!("uuid:{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM: &str = r#"<model xmlns:jr="http://openrosa.org/javarosa"><instance><data id="f" version="7"><name> Ann </name><rep jr:template=""><a>default</a></rep><meta><instanceID/></meta></data></instance><instance id="cities"><root><item><name>a</name></item></root></instance></model>"#;

    fn load(data: FormData, config: ModelConfig) -> FormModel {
        let mut model = FormModel::new(data, config);
        let errors = model.init();
        assert!(errors.is_empty(), "{:?}", errors);
        model
    }

    #[test]
    fn test_load_trims_and_extracts() {
        let model = load(FormData::new(FORM), ModelConfig::default());
        let out = model.get_str();
        assert!(out.contains("<name>Ann</name>"), "{}", out);
        assert!(!out.contains("<rep"), "{}", out);
        assert!(!out.contains("repeat:"), "{}", out);
        assert!(model.template("/data/rep").is_some());
        assert_eq!(model.version().as_deref(), Some("7"));
    }

    #[test]
    fn test_instance_id_is_minted() {
        let model = load(FormData::new(FORM), ModelConfig::default());
        let id = model.instance_id().unwrap();
        assert!(id.starts_with("uuid:"));
        assert_eq!(id.len(), 41);
        assert!(model.deprecated_id().is_none());
    }

    #[test]
    fn test_submitted_record_gets_deprecated_id() {
        let record = r#"<data id="f"><name>Bo</name><meta><instanceID>uuid:old</instanceID></meta></data>"#;
        let data = FormData::new(FORM).with_instance(record).submitted(true);
        let model = load(data, ModelConfig::default());
        assert_eq!(model.deprecated_id().as_deref(), Some("uuid:old"));
        assert_ne!(model.instance_id().as_deref(), Some("uuid:old"));
    }

    #[test]
    fn test_load_errors() {
        let mut model = FormModel::new(FormData::new("<model><instance>"), ModelConfig::default());
        assert!(matches!(model.init().as_slice(), [LoadError::ModelXml(_)]));

        let mut model = FormModel::new(
            FormData::new("<model><instance><data/></instance></model>"),
            ModelConfig::default(),
        );
        assert_eq!(model.init(), vec![LoadError::MissingInstanceId]);

        let mut model = FormModel::new(FormData::new("<model><instance/></model>"), ModelConfig::default());
        assert_eq!(model.init(), vec![LoadError::CorruptPrimaryInstance]);
    }

    #[test]
    fn test_external_instances() {
        let form = r#"<model><instance><data><meta><instanceID>x</instanceID></meta></data></instance><instance id="ext" src="jr://file/ext.xml"/><instance id="empty" src="jr://file/empty.xml"/></model>"#;
        let data = FormData::new(form)
            .with_external(ExternalInstance::new("ext", "<root><item>1</item></root>"));
        let mut model = FormModel::new(data, ModelConfig::default());
        let errors = model.init();
        assert_eq!(
            errors,
            vec![LoadError::EmptyExternalInstance {
                id: "empty".to_string()
            }]
        );
        assert!(model.instance_exists("ext"));
        let item = model
            .evaluate("instance('ext')/root/item", ResultKind::String, None, None, false)
            .unwrap();
        assert_eq!(item, EvalResult::String("1".to_string()));
    }

    #[test]
    fn test_primary_only_model_drops_secondary_instances() {
        let config = ModelConfig {
            full_model: false,
            ..Default::default()
        };
        let model = load(FormData::new(FORM), config);
        assert!(!model.instance_exists("cities"));
    }
}
