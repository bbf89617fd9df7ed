//! Construction input and options for a form model

/// Behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig {
    /// Keep `ordinal` / `last-used-ordinal` attributes on repeat instances
    pub ordinals: bool,
    /// Validate on every value write instead of only on demand
    pub validate_continuously: bool,
    /// Keep secondary instances in the document
    pub full_model: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            ordinals: false,
            validate_continuously: false,
            full_model: true,
        }
    }
}

/// A secondary instance supplied from outside the form definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalInstance {
    pub id: String,
    pub xml: String,
}

impl ExternalInstance {
    pub fn new(id: impl Into<String>, xml: impl Into<String>) -> Self {
        ExternalInstance {
            id: id.into(),
            xml: xml.into(),
        }
    }
}

/// Everything a form model is built from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    /// The `<model>` XML of the form
    pub model: String,
    /// A prior submission to load into the primary instance
    pub instance: Option<String>,
    pub external: Vec<ExternalInstance>,
    /// The record was submitted before; it gets a fresh instanceID and keeps
    /// the old one as deprecatedID
    pub submitted: bool,
}

impl FormData {
    pub fn new(model: impl Into<String>) -> Self {
        FormData {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn with_external(mut self, external: ExternalInstance) -> Self {
        self.external.push(external);
        self
    }

    pub fn submitted(mut self, submitted: bool) -> Self {
        self.submitted = submitted;
        self
    }
}
