//! xform-model - In-memory XForm data model
//!
//! Layers:
//! A: Slice reader and entity handling (reader, core)
//! B: Mutable arena DOM with namespaces, serialization and merging (dom)
//! C: XPath 1.0 engine with the form function dialect (xpath)
//! D: Form model: rewriting, evaluation cache, repeats, records (model)
//!
//! ```no_run
//! use xform_model::{FormData, FormModel, ModelConfig, ResultKind};
//!
//! let form = r#"<model><instance><data><a>1</a><meta><instanceID/></meta></data></instance></model>"#;
//! let mut model = FormModel::new(FormData::new(form), ModelConfig::default());
//! assert!(model.init().is_empty());
//! let value = model.evaluate("/data/a + 1", ResultKind::Number, None, None, true);
//! ```

pub mod core;
pub mod dom;
pub mod model;
pub mod reader;
pub mod xpath;

pub use dom::{NodeId, XmlDocument};
pub use model::{
    DataType, DataUpdate, EvalResult, EventData, ExternalInstance, FormData, FormLogicError,
    FormModel, LoadError, ModelConfig, ModelEvent, NodeFilter, Nodeset, RemovedEvent, ResultKind,
    SetValueOptions,
};
pub use xpath::{XPathError, XPathValue};
