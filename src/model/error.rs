//! Form model errors
//!
//! Logic errors are returned from evaluation and point at a defective form
//! definition. Load errors are collected while a model initializes so that
//! every problem of one load can be reported together.

use crate::dom::{DomError, MergeError};
use crate::xpath::XPathError;
use thiserror::Error;

/// A defect in the form's expressions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormLogicError {
    #[error("indexed-repeat requires an odd number of arguments, 3 to 11: {call}")]
    IndexedRepeatArity { call: String },

    #[error("pulldata requires exactly 4 arguments: {call}")]
    PulldataArity { call: String },

    #[error("instance \"{id}\" does not exist in the model (in {expression})")]
    MissingInstance { id: String, expression: String },

    #[error("could not evaluate {expression}: {source}")]
    Expression {
        expression: String,
        #[source]
        source: XPathError,
    },
}

impl FormLogicError {
    pub(crate) fn expression(expression: &str, source: XPathError) -> Self {
        FormLogicError::Expression {
            expression: expression.to_string(),
            source,
        }
    }
}

/// A condition that makes a form unusable, reported by `FormModel::init`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("the form model is not well-formed XML: {0}")]
    ModelXml(#[source] DomError),

    #[error("the record is not well-formed XML: {0}")]
    RecordXml(#[source] DomError),

    #[error("external instance \"{id}\" is not well-formed XML: {source}")]
    ExternalInstanceXml {
        id: String,
        #[source]
        source: DomError,
    },

    #[error("external instance \"{id}\" is empty")]
    EmptyExternalInstance { id: String },

    #[error("the form has no primary instance")]
    MissingPrimaryInstance,

    #[error("the primary instance has no child element")]
    CorruptPrimaryInstance,

    #[error("the form has no meta/instanceID node")]
    MissingInstanceId,

    #[error("the record could not be merged: {0}")]
    Merge(#[source] MergeError),
}
