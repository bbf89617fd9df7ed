//! XPath Engine
//!
//! XPath 1.0 over the mutable form document, with:
//! - All 13 axes, predicates applied per step
//! - The 27 core functions
//! - The form dialect: dates, geo measurements, selections, checklists
//! - Canonical printing of parsed expressions, so rewritten trees can be
//!   turned back into text

pub mod axes;
pub mod compiler;
pub mod date;
pub mod eval;
pub mod functions;
pub mod geo;
pub mod lexer;
pub mod odk;
pub mod parser;
pub mod value;

pub use compiler::{compile, CompiledExpr};
pub use eval::{evaluate, evaluate_compiled, evaluate_from_node, EvalContext, FunctionLibrary};
pub use parser::{parse, Axis, BinaryOp, Expr, NodeTest, Step};
pub use value::XPathValue;

use thiserror::Error;

/// Failure to parse or evaluate an expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum XPathError {
    #[error("XPath syntax error: {0}")]
    Syntax(String),

    #[error("unknown function: {0}()")]
    UnknownFunction(String),

    #[error("{function}() expects {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: &'static str,
        found: usize,
    },

    #[error("type error: {0}")]
    Type(String),

    #[error("invalid regular expression: {0}")]
    Regex(String),

    #[error("unbound variable: ${0}")]
    UnboundVariable(String),
}
