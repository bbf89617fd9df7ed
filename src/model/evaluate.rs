//! Expression evaluation against the model
//!
//! `evaluate` resolves the context node from a selector, rewrites the
//! expression for the model's layout (cached per context), then runs it
//! with the core library where possible and the dialect library otherwise.

use super::cache::{CacheKey, CachedExpression};
use super::error::FormLogicError;
use super::rewrite::{self, RewriteContext};
use super::FormModel;
use crate::dom::NodeId;
use crate::xpath::{self, odk, CompiledExpr, EvalContext, FunctionLibrary, XPathError, XPathValue};
use fancy_regex::Regex;
use std::rc::Rc;
use std::sync::LazyLock;
use tracing::{debug, trace};

/// Shape the caller wants the result in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Boolean,
    String,
    Number,
    /// First node in document order
    Node,
    /// Every node, in document order
    Nodes,
    /// Whatever the expression produced
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    Boolean(bool),
    String(String),
    Number(f64),
    Node(Option<NodeId>),
    Nodes(Vec<NodeId>),
}

impl EvalResult {
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            EvalResult::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EvalResult::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            EvalResult::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Nodes of a node or node-list result; empty otherwise
    pub fn into_nodes(self) -> Vec<NodeId> {
        match self {
            EvalResult::Nodes(nodes) => nodes,
            EvalResult::Node(node) => node.into_iter().collect(),
            _ => Vec::new(),
        }
    }
}

/// Calls the dialect library answers differently from the core one.
/// `position` and `round` are left out: a core arity error falls back to
/// the dialect anyway.
static DIALECT_CALL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    let names: Vec<String> = odk::DIALECT_FUNCTIONS
        .iter()
        .filter(|name| !matches!(**name, "position" | "round"))
        .map(|name| fancy_regex::escape(name).into_owned())
        .collect();
    Regex::new(&format!(r"(?<![\w.:-])(?:{})\s*\(", names.join("|"))).ok()
});

fn uses_dialect(expression: &str) -> bool {
    match DIALECT_CALL.as_ref() {
        Some(re) => re.is_match(expression).unwrap_or(true),
        None => true,
    }
}

/// Undo the entity escaping form authors sometimes leave in attributes
fn unescape_entities(expression: &str) -> String {
    if !expression.contains('&') {
        return expression.to_string();
    }
    expression
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
}

impl FormModel {
    /// Evaluate `expression` with the `index`-th node matched by `selector`
    /// as context (the answer root when there is no selector or no match).
    ///
    /// With `try_native`, expressions that call no dialect function run on
    /// the core library first and fall back to the dialect on failure.
    pub fn evaluate(
        &mut self,
        expression: &str,
        kind: ResultKind,
        selector: Option<&str>,
        index: Option<usize>,
        try_native: bool,
    ) -> Result<EvalResult, FormLogicError> {
        let text = unescape_entities(expression);
        let index = index.unwrap_or(0);
        let (context, cardinality) = self.resolve_context(selector, index)?;

        let parsed = xpath::parse(&text).map_err(|e| FormLogicError::expression(&text, e))?;
        let cacheable = !rewrite::calls_any(&parsed, &["indexed-repeat", "pulldata"]);
        let key = CacheKey {
            expression: text.clone(),
            selector: selector.map(str::to_string),
            index,
            cardinality,
        };

        let cached = if cacheable { self.cache.get(&key) } else { None };
        let entry = match cached {
            Some(entry) => entry,
            None => {
                let rewrite_context = RewriteContext {
                    expression: &text,
                    selector,
                    index,
                    context,
                    cardinality,
                };
                let rewritten = self.rewrite(parsed, &rewrite_context)?;
                let entry = Rc::new(CachedExpression {
                    text: rewritten.to_string(),
                    compiled: CompiledExpr::compile(&rewritten),
                });
                debug!(expression = %text, rewritten = %entry.text, "rewrote expression");
                if cacheable {
                    self.cache.insert(key, Rc::clone(&entry));
                }
                entry
            }
        };

        let library = if try_native && !uses_dialect(&entry.text) {
            FunctionLibrary::Core
        } else {
            FunctionLibrary::Dialect
        };
        let value = match self.run(&entry.compiled, context, library) {
            Err(err) if library == FunctionLibrary::Core => {
                trace!(expression = %entry.text, error = %err, "core evaluation failed, retrying with dialect");
                self.run(&entry.compiled, context, FunctionLibrary::Dialect)
            }
            other => other,
        }
        .map_err(|e| FormLogicError::expression(&entry.text, e))?;

        Ok(self.narrow(value, kind))
    }

    /// Convenience for string results with the answer root as context
    pub fn evaluate_string(&mut self, expression: &str) -> Result<String, FormLogicError> {
        match self.evaluate(expression, ResultKind::String, None, None, true)? {
            EvalResult::String(s) => Ok(s),
            _ => Ok(String::new()),
        }
    }

    pub(crate) fn evaluate_nodes(&mut self, expression: &str) -> Result<Vec<NodeId>, FormLogicError> {
        Ok(self
            .evaluate(expression, ResultKind::Nodes, None, None, true)?
            .into_nodes())
    }

    /// Context node for a selector and index, and how many nodes the
    /// selector matched
    fn resolve_context(
        &mut self,
        selector: Option<&str>,
        index: usize,
    ) -> Result<(NodeId, usize), FormLogicError> {
        let Some(selector) = selector else {
            return Ok((self.default_context(), 1));
        };
        let nodes = self.evaluate_nodes(selector)?;
        match nodes.get(index) {
            Some(&node) => Ok((node, nodes.len())),
            None => {
                debug!(selector, index, "context selector matched nothing, using root");
                Ok((self.default_context(), nodes.len()))
            }
        }
    }

    fn run(
        &self,
        compiled: &CompiledExpr,
        context: NodeId,
        library: FunctionLibrary,
    ) -> Result<XPathValue, XPathError> {
        let ctx = EvalContext::new(&self.doc, &self.namespaces, context)
            .with_library(library)
            .with_answer_root(self.root);
        xpath::evaluate_compiled(compiled, &ctx)
    }

    fn narrow(&self, value: XPathValue, kind: ResultKind) -> EvalResult {
        match kind {
            ResultKind::Boolean => EvalResult::Boolean(value.to_boolean()),
            ResultKind::String => EvalResult::String(value.to_string_in(&self.doc)),
            ResultKind::Number => EvalResult::Number(value.to_number_in(&self.doc)),
            ResultKind::Node => EvalResult::Node(value.as_nodeset().and_then(|n| n.first().copied())),
            ResultKind::Nodes => EvalResult::Nodes(match value {
                XPathValue::NodeSet(nodes) => nodes,
                _ => Vec::new(),
            }),
            ResultKind::Any => match value {
                XPathValue::NodeSet(nodes) => EvalResult::Nodes(nodes),
                XPathValue::Boolean(b) => EvalResult::Boolean(b),
                XPathValue::Number(n) => EvalResult::Number(n),
                other => EvalResult::String(other.to_string_in(&self.doc)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FormData, ModelConfig};
    use rstest::rstest;

    const FORM: &str = r#"<model xmlns:jr="http://openrosa.org/javarosa"><instance><data><a>3</a><b>4</b><when>2024-03-05</when><rep jr:template=""><x/></rep><rep><x>first</x></rep><rep><x>second</x></rep><meta><instanceID>x</instanceID></meta></data></instance><instance id="lists"><root><item><name>one</name></item></root></instance></model>"#;

    fn model() -> FormModel {
        let mut model = FormModel::new(FormData::new(FORM), ModelConfig::default());
        assert!(model.init().is_empty());
        model
    }

    #[rstest]
    #[case("/data/a + /data/b", "7")]
    #[case("concat(/data/a, 'x')", "3x")]
    #[case("if(/data/a &gt; 2, 'big', 'small')", "big")]
    #[case("format-date(/data/when, '%Y/%m')", "2024/03")]
    #[case("count(/data/rep)", "2")]
    #[case("concat(/data/rep/x, '-')", "firstsecond-")]
    #[case("instance('lists')/root/item/name", "one")]
    #[case("/model/instance[1]/data/a", "3")]
    fn test_evaluate_string(#[case] expr: &str, #[case] expected: &str) {
        let mut model = model();
        assert_eq!(model.evaluate_string(expr).unwrap(), expected);
    }

    #[test]
    fn test_selector_context() {
        let mut model = model();
        let result = model
            .evaluate("../x", ResultKind::String, Some("/data/rep/x"), Some(1), true)
            .unwrap();
        assert_eq!(result.as_str(), Some("second"));

        let result = model
            .evaluate("current()/.", ResultKind::String, Some("/data/rep/x"), Some(0), true)
            .unwrap();
        assert_eq!(result.as_str(), Some("first"));
    }

    #[test]
    fn test_result_kinds() {
        let mut model = model();
        let nodes = model
            .evaluate("/data/rep", ResultKind::Nodes, None, None, true)
            .unwrap()
            .into_nodes();
        assert_eq!(nodes.len(), 2);
        let first = model.evaluate("/data/rep", ResultKind::Node, None, None, true).unwrap();
        assert_eq!(first, EvalResult::Node(Some(nodes[0])));
        let flag = model.evaluate("/data/a = 3", ResultKind::Any, None, None, true).unwrap();
        assert_eq!(flag.as_boolean(), Some(true));
        let number = model.evaluate("/data/b", ResultKind::Number, None, None, true).unwrap();
        assert_eq!(number.as_number(), Some(4.0));
    }

    #[test]
    fn test_cache_reuses_rewrites() {
        let mut model = model();
        let first = model.evaluate_string("/data/a").unwrap();
        let entries = model.cache().len();
        let second = model.evaluate_string("/data/a").unwrap();
        assert_eq!(first, second);
        assert_eq!(model.cache().len(), entries);
        assert!(model.cache().stats().0 >= 1);
    }

    #[test]
    fn test_cache_follows_cardinality() {
        let mut model = model();
        let before = model
            .evaluate("../x", ResultKind::String, Some("/data/rep/x"), Some(1), true)
            .unwrap();
        model.add_repeat("/data/rep", 0, false);
        let after = model
            .evaluate("../x", ResultKind::String, Some("/data/rep/x"), Some(1), true)
            .unwrap();
        assert_eq!(before, after);
        assert_eq!(after.as_str(), Some("second"));
    }

    #[test]
    fn test_errors() {
        let mut model = model();
        assert!(matches!(
            model.evaluate_string("/data/a +"),
            Err(FormLogicError::Expression { .. })
        ));
        assert!(matches!(
            model.evaluate_string("instance('nope')/root"),
            Err(FormLogicError::MissingInstance { id, .. }) if id == "nope"
        ));
        assert!(matches!(
            model.evaluate_string("no-such-function()"),
            Err(FormLogicError::Expression {
                source: XPathError::UnknownFunction(_),
                ..
            })
        ));
    }

    #[test]
    fn test_concat_joins_every_node_either_way() {
        let mut model = model();
        for try_native in [true, false] {
            let joined = model
                .evaluate("concat(/data/rep/x, '-')", ResultKind::String, None, None, try_native)
                .unwrap();
            assert_eq!(joined.as_str(), Some("firstsecond-"));
        }
    }

    #[rstest]
    #[case("today()", true)]
    #[case("selected(/data/a, 'b')", true)]
    #[case("concat('a', 'b')", true)]
    #[case("round(/data/a)", false)]
    #[case("/data/today", false)]
    #[case("count(/data/rep)", false)]
    fn test_uses_dialect(#[case] expr: &str, #[case] expected: bool) {
        assert_eq!(uses_dialect(expr), expected);
    }
}
