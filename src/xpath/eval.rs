//! XPath Evaluation Engine
//!
//! Evaluates compiled XPath expressions against an XML document.

use super::axes::{matches_node_test, navigate};
use super::compiler::{CompiledExpr, CompiledNodeTest, Op};
use super::date;
use super::parser::{Axis, BinaryOp};
use super::value::{parse_number, XPathValue};
use super::{functions, odk, XPathError};
use crate::dom::{DocumentAccess, NamespaceTable, NodeId};
use chrono::{DateTime, FixedOffset};

/// Which function library calls resolve against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FunctionLibrary {
    /// XPath 1.0 core functions only
    #[default]
    Core,
    /// Core functions plus the form dialect, which overrides some of them
    Dialect,
}

/// Evaluation context - generic over document type
pub struct EvalContext<'a, D: DocumentAccess> {
    pub doc: &'a D,
    pub context_node: NodeId,
    pub context_position: usize,
    pub context_size: usize,
    pub namespaces: &'a NamespaceTable,
    pub library: FunctionLibrary,
    /// Primary answer element, read by `version()`
    pub answer_root: Option<NodeId>,
}

impl<'a, D: DocumentAccess> EvalContext<'a, D> {
    pub fn new(doc: &'a D, namespaces: &'a NamespaceTable, context_node: NodeId) -> Self {
        EvalContext {
            doc,
            context_node,
            context_position: 1,
            context_size: 1,
            namespaces,
            library: FunctionLibrary::Core,
            answer_root: doc.root_element_id(),
        }
    }

    pub fn with_library(mut self, library: FunctionLibrary) -> Self {
        self.library = library;
        self
    }

    pub fn with_answer_root(mut self, answer_root: Option<NodeId>) -> Self {
        self.answer_root = answer_root;
        self
    }

    /// Same document and settings, different context node
    pub fn at(&self, node: NodeId, position: usize, size: usize) -> Self {
        EvalContext {
            context_node: node,
            context_position: position,
            context_size: size,
            ..*self
        }
    }
}

/// Evaluate an XPath expression against any document type
#[must_use = "XPath evaluation result should be used"]
pub fn evaluate<D: DocumentAccess>(doc: &D, xpath: &str) -> Result<XPathValue, XPathError> {
    let context_node = doc.root_element_id().unwrap_or(doc.document_node_id());
    evaluate_from_node(doc, context_node, xpath)
}

/// Evaluate an XPath expression from a specific context node
#[must_use = "XPath evaluation result should be used"]
pub fn evaluate_from_node<D: DocumentAccess>(
    doc: &D,
    context_node: NodeId,
    xpath: &str,
) -> Result<XPathValue, XPathError> {
    let compiled = super::compiler::compile(xpath)?;
    let namespaces = NamespaceTable::new();
    let context = EvalContext::new(doc, &namespaces, context_node);
    evaluate_compiled(&compiled, &context)
}

fn pop_nodeset(stack: &mut Vec<XPathValue>, what: &str) -> Result<Vec<NodeId>, XPathError> {
    match stack.pop() {
        Some(XPathValue::NodeSet(nodes)) => Ok(nodes),
        Some(_) => Err(XPathError::Type(format!("{} requires a node-set", what))),
        None => Ok(Vec::new()),
    }
}

/// Evaluate a compiled expression
pub fn evaluate_compiled<D: DocumentAccess>(
    expr: &CompiledExpr,
    ctx: &EvalContext<'_, D>,
) -> Result<XPathValue, XPathError> {
    let mut stack: Vec<XPathValue> = Vec::new();

    for op in &expr.ops {
        match op {
            Op::Root => {
                // Root is the document node (for XPath absolute paths like /root)
                stack.push(XPathValue::single_node(ctx.doc.document_node_id()));
            }

            Op::Context => {
                stack.push(XPathValue::single_node(ctx.context_node));
            }

            Op::Step(Axis::Attribute, node_test, _) => {
                let nodes = pop_nodeset(&mut stack, "location step")?;
                stack.push(attribute_values(ctx, &nodes, node_test));
            }

            Op::Step(axis, node_test, predicates) => {
                let nodes = pop_nodeset(&mut stack, "location step")?;
                let mut result = Vec::with_capacity(nodes.len());
                for node in nodes {
                    let mut candidates: Vec<NodeId> = navigate(ctx.doc, node, *axis)
                        .into_iter()
                        .filter(|&c| matches_node_test(ctx.doc, ctx.namespaces, c, node_test))
                        .collect();
                    for pred in predicates {
                        candidates = apply_predicate(pred, candidates, ctx)?;
                    }
                    result.extend(candidates);
                }
                ctx.doc.sort_document_order(&mut result);
                stack.push(XPathValue::NodeSet(result));
            }

            Op::Predicate(pred_expr) => {
                let nodes = pop_nodeset(&mut stack, "predicate")?;
                let filtered = apply_predicate(pred_expr, nodes, ctx)?;
                stack.push(XPathValue::NodeSet(filtered));
            }

            Op::Union => {
                let right = pop_nodeset(&mut stack, "union")?;
                let mut result = pop_nodeset(&mut stack, "union")?;
                result.extend(right);
                ctx.doc.sort_document_order(&mut result);
                stack.push(XPathValue::NodeSet(result));
            }

            Op::Number(n) => {
                stack.push(XPathValue::Number(*n));
            }

            Op::String(s) => {
                stack.push(XPathValue::String(s.clone()));
            }

            Op::Variable(name) => {
                return Err(XPathError::UnboundVariable(name.clone()));
            }

            Op::Negate => {
                let val = stack.pop().unwrap_or(XPathValue::Number(0.0));
                stack.push(XPathValue::Number(-val.to_number_in(ctx.doc)));
            }

            Op::Binary(op) => {
                let right = stack.pop().unwrap_or_default();
                let left = stack.pop().unwrap_or_default();
                let doc = ctx.doc;

                let result = match op {
                    BinaryOp::Or => XPathValue::Boolean(left.to_boolean() || right.to_boolean()),
                    BinaryOp::And => XPathValue::Boolean(left.to_boolean() && right.to_boolean()),
                    BinaryOp::Eq
                    | BinaryOp::NotEq
                    | BinaryOp::Lt
                    | BinaryOp::LtEq
                    | BinaryOp::Gt
                    | BinaryOp::GtEq => XPathValue::Boolean(compare(doc, *op, &left, &right)),
                    BinaryOp::Add => arithmetic(doc, &left, &right, |a, b| a + b),
                    BinaryOp::Sub => arithmetic(doc, &left, &right, |a, b| a - b),
                    BinaryOp::Mul => arithmetic(doc, &left, &right, |a, b| a * b),
                    BinaryOp::Div => arithmetic(doc, &left, &right, |a, b| a / b),
                    BinaryOp::Mod => arithmetic(doc, &left, &right, |a, b| a % b),
                };

                stack.push(result);
            }

            Op::Call(name, arg_count) => {
                let split = stack.len().saturating_sub(*arg_count);
                let args = stack.split_off(split);

                let result = if ctx.library == FunctionLibrary::Dialect && odk::provides(name) {
                    odk::call(name, args, ctx)?
                } else {
                    functions::call(name, args, ctx)?
                };

                stack.push(result);
            }
        }
    }

    Ok(stack.pop().unwrap_or_default())
}

/// Keep the nodes for which the predicate holds; a number predicate selects
/// by position
fn apply_predicate<D: DocumentAccess>(
    pred: &CompiledExpr,
    nodes: Vec<NodeId>,
    ctx: &EvalContext<'_, D>,
) -> Result<Vec<NodeId>, XPathError> {
    let size = nodes.len();
    let mut filtered = Vec::new();

    for (i, node) in nodes.into_iter().enumerate() {
        let pred_ctx = ctx.at(node, i + 1, size);
        let include = match evaluate_compiled(pred, &pred_ctx)? {
            XPathValue::Number(n) => (i + 1) as f64 == n,
            other => other.to_boolean(),
        };
        if include {
            filtered.push(node);
        }
    }

    Ok(filtered)
}

/// Attribute steps yield values: one string, a list of strings, or an
/// empty node-set when nothing matched
fn attribute_values<D: DocumentAccess>(
    ctx: &EvalContext<'_, D>,
    nodes: &[NodeId],
    node_test: &CompiledNodeTest,
) -> XPathValue {
    let mut values: Vec<String> = Vec::new();
    for &node in nodes {
        match node_test {
            CompiledNodeTest::Any | CompiledNodeTest::Node => values.extend(
                ctx.doc
                    .get_attribute_values(node)
                    .into_iter()
                    .filter(|(name, _)| !is_namespace_declaration(name))
                    .map(|(_, value)| value.to_string()),
            ),
            CompiledNodeTest::Name(name) => {
                values.extend(ctx.doc.get_attribute(node, name).map(str::to_string));
            }
            CompiledNodeTest::QName(prefix, local) => {
                let qname = format!("{}:{}", prefix, local);
                values.extend(ctx.doc.get_attribute(node, &qname).map(str::to_string));
            }
            CompiledNodeTest::NamespaceWildcard(prefix) => values.extend(
                ctx.doc
                    .get_attribute_values(node)
                    .into_iter()
                    .filter(|(name, _)| {
                        name.split_once(':').is_some_and(|(p, _)| p == prefix)
                    })
                    .map(|(_, value)| value.to_string()),
            ),
            _ => {}
        }
    }
    match values.len() {
        0 => XPathValue::empty_nodeset(),
        1 => XPathValue::String(values.pop().unwrap_or_default()),
        _ => XPathValue::StringList(values),
    }
}

fn is_namespace_declaration(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

fn arithmetic<D: DocumentAccess>(
    doc: &D,
    left: &XPathValue,
    right: &XPathValue,
    f: fn(f64, f64) -> f64,
) -> XPathValue {
    XPathValue::Number(f(left.to_number_in(doc), right.to_number_in(doc)))
}

/// Comparable scalar drawn from one side of a comparison
#[derive(Debug)]
enum Atom {
    Str(String),
    Num(f64),
    Date(Option<DateTime<FixedOffset>>),
}

impl Atom {
    fn is_dateish(&self) -> bool {
        match self {
            Atom::Date(_) => true,
            Atom::Str(s) => date::is_date_like(s),
            Atom::Num(_) => false,
        }
    }

    fn number(&self) -> f64 {
        match self {
            Atom::Str(s) => parse_number(s),
            Atom::Num(n) => *n,
            Atom::Date(d) => d.as_ref().map_or(f64::NAN, date::days_since_epoch),
        }
    }

    /// Days since the epoch, parsing strings as dates
    fn date_number(&self) -> f64 {
        match self {
            Atom::Str(s) => date::parse_date(s)
                .as_ref()
                .map_or(f64::NAN, date::days_since_epoch),
            other => other.number(),
        }
    }
}

fn atoms<D: DocumentAccess>(doc: &D, value: &XPathValue) -> Vec<Atom> {
    match value {
        XPathValue::NodeSet(_) | XPathValue::StringList(_) => value
            .to_strings_in(doc)
            .into_iter()
            .map(Atom::Str)
            .collect(),
        XPathValue::Number(n) => vec![Atom::Num(*n)],
        XPathValue::Date(d) => vec![Atom::Date(*d)],
        XPathValue::String(s) => vec![Atom::Str(s.clone())],
        XPathValue::Boolean(b) => vec![Atom::Num(if *b { 1.0 } else { 0.0 })],
    }
}

/// XPath 1.0 comparison, extended so that dates and date-like strings
/// compare chronologically
fn compare<D: DocumentAccess>(doc: &D, op: BinaryOp, left: &XPathValue, right: &XPathValue) -> bool {
    let equality = matches!(op, BinaryOp::Eq | BinaryOp::NotEq);

    if matches!(left, XPathValue::Boolean(_)) || matches!(right, XPathValue::Boolean(_)) {
        let (l, r) = (left.to_boolean(), right.to_boolean());
        return if equality {
            (l == r) == (op == BinaryOp::Eq)
        } else {
            compare_numbers(op, l as u8 as f64, r as u8 as f64)
        };
    }

    let left_atoms = atoms(doc, left);
    let right_atoms = atoms(doc, right);
    left_atoms
        .iter()
        .any(|l| right_atoms.iter().any(|r| compare_atoms(op, l, r)))
}

fn compare_atoms(op: BinaryOp, left: &Atom, right: &Atom) -> bool {
    let equality = matches!(op, BinaryOp::Eq | BinaryOp::NotEq);
    let has_date = matches!(left, Atom::Date(_)) || matches!(right, Atom::Date(_));

    let as_dates = if equality {
        has_date || (left.is_dateish() && right.is_dateish())
    } else {
        has_date || left.is_dateish() || right.is_dateish()
    };
    if as_dates {
        return compare_numbers(op, left.date_number(), right.date_number());
    }

    match (left, right) {
        (Atom::Str(l), Atom::Str(r)) if equality => (l == r) == (op == BinaryOp::Eq),
        _ => compare_numbers(op, left.number(), right.number()),
    }
}

fn compare_numbers(op: BinaryOp, l: f64, r: f64) -> bool {
    match op {
        BinaryOp::Eq => l == r,
        BinaryOp::NotEq => l != r,
        BinaryOp::Lt => l < r,
        BinaryOp::LtEq => l <= r,
        BinaryOp::Gt => l > r,
        BinaryOp::GtEq => l >= r,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::XmlDocument;
    use rstest::rstest;

    fn eval(xml: &str, xpath: &str) -> XPathValue {
        let doc = XmlDocument::parse(xml).unwrap();
        evaluate(&doc, xpath).unwrap()
    }

    #[test]
    fn test_simple_path() {
        let result = eval("<root><child/></root>", "/root/child");
        assert_eq!(result.as_nodeset().unwrap().len(), 1);
    }

    #[test]
    fn test_descendant() {
        let result = eval("<root><a><b/></a></root>", "//b");
        assert_eq!(result.as_nodeset().unwrap().len(), 1);
    }

    #[test]
    fn test_predicate_positions_are_per_parent() {
        let xml = "<r><g><x>1</x><x>2</x></g><g><x>3</x></g></r>";
        let doc = XmlDocument::parse(xml).unwrap();
        let result = evaluate(&doc, "/r/g/x[1]").unwrap();
        assert_eq!(result.to_strings_in(&doc), vec!["1", "3"]);
        let result = evaluate(&doc, "(/r/g/x)[2]").unwrap();
        assert_eq!(result.to_strings_in(&doc), vec!["2"]);
    }

    #[test]
    fn test_reverse_axis_positions() {
        let xml = "<r><a/><b/><c/></r>";
        let doc = XmlDocument::parse(xml).unwrap();
        let c = evaluate(&doc, "/r/c").unwrap();
        let c = c.as_nodeset().unwrap()[0];
        let result = evaluate_from_node(&doc, c, "name(preceding-sibling::*[1])").unwrap();
        assert_eq!(result.to_string_value(), "b");
    }

    #[test]
    fn test_document_order_after_insertion() {
        let mut doc = XmlDocument::parse("<r><x>1</x><x>3</x></r>").unwrap();
        let first = doc.descendants(0).find(|&n| doc.name(n) == "x").unwrap();
        let copy = doc.deep_clone(first).unwrap();
        doc.set_text(copy, "2");
        doc.insert_after(first, copy);
        let result = evaluate(&doc, "/r/x").unwrap();
        assert_eq!(result.to_strings_in(&doc), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_attributes() {
        let doc = XmlDocument::parse(r#"<model><instance id="a"><x/></instance><instance id="b"><y/></instance></model>"#).unwrap();
        let result = evaluate(&doc, r#"/model/instance[@id = "b"]/*"#).unwrap();
        let nodes = result.as_nodeset().unwrap();
        assert_eq!(doc.name(nodes[0]), "y");
        assert!(evaluate(&doc, "/model/instance/@id").unwrap().is_string_list());
    }

    #[rstest]
    #[case("count(/r/*)", "3")]
    #[case("string-length('hello')", "5")]
    #[case("/r/a + /r/b", "3")]
    #[case("/r/* = 2", "true")]
    #[case("/r/* != 2", "true")]
    #[case("/r/a = 'x'", "false")]
    #[case("/r/* > 2", "false")]
    #[case("/r/c = ''", "true")]
    #[case("/r/missing = ''", "false")]
    #[case("true() = /r/a", "true")]
    #[case("7 mod 3", "1")]
    #[case("-/r/a", "-1")]
    fn test_operators(#[case] xpath: &str, #[case] expected: &str) {
        let doc = XmlDocument::parse("<r><a>1</a><b>2</b><c/></r>").unwrap();
        assert_eq!(evaluate(&doc, xpath).unwrap().to_string_in(&doc), expected);
    }

    #[rstest]
    #[case("'2020-01-05' < '2020-02-01'", true)]
    #[case("'2020-1-5' = '2020-01-05'", true)]
    #[case("'2021-01-01' > '2020-12-31'", true)]
    #[case("'abc' = 'abc'", true)]
    #[case("'abc' < 'abd'", false)]
    fn test_date_like_comparisons(#[case] xpath: &str, #[case] expected: bool) {
        let doc = XmlDocument::parse("<r/>").unwrap();
        assert_eq!(evaluate(&doc, xpath).unwrap().to_boolean(), expected);
    }

    #[test]
    fn test_errors() {
        let doc = XmlDocument::parse("<r/>").unwrap();
        assert!(matches!(evaluate(&doc, "nope()"), Err(XPathError::UnknownFunction(_))));
        assert!(matches!(evaluate(&doc, "$v"), Err(XPathError::UnboundVariable(_))));
        assert!(matches!(evaluate(&doc, "'a'/b"), Err(XPathError::Type(_))));
        assert!(matches!(evaluate(&doc, "/r["), Err(XPathError::Syntax(_))));
    }
}
