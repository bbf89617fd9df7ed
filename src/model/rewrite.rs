//! Expression rewriting
//!
//! Expressions are written against the answer tree as if it were the
//! document root, and with the repeat instance a question belongs to
//! implied. Rewriting makes that explicit on the parsed tree:
//!
//! 1. `indexed-repeat(...)` becomes a path with `position() = N` predicates
//! 2. `pulldata(...)` is evaluated and replaced by its string result
//! 3. `instance('id')` becomes `/model/instance[@id = "id"]`
//! 4. `current()` paths are resolved against the context selector
//! 5. absolute paths move below `/model/instance[1]`
//! 6. inside repeats, paths through the context's repeat ancestors are
//!    pinned to the context's positions

use super::error::FormLogicError;
use super::evaluate::{EvalResult, ResultKind};
use super::repeat::same_name_position;
use super::{FormModel, PRIMARY_INSTANCE_PATH};
use crate::dom::NodeId;
use crate::xpath::value::parse_number;
use crate::xpath::{parse, Axis, BinaryOp, Expr, NodeTest, Step};
use std::convert::Infallible;

/// What a rewrite may depend on besides the expression
pub(crate) struct RewriteContext<'r> {
    /// Raw expression, for error messages
    pub expression: &'r str,
    pub selector: Option<&'r str>,
    pub index: usize,
    pub context: NodeId,
    /// Number of nodes the selector matched
    pub cardinality: usize,
}

/// A series path and the predicate selecting one instance of it
type PositionTarget = (Expr, Expr);

/// Apply `f` to each direct subexpression, step predicates included
fn map_children<E>(expr: Expr, f: &mut dyn FnMut(Expr) -> Result<Expr, E>) -> Result<Expr, E> {
    Ok(match expr {
        Expr::Union(left, right) => Expr::Union(Box::new(f(*left)?), Box::new(f(*right)?)),
        Expr::Path(base, step) => Expr::Path(Box::new(f(*base)?), Box::new(map_step(*step, f)?)),
        Expr::Filter(base, predicate) => Expr::Filter(Box::new(f(*base)?), Box::new(f(*predicate)?)),
        Expr::Function(name, args) => {
            let args = args.into_iter().map(|arg| f(arg)).collect::<Result<_, E>>()?;
            Expr::Function(name, args)
        }
        Expr::Binary(left, op, right) => Expr::Binary(Box::new(f(*left)?), op, Box::new(f(*right)?)),
        Expr::Negate(inner) => Expr::Negate(Box::new(f(*inner)?)),
        Expr::Step(step) => Expr::Step(Box::new(map_step(*step, f)?)),
        leaf => leaf,
    })
}

fn map_step<E>(mut step: Step, f: &mut dyn FnMut(Expr) -> Result<Expr, E>) -> Result<Step, E> {
    step.predicates = step
        .predicates
        .into_iter()
        .map(|predicate| f(predicate))
        .collect::<Result<_, E>>()?;
    Ok(step)
}

/// Rebuild bottom-up, applying `f` to every node after its children
fn transform<E>(expr: Expr, f: &mut dyn FnMut(Expr) -> Result<Expr, E>) -> Result<Expr, E> {
    let expr = map_children(expr, &mut |child| transform(child, &mut *f))?;
    f(expr)
}

fn infallible(result: Result<Expr, Infallible>) -> Expr {
    match result {
        Ok(expr) => expr,
        Err(never) => match never {},
    }
}

/// Whether the expression calls any of `names`
pub(crate) fn calls_any(expr: &Expr, names: &[&str]) -> bool {
    let step_calls = |step: &Step| step.predicates.iter().any(|p| calls_any(p, names));
    match expr {
        Expr::Function(name, args) => {
            names.contains(&name.as_str()) || args.iter().any(|a| calls_any(a, names))
        }
        Expr::Union(left, right) | Expr::Filter(left, right) | Expr::Binary(left, _, right) => {
            calls_any(left, names) || calls_any(right, names)
        }
        Expr::Path(base, step) => calls_any(base, names) || step_calls(step),
        Expr::Negate(inner) => calls_any(inner, names),
        Expr::Step(step) => step_calls(step),
        _ => false,
    }
}

fn position_predicate(position: f64) -> Expr {
    Expr::Binary(
        Box::new(Expr::Function("position".to_string(), Vec::new())),
        BinaryOp::Eq,
        Box::new(Expr::Number(position)),
    )
}

/// `/model/instance[1]`
fn primary_instance_expr() -> Expr {
    let model = Expr::Path(Box::new(Expr::Root), Box::new(Step::child(NodeTest::Name("model".into()))));
    let mut instance = Step::child(NodeTest::Name("instance".into()));
    instance.predicates.push(Expr::Number(1.0));
    Expr::Path(Box::new(model), Box::new(instance))
}

/// `/model/instance[@id = "id"]`
fn secondary_instance_expr(id: &str) -> Expr {
    let model = Expr::Path(Box::new(Expr::Root), Box::new(Step::child(NodeTest::Name("model".into()))));
    let id_attribute = Step {
        axis: Axis::Attribute,
        node_test: NodeTest::Name("id".into()),
        predicates: Vec::new(),
    };
    let mut instance = Step::child(NodeTest::Name("instance".into()));
    instance.predicates.push(Expr::Binary(
        Box::new(Expr::Step(Box::new(id_attribute))),
        BinaryOp::Eq,
        Box::new(Expr::String(id.to_string())),
    ));
    Expr::Path(Box::new(model), Box::new(instance))
}

fn is_current_call(expr: &Expr) -> bool {
    matches!(expr, Expr::Function(name, args) if name == "current" && args.is_empty())
}

fn is_self_step(step: &Step) -> bool {
    step.axis == Axis::Self_ && step.node_test == NodeTest::Node && step.predicates.is_empty()
}

/// Move absolute child paths below the primary instance
fn shift_to_primary_instance(expr: Expr) -> Expr {
    infallible(transform(expr, &mut |e| {
        Ok(match e {
            Expr::Path(base, step)
                if *base == Expr::Root
                    && step.axis == Axis::Child
                    && step.node_test != NodeTest::Name("model".into()) =>
            {
                Expr::Path(Box::new(primary_instance_expr()), step)
            }
            other => other,
        })
    }))
}

fn with_predicate(expr: Expr, predicate: Expr) -> Expr {
    match expr {
        Expr::Path(base, mut step) => {
            step.predicates.push(predicate);
            Expr::Path(base, step)
        }
        Expr::Step(mut step) => {
            step.predicates.push(predicate);
            Expr::Step(step)
        }
        other => Expr::Filter(Box::new(other), Box::new(predicate)),
    }
}

fn lookup<'t>(targets: &'t [PositionTarget], expr: &Expr) -> Option<&'t Expr> {
    targets
        .iter()
        .find(|(path, _)| path == expr)
        .map(|(_, predicate)| predicate)
}

/// Add each target's predicate where its path is the base of a longer path.
/// With `exact`, a whole expression equal to a target gets it too.
/// Matching is done on the original subtrees, outermost first.
pub(crate) fn inject_positions(expr: Expr, targets: &[PositionTarget], exact: bool) -> Expr {
    if exact {
        if let Some(predicate) = lookup(targets, &expr).cloned() {
            return with_predicate(inject_children(expr, targets, exact), predicate);
        }
    }
    inject_children(expr, targets, exact)
}

fn inject_children(expr: Expr, targets: &[PositionTarget], exact: bool) -> Expr {
    match expr {
        Expr::Path(base, step) => {
            let predicate = lookup(targets, &base).cloned();
            let mut base = inject_children(*base, targets, exact);
            if let Some(predicate) = predicate {
                base = with_predicate(base, predicate);
            }
            let step = infallible_step(map_step(*step, &mut |p| Ok(inject_positions(p, targets, exact))));
            Expr::Path(Box::new(base), Box::new(step))
        }
        other => infallible(map_children(other, &mut |child| {
            Ok(inject_positions(child, targets, exact))
        })),
    }
}

fn infallible_step(result: Result<Step, Infallible>) -> Step {
    match result {
        Ok(step) => step,
        Err(never) => match never {},
    }
}

/// Text of a literal argument, or the expression itself as text
fn literal_text(expr: &Expr) -> String {
    match expr {
        Expr::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl FormModel {
    pub(crate) fn rewrite(&mut self, expr: Expr, ctx: &RewriteContext<'_>) -> Result<Expr, FormLogicError> {
        let expr = transform(expr, &mut |e| match e {
            Expr::Function(name, args) if name == "indexed-repeat" => self.indexed_repeat(args, ctx),
            other => Ok(other),
        })?;
        let expr = transform(expr, &mut |e| match e {
            Expr::Function(name, args) if name == "pulldata" => self.pulldata(args, ctx),
            other => Ok(other),
        })?;
        let expr = self.replace_instance_calls(expr, ctx)?;
        let expr = replace_current(expr, ctx)?;
        let expr = if self.has_instance_root() {
            shift_to_primary_instance(expr)
        } else {
            expr
        };
        if ctx.cardinality > 1 {
            let targets = self.repeat_positions(ctx.context);
            return Ok(inject_positions(expr, &targets, false));
        }
        Ok(expr)
    }

    /// `indexed-repeat(target, series1, pos1, ...)` as `target` with
    /// `position() = pos` on each series path
    fn indexed_repeat(&mut self, args: Vec<Expr>, ctx: &RewriteContext<'_>) -> Result<Expr, FormLogicError> {
        if args.len() < 3 || args.len() > 11 || args.len() % 2 == 0 {
            return Err(FormLogicError::IndexedRepeatArity {
                call: Expr::Function("indexed-repeat".into(), args).to_string(),
            });
        }
        let mut args = args.into_iter();
        let Some(target) = args.next() else {
            return Err(FormLogicError::IndexedRepeatArity {
                call: "indexed-repeat()".into(),
            });
        };
        let mut targets = Vec::new();
        while let (Some(series), Some(position)) = (args.next(), args.next()) {
            let position = match position {
                Expr::Number(n) => n,
                other => {
                    let text = other.to_string();
                    self.evaluate(&text, ResultKind::Number, ctx.selector, Some(ctx.index), true)?
                        .as_number()
                        .unwrap_or(f64::NAN)
                }
            };
            targets.push((series, position_predicate(position)));
        }
        Ok(inject_positions(target, &targets, true))
    }

    /// `pulldata(instance, column, search_column, value)` looked up now and
    /// replaced by its result
    fn pulldata(&mut self, args: Vec<Expr>, ctx: &RewriteContext<'_>) -> Result<Expr, FormLogicError> {
        let [instance, column, search_column, search_value]: [Expr; 4] = match args.try_into() {
            Ok(args) => args,
            Err(args) => {
                return Err(FormLogicError::PulldataArity {
                    call: Expr::Function("pulldata".into(), args).to_string(),
                })
            }
        };
        let value = match self.evaluate(
            &search_value.to_string(),
            ResultKind::String,
            ctx.selector,
            Some(ctx.index),
            true,
        )? {
            EvalResult::String(s) => s,
            _ => String::new(),
        };
        let value = if parse_number(&value).is_nan() {
            Expr::String(value).to_string()
        } else {
            value.trim().to_string()
        };
        let lookup = format!(
            "instance({})/root/item[{} = {}]/{}",
            instance,
            literal_text(&search_column),
            value,
            literal_text(&column)
        );
        let result = self.evaluate(&lookup, ResultKind::String, ctx.selector, Some(ctx.index), true)?;
        Ok(Expr::String(result.as_str().unwrap_or_default().to_string()))
    }

    fn replace_instance_calls(&self, expr: Expr, ctx: &RewriteContext<'_>) -> Result<Expr, FormLogicError> {
        transform(expr, &mut |e| match e {
            Expr::Function(name, args) if name == "instance" => {
                if let [Expr::String(id)] = args.as_slice() {
                    if !self.instance_exists(id) {
                        return Err(FormLogicError::MissingInstance {
                            id: id.clone(),
                            expression: ctx.expression.to_string(),
                        });
                    }
                    return Ok(secondary_instance_expr(id));
                }
                Ok(Expr::Function(name, args))
            }
            other => Ok(other),
        })
    }

    /// Position predicates for each repeat instance the context sits in
    fn repeat_positions(&self, context: NodeId) -> Vec<PositionTarget> {
        let prefix = if self.has_instance_root() {
            PRIMARY_INSTANCE_PATH
        } else {
            ""
        };
        let mut targets = Vec::new();
        for node in self.doc.ancestors_or_self(context) {
            if Some(node) == self.primary || !self.doc.is_element(node) {
                break;
            }
            if !super::repeat::has_same_name_siblings(&self.doc, node) {
                continue;
            }
            let path = format!("{}{}", prefix, self.node_path(node));
            if let Ok(parsed) = parse(&path) {
                let position = same_name_position(&self.doc, node) as f64;
                targets.push((parsed, position_predicate(position)));
            }
        }
        targets
    }
}

/// `current()/.` is the selector itself; `current()/x` restarts at the root
fn replace_current(expr: Expr, ctx: &RewriteContext<'_>) -> Result<Expr, FormLogicError> {
    let selector = match ctx.selector {
        Some(selector) => parse(selector).map_err(|e| FormLogicError::expression(selector, e))?,
        None => Expr::Context,
    };
    Ok(infallible(transform(expr, &mut |e| {
        Ok(match e {
            Expr::Path(base, step) if is_current_call(&base) => {
                if is_self_step(&step) {
                    Expr::Path(Box::new(selector.clone()), step)
                } else {
                    Expr::Path(Box::new(Expr::Root), step)
                }
            }
            other => other,
        })
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExternalInstance, FormData, ModelConfig};
    use rstest::rstest;

    const FORM: &str = r#"<model xmlns:jr="http://openrosa.org/javarosa"><instance><data><rep jr:template=""><x/><sub jr:template=""><y/></sub></rep><rep><x>a</x><sub><y>a1</y></sub><sub><y>a2</y></sub></rep><rep><x>b</x><sub><y>b1</y></sub><sub><y>b2</y></sub></rep><meta><instanceID>x</instanceID></meta></data></instance><instance id="csv" src="jr://file-csv/csv.csv"/></model>"#;

    const CSV: &str = "<root><item><colA>foo</colA><colB>bar</colB></item><item><colA>7</colA><colB>seven</colB></item></root>";

    fn model() -> FormModel {
        let data = FormData::new(FORM).with_external(ExternalInstance::new("csv", CSV));
        let mut model = FormModel::new(data, ModelConfig::default());
        assert!(model.init().is_empty());
        model
    }

    fn rewritten(model: &mut FormModel, expr: &str, selector: Option<&str>, index: usize) -> String {
        let (context, cardinality) = model.resolve_context_for_test(selector, index);
        let ctx = RewriteContext {
            expression: expr,
            selector,
            index,
            context,
            cardinality,
        };
        let parsed = parse(expr).unwrap();
        model.rewrite(parsed, &ctx).unwrap().to_string()
    }

    #[rstest]
    #[case("/data/rep/x", "/model/instance[1]/data/rep/x")]
    #[case("//x", "//x")]
    #[case("/model/instance[@id = 'csv']/root", "/model/instance[@id = \"csv\"]/root")]
    #[case("instance('csv')/root/item", "/model/instance[@id = \"csv\"]/root/item")]
    #[case("current()/x", "/model/instance[1]/x")]
    #[case("current()/.", "./.")]
    #[case("../x + 1", "../x + 1")]
    fn test_rewrite_without_repeat_context(#[case] expr: &str, #[case] expected: &str) {
        let mut model = model();
        assert_eq!(rewritten(&mut model, expr, None, 0), expected);
    }

    #[test]
    fn test_positions_injected_into_prefixes_only() {
        let mut model = model();
        let out = rewritten(&mut model, "/data/rep/x", Some("/data/rep/sub/y"), 3);
        assert_eq!(out, "/model/instance[1]/data/rep[position() = 2]/x");

        let out = rewritten(&mut model, "count(/data/rep/sub)", Some("/data/rep/sub/y"), 3);
        assert_eq!(out, "count(/model/instance[1]/data/rep[position() = 2]/sub)");

        let out = rewritten(&mut model, "/data/rep/sub/y", Some("/data/rep/sub/y"), 0);
        assert_eq!(
            out,
            "/model/instance[1]/data/rep[position() = 1]/sub[position() = 1]/y"
        );
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let mut model = model();
        let once = rewritten(&mut model, "/data/rep/x", Some("/data/rep/x"), 1);
        let twice = rewritten(&mut model, &once, Some("/data/rep/x"), 1);
        assert_eq!(once, "/model/instance[1]/data/rep[position() = 2]/x");
        assert_eq!(twice, once);
        let value = model
            .evaluate(&once, ResultKind::String, Some("/data/rep/x"), Some(1), true)
            .unwrap();
        assert_eq!(value.as_str(), Some("b"));
    }

    #[test]
    fn test_indexed_repeat() {
        let mut model = model();
        let out = rewritten(&mut model, "indexed-repeat(/data/rep/sub/y, /data/rep, 2, /data/rep/sub, 1)", None, 0);
        assert_eq!(
            out,
            "/model/instance[1]/data/rep[position() = 2]/sub[position() = 1]/y"
        );
        assert_eq!(
            model
                .evaluate_string("indexed-repeat(/data/rep/sub/y, /data/rep, 2, /data/rep/sub, 1)")
                .unwrap(),
            "b1"
        );
        assert_eq!(
            model.evaluate_string("indexed-repeat(/data/rep/x, /data/rep, 1 + 1)").unwrap(),
            "b"
        );
        assert_eq!(
            model.evaluate_string("indexed-repeat(/data/rep, /data/rep, 2)").unwrap(),
            "bb1b2"
        );
        assert!(matches!(
            model.evaluate_string("indexed-repeat(/data/rep/x, /data/rep)"),
            Err(FormLogicError::IndexedRepeatArity { .. })
        ));
    }

    #[rstest]
    #[case("pulldata('csv', 'colB', 'colA', 'foo')", "bar")]
    #[case("pulldata('csv', 'colB', 'colA', 7)", "seven")]
    #[case("pulldata('csv', 'colB', 'colA', 'none')", "")]
    fn test_pulldata(#[case] expr: &str, #[case] expected: &str) {
        let mut model = model();
        assert_eq!(model.evaluate_string(expr).unwrap(), expected);
    }

    #[test]
    fn test_pulldata_arity() {
        let mut model = model();
        assert!(matches!(
            model.evaluate_string("pulldata('csv', 'colB')"),
            Err(FormLogicError::PulldataArity { .. })
        ));
    }

    #[test]
    fn test_context_sensitive_evaluation() {
        let mut model = model();
        let result = model
            .evaluate("/data/rep/x", ResultKind::String, Some("/data/rep/sub/y"), Some(2), true)
            .unwrap();
        assert_eq!(result.as_str(), Some("b"));
        let result = model
            .evaluate("../y", ResultKind::String, Some("/data/rep/sub/y"), Some(1), true)
            .unwrap();
        assert_eq!(result.as_str(), Some("a2"));
    }

    impl FormModel {
        fn resolve_context_for_test(&mut self, selector: Option<&str>, index: usize) -> (NodeId, usize) {
            match selector {
                None => (self.default_context(), 1),
                Some(selector) => {
                    let nodes = self.evaluate_nodes(selector).unwrap();
                    (nodes.get(index).copied().unwrap_or(self.default_context()), nodes.len())
                }
            }
        }
    }
}
