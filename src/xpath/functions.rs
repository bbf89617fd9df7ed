//! XPath 1.0 Functions
//!
//! Implements the XPath 1.0 core library:
//!
//! Node Set Functions:
//! - position(), last(), count(), local-name(), namespace-uri(), name()
//!
//! String Functions:
//! - string(), concat(), starts-with(), contains(), substring(),
//!   substring-before(), substring-after(), string-length(),
//!   normalize-space(), translate()
//!
//! Boolean Functions:
//! - boolean(), not(), true(), false(), lang()
//!
//! Number Functions:
//! - number(), sum(), floor(), ceiling(), round()

use super::eval::EvalContext;
use super::value::{parse_number, XPathValue};
use super::XPathError;
use crate::dom::{DocumentAccess, NodeId};

/// Evaluate a core function call
pub fn call<D: DocumentAccess>(
    name: &str,
    args: Vec<XPathValue>,
    ctx: &EvalContext<'_, D>,
) -> Result<XPathValue, XPathError> {
    let doc = ctx.doc;
    match name {
        // Node Set Functions
        "position" => {
            arity(name, &args, 0, 0, "0")?;
            Ok(XPathValue::Number(ctx.context_position as f64))
        }
        "last" => {
            arity(name, &args, 0, 0, "0")?;
            Ok(XPathValue::Number(ctx.context_size as f64))
        }
        "count" => fn_count(args),
        "local-name" => {
            let node = node_argument(name, &args, ctx)?;
            Ok(node.map_or_else(String::new, |n| doc.node_local_name(n).to_string()).into())
        }
        "namespace-uri" => {
            let node = node_argument(name, &args, ctx)?;
            let uri = node.and_then(|n| doc.node_namespace_uri(n)).unwrap_or("");
            Ok(uri.into())
        }
        "name" => {
            let node = node_argument(name, &args, ctx)?;
            Ok(node.map_or_else(String::new, |n| doc.node_name(n).to_string()).into())
        }

        // String Functions
        "string" => {
            arity(name, &args, 0, 1, "0 or 1")?;
            Ok(XPathValue::String(string_or_context(&args, ctx)))
        }
        "concat" => {
            arity(name, &args, 2, usize::MAX, "2 or more")?;
            let result: String = args.iter().map(|a| a.to_string_in(doc)).collect();
            Ok(XPathValue::String(result))
        }
        "starts-with" => {
            let [s, prefix] = two_strings(name, &args, ctx)?;
            Ok(XPathValue::Boolean(s.starts_with(&prefix)))
        }
        "contains" => {
            let [s, pattern] = two_strings(name, &args, ctx)?;
            Ok(XPathValue::Boolean(s.contains(&pattern)))
        }
        "substring" => fn_substring(args, ctx),
        "substring-before" => {
            let [s, pattern] = two_strings(name, &args, ctx)?;
            let result = s.find(&pattern).map_or("", |pos| &s[..pos]);
            Ok(result.into())
        }
        "substring-after" => {
            let [s, pattern] = two_strings(name, &args, ctx)?;
            let result = s.find(&pattern).map_or("", |pos| &s[pos + pattern.len()..]);
            Ok(result.into())
        }
        "string-length" => {
            arity(name, &args, 0, 1, "0 or 1")?;
            let s = string_or_context(&args, ctx);
            Ok(XPathValue::Number(s.chars().count() as f64))
        }
        "normalize-space" => {
            arity(name, &args, 0, 1, "0 or 1")?;
            let s = string_or_context(&args, ctx);
            Ok(XPathValue::String(s.split_whitespace().collect::<Vec<_>>().join(" ")))
        }
        "translate" => fn_translate(args, ctx),

        // Boolean Functions
        "boolean" => {
            arity(name, &args, 1, 1, "1")?;
            Ok(XPathValue::Boolean(args[0].to_boolean()))
        }
        "not" => {
            arity(name, &args, 1, 1, "1")?;
            Ok(XPathValue::Boolean(!args[0].to_boolean()))
        }
        "true" => {
            arity(name, &args, 0, 0, "0")?;
            Ok(XPathValue::Boolean(true))
        }
        "false" => {
            arity(name, &args, 0, 0, "0")?;
            Ok(XPathValue::Boolean(false))
        }
        "lang" => fn_lang(args, ctx),

        // Number Functions
        "number" => {
            arity(name, &args, 0, 1, "0 or 1")?;
            let value = match args.first() {
                Some(arg) => arg.to_number_in(doc),
                None => parse_number(&doc.string_value(ctx.context_node)),
            };
            Ok(XPathValue::Number(value))
        }
        "sum" => {
            arity(name, &args, 1, 1, "1")?;
            match &args[0] {
                XPathValue::NodeSet(_) | XPathValue::StringList(_) => {
                    let total = args[0]
                        .to_strings_in(doc)
                        .iter()
                        .map(|s| parse_number(s))
                        .sum();
                    Ok(XPathValue::Number(total))
                }
                _ => Err(XPathError::Type("sum() argument must be a node-set".to_string())),
            }
        }
        "floor" => number_fn(name, &args, ctx, f64::floor),
        "ceiling" => number_fn(name, &args, ctx, f64::ceil),
        // rounds .5 towards positive infinity
        "round" => number_fn(name, &args, ctx, |n| (n + 0.5).floor()),

        _ => Err(XPathError::UnknownFunction(name.to_string())),
    }
}

/// Check the argument count of a call
pub(crate) fn arity(
    function: &str,
    args: &[XPathValue],
    min: usize,
    max: usize,
    expected: &'static str,
) -> Result<(), XPathError> {
    if args.len() < min || args.len() > max {
        return Err(XPathError::Arity {
            function: function.to_string(),
            expected,
            found: args.len(),
        });
    }
    Ok(())
}

fn fn_count(args: Vec<XPathValue>) -> Result<XPathValue, XPathError> {
    arity("count", &args, 1, 1, "1")?;
    match &args[0] {
        XPathValue::NodeSet(nodes) => Ok(XPathValue::Number(nodes.len() as f64)),
        XPathValue::StringList(list) => Ok(XPathValue::Number(list.len() as f64)),
        _ => Err(XPathError::Type("count() argument must be a node-set".to_string())),
    }
}

/// The optional node-set argument of `name()` and friends: its first node,
/// or the context node when omitted
fn node_argument<D: DocumentAccess>(
    function: &str,
    args: &[XPathValue],
    ctx: &EvalContext<'_, D>,
) -> Result<Option<NodeId>, XPathError> {
    arity(function, args, 0, 1, "0 or 1")?;
    match args.first() {
        None => Ok(Some(ctx.context_node)),
        Some(XPathValue::NodeSet(nodes)) => Ok(nodes.first().copied()),
        Some(_) => Err(XPathError::Type(format!(
            "{}() argument must be a node-set",
            function
        ))),
    }
}

fn string_or_context<D: DocumentAccess>(args: &[XPathValue], ctx: &EvalContext<'_, D>) -> String {
    match args.first() {
        Some(arg) => arg.to_string_in(ctx.doc),
        None => ctx.doc.string_value(ctx.context_node),
    }
}

fn two_strings<D: DocumentAccess>(
    function: &str,
    args: &[XPathValue],
    ctx: &EvalContext<'_, D>,
) -> Result<[String; 2], XPathError> {
    arity(function, args, 2, 2, "2")?;
    Ok([args[0].to_string_in(ctx.doc), args[1].to_string_in(ctx.doc)])
}

fn number_fn<D: DocumentAccess>(
    function: &str,
    args: &[XPathValue],
    ctx: &EvalContext<'_, D>,
    f: fn(f64) -> f64,
) -> Result<XPathValue, XPathError> {
    arity(function, args, 1, 1, "1")?;
    Ok(XPathValue::Number(f(args[0].to_number_in(ctx.doc))))
}

fn fn_substring<D: DocumentAccess>(
    args: Vec<XPathValue>,
    ctx: &EvalContext<'_, D>,
) -> Result<XPathValue, XPathError> {
    arity("substring", &args, 2, 3, "2 or 3")?;

    let s = args[0].to_string_in(ctx.doc);
    let round = |v: f64| (v + 0.5).floor();
    // XPath is 1-indexed; characters at positions p with
    // start <= p < start + length are kept
    let start = round(args[1].to_number_in(ctx.doc));
    let end = match args.get(2) {
        Some(len) => start + round(len.to_number_in(ctx.doc)),
        None => f64::INFINITY,
    };

    let result: String = s
        .chars()
        .enumerate()
        .filter(|(i, _)| {
            let p = (*i + 1) as f64;
            p >= start && p < end
        })
        .map(|(_, c)| c)
        .collect();

    Ok(XPathValue::String(result))
}

fn fn_translate<D: DocumentAccess>(
    args: Vec<XPathValue>,
    ctx: &EvalContext<'_, D>,
) -> Result<XPathValue, XPathError> {
    arity("translate", &args, 3, 3, "3")?;

    let s = args[0].to_string_in(ctx.doc);
    let from: Vec<char> = args[1].to_string_in(ctx.doc).chars().collect();
    let to: Vec<char> = args[2].to_string_in(ctx.doc).chars().collect();

    let result: String = s
        .chars()
        .filter_map(|c| {
            if let Some(pos) = from.iter().position(|&fc| fc == c) {
                to.get(pos).copied()
            } else {
                Some(c)
            }
        })
        .collect();

    Ok(XPathValue::String(result))
}

fn fn_lang<D: DocumentAccess>(
    args: Vec<XPathValue>,
    ctx: &EvalContext<'_, D>,
) -> Result<XPathValue, XPathError> {
    arity("lang", &args, 1, 1, "1")?;
    let target_lang = args[0].to_string_in(ctx.doc).to_lowercase();
    let doc = ctx.doc;

    // Walk up ancestor chain looking for xml:lang attribute
    let mut node = ctx.context_node;
    loop {
        if let Some(lang_val) = doc.get_attribute(node, "xml:lang") {
            let lang_lower = lang_val.to_lowercase();
            // Exact match or subtag prefix match (e.g., "en" matches "en-US")
            let matched = lang_lower == target_lang
                || (lang_lower.starts_with(&target_lang)
                    && lang_lower.as_bytes().get(target_lang.len()) == Some(&b'-'));
            return Ok(XPathValue::Boolean(matched));
        }
        match doc.parent_of(node) {
            Some(parent) => node = parent,
            None => break,
        }
    }
    Ok(XPathValue::Boolean(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{NamespaceTable, XmlDocument};
    use crate::xpath::evaluate;
    use rstest::rstest;

    fn eval_str(xml: &str, xpath: &str) -> String {
        let doc = XmlDocument::parse(xml).unwrap();
        evaluate(&doc, xpath).unwrap().to_string_in(&doc)
    }

    #[rstest]
    #[case("concat('hello', ' ', 'world')", "hello world")]
    #[case("contains('hello world', 'world')", "true")]
    #[case("substring('hello', 2, 3)", "ell")]
    #[case("substring('12345', 1.5, 2.6)", "234")]
    #[case("substring('12345', 0, 3)", "12")]
    #[case("substring('12345', 0 div 0, 3)", "")]
    #[case("substring-before('1999/04/01', '/')", "1999")]
    #[case("substring-after('1999/04/01', '/')", "04/01")]
    #[case("normalize-space('  hello   world  ')", "hello world")]
    #[case("translate('bar', 'abc', 'ABC')", "BAr")]
    #[case("translate('--aaa--', 'abc-', 'ABC')", "AAA")]
    #[case("string-length()", "2")]
    #[case("round(2.5)", "3")]
    #[case("round(-2.5)", "-2")]
    #[case("floor(-1.5)", "-2")]
    #[case("ceiling(1.2)", "2")]
    #[case("sum(/r/n)", "7")]
    #[case("number('x')", "NaN")]
    #[case("name(/r/n)", "n")]
    #[case("local-name(/r/missing)", "")]
    fn test_core_functions(#[case] xpath: &str, #[case] expected: &str) {
        assert_eq!(eval_str("<r><n>3</n><n>4</n></r>", xpath), expected);
    }

    #[test]
    fn test_arity_errors() {
        let doc = XmlDocument::parse("<r/>").unwrap();
        let err = evaluate(&doc, "not()").unwrap_err();
        assert_eq!(
            err,
            XPathError::Arity {
                function: "not".to_string(),
                expected: "1",
                found: 0
            }
        );
        assert!(matches!(evaluate(&doc, "concat('a')"), Err(XPathError::Arity { .. })));
        assert!(matches!(evaluate(&doc, "count('a')"), Err(XPathError::Type(_))));
    }

    #[test]
    fn test_id_is_unknown() {
        let doc = XmlDocument::parse("<r/>").unwrap();
        assert_eq!(
            evaluate(&doc, "id('x')"),
            Err(XPathError::UnknownFunction("id".to_string()))
        );
    }

    #[test]
    fn lang_matches_xml_lang_attribute() {
        let doc = XmlDocument::parse("<root xml:lang=\"en-US\"><child/></root>").unwrap();
        let root = doc.root_element_id().unwrap();
        let child = doc.children_vec(root)[0];
        let namespaces = NamespaceTable::new();
        let ctx = EvalContext::new(&doc, &namespaces, child);
        let args = vec![XPathValue::String("en".to_string())];
        assert!(call("lang", args, &ctx).unwrap().to_boolean());
        let args = vec![XPathValue::String("fr".to_string())];
        assert!(!call("lang", args, &ctx).unwrap().to_boolean());
    }

    #[test]
    fn namespace_uri_returns_uri_for_prefixed_element() {
        let xml = "<root xmlns:ns=\"http://example.com\"><ns:child/></root>";
        assert_eq!(eval_str(xml, "namespace-uri(/root/ns:child)"), "http://example.com");
    }
}
