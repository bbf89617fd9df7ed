//! Form dialect functions
//!
//! OpenRosa/JavaRosa functions layered over the core library. Where a name
//! exists in both (`position`, `round`, `concat`) the dialect version is a
//! superset of the core one.
//!
//! Math: int(), round(x, d), pow(), log(), log10(), exp(), exp10(), sqrt(),
//! pi(), sin() and friends, atan2(), abs(), random()
//!
//! Dates: now(), today(), date(), date-time(), decimal-date-time(),
//! format-date(), format-date-time()
//!
//! Strings and selections: regex(), selected(), selected-at(),
//! count-selected(), count-non-empty(), join(), concat(), substr(),
//! ends-with(), uuid(), boolean-from-string(), if(), coalesce(), once()
//!
//! Aggregates and geometry: checklist(), weighted-checklist(), min(), max(),
//! area(), distance()

use super::date;
use super::eval::EvalContext;
use super::functions::arity;
use super::geo;
use super::value::{parse_number, XPathValue};
use super::XPathError;
use crate::dom::{DocumentAccess, NodeId};
use chrono::{DateTime, FixedOffset};
use fancy_regex::Regex;

/// Every function name the dialect defines
pub const DIALECT_FUNCTIONS: &[&str] = &[
    "abs",
    "acos",
    "area",
    "asin",
    "atan",
    "atan2",
    "boolean-from-string",
    "checklist",
    "coalesce",
    "concat",
    "cos",
    "count-non-empty",
    "count-selected",
    "date",
    "date-time",
    "decimal-date-time",
    "distance",
    "ends-with",
    "exp",
    "exp10",
    "format-date",
    "format-date-time",
    "if",
    "instance",
    "int",
    "join",
    "log",
    "log10",
    "max",
    "min",
    "now",
    "once",
    "pi",
    "position",
    "pow",
    "random",
    "regex",
    "round",
    "selected",
    "selected-at",
    "sin",
    "sqrt",
    "substr",
    "tan",
    "today",
    "uuid",
    "version",
    "weighted-checklist",
];

/// Whether the dialect handles `name`
pub fn provides(name: &str) -> bool {
    DIALECT_FUNCTIONS.binary_search(&name).is_ok()
}

/// Evaluate a dialect function call
pub fn call<D: DocumentAccess>(
    name: &str,
    args: Vec<XPathValue>,
    ctx: &EvalContext<'_, D>,
) -> Result<XPathValue, XPathError> {
    let doc = ctx.doc;
    let num = |i: usize| args[i].to_number_in(doc);
    let text = |i: usize| args[i].to_string_in(doc);

    match name {
        // Math
        "int" => {
            arity(name, &args, 1, 1, "1")?;
            let n = num(0);
            if n.is_nan() {
                Ok(XPathValue::String(String::new()))
            } else {
                Ok(XPathValue::Number(n.trunc()))
            }
        }
        "round" => {
            arity(name, &args, 1, 2, "1 or 2")?;
            let digits = if args.len() == 2 { num(1).trunc() } else { 0.0 };
            let scale = 10f64.powf(digits);
            Ok(XPathValue::Number((num(0) * scale + 0.5).floor() / scale))
        }
        "pow" => {
            arity(name, &args, 2, 2, "2")?;
            Ok(XPathValue::Number(num(0).powf(num(1))))
        }
        "atan2" => {
            arity(name, &args, 2, 2, "2")?;
            Ok(XPathValue::Number(num(0).atan2(num(1))))
        }
        "pi" => {
            arity(name, &args, 0, 0, "0")?;
            Ok(XPathValue::Number(std::f64::consts::PI))
        }
        "random" => {
            arity(name, &args, 0, 0, "0")?;
            // the low 62 bits of a v4 UUID are all random
            let bits = uuid::Uuid::new_v4().as_u128() & ((1u128 << 53) - 1);
            Ok(XPathValue::Number(bits as f64 / (1u64 << 53) as f64))
        }
        "log" | "log10" | "exp" | "exp10" | "sqrt" | "sin" | "cos" | "tan" | "asin" | "acos"
        | "atan" | "abs" => {
            arity(name, &args, 1, 1, "1")?;
            let x = num(0);
            let value = match name {
                "log" => x.ln(),
                "log10" => x.log10(),
                "exp" => x.exp(),
                "exp10" => 10f64.powf(x),
                "sqrt" => x.sqrt(),
                "sin" => x.sin(),
                "cos" => x.cos(),
                "tan" => x.tan(),
                "asin" => x.asin(),
                "acos" => x.acos(),
                "atan" => x.atan(),
                _ => x.abs(),
            };
            Ok(XPathValue::Number(value))
        }

        // Dates
        "now" => {
            arity(name, &args, 0, 0, "0")?;
            Ok(XPathValue::Date(Some(date::now())))
        }
        "today" => {
            arity(name, &args, 0, 0, "0")?;
            Ok(XPathValue::Date(date::today()))
        }
        "date" | "date-time" | "decimal-date-time" => {
            arity(name, &args, 1, 1, "1")?;
            Ok(XPathValue::Date(to_date(&args[0], doc)))
        }
        "format-date" | "format-date-time" => {
            arity(name, &args, 2, 2, "2")?;
            let dt = to_date(&args[0], doc);
            Ok(XPathValue::String(date::format_date(dt.as_ref(), &text(1))))
        }

        // Strings
        "uuid" => {
            arity(name, &args, 0, 0, "0")?;
            Ok(XPathValue::String(uuid::Uuid::new_v4().to_string()))
        }
        "regex" => {
            arity(name, &args, 2, 2, "2")?;
            let re = Regex::new(&text(1)).map_err(|e| XPathError::Regex(e.to_string()))?;
            let matched = re
                .is_match(&text(0))
                .map_err(|e| XPathError::Regex(e.to_string()))?;
            Ok(XPathValue::Boolean(matched))
        }
        "selected" => {
            arity(name, &args, 2, 2, "2")?;
            let value = text(1);
            let value = value.trim();
            Ok(XPathValue::Boolean(
                text(0).split_whitespace().any(|token| token == value),
            ))
        }
        "selected-at" => {
            arity(name, &args, 2, 2, "2")?;
            let n = num(1);
            let token = if n >= 0.0 {
                text(0).split_whitespace().nth(n as usize).map(str::to_string)
            } else {
                None
            };
            Ok(XPathValue::String(token.unwrap_or_default()))
        }
        "count-selected" => {
            arity(name, &args, 1, 1, "1")?;
            Ok(XPathValue::Number(text(0).split_whitespace().count() as f64))
        }
        "count-non-empty" => {
            arity(name, &args, 1, 1, "1")?;
            let count = match &args[0] {
                XPathValue::NodeSet(_) | XPathValue::StringList(_) => args[0]
                    .to_strings_in(doc)
                    .iter()
                    .filter(|s| !s.is_empty())
                    .count(),
                _ => {
                    return Err(XPathError::Type(
                        "count-non-empty() argument must be a node-set".to_string(),
                    ))
                }
            };
            Ok(XPathValue::Number(count as f64))
        }
        "join" => {
            arity(name, &args, 1, usize::MAX, "1 or more")?;
            let separator = text(0);
            let parts: Vec<String> = args[1..]
                .iter()
                .flat_map(|arg| arg.to_strings_in(doc))
                .collect();
            Ok(XPathValue::String(parts.join(&separator)))
        }
        "concat" => {
            arity(name, &args, 1, usize::MAX, "1 or more")?;
            let result: String = args
                .iter()
                .flat_map(|arg| arg.to_strings_in(doc))
                .collect();
            Ok(XPathValue::String(result))
        }
        "substr" => {
            arity(name, &args, 2, 3, "2 or 3")?;
            let chars: Vec<char> = text(0).chars().collect();
            let start = slice_index(num(1), chars.len());
            let end = if args.len() == 3 {
                slice_index(num(2), chars.len())
            } else {
                chars.len()
            };
            let result: String = if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            };
            Ok(XPathValue::String(result))
        }
        "ends-with" => {
            arity(name, &args, 2, 2, "2")?;
            Ok(XPathValue::Boolean(text(0).ends_with(&text(1))))
        }
        "boolean-from-string" => {
            arity(name, &args, 1, 1, "1")?;
            let s = text(0);
            Ok(XPathValue::Boolean(s.eq_ignore_ascii_case("true") || s == "1"))
        }
        "if" => {
            arity(name, &args, 3, 3, "3")?;
            let mut args = args;
            let otherwise = args.pop().unwrap_or_default();
            let then = args.pop().unwrap_or_default();
            Ok(if args[0].to_boolean() { then } else { otherwise })
        }
        "coalesce" => {
            arity(name, &args, 2, 2, "2")?;
            let mut args = args;
            let second = args.pop().unwrap_or_default();
            let first = args.pop().unwrap_or_default();
            Ok(if first.to_string_in(doc).is_empty() {
                second
            } else {
                first
            })
        }
        "once" => {
            arity(name, &args, 1, 1, "1")?;
            let current = doc.string_value(ctx.context_node);
            if !current.is_empty() {
                return Ok(XPathValue::String(current));
            }
            let fresh = text(0);
            Ok(XPathValue::String(if fresh == "NaN" {
                String::new()
            } else {
                fresh
            }))
        }

        // Aggregates
        "checklist" => {
            arity(name, &args, 3, usize::MAX, "3 or more")?;
            let count = args[2..]
                .iter()
                .flat_map(|arg| truth_values(arg, doc))
                .filter(|&t| t)
                .count();
            Ok(XPathValue::Boolean(within(count as f64, num(0), num(1))))
        }
        "weighted-checklist" => {
            if args.len() < 4 || args.len() % 2 != 0 {
                return Err(XPathError::Arity {
                    function: name.to_string(),
                    expected: "an even number, 4 or more",
                    found: args.len(),
                });
            }
            let mut total = 0.0;
            for pair in args[2..].chunks(2) {
                let values = truth_values(&pair[0], doc);
                let weights: Vec<f64> = match &pair[1] {
                    XPathValue::NodeSet(_) | XPathValue::StringList(_) => pair[1]
                        .to_strings_in(doc)
                        .iter()
                        .map(|s| parse_number(s))
                        .collect(),
                    other => vec![other.to_number()],
                };
                for (i, selected) in values.into_iter().enumerate() {
                    let weight = weights.get(i).or(weights.last()).copied().unwrap_or(0.0);
                    if selected {
                        total += weight;
                    }
                }
            }
            Ok(XPathValue::Boolean(within(total, num(0), num(1))))
        }
        "min" | "max" => {
            arity(name, &args, 1, usize::MAX, "1 or more")?;
            let pick: fn(f64, f64) -> f64 = if name == "min" { f64::min } else { f64::max };
            let mut result: Option<f64> = None;
            for arg in &args {
                let contribution = aggregate(arg, doc, pick);
                if contribution.is_nan() {
                    return Ok(XPathValue::Number(f64::NAN));
                }
                result = Some(result.map_or(contribution, |r| pick(r, contribution)));
            }
            Ok(XPathValue::Number(result.unwrap_or(f64::NAN)))
        }

        // Nodes and context
        "position" => {
            arity(name, &args, 0, 1, "0 or 1")?;
            match args.first() {
                None => Ok(XPathValue::Number(ctx.context_position as f64)),
                Some(XPathValue::NodeSet(nodes)) if nodes.len() == 1 => {
                    Ok(XPathValue::Number(sibling_position(doc, nodes[0]) as f64))
                }
                Some(_) => Err(XPathError::Type(
                    "position() argument must be a single node".to_string(),
                )),
            }
        }
        "version" => {
            arity(name, &args, 0, 0, "0")?;
            let version = ctx
                .answer_root
                .and_then(|root| doc.get_attribute(root, "version"))
                .unwrap_or("");
            Ok(XPathValue::String(version.to_string()))
        }
        "instance" => {
            arity(name, &args, 1, 1, "1")?;
            let id = text(0);
            let found = doc
                .descendants_vec(doc.document_node_id())
                .into_iter()
                .find(|&n| {
                    doc.is_element(n)
                        && doc.node_local_name(n) == "instance"
                        && doc.get_attribute(n, "id") == Some(id.as_str())
                });
            Ok(XPathValue::NodeSet(found.into_iter().collect()))
        }

        // Geo
        "area" | "distance" => {
            arity(name, &args, 1, 1, "1")?;
            let measure: fn(&[geo::GeoPoint]) -> f64 =
                if name == "area" { geo::area } else { geo::distance };
            let value = geo::parse_points(&args[0].to_strings_in(doc))
                .map_or(f64::NAN, |points| measure(&points));
            Ok(XPathValue::Number(value))
        }

        _ => Err(XPathError::UnknownFunction(name.to_string())),
    }
}

/// Coerce a value to the date type: numbers are days since the epoch,
/// anything else is parsed from its string form
pub fn to_date<D: DocumentAccess>(value: &XPathValue, doc: &D) -> Option<DateTime<FixedOffset>> {
    match value {
        XPathValue::Date(d) => *d,
        XPathValue::Number(n) => date::from_days(*n),
        other => date::parse_date(&other.to_string_in(doc)),
    }
}

/// Python-style slice bound: negatives count back from the end
fn slice_index(n: f64, len: usize) -> usize {
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    let resolved = if n < 0.0 { len as f64 + n } else { n };
    resolved.clamp(0.0, len as f64) as usize
}

/// Truth of every member: node-sets and lists contribute one value per
/// member (non-empty means true)
fn truth_values<D: DocumentAccess>(value: &XPathValue, doc: &D) -> Vec<bool> {
    match value {
        XPathValue::NodeSet(_) | XPathValue::StringList(_) => value
            .to_strings_in(doc)
            .iter()
            .map(|s| !s.is_empty())
            .collect(),
        other => vec![other.to_boolean()],
    }
}

/// `min <= value <= max`, where -1 disables a bound
fn within(value: f64, min: f64, max: f64) -> bool {
    (min == -1.0 || value >= min) && (max == -1.0 || value <= max)
}

fn aggregate<D: DocumentAccess>(value: &XPathValue, doc: &D, pick: fn(f64, f64) -> f64) -> f64 {
    match value {
        XPathValue::NodeSet(_) | XPathValue::StringList(_) => {
            let numbers: Vec<f64> = value
                .to_strings_in(doc)
                .iter()
                .map(|s| parse_number(s))
                .collect();
            if numbers.is_empty() || numbers.iter().any(|n| n.is_nan()) {
                f64::NAN
            } else {
                numbers.into_iter().reduce(pick).unwrap_or(f64::NAN)
            }
        }
        other => other.to_number_in(doc),
    }
}

/// 1-based position among preceding element siblings with the same name
fn sibling_position<D: DocumentAccess>(doc: &D, node: NodeId) -> usize {
    let name = doc.node_name(node);
    let mut position = 1;
    let mut current = doc.prev_sibling_of(node);
    while let Some(sibling) = current {
        if doc.is_element(sibling) && doc.node_name(sibling) == name {
            position += 1;
        }
        current = doc.prev_sibling_of(sibling);
    }
    position
}
