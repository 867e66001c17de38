//! JSON codec for expression trees.
//!
//! The wire format is fixed per node type so that structurally equal trees
//! always produce identical bytes:
//!
//! ```text
//! {"type":"const","value":true}
//! {"type":"atom","field":"title","operator":"TERM","value":{...},"negated":false}
//! {"type":"and","children":[...]}
//! {"type":"or","children":[...]}
//! {"type":"not","child":{...}}
//! ```
//!
//! Value objects list their keys in declaration order (see [`crate::value`]).
//! Decoding is strict: unknown node types, missing fields, and value keys
//! that do not belong to the declared operator are rejected with
//! [`ExprError::Malformed`] carrying the path of the offending node.

use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::ast::{Atom, AtomValue, Expr, Operator};
use crate::error::{ExprError, ExprResult};
use crate::value::{
    CaseSensitivity, ExistsValue, InValue, MatchType, RangeBound, RangeKind, RangeValue,
    TermValue, TokenValue,
};

/// Serializes an expression to its compact wire form.
///
/// # Example
///
/// ```rust
/// use litquery_expr::{to_json, Expr};
///
/// assert_eq!(to_json(&Expr::truth()).unwrap(), r#"{"type":"const","value":true}"#);
/// ```
pub fn to_json(expr: &Expr) -> ExprResult<String> {
    serde_json::to_string(expr).map_err(|e| ExprError::Serialization(e.to_string()))
}

/// Serializes an expression with indentation, for humans.
pub fn to_json_pretty(expr: &Expr) -> ExprResult<String> {
    serde_json::to_string_pretty(expr).map_err(|e| ExprError::Serialization(e.to_string()))
}

/// Parses an expression from its wire form.
pub fn from_json(text: &str) -> ExprResult<Expr> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ExprError::malformed("$", format!("invalid JSON: {}", e)))?;
    from_value(&value)
}

/// Decodes an expression from an already-parsed JSON value.
pub fn from_value(value: &Value) -> ExprResult<Expr> {
    decode_expr(value, "$")
}

// =============================================================================
// Encoding
// =============================================================================

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Expr::Const(value) => {
                let mut node = serializer.serialize_struct("Expr", 2)?;
                node.serialize_field("type", "const")?;
                node.serialize_field("value", value)?;
                node.end()
            }
            Expr::Atom(atom) => atom.serialize(serializer),
            Expr::And(children) | Expr::Or(children) => {
                let mut node = serializer.serialize_struct("Expr", 2)?;
                node.serialize_field("type", self.type_name())?;
                node.serialize_field("children", &**children)?;
                node.end()
            }
            Expr::Not(child) => {
                let mut node = serializer.serialize_struct("Expr", 2)?;
                node.serialize_field("type", "not")?;
                node.serialize_field("child", &**child)?;
                node.end()
            }
        }
    }
}

impl Serialize for Atom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut node = serializer.serialize_struct("Atom", 5)?;
        node.serialize_field("type", "atom")?;
        node.serialize_field("field", &self.field)?;
        node.serialize_field("operator", self.operator().as_str())?;
        match &self.value {
            AtomValue::Term(v) => node.serialize_field("value", v)?,
            AtomValue::In(v) => node.serialize_field("value", v)?,
            AtomValue::Range(v) => node.serialize_field("value", v)?,
            AtomValue::Exists(v) => node.serialize_field("value", v)?,
            AtomValue::Token(v) => node.serialize_field("value", v)?,
        }
        node.serialize_field("negated", &self.negated)?;
        node.end()
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        from_value(&value).map_err(D::Error::custom)
    }
}

// =============================================================================
// Decoding
// =============================================================================

const CONST_KEYS: &[&str] = &["type", "value"];
const ATOM_KEYS: &[&str] = &["type", "field", "operator", "value", "negated"];
const GROUP_KEYS: &[&str] = &["type", "children"];
const NOT_KEYS: &[&str] = &["type", "child"];

const TERM_KEYS: &[&str] = &["text", "match_type", "case_sensitivity"];
const IN_KEYS: &[&str] = &["values", "case_sensitive"];
const RANGE_KEYS: &[&str] = &["kind", "lower", "upper", "include_lower", "include_upper"];
const EXISTS_KEYS: &[&str] = &["expected"];
const TOKEN_KEYS: &[&str] = &["kind", "value"];

fn decode_expr(value: &Value, path: &str) -> ExprResult<Expr> {
    let obj = as_object(value, path)?;
    let node_type = required_str(obj, "type", path)?;
    match node_type {
        "const" => {
            check_keys(obj, CONST_KEYS, path)?;
            Ok(Expr::Const(required_bool(obj, "value", path)?))
        }
        "atom" => {
            check_keys(obj, ATOM_KEYS, path)?;
            decode_atom(obj, path).map(Expr::atom)
        }
        "and" | "or" => {
            check_keys(obj, GROUP_KEYS, path)?;
            let children = required(obj, "children", path)?
                .as_array()
                .ok_or_else(|| ExprError::malformed(path, "'children' must be an array"))?;
            let decoded = children
                .iter()
                .enumerate()
                .map(|(i, child)| decode_expr(child, &format!("{}.children[{}]", path, i)))
                .collect::<ExprResult<Vec<_>>>()?;
            Ok(if node_type == "and" {
                Expr::and(decoded)
            } else {
                Expr::or(decoded)
            })
        }
        "not" => {
            check_keys(obj, NOT_KEYS, path)?;
            let child = required(obj, "child", path)?;
            Ok(Expr::not(decode_expr(child, &format!("{}.child", path))?))
        }
        other => Err(ExprError::malformed(
            path,
            format!("unknown node type '{}'", other),
        )),
    }
}

fn decode_atom(obj: &Map<String, Value>, path: &str) -> ExprResult<Atom> {
    // Any string is a field name; the checker rejects unknown ones.
    let field = required_str(obj, "field", path)?;
    let op_name = required_str(obj, "operator", path)?;
    let operator = Operator::parse(op_name)
        .ok_or_else(|| ExprError::malformed(path, format!("unknown operator '{}'", op_name)))?;
    let negated = match obj.get("negated") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(ExprError::malformed(path, "'negated' must be a boolean")),
    };

    let value_path = format!("{}.value", path);
    let value_obj = as_object(required(obj, "value", path)?, &value_path)?;
    let value = decode_value(operator, value_obj, &value_path)?;

    Ok(Atom::new(field, value).with_negated(negated))
}

fn decode_value(
    operator: Operator,
    obj: &Map<String, Value>,
    path: &str,
) -> ExprResult<AtomValue> {
    let allowed = match operator {
        Operator::Term => TERM_KEYS,
        Operator::In => IN_KEYS,
        Operator::Range => RANGE_KEYS,
        Operator::Exists => EXISTS_KEYS,
        Operator::Token => TOKEN_KEYS,
    };
    if let Some(key) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ExprError::malformed(
            path,
            format!(
                "value type mismatch: key '{}' is not part of a {} value",
                key, operator
            ),
        ));
    }

    match operator {
        Operator::Term => {
            let text = required_str(obj, "text", path)?;
            let match_name = required_str(obj, "match_type", path)?;
            let match_type = MatchType::parse(match_name).ok_or_else(|| {
                ExprError::malformed(path, format!("unknown match_type '{}'", match_name))
            })?;
            let case_name = required_str(obj, "case_sensitivity", path)?;
            let case_sensitivity = CaseSensitivity::parse(case_name).ok_or_else(|| {
                ExprError::malformed(path, format!("unknown case_sensitivity '{}'", case_name))
            })?;
            Ok(AtomValue::Term(TermValue {
                text: text.to_string(),
                match_type,
                case_sensitivity,
            }))
        }
        Operator::In => {
            let items = required(obj, "values", path)?
                .as_array()
                .ok_or_else(|| ExprError::malformed(path, "'values' must be an array"))?;
            let values = items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        ExprError::malformed(
                            format!("{}.values[{}]", path, i),
                            "IN values must be strings",
                        )
                    })
                })
                .collect::<ExprResult<Vec<_>>>()?;
            Ok(AtomValue::In(InValue {
                values,
                case_sensitive: required_bool(obj, "case_sensitive", path)?,
            }))
        }
        Operator::Range => {
            let kind_name = required_str(obj, "kind", path)?;
            let kind = RangeKind::parse(kind_name).ok_or_else(|| {
                ExprError::malformed(path, format!("unknown range kind '{}'", kind_name))
            })?;
            Ok(AtomValue::Range(RangeValue {
                kind,
                lower: decode_bound(obj, "lower", kind, path)?,
                upper: decode_bound(obj, "upper", kind, path)?,
                include_lower: required_bool(obj, "include_lower", path)?,
                include_upper: required_bool(obj, "include_upper", path)?,
            }))
        }
        Operator::Exists => Ok(AtomValue::Exists(ExistsValue::new(required_bool(
            obj, "expected", path,
        )?))),
        Operator::Token => Ok(AtomValue::Token(TokenValue::new(
            required_str(obj, "kind", path)?,
            required_str(obj, "value", path)?,
        ))),
    }
}

fn decode_bound(
    obj: &Map<String, Value>,
    key: &str,
    kind: RangeKind,
    path: &str,
) -> ExprResult<Option<RangeBound>> {
    let text = match obj.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.clone(),
        // Plain JSON numbers are accepted for NUMBER ranges and re-emitted canonically.
        Some(Value::Number(n)) if kind == RangeKind::Number => n.to_string(),
        Some(_) => {
            return Err(ExprError::malformed(
                path,
                format!("'{}' must be a string or null", key),
            ))
        }
    };
    RangeBound::parse(kind, &text)
        .map(Some)
        .map_err(|e| ExprError::malformed(format!("{}.{}", path, key), e.to_string()))
}

// =============================================================================
// Helpers
// =============================================================================

fn as_object<'a>(value: &'a Value, path: &str) -> ExprResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ExprError::malformed(path, "expected a JSON object"))
}

fn check_keys(obj: &Map<String, Value>, allowed: &[&str], path: &str) -> ExprResult<()> {
    match obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(ExprError::malformed(
            path,
            format!("unexpected key '{}'", key),
        )),
        None => Ok(()),
    }
}

fn required<'a>(obj: &'a Map<String, Value>, key: &str, path: &str) -> ExprResult<&'a Value> {
    match obj.get(key) {
        Some(Value::Null) | None => Err(ExprError::malformed(
            path,
            format!("missing required field '{}'", key),
        )),
        Some(value) => Ok(value),
    }
}

fn required_str<'a>(obj: &'a Map<String, Value>, key: &str, path: &str) -> ExprResult<&'a str> {
    required(obj, key, path)?
        .as_str()
        .ok_or_else(|| ExprError::malformed(path, format!("'{}' must be a string", key)))
}

fn required_bool(obj: &Map<String, Value>, key: &str, path: &str) -> ExprResult<bool> {
    required(obj, key, path)?
        .as_bool()
        .ok_or_else(|| ExprError::malformed(path, format!("'{}' must be a boolean", key)))
}
