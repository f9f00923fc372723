//! Structured parameter values and string-boundary encoding.
//!
//! A `ParamValue` is a JSON-shaped value whose leaves may be expressions. In
//! the JSON wire form an embedded expression is an object with the single key
//! `$expr`. Values cross Argo's string-typed boundaries (workflow parameters,
//! template inputs, task arguments) through `to_boundary`: aggregates become
//! JSON text, scalars stay native.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::ExprError;
use crate::expr::{Expr, ValueKind};
use crate::render::{self, strip_quote_sentinels, MarkerStyle};

/// Object key that marks an embedded expression in the wire form.
pub const EXPR_KEY: &str = "$expr";

/// How strictly unexpected shapes are treated while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueContext {
    /// Shape violations are fatal.
    Strict,
    /// Output arguments keep an unexpected object as a plain object.
    OutputArgument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum ParamValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<ParamValue>),
    Object(BTreeMap<String, ParamValue>),
    Expr(Expr),
}

impl TryFrom<Value> for ParamValue {
    type Error = ExprError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        ParamValue::from_json(value, ValueContext::Strict)
    }
}

impl From<ParamValue> for Value {
    fn from(value: ParamValue) -> Self {
        value.to_wire()
    }
}

impl From<Expr> for ParamValue {
    fn from(e: Expr) -> Self {
        ParamValue::Expr(e)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Number(n.into())
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl ParamValue {
    /// Wrap a JSON value with no embedded expressions. `$`-prefixed keys are
    /// ordinary keys here.
    pub fn literal(value: Value) -> Self {
        match value {
            Value::Null => ParamValue::Null,
            Value::Bool(b) => ParamValue::Bool(b),
            Value::Number(n) => ParamValue::Number(n),
            Value::String(s) => ParamValue::String(s),
            Value::Array(items) => {
                ParamValue::Array(items.into_iter().map(ParamValue::literal).collect())
            }
            Value::Object(map) => ParamValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, ParamValue::literal(v)))
                    .collect(),
            ),
        }
    }

    /// Decode the wire form, turning `{"$expr": ...}` objects into
    /// expressions.
    pub fn from_json(value: Value, context: ValueContext) -> Result<Self, ExprError> {
        decode(value, context, "$")
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, ParamValue::Array(_) | ParamValue::Object(_))
    }

    /// Replace every embedded expression with its marker-wrapped rendering,
    /// keeping the surrounding shape.
    pub fn render(&self) -> Result<Value, ExprError> {
        Ok(match self {
            ParamValue::Null => Value::Null,
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::Number(n) => Value::Number(n.clone()),
            ParamValue::String(s) => Value::String(s.clone()),
            ParamValue::Array(items) => Value::Array(
                items
                    .iter()
                    .map(ParamValue::render)
                    .collect::<Result<_, _>>()?,
            ),
            ParamValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), v.render()?)))
                    .collect::<Result<_, ExprError>>()?,
            ),
            ParamValue::Expr(e) => Value::String(render::render(e, MarkerStyle::Outer)?),
        })
    }

    /// Encode for a string-typed boundary: aggregates become JSON text,
    /// expressions their rendered text, scalars stay native. The JSON text is
    /// parsed again downstream, so `strip_quotes` directives inside it are
    /// applied here.
    pub fn to_boundary(&self) -> Result<Value, ExprError> {
        if self.is_aggregate() {
            let encoded = Serialized::encode(&self.render()?)?;
            return Ok(Value::String(strip_quote_sentinels(encoded.text())));
        }
        self.render()
    }

    /// Boundary encoding for a value declared as `kind`. An expression
    /// declared aggregate is serialized with `toJSON`, which collapses to the
    /// bare reference when it already reads JSON text.
    pub fn to_boundary_as(&self, kind: ValueKind) -> Result<Value, ExprError> {
        match (self, kind) {
            (ParamValue::Expr(e), ValueKind::Aggregate) => {
                let encoded = Expr::to_json(e.clone());
                Ok(Value::String(render::render(&encoded, MarkerStyle::Outer)?))
            }
            _ => self.to_boundary(),
        }
    }

    /// The JSON wire form, expressions as `{"$expr": ...}`.
    pub fn to_wire(&self) -> Value {
        match self {
            ParamValue::Null => Value::Null,
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::Number(n) => Value::Number(n.clone()),
            ParamValue::String(s) => Value::String(s.clone()),
            ParamValue::Array(items) => Value::Array(items.iter().map(ParamValue::to_wire).collect()),
            ParamValue::Object(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_wire())).collect(),
            ),
            ParamValue::Expr(e) => {
                // `Expr` serializes to objects with string keys and `Value`
                // payloads only, so `to_value` has no failing path here.
                let encoded = serde_json::to_value(e).unwrap_or(Value::Null);
                let mut wrapper = serde_json::Map::new();
                wrapper.insert(EXPR_KEY.to_string(), encoded);
                Value::Object(wrapper)
            }
        }
    }

    /// Every embedded expression, depth-first.
    pub fn expressions(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        collect_expressions(self, &mut out);
        out
    }
}

fn collect_expressions<'a>(value: &'a ParamValue, out: &mut Vec<&'a Expr>) {
    match value {
        ParamValue::Expr(e) => out.push(e),
        ParamValue::Array(items) => items.iter().for_each(|v| collect_expressions(v, out)),
        ParamValue::Object(map) => map.values().for_each(|v| collect_expressions(v, out)),
        _ => {}
    }
}

fn decode(value: Value, context: ValueContext, path: &str) -> Result<ParamValue, ExprError> {
    match value {
        Value::Array(items) => Ok(ParamValue::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| decode(v, context, &format!("{}[{}]", path, i)))
                .collect::<Result<_, _>>()?,
        )),
        Value::Object(mut map) => {
            let violation = if map.contains_key(EXPR_KEY) {
                if map.len() == 1 {
                    let inner = map.remove(EXPR_KEY).unwrap_or(Value::Null);
                    return Expr::from_value(inner).map(ParamValue::Expr);
                }
                Some(format!("`{}` mixed with other keys", EXPR_KEY))
            } else {
                map.keys()
                    .find(|k| k.starts_with('$'))
                    .map(|k| format!("unknown directive key '{}'", k))
            };

            if let Some(detail) = violation {
                if context == ValueContext::Strict {
                    return Err(ExprError::ShapeViolation {
                        path: path.to_string(),
                        detail,
                    });
                }
                tracing::warn!(path, %detail, "keeping unexpected output argument shape as a plain object");
            }

            Ok(ParamValue::Object(
                map.into_iter()
                    .map(|(k, v)| {
                        let child = format!("{}.{}", path, k);
                        decode(v, context, &child).map(|d| (k, d))
                    })
                    .collect::<Result<_, _>>()?,
            ))
        }
        primitive => Ok(ParamValue::literal(primitive)),
    }
}

// =============================================================================
// SERIALIZED VALUES
// =============================================================================

/// A value encoded as JSON text for a string-typed boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Serialized {
    text: String,
}

impl Serialized {
    pub fn encode(value: &Value) -> Result<Self, ExprError> {
        Ok(Serialized {
            text: serde_json::to_string(value)?,
        })
    }

    /// Wrap text read back from a boundary.
    pub fn from_text(text: impl Into<String>) -> Self {
        Serialized { text: text.into() }
    }

    pub fn decode(&self) -> Result<Value, ExprError> {
        Ok(serde_json::from_str(&self.text)?)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
