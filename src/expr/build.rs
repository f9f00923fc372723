//! Expression constructors.
//!
//! Combinators accept anything convertible into an `Expr`; plain Rust values
//! (`&str`, `String`, `i64`, `f64`, `bool`, `serde_json::Value`) become
//! literal nodes.

use serde_json::Value;

use super::types::*;

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::string(s)
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::string(s)
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::integer(n)
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Expr::number(n)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::boolean(b)
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::literal(v)
    }
}

fn boxed(e: impl Into<Expr>) -> Box<Expr> {
    Box::new(e.into())
}

// =============================================================================
// LITERALS
// =============================================================================

impl Expr {
    pub fn literal(value: Value) -> Self {
        Expr::Literal { value }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expr::Literal {
            value: Value::String(s.into()),
        }
    }

    pub fn integer(n: i64) -> Self {
        Expr::Literal { value: n.into() }
    }

    /// Non-finite numbers have no JSON form and become `null`.
    pub fn number(n: f64) -> Self {
        Expr::Literal {
            value: serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        }
    }

    pub fn boolean(b: bool) -> Self {
        Expr::Literal {
            value: Value::Bool(b),
        }
    }

    pub fn null() -> Self {
        Expr::Literal { value: Value::Null }
    }
}

// =============================================================================
// REFERENCES
// =============================================================================

impl Expr {
    pub fn parameter(source: ParameterSource) -> Self {
        Expr::Parameter { source }
    }

    pub fn workflow_param(name: impl Into<String>) -> Self {
        Expr::parameter(ParameterSource::Workflow { name: name.into() })
    }

    pub fn input(name: impl Into<String>) -> Self {
        Expr::parameter(ParameterSource::Input { name: name.into() })
    }

    pub fn step_output(step: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::parameter(ParameterSource::StepOutput {
            step: step.into(),
            name: name.into(),
        })
    }

    pub fn task_output(task: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::parameter(ParameterSource::TaskOutput {
            task: task.into(),
            name: name.into(),
        })
    }

    /// Read a parameter whose declared shape is known. Aggregate values are
    /// stored as JSON text, so the read is wrapped in `fromJSON`.
    pub fn read_parameter(source: ParameterSource, kind: ValueKind) -> Self {
        match kind {
            ValueKind::Scalar => Expr::parameter(source),
            ValueKind::Aggregate => Expr::from_json(Expr::parameter(source)),
        }
    }

    pub fn task_data(name: impl Into<String>, key: impl Into<String>) -> Self {
        Expr::TaskData {
            scope: NodeScope::Tasks,
            name: name.into(),
            key: key.into(),
        }
    }

    pub fn step_data(name: impl Into<String>, key: impl Into<String>) -> Self {
        Expr::TaskData {
            scope: NodeScope::Steps,
            name: name.into(),
            key: key.into(),
        }
    }

    pub fn workflow_value(variable: impl Into<String>) -> Self {
        Expr::WorkflowValue {
            variable: variable.into(),
        }
    }

    pub fn item() -> Self {
        Expr::LoopItem
    }
}

// =============================================================================
// OPERATORS
// =============================================================================

impl Expr {
    pub fn compare(op: ComparisonOp, left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::Comparison {
            op,
            left: boxed(left),
            right: boxed(right),
        }
    }

    pub fn equals(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::compare(ComparisonOp::Eq, left, right)
    }

    pub fn not_equals(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::compare(ComparisonOp::Ne, left, right)
    }

    pub fn less_than(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::compare(ComparisonOp::Lt, left, right)
    }

    pub fn greater_than(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::compare(ComparisonOp::Gt, left, right)
    }

    pub fn at_most(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::compare(ComparisonOp::Le, left, right)
    }

    pub fn at_least(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::compare(ComparisonOp::Ge, left, right)
    }

    pub fn infix(op: InfixOp, left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::Infix {
            op,
            left: boxed(left),
            right: boxed(right),
        }
    }

    pub fn add(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::infix(InfixOp::Add, left, right)
    }

    pub fn sub(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::infix(InfixOp::Sub, left, right)
    }

    pub fn mul(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::infix(InfixOp::Mul, left, right)
    }

    pub fn div(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::infix(InfixOp::Div, left, right)
    }

    pub fn rem(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::infix(InfixOp::Mod, left, right)
    }

    pub fn and(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::infix(InfixOp::And, left, right)
    }

    pub fn or(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Expr::infix(InfixOp::Or, left, right)
    }

    /// `needle in haystack`
    pub fn contained_in(needle: impl Into<Expr>, haystack: impl Into<Expr>) -> Self {
        Expr::infix(InfixOp::In, needle, haystack)
    }

    pub fn not(inner: impl Into<Expr>) -> Self {
        Expr::Not {
            inner: boxed(inner),
        }
    }

    pub fn ternary(
        condition: impl Into<Expr>,
        when_true: impl Into<Expr>,
        when_false: impl Into<Expr>,
    ) -> Self {
        Expr::Ternary {
            condition: boxed(condition),
            when_true: boxed(when_true),
            when_false: boxed(when_false),
        }
    }
}

// =============================================================================
// STRINGS, RECORDS, ARRAYS
// =============================================================================

impl Expr {
    pub fn concat<I, E>(parts: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::Concat {
            parts: parts.into_iter().map(Into::into).collect(),
            separator: None,
        }
    }

    pub fn concat_with<I, E>(separator: impl Into<String>, parts: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::Concat {
            parts: parts.into_iter().map(Into::into).collect(),
            separator: Some(separator.into()),
        }
    }

    pub fn as_string(inner: impl Into<Expr>) -> Self {
        Expr::AsString {
            inner: boxed(inner),
        }
    }

    pub fn get(source: impl Into<Expr>, key: impl Into<String>) -> Self {
        Expr::Get {
            source: boxed(source),
            key: key.into(),
        }
    }

    /// Select `path` (dotted/bracket form, `$.` prefix optional) out of a
    /// JSON string.
    pub fn json_path(source: impl Into<Expr>, path: impl Into<String>) -> Self {
        Expr::Path {
            source: boxed(source),
            path: path.into(),
        }
    }

    pub fn index(array: impl Into<Expr>, index: impl Into<Expr>) -> Self {
        Expr::ArrayIndex {
            array: boxed(array),
            index: boxed(index),
        }
    }

    pub fn array<I, E>(items: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::ArrayMake {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn dict<I, K, E>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, E)>,
        K: Into<String>,
        E: Into<Expr>,
    {
        Expr::DictMake {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// =============================================================================
// FUNCTIONS & DIRECTIVES
// =============================================================================

impl Expr {
    pub fn call<I, E>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::Function {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Call into the sprig library: `sprig.<name>(...)`.
    pub fn sprig<I, E>(name: &str, args: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::call(format!("sprig.{}", name), args)
    }

    /// Encode a value as JSON text.
    pub fn to_json(inner: impl Into<Expr>) -> Self {
        Expr::call(TO_JSON, [inner.into()])
    }

    /// Decode JSON text into a value.
    pub fn from_json(inner: impl Into<Expr>) -> Self {
        Expr::call(FROM_JSON, [inner.into()])
    }

    pub fn fill_template<I, K, E>(template: impl Into<String>, replacements: I) -> Self
    where
        I: IntoIterator<Item = (K, E)>,
        K: Into<String>,
        E: Into<Expr>,
    {
        Expr::FillTemplate {
            template: template.into(),
            replacements: replacements
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn strip_quotes(inner: impl Into<Expr>) -> Self {
        Expr::StripQuotes {
            inner: boxed(inner),
        }
    }
}
