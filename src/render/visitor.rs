//! Recursive Expr visitor producing body text and a compound flag.

use serde_json::Value;

use crate::error::ExprError;
use crate::expr::types::FROM_JSON;
use crate::expr::Expr;

use super::template;

/// Rendered body of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub body: String,
    /// Whether the body needs Argo's expression evaluator.
    pub compound: bool,
}

impl Rendered {
    fn plain(body: String) -> Self {
        Rendered {
            body,
            compound: false,
        }
    }

    fn compound(body: String) -> Self {
        Rendered {
            body,
            compound: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Ctx {
    /// Wrap references in `{{...}}`.
    identifiers: bool,
    /// Inside a larger expression: string literals are quoted tokens.
    nested: bool,
    /// Rendering an output `valueFrom.expression`.
    output: bool,
}

impl Ctx {
    pub(crate) fn top(identifiers: bool, output: bool) -> Self {
        Ctx {
            identifiers,
            nested: false,
            output,
        }
    }

    fn inner(self) -> Self {
        Ctx {
            nested: true,
            ..self
        }
    }
}

pub(crate) fn visit(expr: &Expr, ctx: Ctx) -> Result<Rendered, ExprError> {
    match expr {
        Expr::Literal { value } => Ok(Rendered::plain(literal(value, ctx.nested)?)),

        Expr::AsString { inner } | Expr::StripQuotes { inner } => visit(inner, ctx),

        Expr::Concat { parts, separator } => concat(parts, separator.as_deref(), ctx),

        Expr::Ternary {
            condition,
            when_true,
            when_false,
        } => {
            let c = visit(condition, ctx.inner())?;
            let t = visit(when_true, ctx.inner())?;
            let f = visit(when_false, ctx.inner())?;
            Ok(Rendered::compound(format!(
                "(({}) ? ({}) : ({}))",
                c.body, t.body, f.body
            )))
        }

        Expr::Comparison { op, left, right } => binary(op.symbol(), left, right, ctx),
        Expr::Infix { op, left, right } => binary(op.symbol(), left, right, ctx),

        Expr::Not { inner } => {
            let r = visit(inner, ctx.inner())?;
            Ok(Rendered::compound(format!("!({})", r.body)))
        }

        Expr::Get { source, key } => {
            let src = operand(source, ctx)?;
            Ok(Rendered::compound(format!("{}[{}]", src, quote(key))))
        }

        Expr::Path { source, path } => {
            let src = visit(source, ctx.inner())?;
            Ok(Rendered::compound(format!(
                "jsonpath({}, {})",
                src.body,
                quote(&json_path(path))
            )))
        }

        Expr::ArrayIndex { array, index } => {
            let arr = operand(array, ctx)?;
            let idx = visit(index, ctx.inner())?;
            Ok(Rendered::compound(format!("{}[{}]", arr, idx.body)))
        }

        Expr::ArrayMake { items } => {
            let rendered = items
                .iter()
                .map(|e| visit(e, ctx.inner()).map(|r| r.body))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Rendered::compound(format!("[{}]", rendered.join(", "))))
        }

        Expr::DictMake { entries } => {
            let mut args = Vec::with_capacity(entries.len() * 2);
            for (key, value) in entries {
                args.push(quote(key));
                args.push(visit(value, ctx.inner())?.body);
            }
            Ok(Rendered::compound(format!("sprig.dict({})", args.join(", "))))
        }

        Expr::Parameter { source } => Ok(reference(source.path(), ctx)),
        Expr::TaskData { scope, name, key } => Ok(reference(
            format!("{}.{}.{}", scope.prefix(), name, key),
            ctx,
        )),
        Expr::WorkflowValue { variable } => Ok(reference(format!("workflow.{}", variable), ctx)),
        Expr::LoopItem => Ok(reference("item".to_string(), ctx)),

        Expr::Function { name, args } => function(expr, name, args, ctx),

        Expr::FillTemplate {
            template,
            replacements,
        } => {
            // Without identifier markers there is nothing to splice into
            // text, so the template becomes an expression too.
            if ctx.nested || !ctx.identifiers {
                template::expand(template, replacements, ctx.inner())
            } else {
                Ok(Rendered::plain(template::fill(template, replacements)?))
            }
        }
    }
}

fn literal(value: &Value, nested: bool) -> Result<String, ExprError> {
    Ok(match value {
        Value::String(s) if nested => quote(s),
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(n),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value)?,
    })
}

/// Integral floats print without a fractional part (`42`, never `42.0`).
pub(crate) fn format_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            format!("{}", f as i64)
        }
        _ => n.to_string(),
    }
}

/// Single-quoted string token in Argo's expression grammar.
pub(crate) fn quote(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t");
    format!("'{}'", escaped)
}

fn reference(path: String, ctx: Ctx) -> Rendered {
    if ctx.identifiers {
        Rendered::plain(format!("{{{{{}}}}}", path))
    } else {
        Rendered::plain(path)
    }
}

/// Render a child that sits in an operand or accessor position,
/// parenthesizing anything that renders as `left OP right`.
pub(crate) fn operand(expr: &Expr, ctx: Ctx) -> Result<String, ExprError> {
    let r = visit(expr, ctx.inner())?;
    if needs_parens(expr) {
        Ok(format!("({})", r.body))
    } else {
        Ok(r.body)
    }
}

/// Whether the nested rendering of `expr` is an unparenthesized binary
/// operator or `+`-joined sequence.
fn needs_parens(expr: &Expr) -> bool {
    match expr {
        Expr::AsString { inner } | Expr::StripQuotes { inner } => needs_parens(inner),
        Expr::Comparison { .. } | Expr::Infix { .. } => true,
        Expr::Concat { parts, separator } => match (parts.as_slice(), separator) {
            ([], _) => false,
            ([only], None) => needs_parens(only),
            // Rendered through `part`, which already wraps binary operators.
            ([only], Some(_)) => needs_parens(only) && !only.peel_as_string().is_binary(),
            _ => true,
        },
        Expr::FillTemplate { template, .. } => template::is_joined(template),
        Expr::Function { .. } => expr.json_passthrough().is_some_and(needs_parens),
        _ => false,
    }
}

/// A concatenation part. Concatenation is associative, so only binary
/// operators are wrapped.
fn part(expr: &Expr, ctx: Ctx) -> Result<String, ExprError> {
    let r = visit(expr, ctx.inner())?;
    if expr.peel_as_string().is_binary() {
        Ok(format!("({})", r.body))
    } else {
        Ok(r.body)
    }
}

fn binary(symbol: &str, left: &Expr, right: &Expr, ctx: Ctx) -> Result<Rendered, ExprError> {
    let l = operand(left, ctx)?;
    let r = operand(right, ctx)?;
    Ok(Rendered::compound(format!("{} {} {}", l, symbol, r)))
}

fn concat(parts: &[Expr], separator: Option<&str>, ctx: Ctx) -> Result<Rendered, ExprError> {
    match (parts, separator) {
        ([], _) => Ok(Rendered::plain(literal(
            &Value::String(String::new()),
            ctx.nested,
        )?)),
        ([only], None) => visit(only, ctx),
        _ => {
            let joiner = match separator {
                Some(sep) => format!(" + {} + ", quote(sep)),
                None => " + ".to_string(),
            };
            let rendered = parts
                .iter()
                .map(|p| part(p, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Rendered::compound(rendered.join(&joiner)))
        }
    }
}

fn function(expr: &Expr, name: &str, args: &[Expr], ctx: Ctx) -> Result<Rendered, ExprError> {
    if let Some(target) = expr.json_passthrough() {
        return visit(target, ctx);
    }
    if let Some((source, key)) = expr.json_field_read() {
        let src = visit(source, ctx.inner())?;
        return Ok(Rendered::compound(format!(
            "jsonpath({}, {})",
            src.body,
            quote(&field_path(key)?)
        )));
    }
    if ctx.output && !ctx.nested && name == FROM_JSON && args.len() == 1 {
        return visit(&args[0], ctx);
    }
    let rendered = args
        .iter()
        .map(|a| visit(a, ctx.inner()).map(|r| r.body))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Rendered::compound(format!("{}({})", name, rendered.join(", "))))
}

/// JSON path selecting one top-level field.
fn field_path(key: &str) -> Result<String, ExprError> {
    let mut chars = key.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        Ok(format!("$.{}", key))
    } else {
        Ok(format!("$[{}]", serde_json::to_string(key)?))
    }
}

/// Normalize a stored dotted/bracket path into `$.`-rooted JSON-path form.
fn json_path(path: &str) -> String {
    if path.starts_with('$') {
        path.to_string()
    } else if path.starts_with('[') {
        format!("${}", path)
    } else {
        format!("$.{}", path)
    }
}
