//! `fillTemplate` rendering: `{{placeholder}}` scanning and substitution.

use serde_json::Value;

use crate::error::ExprError;
use crate::expr::Expr;

use super::visitor::{self, Ctx, Rendered};
use super::MarkerStyle;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Chunk<'a> {
    Text(&'a str),
    /// `name` is the trimmed placeholder, `raw` the original `{{ ... }}` text.
    Placeholder { name: &'a str, raw: &'a str },
}

fn split(template: &str) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let mut remaining = template;

    while let Some(start) = remaining.find("{{") {
        if start > 0 {
            chunks.push(Chunk::Text(&remaining[..start]));
        }

        let after_open = &remaining[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                chunks.push(Chunk::Placeholder {
                    name: after_open[..end].trim(),
                    raw: &remaining[start..start + 2 + end + 2],
                });
                remaining = &after_open[end + 2..];
            }
            None => {
                // Unterminated marker: the rest is text.
                chunks.push(Chunk::Text(&remaining[start..]));
                return chunks;
            }
        }
    }

    if !remaining.is_empty() {
        chunks.push(Chunk::Text(remaining));
    }
    chunks
}

fn lookup<'e>(replacements: &'e [(String, Expr)], name: &str) -> Option<&'e Expr> {
    replacements
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, expr)| expr)
}

/// Whether the template expands to more than one concatenated chunk.
pub(crate) fn is_joined(template: &str) -> bool {
    split(template).len() > 1
}

/// Substitute every placeholder with the fully marker-wrapped rendering of
/// its replacement. Placeholders without a replacement are kept verbatim.
pub(crate) fn fill(template: &str, replacements: &[(String, Expr)]) -> Result<String, ExprError> {
    let mut out = String::with_capacity(template.len());
    for chunk in split(template) {
        match chunk {
            Chunk::Text(text) => out.push_str(text),
            Chunk::Placeholder { name, raw } => match lookup(replacements, name) {
                Some(expr) => out.push_str(&super::render(expr, MarkerStyle::Outer)?),
                None => {
                    tracing::warn!(placeholder = name, "no replacement for template placeholder");
                    out.push_str(raw);
                }
            },
        }
    }
    Ok(out)
}

/// Expand a template used inside a larger expression into a concatenation of
/// quoted text chunks and replacement sub-expressions.
pub(crate) fn expand(
    template: &str,
    replacements: &[(String, Expr)],
    ctx: Ctx,
) -> Result<Rendered, ExprError> {
    let mut parts = Vec::new();
    let mut compound = false;
    for chunk in split(template) {
        match chunk {
            Chunk::Text(text) => parts.push(visitor::quote(text)),
            Chunk::Placeholder { name, raw } => match lookup(replacements, name) {
                // Non-string scalars are spliced as their text so the
                // concatenation stays string-typed.
                Some(Expr::Literal { value }) if !value.is_string() => {
                    parts.push(visitor::quote(&scalar_text(value)?));
                }
                Some(expr) => {
                    parts.push(visitor::operand(expr, ctx)?);
                    compound = true;
                }
                None => parts.push(visitor::quote(raw)),
            },
        }
    }
    let body = match parts.len() {
        0 => visitor::quote(""),
        1 if !compound => parts.remove(0),
        _ => {
            compound = true;
            parts.join(" + ")
        }
    };
    Ok(Rendered { body, compound })
}

fn scalar_text(value: &Value) -> Result<String, ExprError> {
    Ok(match value {
        Value::Number(n) => visitor::format_number(n),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => serde_json::to_string(other)?,
    })
}
