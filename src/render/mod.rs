//! Expr → Argo template/expression text.
//!
//! Public API: `render(expr, style)`, `render_output(expr)` and the
//! quote-sentinel passes `strip_quote_sentinels` and `drop_quote_sentinels`.

mod quotes;
mod template;
mod visitor;

use serde::{Deserialize, Serialize};

use crate::error::ExprError;
use crate::expr::Expr;

pub use quotes::{
    drop_quote_sentinels, strip_quote_sentinels, STRIP_QUOTES_BEGIN, STRIP_QUOTES_END,
};
pub use visitor::Rendered;

use visitor::Ctx;

/// How the outermost rendered text is delimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerStyle {
    /// `{{path}}` for plain references, `{{=expr}}` for compound bodies,
    /// bare text for literals.
    #[default]
    Outer,
    /// References get `{{path}}` wherever they appear; the whole body is not
    /// wrapped. For fields Argo already evaluates, such as `when`.
    IdentifierOnly,
    /// No markers at all.
    None,
}

/// Render `expr` as it should appear in a manifest field.
pub fn render(expr: &Expr, style: MarkerStyle) -> Result<String, ExprError> {
    render_top(expr, style, false)
}

/// Render the body of an output parameter's `valueFrom.expression`. Argo
/// evaluates that field without markers and decodes a JSON parameter read
/// at its top level, so an outermost `fromJSON` is elided.
pub fn render_output(expr: &Expr) -> Result<String, ExprError> {
    render_top(expr, MarkerStyle::None, true)
}

fn render_top(expr: &Expr, style: MarkerStyle, output: bool) -> Result<String, ExprError> {
    tracing::debug!(kind = expr.kind(), ?style, "rendering expression");

    match expr {
        Expr::FillTemplate {
            template,
            replacements,
        } if style != MarkerStyle::None => return template::fill(template, replacements),
        Expr::StripQuotes { inner } => {
            let text = render_top(inner, style, output)?;
            return Ok(quotes::wrap(&text));
        }
        _ => {}
    }

    let rendered = match style {
        MarkerStyle::Outer => {
            let ctx = Ctx::top(!expr.complexity().is_compound(), output);
            let r = visitor::visit(expr, ctx)?;
            if r.compound {
                return Ok(format!("{{{{={}}}}}", r.body));
            }
            r
        }
        MarkerStyle::IdentifierOnly => visitor::visit(expr, Ctx::top(true, output))?,
        MarkerStyle::None => visitor::visit(expr, Ctx::top(false, output))?,
    };
    Ok(rendered.body)
}

/// Render into body text plus compound flag without any top-level markers.
pub fn render_parts(expr: &Expr, identifier_markers: bool) -> Result<Rendered, ExprError> {
    visitor::visit(expr, Ctx::top(identifier_markers, false))
}
