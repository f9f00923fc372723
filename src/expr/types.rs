//! Expression IR type definitions.
//!
//! Every value a workflow author can compute (a literal, a parameter read, an
//! arithmetic result, a sprig call...) is an `Expr` tree. Trees are built
//! bottom-up through the constructors in `expr::build`, never mutated, and
//! consumed once by the renderer when the manifest is assembled.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExprError;

// =============================================================================
// COMPLEXITY
// =============================================================================

/// Whether a rendered value is a bare reference/literal or needs Argo's
/// expression evaluator (`{{=...}}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    /// Literal or direct reference, rendered as `{{path}}` or bare text.
    Plain,
    /// Needs evaluation as an expression.
    Compound,
}

impl Complexity {
    /// Compound if any input is Compound, else Plain.
    pub fn widen(items: impl IntoIterator<Item = Complexity>) -> Complexity {
        items
            .into_iter()
            .fold(Complexity::Plain, |acc, c| match (acc, c) {
                (Complexity::Plain, Complexity::Plain) => Complexity::Plain,
                _ => Complexity::Compound,
            })
    }

    pub fn is_compound(self) -> bool {
        self == Complexity::Compound
    }
}

// =============================================================================
// REFERENCE DESCRIPTORS
// =============================================================================

/// Where a parameter reference reads its value from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum ParameterSource {
    /// `workflow.parameters.<name>`
    Workflow { name: String },
    /// `inputs.parameters.<name>`
    Input { name: String },
    /// `steps.<step>.outputs.parameters.<name>`
    StepOutput { step: String, name: String },
    /// `tasks.<task>.outputs.parameters.<name>`
    TaskOutput { task: String, name: String },
}

impl ParameterSource {
    /// Fully-qualified dotted path Argo resolves for this source.
    pub fn path(&self) -> String {
        match self {
            ParameterSource::Workflow { name } => format!("workflow.parameters.{}", name),
            ParameterSource::Input { name } => format!("inputs.parameters.{}", name),
            ParameterSource::StepOutput { step, name } => {
                format!("steps.{}.outputs.parameters.{}", step, name)
            }
            ParameterSource::TaskOutput { task, name } => {
                format!("tasks.{}.outputs.parameters.{}", task, name)
            }
        }
    }
}

/// Which sibling collection a task/step metadata reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeScope {
    Tasks,
    Steps,
}

impl NodeScope {
    pub fn prefix(self) -> &'static str {
        match self {
            NodeScope::Tasks => "tasks",
            NodeScope::Steps => "steps",
        }
    }
}

/// Declared shape of a parameter's value. Aggregates cross string boundaries
/// as JSON text and must be decoded on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    Scalar,
    Aggregate,
}

// =============================================================================
// OPERATORS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl ComparisonOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Gt => ">",
            ComparisonOp::Le => "<=",
            ComparisonOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Or,
    And,
    In,
}

impl InfixOp {
    pub fn symbol(self) -> &'static str {
        match self {
            InfixOp::Add => "+",
            InfixOp::Sub => "-",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::Mod => "%",
            InfixOp::Or => "||",
            InfixOp::And => "&&",
            InfixOp::In => "in",
        }
    }
}

// =============================================================================
// EXPRESSION NODES
// =============================================================================

/// One node of the expression IR. The serialized form carries the variant
/// name in a `kind` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// A primitive or JSON-compatible structure.
    Literal { value: Value },
    /// Type-level coercion to string; renders its inner expression unchanged.
    AsString { inner: Box<Expr> },
    /// String concatenation, optionally interleaving a separator.
    Concat {
        parts: Vec<Expr>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        separator: Option<String>,
    },
    Ternary {
        condition: Box<Expr>,
        when_true: Box<Expr>,
        when_false: Box<Expr>,
    },
    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Infix {
        op: InfixOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not { inner: Box<Expr> },
    /// Record field access: `source['key']`.
    Get { source: Box<Expr>, key: String },
    /// JSON-path select over a JSON string: `jsonpath(source, '$.path')`.
    Path { source: Box<Expr>, path: String },
    ArrayIndex { array: Box<Expr>, index: Box<Expr> },
    ArrayMake { items: Vec<Expr> },
    /// Ordered key/value pairs, rendered through `sprig.dict`.
    DictMake { entries: Vec<(String, Expr)> },
    Parameter { source: ParameterSource },
    /// Task/step metadata such as `tasks.<name>.status`.
    TaskData {
        scope: NodeScope,
        name: String,
        key: String,
    },
    /// Workflow built-in such as `workflow.name`.
    WorkflowValue { variable: String },
    /// The current `withItems`/`withParam` element.
    LoopItem,
    /// Argo built-in or sprig call (`sprig.trim`, `asInt`, `toJSON`...).
    Function { name: String, args: Vec<Expr> },
    /// Text containing `{{placeholder}}` markers and their replacements.
    #[serde(rename = "fillTemplate")]
    FillTemplate {
        template: String,
        replacements: Vec<(String, Expr)>,
    },
    /// Outermost directive asking for the host document's quotes around the
    /// rendered value to be removed.
    StripQuotes { inner: Box<Expr> },
}

pub(crate) const TO_JSON: &str = "toJSON";
pub(crate) const FROM_JSON: &str = "fromJSON";

impl Expr {
    /// Every tag `kind` may carry in the serialized form.
    pub const KINDS: &'static [&'static str] = &[
        "literal",
        "as_string",
        "concat",
        "ternary",
        "comparison",
        "infix",
        "not",
        "get",
        "path",
        "array_index",
        "array_make",
        "dict_make",
        "parameter",
        "task_data",
        "workflow_value",
        "loop_item",
        "function",
        "fillTemplate",
        "strip_quotes",
    ];

    /// The serialized tag of this node.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Literal { .. } => "literal",
            Expr::AsString { .. } => "as_string",
            Expr::Concat { .. } => "concat",
            Expr::Ternary { .. } => "ternary",
            Expr::Comparison { .. } => "comparison",
            Expr::Infix { .. } => "infix",
            Expr::Not { .. } => "not",
            Expr::Get { .. } => "get",
            Expr::Path { .. } => "path",
            Expr::ArrayIndex { .. } => "array_index",
            Expr::ArrayMake { .. } => "array_make",
            Expr::DictMake { .. } => "dict_make",
            Expr::Parameter { .. } => "parameter",
            Expr::TaskData { .. } => "task_data",
            Expr::WorkflowValue { .. } => "workflow_value",
            Expr::LoopItem => "loop_item",
            Expr::Function { .. } => "function",
            Expr::FillTemplate { .. } => "fillTemplate",
            Expr::StripQuotes { .. } => "strip_quotes",
        }
    }

    /// Decode a node from its JSON form. An unknown `kind` anywhere in the
    /// tree is reported as `UnsupportedKind`; any other decoding failure as
    /// `Malformed`.
    pub fn from_value(value: Value) -> Result<Expr, ExprError> {
        if let Some(kind) = unsupported_kind(&value) {
            return Err(ExprError::UnsupportedKind(kind.to_string()));
        }
        serde_json::from_value(value).map_err(|e| ExprError::Malformed(e.to_string()))
    }

    /// Classification of this node, derived from its structure.
    pub fn complexity(&self) -> Complexity {
        match self {
            Expr::Literal { .. }
            | Expr::Parameter { .. }
            | Expr::TaskData { .. }
            | Expr::WorkflowValue { .. }
            | Expr::LoopItem
            | Expr::FillTemplate { .. } => Complexity::Plain,
            Expr::AsString { inner } | Expr::StripQuotes { inner } => inner.complexity(),
            Expr::Concat { parts, separator } => match (parts.as_slice(), separator) {
                ([], _) => Complexity::Plain,
                ([only], None) => Complexity::widen([only.complexity()]),
                _ => Complexity::Compound,
            },
            Expr::Function { .. } => match self.json_passthrough() {
                Some(target) => target.complexity(),
                None => Complexity::Compound,
            },
            _ => Complexity::Compound,
        }
    }

    /// True for the always-Plain reference variants.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Expr::Parameter { .. }
                | Expr::TaskData { .. }
                | Expr::WorkflowValue { .. }
                | Expr::LoopItem
        )
    }

    /// True for nodes that render as `left OP right` and need parentheses
    /// when used as an operand.
    pub(crate) fn is_binary(&self) -> bool {
        matches!(self, Expr::Comparison { .. } | Expr::Infix { .. })
    }

    /// Strip any `as_string` wrappers.
    pub(crate) fn peel_as_string(&self) -> &Expr {
        match self {
            Expr::AsString { inner } => inner.peel_as_string(),
            other => other,
        }
    }

    /// The node a `toJSON` call collapses to, if any: `toJSON(ref)` is the
    /// reference itself (parameter values are already JSON text), and
    /// `toJSON(fromJSON(x))` is `x`.
    pub(crate) fn json_passthrough(&self) -> Option<&Expr> {
        let Expr::Function { name, args } = self else {
            return None;
        };
        if name != TO_JSON || args.len() != 1 {
            return None;
        }
        let arg = args[0].peel_as_string();
        if arg.is_reference() {
            return Some(arg);
        }
        match arg {
            Expr::Function { name, args } if name == FROM_JSON && args.len() == 1 => {
                Some(&args[0])
            }
            _ => None,
        }
    }

    /// `toJSON(fromJSON(x)['key'])`: one field of JSON text, re-encoded.
    /// Returns `x` and `key`.
    pub(crate) fn json_field_read(&self) -> Option<(&Expr, &str)> {
        let Expr::Function { name, args } = self else {
            return None;
        };
        if name != TO_JSON || args.len() != 1 {
            return None;
        }
        let Expr::Get { source, key } = args[0].peel_as_string() else {
            return None;
        };
        match source.peel_as_string() {
            Expr::Function { name, args } if name == FROM_JSON && args.len() == 1 => {
                Some((&args[0], key.as_str()))
            }
            _ => None,
        }
    }

    /// Direct children, in rendering order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal { .. }
            | Expr::Parameter { .. }
            | Expr::TaskData { .. }
            | Expr::WorkflowValue { .. }
            | Expr::LoopItem => vec![],
            Expr::AsString { inner } | Expr::Not { inner } | Expr::StripQuotes { inner } => {
                vec![inner.as_ref()]
            }
            Expr::Concat { parts, .. } => parts.iter().collect(),
            Expr::Ternary {
                condition,
                when_true,
                when_false,
            } => vec![condition.as_ref(), when_true.as_ref(), when_false.as_ref()],
            Expr::Comparison { left, right, .. } | Expr::Infix { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
            Expr::Get { source, .. } | Expr::Path { source, .. } => vec![source.as_ref()],
            Expr::ArrayIndex { array, index } => vec![array.as_ref(), index.as_ref()],
            Expr::ArrayMake { items } => items.iter().collect(),
            Expr::DictMake { entries } => entries.iter().map(|(_, v)| v).collect(),
            Expr::Function { args, .. } => args.iter().collect(),
            Expr::FillTemplate { replacements, .. } => {
                replacements.iter().map(|(_, v)| v).collect()
            }
        }
    }

    /// Every reference node in this tree, depth-first.
    pub fn references(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        collect_references(self, &mut out);
        out
    }
}

/// First unknown `kind` tag in expression position. Literal payloads are
/// data and are not searched; objects without a tag (parameter sources) hold
/// no nodes.
fn unsupported_kind(value: &Value) -> Option<&str> {
    match value {
        Value::Object(node) => match node.get("kind").and_then(Value::as_str) {
            Some(kind) if !Expr::KINDS.contains(&kind) => Some(kind),
            Some("literal") | None => None,
            Some(_) => node
                .iter()
                .filter(|(field, _)| field.as_str() != "kind")
                .find_map(|(_, child)| unsupported_kind(child)),
        },
        // Child lists and `[key, node]` pairs.
        Value::Array(items) => items.iter().find_map(unsupported_kind),
        _ => None,
    }
}

fn collect_references<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    if expr.is_reference() {
        out.push(expr);
        return;
    }
    for child in expr.children() {
        collect_references(child, out);
    }
}
