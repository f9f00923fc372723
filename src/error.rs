//! Error types shared by every phase.
//!
//! `ExprError` covers defects raised while decoding or rendering expressions.
//! `CompilerError` is the unified, phase-tagged form returned by the
//! top-level pipeline and surfaced through the WASM entry points.

use crate::manifest::validate::ValidationError;

/// Defects raised by the expression core. All of them are fatal to manifest
/// generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    /// A node tag the renderer does not know how to emit.
    #[error("unsupported expression kind '{0}'")]
    UnsupportedKind(String),

    /// A node with a known tag whose payload failed to decode.
    #[error("malformed expression: {0}")]
    Malformed(String),

    /// A value that is neither primitive, array, plain object nor expression.
    #[error("value at '{path}' is not a primitive, array, plain object or expression: {detail}")]
    ShapeViolation { path: String, detail: String },

    /// A parameter default with neither (or both) an inline value and an
    /// external source.
    #[error("parameter default for '{0}' must set exactly one of `value` or `configMapKeyRef`")]
    MalformedDefault(String),

    #[error("json encoding failed: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ExprError {
    fn from(e: serde_json::Error) -> Self {
        ExprError::Json(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Parse,
    Validate,
    Render,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Parse => write!(f, "Parse"),
            Phase::Validate => write!(f, "Validate"),
            Phase::Render => write!(f, "Render"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompilerError {
    pub code: String,
    pub phase: Phase,
    pub message: String,
    /// Template, task or parameter the error points at.
    pub location: Option<String>,
}

impl std::fmt::Display for CompilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(at) => write!(
                f,
                "[{}:{}] {} (at '{}')",
                self.phase, self.code, self.message, at
            ),
            None => write!(f, "[{}:{}] {}", self.phase, self.code, self.message),
        }
    }
}

impl std::error::Error for CompilerError {}

impl From<ValidationError> for CompilerError {
    fn from(e: ValidationError) -> Self {
        CompilerError {
            code: e.code.to_string(),
            phase: Phase::Validate,
            message: e.message,
            location: e.location,
        }
    }
}

impl From<ExprError> for CompilerError {
    fn from(e: ExprError) -> Self {
        let code = match &e {
            ExprError::UnsupportedKind(_) => "R001",
            ExprError::Malformed(_) => "R002",
            ExprError::ShapeViolation { .. } => "R003",
            ExprError::MalformedDefault(_) => "R004",
            ExprError::Json(_) => "R005",
        };
        CompilerError {
            code: code.into(),
            phase: Phase::Render,
            message: e.to_string(),
            location: None,
        }
    }
}

impl CompilerError {
    pub fn parse(code: &str, message: impl Into<String>) -> Self {
        CompilerError {
            code: code.into(),
            phase: Phase::Parse,
            message: message.into(),
            location: None,
        }
    }

    pub fn render(e: ExprError, location: impl Into<String>) -> Self {
        CompilerError {
            location: Some(location.into()),
            ..CompilerError::from(e)
        }
    }
}
