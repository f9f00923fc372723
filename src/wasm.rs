//! WASM entry points for browser use.

use wasm_bindgen::prelude::*;

use crate::config::RenderOptions;
use crate::error::CompilerError;
use crate::expr::Expr;
use crate::render::{self, MarkerStyle};

/// Validate a workflow definition JSON.
/// Returns a JSON array of CompilerError objects.
#[wasm_bindgen]
pub fn validate_workflow(def_json: &str) -> JsValue {
    let result = validate_workflow_inner(def_json);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn validate_workflow_inner(def_json: &str) -> Vec<ErrorDto> {
    match crate::manifest::parse(def_json) {
        Ok(def) => crate::manifest::validate_workflow(&def)
            .into_iter()
            .map(|e| ErrorDto::from(CompilerError::from(e)))
            .collect(),
        Err(errors) => errors.into_iter().map(ErrorDto::from).collect(),
    }
}

/// Full pipeline: parse → validate → assemble → YAML.
/// Returns a JSON object with either `manifest` (success) or `errors`.
#[wasm_bindgen]
pub fn compile_workflow(def_json: &str, options_json: &str) -> JsValue {
    let result = compile_workflow_inner(def_json, options_json);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn compile_workflow_inner(def_json: &str, options_json: &str) -> CompileResult {
    // An empty options string means defaults.
    let options = if options_json.trim().is_empty() {
        RenderOptions::default()
    } else {
        match RenderOptions::from_json(options_json) {
            Ok(o) => o,
            Err(e) => return CompileResult::Errors(vec![ErrorDto::from(e)]),
        }
    };

    match crate::manifest::compile_json(def_json, &options) {
        Ok(manifest) => CompileResult::Success { manifest },
        Err(errors) => CompileResult::Errors(errors.into_iter().map(ErrorDto::from).collect()),
    }
}

/// Render one expression (IR JSON) with the given marker style
/// (`outer`, `identifier_only`, `none`, or `output`).
#[wasm_bindgen]
pub fn render_expression(expr_json: &str, style: &str) -> JsValue {
    let result = render_expression_inner(expr_json, style);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn render_expression_inner(expr_json: &str, style: &str) -> RenderResult {
    let value = match serde_json::from_str(expr_json) {
        Ok(v) => v,
        Err(e) => {
            return RenderResult::Error(ErrorDto::from(CompilerError::parse(
                "P003",
                format!("Failed to parse expression JSON: {}", e),
            )));
        }
    };
    let rendered = Expr::from_value(value).and_then(|expr| match style {
        "output" => render::render_output(&expr),
        "identifier_only" => render::render(&expr, MarkerStyle::IdentifierOnly),
        "none" => render::render(&expr, MarkerStyle::None),
        _ => render::render(&expr, MarkerStyle::Outer),
    });
    match rendered {
        Ok(text) => RenderResult::Success { text },
        Err(e) => RenderResult::Error(ErrorDto::from(CompilerError::from(e))),
    }
}

// ---------------------------------------------------------------------------
// DTOs for serialization to JS
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct ErrorDto {
    code: String,
    phase: String,
    message: String,
    location: Option<String>,
}

impl From<CompilerError> for ErrorDto {
    fn from(e: CompilerError) -> Self {
        ErrorDto {
            code: e.code,
            phase: e.phase.to_string(),
            message: e.message,
            location: e.location,
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status")]
enum CompileResult {
    #[serde(rename = "success")]
    Success { manifest: String },
    #[serde(rename = "errors")]
    Errors(Vec<ErrorDto>),
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status")]
enum RenderResult {
    #[serde(rename = "success")]
    Success { text: String },
    #[serde(rename = "error")]
    Error(ErrorDto),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_expression_styles() {
        let json = r#"{"kind": "parameter", "source": {"from": "workflow", "name": "n"}}"#;
        match render_expression_inner(json, "outer") {
            RenderResult::Success { text } => assert_eq!(text, "{{workflow.parameters.n}}"),
            other => panic!("unexpected {:?}", other),
        }
        match render_expression_inner(json, "none") {
            RenderResult::Success { text } => assert_eq!(text, "workflow.parameters.n"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn render_expression_unknown_kind() {
        match render_expression_inner(r#"{"kind": "macro"}"#, "outer") {
            RenderResult::Error(e) => {
                assert_eq!(e.code, "R001");
                assert_eq!(e.phase, "Render");
            }
            other => panic!("unexpected {:?}", other),
        }
        let nested = r#"{"kind": "not", "inner": {"kind": "lambda"}}"#;
        match render_expression_inner(nested, "outer") {
            RenderResult::Error(e) => assert_eq!(e.code, "R001"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn compile_reports_parse_errors() {
        match compile_workflow_inner("{not json", "") {
            CompileResult::Errors(errors) => assert_eq!(errors[0].code, "P001"),
            other => panic!("unexpected {:?}", other),
        }
        match compile_workflow_inner("{}", r#"{"kind": 7}"#) {
            CompileResult::Errors(errors) => assert_eq!(errors[0].code, "P002"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn validate_reports_codes() {
        let json = r#"{"name": "wf", "entrypoint": "missing", "templates": []}"#;
        let errors = validate_workflow_inner(json);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "M002");
        assert_eq!(errors[0].phase, "Validate");
    }
}
