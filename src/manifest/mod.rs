//! Workflow definition → Argo manifest.
//!
//! Pipeline: parse → validate → assemble. Every expression is rendered with
//! the marker style its field calls for; values that cross string-typed
//! boundaries go through `ParamValue::to_boundary`.

pub mod types;
pub mod validate;

use serde_json::{json, Map, Value};

use crate::config::{ManifestKind, RenderOptions};
use crate::error::{CompilerError, ExprError, Phase};
use crate::expr::Expr;
use crate::params::ParamValue;
use crate::render::{self, drop_quote_sentinels, strip_quote_sentinels, MarkerStyle};

pub use types::*;
pub use validate::{validate_workflow, ValidationError};

/// Parse a workflow definition from JSON.
pub fn parse(json: &str) -> Result<WorkflowDef, Vec<CompilerError>> {
    serde_json::from_str(json).map_err(|e| {
        vec![CompilerError::parse(
            "P001",
            format!("Failed to parse workflow definition: {}", e),
        )]
    })
}

/// A generated manifest document.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub document: Value,
}

impl Manifest {
    /// The document as YAML text.
    pub fn to_yaml(&self) -> Result<String, CompilerError> {
        serde_yaml::to_string(&self.document).map_err(|e| CompilerError {
            code: "R006".into(),
            phase: Phase::Render,
            message: format!("YAML encoding failed: {}", e),
            location: None,
        })
    }
}

/// Validate `def` and assemble its manifest.
pub fn compile(def: &WorkflowDef, options: &RenderOptions) -> Result<Manifest, Vec<CompilerError>> {
    tracing::info!(
        workflow = %def.name,
        templates = def.templates.len(),
        kind = options.kind.as_str(),
        "compiling workflow"
    );

    let errors = validate_workflow(def);
    if !errors.is_empty() {
        tracing::debug!(count = errors.len(), "workflow failed validation");
        return Err(errors.into_iter().map(CompilerError::from).collect());
    }

    let mut document = assemble(def, options).map_err(|e| vec![e])?;
    drop_directives(&mut document);
    Ok(Manifest { document })
}

/// Parse, validate and assemble in one step, returning YAML text.
pub fn compile_json(json: &str, options: &RenderOptions) -> Result<String, Vec<CompilerError>> {
    let def = parse(json)?;
    compile(&def, options)?.to_yaml().map_err(|e| vec![e])
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Quote stripping only applies inside text that is parsed again (resource
/// manifests, JSON-encoded aggregates), and those were stripped when they were
/// built. A directive left in any other field renders transparently: the
/// field stays a string scalar.
fn drop_directives(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.contains(render::STRIP_QUOTES_BEGIN) || s.contains(render::STRIP_QUOTES_END) {
                tracing::debug!(field = %s, "quote stripping ignored outside embedded text");
                *s = drop_quote_sentinels(s);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(drop_directives),
        Value::Object(map) => map.values_mut().for_each(drop_directives),
        _ => {}
    }
}

fn assemble(def: &WorkflowDef, options: &RenderOptions) -> Result<Value, CompilerError> {
    let mut metadata = Map::new();
    if options.generate_name && options.kind == ManifestKind::Workflow {
        metadata.insert("generateName".into(), json!(format!("{}-", def.name)));
    } else {
        metadata.insert("name".into(), json!(def.name));
    }
    if let Some(ns) = &options.namespace {
        metadata.insert("namespace".into(), json!(ns));
    }
    if !options.labels.is_empty() {
        metadata.insert("labels".into(), json!(options.labels));
    }

    let mut spec = Map::new();
    spec.insert("entrypoint".into(), json!(def.entrypoint));
    if let Some(sa) = &def.service_account_name {
        spec.insert("serviceAccountName".into(), json!(sa));
    }
    if !def.parameters.is_empty() {
        let params = def
            .parameters
            .iter()
            .map(|p| parameter(p, "value", &def.name))
            .collect::<Result<Vec<_>, _>>()?;
        spec.insert("arguments".into(), json!({ "parameters": params }));
    }
    let templates = def
        .templates
        .iter()
        .map(template)
        .collect::<Result<Vec<_>, _>>()?;
    spec.insert("templates".into(), Value::Array(templates));

    Ok(json!({
        "apiVersion": options.api_version,
        "kind": options.kind.as_str(),
        "metadata": metadata,
        "spec": spec,
    }))
}

/// A declared parameter. Workflow arguments carry their default in `value`,
/// template inputs in `default`.
fn parameter(decl: &ParameterDecl, value_key: &str, location: &str) -> Result<Value, CompilerError> {
    let mut out = Map::new();
    out.insert("name".into(), json!(decl.name));
    match &decl.default {
        Some(ParameterDefault::Value(v)) => {
            let encoded = v
                .to_boundary_as(decl.kind)
                .map_err(|e| CompilerError::render(e, location))?;
            out.insert(value_key.into(), encoded);
        }
        Some(ParameterDefault::ConfigMap(r)) => {
            out.insert(
                "valueFrom".into(),
                json!({ "configMapKeyRef": { "name": r.name, "key": r.key } }),
            );
        }
        None => {}
    }
    if let Some(text) = &decl.description {
        out.insert("description".into(), json!(text));
    }
    Ok(Value::Object(out))
}

fn template(t: &TemplateDef) -> Result<Value, CompilerError> {
    tracing::debug!(template = %t.name, "assembling template");
    let at = t.name.as_str();

    let mut out = Map::new();
    out.insert("name".into(), json!(t.name));

    if !t.inputs.is_empty() {
        let params = t
            .inputs
            .iter()
            .map(|p| parameter(p, "default", at))
            .collect::<Result<Vec<_>, _>>()?;
        out.insert("inputs".into(), json!({ "parameters": params }));
    }
    if !t.outputs.is_empty() {
        let params = t
            .outputs
            .iter()
            .map(|p| output(p, at))
            .collect::<Result<Vec<_>, _>>()?;
        out.insert("outputs".into(), json!({ "parameters": params }));
    }

    match &t.body {
        TemplateBody::Dag(dag) => {
            let tasks = dag
                .tasks
                .iter()
                .map(|task| node(task, at))
                .collect::<Result<Vec<_>, _>>()?;
            out.insert("dag".into(), json!({ "tasks": tasks }));
        }
        TemplateBody::Steps(groups) => {
            let groups = groups
                .iter()
                .map(|group| {
                    group
                        .iter()
                        .map(|step| node(step, at))
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::Array)
                })
                .collect::<Result<Vec<_>, _>>()?;
            out.insert("steps".into(), Value::Array(groups));
        }
        TemplateBody::Container(c) => {
            out.insert("container".into(), container(c, at)?);
        }
        TemplateBody::Resource(r) => {
            out.insert("resource".into(), resource(r, at)?);
        }
        TemplateBody::Suspend(s) => {
            let mut suspend = Map::new();
            if let Some(d) = &s.duration {
                suspend.insert("duration".into(), json!(string_field(d, at)?));
            }
            out.insert("suspend".into(), Value::Object(suspend));
        }
    }

    if let Some(retry) = &t.retry_strategy {
        out.insert("retryStrategy".into(), retry_strategy(retry, at)?);
    }

    Ok(Value::Object(out))
}

fn output(p: &OutputParameter, at: &str) -> Result<Value, CompilerError> {
    let mut out = Map::new();
    out.insert("name".into(), json!(p.name));
    match &p.value_from {
        OutputSource::Path(path) => {
            out.insert("valueFrom".into(), json!({ "path": path }));
        }
        OutputSource::Expression(e) => {
            let text = render::render_output(e).map_err(|err| CompilerError::render(err, at))?;
            out.insert("valueFrom".into(), json!({ "expression": text }));
        }
        OutputSource::Parameter(e) => {
            out.insert("valueFrom".into(), json!({ "parameter": outer(e, at)? }));
        }
        OutputSource::JsonPath(path) => {
            out.insert("valueFrom".into(), json!({ "jsonPath": path }));
        }
        OutputSource::Value(v) => {
            out.insert("value".into(), boundary(&v.0, at)?);
        }
    }
    if let Some(text) = &p.description {
        out.insert("description".into(), json!(text));
    }
    Ok(Value::Object(out))
}

/// A DAG task or a step.
fn node(task: &TaskDef, template: &str) -> Result<Value, CompilerError> {
    let at = format!("{}/{}", template, task.name);
    let at = at.as_str();

    let mut out = Map::new();
    out.insert("name".into(), json!(task.name));
    out.insert("template".into(), json!(task.template));
    if !task.dependencies.is_empty() {
        out.insert("dependencies".into(), json!(task.dependencies));
    }
    if !task.arguments.is_empty() {
        let params = task
            .arguments
            .iter()
            .map(|a| -> Result<Value, CompilerError> {
                Ok(json!({ "name": a.name, "value": boundary(&a.value, at)? }))
            })
            .collect::<Result<Vec<_>, _>>()?;
        out.insert("arguments".into(), json!({ "parameters": params }));
    }
    if let Some(cond) = &task.when {
        let text = render::render(cond, MarkerStyle::IdentifierOnly)
            .map_err(|e| CompilerError::render(e, at))?;
        out.insert("when".into(), json!(text));
    }
    if let Some(items) = &task.with_items {
        let items = items
            .iter()
            .map(|i| i.render().map_err(|e| CompilerError::render(e, at)))
            .collect::<Result<Vec<_>, _>>()?;
        out.insert("withItems".into(), Value::Array(items));
    }
    if let Some(source) = &task.with_param {
        out.insert("withParam".into(), json!(outer(source, at)?));
    }
    if let Some(seq) = &task.with_sequence {
        let mut s = Map::new();
        for (key, value) in [("count", &seq.count), ("start", &seq.start), ("end", &seq.end)] {
            if let Some(v) = value {
                s.insert(key.into(), boundary(v, at)?);
            }
        }
        if let Some(format) = &seq.format {
            s.insert("format".into(), json!(format));
        }
        out.insert("withSequence".into(), Value::Object(s));
    }
    Ok(Value::Object(out))
}

fn container(c: &ContainerDef, at: &str) -> Result<Value, CompilerError> {
    let mut out = Map::new();
    out.insert("image".into(), json!(c.image));
    if !c.command.is_empty() {
        out.insert("command".into(), json!(c.command));
    }
    if !c.args.is_empty() {
        let args = c
            .args
            .iter()
            .map(|a| string_field(a, at))
            .collect::<Result<Vec<_>, _>>()?;
        out.insert("args".into(), json!(args));
    }
    if !c.env.is_empty() {
        let env = c
            .env
            .iter()
            .map(|e| -> Result<Value, CompilerError> {
                Ok(json!({ "name": e.name, "value": string_field(&e.value, at)? }))
            })
            .collect::<Result<Vec<_>, _>>()?;
        out.insert("env".into(), Value::Array(env));
    }
    Ok(Value::Object(out))
}

fn resource(r: &ResourceDef, at: &str) -> Result<Value, CompilerError> {
    let mut out = Map::new();
    out.insert("action".into(), json!(r.action));
    out.insert("manifest".into(), json!(manifest_text(&r.manifest, at)?));
    if let Some(cond) = &r.success_condition {
        out.insert("successCondition".into(), json!(cond));
    }
    if let Some(cond) = &r.failure_condition {
        out.insert("failureCondition".into(), json!(cond));
    }
    Ok(Value::Object(out))
}

/// Embedded Kubernetes object as text. Structured manifests are written as
/// JSON (valid YAML) so quote-stripping sees deterministic quoting.
fn manifest_text(manifest: &ParamValue, at: &str) -> Result<String, CompilerError> {
    let text = match manifest {
        ParamValue::String(s) => s.clone(),
        ParamValue::Expr(e) => outer(e, at)?,
        other => {
            let rendered = other.render().map_err(|e| CompilerError::render(e, at))?;
            serde_json::to_string_pretty(&rendered)
                .map_err(|e| CompilerError::render(ExprError::from(e), at))?
        }
    };
    Ok(strip_quote_sentinels(&text))
}

fn retry_strategy(r: &RetryStrategy, at: &str) -> Result<Value, CompilerError> {
    let mut out = Map::new();
    if let Some(limit) = &r.limit {
        out.insert("limit".into(), boundary(limit, at)?);
    }
    if let Some(policy) = &r.retry_policy {
        out.insert("retryPolicy".into(), json!(policy));
    }
    if let Some(b) = &r.backoff {
        let mut backoff = Map::new();
        if let Some(d) = &b.duration {
            backoff.insert("duration".into(), json!(d));
        }
        if let Some(f) = &b.factor {
            backoff.insert("factor".into(), boundary(f, at)?);
        }
        if let Some(d) = &b.max_duration {
            backoff.insert("maxDuration".into(), json!(d));
        }
        out.insert("backoff".into(), Value::Object(backoff));
    }
    Ok(Value::Object(out))
}

// ---------------------------------------------------------------------------
// Field encoders
// ---------------------------------------------------------------------------

fn outer(expr: &Expr, at: &str) -> Result<String, CompilerError> {
    render::render(expr, MarkerStyle::Outer).map_err(|e| CompilerError::render(e, at))
}

fn boundary(value: &ParamValue, at: &str) -> Result<Value, CompilerError> {
    value.to_boundary().map_err(|e| CompilerError::render(e, at))
}

/// Boundary encoding forced to text, for fields Kubernetes types as strings.
fn string_field(value: &ParamValue, at: &str) -> Result<String, CompilerError> {
    Ok(match boundary(value, at)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
