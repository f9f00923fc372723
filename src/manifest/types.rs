//! Workflow definition model.
//!
//! The shapes mirror Argo's own field names (camelCase in JSON) so a
//! definition reads like the manifest it compiles to, except that every
//! value position accepts an expression or a structured `ParamValue`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ExprError;
use crate::expr::{Expr, ParameterSource, ValueKind};
use crate::params::{ParamValue, ValueContext};

// =============================================================================
// WORKFLOW
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDef {
    pub name: String,
    pub entrypoint: String,
    /// Workflow-level parameters (`spec.arguments.parameters`).
    #[serde(default)]
    pub parameters: Vec<ParameterDecl>,
    pub templates: Vec<TemplateDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

impl WorkflowDef {
    pub fn template(&self, name: &str) -> Option<&TemplateDef> {
        self.templates.iter().find(|t| t.name == name)
    }
}

// =============================================================================
// PARAMETERS
// =============================================================================

/// A declared parameter: workflow argument or template input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameterDecl", into = "RawParameterDecl")]
pub struct ParameterDecl {
    pub name: String,
    pub kind: ValueKind,
    pub default: Option<ParameterDefault>,
    pub description: Option<String>,
}

/// Where a parameter's default comes from. Exactly one source is set.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterDefault {
    Value(ParamValue),
    ConfigMap(ConfigMapKeyRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMapKeyRef {
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawParameterDecl {
    name: String,
    #[serde(default)]
    kind: ValueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<RawDefault>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDefault {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config_map_key_ref: Option<ConfigMapKeyRef>,
}

impl TryFrom<RawParameterDecl> for ParameterDecl {
    type Error = ExprError;

    fn try_from(raw: RawParameterDecl) -> Result<Self, Self::Error> {
        let default = match raw.default {
            None => None,
            Some(RawDefault {
                value: Some(v),
                config_map_key_ref: None,
            }) => Some(ParameterDefault::Value(v)),
            Some(RawDefault {
                value: None,
                config_map_key_ref: Some(r),
            }) => Some(ParameterDefault::ConfigMap(r)),
            Some(_) => return Err(ExprError::MalformedDefault(raw.name)),
        };
        Ok(ParameterDecl {
            name: raw.name,
            kind: raw.kind,
            default,
            description: raw.description,
        })
    }
}

impl From<ParameterDecl> for RawParameterDecl {
    fn from(p: ParameterDecl) -> Self {
        let default = p.default.map(|d| match d {
            ParameterDefault::Value(v) => RawDefault {
                value: Some(v),
                ..RawDefault::default()
            },
            ParameterDefault::ConfigMap(r) => RawDefault {
                config_map_key_ref: Some(r),
                ..RawDefault::default()
            },
        });
        RawParameterDecl {
            name: p.name,
            kind: p.kind,
            default,
            description: p.description,
        }
    }
}

impl ParameterDecl {
    pub fn new(name: impl Into<String>) -> Self {
        ParameterDecl {
            name: name.into(),
            kind: ValueKind::Scalar,
            default: None,
            description: None,
        }
    }

    /// Declare the value as an array/record; it crosses boundaries as JSON.
    pub fn aggregate(mut self) -> Self {
        self.kind = ValueKind::Aggregate;
        self
    }

    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(ParameterDefault::Value(value.into()));
        self
    }

    pub fn from_config_map(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.default = Some(ParameterDefault::ConfigMap(ConfigMapKeyRef {
            name: name.into(),
            key: key.into(),
        }));
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Read this parameter as a template input, decoding aggregates.
    pub fn input_ref(&self) -> Expr {
        Expr::read_parameter(
            ParameterSource::Input {
                name: self.name.clone(),
            },
            self.kind,
        )
    }

    /// Read this parameter as a workflow argument, decoding aggregates.
    pub fn workflow_ref(&self) -> Expr {
        Expr::read_parameter(
            ParameterSource::Workflow {
                name: self.name.clone(),
            },
            self.kind,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputParameter {
    pub name: String,
    pub value_from: OutputSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Where an output parameter takes its value from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputSource {
    /// File written by a container.
    Path(String),
    /// Evaluated by Argo after the template completes (`valueFrom.expression`).
    #[serde(deserialize_with = "checked_expr")]
    Expression(Expr),
    /// A parameter of a child task/step (`valueFrom.parameter`).
    #[serde(deserialize_with = "checked_expr")]
    Parameter(Expr),
    /// JSON path into a resource template's object.
    JsonPath(String),
    /// A fixed value.
    Value(OutputValue),
}

/// Output argument value. Decoded leniently: an unexpected object shape is
/// kept as a plain object instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct OutputValue(pub ParamValue);

impl TryFrom<Value> for OutputValue {
    type Error = ExprError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        ParamValue::from_json(value, ValueContext::OutputArgument).map(OutputValue)
    }
}

impl From<OutputValue> for Value {
    fn from(v: OutputValue) -> Self {
        v.0.to_wire()
    }
}

/// Embedded expressions decode through `Expr::from_value` so an unknown
/// `kind` is named in the parse error.
fn checked_expr<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Expr, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Expr::from_value(value).map_err(serde::de::Error::custom)
}

fn checked_optional_expr<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Expr>, D::Error> {
    Option::<Value>::deserialize(deserializer)?
        .map(Expr::from_value)
        .transpose()
        .map_err(serde::de::Error::custom)
}

// =============================================================================
// TEMPLATES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDef {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<ParameterDecl>,
    #[serde(default)]
    pub outputs: Vec<OutputParameter>,
    #[serde(flatten)]
    pub body: TemplateBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_strategy: Option<RetryStrategy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TemplateBody {
    Dag(DagDef),
    /// Outer list runs sequentially; each inner group runs in parallel.
    Steps(Vec<Vec<TaskDef>>),
    Container(ContainerDef),
    Resource(ResourceDef),
    Suspend(SuspendDef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagDef {
    pub tasks: Vec<TaskDef>,
}

/// A DAG task or a step. `dependencies` only applies to DAG tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDef {
    pub name: String,
    pub template: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Argument>,
    #[serde(
        default,
        deserialize_with = "checked_optional_expr",
        skip_serializing_if = "Option::is_none"
    )]
    pub when: Option<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_items: Option<Vec<ParamValue>>,
    #[serde(
        default,
        deserialize_with = "checked_optional_expr",
        skip_serializing_if = "Option::is_none"
    )]
    pub with_param: Option<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_sequence: Option<Sequence>,
}

impl TaskDef {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        TaskDef {
            name: name.into(),
            template: template.into(),
            dependencies: Vec::new(),
            arguments: Vec::new(),
            when: None,
            with_items: None,
            with_param: None,
            with_sequence: None,
        }
    }

    pub fn depends_on(mut self, task: impl Into<String>) -> Self {
        self.dependencies.push(task.into());
        self
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.arguments.push(Argument {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn when(mut self, condition: Expr) -> Self {
        self.when = Some(condition);
        self
    }

    pub fn with_items(mut self, items: Vec<ParamValue>) -> Self {
        self.with_items = Some(items);
        self
    }

    pub fn with_param(mut self, source: Expr) -> Self {
        self.with_param = Some(source);
        self
    }

    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.with_sequence = Some(sequence);
        self
    }

    /// Every expression this task embeds.
    pub fn expressions(&self) -> Vec<&Expr> {
        let mut out: Vec<&Expr> = Vec::new();
        for arg in &self.arguments {
            out.extend(arg.value.expressions());
        }
        out.extend(self.when.iter());
        out.extend(self.with_param.iter());
        for item in self.with_items.iter().flatten() {
            out.extend(item.expressions());
        }
        if let Some(seq) = &self.with_sequence {
            for v in [&seq.count, &seq.start, &seq.end].into_iter().flatten() {
                out.extend(v.expressions());
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub value: ParamValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDef {
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<ParamValue>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: ParamValue,
}

/// A Kubernetes object created/applied by Argo. The manifest is embedded as
/// text, where `strip_quotes` directives take effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDef {
    pub action: String,
    pub manifest: ParamValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_condition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuspendDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<ParamValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStrategy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff: Option<Backoff>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backoff {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<String>,
}

impl TemplateDef {
    pub fn new(name: impl Into<String>, body: TemplateBody) -> Self {
        TemplateDef {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            body,
            retry_strategy: None,
        }
    }

    pub fn input(mut self, param: ParameterDecl) -> Self {
        self.inputs.push(param);
        self
    }

    pub fn output(mut self, name: impl Into<String>, value_from: OutputSource) -> Self {
        self.outputs.push(OutputParameter {
            name: name.into(),
            value_from,
            description: None,
        });
        self
    }

    /// Tasks (DAG) or steps (flattened across groups), in declaration order.
    pub fn tasks(&self) -> Vec<&TaskDef> {
        match &self.body {
            TemplateBody::Dag(dag) => dag.tasks.iter().collect(),
            TemplateBody::Steps(groups) => groups.iter().flatten().collect(),
            _ => Vec::new(),
        }
    }

    /// Expressions embedded directly in this template, outside its tasks.
    pub fn own_expressions(&self) -> Vec<&Expr> {
        let mut out: Vec<&Expr> = Vec::new();
        for input in &self.inputs {
            if let Some(ParameterDefault::Value(v)) = &input.default {
                out.extend(v.expressions());
            }
        }
        for output in &self.outputs {
            match &output.value_from {
                OutputSource::Expression(e) | OutputSource::Parameter(e) => out.push(e),
                OutputSource::Value(v) => out.extend(v.0.expressions()),
                OutputSource::Path(_) | OutputSource::JsonPath(_) => {}
            }
        }
        match &self.body {
            TemplateBody::Container(c) => {
                for arg in &c.args {
                    out.extend(arg.expressions());
                }
                for env in &c.env {
                    out.extend(env.value.expressions());
                }
            }
            TemplateBody::Resource(r) => out.extend(r.manifest.expressions()),
            TemplateBody::Suspend(s) => {
                out.extend(s.duration.iter().flat_map(ParamValue::expressions));
            }
            TemplateBody::Dag(_) | TemplateBody::Steps(_) => {}
        }
        if let Some(limit) = self.retry_strategy.as_ref().and_then(|r| r.limit.as_ref()) {
            out.extend(limit.expressions());
        }
        out
    }
}
