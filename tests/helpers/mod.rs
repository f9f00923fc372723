#![allow(dead_code)]

use argo_compiler::expr::Expr;
use argo_compiler::manifest::*;
use argo_compiler::params::ParamValue;
use serde_json::json;

// =============================================================================
// Template builders
// =============================================================================

/// Container template that echoes its single `msg` input.
pub fn echo_template() -> TemplateDef {
    TemplateDef::new(
        "echo",
        TemplateBody::Container(ContainerDef {
            image: "alpine:3.20".into(),
            command: vec!["echo".into()],
            args: vec![Expr::input("msg").into()],
            env: vec![],
        }),
    )
    .input(ParameterDecl::new("msg"))
}

/// Container template that writes a JSON list of `count` items.
pub fn generator_template() -> TemplateDef {
    TemplateDef::new(
        "gen",
        TemplateBody::Container(ContainerDef {
            image: "python:3.12".into(),
            command: vec!["python".into(), "/gen.py".into()],
            args: vec![Expr::input("count").into()],
            env: vec![EnvVar {
                name: "RUN".into(),
                value: Expr::workflow_value("name").into(),
            }],
        }),
    )
    .input(ParameterDecl::new("count"))
    .output("list", OutputSource::Path("/tmp/list.json".into()))
}

pub fn workflow(name: &str, entrypoint: &str, templates: Vec<TemplateDef>) -> WorkflowDef {
    WorkflowDef {
        name: name.into(),
        entrypoint: entrypoint.into(),
        parameters: vec![],
        templates,
        service_account_name: None,
    }
}

// =============================================================================
// Workflow fixtures
// =============================================================================

/// DAG that generates a list, then fans out over it.
pub fn fan_out_workflow() -> WorkflowDef {
    let greeting = ParameterDecl::new("greeting").with_default("hello");
    let config = ParameterDecl::new("config")
        .aggregate()
        .with_default(ParamValue::literal(json!({"replicas": 2, "tags": ["a", "b"]})));
    let replicas = Expr::get(config.workflow_ref(), "replicas");

    let list = Expr::task_output("generate", "list");
    let main = TemplateDef::new(
        "main",
        TemplateBody::Dag(DagDef {
            tasks: vec![
                TaskDef::new("generate", "gen").arg("count", replicas),
                TaskDef::new("fan", "echo")
                    .depends_on("generate")
                    .arg("msg", Expr::concat([Expr::string("item-"), Expr::item()]))
                    .when(Expr::not_equals(list.clone(), "[]"))
                    .with_param(list),
                TaskDef::new("greet", "echo").arg("msg", greeting.workflow_ref()),
            ],
        }),
    );

    let mut def = workflow("fan-out", "main", vec![main, generator_template(), echo_template()]);
    def.parameters = vec![greeting, config];
    def
}

/// Steps template whose output decodes a step's JSON result.
pub fn steps_workflow() -> WorkflowDef {
    let main = TemplateDef::new(
        "main",
        TemplateBody::Steps(vec![
            vec![TaskDef::new("s1", "gen").arg("count", 3_i64)],
            vec![TaskDef::new("s2", "echo")
                .arg("msg", Expr::step_output("s1", "list"))
                .with_items(vec![ParamValue::from("a"), ParamValue::from("b")])],
        ]),
    )
    .output(
        "result",
        OutputSource::Expression(Expr::from_json(Expr::step_output("s1", "list"))),
    )
    .output(
        "first",
        OutputSource::Parameter(Expr::step_output("s1", "list")),
    );

    workflow("steps", "main", vec![main, generator_template(), echo_template()])
}

/// Resource template whose manifest carries a bare integer expression.
pub fn resource_workflow() -> WorkflowDef {
    let manifest = ParamValue::literal(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": "web"},
    }));
    let ParamValue::Object(mut object) = manifest else {
        unreachable!()
    };
    object.insert(
        "spec".into(),
        ParamValue::Object(
            [(
                "replicas".to_string(),
                ParamValue::from(Expr::strip_quotes(Expr::call("asInt", [Expr::input("n")]))),
            )]
            .into_iter()
            .collect(),
        ),
    );

    let apply = TemplateDef::new(
        "apply",
        TemplateBody::Resource(ResourceDef {
            action: "apply".into(),
            manifest: ParamValue::Object(object),
            success_condition: Some("status.readyReplicas > 0".into()),
            failure_condition: None,
        }),
    )
    .input(ParameterDecl::new("n").with_default(1_i64));

    workflow("deploy", "apply", vec![apply])
}
