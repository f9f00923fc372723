use argo_compiler::error::ExprError;
use argo_compiler::expr::Expr;
use argo_compiler::params::{ParamValue, Serialized, ValueContext};
use serde_json::json;

fn strict(value: serde_json::Value) -> Result<ParamValue, ExprError> {
    ParamValue::from_json(value, ValueContext::Strict)
}

#[test]
fn scalars_cross_boundaries_natively() {
    assert_eq!(strict(json!(7)).unwrap().to_boundary().unwrap(), json!(7));
    assert_eq!(strict(json!(2.5)).unwrap().to_boundary().unwrap(), json!(2.5));
    assert_eq!(strict(json!(false)).unwrap().to_boundary().unwrap(), json!(false));
    assert_eq!(strict(json!("txt")).unwrap().to_boundary().unwrap(), json!("txt"));
    assert_eq!(strict(json!(null)).unwrap().to_boundary().unwrap(), json!(null));
}

#[test]
fn aggregates_cross_boundaries_as_json_text() {
    let value = strict(json!({"tags": ["a", "b"], "replicas": 2})).unwrap();
    let encoded = value.to_boundary().unwrap();
    let text = encoded.as_str().unwrap();
    assert_eq!(text, r#"{"replicas":2,"tags":["a","b"]}"#);

    let decoded = Serialized::from_text(text).decode().unwrap();
    assert_eq!(decoded, json!({"tags": ["a", "b"], "replicas": 2}));
}

#[test]
fn expressions_inside_aggregates_are_rendered_before_encoding() {
    let value = strict(json!([
        {"$expr": {"kind": "loop_item"}},
        {"$expr": {
            "kind": "infix", "op": "mul",
            "left": {"kind": "parameter", "source": {"from": "workflow", "name": "n"}},
            "right": {"kind": "literal", "value": 2}
        }}
    ]))
    .unwrap();
    assert_eq!(
        value.to_boundary().unwrap(),
        json!(r#"["{{item}}","{{=workflow.parameters.n * 2}}"]"#)
    );
}

#[test]
fn top_level_expression_crosses_as_rendered_text() {
    let value = ParamValue::from(Expr::task_output("a", "b"));
    assert_eq!(
        value.to_boundary().unwrap(),
        json!("{{tasks.a.outputs.parameters.b}}")
    );
}

#[test]
fn shape_violation_reports_path() {
    let err = strict(json!({"outer": {"list": [1, {"$ref": "#/x"}]}})).unwrap_err();
    match err {
        ExprError::ShapeViolation { path, detail } => {
            assert_eq!(path, "$.outer.list[1]");
            assert!(detail.contains("$ref"));
        }
        other => panic!("expected shape violation, got {:?}", other),
    }
}

#[test]
fn output_arguments_keep_unexpected_objects() {
    let raw = json!({"$schema": "v1", "items": [1, 2]});
    let value = ParamValue::from_json(raw.clone(), ValueContext::OutputArgument).unwrap();
    assert!(value.is_aggregate());
    assert!(value.expressions().is_empty());
    assert_eq!(value.render().unwrap(), raw);
}

#[test]
fn malformed_expression_payload() {
    let err = strict(json!({"$expr": {"kind": "get", "source": {"kind": "loop_item"}}})).unwrap_err();
    assert!(matches!(err, ExprError::Malformed(_)));
}

#[test]
fn serde_uses_the_strict_decoder() {
    let err = serde_json::from_value::<ParamValue>(json!({"$expr": {"kind": "loop_item"}, "x": 1}))
        .unwrap_err();
    assert!(err.to_string().contains("mixed with other keys"));
}

#[test]
fn serialized_survives_a_string_boundary() {
    let original = json!({"nested": {"deep": [1, 2, {"k": "v"}]}, "flag": true});
    let once = Serialized::encode(&original).unwrap();
    // The text itself is what Argo hands to the next template.
    let twice = Serialized::encode(&json!(once.text())).unwrap();
    let unwrapped: String = serde_json::from_str(twice.text()).unwrap();
    assert_eq!(Serialized::from_text(unwrapped).decode().unwrap(), original);
}
