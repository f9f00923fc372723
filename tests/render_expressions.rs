use argo_compiler::error::ExprError;
use argo_compiler::expr::{Complexity, Expr};
use argo_compiler::render::{render, render_output, MarkerStyle};
use serde_json::json;

fn outer(expr: &Expr) -> String {
    render(expr, MarkerStyle::Outer).unwrap()
}

// =============================================================================
// Marker placement
// =============================================================================

#[test]
fn plain_reference_gets_braces_only() {
    assert_eq!(
        outer(&Expr::workflow_param("count")),
        "{{workflow.parameters.count}}"
    );
    assert_eq!(
        outer(&Expr::task_output("t1", "result")),
        "{{tasks.t1.outputs.parameters.result}}"
    );
    assert_eq!(outer(&Expr::item()), "{{item}}");
}

#[test]
fn compound_gets_sigil_and_bare_references() {
    let e = Expr::concat([Expr::string("prefix-"), Expr::input("name")]);
    let text = outer(&e);
    assert_eq!(text, "{{='prefix-' + inputs.parameters.name}}");
    assert_eq!(text.matches("{{").count(), 1);
}

#[test]
fn literal_is_bare() {
    assert_eq!(outer(&Expr::string("hello")), "hello");
    assert_eq!(outer(&Expr::integer(3)), "3");
    assert_eq!(outer(&Expr::number(42.0)), "42");
    assert_eq!(outer(&Expr::boolean(false)), "false");
}

#[test]
fn ternary_renders_fully_parenthesized() {
    assert_eq!(
        outer(&Expr::ternary(true, "yes", "no")),
        "{{=((true) ? ('yes') : ('no'))}}"
    );
}

#[test]
fn when_condition_uses_identifier_markers() {
    let cond = Expr::and(
        Expr::equals(Expr::task_data("check", "status"), "Succeeded"),
        Expr::greater_than(Expr::task_output("check", "count"), 0_i64),
    );
    assert_eq!(
        render(&cond, MarkerStyle::IdentifierOnly).unwrap(),
        "({{tasks.check.status}} == 'Succeeded') && ({{tasks.check.outputs.parameters.count}} > 0)"
    );
}

// =============================================================================
// Complexity
// =============================================================================

#[test]
fn wrappers_inherit_plainness() {
    let single = Expr::concat([Expr::input("x")]);
    assert_eq!(single.complexity(), Complexity::Plain);
    assert_eq!(outer(&single), "{{inputs.parameters.x}}");

    let coerced = Expr::as_string(Expr::workflow_param("n"));
    assert_eq!(coerced.complexity(), Complexity::Plain);
    assert_eq!(outer(&coerced), "{{workflow.parameters.n}}");

    let coerced_sum = Expr::as_string(Expr::add(Expr::input("n"), 1_i64));
    assert_eq!(coerced_sum.complexity(), Complexity::Compound);
    assert_eq!(outer(&coerced_sum), "{{=inputs.parameters.n + 1}}");
}

#[test]
fn separator_concat_is_compound_even_with_one_part() {
    let e = Expr::concat_with(",", [Expr::input("x")]);
    assert_eq!(e.complexity(), Complexity::Compound);
}

#[test]
fn to_json_of_a_reference_is_plain() {
    let e = Expr::to_json(Expr::workflow_param("cfg"));
    assert_eq!(e.complexity(), Complexity::Plain);
    assert_eq!(outer(&e), "{{workflow.parameters.cfg}}");

    let e = Expr::to_json(Expr::from_json(Expr::input("cfg")));
    assert_eq!(outer(&e), "{{inputs.parameters.cfg}}");
}

#[test]
fn compound_leaf_propagates_to_root() {
    let e = Expr::concat([
        Expr::string("a"),
        Expr::concat([Expr::call("sprig.upper", [Expr::input("b")])]),
    ]);
    assert_eq!(e.complexity(), Complexity::Compound);
    assert_eq!(outer(&e), "{{='a' + sprig.upper(inputs.parameters.b)}}");
}

// =============================================================================
// Literals and quoting
// =============================================================================

#[test]
fn nested_strings_are_escaped() {
    let e = Expr::equals(Expr::input("a"), "it's\ta \"test\"");
    assert_eq!(
        outer(&e),
        r#"{{=inputs.parameters.a == 'it\'s\ta "test"'}}"#
    );
}

#[test]
fn integral_floats_render_without_fraction() {
    let e = Expr::mul(Expr::input("n"), 2.0_f64);
    assert_eq!(outer(&e), "{{=inputs.parameters.n * 2}}");
    let e = Expr::mul(Expr::input("n"), 0.5_f64);
    assert_eq!(outer(&e), "{{=inputs.parameters.n * 0.5}}");
}

// =============================================================================
// Templates
// =============================================================================

#[test]
fn top_level_fill_template_substitutes_wrapped_values() {
    let e = Expr::fill_template(
        "s3://{{bucket}}/{{run}}/out.json",
        [
            ("bucket", Expr::workflow_param("bucket")),
            ("run", Expr::workflow_value("uid")),
        ],
    );
    assert_eq!(
        outer(&e),
        "s3://{{workflow.parameters.bucket}}/{{workflow.uid}}/out.json"
    );
}

#[test]
fn nested_fill_template_expands_into_concatenation() {
    let e = Expr::concat([
        Expr::fill_template("job-{{id}}", [("id", Expr::input("id"))]),
        Expr::string("-x"),
    ]);
    assert_eq!(outer(&e), "{{='job-' + inputs.parameters.id + '-x'}}");
}

#[test]
fn fill_template_without_markers_is_an_expression() {
    let e = Expr::fill_template("job-{{id}}", [("id", Expr::input("id"))]);
    assert_eq!(
        render(&e, MarkerStyle::None).unwrap(),
        "'job-' + inputs.parameters.id"
    );
    assert_eq!(render_output(&e).unwrap(), "'job-' + inputs.parameters.id");
    assert_eq!(
        render(&e, MarkerStyle::IdentifierOnly).unwrap(),
        "job-{{inputs.parameters.id}}"
    );
}

// =============================================================================
// Precedence
// =============================================================================

#[test]
fn index_and_get_over_a_concatenation() {
    let e = Expr::index(Expr::concat([Expr::input("a"), Expr::input("b")]), 0_i64);
    assert_eq!(outer(&e), "{{=(inputs.parameters.a + inputs.parameters.b)[0]}}");

    let e = Expr::get(
        Expr::concat_with("-", [Expr::input("a"), Expr::input("b")]),
        "k",
    );
    assert_eq!(
        outer(&e),
        "{{=(inputs.parameters.a + '-' + inputs.parameters.b)['k']}}"
    );
}

// =============================================================================
// JSON round trips
// =============================================================================

#[test]
fn single_field_of_an_aggregate_is_read_without_reencoding() {
    let e = Expr::to_json(Expr::get(Expr::from_json(Expr::input("cfg")), "a"));
    let text = outer(&e);
    assert_eq!(text, "{{=jsonpath(inputs.parameters.cfg, '$.a')}}");
    assert!(!text.contains("fromJSON"));
    assert!(!text.contains("toJSON"));
}

// =============================================================================
// Output expressions
// =============================================================================

#[test]
fn output_expression_drops_markers_and_outer_decode() {
    let e = Expr::from_json(Expr::task_output("build", "manifest"));
    assert_eq!(
        render_output(&e).unwrap(),
        "tasks.build.outputs.parameters.manifest"
    );

    let e = Expr::ternary(
        Expr::equals(Expr::task_data("a", "status"), "Succeeded"),
        Expr::task_output("a", "out"),
        Expr::task_output("b", "out"),
    );
    assert_eq!(
        render_output(&e).unwrap(),
        "((tasks.a.status == 'Succeeded') ? (tasks.a.outputs.parameters.out) : (tasks.b.outputs.parameters.out))"
    );
}

// =============================================================================
// Decoding
// =============================================================================

#[test]
fn decoded_ir_renders_like_built_ir() {
    let json = json!({
        "kind": "infix",
        "op": "add",
        "left": {"kind": "parameter", "source": {"from": "input", "name": "n"}},
        "right": {"kind": "literal", "value": 1}
    });
    let e = Expr::from_value(json).unwrap();
    assert_eq!(e, Expr::add(Expr::input("n"), 1_i64));
    assert_eq!(outer(&e), "{{=inputs.parameters.n + 1}}");
}

#[test]
fn unknown_kind_is_rejected() {
    let err = Expr::from_value(json!({"kind": "lambda", "body": {}})).unwrap_err();
    assert_eq!(err, ExprError::UnsupportedKind("lambda".into()));
    assert!(err.to_string().contains("lambda"));
}

#[test]
fn unknown_kind_below_the_root_is_rejected() {
    let err = Expr::from_value(json!({"kind": "not", "inner": {"kind": "lambda"}})).unwrap_err();
    assert_eq!(err, ExprError::UnsupportedKind("lambda".into()));
}
