//! Workflow definition validation.
//!
//! Checks that a `WorkflowDef` is structurally sound and that every
//! reference embedded in its expressions resolves before assembly.

use std::collections::{HashMap, HashSet};

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::expr::{Expr, NodeScope, ParameterSource};

use super::types::*;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
    /// `template` or `template/task` the error was found at.
    pub location: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(at) => write!(f, "[{}] {} (at '{}')", self.code, self.message, at),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

/// Validate a workflow definition. Returns all errors found.
pub fn validate_workflow(def: &WorkflowDef) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_unique_template_names(def, &mut errors);
    validate_entrypoint(def, &mut errors);
    for template in &def.templates {
        validate_template_refs(def, template, &mut errors);
        validate_unique_task_names(template, &mut errors);
        validate_task_shape(template, &mut errors);
        validate_dag(template, &mut errors);
        validate_step_references(template, &mut errors);
        validate_output_references(template, &mut errors);
        validate_parameter_references(def, template, &mut errors);
    }
    validate_workflow_defaults(def, &mut errors);

    errors
}

fn at(template: &TemplateDef, task: &TaskDef) -> Option<String> {
    Some(format!("{}/{}", template.name, task.name))
}

// ---------------------------------------------------------------------------
// Invariant: template names are unique and the entrypoint exists
// ---------------------------------------------------------------------------

fn validate_unique_template_names(def: &WorkflowDef, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for template in &def.templates {
        if !seen.insert(template.name.as_str()) {
            errors.push(ValidationError {
                code: "M001",
                message: format!("Duplicate template name '{}'", template.name),
                location: Some(template.name.clone()),
            });
        }
    }
}

fn validate_entrypoint(def: &WorkflowDef, errors: &mut Vec<ValidationError>) {
    if def.template(&def.entrypoint).is_none() {
        errors.push(ValidationError {
            code: "M002",
            message: format!("Entrypoint '{}' does not name a template", def.entrypoint),
            location: None,
        });
    }
}

// ---------------------------------------------------------------------------
// Invariant: every task/step invokes a declared template
// ---------------------------------------------------------------------------

fn validate_template_refs(def: &WorkflowDef, template: &TemplateDef, errors: &mut Vec<ValidationError>) {
    for task in template.tasks() {
        if def.template(&task.template).is_none() {
            errors.push(ValidationError {
                code: "M003",
                message: format!(
                    "Task '{}' invokes unknown template '{}'",
                    task.name, task.template
                ),
                location: at(template, task),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Invariant: task/step names are unique within a template
// ---------------------------------------------------------------------------

fn validate_unique_task_names(template: &TemplateDef, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for task in template.tasks() {
        if !seen.insert(task.name.as_str()) {
            errors.push(ValidationError {
                code: "M004",
                message: format!("Duplicate task name '{}'", task.name),
                location: at(template, task),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Invariant: at most one loop per task, dependencies only in DAGs
// ---------------------------------------------------------------------------

fn validate_task_shape(template: &TemplateDef, errors: &mut Vec<ValidationError>) {
    let is_steps = matches!(template.body, TemplateBody::Steps(_));
    for task in template.tasks() {
        let loops = [
            task.with_items.is_some(),
            task.with_param.is_some(),
            task.with_sequence.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count();
        if loops > 1 {
            errors.push(ValidationError {
                code: "M009",
                message: format!(
                    "Task '{}' sets more than one of withItems, withParam, withSequence",
                    task.name
                ),
                location: at(template, task),
            });
        }
        if is_steps && !task.dependencies.is_empty() {
            errors.push(ValidationError {
                code: "M010",
                message: format!(
                    "Step '{}' declares dependencies; steps run in group order",
                    task.name
                ),
                location: at(template, task),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Invariant: DAG dependencies resolve, form no cycle, and every task output
// reference points at an upstream task
// ---------------------------------------------------------------------------

struct DagGraph {
    graph: DiGraph<String, ()>,
    node_indices: HashMap<String, NodeIndex>,
}

impl DagGraph {
    /// Edges run from dependency to dependent. Unknown dependencies are
    /// reported and left out of the graph.
    fn build(template: &TemplateDef, tasks: &[TaskDef], errors: &mut Vec<ValidationError>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();

        for task in tasks {
            node_indices
                .entry(task.name.clone())
                .or_insert_with(|| graph.add_node(task.name.clone()));
        }

        for task in tasks {
            let target = node_indices[&task.name];
            for dep in &task.dependencies {
                match node_indices.get(dep) {
                    Some(&source) => {
                        graph.add_edge(source, target, ());
                    }
                    None => errors.push(ValidationError {
                        code: "M005",
                        message: format!("Task '{}' depends on unknown task '{}'", task.name, dep),
                        location: at(template, task),
                    }),
                }
            }
        }

        DagGraph { graph, node_indices }
    }

    fn is_upstream(&self, upstream: &str, task: &str) -> bool {
        match (self.node_indices.get(upstream), self.node_indices.get(task)) {
            (Some(&from), Some(&to)) => from != to && has_path_connecting(&self.graph, from, to, None),
            _ => false,
        }
    }
}

fn validate_dag(template: &TemplateDef, errors: &mut Vec<ValidationError>) {
    let TemplateBody::Dag(dag) = &template.body else {
        return;
    };
    let graph = DagGraph::build(template, &dag.tasks, errors);

    if let Err(cycle) = toposort(&graph.graph, None) {
        let name = &graph.graph[cycle.node_id()];
        errors.push(ValidationError {
            code: "M006",
            message: format!("Dependency cycle through task '{}'", name),
            location: Some(format!("{}/{}", template.name, name)),
        });
        // Reachability is meaningless on a cyclic graph.
        return;
    }

    for task in &dag.tasks {
        for (scope, name) in task_node_refs(task) {
            if scope == NodeScope::Steps {
                errors.push(ValidationError {
                    code: "M007",
                    message: format!(
                        "Task '{}' reads step '{}' inside a DAG template",
                        task.name, name
                    ),
                    location: at(template, task),
                });
            } else if !graph.is_upstream(name, &task.name) {
                errors.push(ValidationError {
                    code: "M007",
                    message: format!(
                        "Task '{}' reads task '{}', which is not upstream of it",
                        task.name, name
                    ),
                    location: at(template, task),
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Invariant: steps only read steps from earlier groups
// ---------------------------------------------------------------------------

fn validate_step_references(template: &TemplateDef, errors: &mut Vec<ValidationError>) {
    let TemplateBody::Steps(groups) = &template.body else {
        return;
    };
    let mut completed: HashSet<&str> = HashSet::new();

    for group in groups {
        for step in group {
            for (scope, name) in task_node_refs(step) {
                let message = match scope {
                    NodeScope::Tasks => format!(
                        "Step '{}' reads task '{}' inside a steps template",
                        step.name, name
                    ),
                    NodeScope::Steps if completed.contains(name) => continue,
                    NodeScope::Steps => format!(
                        "Step '{}' reads step '{}', which does not run in an earlier group",
                        step.name, name
                    ),
                };
                errors.push(ValidationError {
                    code: "M007",
                    message,
                    location: at(template, step),
                });
            }
        }
        completed.extend(group.iter().map(|s| s.name.as_str()));
    }
}

// ---------------------------------------------------------------------------
// Invariant: template outputs and bodies only read their own children
// ---------------------------------------------------------------------------

fn validate_output_references(template: &TemplateDef, errors: &mut Vec<ValidationError>) {
    let own_scope = match &template.body {
        TemplateBody::Dag(_) => Some(NodeScope::Tasks),
        TemplateBody::Steps(_) => Some(NodeScope::Steps),
        _ => None,
    };
    let children: HashSet<&str> = template.tasks().iter().map(|t| t.name.as_str()).collect();

    for expr in template.own_expressions() {
        for (scope, name) in node_refs(expr) {
            if own_scope == Some(scope) && children.contains(name) {
                continue;
            }
            errors.push(ValidationError {
                code: "M007",
                message: format!(
                    "Template '{}' reads '{}.{}', which is not one of its children",
                    template.name,
                    scope.prefix(),
                    name
                ),
                location: Some(template.name.clone()),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Invariant: input and workflow parameter references are declared
// ---------------------------------------------------------------------------

fn validate_parameter_references(
    def: &WorkflowDef,
    template: &TemplateDef,
    errors: &mut Vec<ValidationError>,
) {
    let inputs: HashSet<&str> = template.inputs.iter().map(|p| p.name.as_str()).collect();
    let mut exprs = template.own_expressions();
    for task in template.tasks() {
        exprs.extend(task.expressions());
    }
    for expr in exprs {
        check_parameter_refs(def, &inputs, expr, &template.name, errors);
    }
}

fn validate_workflow_defaults(def: &WorkflowDef, errors: &mut Vec<ValidationError>) {
    let no_inputs = HashSet::new();
    for param in &def.parameters {
        if let Some(ParameterDefault::Value(value)) = &param.default {
            for expr in value.expressions() {
                check_parameter_refs(def, &no_inputs, expr, &def.name, errors);
            }
        }
    }
}

fn check_parameter_refs(
    def: &WorkflowDef,
    inputs: &HashSet<&str>,
    expr: &Expr,
    location: &str,
    errors: &mut Vec<ValidationError>,
) {
    for reference in expr.references() {
        let Expr::Parameter { source } = reference else {
            continue;
        };
        let declared = match source {
            ParameterSource::Input { name } => inputs.contains(name.as_str()),
            ParameterSource::Workflow { name } => def.parameters.iter().any(|p| &p.name == name),
            ParameterSource::StepOutput { .. } | ParameterSource::TaskOutput { .. } => continue,
        };
        if !declared {
            errors.push(ValidationError {
                code: "M008",
                message: format!("Reference to undeclared parameter '{}'", source.path()),
                location: Some(location.to_string()),
            });
        }
    }
}

/// Distinct task/step names a task reads, in first-use order.
fn task_node_refs(task: &TaskDef) -> Vec<(NodeScope, &str)> {
    let mut seen = HashSet::new();
    task.expressions()
        .into_iter()
        .flat_map(node_refs)
        .filter(|r| seen.insert(*r))
        .collect()
}

/// Task/step names read by `expr`, through output parameters or metadata.
fn node_refs(expr: &Expr) -> Vec<(NodeScope, &str)> {
    expr.references()
        .into_iter()
        .filter_map(|r| match r {
            Expr::Parameter {
                source: ParameterSource::TaskOutput { task, .. },
            } => Some((NodeScope::Tasks, task.as_str())),
            Expr::Parameter {
                source: ParameterSource::StepOutput { step, .. },
            } => Some((NodeScope::Steps, step.as_str())),
            Expr::TaskData { scope, name, .. } => Some((*scope, name.as_str())),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> TemplateDef {
        TemplateDef::new(
            "echo",
            TemplateBody::Container(ContainerDef {
                image: "alpine".into(),
                command: vec!["echo".into()],
                args: vec![],
                env: vec![],
            }),
        )
        .input(ParameterDecl::new("msg").with_default("hi"))
    }

    fn workflow(main: TemplateDef) -> WorkflowDef {
        WorkflowDef {
            name: "wf".into(),
            entrypoint: "main".into(),
            parameters: vec![ParameterDecl::new("greeting")],
            templates: vec![main, echo()],
            service_account_name: None,
        }
    }

    fn dag(tasks: Vec<TaskDef>) -> TemplateDef {
        TemplateDef::new("main", TemplateBody::Dag(DagDef { tasks }))
    }

    fn codes(def: &WorkflowDef) -> Vec<&'static str> {
        validate_workflow(def).into_iter().map(|e| e.code).collect()
    }

    #[test]
    fn valid_dag_passes() {
        let def = workflow(dag(vec![
            TaskDef::new("a", "echo").arg("msg", Expr::workflow_param("greeting")),
            TaskDef::new("b", "echo")
                .depends_on("a")
                .arg("msg", Expr::task_output("a", "out")),
        ]));
        assert!(validate_workflow(&def).is_empty());
    }

    #[test]
    fn duplicate_templates_and_missing_entrypoint() {
        let mut def = workflow(dag(vec![]));
        def.templates.push(echo());
        def.entrypoint = "nope".into();
        assert_eq!(codes(&def), vec!["M001", "M002"]);
    }

    #[test]
    fn unknown_template_and_duplicate_task() {
        let def = workflow(dag(vec![
            TaskDef::new("a", "missing"),
            TaskDef::new("a", "echo"),
        ]));
        assert_eq!(codes(&def), vec!["M003", "M004"]);
    }

    #[test]
    fn unknown_dependency() {
        let def = workflow(dag(vec![TaskDef::new("a", "echo").depends_on("ghost")]));
        assert_eq!(codes(&def), vec!["M005"]);
    }

    #[test]
    fn dependency_cycle() {
        let def = workflow(dag(vec![
            TaskDef::new("a", "echo").depends_on("b"),
            TaskDef::new("b", "echo").depends_on("a"),
        ]));
        assert_eq!(codes(&def), vec!["M006"]);
    }

    #[test]
    fn reading_a_sibling_that_is_not_upstream() {
        let def = workflow(dag(vec![
            TaskDef::new("a", "echo"),
            TaskDef::new("b", "echo").arg("msg", Expr::task_output("a", "out")),
        ]));
        let errors = validate_workflow(&def);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "M007");
        assert_eq!(errors[0].location.as_deref(), Some("main/b"));
    }

    #[test]
    fn transitive_upstream_is_allowed() {
        let def = workflow(dag(vec![
            TaskDef::new("a", "echo"),
            TaskDef::new("b", "echo").depends_on("a"),
            TaskDef::new("c", "echo")
                .depends_on("b")
                .when(Expr::equals(Expr::task_data("a", "status"), "Succeeded")),
        ]));
        assert!(validate_workflow(&def).is_empty());
    }

    #[test]
    fn steps_read_earlier_groups_only() {
        let steps = TemplateDef::new(
            "main",
            TemplateBody::Steps(vec![
                vec![TaskDef::new("a", "echo")],
                vec![
                    TaskDef::new("b", "echo").arg("msg", Expr::step_output("a", "out")),
                    TaskDef::new("c", "echo").arg("msg", Expr::step_output("b", "out")),
                ],
            ]),
        );
        let errors = validate_workflow(&workflow(steps));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "M007");
        assert_eq!(errors[0].location.as_deref(), Some("main/c"));
    }

    #[test]
    fn undeclared_parameters() {
        let def = workflow(dag(vec![
            TaskDef::new("a", "echo")
                .arg("msg", Expr::concat([Expr::input("who"), Expr::workflow_param("nope")])),
        ]));
        assert_eq!(codes(&def), vec!["M008", "M008"]);
    }

    #[test]
    fn loop_and_dependency_shape() {
        let steps = TemplateDef::new(
            "main",
            TemplateBody::Steps(vec![vec![TaskDef::new("a", "echo")
                .depends_on("x")
                .with_param(Expr::workflow_param("greeting"))
                .with_sequence(Sequence::default())]]),
        );
        assert_eq!(codes(&workflow(steps)), vec!["M009", "M010"]);
    }

    #[test]
    fn outputs_read_own_children() {
        let main = dag(vec![TaskDef::new("a", "echo")])
            .output("ok", OutputSource::Parameter(Expr::task_output("a", "out")))
            .output("bad", OutputSource::Parameter(Expr::task_output("z", "out")));
        let errors = validate_workflow(&workflow(main));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("tasks.z"));
    }
}
