use super::{optional, required, to_json, Ctx, FnMethod, Method, Param, ParamKind as Kind};
use planner_core::plan::ops::{self, Outcome, Upsert};
use planner_core::plan::validate::ValidationReport;
use planner_core::plan::Plan;
use planner_core::{PlannerError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Param tables
// ---------------------------------------------------------------------------

const ID: Param = optional(
    "id",
    Kind::String,
    "Entity id; present means update, absent means create",
);
const VERSION: Param = optional(
    "version",
    Kind::Integer,
    "Current version of the entity (required with id)",
);

const INIT: &[Param] = &[
    optional("problem", Kind::String, "Problem statement"),
    optional("approach", Kind::String, "Chosen approach"),
];

const SET_OVERVIEW: &[Param] = &[
    optional("problem", Kind::String, "Problem statement"),
    optional("approach", Kind::String, "Chosen approach"),
    optional("version", Kind::Integer, "Guard the write against this overview version"),
];

const ADD_CONSTRAINT: &[Param] = &[required(
    "text",
    Kind::String,
    "Constraint the plan must respect",
)];

const ADD_RISK: &[Param] = &[
    required("risk", Kind::String, "What could go wrong"),
    optional("mitigation", Kind::String, "How it is contained"),
];

const SET_DECISION: &[Param] = &[
    ID,
    VERSION,
    optional("decision", Kind::String, "The decision taken"),
    optional("reasoning", Kind::String, "Why it was taken"),
];

const SET_MILESTONE: &[Param] = &[
    ID,
    VERSION,
    optional("name", Kind::String, "Milestone name (required on create)"),
    optional("files", Kind::StringList, "Files the milestone touches"),
    optional("flags", Kind::StringList, "Free-form flags"),
    optional("requirements", Kind::StringList, "Requirements"),
    optional("acceptance_criteria", Kind::StringList, "Acceptance criteria"),
    optional("tests", Kind::StringList, "Tests to write or run"),
];

const SET_INTENT: &[Param] = &[
    ID,
    VERSION,
    optional("milestone", Kind::String, "Parent milestone id (required on create)"),
    optional("file", Kind::String, "Target file"),
    optional("function", Kind::String, "Target function"),
    optional("behavior", Kind::String, "Intended behavior"),
    optional("decision_refs", Kind::StringList, "Decision ids this intent relies on"),
];

const SET_CHANGE: &[Param] = &[
    ID,
    VERSION,
    optional("milestone", Kind::String, "Parent milestone id (required on create)"),
    optional("file", Kind::String, "Target file"),
    optional("intent_ref", Kind::String, "Code intent this change implements"),
    optional("diff", Kind::String, "Unified diff"),
    optional("comments", Kind::String, "Reviewer-facing comments; may cite DL-NNN"),
];

const CREATE_DOC_CHANGE: &[Param] = &[
    required("milestone", Kind::String, "Parent milestone id"),
    required("file", Kind::String, "Target file"),
    required("doc_diff", Kind::String, "Documentation-only diff"),
    optional("intent_ref", Kind::String, "Code intent this change documents"),
    optional("comments", Kind::String, "Reviewer-facing comments"),
];

const SET_DOC_DIFF: &[Param] = &[
    required("id", Kind::String, "Code change id"),
    required("version", Kind::Integer, "Current version of the code change"),
    required("doc_diff", Kind::String, "Documentation overlay diff"),
];

const SET_DOC: &[Param] = &[
    required("milestone", Kind::String, "Milestone id"),
    required("version", Kind::Integer, "Current version of the milestone"),
    optional("module_comment", Kind::String, "Module-level comment"),
    optional("docstrings", Kind::Json, "Array of {function, docstring}"),
    optional("inline_comments", Kind::Json, "Array of {location, comment}"),
];

const SET_README: &[Param] = &[
    ID,
    VERSION,
    optional("path", Kind::String, "README path (required on create)"),
    optional("content", Kind::String, "README content (required on create)"),
];

const SET_DIAGRAM: &[Param] = &[
    ID,
    VERSION,
    optional("title", Kind::String, "Diagram title (required on create)"),
    optional("scope", Kind::String, "Milestone the diagram belongs to"),
    optional("description", Kind::String, "What the diagram shows"),
];

const ADD_NODE: &[Param] = &[
    required("diagram", Kind::String, "Diagram id"),
    required("node_id", Kind::String, "Node id, unique within the diagram"),
    required("label", Kind::String, "Display label"),
    optional("kind", Kind::String, "Node kind, e.g. service or store"),
];

const ADD_EDGE: &[Param] = &[
    required("diagram", Kind::String, "Diagram id"),
    required("source", Kind::String, "Source node id"),
    required("target", Kind::String, "Target node id"),
    optional("label", Kind::String, "Edge label"),
    optional("protocol", Kind::String, "Protocol, e.g. http or sql"),
];

const VALIDATE: &[Param] = &[optional(
    "phase",
    Kind::String,
    "Completeness phase: plan-design, plan-code or plan-docs",
)];

const BY_ID: &[Param] = &[required("id", Kind::String, "Entity id")];

const NONE: &[Param] = &[];

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub fn methods() -> Vec<Box<dyn Method>> {
    let table: Vec<FnMethod> = vec![
        FnMethod {
            name: "init",
            description: "Create plan.json; fails when a plan already exists",
            params: INIT,
            handler: init,
        },
        FnMethod {
            name: "set-overview",
            description: "Replace the problem statement and/or approach",
            params: SET_OVERVIEW,
            handler: |p, ctx| apply(p, ctx, ops::set_overview),
        },
        FnMethod {
            name: "add-constraint",
            description: "Append a constraint to the planning context",
            params: ADD_CONSTRAINT,
            handler: |p, ctx| apply(p, ctx, ops::add_constraint),
        },
        FnMethod {
            name: "add-risk",
            description: "Append a risk to the planning context",
            params: ADD_RISK,
            handler: |p, ctx| apply(p, ctx, ops::add_risk),
        },
        FnMethod {
            name: "set-decision",
            description: "Create a decision, or update one with id + version",
            params: SET_DECISION,
            handler: |p, ctx| upsert(p, ctx, ops::set_decision),
        },
        FnMethod {
            name: "set-milestone",
            description: "Create a milestone, or update one with id + version",
            params: SET_MILESTONE,
            handler: |p, ctx| upsert(p, ctx, ops::set_milestone),
        },
        FnMethod {
            name: "set-intent",
            description: "Create a code intent in a milestone, or update one with id + version",
            params: SET_INTENT,
            handler: |p, ctx| upsert(p, ctx, ops::set_intent),
        },
        FnMethod {
            name: "set-change",
            description: "Create a code change in a milestone, or update one with id + version",
            params: SET_CHANGE,
            handler: |p, ctx| upsert(p, ctx, ops::set_change),
        },
        FnMethod {
            name: "create-doc-change",
            description: "Create a documentation-only code change",
            params: CREATE_DOC_CHANGE,
            handler: |p, ctx| apply(p, ctx, ops::create_doc_change),
        },
        FnMethod {
            name: "set-doc-diff",
            description: "Set the documentation overlay of a code change",
            params: SET_DOC_DIFF,
            handler: |p, ctx| apply(p, ctx, ops::set_doc_diff),
        },
        FnMethod {
            name: "set-doc",
            description: "Update a milestone's documentation block",
            params: SET_DOC,
            handler: |p, ctx| apply(p, ctx, ops::set_doc),
        },
        FnMethod {
            name: "set-readme",
            description: "Create a README entry, or update one with id + version",
            params: SET_README,
            handler: |p, ctx| upsert(p, ctx, ops::set_readme),
        },
        FnMethod {
            name: "set-diagram",
            description: "Create a diagram, or update one with id + version",
            params: SET_DIAGRAM,
            handler: |p, ctx| upsert(p, ctx, ops::set_diagram),
        },
        FnMethod {
            name: "add-diagram-node",
            description: "Add a node to a diagram",
            params: ADD_NODE,
            handler: |p, ctx| apply(p, ctx, ops::add_diagram_node),
        },
        FnMethod {
            name: "add-diagram-edge",
            description: "Add an edge between two existing nodes of a diagram",
            params: ADD_EDGE,
            handler: |p, ctx| apply(p, ctx, ops::add_diagram_edge),
        },
        FnMethod {
            name: "validate",
            description: "Check references, and completeness for a phase when given",
            params: VALIDATE,
            handler: validate,
        },
        FnMethod {
            name: "get-plan",
            description: "Return the whole plan document",
            params: NONE,
            handler: |_, ctx| to_json(&ctx.plan_store().load()?),
        },
        FnMethod {
            name: "get-context",
            description: "Return the orchestrator's context.json",
            params: NONE,
            handler: |_, ctx| ctx.plan_store().read_context(),
        },
        FnMethod {
            name: "list-milestones",
            description: "List milestones with their intent and change counts",
            params: NONE,
            handler: list_milestones,
        },
        FnMethod {
            name: "list-decisions",
            description: "List the decision log",
            params: NONE,
            handler: |_, ctx| to_json(&ctx.plan_store().load()?.planning_context.decisions),
        },
        FnMethod {
            name: "list-diagrams",
            description: "List diagrams with their node and edge counts",
            params: NONE,
            handler: list_diagrams,
        },
        FnMethod {
            name: "get-milestone",
            description: "Return one milestone",
            params: BY_ID,
            handler: |p, ctx| get(p, ctx, |plan, id| to_json(plan.milestone(id)?)),
        },
        FnMethod {
            name: "get-decision",
            description: "Return one decision",
            params: BY_ID,
            handler: |p, ctx| get(p, ctx, |plan, id| to_json(plan.decision(id)?)),
        },
        FnMethod {
            name: "get-intent",
            description: "Return one code intent",
            params: BY_ID,
            handler: |p, ctx| get(p, ctx, |plan, id| to_json(plan.intent(id)?)),
        },
        FnMethod {
            name: "get-change",
            description: "Return one code change",
            params: BY_ID,
            handler: |p, ctx| get(p, ctx, |plan, id| to_json(plan.change(id)?)),
        },
        FnMethod {
            name: "get-diagram",
            description: "Return one diagram",
            params: BY_ID,
            handler: |p, ctx| get(p, ctx, |plan, id| to_json(plan.diagram(id)?)),
        },
        FnMethod {
            name: "get-readme",
            description: "Return one README entry",
            params: BY_ID,
            handler: |p, ctx| get(p, ctx, |plan, id| to_json(plan.readme(id)?)),
        },
    ];
    table
        .into_iter()
        .map(|m| Box::new(m) as Box<dyn Method>)
        .collect()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn apply<R, F>(params: Value, ctx: &Ctx, op: F) -> Result<Value>
where
    R: DeserializeOwned,
    F: FnOnce(&mut Plan, R) -> Result<Outcome>,
{
    let req: R = ops::from_params(params)?;
    let outcome = ctx.plan_store().mutate(|plan| op(plan, req))?;
    to_json(&outcome)
}

fn upsert<C, U, F>(params: Value, ctx: &Ctx, op: F) -> Result<Value>
where
    C: DeserializeOwned,
    U: DeserializeOwned,
    F: FnOnce(&mut Plan, Upsert<C, U>) -> Result<Outcome>,
{
    let req = Upsert::<C, U>::from_params(params)?;
    let outcome = ctx.plan_store().mutate(|plan| op(plan, req))?;
    to_json(&outcome)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ById {
    id: String,
}

fn get(params: Value, ctx: &Ctx, f: impl FnOnce(&Plan, &str) -> Result<Value>) -> Result<Value> {
    let req: ById = ops::from_params(params)?;
    let plan = ctx.plan_store().load()?;
    f(&plan, &req.id)
}

fn init(params: Value, ctx: &Ctx) -> Result<Value> {
    let req: ops::InitPlan = ops::from_params(params)?;
    let store = ctx.plan_store();
    store.create(&ops::init_plan(req))?;
    tracing::info!(path = %store.path().display(), "plan created");
    Ok(json!({
        "path": store.path(),
        "operation": "created",
    }))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ValidateParams {
    phase: Option<String>,
}

fn validate(params: Value, ctx: &Ctx) -> Result<Value> {
    let req: ValidateParams = ops::from_params(params)?;
    let plan = ctx.plan_store().load()?;
    let report = ValidationReport::build(&plan, req.phase.as_deref())?;
    for w in &report.warnings {
        tracing::warn!("{w}");
    }
    if !report.is_valid() {
        return Err(PlannerError::InvalidPlan {
            errors: report.errors,
            warnings: report.warnings,
        });
    }
    to_json(&report)
}

fn list_milestones(_: Value, ctx: &Ctx) -> Result<Value> {
    let plan = ctx.plan_store().load()?;
    Ok(Value::Array(
        plan.milestones
            .iter()
            .map(|m| {
                json!({
                    "id": m.id,
                    "version": m.version,
                    "name": m.name,
                    "code_intents": m.code_intents.len(),
                    "code_changes": m.code_changes.len(),
                })
            })
            .collect(),
    ))
}

fn list_diagrams(_: Value, ctx: &Ctx) -> Result<Value> {
    let plan = ctx.plan_store().load()?;
    Ok(Value::Array(
        plan.diagram_graphs
            .iter()
            .map(|d| {
                json!({
                    "id": d.id,
                    "version": d.version,
                    "title": d.title,
                    "scope": d.scope,
                    "nodes": d.nodes.len(),
                    "edges": d.edges.len(),
                })
            })
            .collect(),
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::find;
    use tempfile::TempDir;

    fn ctx(dir: &TempDir) -> Ctx {
        Ctx::load(dir.path(), None).unwrap()
    }

    fn call(ctx: &Ctx, name: &str, params: Value) -> Result<Value> {
        let methods = methods();
        find(&methods, name).unwrap().call(params, ctx)
    }

    #[test]
    fn init_then_second_init_fails() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(&dir);
        call(&ctx, "init", json!({"problem": "p"})).unwrap();
        let err = call(&ctx, "init", json!({})).unwrap_err();
        assert!(matches!(err, PlannerError::PlanExists(_)));
    }

    #[test]
    fn milestone_lifecycle_through_methods() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(&dir);
        call(&ctx, "init", json!({})).unwrap();

        let out = call(&ctx, "set-milestone", json!({"name": "Auth"})).unwrap();
        assert_eq!(out, json!({"id": "M-001", "version": 1, "operation": "created"}));

        let out = call(
            &ctx,
            "set-milestone",
            json!({"id": "M-001", "version": 1, "files": ["src/auth.rs"]}),
        )
        .unwrap();
        assert_eq!(out["version"], 2);

        let m = call(&ctx, "get-milestone", json!({"id": "M-001"})).unwrap();
        assert_eq!(m["files"], json!(["src/auth.rs"]));

        let list = call(&ctx, "list-milestones", json!({})).unwrap();
        assert_eq!(list[0]["name"], "Auth");
    }

    #[test]
    fn validate_reports_phase_errors() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(&dir);
        call(&ctx, "init", json!({})).unwrap();

        let report = call(&ctx, "validate", json!({})).unwrap();
        assert_eq!(report["errors"], json!([]));

        let err = call(&ctx, "validate", json!({"phase": "plan-design"})).unwrap_err();
        assert!(matches!(err, PlannerError::InvalidPlan { .. }));

        let err = call(&ctx, "validate", json!({"phase": "plan-nope"})).unwrap_err();
        assert!(matches!(err, PlannerError::UnknownPhase { .. }));
    }

    #[test]
    fn failed_validation_still_reports_warnings() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(&dir);
        call(&ctx, "init", json!({})).unwrap();
        call(&ctx, "set-diagram", json!({"title": "Runtime"})).unwrap();
        call(
            &ctx,
            "add-diagram-node",
            json!({"diagram": "DG-001", "node_id": "cache", "label": "Cache"}),
        )
        .unwrap();

        let err = call(&ctx, "validate", json!({"phase": "plan-design"})).unwrap_err();
        let data = err.data().unwrap();
        assert_eq!(data["errors"], json!(["plan has no milestones"]));
        assert_eq!(data["warnings"], json!(["DG-001: node 'cache' has no edges"]));
    }

    #[test]
    fn get_context_passes_file_through() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("context.json"), r#"{"step": 3}"#).unwrap();
        let ctx = ctx(&dir);
        assert_eq!(call(&ctx, "get-context", json!({})).unwrap()["step"], 3);
    }

    #[test]
    fn methods_before_init_report_plan_not_found() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(&dir);
        let err = call(&ctx, "set-decision", json!({"decision": "a", "reasoning": "b"}))
            .unwrap_err();
        assert!(matches!(err, PlannerError::PlanNotFound(_)));
        assert!(err.to_string().contains("planner plan init"));
    }
}
