//! Mutation operations over an in-memory [`Plan`].
//!
//! Each operation checks everything it needs (parent existence, references,
//! required text, CAS version) before it touches the plan, so an `Err` never
//! leaves a half-applied change behind. Persist through
//! [`PlanStore::mutate`](super::PlanStore::mutate).

use super::*;
use crate::types::Operation;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub id: String,
    pub version: u32,
    pub operation: Operation,
}

impl Outcome {
    fn created(id: impl Into<String>, version: u32) -> Self {
        Self {
            id: id.into(),
            version,
            operation: Operation::Created,
        }
    }

    fn updated(id: impl Into<String>, version: u32) -> Self {
        Self {
            id: id.into(),
            version,
            operation: Operation::Updated,
        }
    }
}

// ---------------------------------------------------------------------------
// Request decoding
// ---------------------------------------------------------------------------

/// A create request or a CAS update request for the same entity kind.
#[derive(Debug, Clone)]
pub enum Upsert<C, U> {
    Create(C),
    Update(U),
}

impl<C: DeserializeOwned, U: DeserializeOwned> Upsert<C, U> {
    /// Params carrying an `id` decode as an update, which then requires
    /// `version`; params without one decode as a create.
    pub fn from_params(params: Value) -> Result<Self> {
        let params = strip_nulls(params);
        let id = match params.get("id") {
            None => return Ok(Upsert::Create(from_params(params)?)),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        if params.get("version").is_none() {
            return Err(PlannerError::Schema(format!(
                "version is required when updating {id}: read it and pass its current version"
            )));
        }
        Ok(Upsert::Update(from_params(params)?))
    }
}

/// Decode method params into a typed request. Null values count as absent.
pub fn from_params<T: DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(strip_nulls(params)).map_err(|e| PlannerError::Schema(e.to_string()))
}

fn strip_nulls(params: Value) -> Value {
    match params {
        Value::Object(map) => Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Shared checks
// ---------------------------------------------------------------------------

fn check_version<T: Versioned>(entity: &T, supplied: u32) -> Result<()> {
    if entity.version() == supplied {
        return Ok(());
    }
    Err(PlannerError::VersionMismatch {
        kind: T::KIND,
        id: entity.id().to_string(),
        supplied,
        current: entity.version(),
        state: Box::new(serde_json::to_value(entity).unwrap_or(Value::Null)),
    })
}

fn bump<T: Versioned>(entity: &mut T) -> Outcome {
    *entity.version_mut() += 1;
    Outcome::updated(entity.id(), entity.version())
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PlannerError::Schema(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_opt_text(field: &str, value: Option<&String>) -> Result<()> {
    match value {
        Some(v) => require_text(field, v),
        None => Ok(()),
    }
}

fn check_decision_refs(plan: &Plan, owner: &str, refs: &[String]) -> Result<()> {
    let missing: Vec<String> = refs
        .iter()
        .filter(|r| !plan.has_decision(r))
        .map(|r| {
            format!(
                "{owner}: decision_refs entry '{r}' does not exist (known decisions: {})",
                known(plan.planning_context.decisions.iter().map(|d| d.id.as_str()))
            )
        })
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PlannerError::Validation(missing))
    }
}

fn check_comment_refs(plan: &Plan, owner: &str, comments: &str) -> Result<()> {
    let missing: Vec<String> = validate::decision_mentions(comments)
        .filter(|r| !plan.has_decision(r))
        .map(|r| {
            format!(
                "{owner}: comments cite '{r}' which does not exist (known decisions: {})",
                known(plan.planning_context.decisions.iter().map(|d| d.id.as_str()))
            )
        })
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PlannerError::Validation(missing))
    }
}

fn check_intent_ref(plan: &Plan, owner: &str, intent_ref: Option<&String>) -> Result<()> {
    match intent_ref {
        Some(r) if !plan.has_intent(r) => Err(PlannerError::Validation(vec![format!(
            "{owner}: intent_ref '{r}' does not exist (known intents: {})",
            known(plan.intents().map(|i| i.id.as_str()))
        )])),
        _ => Ok(()),
    }
}

fn check_scope(plan: &Plan, owner: &str, scope: Option<&String>) -> Result<()> {
    match scope {
        Some(s) if plan.milestone(s).is_err() => Err(PlannerError::Validation(vec![format!(
            "{owner}: scope '{s}' does not match any milestone"
        )])),
        _ => Ok(()),
    }
}

/// When the caller names the parent milestone of a child entity, it must be
/// the one that actually owns it.
fn check_parent(
    plan: &Plan,
    child_kind: &'static str,
    child: &str,
    milestone: Option<&String>,
) -> Result<()> {
    let Some(m) = milestone else {
        return Ok(());
    };
    plan.milestone(m)?;
    match plan.parent_of(child) {
        Some(parent) if &parent.id == m => Ok(()),
        _ => Err(PlannerError::not_found(child_kind, format!("{child} in milestone {m}"))),
    }
}

fn known<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    let ids: Vec<&str> = ids.collect();
    if ids.is_empty() {
        "none".to_string()
    } else {
        ids.join(", ")
    }
}

// ---------------------------------------------------------------------------
// Plan-level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitPlan {
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub approach: String,
}

pub fn init_plan(req: InitPlan) -> Plan {
    Plan::new(req.problem, req.approach)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetOverview {
    pub problem: Option<String>,
    pub approach: Option<String>,
    /// Optional CAS guard; when absent the write is unconditional.
    pub version: Option<u32>,
}

pub fn set_overview(plan: &mut Plan, req: SetOverview) -> Result<Outcome> {
    if let Some(v) = req.version {
        if v != plan.overview.version {
            return Err(PlannerError::VersionMismatch {
                kind: "overview",
                id: "overview".to_string(),
                supplied: v,
                current: plan.overview.version,
                state: Box::new(serde_json::to_value(&plan.overview).unwrap_or(Value::Null)),
            });
        }
    }
    let overview = &mut plan.overview;
    if let Some(p) = req.problem {
        overview.problem = p;
    }
    if let Some(a) = req.approach {
        overview.approach = a;
    }
    overview.version += 1;
    Ok(Outcome::updated("overview", overview.version))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewConstraint {
    pub text: String,
}

pub fn add_constraint(plan: &mut Plan, req: NewConstraint) -> Result<Outcome> {
    require_text("text", &req.text)?;
    let constraints = &mut plan.planning_context.constraints;
    let id = constraint_id(constraints.len() + 1);
    constraints.push(Constraint {
        id: id.clone(),
        text: req.text,
    });
    Ok(Outcome::created(id, 1))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewRisk {
    pub risk: String,
    pub mitigation: Option<String>,
}

pub fn add_risk(plan: &mut Plan, req: NewRisk) -> Result<Outcome> {
    require_text("risk", &req.risk)?;
    let risks = &mut plan.planning_context.risks;
    let id = risk_id(risks.len() + 1);
    risks.push(Risk {
        id: id.clone(),
        risk: req.risk,
        mitigation: req.mitigation,
    });
    Ok(Outcome::created(id, 1))
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewDecision {
    pub decision: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecisionUpdate {
    pub id: String,
    pub version: u32,
    pub decision: Option<String>,
    pub reasoning: Option<String>,
}

pub fn set_decision(plan: &mut Plan, req: Upsert<NewDecision, DecisionUpdate>) -> Result<Outcome> {
    match req {
        Upsert::Create(c) => {
            require_text("decision", &c.decision)?;
            require_text("reasoning", &c.reasoning)?;
            let decisions = &mut plan.planning_context.decisions;
            let id = decision_id(decisions.len() + 1);
            decisions.push(Decision {
                id: id.clone(),
                version: 1,
                decision: c.decision,
                reasoning: c.reasoning,
            });
            Ok(Outcome::created(id, 1))
        }
        Upsert::Update(u) => {
            require_opt_text("decision", u.decision.as_ref())?;
            require_opt_text("reasoning", u.reasoning.as_ref())?;
            let d = plan.decision_mut(&u.id)?;
            check_version(d, u.version)?;
            if let Some(v) = u.decision {
                d.decision = v;
            }
            if let Some(v) = u.reasoning {
                d.reasoning = v;
            }
            Ok(bump(d))
        }
    }
}

// ---------------------------------------------------------------------------
// Milestones
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewMilestone {
    pub name: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub tests: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MilestoneUpdate {
    pub id: String,
    pub version: u32,
    pub name: Option<String>,
    pub files: Option<Vec<String>>,
    pub flags: Option<Vec<String>>,
    pub requirements: Option<Vec<String>>,
    pub acceptance_criteria: Option<Vec<String>>,
    pub tests: Option<Vec<String>>,
}

pub fn set_milestone(
    plan: &mut Plan,
    req: Upsert<NewMilestone, MilestoneUpdate>,
) -> Result<Outcome> {
    match req {
        Upsert::Create(c) => {
            require_text("name", &c.name)?;
            let id = milestone_id(plan.milestones.len() + 1);
            plan.milestones.push(Milestone {
                id: id.clone(),
                version: 1,
                name: c.name,
                files: c.files,
                flags: c.flags,
                requirements: c.requirements,
                acceptance_criteria: c.acceptance_criteria,
                tests: c.tests,
                code_intents: Vec::new(),
                code_changes: Vec::new(),
                documentation: Documentation::default(),
            });
            Ok(Outcome::created(id, 1))
        }
        Upsert::Update(u) => {
            require_opt_text("name", u.name.as_ref())?;
            let m = plan.milestone_mut(&u.id)?;
            check_version(m, u.version)?;
            if let Some(v) = u.name {
                m.name = v;
            }
            if let Some(v) = u.files {
                m.files = v;
            }
            if let Some(v) = u.flags {
                m.flags = v;
            }
            if let Some(v) = u.requirements {
                m.requirements = v;
            }
            if let Some(v) = u.acceptance_criteria {
                m.acceptance_criteria = v;
            }
            if let Some(v) = u.tests {
                m.tests = v;
            }
            Ok(bump(m))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocUpdate {
    pub milestone: String,
    pub version: u32,
    pub module_comment: Option<String>,
    pub docstrings: Option<Vec<FunctionDoc>>,
    pub inline_comments: Option<Vec<InlineComment>>,
}

/// Replace parts of a milestone's documentation block. Versioned against the
/// milestone itself.
pub fn set_doc(plan: &mut Plan, req: DocUpdate) -> Result<Outcome> {
    let m = plan.milestone_mut(&req.milestone)?;
    check_version(m, req.version)?;
    let doc = &mut m.documentation;
    if let Some(v) = req.module_comment {
        doc.module_comment = Some(v).filter(|s| !s.trim().is_empty());
    }
    if let Some(v) = req.docstrings {
        doc.docstrings = v;
    }
    if let Some(v) = req.inline_comments {
        doc.inline_comments = v;
    }
    Ok(bump(m))
}

// ---------------------------------------------------------------------------
// Code intents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewIntent {
    pub milestone: String,
    pub file: String,
    pub behavior: String,
    pub function: Option<String>,
    #[serde(default)]
    pub decision_refs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntentUpdate {
    pub id: String,
    pub version: u32,
    pub milestone: Option<String>,
    pub file: Option<String>,
    pub function: Option<String>,
    pub behavior: Option<String>,
    pub decision_refs: Option<Vec<String>>,
}

pub fn set_intent(plan: &mut Plan, req: Upsert<NewIntent, IntentUpdate>) -> Result<Outcome> {
    match req {
        Upsert::Create(c) => {
            require_text("file", &c.file)?;
            require_text("behavior", &c.behavior)?;
            let next = plan.milestone(&c.milestone)?.code_intents.len() + 1;
            let id = intent_id(&c.milestone, next);
            check_decision_refs(plan, &id, &c.decision_refs)?;

            plan.milestone_mut(&c.milestone)?.code_intents.push(CodeIntent {
                id: id.clone(),
                version: 1,
                file: c.file,
                function: c.function,
                behavior: c.behavior,
                decision_refs: c.decision_refs,
            });
            Ok(Outcome::created(id, 1))
        }
        Upsert::Update(u) => {
            require_opt_text("file", u.file.as_ref())?;
            require_opt_text("behavior", u.behavior.as_ref())?;
            check_parent(plan, CodeIntent::KIND, &u.id, u.milestone.as_ref())?;
            check_version(plan.intent(&u.id)?, u.version)?;
            if let Some(refs) = &u.decision_refs {
                check_decision_refs(plan, &u.id, refs)?;
            }

            let i = plan.intent_mut(&u.id)?;
            if let Some(v) = u.file {
                i.file = v;
            }
            if let Some(v) = u.function {
                i.function = Some(v).filter(|s| !s.trim().is_empty());
            }
            if let Some(v) = u.behavior {
                i.behavior = v;
            }
            if let Some(v) = u.decision_refs {
                i.decision_refs = v;
            }
            Ok(bump(i))
        }
    }
}

// ---------------------------------------------------------------------------
// Code changes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewChange {
    pub milestone: String,
    pub file: String,
    pub intent_ref: Option<String>,
    #[serde(default)]
    pub diff: String,
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeUpdate {
    pub id: String,
    pub version: u32,
    pub milestone: Option<String>,
    pub file: Option<String>,
    pub intent_ref: Option<String>,
    pub diff: Option<String>,
    pub comments: Option<String>,
}

pub fn set_change(plan: &mut Plan, req: Upsert<NewChange, ChangeUpdate>) -> Result<Outcome> {
    match req {
        Upsert::Create(c) => push_change(
            plan,
            &c.milestone,
            c.file,
            c.intent_ref,
            c.diff,
            String::new(),
            c.comments,
        ),
        Upsert::Update(u) => {
            require_opt_text("file", u.file.as_ref())?;
            check_parent(plan, CodeChange::KIND, &u.id, u.milestone.as_ref())?;
            check_version(plan.change(&u.id)?, u.version)?;
            check_intent_ref(plan, &u.id, u.intent_ref.as_ref())?;
            if let Some(comments) = &u.comments {
                check_comment_refs(plan, &u.id, comments)?;
            }

            let c = plan.change_mut(&u.id)?;
            if let Some(v) = u.file {
                c.file = v;
            }
            if let Some(v) = u.intent_ref {
                c.intent_ref = Some(v);
            }
            if let Some(v) = u.diff {
                c.diff = v;
            }
            if let Some(v) = u.comments {
                c.comments = v;
            }
            Ok(bump(c))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewDocChange {
    pub milestone: String,
    pub file: String,
    pub doc_diff: String,
    pub intent_ref: Option<String>,
    #[serde(default)]
    pub comments: String,
}

/// A documentation-only change: empty code diff, non-empty doc overlay.
pub fn create_doc_change(plan: &mut Plan, req: NewDocChange) -> Result<Outcome> {
    require_text("doc_diff", &req.doc_diff)?;
    push_change(
        plan,
        &req.milestone,
        req.file,
        req.intent_ref,
        String::new(),
        req.doc_diff,
        req.comments,
    )
}

fn push_change(
    plan: &mut Plan,
    milestone: &str,
    file: String,
    intent_ref: Option<String>,
    diff: String,
    doc_diff: String,
    comments: String,
) -> Result<Outcome> {
    require_text("file", &file)?;
    let next = plan.milestone(milestone)?.code_changes.len() + 1;
    let id = change_id(milestone, next);
    check_intent_ref(plan, &id, intent_ref.as_ref())?;
    check_comment_refs(plan, &id, &comments)?;

    plan.milestone_mut(milestone)?.code_changes.push(CodeChange {
        id: id.clone(),
        version: 1,
        intent_ref,
        file,
        diff,
        doc_diff,
        comments,
    });
    Ok(Outcome::created(id, 1))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocDiffUpdate {
    pub id: String,
    pub version: u32,
    pub doc_diff: String,
}

pub fn set_doc_diff(plan: &mut Plan, req: DocDiffUpdate) -> Result<Outcome> {
    let c = plan.change_mut(&req.id)?;
    check_version(c, req.version)?;
    c.doc_diff = req.doc_diff;
    Ok(bump(c))
}

// ---------------------------------------------------------------------------
// README entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewReadme {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadmeUpdate {
    pub id: String,
    pub version: u32,
    pub path: Option<String>,
    pub content: Option<String>,
}

pub fn set_readme(plan: &mut Plan, req: Upsert<NewReadme, ReadmeUpdate>) -> Result<Outcome> {
    match req {
        Upsert::Create(c) => {
            require_text("path", &c.path)?;
            require_text("content", &c.content)?;
            let id = readme_id(plan.readme_entries.len() + 1);
            plan.readme_entries.push(ReadmeEntry {
                id: id.clone(),
                version: 1,
                path: c.path,
                content: c.content,
            });
            Ok(Outcome::created(id, 1))
        }
        Upsert::Update(u) => {
            require_opt_text("path", u.path.as_ref())?;
            let r = plan.readme_mut(&u.id)?;
            check_version(r, u.version)?;
            if let Some(v) = u.path {
                r.path = v;
            }
            if let Some(v) = u.content {
                r.content = v;
            }
            Ok(bump(r))
        }
    }
}

// ---------------------------------------------------------------------------
// Diagrams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewDiagram {
    pub title: String,
    pub scope: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagramUpdate {
    pub id: String,
    pub version: u32,
    pub title: Option<String>,
    pub scope: Option<String>,
    pub description: Option<String>,
}

pub fn set_diagram(plan: &mut Plan, req: Upsert<NewDiagram, DiagramUpdate>) -> Result<Outcome> {
    match req {
        Upsert::Create(c) => {
            require_text("title", &c.title)?;
            let id = diagram_id(plan.diagram_graphs.len() + 1);
            check_scope(plan, &id, c.scope.as_ref())?;
            plan.diagram_graphs.push(DiagramGraph {
                id: id.clone(),
                version: 1,
                title: c.title,
                scope: c.scope,
                description: c.description,
                nodes: Vec::new(),
                edges: Vec::new(),
            });
            Ok(Outcome::created(id, 1))
        }
        Upsert::Update(u) => {
            require_opt_text("title", u.title.as_ref())?;
            check_version(plan.diagram(&u.id)?, u.version)?;
            check_scope(plan, &u.id, u.scope.as_ref())?;
            let d = plan.diagram_mut(&u.id)?;
            if let Some(v) = u.title {
                d.title = v;
            }
            if let Some(v) = u.scope {
                d.scope = Some(v);
            }
            if let Some(v) = u.description {
                d.description = Some(v);
            }
            Ok(bump(d))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewNode {
    pub diagram: String,
    pub node_id: String,
    pub label: String,
    pub kind: Option<String>,
}

/// Append a node. The outcome reports the node id and the diagram's new
/// version.
pub fn add_diagram_node(plan: &mut Plan, req: NewNode) -> Result<Outcome> {
    require_text("node_id", &req.node_id)?;
    require_text("label", &req.label)?;
    let d = plan.diagram_mut(&req.diagram)?;
    if d.has_node(&req.node_id) {
        return Err(PlannerError::AlreadyExists {
            kind: "diagram node",
            id: format!("{} in {}", req.node_id, d.id),
        });
    }
    d.nodes.push(DiagramNode {
        id: req.node_id.clone(),
        label: req.label,
        kind: req.kind,
    });
    d.version += 1;
    Ok(Outcome::created(req.node_id, d.version))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewEdge {
    pub diagram: String,
    pub source: String,
    pub target: String,
    pub label: Option<String>,
    pub protocol: Option<String>,
}

/// Insert the edge, validate the diagram with it in place, and pop it back
/// out if the diagram no longer validates.
pub fn add_diagram_edge(plan: &mut Plan, req: NewEdge) -> Result<Outcome> {
    let d = plan.diagram_mut(&req.diagram)?;
    let id = format!("{}->{}", req.source, req.target);
    d.edges.push(DiagramEdge {
        source: req.source,
        target: req.target,
        label: req.label,
        protocol: req.protocol,
    });

    let errors = validate::validate_diagram_edges(d);
    if !errors.is_empty() {
        d.edges.pop();
        return Err(PlannerError::Validation(errors));
    }
    d.version += 1;
    Ok(Outcome::created(id, d.version))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
