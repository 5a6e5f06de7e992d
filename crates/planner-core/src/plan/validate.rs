//! Reference-integrity and phase-completeness checks.
//!
//! Every check accumulates the full list of problems instead of stopping at
//! the first one, so a caller can fix everything in a single pass.

use super::{DiagramGraph, Plan};
use crate::error::Result;
use crate::types::PlanPhase;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

static DECISION_TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn decision_token_re() -> &'static Regex {
    DECISION_TOKEN_RE.get_or_init(|| Regex::new(r"\bDL-\d{3,}\b").expect("static regex"))
}

/// `DL-NNN` tokens cited in free text.
pub fn decision_mentions(text: &str) -> impl Iterator<Item = &str> {
    decision_token_re().find_iter(text).map(|m| m.as_str())
}

// ---------------------------------------------------------------------------
// Reference integrity
// ---------------------------------------------------------------------------

/// Every dangling cross-reference in the plan, as human-readable messages.
pub fn validate_refs(plan: &Plan) -> Vec<String> {
    let mut errors = Vec::new();

    errors.extend(duplicate_ids(plan));

    for milestone in &plan.milestones {
        for intent in &milestone.code_intents {
            for r in &intent.decision_refs {
                if !plan.has_decision(r) {
                    errors.push(format!(
                        "{}: decision_refs entry '{r}' does not match any decision",
                        intent.id
                    ));
                }
            }
        }
        for change in &milestone.code_changes {
            if let Some(r) = &change.intent_ref {
                if !plan.has_intent(r) {
                    errors.push(format!(
                        "{}: intent_ref '{r}' does not match any code intent",
                        change.id
                    ));
                }
            }
            for token in decision_mentions(&change.comments) {
                if !plan.has_decision(token) {
                    errors.push(format!(
                        "{}: comments cite '{token}' which does not match any decision",
                        change.id
                    ));
                }
            }
        }
    }

    for diagram in &plan.diagram_graphs {
        if let Some(scope) = &diagram.scope {
            if plan.milestone(scope).is_err() {
                errors.push(format!(
                    "{}: scope '{scope}' does not match any milestone",
                    diagram.id
                ));
            }
        }
        errors.extend(validate_diagram_edges(diagram));
    }

    errors
}

fn duplicate_ids(plan: &Plan) -> Vec<String> {
    let ids = plan
        .milestones
        .iter()
        .map(|m| m.id.as_str())
        .chain(plan.planning_context.decisions.iter().map(|d| d.id.as_str()))
        .chain(plan.intents().map(|i| i.id.as_str()))
        .chain(plan.changes().map(|c| c.id.as_str()))
        .chain(plan.diagram_graphs.iter().map(|d| d.id.as_str()))
        .chain(plan.readme_entries.iter().map(|r| r.id.as_str()));

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut errors = Vec::new();
    for id in ids {
        if !seen.insert(id) && reported.insert(id) {
            errors.push(format!("duplicate id '{id}'"));
        }
    }
    errors
}

/// Edge endpoints must name nodes of the same diagram.
pub fn validate_diagram_edges(diagram: &DiagramGraph) -> Vec<String> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for node in &diagram.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(format!("{}: duplicate node id '{}'", diagram.id, node.id));
        }
    }

    for edge in &diagram.edges {
        for (end, node) in [("source", &edge.source), ("target", &edge.target)] {
            if !seen.contains(node.as_str()) {
                errors.push(format!(
                    "{}: edge {} -> {} has {end} '{node}' which is not a node of this diagram",
                    diagram.id, edge.source, edge.target
                ));
            }
        }
    }

    errors
}

/// Advisory findings that never block a write: nodes without any edge.
pub fn diagram_warnings(plan: &Plan) -> Vec<String> {
    let mut warnings = Vec::new();
    for diagram in &plan.diagram_graphs {
        let mut degree: HashMap<&str, usize> =
            diagram.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
        for edge in &diagram.edges {
            for end in [edge.source.as_str(), edge.target.as_str()] {
                if let Some(d) = degree.get_mut(end) {
                    *d += 1;
                }
            }
        }
        for node in &diagram.nodes {
            if degree.get(node.id.as_str()) == Some(&0) {
                warnings.push(format!(
                    "{}: node '{}' has no edges",
                    diagram.id, node.id
                ));
            }
        }
    }
    warnings
}

// ---------------------------------------------------------------------------
// Phase completeness
// ---------------------------------------------------------------------------

/// Completeness problems for a named phase. Unknown phase names are an
/// error rather than a silent pass.
pub fn validate_completeness(plan: &Plan, phase: &str) -> Result<Vec<String>> {
    let phase: PlanPhase = phase.parse()?;
    Ok(check_completeness(plan, phase))
}

pub fn check_completeness(plan: &Plan, phase: PlanPhase) -> Vec<String> {
    match phase {
        PlanPhase::PlanDesign => design_completeness(plan),
        PlanPhase::PlanCode => code_completeness(plan),
        PlanPhase::PlanDocs => docs_completeness(plan),
    }
}

fn design_completeness(plan: &Plan) -> Vec<String> {
    let mut errors = Vec::new();
    if plan.milestones.is_empty() {
        errors.push("plan has no milestones".to_string());
    }
    for m in &plan.milestones {
        if m.code_intents.is_empty() {
            errors.push(format!("{} ({}): has no code intents", m.id, m.name));
        }
        for intent in &m.code_intents {
            if intent.behavior.trim().is_empty() {
                errors.push(format!("{}: behavior is empty", intent.id));
            }
        }
    }
    errors
}

fn code_completeness(plan: &Plan) -> Vec<String> {
    let implemented: HashSet<&str> = plan
        .changes()
        .filter_map(|c| c.intent_ref.as_deref())
        .collect();

    let mut errors = Vec::new();
    for intent in plan.intents() {
        if !implemented.contains(intent.id.as_str()) {
            errors.push(format!("{}: no code change references this intent", intent.id));
        }
    }
    for change in plan.changes() {
        if !change.is_doc_only() && change.diff.trim().is_empty() {
            errors.push(format!("{}: diff is empty", change.id));
        }
    }
    errors
}

fn docs_completeness(plan: &Plan) -> Vec<String> {
    plan.changes()
        .filter(|c| !c.diff.trim().is_empty() && c.doc_diff.trim().is_empty())
        .map(|c| format!("{}: has a code diff but no doc_diff", c.id))
        .collect()
}

// ---------------------------------------------------------------------------
// ValidationReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Reference integrity, plus completeness for `phase` when given.
    pub fn build(plan: &Plan, phase: Option<&str>) -> Result<Self> {
        let mut errors = validate_refs(plan);
        if let Some(p) = phase {
            errors.extend(validate_completeness(plan, p)?);
        }
        Ok(Self {
            phase: phase.map(str::to_string),
            errors,
            warnings: diagram_warnings(plan),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlannerError;
    use crate::plan::{
        CodeChange, CodeIntent, Decision, DiagramEdge, DiagramNode, Documentation, Milestone,
    };

    fn milestone(id: &str) -> Milestone {
        Milestone {
            id: id.into(),
            version: 1,
            name: "Auth".into(),
            files: Vec::new(),
            flags: Vec::new(),
            requirements: Vec::new(),
            acceptance_criteria: Vec::new(),
            tests: Vec::new(),
            code_intents: Vec::new(),
            code_changes: Vec::new(),
            documentation: Documentation::default(),
        }
    }

    fn intent(id: &str, refs: &[&str]) -> CodeIntent {
        CodeIntent {
            id: id.into(),
            version: 1,
            file: "src/lib.rs".into(),
            function: None,
            behavior: "does the thing".into(),
            decision_refs: refs.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn change(id: &str, intent_ref: Option<&str>, diff: &str, doc_diff: &str) -> CodeChange {
        CodeChange {
            id: id.into(),
            version: 1,
            intent_ref: intent_ref.map(str::to_string),
            file: "src/lib.rs".into(),
            diff: diff.into(),
            doc_diff: doc_diff.into(),
            comments: String::new(),
        }
    }

    fn diagram(nodes: &[&str], edges: &[(&str, &str)]) -> DiagramGraph {
        DiagramGraph {
            id: "DG-001".into(),
            version: 1,
            title: "arch".into(),
            scope: None,
            description: None,
            nodes: nodes
                .iter()
                .map(|n| DiagramNode {
                    id: n.to_string(),
                    label: n.to_uppercase(),
                    kind: None,
                })
                .collect(),
            edges: edges
                .iter()
                .map(|(s, t)| DiagramEdge {
                    source: s.to_string(),
                    target: t.to_string(),
                    label: None,
                    protocol: None,
                })
                .collect(),
        }
    }

    fn plan_with_decision() -> Plan {
        let mut plan = Plan::new("p", "a");
        plan.planning_context.decisions.push(Decision {
            id: "DL-001".into(),
            version: 1,
            decision: "d".into(),
            reasoning: "r".into(),
        });
        plan
    }

    #[test]
    fn clean_plan_has_no_ref_errors() {
        let mut plan = plan_with_decision();
        let mut m = milestone("M-001");
        m.code_intents.push(intent("CI-M-001-001", &["DL-001"]));
        m.code_changes
            .push(change("CC-M-001-001", Some("CI-M-001-001"), "+x", ""));
        plan.milestones.push(m);
        assert!(validate_refs(&plan).is_empty());
    }

    #[test]
    fn all_dangling_refs_are_reported_together() {
        let mut plan = plan_with_decision();
        let mut m = milestone("M-001");
        m.code_intents
            .push(intent("CI-M-001-001", &["DL-404", "DL-405"]));
        let mut c = change("CC-M-001-001", Some("CI-M-001-999"), "+x", "");
        c.comments = "follows DL-001 and DL-777".into();
        m.code_changes.push(c);
        plan.milestones.push(m);

        let errors = validate_refs(&plan);
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("DL-404")));
        assert!(errors.iter().any(|e| e.contains("DL-405")));
        assert!(errors.iter().any(|e| e.contains("CI-M-001-999")));
        assert!(errors.iter().any(|e| e.contains("DL-777")));
    }

    #[test]
    fn duplicate_ids_reported_once() {
        let mut plan = Plan::new("p", "a");
        plan.milestones.push(milestone("M-001"));
        plan.milestones.push(milestone("M-001"));
        plan.milestones.push(milestone("M-001"));
        assert_eq!(validate_refs(&plan), vec!["duplicate id 'M-001'".to_string()]);
    }

    #[test]
    fn diagram_scope_must_name_a_milestone() {
        let mut plan = Plan::new("p", "a");
        let mut d = diagram(&["a", "b"], &[("a", "b")]);
        d.scope = Some("M-009".into());
        plan.diagram_graphs.push(d);
        let errors = validate_refs(&plan);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("M-009"));
    }

    #[test]
    fn edge_endpoints_must_exist() {
        let d = diagram(&["a"], &[("a", "ghost"), ("nobody", "a")]);
        let errors = validate_diagram_edges(&d);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("target 'ghost'"));
        assert!(errors[1].contains("source 'nobody'"));
    }

    #[test]
    fn orphan_nodes_are_warnings_not_errors() {
        let mut plan = Plan::new("p", "a");
        plan.diagram_graphs
            .push(diagram(&["a", "b", "lonely"], &[("a", "b")]));
        assert!(validate_refs(&plan).is_empty());
        let warnings = diagram_warnings(&plan);
        assert_eq!(warnings, vec!["DG-001: node 'lonely' has no edges".to_string()]);
    }

    #[test]
    fn design_phase_requires_intents_per_milestone() {
        let mut plan = Plan::new("p", "a");
        assert_eq!(
            validate_completeness(&plan, "plan-design").unwrap(),
            vec!["plan has no milestones".to_string()]
        );
        plan.milestones.push(milestone("M-001"));
        let errors = validate_completeness(&plan, "plan-design").unwrap();
        assert!(errors[0].contains("M-001"));
    }

    #[test]
    fn code_phase_requires_change_per_intent() {
        let mut plan = plan_with_decision();
        let mut m = milestone("M-001");
        m.code_intents.push(intent("CI-M-001-001", &[]));
        m.code_intents.push(intent("CI-M-001-002", &[]));
        m.code_changes
            .push(change("CC-M-001-001", Some("CI-M-001-001"), "+x", ""));
        plan.milestones.push(m);
        let errors = validate_completeness(&plan, "plan-code").unwrap();
        assert_eq!(
            errors,
            vec!["CI-M-001-002: no code change references this intent".to_string()]
        );
    }

    #[test]
    fn docs_phase_requires_doc_diff_for_code_diffs() {
        let mut plan = Plan::new("p", "a");
        let mut m = milestone("M-001");
        m.code_changes.push(change("CC-M-001-001", None, "+x", ""));
        m.code_changes.push(change("CC-M-001-002", None, "+y", "+/// y"));
        m.code_changes.push(change("CC-M-001-003", None, "", "+/// z"));
        plan.milestones.push(m);
        let errors = validate_completeness(&plan, "plan-docs").unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("CC-M-001-001"));
    }

    #[test]
    fn unknown_phase_is_an_error() {
        let plan = Plan::new("p", "a");
        let err = validate_completeness(&plan, "plan-everything").unwrap_err();
        assert!(matches!(err, PlannerError::UnknownPhase { .. }));
    }

    #[test]
    fn report_merges_refs_completeness_and_warnings() {
        let mut plan = Plan::new("p", "a");
        plan.milestones.push(milestone("M-001"));
        plan.diagram_graphs.push(diagram(&["solo"], &[]));
        let report = ValidationReport::build(&plan, Some("plan-design")).unwrap();
        assert!(!report.is_valid());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.phase.as_deref(), Some("plan-design"));
    }
}
