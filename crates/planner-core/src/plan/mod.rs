//! The plan document: milestones holding code intents and code changes, the
//! decision log they cite, architecture diagrams and README entries.
//!
//! Every versioned entity starts at version 1 and is only ever changed through
//! the compare-and-swap operations in [`ops`].

pub mod ops;
pub mod store;
pub mod validate;

pub use store::PlanStore;

use crate::error::{PlannerError, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ID helpers
// ---------------------------------------------------------------------------

pub fn milestone_id(n: usize) -> String {
    format!("M-{n:03}")
}

pub fn decision_id(n: usize) -> String {
    format!("DL-{n:03}")
}

pub fn intent_id(milestone: &str, n: usize) -> String {
    format!("CI-{milestone}-{n:03}")
}

pub fn change_id(milestone: &str, n: usize) -> String {
    format!("CC-{milestone}-{n:03}")
}

pub fn diagram_id(n: usize) -> String {
    format!("DG-{n:03}")
}

pub fn readme_id(n: usize) -> String {
    format!("RM-{n:03}")
}

pub fn constraint_id(n: usize) -> String {
    format!("CN-{n:03}")
}

pub fn risk_id(n: usize) -> String {
    format!("RK-{n:03}")
}

// ---------------------------------------------------------------------------
// Versioned
// ---------------------------------------------------------------------------

/// An entity guarded by a CAS version counter.
pub trait Versioned: Serialize {
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn version(&self) -> u32;
    fn version_mut(&mut self) -> &mut u32;
}

macro_rules! versioned {
    ($ty:ty, $kind:expr) => {
        impl Versioned for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn version(&self) -> u32 {
                self.version
            }

            fn version_mut(&mut self) -> &mut u32 {
                &mut self.version
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Planning context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub approach: String,
    #[serde(default = "initial_version")]
    pub version: u32,
}

fn initial_version() -> u32 {
    1
}

impl Default for Overview {
    fn default() -> Self {
        Self {
            problem: String::new(),
            approach: String::new(),
            version: initial_version(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub version: u32,
    pub decision: String,
    pub reasoning: String,
}

versioned!(Decision, "decision");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub id: String,
    pub risk: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningContext {
    #[serde(default)]
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub risks: Vec<Risk>,
}

// ---------------------------------------------------------------------------
// Milestone and its children
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeIntent {
    pub id: String,
    pub version: u32,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    pub behavior: String,
    #[serde(default)]
    pub decision_refs: Vec<String>,
}

versioned!(CodeIntent, "code intent");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeChange {
    pub id: String,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_ref: Option<String>,
    pub file: String,
    #[serde(default)]
    pub diff: String,
    #[serde(default)]
    pub doc_diff: String,
    #[serde(default)]
    pub comments: String,
}

versioned!(CodeChange, "code change");

impl CodeChange {
    /// A change that only carries a documentation overlay.
    pub fn is_doc_only(&self) -> bool {
        self.diff.trim().is_empty() && !self.doc_diff.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDoc {
    pub function: String,
    pub docstring: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineComment {
    pub location: String,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Documentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_comment: Option<String>,
    #[serde(default)]
    pub docstrings: Vec<FunctionDoc>,
    #[serde(default)]
    pub inline_comments: Vec<InlineComment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub version: u32,
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
    #[serde(default)]
    pub code_intents: Vec<CodeIntent>,
    #[serde(default)]
    pub code_changes: Vec<CodeChange>,
    #[serde(default)]
    pub documentation: Documentation,
}

versioned!(Milestone, "milestone");

// ---------------------------------------------------------------------------
// Diagrams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramNode {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramEdge {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramGraph {
    pub id: String,
    pub version: u32,
    pub title: String,
    /// Milestone the diagram belongs to; `None` for plan-wide diagrams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<DiagramNode>,
    #[serde(default)]
    pub edges: Vec<DiagramEdge>,
}

versioned!(DiagramGraph, "diagram");

impl DiagramGraph {
    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }
}

// ---------------------------------------------------------------------------
// README entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadmeEntry {
    pub id: String,
    pub version: u32,
    pub path: String,
    pub content: String,
}

versioned!(ReadmeEntry, "readme entry");

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub overview: Overview,
    #[serde(default)]
    pub planning_context: PlanningContext,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub diagram_graphs: Vec<DiagramGraph>,
    #[serde(default)]
    pub readme_entries: Vec<ReadmeEntry>,
}

impl Plan {
    pub fn new(problem: impl Into<String>, approach: impl Into<String>) -> Self {
        Self {
            overview: Overview {
                problem: problem.into(),
                approach: approach.into(),
                version: 1,
            },
            ..Self::default()
        }
    }

    // ---------------------------------------------------------------------------
    // Lookups (linear; plans hold tens of entities)
    // ---------------------------------------------------------------------------

    pub fn milestone(&self, id: &str) -> Result<&Milestone> {
        self.milestones
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| PlannerError::not_found(Milestone::KIND, id))
    }

    pub fn milestone_mut(&mut self, id: &str) -> Result<&mut Milestone> {
        self.milestones
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| PlannerError::not_found(Milestone::KIND, id))
    }

    pub fn decision(&self, id: &str) -> Result<&Decision> {
        self.planning_context
            .decisions
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| PlannerError::not_found(Decision::KIND, id))
    }

    pub fn decision_mut(&mut self, id: &str) -> Result<&mut Decision> {
        self.planning_context
            .decisions
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| PlannerError::not_found(Decision::KIND, id))
    }

    pub fn intent(&self, id: &str) -> Result<&CodeIntent> {
        self.intents()
            .find(|i| i.id == id)
            .ok_or_else(|| PlannerError::not_found(CodeIntent::KIND, id))
    }

    pub fn intent_mut(&mut self, id: &str) -> Result<&mut CodeIntent> {
        self.milestones
            .iter_mut()
            .flat_map(|m| m.code_intents.iter_mut())
            .find(|i| i.id == id)
            .ok_or_else(|| PlannerError::not_found(CodeIntent::KIND, id))
    }

    pub fn change(&self, id: &str) -> Result<&CodeChange> {
        self.changes()
            .find(|c| c.id == id)
            .ok_or_else(|| PlannerError::not_found(CodeChange::KIND, id))
    }

    pub fn change_mut(&mut self, id: &str) -> Result<&mut CodeChange> {
        self.milestones
            .iter_mut()
            .flat_map(|m| m.code_changes.iter_mut())
            .find(|c| c.id == id)
            .ok_or_else(|| PlannerError::not_found(CodeChange::KIND, id))
    }

    pub fn diagram(&self, id: &str) -> Result<&DiagramGraph> {
        self.diagram_graphs
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| PlannerError::not_found(DiagramGraph::KIND, id))
    }

    pub fn diagram_mut(&mut self, id: &str) -> Result<&mut DiagramGraph> {
        self.diagram_graphs
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| PlannerError::not_found(DiagramGraph::KIND, id))
    }

    pub fn readme(&self, id: &str) -> Result<&ReadmeEntry> {
        self.readme_entries
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| PlannerError::not_found(ReadmeEntry::KIND, id))
    }

    pub fn readme_mut(&mut self, id: &str) -> Result<&mut ReadmeEntry> {
        self.readme_entries
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PlannerError::not_found(ReadmeEntry::KIND, id))
    }

    /// Milestone that owns the intent or change with `child_id`.
    pub fn parent_of(&self, child_id: &str) -> Option<&Milestone> {
        self.milestones.iter().find(|m| {
            m.code_intents.iter().any(|i| i.id == child_id)
                || m.code_changes.iter().any(|c| c.id == child_id)
        })
    }

    pub fn has_decision(&self, id: &str) -> bool {
        self.planning_context.decisions.iter().any(|d| d.id == id)
    }

    pub fn has_intent(&self, id: &str) -> bool {
        self.intents().any(|i| i.id == id)
    }

    pub fn intents(&self) -> impl Iterator<Item = &CodeIntent> {
        self.milestones.iter().flat_map(|m| m.code_intents.iter())
    }

    pub fn changes(&self) -> impl Iterator<Item = &CodeChange> {
        self.milestones.iter().flat_map(|m| m.code_changes.iter())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
