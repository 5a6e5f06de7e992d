use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("plan not found at {}: run 'planner plan init' first", .0.display())]
    PlanNotFound(PathBuf),

    #[error("plan already exists at {}: use the set-* methods to change it", .0.display())]
    PlanExists(PathBuf),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("QR state for phase '{phase}' not found: create items with 'add-item' first")]
    QrNotFound { phase: String },

    #[error("unknown phase '{phase}': expected one of {}", .valid.join(", "))]
    UnknownPhase { phase: String, valid: Vec<String> },

    #[error("invalid phase name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidPhaseName(String),

    #[error("malformed JSON in {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("schema error: {0}")]
    Schema(String),

    #[error(
        "version mismatch on {kind} {id}: you supplied version {supplied} but the current version is {current}; \
         re-read the {kind}, merge your change into it and retry with --version {current}"
    )]
    VersionMismatch {
        kind: &'static str,
        id: String,
        supplied: u32,
        current: u32,
        state: Box<Value>,
    },

    #[error("validation failed with {} error(s):\n{}", .0.len(), bullet_list(.0))]
    Validation(Vec<String>),

    #[error("plan validation failed with {} error(s):\n{}", .errors.len(), bullet_list(.errors))]
    InvalidPlan {
        errors: Vec<String>,
        warnings: Vec<String>,
    },

    #[error("QR item {id} is PASS, which is terminal: it cannot move to {to}")]
    TerminalState { id: String, to: String },

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("missing required params for {method}: {}", .missing.join(", "))]
    MissingParams {
        method: String,
        missing: Vec<String>,
    },

    #[error("method not found: {0}; run list-methods to see what is available")]
    MethodNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, PlannerError>;

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl PlannerError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        PlannerError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Classify a deserialization failure of a stored document: syntax
    /// problems are parse errors, well-formed JSON of the wrong shape is a
    /// schema error.
    pub fn from_load(origin: &Path, err: serde_json::Error) -> Self {
        match err.classify() {
            serde_json::error::Category::Data => {
                PlannerError::Schema(format!("{}: {err}", origin.display()))
            }
            _ => PlannerError::Parse {
                origin: origin.display().to_string(),
                message: err.to_string(),
            },
        }
    }

    /// JSON-RPC style error code.
    pub fn code(&self) -> i32 {
        match self {
            PlannerError::Parse { .. } => -32700,
            PlannerError::MethodNotFound(_) => -32601,
            PlannerError::Schema(_)
            | PlannerError::InvalidParams(_)
            | PlannerError::MissingParams { .. }
            | PlannerError::InvalidPhaseName(_) => -32602,
            PlannerError::VersionMismatch { .. } => -32001,
            PlannerError::PlanNotFound(_)
            | PlannerError::NotFound { .. }
            | PlannerError::QrNotFound { .. }
            | PlannerError::UnknownPhase { .. } => -32002,
            PlannerError::Validation(_) | PlannerError::InvalidPlan { .. } => -32003,
            PlannerError::TerminalState { .. } => -32004,
            PlannerError::InvalidTransition { .. } => -32005,
            PlannerError::PlanExists(_) | PlannerError::AlreadyExists { .. } => -32006,
            PlannerError::Io(_) | PlannerError::Json(_) | PlannerError::Yaml(_) => -32603,
        }
    }

    /// Stable snake_case name for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            PlannerError::PlanNotFound(_)
            | PlannerError::NotFound { .. }
            | PlannerError::QrNotFound { .. }
            | PlannerError::UnknownPhase { .. } => "not_found",
            PlannerError::PlanExists(_) | PlannerError::AlreadyExists { .. } => "already_exists",
            PlannerError::Parse { .. } => "parse_error",
            PlannerError::Schema(_) | PlannerError::InvalidPhaseName(_) => "schema_error",
            PlannerError::VersionMismatch { .. } => "version_mismatch",
            PlannerError::Validation(_) | PlannerError::InvalidPlan { .. } => "validation_error",
            PlannerError::TerminalState { .. } => "terminal_state",
            PlannerError::InvalidTransition { .. } => "invalid_transition",
            PlannerError::InvalidParams(_) | PlannerError::MissingParams { .. } => "invalid_params",
            PlannerError::MethodNotFound(_) => "method_not_found",
            PlannerError::Io(_) | PlannerError::Json(_) | PlannerError::Yaml(_) => "internal",
        }
    }

    /// Structured payload a caller needs to recover without another read.
    pub fn data(&self) -> Option<Value> {
        match self {
            PlannerError::VersionMismatch {
                id,
                current,
                state,
                ..
            } => Some(serde_json::json!({
                "id": id,
                "current_version": current,
                "current": state,
            })),
            PlannerError::Validation(errors) => Some(serde_json::json!({ "errors": errors })),
            PlannerError::InvalidPlan { errors, warnings } => Some(serde_json::json!({
                "errors": errors,
                "warnings": warnings,
            })),
            PlannerError::MissingParams { missing, .. } => {
                Some(serde_json::json!({ "missing": missing }))
            }
            PlannerError::UnknownPhase { valid, .. } => {
                Some(serde_json::json!({ "valid_phases": valid }))
            }
            _ => None,
        }
    }
}
