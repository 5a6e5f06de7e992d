use crate::error::{PlannerError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// File constants
// ---------------------------------------------------------------------------

/// Directory name searched for when no state directory is given explicitly.
pub const STATE_DIR: &str = ".planner";

pub const PLAN_FILE: &str = "plan.json";
pub const CONTEXT_FILE: &str = "context.json";
pub const CONFIG_FILE: &str = "config.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn plan_path(state_dir: &Path) -> PathBuf {
    state_dir.join(PLAN_FILE)
}

pub fn context_path(state_dir: &Path) -> PathBuf {
    state_dir.join(CONTEXT_FILE)
}

pub fn config_path(state_dir: &Path) -> PathBuf {
    state_dir.join(CONFIG_FILE)
}

pub fn qr_path(state_dir: &Path, phase: &str) -> PathBuf {
    state_dir.join(format!("qr-{phase}.json"))
}

pub fn qr_lock_path(state_dir: &Path, phase: &str) -> PathBuf {
    state_dir.join(format!("qr-{phase}.json.lock"))
}

// ---------------------------------------------------------------------------
// Phase name validation
// ---------------------------------------------------------------------------

static PHASE_RE: OnceLock<Regex> = OnceLock::new();

fn phase_re() -> &'static Regex {
    PHASE_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*$").expect("static regex"))
}

/// Phase names end up inside file names, so they are restricted to
/// lowercase alphanumerics and hyphens.
pub fn validate_phase_name(phase: &str) -> Result<()> {
    if phase.len() > 64 || !phase_re().is_match(phase) {
        return Err(PlannerError::InvalidPhaseName(phase.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
