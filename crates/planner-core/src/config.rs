use crate::error::{PlannerError, Result};
use crate::paths;
use crate::types::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// QrConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrConfig {
    /// Accepted QR phase names. Empty accepts any well-formed name.
    #[serde(default = "default_qr_phases")]
    pub phases: Vec<String>,
    #[serde(default)]
    pub default_severity: Severity,
}

fn default_qr_phases() -> Vec<String> {
    ["plan-design", "plan-code", "plan-docs", "impl-code", "impl-docs"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            phases: default_qr_phases(),
            default_severity: Severity::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub qr: QrConfig,
}

impl Config {
    /// Load `config.yaml` from the state directory, falling back to defaults
    /// when it does not exist.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = paths::config_path(state_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&data)?;
        Ok(config)
    }

    /// Reject QR phases the configuration does not list.
    pub fn check_qr_phase(&self, phase: &str) -> Result<()> {
        paths::validate_phase_name(phase)?;
        if self.qr.phases.is_empty() || self.qr.phases.iter().any(|p| p == phase) {
            return Ok(());
        }
        Err(PlannerError::UnknownPhase {
            phase: phase.to_string(),
            valid: self.qr.phases.clone(),
        })
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        for phase in &self.qr.phases {
            if paths::validate_phase_name(phase).is_err() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!(
                        "qr.phases: '{phase}' is not a valid phase name (lowercase alphanumeric with hyphens)"
                    ),
                });
            }
            if !seen.insert(phase.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("qr.phases: '{phase}' is listed more than once"),
                });
            }
        }
        if self.qr.phases.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "qr.phases is empty: any well-formed phase name is accepted".to_string(),
            });
        }
        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
