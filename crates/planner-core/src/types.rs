use crate::error::PlannerError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// PlanPhase
// ---------------------------------------------------------------------------

/// Pipeline stages that carry a structural completeness rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanPhase {
    PlanDesign,
    PlanCode,
    PlanDocs,
}

impl PlanPhase {
    pub fn all() -> &'static [PlanPhase] {
        &[PlanPhase::PlanDesign, PlanPhase::PlanCode, PlanPhase::PlanDocs]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanPhase::PlanDesign => "plan-design",
            PlanPhase::PlanCode => "plan-code",
            PlanPhase::PlanDocs => "plan-docs",
        }
    }
}

impl fmt::Display for PlanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanPhase {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlanPhase::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| PlannerError::UnknownPhase {
                phase: s.to_string(),
                valid: PlanPhase::all()
                    .iter()
                    .map(|p| p.as_str().to_string())
                    .collect(),
            })
    }
}

// ---------------------------------------------------------------------------
// QrStatus
// ---------------------------------------------------------------------------

/// Serialized uppercase; parsed case-insensitively on every input path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum QrStatus {
    Todo,
    Pass,
    Fail,
}

impl QrStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QrStatus::Todo => "TODO",
            QrStatus::Pass => "PASS",
            QrStatus::Fail => "FAIL",
        }
    }
}

impl fmt::Display for QrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for QrStatus {
    type Error = PlannerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::str::FromStr for QrStatus {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TODO" => Ok(QrStatus::Todo),
            "PASS" => Ok(QrStatus::Pass),
            "FAIL" => Ok(QrStatus::Fail),
            _ => Err(PlannerError::InvalidParams(format!(
                "unknown status '{s}': expected TODO, PASS or FAIL"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Severity {
    Must,
    #[default]
    Should,
    Could,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Must => "MUST",
            Severity::Should => "SHOULD",
            Severity::Could => "COULD",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Severity {
    type Error = PlannerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::str::FromStr for Severity {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MUST" => Ok(Severity::Must),
            "SHOULD" => Ok(Severity::Should),
            "COULD" => Ok(Severity::Could),
            _ => Err(PlannerError::InvalidParams(format!(
                "unknown severity '{s}': expected MUST, SHOULD or COULD"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Created,
    Updated,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Created => "created",
            Operation::Updated => "updated",
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
