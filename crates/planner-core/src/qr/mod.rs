//! Quality-review checklists, one `qr-{phase}.json` per phase.
//!
//! Item status follows a one-way state machine: `TODO` may move to `PASS` or
//! `FAIL`, `FAIL` may be re-failed or passed, and `PASS` is terminal.

pub mod store;

pub use store::{NewQrItem, QrStore};

use crate::error::{PlannerError, Result};
use crate::types::{QrStatus, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub fn qr_item_id(n: usize) -> String {
    format!("QR-{n:03}")
}

// ---------------------------------------------------------------------------
// QrItem
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrItem {
    pub id: String,
    /// `*` for the whole artifact, otherwise a locator such as `M-001`.
    pub scope: String,
    pub check: String,
    pub status: QrStatus,
    #[serde(default = "initial_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finding: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

fn initial_version() -> u32 {
    1
}

impl QrItem {
    pub fn new(
        id: impl Into<String>,
        scope: impl Into<String>,
        check: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            scope: scope.into(),
            check: check.into(),
            status: QrStatus::Todo,
            version: 1,
            finding: None,
            severity,
            group_id: None,
        }
    }

    /// Apply a verification result. The pairing and transition checks run
    /// before anything is changed.
    pub fn transition(&mut self, to: QrStatus, finding: Option<String>) -> Result<()> {
        check_status_finding(to, finding.as_deref())?;
        validate_transition(&self.id, self.status, to)?;
        self.status = to;
        self.finding = match to {
            QrStatus::Fail => finding,
            _ => None,
        };
        self.version += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

fn allowed_transitions(from: QrStatus) -> &'static [QrStatus] {
    match from {
        QrStatus::Todo => &[QrStatus::Pass, QrStatus::Fail],
        QrStatus::Fail => &[QrStatus::Fail, QrStatus::Pass],
        QrStatus::Pass => &[],
    }
}

pub fn validate_transition(id: &str, from: QrStatus, to: QrStatus) -> Result<()> {
    if from == QrStatus::Pass {
        return Err(PlannerError::TerminalState {
            id: id.to_string(),
            to: to.to_string(),
        });
    }
    if allowed_transitions(from).contains(&to) {
        return Ok(());
    }
    Err(PlannerError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
        reason: "items never return to TODO".to_string(),
    })
}

/// `FAIL` must say what failed; `PASS` must not carry a finding.
pub fn check_status_finding(to: QrStatus, finding: Option<&str>) -> Result<()> {
    let has_finding = finding.is_some_and(|f| !f.trim().is_empty());
    match to {
        QrStatus::Fail if !has_finding => Err(PlannerError::InvalidParams(
            "--finding is required when --status is FAIL".to_string(),
        )),
        QrStatus::Pass if finding.is_some() => Err(PlannerError::InvalidParams(
            "--finding must not be given when --status is PASS".to_string(),
        )),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// QrState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrState {
    pub phase: String,
    #[serde(default = "initial_version")]
    pub iteration: u32,
    #[serde(default)]
    pub items: Vec<QrItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl QrState {
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            iteration: 1,
            items: Vec::new(),
            updated_at: None,
        }
    }

    pub fn item(&self, id: &str) -> Result<&QrItem> {
        self.items
            .iter()
            .find(|i| i.id == id)
            .ok_or_else(|| PlannerError::not_found("QR item", id))
    }

    pub fn item_mut(&mut self, id: &str) -> Result<&mut QrItem> {
        self.items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| PlannerError::not_found("QR item", id))
    }

    /// Next free `QR-NNN` id. Skips numbers taken by caller-supplied ids.
    pub fn next_id(&self) -> String {
        let mut n = self.items.len() + 1;
        loop {
            let id = qr_item_id(n);
            if self.item(&id).is_err() {
                return id;
            }
            n += 1;
        }
    }

    pub fn summary(&self) -> QrSummary {
        let count = |s: QrStatus| self.items.iter().filter(|i| i.status == s).count();
        let todo = count(QrStatus::Todo);
        let pass = count(QrStatus::Pass);
        let fail = count(QrStatus::Fail);
        let blocking_fails = self
            .items
            .iter()
            .filter(|i| i.status == QrStatus::Fail && i.severity == Severity::Must)
            .count();
        QrSummary {
            phase: self.phase.clone(),
            iteration: self.iteration,
            total: self.items.len(),
            todo,
            pass,
            fail,
            blocking_fails,
            complete: todo == 0 && fail == 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrSummary {
    pub phase: String,
    pub iteration: u32,
    pub total: usize,
    pub todo: usize,
    pub pass: usize,
    pub fail: usize,
    /// Failed items of severity `MUST`.
    pub blocking_fails: usize,
    /// Every item has been verified and none is failing.
    pub complete: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> QrItem {
        QrItem::new("QR-001", "*", "every intent has a change", Severity::Must)
    }

    #[test]
    fn todo_to_fail_to_pass() {
        let mut it = item();
        it.transition(QrStatus::Fail, Some("CI-M-001-002 unreferenced".into()))
            .unwrap();
        assert_eq!(it.version, 2);
        assert_eq!(it.finding.as_deref(), Some("CI-M-001-002 unreferenced"));

        it.transition(QrStatus::Fail, Some("still missing".into())).unwrap();
        assert_eq!(it.finding.as_deref(), Some("still missing"));

        it.transition(QrStatus::Pass, None).unwrap();
        assert_eq!(it.status, QrStatus::Pass);
        assert_eq!(it.finding, None);
        assert_eq!(it.version, 4);
    }

    #[test]
    fn pass_is_terminal() {
        let mut it = item();
        it.transition(QrStatus::Pass, None).unwrap();
        for (to, finding) in [
            (QrStatus::Pass, None),
            (QrStatus::Fail, Some("regressed".to_string())),
            (QrStatus::Todo, None),
        ] {
            let err = it.transition(to, finding).unwrap_err();
            assert!(matches!(err, PlannerError::TerminalState { .. }));
        }
        assert_eq!(it.status, QrStatus::Pass);
        assert_eq!(it.version, 2);
    }

    #[test]
    fn back_to_todo_is_invalid() {
        let mut it = item();
        let err = it.transition(QrStatus::Todo, None).unwrap_err();
        assert!(matches!(err, PlannerError::InvalidTransition { .. }));
        assert_eq!(it.version, 1);
    }

    #[test]
    fn finding_pairing() {
        assert!(check_status_finding(QrStatus::Fail, None).is_err());
        assert!(check_status_finding(QrStatus::Fail, Some("  ")).is_err());
        assert!(check_status_finding(QrStatus::Pass, Some("x")).is_err());
        check_status_finding(QrStatus::Fail, Some("x")).unwrap();
        check_status_finding(QrStatus::Pass, None).unwrap();
    }

    #[test]
    fn next_id_skips_taken_ids() {
        let mut state = QrState::new("plan-code");
        state.items.push(QrItem::new("QR-002", "*", "c", Severity::Should));
        assert_eq!(state.next_id(), "QR-003");
        state.items.push(QrItem::new("custom", "*", "c", Severity::Should));
        assert_eq!(state.next_id(), "QR-003");
    }

    #[test]
    fn summary_counts() {
        let mut state = QrState::new("plan-code");
        let mut a = QrItem::new("QR-001", "*", "a", Severity::Must);
        a.transition(QrStatus::Fail, Some("broken".into())).unwrap();
        let mut b = QrItem::new("QR-002", "*", "b", Severity::Could);
        b.transition(QrStatus::Pass, None).unwrap();
        state.items = vec![a, b, QrItem::new("QR-003", "*", "c", Severity::Should)];

        let s = state.summary();
        assert_eq!((s.total, s.todo, s.pass, s.fail), (3, 1, 1, 1));
        assert_eq!(s.blocking_fails, 1);
        assert!(!s.complete);
    }

    #[test]
    fn item_json_omits_absent_fields() {
        let json = serde_json::to_value(item()).unwrap();
        assert_eq!(json["status"], "TODO");
        assert_eq!(json["severity"], "MUST");
        assert!(json.get("finding").is_none());
        assert!(json.get("group_id").is_none());
    }
}
