use super::{check_status_finding, QrItem, QrState, QrSummary};
use crate::config::Config;
use crate::error::{PlannerError, Result};
use crate::types::{QrStatus, Severity};
use crate::{io, paths};
use chrono::Utc;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewQrItem {
    pub id: Option<String>,
    pub scope: String,
    pub check: String,
    pub severity: Option<Severity>,
}

/// One phase's checklist on disk.
///
/// Writers serialize on the sidecar lock and re-read the document once they
/// hold it. Readers take no lock: the atomic rename means they always see a
/// complete document.
#[derive(Debug, Clone)]
pub struct QrStore {
    state_dir: PathBuf,
    phase: String,
    default_severity: Severity,
}

impl QrStore {
    pub fn new(state_dir: impl Into<PathBuf>, phase: &str, config: &Config) -> Result<Self> {
        config.check_qr_phase(phase)?;
        Ok(Self {
            state_dir: state_dir.into(),
            phase: phase.to_string(),
            default_severity: config.qr.default_severity,
        })
    }

    pub fn path(&self) -> PathBuf {
        paths::qr_path(&self.state_dir, &self.phase)
    }

    fn lock_path(&self) -> PathBuf {
        paths::qr_lock_path(&self.state_dir, &self.phase)
    }

    // ---------------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------------

    pub fn load(&self) -> Result<QrState> {
        io::read_json::<QrState>(&self.path())?.ok_or_else(|| PlannerError::QrNotFound {
            phase: self.phase.clone(),
        })
    }

    pub fn get_item(&self, id: &str) -> Result<QrItem> {
        self.load()?.item(id).cloned()
    }

    pub fn list_items(&self, status: Option<QrStatus>) -> Result<Vec<QrItem>> {
        let state = self.load()?;
        Ok(state
            .items
            .into_iter()
            .filter(|i| status.is_none_or(|s| i.status == s))
            .collect())
    }

    pub fn summary(&self) -> Result<QrSummary> {
        Ok(self.load()?.summary())
    }

    // ---------------------------------------------------------------------------
    // Locked writes
    // ---------------------------------------------------------------------------

    /// Read-modify-write under the phase lock. The document is read only
    /// after the lock is held; when `f` fails nothing is written.
    fn locked_update<T>(
        &self,
        create: bool,
        f: impl FnOnce(&mut QrState) -> Result<T>,
    ) -> Result<T> {
        let path = self.path();
        io::with_exclusive_lock(&self.lock_path(), || {
            let mut state = match io::read_json::<QrState>(&path)? {
                Some(state) => state,
                None if create => QrState::new(&self.phase),
                None => {
                    return Err(PlannerError::QrNotFound {
                        phase: self.phase.clone(),
                    })
                }
            };
            let out = f(&mut state)?;
            state.updated_at = Some(Utc::now());
            io::write_json(&path, &state)?;
            Ok(out)
        })
    }

    /// Record a verification result for one item.
    pub fn update_item(
        &self,
        id: &str,
        status: QrStatus,
        finding: Option<String>,
        severity: Option<Severity>,
    ) -> Result<QrItem> {
        check_status_finding(status, finding.as_deref())?;
        let item = self.locked_update(false, |state| {
            let item = state.item_mut(id)?;
            item.transition(status, finding)?;
            if let Some(s) = severity {
                item.severity = s;
            }
            Ok(item.clone())
        })?;
        tracing::info!(
            phase = %self.phase,
            id,
            status = %item.status,
            version = item.version,
            "qr item updated"
        );
        Ok(item)
    }

    /// Tag an item with a cluster id. Grouping is metadata: the item's
    /// version is left alone.
    pub fn assign_group(&self, id: &str, group_id: &str) -> Result<QrItem> {
        if group_id.trim().is_empty() {
            return Err(PlannerError::InvalidParams("group_id must not be empty".to_string()));
        }
        self.locked_update(false, |state| {
            let item = state.item_mut(id)?;
            item.group_id = Some(group_id.to_string());
            Ok(item.clone())
        })
    }

    /// Append a TODO item, creating the phase document when it does not exist.
    pub fn add_item(&self, req: NewQrItem) -> Result<QrItem> {
        if req.scope.trim().is_empty() || req.check.trim().is_empty() {
            return Err(PlannerError::Schema("scope and check must not be empty".to_string()));
        }
        let severity = req.severity.unwrap_or(self.default_severity);
        let item = self.locked_update(true, |state| {
            let id = match req.id {
                Some(id) if state.item(&id).is_ok() => {
                    return Err(PlannerError::AlreadyExists { kind: "QR item", id });
                }
                Some(id) => id,
                None => state.next_id(),
            };
            let item = QrItem::new(id, req.scope, req.check, severity);
            state.items.push(item.clone());
            Ok(item)
        })?;
        tracing::info!(phase = %self.phase, id = %item.id, "qr item added");
        Ok(item)
    }

    /// Start the next review round. Item states carry over.
    pub fn next_iteration(&self) -> Result<QrSummary> {
        self.locked_update(false, |state| {
            state.iteration += 1;
            Ok(state.summary())
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
