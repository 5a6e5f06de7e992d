use super::validate::validate_refs;
use super::Plan;
use crate::error::{PlannerError, Result};
use crate::{io, paths};
use serde_json::Value;
use std::path::PathBuf;

/// Loads and atomically persists the `plan.json` of one state directory.
///
/// Concurrency is optimistic: there is no lock here, stale writers are
/// caught by the per-entity version checks in the mutation operations.
#[derive(Debug, Clone)]
pub struct PlanStore {
    state_dir: PathBuf,
}

impl PlanStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        paths::plan_path(&self.state_dir)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn load(&self) -> Result<Plan> {
        let path = self.path();
        let plan = io::read_json::<Plan>(&path)?.ok_or(PlannerError::PlanNotFound(path))?;
        tracing::debug!(milestones = plan.milestones.len(), "plan loaded");
        Ok(plan)
    }

    /// Write a brand-new plan. Creation is explicit: an existing document is
    /// never overwritten here.
    pub fn create(&self, plan: &Plan) -> Result<()> {
        if self.exists() {
            return Err(PlannerError::PlanExists(self.path()));
        }
        self.save(plan)
    }

    /// Full-document rewrite through a same-directory temp file and rename,
    /// then re-validate what actually landed on disk.
    pub fn save(&self, plan: &Plan) -> Result<()> {
        self.write_checked(plan, &[])
    }

    /// Load, apply `f`, and save only when `f` succeeds and introduced no
    /// dangling reference. A rejected operation leaves the file untouched.
    ///
    /// Problems already present in the loaded document are tolerated, so a
    /// plan damaged by an outside edit can still be repaired one call at a
    /// time.
    pub fn mutate<T>(&self, f: impl FnOnce(&mut Plan) -> Result<T>) -> Result<T> {
        let mut plan = self.load()?;
        let baseline = validate_refs(&plan);
        let out = f(&mut plan)?;

        let added = new_errors(validate_refs(&plan), &baseline);
        if !added.is_empty() {
            return Err(PlannerError::Validation(added));
        }
        self.write_checked(&plan, &baseline)?;
        Ok(out)
    }

    fn write_checked(&self, plan: &Plan, baseline: &[String]) -> Result<()> {
        let path = self.path();
        io::write_json(&path, plan)?;
        tracing::debug!(path = %path.display(), "plan saved");

        let written = self.load()?;
        let errors = new_errors(validate_refs(&written), baseline);
        if !errors.is_empty() {
            tracing::warn!(count = errors.len(), "plan saved with reference errors");
            return Err(PlannerError::Validation(errors));
        }
        Ok(())
    }

    /// The orchestrator-owned `context.json`. Read-only from this side.
    pub fn read_context(&self) -> Result<Value> {
        let path = paths::context_path(&self.state_dir);
        io::read_json::<Value>(&path)?
            .ok_or_else(|| PlannerError::not_found("context", path.display().to_string()))
    }
}

fn new_errors(errors: Vec<String>, baseline: &[String]) -> Vec<String> {
    errors.into_iter().filter(|e| !baseline.contains(e)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{milestone_id, CodeChange, Documentation, Milestone};
    use tempfile::TempDir;

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

    #[test]
    fn load_missing_is_plan_not_found() {
        let dir = TempDir::new().unwrap();
        let err = PlanStore::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, PlannerError::PlanNotFound(_)));
    }

    #[test]
    fn create_then_load() {
        let dir = TempDir::new().unwrap();
        let store = PlanStore::new(dir.path());
        store.create(&Plan::new("slow", "faster")).unwrap();
        let plan = store.load().unwrap();
        assert_eq!(plan.overview.problem, "slow");
    }

    #[test]
    fn create_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = PlanStore::new(dir.path());
        store.create(&Plan::new("a", "b")).unwrap();
        let err = store.create(&Plan::new("c", "d")).unwrap_err();
        assert!(matches!(err, PlannerError::PlanExists(_)));
        assert_eq!(store.load().unwrap().overview.problem, "a");
    }

    #[test]
    fn save_writes_pretty_json() {
        let dir = TempDir::new().unwrap();
        let store = PlanStore::new(dir.path());
        store.create(&Plan::new("a", "b")).unwrap();
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.starts_with("{\n  \"overview\""));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("plan.json"), "{\"milestones\": [").unwrap();
        let err = PlanStore::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, PlannerError::Parse { .. }));
    }

    #[test]
    fn wrong_shape_is_schema_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("plan.json"),
            r#"{"milestones": [{"id": "M-001", "version": 1}]}"#,
        )
        .unwrap();
        let err = PlanStore::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, PlannerError::Schema(_)));
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn mutate_error_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let store = PlanStore::new(dir.path());
        store.create(&Plan::new("a", "b")).unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let err = store
            .mutate(|plan| -> Result<()> {
                plan.milestones.push(milestone(&milestone_id(1)));
                Err(PlannerError::Schema("rejected".into()))
            })
            .unwrap_err();
        assert!(matches!(err, PlannerError::Schema(_)));
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn save_surfaces_reference_errors() {
        let dir = TempDir::new().unwrap();
        let store = PlanStore::new(dir.path());
        let mut plan = Plan::new("a", "b");
        plan.milestones.push(milestone("M-001"));
        plan.milestones.push(milestone("M-001"));
        let err = store.save(&plan).unwrap_err();
        match err {
            PlannerError::Validation(errors) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn dangling_reference_never_reaches_disk() {
        let dir = TempDir::new().unwrap();
        let store = PlanStore::new(dir.path());
        let mut plan = Plan::new("a", "b");
        plan.milestones.push(milestone("M-001"));
        store.create(&plan).unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let err = store
            .mutate(|plan| {
                plan.milestones[0].code_changes.push(CodeChange {
                    id: "CC-M-001-001".into(),
                    version: 1,
                    intent_ref: None,
                    file: "a.rs".into(),
                    diff: String::new(),
                    doc_diff: String::new(),
                    comments: "per DL-999".into(),
                });
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, PlannerError::Validation(_)));
        assert_eq!(std::fs::read(store.path()).unwrap(), before);

        // Later, unrelated writes are unaffected.
        store
            .mutate(|plan| {
                plan.milestones.push(milestone(&milestone_id(2)));
                Ok(())
            })
            .unwrap();
        assert_eq!(store.load().unwrap().milestones.len(), 2);
    }

    #[test]
    fn damaged_plan_still_accepts_unrelated_writes() {
        let dir = TempDir::new().unwrap();
        let store = PlanStore::new(dir.path());
        let mut plan = Plan::new("a", "b");
        plan.milestones.push(milestone("M-001"));
        plan.milestones.push(milestone("M-001"));
        std::fs::write(store.path(), serde_json::to_string(&plan).unwrap()).unwrap();

        store
            .mutate(|plan| {
                plan.overview.problem = "fixed".into();
                Ok(())
            })
            .unwrap();
        assert_eq!(store.load().unwrap().overview.problem, "fixed");
    }

    #[test]
    fn read_context_is_read_only_passthrough() {
        let dir = TempDir::new().unwrap();
        let store = PlanStore::new(dir.path());
        assert!(matches!(
            store.read_context().unwrap_err(),
            PlannerError::NotFound { kind: "context", .. }
        ));
        std::fs::write(dir.path().join("context.json"), r#"{"task": "x"}"#).unwrap();
        assert_eq!(store.read_context().unwrap()["task"], "x");
    }
}
