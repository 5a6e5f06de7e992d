use planner_core::paths::STATE_DIR;
use std::path::{Path, PathBuf};

/// Resolve the state directory.
///
/// Priority:
/// 1. `--state-dir` flag / `PLANNER_STATE_DIR` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.planner/`
/// 3. Fall back to `cwd`
pub fn resolve_state_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_state_dir(&cwd).unwrap_or(cwd)
}

/// The nearest `.planner/` directory at or above `start`.
pub fn find_state_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(STATE_DIR))
        .find(|candidate| candidate.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_dir_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_state_dir(Some(dir.path())), dir.path());
    }

    #[test]
    fn finds_planner_dir_above() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".planner")).unwrap();
        let deep = dir.path().join("src/deep");
        std::fs::create_dir_all(&deep).unwrap();
        assert_eq!(find_state_dir(&deep), Some(dir.path().join(".planner")));
    }

    #[test]
    fn nearest_planner_dir_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".planner")).unwrap();
        let inner = dir.path().join("sub");
        std::fs::create_dir_all(inner.join(".planner")).unwrap();
        assert_eq!(find_state_dir(&inner), Some(inner.join(".planner")));
    }
}
