use std::fs;
use std::path::{Path, PathBuf};

use dropwatch_core_types::{PageSnapshot, TargetId};
use tracing::info;

use crate::errors::AuditError;

/// Keeps the markup of snapshots that produced a positive decision, for
/// post-mortems on false alerts.
#[derive(Clone, Debug)]
pub struct SnapshotArchive {
    root: PathBuf,
}

impl SnapshotArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `<root>/<target>/found-<timestamp>[-n].html` and returns the path.
    pub fn store(&self, target: &TargetId, snapshot: &PageSnapshot) -> Result<PathBuf, AuditError> {
        let dir = self.root.join(target.as_str());
        fs::create_dir_all(&dir)?;
        let stamp = snapshot.fetched_at().format("%Y%m%dT%H%M%S").to_string();
        let mut path = dir.join(format!("found-{stamp}.html"));
        let mut suffix = 1;
        while path.exists() {
            path = dir.join(format!("found-{stamp}-{suffix}.html"));
            suffix += 1;
        }
        fs::write(&path, snapshot.markup())?;
        info!(target: "audit-log", path = %path.display(), "found snapshot archived");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_second_snapshots_do_not_overwrite() {
        let root = tempfile::tempdir().unwrap();
        let archive = SnapshotArchive::new(root.path());
        let target = TargetId::new("arena");
        let snapshot = PageSnapshot::captured_now("<p>found</p>", "https://example.com");

        let first = archive.store(&target, &snapshot).unwrap();
        let second = archive.store(&target, &snapshot).unwrap();
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("-1.html"));
        assert_eq!(fs::read_to_string(second).unwrap(), "<p>found</p>");
    }
}
