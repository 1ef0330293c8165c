use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dropwatch_core_types::TargetId;
use parking_lot::Mutex;
use tracing::debug;

use crate::errors::AuditError;
use crate::model::CycleAudit;
use crate::sink::AuditSink;

/// Default rotation threshold.
pub const DEFAULT_ROTATE_BYTES: u64 = 16 * 1024 * 1024;

struct WriterState {
    file: Option<File>,
    current_path: Option<PathBuf>,
    bytes_written: u64,
    sequence: u64,
}

/// JSON-lines audit trail for one target, under `<root>/<target-id>/`.
///
/// Each record is one line, flushed as soon as it is written. A new file is
/// started once the current one passes `rotate_bytes` (0 disables rotation).
pub struct JsonlAuditLog {
    dir: PathBuf,
    rotate_bytes: u64,
    state: Mutex<WriterState>,
}

impl JsonlAuditLog {
    pub fn new(root: impl AsRef<Path>, target: &TargetId, rotate_bytes: u64) -> Self {
        Self {
            dir: root.as_ref().join(target.as_str()),
            rotate_bytes,
            state: Mutex::new(WriterState {
                file: None,
                current_path: None,
                bytes_written: 0,
                sequence: 0,
            }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        self.state.lock().current_path.clone()
    }

    fn build_path(&self, ts: DateTime<Utc>, sequence: u64) -> PathBuf {
        self.dir.join(format!(
            "audit-{}-{:04}.jsonl",
            ts.format("%Y%m%dT%H%M%S"),
            sequence
        ))
    }

    fn rotate(&self, state: &mut WriterState, ts: DateTime<Utc>) -> Result<(), AuditError> {
        if let Some(file) = state.file.as_mut() {
            file.flush()?;
            file.sync_all()?;
        }
        state.file = None;
        state.bytes_written = 0;
        state.sequence = state.sequence.wrapping_add(1);

        fs::create_dir_all(&self.dir)?;
        let path = self.build_path(ts, state.sequence);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(target: "audit-log", path = %path.display(), "audit file opened");
        state.file = Some(file);
        state.current_path = Some(path);
        Ok(())
    }
}

impl AuditSink for JsonlAuditLog {
    fn append(&self, record: &CycleAudit) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut state = self.state.lock();
        let full = self.rotate_bytes > 0 && state.bytes_written >= self.rotate_bytes;
        if state.file.is_none() || full {
            self.rotate(&mut state, record.recorded_at)?;
        }
        if let Some(file) = state.file.as_mut() {
            file.write_all(&line)?;
            file.flush()?;
        }
        state.bytes_written += line.len() as u64;
        Ok(())
    }
}

impl Drop for JsonlAuditLog {
    fn drop(&mut self) {
        if let Some(file) = self.state.get_mut().file.as_mut() {
            let _ = file.sync_all();
        }
    }
}
