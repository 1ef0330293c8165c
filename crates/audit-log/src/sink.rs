use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::AuditError;
use crate::model::CycleAudit;

/// Append-only destination for cycle audits. Callers treat failures as
/// best-effort: they are logged, never propagated into the cycle.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: &CycleAudit) -> Result<(), AuditError>;
}

/// Keeps records in memory. Cloning shares the buffer.
#[derive(Clone, Default)]
pub struct MemoryAuditLog {
    records: Arc<Mutex<Vec<CycleAudit>>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CycleAudit> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, record: &CycleAudit) -> Result<(), AuditError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullAuditLog;

impl AuditSink for NullAuditLog {
    fn append(&self, _record: &CycleAudit) -> Result<(), AuditError> {
        Ok(())
    }
}
