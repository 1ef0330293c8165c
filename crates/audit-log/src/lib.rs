//! Persisted state of the monitor: an append-only audit trail of every cycle
//! and, optionally, the markup of every snapshot that triggered an alert.

pub mod archive;
pub mod errors;
pub mod jsonl;
pub mod model;
pub mod sink;

pub use archive::SnapshotArchive;
pub use errors::AuditError;
pub use jsonl::{JsonlAuditLog, DEFAULT_ROTATE_BYTES};
pub use model::{AuditEntry, CycleAudit};
pub use sink::{AuditSink, MemoryAuditLog, NullAuditLog};
