use chrono::{DateTime, Utc};
use dropwatch_core_types::{AlertRecord, FusionResult, TargetId};
use serde::{Deserialize, Serialize};

/// One line of the audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleAudit {
    pub target: TargetId,
    pub attempt: u64,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: AuditEntry,
}

impl CycleAudit {
    pub fn new(target: TargetId, attempt: u64, entry: AuditEntry) -> Self {
        Self {
            target,
            attempt,
            recorded_at: Utc::now(),
            entry,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEntry {
    /// Every verdict plus the fused decision for one snapshot.
    Evaluated { result: FusionResult },
    /// A caught failure; `kind` is the error taxonomy name.
    Recoverable { kind: String, message: String },
    /// The error that ended the watch. Written at most once, last.
    Fatal { kind: String, message: String },
    Alert { record: AlertRecord },
    Lifecycle { note: String },
}

impl AuditEntry {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Evaluated { .. } => "evaluated",
            Self::Recoverable { .. } => "recoverable",
            Self::Fatal { .. } => "fatal",
            Self::Alert { .. } => "alert",
            Self::Lifecycle { .. } => "lifecycle",
        }
    }
}
