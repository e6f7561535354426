use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Decision, FinalOutcome, ReviewVerdict, SubmissionId};

/// A lifecycle transition broadcast by the pipeline.
///
/// Consumed by the pipeline's own stage worker, the notifier, and the audit
/// recorder. Keyed by `submission_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub event_id: Uuid,
    pub submission_id: SubmissionId,
    pub ts_utc: DateTime<Utc>,
    pub kind: LifecycleEventKind,
}

impl LifecycleEvent {
    pub fn new(submission_id: SubmissionId, kind: LifecycleEventKind) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            submission_id,
            ts_utc: Utc::now(),
            kind,
        }
    }

    pub fn topic(&self) -> &'static str {
        self.kind.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEventKind {
    /// Submission validated and stored with status `PERSISTED`.
    Persisted,
    /// Matching engine finished; `failed_matchers` names any gap.
    Matched {
        signal_count: usize,
        failed_matchers: Vec<String>,
    },
    Decided { decision: Decision },
    Reviewed {
        verdict: ReviewVerdict,
        reviewer: String,
    },
    /// Accepted data written to the system of record.
    Synced { client_number: String },
    Completed { outcome: FinalOutcome },
    /// Sync stage gave up; operator intervention required.
    SyncFailed { reason: String, attempts: u32 },
}

impl LifecycleEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEventKind::Persisted => "persisted",
            LifecycleEventKind::Matched { .. } => "matched",
            LifecycleEventKind::Decided { .. } => "decided",
            LifecycleEventKind::Reviewed { .. } => "reviewed",
            LifecycleEventKind::Synced { .. } => "synced",
            LifecycleEventKind::Completed { .. } => "completed",
            LifecycleEventKind::SyncFailed { .. } => "sync_failed",
        }
    }
}
