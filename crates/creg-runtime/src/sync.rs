use async_trait::async_trait;
use creg_schemas::Submission;
use thiserror::Error;

/// Result of a system-of-record write or read-back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Record exists under this client number.
    Created(String),
    /// Write acknowledged but the record cannot be read yet.
    NotFoundYet,
    Failed(String),
}

/// Write side of the system of record.
#[async_trait]
pub trait SyncClient: Send + Sync {
    /// Mirror an accepted submission into the system of record.
    async fn apply(&self, submission: &Submission) -> SyncOutcome;

    /// Read a record back by client number.
    async fn read_back(&self, client_number: &str) -> SyncOutcome;
}

/// Terminal failure of the sync stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncFailure {
    /// The write succeeded but the record never became readable.
    #[error("client {client_number} not visible after {attempts} attempt(s)")]
    NotVisible { client_number: String, attempts: u32 },
    #[error("system of record failed after {attempts} attempt(s): {reason}")]
    Collaborator { reason: String, attempts: u32 },
}

impl SyncFailure {
    pub fn attempts(&self) -> u32 {
        match self {
            SyncFailure::NotVisible { attempts, .. } | SyncFailure::Collaborator { attempts, .. } => {
                *attempts
            }
        }
    }
}
