use async_trait::async_trait;
use creg_schemas::{FinalOutcome, SubmissionId, SubmitterIdentity};
use thiserror::Error;
use tracing::info;

/// Terminal-outcome notice for the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub submission_id: SubmissionId,
    pub submitter: SubmitterIdentity,
    pub outcome: FinalOutcome,
    pub client_number: Option<String>,
    /// Existing records that caused a rejection, if any.
    pub matched_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &Notice) -> Result<(), NotifyError>;
}

/// Logs notices. Delivery is someone else's job.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        info!(
            submission_id = %notice.submission_id,
            submitter = %notice.submitter.key(),
            outcome = ?notice.outcome,
            client_number = notice.client_number.as_deref().unwrap_or("-"),
            matched = notice.matched_ids.len(),
            "outcome notice"
        );
        Ok(())
    }
}
