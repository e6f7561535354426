use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use creg_schemas::{
    Decision, FinalOutcome, ReviewRecord, Submission, SubmissionId, SubmissionStatus,
};
use creg_validation::{CollaboratorError, SubmissionHistory};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("submission {0} not found")]
    NotFound(SubmissionId),
    #[error("submission {0} already exists")]
    AlreadyExists(SubmissionId),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Persistence for submissions.
///
/// Status changes go through [`compare_and_set_status`](Self::compare_and_set_status)
/// only; every pipeline stage uses it to claim its work.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn create(&self, submission: &Submission) -> Result<(), StoreError>;

    async fn get(&self, id: SubmissionId) -> Result<Option<Submission>, StoreError>;

    /// Set status to `to` if the current status is one of `from`.
    /// Returns `false` (and changes nothing) otherwise.
    async fn compare_and_set_status(
        &self,
        id: SubmissionId,
        from: &[SubmissionStatus],
        to: SubmissionStatus,
        actor: &str,
    ) -> Result<bool, StoreError>;

    async fn record_decision(&self, id: SubmissionId, decision: &Decision) -> Result<(), StoreError>;

    async fn record_review(&self, id: SubmissionId, review: &ReviewRecord) -> Result<(), StoreError>;

    async fn record_client_number(
        &self,
        id: SubmissionId,
        client_number: &str,
    ) -> Result<(), StoreError>;

    async fn record_outcome(&self, id: SubmissionId, outcome: FinalOutcome) -> Result<(), StoreError>;

    /// Creation times of submissions whose submitter key is `submitter_key`,
    /// at or after `since`.
    async fn list_created_since(
        &self,
        submitter_key: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemorySubmissionStore {
    rows: RwLock<BTreeMap<SubmissionId, Submission>>,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    async fn update<F>(&self, id: SubmissionId, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Submission) + Send,
    {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        f(row);
        row.updated_at_utc = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for InMemorySubmissionStore {
    async fn create(&self, submission: &Submission) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&submission.id) {
            return Err(StoreError::AlreadyExists(submission.id));
        }
        rows.insert(submission.id, submission.clone());
        Ok(())
    }

    async fn get(&self, id: SubmissionId) -> Result<Option<Submission>, StoreError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn compare_and_set_status(
        &self,
        id: SubmissionId,
        from: &[SubmissionStatus],
        to: SubmissionStatus,
        actor: &str,
    ) -> Result<bool, StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !from.contains(&row.status) {
            return Ok(false);
        }
        row.status = to;
        row.updated_at_utc = Utc::now();
        row.updated_by = actor.to_string();
        Ok(true)
    }

    async fn record_decision(&self, id: SubmissionId, decision: &Decision) -> Result<(), StoreError> {
        let decision = decision.clone();
        self.update(id, move |s| s.decision = Some(decision)).await
    }

    async fn record_review(&self, id: SubmissionId, review: &ReviewRecord) -> Result<(), StoreError> {
        let review = review.clone();
        self.update(id, move |s| {
            s.updated_by = review.reviewer.clone();
            s.review = Some(review);
        })
        .await
    }

    async fn record_client_number(
        &self,
        id: SubmissionId,
        client_number: &str,
    ) -> Result<(), StoreError> {
        let cn = client_number.to_string();
        self.update(id, move |s| s.client_number = Some(cn)).await
    }

    async fn record_outcome(&self, id: SubmissionId, outcome: FinalOutcome) -> Result<(), StoreError> {
        self.update(id, move |s| s.outcome = Some(outcome)).await
    }

    async fn list_created_since(
        &self,
        submitter_key: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let rows = self.rows.read().await;
        let mut out: Vec<DateTime<Utc>> = rows
            .values()
            .filter(|s| s.submitter.key() == submitter_key && s.created_at_utc >= since)
            .map(|s| s.created_at_utc)
            .collect();
        out.sort();
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Rate-limit history view
// ---------------------------------------------------------------------------

/// Exposes a [`SubmissionStore`] as the rate limiter's [`SubmissionHistory`].
#[derive(Clone)]
pub struct StoreHistory(pub Arc<dyn SubmissionStore>);

#[async_trait]
impl SubmissionHistory for StoreHistory {
    async fn created_since(
        &self,
        submitter_key: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, CollaboratorError> {
        self.0
            .list_created_since(submitter_key, since)
            .await
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))
    }
}
