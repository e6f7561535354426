use std::sync::Arc;

use chrono::Utc;
use creg_decision::{decide_report, next_status, Lifecycle, StageEvent, TransitionError};
use creg_matching::MatchingEngine;
use creg_schemas::{
    Decision, FinalOutcome, LifecycleEvent, LifecycleEventKind, ReviewRecord, ReviewVerdict,
    RuleResult, Submission, SubmissionDraft, SubmissionId, SubmissionStatus, ValidationSource,
};
use creg_validation::{Rejection, ValidationEngine};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    retry_until_ready, Attempt, Notice, Notifier, RetryError, RetryPolicy, StoreError,
    SubmissionStore, SyncClient, SyncFailure, SyncOutcome,
};

const BUS_CAPACITY: usize = 1024;
const PIPELINE_ACTOR: &str = "pipeline";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why intake refused a submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// A required section is missing; nothing else was checked.
    #[error("structural error: {0}")]
    Structural(RuleResult),
    /// One or more rules failed. Duplicate findings carry an existing id.
    #[error("{} rule violation(s)", .0.len())]
    Invalid(Vec<RuleResult>),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl SubmitError {
    pub fn rule_results(&self) -> &[RuleResult] {
        match self {
            SubmitError::Structural(r) => std::slice::from_ref(r),
            SubmitError::Invalid(rs) => rs,
            SubmitError::Store(_) | SubmitError::Transition(_) => &[],
        }
    }

    /// A rule failure names an existing record.
    pub fn is_duplicate(&self) -> bool {
        self.rule_results().iter().any(RuleResult::is_duplicate)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("submission {0} not found")]
    NotFound(SubmissionId),
    #[error("submission {id} is {status}, expected one of {expected:?}")]
    WrongStatus {
        id: SubmissionId,
        status: SubmissionStatus,
        expected: Vec<SubmissionStatus>,
    },
    #[error("sync failed for {id}: {failure}")]
    Sync { id: SubmissionId, failure: SyncFailure },
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Everything a [`Pipeline`] is built from.
pub struct PipelineParts {
    pub validation: Arc<ValidationEngine>,
    pub matching: Arc<MatchingEngine>,
    pub store: Arc<dyn SubmissionStore>,
    pub sync: Arc<dyn SyncClient>,
    pub notifier: Arc<dyn Notifier>,
    pub retry: RetryPolicy,
}

/// Cheap to clone; clones share collaborators and the event bus.
#[derive(Clone)]
pub struct Pipeline {
    validation: Arc<ValidationEngine>,
    matching: Arc<MatchingEngine>,
    store: Arc<dyn SubmissionStore>,
    sync: Arc<dyn SyncClient>,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
    bus: broadcast::Sender<LifecycleEvent>,
}

impl Pipeline {
    pub fn new(parts: PipelineParts) -> Self {
        let (bus, _rx) = broadcast::channel::<LifecycleEvent>(BUS_CAPACITY);
        Self {
            validation: parts.validation,
            matching: parts.matching,
            store: parts.store,
            sync: parts.sync,
            notifier: parts.notifier,
            retry: parts.retry,
            bus,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.bus.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn SubmissionStore> {
        &self.store
    }

    fn publish(&self, submission_id: SubmissionId, kind: LifecycleEventKind) {
        let ev = LifecycleEvent::new(submission_id, kind);
        debug!(submission_id = %submission_id, topic = ev.topic(), "publish");
        // No subscribers is fine: events are also reconstructible from the store.
        let _ = self.bus.send(ev);
    }

    // -----------------------------------------------------------------------
    // Intake
    // -----------------------------------------------------------------------

    /// Validate and persist a draft. Returns the new submission id.
    ///
    /// Invalid drafts are not stored. A stored submission enters at
    /// `PERSISTED` and a `persisted` event starts matching.
    pub async fn submit(
        &self,
        draft: SubmissionDraft,
        source: ValidationSource,
    ) -> Result<SubmissionId, SubmitError> {
        let mut lc = Lifecycle::new();
        lc.apply(&StageEvent::StartValidation, None)?;

        let submitter = draft.submitter.key();
        let draft = match self.validation.validate(draft, source).await {
            Ok(d) => d,
            Err(Rejection::Structural(e)) => {
                lc.apply(&StageEvent::ValidationFailed, None)?;
                info!(submitter = %submitter, field = %e.field, "submission structurally invalid");
                return Err(SubmitError::Structural(e));
            }
            Err(Rejection::Rules(errors)) => {
                lc.apply(&StageEvent::ValidationFailed, None)?;
                return Err(SubmitError::Invalid(errors));
            }
        };
        lc.apply(&StageEvent::ValidationPassed, None)?;

        let id = Uuid::new_v4();
        let mut submission = Submission::received(id, draft, source, Utc::now()).ok_or_else(|| {
            SubmitError::Structural(RuleResult::new("submission", "incomplete submission"))
        })?;
        submission.status = lc.status;

        self.store.create(&submission).await?;
        info!(
            submission_id = %id,
            submitter = %submission.submitter.key(),
            source = %source,
            "submission persisted"
        );
        self.publish(id, LifecycleEventKind::Persisted);
        Ok(id)
    }

    /// Apply a reviewer verdict to a submission parked in `NEEDS_REVIEW`.
    pub async fn record_review(
        &self,
        id: SubmissionId,
        verdict: ReviewVerdict,
        reviewer: &str,
        note: Option<String>,
    ) -> Result<(), PipelineError> {
        let submission = self.load(id).await?;
        let event = match verdict {
            ReviewVerdict::Approve => StageEvent::ReviewApproved,
            ReviewVerdict::Reject => StageEvent::ReviewRejected,
        };
        let to = next_status(submission.status, &event)?;

        if !self
            .store
            .compare_and_set_status(id, event.sources(), to, reviewer)
            .await?
        {
            let now = self.load(id).await?;
            return Err(PipelineError::WrongStatus {
                id,
                status: now.status,
                expected: event.sources().to_vec(),
            });
        }

        let review = ReviewRecord {
            verdict,
            reviewer: reviewer.to_string(),
            note,
            reviewed_at_utc: Utc::now(),
        };
        self.store.record_review(id, &review).await?;
        info!(submission_id = %id, reviewer, verdict = ?verdict, "review recorded");
        self.publish(
            id,
            LifecycleEventKind::Reviewed {
                verdict,
                reviewer: reviewer.to_string(),
            },
        );

        if let Some(outcome) = event.final_outcome() {
            self.finish(id, outcome).await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Out-of-band stages
    // -----------------------------------------------------------------------

    /// Run whatever stage `ev` triggers. Events that trigger nothing, and
    /// events whose stage has already run, are no-ops.
    pub async fn handle_event(&self, ev: &LifecycleEvent) -> Result<(), PipelineError> {
        match &ev.kind {
            LifecycleEventKind::Persisted => self.run_matching(ev.submission_id).await,
            LifecycleEventKind::Decided {
                decision: Decision::AutoApprove,
            } => self.run_sync(ev.submission_id).await,
            LifecycleEventKind::Decided {
                decision: Decision::RejectDuplicate { .. },
            } => self.finish_duplicate(ev.submission_id).await,
            LifecycleEventKind::Reviewed {
                verdict: ReviewVerdict::Approve,
                ..
            } => self.run_sync(ev.submission_id).await,
            _ => Ok(()),
        }
    }

    async fn load(&self, id: SubmissionId) -> Result<Submission, PipelineError> {
        self.store
            .get(id)
            .await?
            .ok_or(PipelineError::NotFound(id))
    }

    /// Claim `event`'s transition. `Ok(false)` means another delivery
    /// already moved the submission on.
    async fn claim(&self, id: SubmissionId, event: &StageEvent, to: SubmissionStatus) -> Result<bool, PipelineError> {
        let moved = self
            .store
            .compare_and_set_status(id, event.sources(), to, PIPELINE_ACTOR)
            .await?;
        if !moved {
            debug!(submission_id = %id, event = ?event, "stage already claimed; skipping");
        }
        Ok(moved)
    }

    async fn run_matching(&self, id: SubmissionId) -> Result<(), PipelineError> {
        if !self
            .claim(id, &StageEvent::StartMatching, SubmissionStatus::Matching)
            .await?
        {
            return Ok(());
        }
        let submission = self.load(id).await?;
        info!(submission_id = %id, "matching started");

        let report = self.matching.run(&submission).await;
        self.publish(
            id,
            LifecycleEventKind::Matched {
                signal_count: report.signals.len(),
                failed_matchers: report.failed_matchers(),
            },
        );

        let decision = decide_report(&report);
        let event = StageEvent::Decided(decision.clone());
        let to = next_status(SubmissionStatus::Matching, &event)?;

        if !self.claim(id, &event, to).await? {
            warn!(submission_id = %id, "status moved during matching; decision not applied");
            return Ok(());
        }
        self.store.record_decision(id, &decision).await?;
        info!(
            submission_id = %id,
            decision = decision.as_str(),
            matched = ?decision.matched_ids(),
            "decided"
        );
        self.publish(id, LifecycleEventKind::Decided { decision });
        Ok(())
    }

    /// Re-drive sync for a submission left in `AUTO_APPROVED` by a failed
    /// sync (or whose `decided` event was lost).
    ///
    /// A client number recorded by an earlier attempt is reused: the system
    /// of record is only read back, never written twice.
    pub async fn resync(&self, id: SubmissionId) -> Result<(), PipelineError> {
        let submission = self.load(id).await?;
        if submission.status != SubmissionStatus::AutoApproved {
            return Err(PipelineError::WrongStatus {
                id,
                status: submission.status,
                expected: StageEvent::StartSync.sources().to_vec(),
            });
        }
        info!(submission_id = %id, client_number = ?submission.client_number, "resync requested");
        self.run_sync(id).await
    }

    async fn run_sync(&self, id: SubmissionId) -> Result<(), PipelineError> {
        if !self
            .claim(id, &StageEvent::StartSync, SubmissionStatus::Syncing)
            .await?
        {
            return Ok(());
        }
        let submission = self.load(id).await?;

        let client_number = match submission.client_number.clone() {
            Some(cn) => {
                info!(submission_id = %id, client_number = %cn, "sync resumed at read-back");
                cn
            }
            None => {
                info!(submission_id = %id, "sync started");
                let cn = match self.sync.apply(&submission).await {
                    SyncOutcome::Created(cn) => cn,
                    SyncOutcome::NotFoundYet => {
                        return self
                            .sync_failed(
                                id,
                                SyncFailure::Collaborator {
                                    reason: "apply returned no client number".to_string(),
                                    attempts: 1,
                                },
                            )
                            .await;
                    }
                    SyncOutcome::Failed(reason) => {
                        return self
                            .sync_failed(id, SyncFailure::Collaborator { reason, attempts: 1 })
                            .await;
                    }
                };
                self.store.record_client_number(id, &cn).await?;
                self.publish(
                    id,
                    LifecycleEventKind::Synced {
                        client_number: cn.clone(),
                    },
                );
                cn
            }
        };

        let sync = self.sync.clone();
        let cn = client_number.clone();
        let read_back = retry_until_ready(&self.retry, id, move |attempt| {
            let sync = sync.clone();
            let cn = cn.clone();
            async move {
                match sync.read_back(&cn).await {
                    SyncOutcome::Created(found) => Attempt::Ready(found),
                    SyncOutcome::NotFoundYet => {
                        debug!(submission_id = %id, attempt, client_number = %cn, "not visible yet");
                        Attempt::NotYet
                    }
                    SyncOutcome::Failed(reason) => Attempt::Failed(reason),
                }
            }
        })
        .await;

        match read_back {
            Ok((_, state)) => {
                debug!(submission_id = %id, attempts = state.attempts, "record visible");
            }
            Err(RetryError::Exhausted { state }) => {
                return self
                    .sync_failed(
                        id,
                        SyncFailure::NotVisible {
                            client_number,
                            attempts: state.attempts,
                        },
                    )
                    .await;
            }
            Err(RetryError::Failed { state, reason }) => {
                return self
                    .sync_failed(
                        id,
                        SyncFailure::Collaborator {
                            reason,
                            attempts: state.attempts,
                        },
                    )
                    .await;
            }
        }

        self.finish(id, FinalOutcome::Approved).await
    }

    /// Hand the submission back to `AUTO_APPROVED` for [`Pipeline::resync`].
    async fn sync_failed(&self, id: SubmissionId, failure: SyncFailure) -> Result<(), PipelineError> {
        error!(
            submission_id = %id,
            attempts = failure.attempts(),
            error = %failure,
            "sync failed; submission returned to AUTO_APPROVED for resync"
        );
        if !self
            .claim(id, &StageEvent::SyncAbandoned, SubmissionStatus::AutoApproved)
            .await?
        {
            warn!(submission_id = %id, "status moved during sync");
        }
        self.publish(
            id,
            LifecycleEventKind::SyncFailed {
                reason: failure.to_string(),
                attempts: failure.attempts(),
            },
        );
        Err(PipelineError::Sync { id, failure })
    }

    async fn finish_duplicate(&self, id: SubmissionId) -> Result<(), PipelineError> {
        let event = StageEvent::DuplicateNotified;
        if !self.claim(id, &event, SubmissionStatus::Complete).await? {
            return Ok(());
        }
        self.stamp_and_notify(id, FinalOutcome::Rejected).await
    }

    /// Move to `COMPLETE` (if not already there) and stamp the outcome.
    async fn finish(&self, id: SubmissionId, outcome: FinalOutcome) -> Result<(), PipelineError> {
        if outcome == FinalOutcome::Approved
            && !self
                .claim(id, &StageEvent::SyncConfirmed, SubmissionStatus::Complete)
                .await?
        {
            return Ok(());
        }
        self.stamp_and_notify(id, outcome).await
    }

    async fn stamp_and_notify(&self, id: SubmissionId, outcome: FinalOutcome) -> Result<(), PipelineError> {
        self.store.record_outcome(id, outcome).await?;
        let submission = self.load(id).await?;

        let notice = Notice {
            submission_id: id,
            submitter: submission.submitter.clone(),
            outcome,
            client_number: submission.client_number.clone(),
            matched_ids: submission
                .decision
                .as_ref()
                .map(Decision::matched_ids)
                .unwrap_or_default(),
        };
        if let Err(e) = self.notifier.notify(&notice).await {
            warn!(submission_id = %id, error = %e, "notifier failed; outcome stands");
        }

        info!(submission_id = %id, outcome = ?outcome, "submission complete");
        self.publish(id, LifecycleEventKind::Completed { outcome });
        Ok(())
    }
}
