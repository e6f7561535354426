//! Submission lifecycle.
//!
//! ```text
//! Received ─► Validating ─┬─► RejectedInvalid (term.)
//!                         └─► Persisted ─► Matching ─┬─► AutoApproved ─► Syncing ─► Complete (term.)
//!                                                    ├─► NeedsReview ─┬─ approve ─► AutoApproved
//!                                                    │                └─ reject ──► Complete
//!                                                    └─► RejectedDuplicate ─ notified ─► Complete
//! ```
//!
//! A failed sync drops `Syncing` back to `AutoApproved` so the submission can
//! be re-driven. Every other transition moves forward. Stages in the pipeline use
//! [`StageEvent::sources`] as the compare-and-set precondition, so a replayed
//! event finds the status already moved and becomes a no-op.

use std::collections::HashSet;

use creg_schemas::{Decision, FinalOutcome, SubmissionStatus};
use uuid::Uuid;

use SubmissionStatus as S;

/// Inputs that advance a submission's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    StartValidation,
    ValidationFailed,
    ValidationPassed,
    StartMatching,
    /// Matching finished with this decision.
    Decided(Decision),
    ReviewApproved,
    ReviewRejected,
    StartSync,
    /// Sync gave up; the submission waits for a re-drive.
    SyncAbandoned,
    SyncConfirmed,
    DuplicateNotified,
}

impl StageEvent {
    /// Statuses this event may be applied in.
    pub fn sources(&self) -> &'static [SubmissionStatus] {
        match self {
            StageEvent::StartValidation => &[S::Received],
            StageEvent::ValidationFailed | StageEvent::ValidationPassed => &[S::Validating],
            StageEvent::StartMatching => &[S::Persisted],
            StageEvent::Decided(_) => &[S::Matching],
            StageEvent::ReviewApproved | StageEvent::ReviewRejected => &[S::NeedsReview],
            StageEvent::StartSync => &[S::AutoApproved],
            StageEvent::SyncConfirmed | StageEvent::SyncAbandoned => &[S::Syncing],
            StageEvent::DuplicateNotified => &[S::RejectedDuplicate],
        }
    }

    /// Outcome stamped when this event completes the submission.
    pub fn final_outcome(&self) -> Option<FinalOutcome> {
        match self {
            StageEvent::SyncConfirmed => Some(FinalOutcome::Approved),
            StageEvent::ReviewRejected | StageEvent::DuplicateNotified => {
                Some(FinalOutcome::Rejected)
            }
            _ => None,
        }
    }

    fn label(&self) -> String {
        match self {
            StageEvent::Decided(d) => format!("Decided({})", d.as_str()),
            other => format!("{other:?}"),
        }
    }
}

/// Returned when an event cannot legally be applied in the current status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: SubmissionStatus,
    pub event: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal submission transition: {} + {}", self.from, self.event)
    }
}

impl std::error::Error for TransitionError {}

/// Target status for `event` applied in `from`.
pub fn next_status(
    from: SubmissionStatus,
    event: &StageEvent,
) -> Result<SubmissionStatus, TransitionError> {
    let illegal = || TransitionError {
        from,
        event: event.label(),
    };

    if !event.sources().contains(&from) {
        return Err(illegal());
    }

    let to = match event {
        StageEvent::StartValidation => S::Validating,
        StageEvent::ValidationFailed => S::RejectedInvalid,
        StageEvent::ValidationPassed => S::Persisted,
        StageEvent::StartMatching => S::Matching,
        StageEvent::Decided(Decision::AutoApprove) => S::AutoApproved,
        StageEvent::Decided(Decision::NeedsReview { .. }) => S::NeedsReview,
        StageEvent::Decided(Decision::RejectDuplicate { .. }) => S::RejectedDuplicate,
        // RejectInvalid is an intake outcome; matching never produces it.
        StageEvent::Decided(Decision::RejectInvalid) => return Err(illegal()),
        StageEvent::ReviewApproved | StageEvent::SyncAbandoned => S::AutoApproved,
        StageEvent::StartSync => S::Syncing,
        StageEvent::ReviewRejected | StageEvent::SyncConfirmed | StageEvent::DuplicateNotified => {
            S::Complete
        }
    };
    Ok(to)
}

/// One submission's status with idempotent event replay.
///
/// Used for in-memory intake (before the submission is stored) and for
/// checking event logs.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    pub status: SubmissionStatus,
    pub outcome: Option<FinalOutcome>,
    applied: HashSet<Uuid>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::at(S::Received)
    }

    pub fn at(status: SubmissionStatus) -> Self {
        Self {
            status,
            outcome: None,
            applied: HashSet::new(),
        }
    }

    /// Apply `event`. A repeated `event_id` is a silent no-op.
    pub fn apply(&mut self, event: &StageEvent, event_id: Option<Uuid>) -> Result<(), TransitionError> {
        if let Some(id) = event_id {
            if self.applied.contains(&id) {
                return Ok(());
            }
        }

        self.status = next_status(self.status, event)?;
        if let Some(o) = event.final_outcome() {
            self.outcome = Some(o);
        }

        if let Some(id) = event_id {
            self.applied.insert(id);
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_approve_path_reaches_complete_approved() {
        let mut lc = Lifecycle::new();
        for ev in [
            StageEvent::StartValidation,
            StageEvent::ValidationPassed,
            StageEvent::StartMatching,
            StageEvent::Decided(Decision::AutoApprove),
            StageEvent::StartSync,
            StageEvent::SyncConfirmed,
        ] {
            lc.apply(&ev, None).unwrap();
        }
        assert_eq!(lc.status, S::Complete);
        assert_eq!(lc.outcome, Some(FinalOutcome::Approved));
        assert!(lc.is_terminal());
    }

    #[test]
    fn review_approval_rejoins_sync_path() {
        let mut lc = Lifecycle::at(S::Matching);
        lc.apply(&StageEvent::Decided(Decision::NeedsReview { evidence: vec![] }), None)
            .unwrap();
        lc.apply(&StageEvent::ReviewApproved, None).unwrap();
        assert_eq!(lc.status, S::AutoApproved);
        lc.apply(&StageEvent::StartSync, None).unwrap();
        assert_eq!(lc.status, S::Syncing);
    }

    #[test]
    fn abandoned_sync_can_start_again() {
        let mut lc = Lifecycle::at(S::AutoApproved);
        lc.apply(&StageEvent::StartSync, None).unwrap();
        lc.apply(&StageEvent::SyncAbandoned, None).unwrap();
        assert_eq!(lc.status, S::AutoApproved);
        assert_eq!(lc.outcome, None);
        lc.apply(&StageEvent::StartSync, None).unwrap();
        lc.apply(&StageEvent::SyncConfirmed, None).unwrap();
        assert_eq!(lc.outcome, Some(FinalOutcome::Approved));

        assert!(next_status(S::AutoApproved, &StageEvent::SyncAbandoned).is_err());
    }

    #[test]
    fn duplicate_completes_rejected() {
        let mut lc = Lifecycle::at(S::Matching);
        lc.apply(
            &StageEvent::Decided(Decision::RejectDuplicate { evidence: vec![] }),
            None,
        )
        .unwrap();
        lc.apply(&StageEvent::DuplicateNotified, None).unwrap();
        assert_eq!(lc.status, S::Complete);
        assert_eq!(lc.outcome, Some(FinalOutcome::Rejected));
    }

    #[test]
    fn backwards_and_skipping_events_are_illegal() {
        let err = next_status(S::Complete, &StageEvent::StartMatching).unwrap_err();
        assert_eq!(err.from, S::Complete);
        assert!(err.to_string().contains("StartMatching"));

        assert!(next_status(S::Persisted, &StageEvent::Decided(Decision::AutoApprove)).is_err());
        assert!(next_status(S::NeedsReview, &StageEvent::StartSync).is_err());
        assert!(next_status(S::Matching, &StageEvent::Decided(Decision::RejectInvalid)).is_err());
    }

    #[test]
    fn replayed_event_id_is_noop() {
        let mut lc = Lifecycle::at(S::Persisted);
        let id = Uuid::new_v4();
        lc.apply(&StageEvent::StartMatching, Some(id)).unwrap();
        // same id again would be illegal from Matching, but is skipped
        lc.apply(&StageEvent::StartMatching, Some(id)).unwrap();
        assert_eq!(lc.status, S::Matching);
    }

    #[test]
    fn terminal_statuses_accept_nothing() {
        let all = [
            StageEvent::StartValidation,
            StageEvent::ValidationFailed,
            StageEvent::ValidationPassed,
            StageEvent::StartMatching,
            StageEvent::Decided(Decision::AutoApprove),
            StageEvent::ReviewApproved,
            StageEvent::ReviewRejected,
            StageEvent::StartSync,
            StageEvent::SyncAbandoned,
            StageEvent::SyncConfirmed,
            StageEvent::DuplicateNotified,
        ];
        for from in [S::RejectedInvalid, S::Complete] {
            for ev in &all {
                assert!(next_status(from, ev).is_err(), "{from} + {ev:?}");
            }
        }
    }
}
