//! End-to-end decision routing through the standard pipeline.
//!
//! GREEN when:
//! - an exact incorporation-number hit rejects as duplicate, completes
//!   REJECTED and never reaches the system of record;
//! - a fuzzy legal-name hit parks the submission in NEEDS_REVIEW with the
//!   matched id as evidence;
//! - no hits auto-approve, sync, and complete APPROVED with a client number.

use creg_schemas::{category, Decision, FinalOutcome, SubmissionStatus, ValidationSource};
use creg_testkit::{fixtures, topics, FakeClientSearch, Harness, LaggingSyncClient};

#[tokio::test]
async fn incorporation_hit_rejects_as_duplicate() -> anyhow::Result<()> {
    let search = FakeClientSearch::new().with_incorporation("BC123444789", "00000011");
    let mut h = Harness::new(search, LaggingSyncClient::consistent());

    let id = h
        .pipeline
        .submit(
            fixtures::registered_draft("u-dup", "NORTHERN SPRUCE LTD", "BC123444789"),
            ValidationSource::External,
        )
        .await?;
    let trace = h.drive(id).await?;

    assert_eq!(topics(&trace), ["persisted", "matched", "decided", "completed"]);
    let s = h.get(id).await?;
    assert_eq!(s.status, SubmissionStatus::Complete);
    assert_eq!(s.outcome, Some(FinalOutcome::Rejected));
    assert!(s.client_number.is_none());
    match &s.decision {
        Some(d @ Decision::RejectDuplicate { .. }) => {
            assert_eq!(d.ids_for(category::INCORPORATION_NUMBER), ["00000011"]);
        }
        other => panic!("expected duplicate rejection, got {other:?}"),
    }

    assert!(h.sync.applied().is_empty());
    let notices = h.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].outcome, FinalOutcome::Rejected);
    assert!(notices[0].matched_ids.contains(&"00000011".to_string()));
    Ok(())
}

#[tokio::test]
async fn fuzzy_legal_name_needs_review() -> anyhow::Result<()> {
    let search = FakeClientSearch::new().with_legal_name("ELARICHO", "00000005");
    let mut h = Harness::new(search, LaggingSyncClient::consistent());

    let id = h
        .pipeline
        .submit(
            fixtures::named_draft("u-fuzzy", "ELARICHO COMPANY LTD"),
            ValidationSource::External,
        )
        .await?;
    let trace = h.drive(id).await?;

    assert_eq!(topics(&trace), ["persisted", "matched", "decided"]);
    let s = h.get(id).await?;
    assert_eq!(s.status, SubmissionStatus::NeedsReview);
    assert!(s.outcome.is_none());
    let d = s.decision.clone().unwrap_or(Decision::RejectInvalid);
    assert_eq!(d.as_str(), "NEEDS_REVIEW");
    assert_eq!(d.ids_for(category::LEGAL_NAME), ["00000005"]);
    assert!(h.notifier.notices().is_empty());
    assert!(h.sync.applied().is_empty());
    Ok(())
}

#[tokio::test]
async fn no_hits_auto_approve_and_sync() -> anyhow::Result<()> {
    let mut h = Harness::new(FakeClientSearch::new(), LaggingSyncClient::consistent());

    let id = h
        .pipeline
        .submit(fixtures::clean_draft("u-clean"), ValidationSource::External)
        .await?;
    let trace = h.drive(id).await?;

    assert_eq!(
        topics(&trace),
        ["persisted", "matched", "decided", "synced", "completed"]
    );
    let s = h.get(id).await?;
    assert_eq!(s.status, SubmissionStatus::Complete);
    assert_eq!(s.outcome, Some(FinalOutcome::Approved));
    assert_eq!(s.decision, Some(Decision::AutoApprove));
    assert_eq!(s.client_number.as_deref(), Some("00001000"));
    assert_eq!(h.sync.applied(), [id.to_string()]);

    let notices = h.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].outcome, FinalOutcome::Approved);
    assert_eq!(notices[0].client_number.as_deref(), Some("00001000"));
    Ok(())
}

#[tokio::test]
async fn not_in_good_standing_needs_review() -> anyhow::Result<()> {
    let mut h = Harness::new(FakeClientSearch::new(), LaggingSyncClient::consistent());
    let mut draft = fixtures::clean_draft("u-standing");
    if let Some(b) = draft.business_information.as_mut() {
        b.good_standing = Some(false);
    }

    let id = h.pipeline.submit(draft, ValidationSource::Staff).await?;
    h.drive(id).await?;

    let s = h.get(id).await?;
    assert_eq!(s.status, SubmissionStatus::NeedsReview);
    let d = s.decision.unwrap_or(Decision::RejectInvalid);
    assert!(d.matched_ids().is_empty());
    assert!(d.evidence().iter().any(|e| e.field == category::GOOD_STANDING));
    Ok(())
}

#[tokio::test]
async fn failing_notifier_does_not_undo_outcome() -> anyhow::Result<()> {
    let mut h = Harness::with(
        creg_testkit::test_settings(),
        FakeClientSearch::new(),
        LaggingSyncClient::consistent(),
        creg_testkit::RecordingNotifier::failing(),
    );

    let id = h
        .pipeline
        .submit(fixtures::clean_draft("u-mail"), ValidationSource::External)
        .await?;
    let trace = h.drive(id).await?;

    assert_eq!(trace.last().map(|k| k.as_str()), Some("completed"));
    let s = h.get(id).await?;
    assert_eq!(s.outcome, Some(FinalOutcome::Approved));
    assert_eq!(h.notifier.notices().len(), 1);
    Ok(())
}
