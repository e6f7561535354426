//! Eventual consistency between sync write and read-back.
//!
//! GREEN when:
//! - a record that becomes visible inside the attempt budget completes;
//! - a record never visible inside the budget fails with NotVisible, hands
//!   the submission back to AUTO_APPROVED and publishes `sync_failed`;
//! - a resync of that submission reads the recorded client number back
//!   without writing the record a second time, and completes;
//! - collaborator errors on write or read fail immediately;
//! - resync refuses submissions that are not AUTO_APPROVED.

use creg_runtime::{LifecycleEventKind, PipelineError};
use creg_schemas::{FinalOutcome, SubmissionStatus, ValidationSource};
use creg_testkit::{fixtures, topics, FakeClientSearch, Harness, LaggingSyncClient};

#[tokio::test]
async fn lagging_read_back_completes_inside_budget() -> anyhow::Result<()> {
    // test_settings allows four read-backs
    let mut h = Harness::new(FakeClientSearch::new(), LaggingSyncClient::new(2));

    let id = h
        .pipeline
        .submit(fixtures::clean_draft("u-lag"), ValidationSource::External)
        .await?;
    let trace = h.drive(id).await?;

    assert_eq!(trace.last().map(|k| k.as_str()), Some("completed"));
    let s = h.get(id).await?;
    assert_eq!(s.outcome, Some(FinalOutcome::Approved));
    let cn = s.client_number.unwrap_or_default();
    assert_eq!(h.sync.reads_of(&cn), 3);
    Ok(())
}

#[tokio::test]
async fn never_visible_fails_back_to_auto_approved() -> anyhow::Result<()> {
    let mut h = Harness::new(FakeClientSearch::new(), LaggingSyncClient::new(10));

    let id = h
        .pipeline
        .submit(fixtures::clean_draft("u-invisible"), ValidationSource::External)
        .await?;
    let trace = h.drive(id).await?;

    assert_eq!(
        topics(&trace),
        ["persisted", "matched", "decided", "synced", "sync_failed"]
    );
    match trace.last() {
        Some(LifecycleEventKind::SyncFailed { reason, attempts }) => {
            assert_eq!(*attempts, 4);
            assert!(reason.contains("not visible"), "{reason}");
        }
        other => panic!("expected sync_failed, got {other:?}"),
    }

    let s = h.get(id).await?;
    assert_eq!(s.status, SubmissionStatus::AutoApproved);
    assert!(s.outcome.is_none());
    // client number is kept for the resync read-back
    assert_eq!(s.client_number.as_deref(), Some("00001000"));
    assert_eq!(h.sync.reads_of("00001000"), 4);
    assert!(h.notifier.notices().is_empty());
    Ok(())
}

#[tokio::test]
async fn resync_reads_back_without_second_write() -> anyhow::Result<()> {
    // five lagging reads against a budget of four: the first pass gives up
    let mut h = Harness::new(FakeClientSearch::new(), LaggingSyncClient::new(5));

    let id = h
        .pipeline
        .submit(fixtures::clean_draft("u-resync"), ValidationSource::External)
        .await?;
    let trace = h.drive(id).await?;
    assert_eq!(trace.last().map(|k| k.as_str()), Some("sync_failed"));
    assert_eq!(h.get(id).await?.status, SubmissionStatus::AutoApproved);

    h.pipeline.resync(id).await?;

    let after: Vec<&str> = h
        .drain()
        .iter()
        .filter(|ev| ev.submission_id == id)
        .map(|ev| ev.topic())
        .collect();
    assert_eq!(after, ["completed"]);

    let s = h.get(id).await?;
    assert_eq!(s.status, SubmissionStatus::Complete);
    assert_eq!(s.outcome, Some(FinalOutcome::Approved));
    assert_eq!(s.client_number.as_deref(), Some("00001000"));
    assert_eq!(h.sync.applied().len(), 1);
    assert_eq!(h.sync.reads_of("00001000"), 6);
    assert_eq!(h.notifier.notices().len(), 1);
    Ok(())
}

#[tokio::test]
async fn resync_while_write_still_fails_stays_auto_approved() -> anyhow::Result<()> {
    let mut h = Harness::new(
        FakeClientSearch::new(),
        LaggingSyncClient::consistent().failing_apply("400 bad request"),
    );
    let id = h
        .pipeline
        .submit(fixtures::clean_draft("u-resync-write"), ValidationSource::External)
        .await?;
    h.drive(id).await?;

    // still failing: back to AUTO_APPROVED again, nothing written
    match h.pipeline.resync(id).await {
        Err(PipelineError::Sync { .. }) => {}
        other => panic!("expected sync failure, got {other:?}"),
    }
    let s = h.get(id).await?;
    assert_eq!(s.status, SubmissionStatus::AutoApproved);
    assert!(s.client_number.is_none());
    assert!(h.sync.applied().is_empty());
    Ok(())
}

#[tokio::test]
async fn resync_refuses_completed_submission() -> anyhow::Result<()> {
    let mut h = Harness::new(FakeClientSearch::new(), LaggingSyncClient::consistent());
    let id = h
        .pipeline
        .submit(fixtures::clean_draft("u-resync-done"), ValidationSource::External)
        .await?;
    h.drive(id).await?;

    match h.pipeline.resync(id).await {
        Err(PipelineError::WrongStatus { status, .. }) => {
            assert_eq!(status, SubmissionStatus::Complete)
        }
        other => panic!("expected wrong status, got {other:?}"),
    }
    assert_eq!(h.sync.applied().len(), 1);
    Ok(())
}

#[tokio::test]
async fn read_back_error_fails_without_retrying() -> anyhow::Result<()> {
    let mut h = Harness::new(
        FakeClientSearch::new(),
        LaggingSyncClient::consistent().failing_read("503 service unavailable"),
    );

    let id = h
        .pipeline
        .submit(fixtures::clean_draft("u-readfail"), ValidationSource::External)
        .await?;
    let trace = h.drive(id).await?;

    match trace.last() {
        Some(LifecycleEventKind::SyncFailed { reason, attempts }) => {
            assert_eq!(*attempts, 1);
            assert!(reason.contains("503"), "{reason}");
        }
        other => panic!("expected sync_failed, got {other:?}"),
    }
    assert_eq!(h.get(id).await?.status, SubmissionStatus::AutoApproved);
    Ok(())
}

#[tokio::test]
async fn write_error_fails_before_any_client_number() -> anyhow::Result<()> {
    let mut h = Harness::new(
        FakeClientSearch::new(),
        LaggingSyncClient::consistent().failing_apply("400 bad request"),
    );

    let id = h
        .pipeline
        .submit(fixtures::clean_draft("u-writefail"), ValidationSource::External)
        .await?;
    let trace = h.drive(id).await?;

    assert_eq!(topics(&trace), ["persisted", "matched", "decided", "sync_failed"]);
    let s = h.get(id).await?;
    assert_eq!(s.status, SubmissionStatus::AutoApproved);
    assert!(s.client_number.is_none());
    Ok(())
}
