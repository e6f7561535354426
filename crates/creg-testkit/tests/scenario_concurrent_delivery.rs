//! Overlapping deliveries of the same event while a stage is in flight.
//!
//! GREEN when:
//! - two concurrent `persisted` deliveries run matching once and publish
//!   one `matched` and one `decided`;
//! - `persisted` re-delivered while the submission sits in MATCHING returns
//!   at once and leaves the status alone;
//! - a status moved out of MATCHING mid-run keeps the stage's decision out
//!   of the store.

use std::time::Duration;

use creg_runtime::{LifecycleEvent, LifecycleEventKind, SubmissionStore};
use creg_schemas::{SubmissionId, SubmissionStatus, ValidationSource};
use creg_testkit::{fixtures, FakeClientSearch, Harness, LaggingSyncClient};

const SLOW_SEARCH: Duration = Duration::from_millis(60);

fn slow_harness() -> Harness {
    Harness::new(
        FakeClientSearch::new().delayed("legal_name", SLOW_SEARCH),
        LaggingSyncClient::consistent(),
    )
}

async fn persisted(h: &mut Harness, user: &str) -> anyhow::Result<(SubmissionId, LifecycleEvent)> {
    let id = h
        .pipeline
        .submit(fixtures::clean_draft(user), ValidationSource::External)
        .await?;
    let queued = h.drain();
    let ev = queued
        .into_iter()
        .find(|ev| ev.submission_id == id && ev.kind == LifecycleEventKind::Persisted)
        .ok_or_else(|| anyhow::anyhow!("no persisted event for {id}"))?;
    Ok((id, ev))
}

fn count(events: &[LifecycleEvent], id: SubmissionId, topic: &str) -> usize {
    events
        .iter()
        .filter(|ev| ev.submission_id == id && ev.topic() == topic)
        .count()
}

#[tokio::test]
async fn concurrent_persisted_deliveries_match_once() -> anyhow::Result<()> {
    // one uncontested pass sets the expected search volume
    let mut control = slow_harness();
    let (cid, cev) = persisted(&mut control, "u-control").await?;
    control.pipeline.handle_event(&cev).await?;
    let single_pass = control.search.calls();
    assert_eq!(control.get(cid).await?.status, SubmissionStatus::AutoApproved);

    let mut h = slow_harness();
    let (id, ev) = persisted(&mut h, "u-twice").await?;

    let (a, b) = tokio::join!(h.pipeline.handle_event(&ev), h.pipeline.handle_event(&ev));
    a?;
    b?;

    let published = h.drain();
    assert_eq!(count(&published, id, "matched"), 1);
    assert_eq!(count(&published, id, "decided"), 1);
    assert_eq!(h.search.calls(), single_pass);
    assert_eq!(h.get(id).await?.status, SubmissionStatus::AutoApproved);
    Ok(())
}

#[tokio::test]
async fn persisted_redelivered_during_matching_is_noop() -> anyhow::Result<()> {
    let mut h = slow_harness();
    let (id, ev) = persisted(&mut h, "u-midway").await?;

    let first = tokio::spawn({
        let pipeline = h.pipeline.clone();
        let ev = ev.clone();
        async move { pipeline.handle_event(&ev).await }
    });
    tokio::time::sleep(SLOW_SEARCH / 4).await;
    assert_eq!(h.get(id).await?.status, SubmissionStatus::Matching);

    let calls_mid = h.search.calls();
    h.pipeline.handle_event(&ev).await?;
    assert_eq!(h.get(id).await?.status, SubmissionStatus::Matching);
    assert_eq!(h.search.calls(), calls_mid);

    first.await??;
    let published = h.drain();
    assert_eq!(count(&published, id, "decided"), 1);
    Ok(())
}

#[tokio::test]
async fn status_moved_during_matching_keeps_decision_unrecorded() -> anyhow::Result<()> {
    let mut h = slow_harness();
    let (id, ev) = persisted(&mut h, "u-moved").await?;

    let first = tokio::spawn({
        let pipeline = h.pipeline.clone();
        async move { pipeline.handle_event(&ev).await }
    });
    tokio::time::sleep(SLOW_SEARCH / 4).await;
    assert!(
        h.store
            .compare_and_set_status(
                id,
                &[SubmissionStatus::Matching],
                SubmissionStatus::NeedsReview,
                "idir\\operator",
            )
            .await?
    );

    first.await??;

    let s = h.get(id).await?;
    assert_eq!(s.status, SubmissionStatus::NeedsReview);
    assert!(s.decision.is_none(), "{:?}", s.decision);
    let published = h.drain();
    assert_eq!(count(&published, id, "matched"), 1);
    assert_eq!(count(&published, id, "decided"), 0);
    Ok(())
}
