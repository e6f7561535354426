//! Live pipeline commands: Postgres store, system-of-record HTTP adapters,
//! stage worker and audit recorder wired together for one CLI invocation.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use creg_audit::AuditWriter;
use creg_config::secrets::resolve_secrets;
use creg_runtime::{
    spawn_audit_recorder, spawn_worker, standard_pipeline, LifecycleEvent, LifecycleEventKind,
    Pipeline, SubmissionStore, SubmitError, TracingNotifier,
};
use creg_schemas::{Decision, ReviewVerdict, SubmissionId, ValidationSource};
use creg_sor::{HttpClientSearch, HttpReferenceData, HttpSyncClient, SorHttp};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{load_draft, load_settings};

struct Live {
    pipeline: Pipeline,
    tasks: Vec<JoinHandle<()>>,
}

impl Live {
    async fn start(config_paths: &[String]) -> Result<Self> {
        let (settings, config_json) = load_settings(config_paths)?;
        let secrets = resolve_secrets(&config_json, true)?;

        let pool = creg_db::connect_from_env().await?;
        creg_db::migrate(&pool).await?;
        let store = Arc::new(creg_db::PgSubmissionStore::new(pool));

        let sor = SorHttp::from_settings(&settings.sor, &secrets)?;
        info!(base_url = sor.base_url(), "system of record configured");

        let pipeline = standard_pipeline(
            &settings,
            Arc::new(HttpReferenceData::new(sor.clone())),
            Arc::new(HttpClientSearch::new(sor.clone())),
            store,
            Arc::new(HttpSyncClient::new(sor)),
            Arc::new(TracingNotifier),
        );

        let mut tasks = Vec::new();
        if let Some(path) = &settings.audit.path {
            let writer = AuditWriter::resume(path, settings.audit.hash_chain)
                .with_context(|| format!("open audit log {path}"))?;
            tasks.push(spawn_audit_recorder(pipeline.subscribe(), writer));
        }
        tasks.push(spawn_worker(pipeline.clone()));

        Ok(Self { pipeline, tasks })
    }

    async fn stop(self) {
        // let the recorder drain what is already queued
        tokio::time::sleep(Duration::from_millis(50)).await;
        for t in self.tasks {
            t.abort();
        }
    }
}

/// Submit each draft, then wait until every accepted submission settles.
pub async fn process(
    files: &[String],
    source: ValidationSource,
    config_paths: &[String],
    wait_secs: u64,
) -> Result<()> {
    let live = Live::start(config_paths).await?;
    let mut rx = live.pipeline.subscribe();

    let mut pending: BTreeSet<SubmissionId> = BTreeSet::new();
    let mut refused = 0usize;
    for file in files {
        let draft = load_draft(file)?;
        match live.pipeline.submit(draft, source).await {
            Ok(id) => {
                println!("{file}: submission_id={id}");
                pending.insert(id);
            }
            Err(e @ (SubmitError::Structural(_) | SubmitError::Invalid(_))) => {
                refused += 1;
                println!("{file}: refused duplicate={} {e}", e.is_duplicate());
                for r in e.rule_results() {
                    println!("  {}", serde_json::to_string(r)?);
                }
            }
            Err(e) => return Err(e).with_context(|| format!("{file}: submit failed")),
        }
    }

    let unsettled = await_settled(&mut rx, pending, Duration::from_secs(wait_secs)).await;
    live.stop().await;

    if !unsettled.is_empty() {
        bail!("{} submission(s) still in flight after {wait_secs}s", unsettled.len());
    }
    if refused > 0 {
        bail!("{refused} draft(s) refused at intake");
    }
    Ok(())
}

/// Apply a reviewer verdict and wait for the resulting stages.
pub async fn review(
    id: SubmissionId,
    verdict: ReviewVerdict,
    reviewer: &str,
    note: Option<String>,
    config_paths: &[String],
    wait_secs: u64,
) -> Result<()> {
    let live = Live::start(config_paths).await?;
    let mut rx = live.pipeline.subscribe();

    live.pipeline
        .record_review(id, verdict, reviewer, note)
        .await
        .with_context(|| format!("review of {id} failed"))?;

    let unsettled = await_settled(
        &mut rx,
        BTreeSet::from([id]),
        Duration::from_secs(wait_secs),
    )
    .await;
    live.stop().await;

    if !unsettled.is_empty() {
        bail!("submission {id} still in flight after {wait_secs}s");
    }
    Ok(())
}

/// Re-drive sync inline. A client number recorded by the failed attempt is
/// read back rather than written again.
pub async fn resync(id: SubmissionId, config_paths: &[String]) -> Result<()> {
    let live = Live::start(config_paths).await?;

    let result = live.pipeline.resync(id).await;
    let after = live.pipeline.store().get(id).await?;
    live.stop().await;

    result.with_context(|| format!("resync of {id} failed"))?;
    if let Some(s) = after {
        println!(
            "{id}: status={} client_number={}",
            s.status,
            s.client_number.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

/// Settled means complete, parked for review, or failed at sync.
fn settles(ev: &LifecycleEvent) -> Option<String> {
    match &ev.kind {
        LifecycleEventKind::Completed { outcome } => Some(format!("completed outcome={outcome:?}")),
        LifecycleEventKind::Decided {
            decision: d @ Decision::NeedsReview { .. },
        } => Some(format!("needs_review matched={:?}", d.matched_ids())),
        LifecycleEventKind::SyncFailed { reason, attempts } => {
            Some(format!("sync_failed attempts={attempts} reason={reason}"))
        }
        _ => None,
    }
}

/// Returns the ids that had not settled when `limit` ran out.
async fn await_settled(
    rx: &mut broadcast::Receiver<LifecycleEvent>,
    mut pending: BTreeSet<SubmissionId>,
    limit: Duration,
) -> BTreeSet<SubmissionId> {
    let deadline = tokio::time::Instant::now() + limit;
    while !pending.is_empty() {
        let ev = match tokio::time::timeout_at(deadline, rx.recv()).await {
            Err(_) => break,
            Ok(Ok(ev)) => ev,
            Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                warn!(skipped = n, "lagged while waiting; some outcomes not printed");
                continue;
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => break,
        };
        if !pending.contains(&ev.submission_id) {
            continue;
        }
        if let Some(line) = settles(&ev) {
            println!("{}: {line}", ev.submission_id);
            pending.remove(&ev.submission_id);
        }
    }
    pending
}
