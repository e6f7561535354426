//! creg-testkit
//!
//! In-process fakes for every pipeline collaborator plus a [`Harness`] that
//! wires them into a standard pipeline and drives lifecycle events inline,
//! one at a time, so scenario tests are deterministic.

mod fakes;
pub mod fixtures;

pub use fakes::{FakeClientSearch, LaggingSyncClient, RecordingNotifier};

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use creg_config::PipelineSettings;
use creg_runtime::{
    standard_pipeline, InMemorySubmissionStore, LifecycleEvent, LifecycleEventKind, Pipeline,
    PipelineError, SubmissionStore,
};
use creg_schemas::{Decision, Submission, SubmissionId};
use creg_validation::StaticReferenceData;
use tokio::sync::broadcast;

const RECV_LIMIT: Duration = Duration::from_secs(5);

/// Settings tuned for tests: millisecond backoff and short matcher timeout.
pub fn test_settings() -> PipelineSettings {
    let mut s = PipelineSettings::default();
    s.sync.max_attempts = 4;
    s.sync.initial_backoff_ms = 1;
    s.sync.max_backoff_ms = 4;
    s.matching.matcher_timeout_ms = 200;
    s.validation.rule_timeout_ms = 200;
    s
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub store: Arc<InMemorySubmissionStore>,
    pub search: Arc<FakeClientSearch>,
    pub sync: Arc<LaggingSyncClient>,
    pub notifier: Arc<RecordingNotifier>,
    rx: broadcast::Receiver<LifecycleEvent>,
}

impl Harness {
    pub fn new(search: FakeClientSearch, sync: LaggingSyncClient) -> Self {
        Self::with(test_settings(), search, sync, RecordingNotifier::new())
    }

    pub fn with(
        settings: PipelineSettings,
        search: FakeClientSearch,
        sync: LaggingSyncClient,
        notifier: RecordingNotifier,
    ) -> Self {
        let store = Arc::new(InMemorySubmissionStore::new());
        let search = Arc::new(search);
        let sync = Arc::new(sync);
        let notifier = Arc::new(notifier);

        let pipeline = standard_pipeline(
            &settings,
            Arc::new(StaticReferenceData::with_defaults()),
            search.clone(),
            store.clone(),
            sync.clone(),
            notifier.clone(),
        );
        let rx = pipeline.subscribe();

        Self {
            pipeline,
            store,
            search,
            sync,
            notifier,
            rx,
        }
    }

    pub async fn get(&self, id: SubmissionId) -> Result<Submission> {
        match self.store.get(id).await? {
            Some(s) => Ok(s),
            None => bail!("submission {id} not in store"),
        }
    }

    /// Handle queued events inline until `id` settles: completed, parked in
    /// review, or failed at sync. Returns every event seen for `id`, in order.
    ///
    /// Events for other submissions are handled too but not returned.
    pub async fn drive(&mut self, id: SubmissionId) -> Result<Vec<LifecycleEventKind>> {
        let mut trace = Vec::new();
        loop {
            let ev = match tokio::time::timeout(RECV_LIMIT, self.rx.recv()).await {
                Ok(Ok(ev)) => ev,
                Ok(Err(e)) => bail!("bus receive failed: {e}"),
                Err(_) => bail!("submission {id} did not settle; seen {trace:?}"),
            };

            match self.pipeline.handle_event(&ev).await {
                Ok(()) | Err(PipelineError::Sync { .. }) => {}
                Err(e) => bail!("stage failed for {}: {e}", ev.submission_id),
            }

            if ev.submission_id != id {
                continue;
            }
            let settled = settles(&ev.kind);
            trace.push(ev.kind);
            if settled {
                return Ok(trace);
            }
        }
    }

    /// Drain events already on the bus without handling them.
    pub fn drain(&mut self) -> Vec<LifecycleEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = self.rx.try_recv() {
            out.push(ev);
        }
        out
    }
}

fn settles(kind: &LifecycleEventKind) -> bool {
    matches!(
        kind,
        LifecycleEventKind::Completed { .. }
            | LifecycleEventKind::SyncFailed { .. }
            | LifecycleEventKind::Decided {
                decision: Decision::NeedsReview { .. }
            }
    )
}

/// Topics of `trace`, for compact assertions.
pub fn topics(trace: &[LifecycleEventKind]) -> Vec<&'static str> {
    trace.iter().map(LifecycleEventKind::as_str).collect()
}
