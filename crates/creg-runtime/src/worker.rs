use creg_audit::AuditWriter;
use creg_schemas::LifecycleEvent;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{error, warn};

use crate::{Pipeline, PipelineError};

/// Spawn the stage worker: every bus event is handed to
/// [`Pipeline::handle_event`] on its own task.
///
/// Subscribes before returning, so events published after this call are
/// never missed. Runs until the returned handle is aborted.
pub fn spawn_worker(pipeline: Pipeline) -> JoinHandle<()> {
    let mut events = BroadcastStream::new(pipeline.subscribe());
    tokio::spawn(async move {
        while let Some(item) = events.next().await {
            match item {
                Ok(ev) => {
                    let p = pipeline.clone();
                    tokio::spawn(async move {
                        match p.handle_event(&ev).await {
                            Ok(()) => {}
                            // Already logged at ERROR with the failure detail.
                            Err(PipelineError::Sync { .. }) => {}
                            Err(e) => {
                                error!(
                                    submission_id = %ev.submission_id,
                                    topic = ev.topic(),
                                    error = %e,
                                    "stage failed"
                                );
                            }
                        }
                    });
                }
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    warn!(skipped = n, "stage worker lagged; events dropped");
                }
            }
        }
    })
}

/// Spawn a task appending every event from `rx` to the audit log.
///
/// A failed append is logged and the task keeps going.
pub fn spawn_audit_recorder(
    rx: broadcast::Receiver<LifecycleEvent>,
    mut writer: AuditWriter,
) -> JoinHandle<()> {
    let mut events = BroadcastStream::new(rx);
    tokio::spawn(async move {
        while let Some(item) = events.next().await {
            match item {
                Ok(ev) => {
                    if let Err(e) = writer.append_event(&ev) {
                        error!(
                            submission_id = %ev.submission_id,
                            path = ?writer.path(),
                            error = %e,
                            "audit append failed"
                        );
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    warn!(skipped = n, "audit recorder lagged; events missing from log");
                }
            }
        }
    })
}
