//! creg-runtime
//!
//! Drives submissions from intake to a terminal outcome.
//!
//! Intake ([`Pipeline::submit`]) validates synchronously and persists. Every
//! later stage runs out of band: the pipeline publishes [`LifecycleEvent`]s on
//! a broadcast bus and [`spawn_worker`] feeds each one back into
//! [`Pipeline::handle_event`] on its own task. Stages claim work with a
//! compare-and-set on the stored status, so redelivered events are no-ops.
//!
//! Collaborators (store, system-of-record sync, notifier) are traits handed
//! in at construction.

mod notify;
mod pipeline;
mod retry;
mod store;
mod sync;
mod wire;
mod worker;

pub use creg_schemas::{LifecycleEvent, LifecycleEventKind};
pub use notify::{Notice, NotifyError, Notifier, TracingNotifier};
pub use pipeline::{Pipeline, PipelineError, PipelineParts, SubmitError};
pub use retry::{retry_until_ready, Attempt, RetryError, RetryErrorKind, RetryPolicy, RetryState};
pub use store::{InMemorySubmissionStore, StoreError, StoreHistory, SubmissionStore};
pub use sync::{SyncClient, SyncFailure, SyncOutcome};
pub use wire::standard_pipeline;
pub use worker::{spawn_audit_recorder, spawn_worker};
