use std::future::Future;
use std::time::Duration;

use creg_config::SyncSettings;
use creg_schemas::SubmissionId;
use thiserror::Error;
use tracing::debug;

/// Classified result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Ready(T),
    /// Not visible yet; worth another try.
    NotYet,
    /// Collaborator failure; retrying will not help.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(s: &SyncSettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            initial_backoff: Duration::from_millis(s.initial_backoff_ms),
            max_backoff: Duration::from_millis(s.max_backoff_ms),
        }
    }

    /// Delay after failed attempt `attempt` (1-based): doubles each time,
    /// capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&SyncSettings::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorKind {
    NotYetVisible,
    Collaborator,
}

/// Transient bookkeeping for one retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub submission_id: SubmissionId,
    pub attempts: u32,
    pub last_error_kind: Option<RetryErrorKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    #[error("still not visible after {} attempt(s)", .state.attempts)]
    Exhausted { state: RetryState },
    #[error("collaborator failed on attempt {}: {reason}", .state.attempts)]
    Failed { state: RetryState, reason: String },
}

impl RetryError {
    pub fn state(&self) -> &RetryState {
        match self {
            RetryError::Exhausted { state } | RetryError::Failed { state, .. } => state,
        }
    }
}

/// Call `op` until it is [`Attempt::Ready`], the attempt budget runs out, or
/// it reports [`Attempt::Failed`]. `op` receives the 1-based attempt number.
pub async fn retry_until_ready<T, F, Fut>(
    policy: &RetryPolicy,
    submission_id: SubmissionId,
    mut op: F,
) -> Result<(T, RetryState), RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut state = RetryState {
        submission_id,
        attempts: 0,
        last_error_kind: None,
    };
    let max = policy.max_attempts.max(1);

    for attempt in 1..=max {
        state.attempts = attempt;
        match op(attempt).await {
            Attempt::Ready(v) => return Ok((v, state)),
            Attempt::Failed(reason) => {
                state.last_error_kind = Some(RetryErrorKind::Collaborator);
                return Err(RetryError::Failed { state, reason });
            }
            Attempt::NotYet => {
                state.last_error_kind = Some(RetryErrorKind::NotYetVisible);
                if attempt < max {
                    let wait = policy.backoff_for(attempt);
                    debug!(
                        submission_id = %submission_id,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "not visible yet; backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    Err(RetryError::Exhausted { state })
}
