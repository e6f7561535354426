use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use creg_config::RateLimitSettings;
use creg_schemas::{RuleResult, SubmitterIdentity};
use tracing::debug;

use crate::CollaboratorError;

// Ten years; keeps the window inside chrono's Duration range.
const MAX_WINDOW_SECS: u64 = 10 * 365 * 86_400;

/// Read access to past submissions, keyed by [`SubmitterIdentity::key`].
#[async_trait]
pub trait SubmissionHistory: Send + Sync {
    /// Creation timestamps of submissions by `submitter_key` at or after `since`.
    async fn created_since(
        &self,
        submitter_key: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, CollaboratorError>;
}

/// Sliding-window throttle on submissions per submitter.
///
/// Window and threshold come from the provider's policy in
/// [`RateLimitSettings`]; providers without an entry use the default policy.
#[derive(Clone)]
pub struct RateLimiter {
    settings: RateLimitSettings,
    history: Arc<dyn SubmissionHistory>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings, history: Arc<dyn SubmissionHistory>) -> Self {
        Self { settings, history }
    }

    /// `Some(RuleResult)` on field `submitter` when the submitter already has
    /// `max_submissions` or more inside the window ending at `now`.
    pub async fn check(
        &self,
        submitter: &SubmitterIdentity,
        now: DateTime<Utc>,
    ) -> Result<Option<RuleResult>, CollaboratorError> {
        let policy = self.settings.policy_for(&submitter.provider);
        let window = ChronoDuration::seconds(policy.window_secs.min(MAX_WINDOW_SECS) as i64);
        let since = now - window;
        let key = submitter.key();

        let prior = self.history.created_since(&key, since).await?;
        let count = prior.len();
        debug!(
            submitter = %key,
            prior = count,
            max = policy.max_submissions,
            window_secs = policy.window_secs,
            "rate limit check"
        );

        if count < policy.max_submissions as usize {
            return Ok(None);
        }

        // The submitter is back under the limit once the (count - max + 1)
        // oldest in-window submissions have aged out.
        let max = policy.max_submissions as usize;
        let mut times = prior;
        times.sort_unstable();
        let releasing = if max == 0 { None } else { times.get(count - max) };
        let wait = match releasing {
            Some(releasing) => (*releasing + window - now).max(ChronoDuration::zero()),
            None => window,
        };

        Ok(Some(RuleResult::new(
            "submitter",
            format!(
                "submission limit of {} per {} reached; try again in {}",
                policy.max_submissions,
                format_wait(window),
                format_wait(wait)
            ),
        )))
    }
}

/// `1h 5m 0s` style rendering; sub-second remainders round up to one second.
pub fn format_wait(d: ChronoDuration) -> String {
    let mut secs = d.num_seconds().max(0);
    if secs == 0 && d > ChronoDuration::zero() {
        secs = 1;
    }
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}
