use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use creg_schemas::{MatchReport, MatchSignal, MatcherFailure, Submission};
use futures_util::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::SearchError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatcherError {
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("{0}")]
    Other(String),
}

/// One duplicate-detection strategy.
#[async_trait]
pub trait Matcher: Send + Sync {
    /// Stable identifier used in logs and [`MatcherFailure`].
    fn name(&self) -> &'static str;

    /// Category of the signal this matcher emits.
    fn field_name(&self) -> &'static str;

    fn enabled(&self, submission: &Submission) -> bool;

    async fn matches(&self, submission: &Submission) -> Result<MatchSignal, MatcherError>;
}

/// Runs enabled matchers concurrently and aggregates their signals.
pub struct MatchingEngine {
    matchers: Vec<Arc<dyn Matcher>>,
    timeout: Duration,
}

impl MatchingEngine {
    pub fn new(matchers: Vec<Arc<dyn Matcher>>, timeout: Duration) -> Self {
        Self { matchers, timeout }
    }

    pub fn matcher_names(&self) -> Vec<&'static str> {
        self.matchers.iter().map(|m| m.name()).collect()
    }

    /// Signals come back in registration order regardless of completion
    /// order. Errors and timeouts land in `failures`.
    pub async fn run(&self, submission: &Submission) -> MatchReport {
        let enabled: Vec<&Arc<dyn Matcher>> = self
            .matchers
            .iter()
            .filter(|m| m.enabled(submission))
            .collect();

        let outcomes = join_all(
            enabled
                .iter()
                .map(|m| tokio::time::timeout(self.timeout, m.matches(submission))),
        )
        .await;

        let mut report = MatchReport::default();
        for (m, outcome) in enabled.iter().zip(outcomes) {
            match outcome {
                Ok(Ok(signal)) => {
                    if signal.is_empty() {
                        debug!(submission_id = %submission.id, matcher = m.name(), "no signal");
                    } else {
                        debug!(
                            submission_id = %submission.id,
                            matcher = m.name(),
                            values = signal.values.len(),
                            "signal"
                        );
                        report.signals.push(signal);
                    }
                }
                Ok(Err(e)) => {
                    warn!(submission_id = %submission.id, matcher = m.name(), error = %e, "matcher failed");
                    report.failures.push(MatcherFailure {
                        matcher: m.name().to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    let reason = format!("timed out after {}ms", self.timeout.as_millis());
                    warn!(submission_id = %submission.id, matcher = m.name(), %reason, "matcher failed");
                    report.failures.push(MatcherFailure {
                        matcher: m.name().to_string(),
                        reason,
                    });
                }
            }
        }

        info!(
            submission_id = %submission.id,
            enabled = enabled.len(),
            signals = report.signals.len(),
            failures = report.failures.len(),
            "matching pass finished"
        );
        report
    }
}
