//! Matching engine aggregation.
//!
//! GREEN when:
//! - signals follow registration order even when later matchers finish first;
//! - empty signals are dropped;
//! - a matcher that errors or overruns its timeout is named in `failures`
//!   and the report is incomplete;
//! - disabled matchers are not called.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use creg_matching::{
    MatchSignal, Matcher, MatcherError, MatchingEngine, SearchError,
};
use creg_schemas::Submission;

struct Scripted {
    name: &'static str,
    delay_ms: u64,
    ids: Vec<&'static str>,
    fail: bool,
    enabled: bool,
    calls: Arc<AtomicUsize>,
}

impl Scripted {
    fn new(name: &'static str, delay_ms: u64, ids: Vec<&'static str>) -> Self {
        Self {
            name,
            delay_ms,
            ids,
            fail: false,
            enabled: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Matcher for Scripted {
    fn name(&self) -> &'static str {
        self.name
    }
    fn field_name(&self) -> &'static str {
        self.name
    }
    fn enabled(&self, _s: &Submission) -> bool {
        self.enabled
    }
    async fn matches(&self, _s: &Submission) -> Result<MatchSignal, MatcherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        if self.fail {
            return Err(SearchError::Transport("connection refused".into()).into());
        }
        Ok(MatchSignal::records(self.name, self.ids.clone()))
    }
}

fn submission() -> Submission {
    serde_json::from_value(serde_json::json!({
        "id": "6f1c2f43-6a0e-4bd4-9a65-9d1b1a1e0001",
        "source": "EXTERNAL",
        "submitter": { "provider": "bcsc", "userId": "u1" },
        "businessInformation": {
            "legalName": "ACME", "businessType": "U", "clientType": "C"
        },
        "location": { "addresses": [], "contacts": [] },
        "status": "MATCHING",
        "createdAtUtc": "2024-01-01T00:00:00Z",
        "updatedAtUtc": "2024-01-01T00:00:00Z",
        "createdBy": "bcsc\\u1",
        "updatedBy": "bcsc\\u1"
    }))
    .unwrap()
}

#[tokio::test]
async fn signals_follow_registration_order() {
    let engine = MatchingEngine::new(
        vec![
            Arc::new(Scripted::new("slow", 40, vec!["00000001"])),
            Arc::new(Scripted::new("empty", 0, vec![])),
            Arc::new(Scripted::new("fast", 0, vec!["00000002"])),
        ],
        Duration::from_secs(1),
    );
    let report = engine.run(&submission()).await;
    assert!(report.is_complete());
    let fields: Vec<&str> = report.signals.iter().map(|s| s.field.as_str()).collect();
    assert_eq!(fields, vec!["slow", "fast"]);
}

#[tokio::test]
async fn failures_and_timeouts_are_recorded() {
    let mut broken = Scripted::new("broken", 0, vec![]);
    broken.fail = true;
    let engine = MatchingEngine::new(
        vec![
            Arc::new(Scripted::new("stuck", 500, vec!["00000009"])),
            Arc::new(broken),
            Arc::new(Scripted::new("ok", 0, vec!["00000003"])),
        ],
        Duration::from_millis(20),
    );
    let report = engine.run(&submission()).await;

    assert!(!report.is_complete());
    assert_eq!(report.failed_matchers(), vec!["stuck", "broken"]);
    assert!(report.failures[0].reason.contains("timed out"));
    assert!(report.failures[1].reason.contains("connection refused"));
    assert_eq!(report.signals.len(), 1);
    assert_eq!(report.signals[0].field, "ok");
}

#[tokio::test]
async fn disabled_matcher_is_not_called() {
    let mut off = Scripted::new("off", 0, vec!["00000004"]);
    off.enabled = false;
    let calls = off.calls.clone();
    let engine = MatchingEngine::new(vec![Arc::new(off)], Duration::from_secs(1));
    let report = engine.run(&submission()).await;
    assert!(report.signals.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
