use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use creg_schemas::{
    Address, BusinessInformation, Contact, LocationData, RuleResult, SubmissionDraft,
    ValidationSource,
};
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::{structural_check, CollaboratorError, RateLimiter};

// ---------------------------------------------------------------------------
// Validator trait
// ---------------------------------------------------------------------------

/// One check over one part of a submission.
///
/// `index` is the target's position within its section and must be threaded
/// into the emitted field path (`location.addresses[{index}].city`). A
/// validator emits at most one [`RuleResult`] per call; `Ok(None)` means the
/// target passed.
#[async_trait]
pub trait Validator<T: Sync>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Capability predicate: does this check apply to submissions from `source`?
    fn supports(&self, source: ValidationSource) -> bool;

    async fn validate(&self, target: &T, index: usize)
        -> Result<Option<RuleResult>, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Rejection
// ---------------------------------------------------------------------------

/// Why [`ValidationEngine::validate`] refused a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A required section is missing. No rule ran.
    Structural(RuleResult),
    /// Rate limit hit or one or more rule failures, in deterministic order.
    Rules(Vec<RuleResult>),
}

impl Rejection {
    pub fn results(&self) -> &[RuleResult] {
        match self {
            Rejection::Structural(r) => std::slice::from_ref(r),
            Rejection::Rules(rs) => rs,
        }
    }

    pub fn into_results(self) -> Vec<RuleResult> {
        match self {
            Rejection::Structural(r) => vec![r],
            Rejection::Rules(rs) => rs,
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, Rejection::Structural(_))
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Runs the structural gate and then every applicable validator.
///
/// Result order is section (business, addresses, contacts, location), then
/// target index, then validator registration order, independent of which
/// call finishes first.
pub struct ValidationEngine {
    business: Vec<Arc<dyn Validator<BusinessInformation>>>,
    address: Vec<Arc<dyn Validator<Address>>>,
    contact: Vec<Arc<dyn Validator<Contact>>>,
    location: Vec<Arc<dyn Validator<LocationData>>>,
    rate_limiter: Option<RateLimiter>,
    rule_timeout: Duration,
}

impl ValidationEngine {
    pub fn new(rule_timeout: Duration) -> Self {
        Self {
            business: Vec::new(),
            address: Vec::new(),
            contact: Vec::new(),
            location: Vec::new(),
            rate_limiter: None,
            rule_timeout,
        }
    }

    pub fn with_business(mut self, v: Arc<dyn Validator<BusinessInformation>>) -> Self {
        self.business.push(v);
        self
    }

    pub fn with_address(mut self, v: Arc<dyn Validator<Address>>) -> Self {
        self.address.push(v);
        self
    }

    pub fn with_contact(mut self, v: Arc<dyn Validator<Contact>>) -> Self {
        self.contact.push(v);
        self
    }

    pub fn with_location(mut self, v: Arc<dyn Validator<LocationData>>) -> Self {
        self.location.push(v);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Number of registered validators across all sections.
    pub fn validator_count(&self) -> usize {
        self.business.len() + self.address.len() + self.contact.len() + self.location.len()
    }

    /// Validate `draft` as submitted through `source`.
    ///
    /// A missing section yields [`Rejection::Structural`]. A rate-limit hit
    /// yields a single-entry [`Rejection::Rules`] and no rule runs. Otherwise
    /// every rule failure is returned together; on success the draft is
    /// handed back unchanged.
    pub async fn validate(
        &self,
        draft: SubmissionDraft,
        source: ValidationSource,
    ) -> Result<SubmissionDraft, Rejection> {
        structural_check(&draft).map_err(Rejection::Structural)?;

        if let Some(limiter) = &self.rate_limiter {
            match limiter.check(&draft.submitter, Utc::now()).await {
                Ok(Some(hit)) => {
                    info!(submitter = %draft.submitter.key(), "rate limit reached");
                    return Err(Rejection::Rules(vec![hit]));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(submitter = %draft.submitter.key(), error = %e, "rate limit check degraded; allowing");
                }
            }
        }

        let errors = match (&draft.business_information, &draft.location) {
            (Some(business), Some(location)) => self.run_rules(business, location, source).await,
            // structural_check guarantees both sections
            _ => Vec::new(),
        };

        if errors.is_empty() {
            debug!(submitter = %draft.submitter.key(), "validation passed");
            Ok(draft)
        } else {
            info!(
                submitter = %draft.submitter.key(),
                failures = errors.len(),
                "validation failed"
            );
            Err(Rejection::Rules(errors))
        }
    }

    async fn run_rules(
        &self,
        business: &BusinessInformation,
        location: &LocationData,
        source: ValidationSource,
    ) -> Vec<RuleResult> {
        let t = self.rule_timeout;

        let business_calls = self
            .business
            .iter()
            .filter(|v| v.supports(source))
            .map(|v| run_one(v.as_ref(), business, 0, t));

        let mut address_calls = Vec::new();
        for (i, addr) in location.addresses.iter().enumerate() {
            for v in self.address.iter().filter(|v| v.supports(source)) {
                address_calls.push(run_one(v.as_ref(), addr, i, t));
            }
        }

        let mut contact_calls = Vec::new();
        for (i, contact) in location.contacts.iter().enumerate() {
            for v in self.contact.iter().filter(|v| v.supports(source)) {
                contact_calls.push(run_one(v.as_ref(), contact, i, t));
            }
        }

        let location_calls = self
            .location
            .iter()
            .filter(|v| v.supports(source))
            .map(|v| run_one(v.as_ref(), location, 0, t));

        let (b, a, c, l) = tokio::join!(
            join_all(business_calls),
            join_all(address_calls),
            join_all(contact_calls),
            join_all(location_calls),
        );

        b.into_iter()
            .chain(a)
            .chain(c)
            .chain(l)
            .flatten()
            .collect()
    }
}

async fn run_one<T: Sync>(
    validator: &dyn Validator<T>,
    target: &T,
    index: usize,
    timeout: Duration,
) -> Option<RuleResult> {
    match tokio::time::timeout(timeout, validator.validate(target, index)).await {
        Ok(Ok(result)) => {
            if let Some(r) = &result {
                debug!(validator = validator.name(), index, field = %r.field, "rule failed");
            }
            result
        }
        Ok(Err(e)) => {
            warn!(validator = validator.name(), index, error = %e, "validator degraded; no result");
            None
        }
        Err(_) => {
            warn!(
                validator = validator.name(),
                index,
                timeout_ms = timeout.as_millis() as u64,
                "validator timed out; no result"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creg_schemas::SubmitterIdentity;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Always {
        name: &'static str,
        delay_ms: u64,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Validator<Address> for Always {
        fn name(&self) -> &'static str {
            self.name
        }
        fn supports(&self, _source: ValidationSource) -> bool {
            true
        }
        async fn validate(
            &self,
            _target: &Address,
            index: usize,
        ) -> Result<Option<RuleResult>, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            Ok(Some(RuleResult::new(
                format!("location.addresses[{index}].x"),
                self.name,
            )))
        }
    }

    struct StaffOnly;

    #[async_trait]
    impl Validator<Address> for StaffOnly {
        fn name(&self) -> &'static str {
            "staff_only"
        }
        fn supports(&self, source: ValidationSource) -> bool {
            source == ValidationSource::Staff
        }
        async fn validate(
            &self,
            _target: &Address,
            _index: usize,
        ) -> Result<Option<RuleResult>, CollaboratorError> {
            Ok(Some(RuleResult::new("staff", "staff")))
        }
    }

    fn addr(i: usize) -> Address {
        Address {
            index: i,
            name: format!("addr {i}"),
            street_address: "1 Main St".into(),
            complementary_address: None,
            city: "Victoria".into(),
            province_code: Some("BC".into()),
            country_code: "CA".into(),
            postal_code: "V8V1A1".into(),
            business_phone: None,
            secondary_phone: None,
            email_address: None,
            notes: None,
        }
    }

    fn draft(n_addr: usize) -> SubmissionDraft {
        let addresses: Vec<Address> = (0..n_addr).map(addr).collect();
        serde_json::from_value(serde_json::json!({
            "submitter": { "provider": "bcsc", "userId": "u" },
            "businessInformation": {
                "legalName": "ACME", "businessType": "U", "clientType": "C"
            },
            "location": {
                "addresses": addresses,
                "contacts": [{
                    "index": 0, "contactType": "BL", "firstName": "A", "lastName": "B"
                }]
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn results_follow_index_then_registration_order_not_completion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = ValidationEngine::new(Duration::from_secs(1))
            .with_address(Arc::new(Always {
                name: "slow",
                delay_ms: 30,
                calls: calls.clone(),
            }))
            .with_address(Arc::new(Always {
                name: "fast",
                delay_ms: 0,
                calls: calls.clone(),
            }));

        let errs = engine
            .validate(draft(2), ValidationSource::External)
            .await
            .unwrap_err();
        assert!(!errs.is_structural());
        let got: Vec<(String, String)> =
            errs.into_results().into_iter().map(|r| (r.field, r.message)).collect();
        assert_eq!(
            got,
            vec![
                ("location.addresses[0].x".into(), "slow".into()),
                ("location.addresses[0].x".into(), "fast".into()),
                ("location.addresses[1].x".into(), "slow".into()),
                ("location.addresses[1].x".into(), "fast".into()),
            ]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn timed_out_validator_yields_no_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = ValidationEngine::new(Duration::from_millis(5)).with_address(Arc::new(
            Always {
                name: "stuck",
                delay_ms: 500,
                calls,
            },
        ));
        assert!(engine
            .validate(draft(1), ValidationSource::Staff)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn unsupported_source_skips_validator() {
        let engine = ValidationEngine::new(Duration::from_secs(1)).with_address(Arc::new(StaffOnly));
        assert!(engine
            .validate(draft(1), ValidationSource::External)
            .await
            .is_ok());
        assert_eq!(
            engine
                .validate(draft(1), ValidationSource::Staff)
                .await
                .unwrap_err()
                .results()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn missing_contacts_is_single_structural_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = ValidationEngine::new(Duration::from_secs(1)).with_address(Arc::new(
            Always {
                name: "never",
                delay_ms: 0,
                calls: calls.clone(),
            },
        ));
        let mut d = draft(3);
        if let Some(loc) = d.location.as_mut() {
            loc.contacts.clear();
        }
        d.submitter = SubmitterIdentity::new("idir", "staffer");
        let rejection = engine.validate(d, ValidationSource::Staff).await.unwrap_err();
        let Rejection::Structural(err) = rejection else {
            panic!("expected structural rejection, got {rejection:?}");
        };
        assert_eq!(err.field, "location.contacts");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
