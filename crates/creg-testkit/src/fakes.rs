use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use creg_matching::{
    AddressQuery, CandidateRecord, ClientSearch, ContactQuery, IndividualQuery, SearchError,
};
use creg_runtime::{Notice, Notifier, NotifyError, SyncClient, SyncOutcome};
use creg_schemas::Submission;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

fn key(s: &str) -> String {
    s.trim().to_ascii_uppercase()
}

// ---------------------------------------------------------------------------
// FakeClientSearch
// ---------------------------------------------------------------------------

/// Seeded in-memory system-of-record search.
///
/// Exact searches match on the upper-cased value. Legal-name and
/// doing-business-as searches are "fuzzy": a seeded fragment matches any
/// query that contains it. Unseeded searches return no candidates.
#[derive(Default)]
pub struct FakeClientSearch {
    incorporation: BTreeMap<String, Vec<CandidateRecord>>,
    registration: BTreeMap<String, Vec<CandidateRecord>>,
    legal_name: Vec<(String, CandidateRecord)>,
    doing_business_as: Vec<(String, CandidateRecord)>,
    individual: BTreeMap<String, Vec<CandidateRecord>>,
    contact_email: BTreeMap<String, Vec<CandidateRecord>>,
    postal_code: BTreeMap<String, Vec<CandidateRecord>>,
    clients: BTreeMap<String, CandidateRecord>,
    failing: Vec<&'static str>,
    delay: Option<(&'static str, Duration)>,
    calls: AtomicUsize,
}

impl FakeClientSearch {
    pub fn new() -> Self {
        Self::default()
    }

    fn candidate(&mut self, client_number: &str, name: &str) -> CandidateRecord {
        let c = CandidateRecord::new(client_number, name);
        self.clients.insert(client_number.to_string(), c.clone());
        c
    }

    pub fn with_incorporation(mut self, number: &str, client_number: &str) -> Self {
        let c = self.candidate(client_number, number);
        self.incorporation.entry(key(number)).or_default().push(c);
        self
    }

    pub fn with_registration(mut self, number: &str, client_number: &str) -> Self {
        let c = self.candidate(client_number, number);
        self.registration.entry(key(number)).or_default().push(c);
        self
    }

    pub fn with_legal_name(mut self, fragment: &str, client_number: &str) -> Self {
        let c = self.candidate(client_number, fragment);
        self.legal_name.push((key(fragment), c));
        self
    }

    pub fn with_doing_business_as(mut self, fragment: &str, client_number: &str) -> Self {
        let c = self.candidate(client_number, fragment);
        self.doing_business_as.push((key(fragment), c));
        self
    }

    /// Individual matched on last name.
    pub fn with_individual(mut self, last_name: &str, client_number: &str) -> Self {
        let c = self.candidate(client_number, last_name);
        self.individual.entry(key(last_name)).or_default().push(c);
        self
    }

    pub fn with_contact_email(mut self, email: &str, client_number: &str) -> Self {
        let c = self.candidate(client_number, email);
        self.contact_email.entry(key(email)).or_default().push(c);
        self
    }

    pub fn with_postal_code(mut self, postal_code: &str, client_number: &str) -> Self {
        let c = self.candidate(client_number, postal_code);
        self.postal_code
            .entry(key(&postal_code.replace(' ', "")))
            .or_default()
            .push(c);
        self
    }

    /// Make one search kind fail with a transport error. Kinds:
    /// `incorporation`, `registration`, `legal_name`, `doing_business_as`,
    /// `individual`, `contact`, `location`.
    pub fn failing(mut self, kind: &'static str) -> Self {
        self.failing.push(kind);
        self
    }

    /// Delay one search kind before answering.
    pub fn delayed(mut self, kind: &'static str, by: Duration) -> Self {
        self.delay = Some((kind, by));
        self
    }

    /// Total searches served, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, kind: &'static str) -> Result<(), SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((k, d)) = self.delay {
            if k == kind {
                tokio::time::sleep(d).await;
            }
        }
        if self.failing.contains(&kind) {
            return Err(SearchError::Transport(format!("{kind} search unavailable")));
        }
        Ok(())
    }

    fn fuzzy(seeded: &[(String, CandidateRecord)], query: &str) -> Vec<CandidateRecord> {
        let q = key(query);
        seeded
            .iter()
            .filter(|(fragment, _)| q.contains(fragment.as_str()))
            .map(|(_, c)| c.clone())
            .collect()
    }
}

#[async_trait]
impl ClientSearch for FakeClientSearch {
    async fn by_incorporation_number(
        &self,
        number: &str,
    ) -> Result<Vec<CandidateRecord>, SearchError> {
        self.enter("incorporation").await?;
        Ok(self.incorporation.get(&key(number)).cloned().unwrap_or_default())
    }

    async fn by_registration_number(
        &self,
        number: &str,
    ) -> Result<Vec<CandidateRecord>, SearchError> {
        self.enter("registration").await?;
        Ok(self.registration.get(&key(number)).cloned().unwrap_or_default())
    }

    async fn by_legal_name_fuzzy(&self, name: &str) -> Result<Vec<CandidateRecord>, SearchError> {
        self.enter("legal_name").await?;
        Ok(Self::fuzzy(&self.legal_name, name))
    }

    async fn by_doing_business_as(
        &self,
        name: &str,
    ) -> Result<Vec<CandidateRecord>, SearchError> {
        self.enter("doing_business_as").await?;
        Ok(Self::fuzzy(&self.doing_business_as, name))
    }

    async fn by_individual(
        &self,
        query: &IndividualQuery,
    ) -> Result<Vec<CandidateRecord>, SearchError> {
        self.enter("individual").await?;
        Ok(self.individual.get(&key(&query.last_name)).cloned().unwrap_or_default())
    }

    async fn by_contact(&self, query: &ContactQuery) -> Result<Vec<CandidateRecord>, SearchError> {
        self.enter("contact").await?;
        Ok(self.contact_email.get(&key(&query.email)).cloned().unwrap_or_default())
    }

    async fn by_location(
        &self,
        query: &AddressQuery,
    ) -> Result<Vec<CandidateRecord>, SearchError> {
        self.enter("location").await?;
        Ok(self
            .postal_code
            .get(&key(&query.postal_code.replace(' ', "")))
            .cloned()
            .unwrap_or_default())
    }

    async fn find_by_client_number(
        &self,
        client_number: &str,
    ) -> Result<Option<CandidateRecord>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.clients.get(client_number).cloned())
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

/// Keeps every notice; optionally fails after recording.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            notices: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        lock(&self.notices).push(notice.clone());
        if self.fail {
            return Err(NotifyError("mail relay down".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LaggingSyncClient
// ---------------------------------------------------------------------------

/// System-of-record writer whose reads trail its writes.
///
/// `apply` assigns sequential client numbers starting at `00001000`. The
/// first `lag_reads` read-backs of each record answer `NotFoundYet`.
pub struct LaggingSyncClient {
    lag_reads: u32,
    fail_apply: Option<String>,
    fail_read: Option<String>,
    next: AtomicUsize,
    reads: Mutex<BTreeMap<String, u32>>,
    applied: Mutex<Vec<String>>,
}

impl LaggingSyncClient {
    pub fn new(lag_reads: u32) -> Self {
        Self {
            lag_reads,
            fail_apply: None,
            fail_read: None,
            next: AtomicUsize::new(1000),
            reads: Mutex::new(BTreeMap::new()),
            applied: Mutex::new(Vec::new()),
        }
    }

    /// Immediately consistent.
    pub fn consistent() -> Self {
        Self::new(0)
    }

    pub fn failing_apply(mut self, reason: &str) -> Self {
        self.fail_apply = Some(reason.to_string());
        self
    }

    pub fn failing_read(mut self, reason: &str) -> Self {
        self.fail_read = Some(reason.to_string());
        self
    }

    /// Read-backs issued for `client_number` so far.
    pub fn reads_of(&self, client_number: &str) -> u32 {
        lock(&self.reads).get(client_number).copied().unwrap_or(0)
    }

    /// Submission ids written, in order.
    pub fn applied(&self) -> Vec<String> {
        lock(&self.applied).clone()
    }
}

#[async_trait]
impl SyncClient for LaggingSyncClient {
    async fn apply(&self, submission: &Submission) -> SyncOutcome {
        if let Some(r) = &self.fail_apply {
            return SyncOutcome::Failed(r.clone());
        }
        lock(&self.applied).push(submission.id.to_string());
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        SyncOutcome::Created(format!("{n:08}"))
    }

    async fn read_back(&self, client_number: &str) -> SyncOutcome {
        if let Some(r) = &self.fail_read {
            return SyncOutcome::Failed(r.clone());
        }
        let mut reads = lock(&self.reads);
        let seen = reads.entry(client_number.to_string()).or_insert(0);
        *seen += 1;
        if *seen <= self.lag_reads {
            SyncOutcome::NotFoundYet
        } else {
            SyncOutcome::Created(client_number.to_string())
        }
    }
}
