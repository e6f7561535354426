use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Match-signal category names.
pub mod category {
    pub const INCORPORATION_NUMBER: &str = "incorporationNumber";
    pub const REGISTRATION_NUMBER: &str = "registrationNumber";
    pub const LEGAL_NAME: &str = "legalName";
    pub const DOING_BUSINESS_AS: &str = "doingBusinessAs";
    pub const INDIVIDUAL: &str = "individual";
    pub const CONTACT: &str = "contact";
    pub const LOCATION: &str = "location";
    pub const GOOD_STANDING: &str = "goodStanding";
    /// Synthetic category naming matchers that failed to run.
    pub const MATCHER_UNAVAILABLE: &str = "matcherUnavailable";
}

// ---------------------------------------------------------------------------
// RuleResult
// ---------------------------------------------------------------------------

/// A failed validation check.
///
/// "Valid" is the absence of a `RuleResult`, never a sentinel value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    /// Dot/bracket addressed path, e.g. `location.addresses[0].postalCode`.
    pub field: String,
    pub message: String,
    /// Existing-record id when the failure is itself a duplicate finding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_id: Option<String>,
}

impl RuleResult {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            existing_id: None,
        }
    }

    pub fn duplicate(
        field: impl Into<String>,
        message: impl Into<String>,
        existing_id: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            existing_id: Some(existing_id.into()),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        self.existing_id.is_some()
    }
}

impl std::fmt::Display for RuleResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.existing_id {
            Some(id) => write!(f, "{}: {} (existing {})", self.field, self.message, id),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

// ---------------------------------------------------------------------------
// MatchSignal
// ---------------------------------------------------------------------------

/// One value carried by a [`MatchSignal`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MatchValue {
    /// Identifier of a conflicting record in the system of record.
    Record(String),
    /// Free-text advisory, e.g. "client not in good standing".
    Advisory(String),
}

impl MatchValue {
    pub fn record_id(&self) -> Option<&str> {
        match self {
            MatchValue::Record(id) => Some(id),
            MatchValue::Advisory(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MatchValue::Record(s) | MatchValue::Advisory(s) => s,
        }
    }
}

/// Outcome of one matcher run: a category plus the values it found.
///
/// An empty value set means "no signal".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSignal {
    pub field: String,
    pub values: BTreeSet<MatchValue>,
}

impl MatchSignal {
    pub fn empty(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            values: BTreeSet::new(),
        }
    }

    pub fn records<I, S>(field: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            values: ids.into_iter().map(|s| MatchValue::Record(s.into())).collect(),
        }
    }

    pub fn advisory(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut values = BTreeSet::new();
        values.insert(MatchValue::Advisory(message.into()));
        Self {
            field: field.into(),
            values,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has_advisory(&self) -> bool {
        self.values
            .iter()
            .any(|v| matches!(v, MatchValue::Advisory(_)))
    }

    /// Existing-record ids in this signal, sorted.
    pub fn record_ids(&self) -> Vec<&str> {
        self.values.iter().filter_map(MatchValue::record_id).collect()
    }
}

/// A matcher that did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherFailure {
    pub matcher: String,
    pub reason: String,
}

/// Aggregated output of one matching pass.
///
/// `signals` holds only non-empty signals, in matcher registration order.
/// A report with failures is incomplete: absence of a signal from a failed
/// matcher says nothing about duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub signals: Vec<MatchSignal>,
    #[serde(default)]
    pub failures: Vec<MatcherFailure>,
}

impl MatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_matchers(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.matcher.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Final disposition for a submission.
///
/// `NeedsReview` and `RejectDuplicate` carry the signals that produced them so
/// reviewers and notices can name the candidate records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    AutoApprove,
    NeedsReview { evidence: Vec<MatchSignal> },
    RejectDuplicate { evidence: Vec<MatchSignal> },
    RejectInvalid,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::AutoApprove => "AUTO_APPROVE",
            Decision::NeedsReview { .. } => "NEEDS_REVIEW",
            Decision::RejectDuplicate { .. } => "REJECT_DUPLICATE",
            Decision::RejectInvalid => "REJECT_INVALID",
        }
    }

    pub fn evidence(&self) -> &[MatchSignal] {
        match self {
            Decision::NeedsReview { evidence } | Decision::RejectDuplicate { evidence } => {
                evidence
            }
            Decision::AutoApprove | Decision::RejectInvalid => &[],
        }
    }

    /// Every existing-record id named by the evidence, sorted and de-duplicated.
    pub fn matched_ids(&self) -> Vec<String> {
        let ids: BTreeSet<&str> = self
            .evidence()
            .iter()
            .flat_map(|s| s.record_ids())
            .collect();
        ids.into_iter().map(str::to_string).collect()
    }

    /// Ids listed under one category.
    pub fn ids_for(&self, field: &str) -> Vec<String> {
        self.evidence()
            .iter()
            .filter(|s| s.field == field)
            .flat_map(|s| s.record_ids())
            .map(str::to_string)
            .collect()
    }
}
