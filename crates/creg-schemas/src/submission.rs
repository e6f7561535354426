use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Decision, SubmissionId, ValidationSource, BUSINESS_TYPE_REGISTERED, CLIENT_TYPE_INDIVIDUAL,
};

// ---------------------------------------------------------------------------
// Submitter
// ---------------------------------------------------------------------------

/// Who filed the submission, as asserted by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitterIdentity {
    /// Identity provider tag, e.g. `"bceidbusiness"`, `"bcsc"`, `"idir"`.
    pub provider: String,
    /// Provider-scoped user id.
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl SubmitterIdentity {
    pub fn new(provider: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            user_id: user_id.into(),
            display_name: None,
            email: None,
        }
    }

    /// Stable key used for rate limiting and audit columns: `provider\user`.
    pub fn key(&self) -> String {
        format!(
            "{}\\{}",
            self.provider.trim().to_ascii_lowercase(),
            self.user_id.trim()
        )
    }
}

// ---------------------------------------------------------------------------
// Business identity
// ---------------------------------------------------------------------------

/// Identification document presented by an individual applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identification {
    /// Document type code, e.g. `"BCDL"`, `"PASS"`.
    pub id_type: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province_code: Option<String>,
}

/// Personal identity fields, present only when the client type is individual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualIdentity {
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identification: Option<Identification>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInformation {
    pub legal_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incorporation_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doing_business_as: Option<String>,
    /// `R` (registered) or `U` (unregistered).
    pub business_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_type: Option<String>,
    pub client_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good_standing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub individual: Option<IndividualIdentity>,
}

impl BusinessInformation {
    pub fn is_individual(&self) -> bool {
        self.client_type.trim().eq_ignore_ascii_case(CLIENT_TYPE_INDIVIDUAL)
    }

    pub fn is_registered(&self) -> bool {
        self.business_type.trim().eq_ignore_ascii_case(BUSINESS_TYPE_REGISTERED)
    }

    /// Incorporation number with surrounding whitespace removed, if non-blank.
    pub fn incorporation_number(&self) -> Option<&str> {
        non_blank(self.incorporation_number.as_deref())
    }

    /// Registration number with surrounding whitespace removed, if non-blank.
    pub fn registration_number(&self) -> Option<&str> {
        non_blank(self.registration_number.as_deref())
    }

    pub fn doing_business_as(&self) -> Option<&str> {
        non_blank(self.doing_business_as.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Ordinal position within the submission; threaded into field paths.
    pub index: usize,
    /// Location name, e.g. `"Mailing address"`.
    pub name: String,
    pub street_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complementary_address: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province_code: Option<String>,
    pub country_code: String,
    pub postal_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub index: usize,
    /// Role code, e.g. `"BL"` (billing), `"DI"` (director).
    pub contact_type: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    /// Names of the addresses this contact is associated with.
    #[serde(default)]
    pub location_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationData {
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

// ---------------------------------------------------------------------------
// Draft (intake shape)
// ---------------------------------------------------------------------------

/// A submission as received at intake, before structural validation.
///
/// Sections are optional here because the structural gate is responsible for
/// rejecting incomplete drafts; every later stage works on [`Submission`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDraft {
    pub submitter: SubmitterIdentity,
    #[serde(default)]
    pub business_information: Option<BusinessInformation>,
    #[serde(default)]
    pub location: Option<LocationData>,
}

// ---------------------------------------------------------------------------
// Lifecycle status
// ---------------------------------------------------------------------------

/// Pipeline-owned status of a persisted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Received,
    Validating,
    RejectedInvalid,
    Persisted,
    Matching,
    AutoApproved,
    NeedsReview,
    RejectedDuplicate,
    Syncing,
    Complete,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Received => "RECEIVED",
            SubmissionStatus::Validating => "VALIDATING",
            SubmissionStatus::RejectedInvalid => "REJECTED_INVALID",
            SubmissionStatus::Persisted => "PERSISTED",
            SubmissionStatus::Matching => "MATCHING",
            SubmissionStatus::AutoApproved => "AUTO_APPROVED",
            SubmissionStatus::NeedsReview => "NEEDS_REVIEW",
            SubmissionStatus::RejectedDuplicate => "REJECTED_DUPLICATE",
            SubmissionStatus::Syncing => "SYNCING",
            SubmissionStatus::Complete => "COMPLETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let st = match s {
            "RECEIVED" => SubmissionStatus::Received,
            "VALIDATING" => SubmissionStatus::Validating,
            "REJECTED_INVALID" => SubmissionStatus::RejectedInvalid,
            "PERSISTED" => SubmissionStatus::Persisted,
            "MATCHING" => SubmissionStatus::Matching,
            "AUTO_APPROVED" => SubmissionStatus::AutoApproved,
            "NEEDS_REVIEW" => SubmissionStatus::NeedsReview,
            "REJECTED_DUPLICATE" => SubmissionStatus::RejectedDuplicate,
            "SYNCING" => SubmissionStatus::Syncing,
            "COMPLETE" => SubmissionStatus::Complete,
            _ => return None,
        };
        Some(st)
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::RejectedInvalid | SubmissionStatus::Complete
        )
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal stamp of a completed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalOutcome {
    Approved,
    Rejected,
}

/// A human reviewer's verdict on a submission parked in `NEEDS_REVIEW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewVerdict {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub verdict: ReviewVerdict,
    pub reviewer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub reviewed_at_utc: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Persisted submission
// ---------------------------------------------------------------------------

/// The unit of work owned by the pipeline for its whole lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: SubmissionId,
    pub source: ValidationSource,
    pub submitter: SubmitterIdentity,
    pub business_information: BusinessInformation,
    pub location: LocationData,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub decision: Option<Decision>,
    #[serde(default)]
    pub review: Option<ReviewRecord>,
    /// Client number assigned by the system of record after sync.
    #[serde(default)]
    pub client_number: Option<String>,
    #[serde(default)]
    pub outcome: Option<FinalOutcome>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
}

impl Submission {
    /// Build a `RECEIVED` submission from a draft that passed validation.
    ///
    /// Returns `None` when a required section is absent, which only happens
    /// if the caller skipped the structural gate.
    pub fn received(
        id: SubmissionId,
        draft: SubmissionDraft,
        source: ValidationSource,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let business_information = draft.business_information?;
        let location = draft.location?;
        let who = draft.submitter.key();
        Some(Self {
            id,
            source,
            submitter: draft.submitter,
            business_information,
            location,
            status: SubmissionStatus::Received,
            decision: None,
            review: None,
            client_number: None,
            outcome: None,
            created_at_utc: now,
            updated_at_utc: now,
            created_by: who.clone(),
            updated_by: who,
        })
    }
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}
