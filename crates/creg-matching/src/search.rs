use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A client record in the system of record returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub client_number: String,
    pub client_name: String,
    /// Similarity score for fuzzy searches; `None` for exact lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl CandidateRecord {
    pub fn new(client_number: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            client_number: client_number.into(),
            client_name: client_name.into(),
            score: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualQuery {
    pub first_name: String,
    pub last_name: String,
    pub birthdate: Option<NaiveDate>,
    pub id_type: Option<String>,
    pub id_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactQuery {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressQuery {
    pub street_address: String,
    pub city: String,
    pub province_code: Option<String>,
    pub country_code: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("search transport error: {0}")]
    Transport(String),
    #[error("search api error status={status}: {message}")]
    Api { status: u16, message: String },
    #[error("search decode error: {0}")]
    Decode(String),
}

/// Read-only search surface of the system of record.
///
/// Implementations must be `Send + Sync`; matchers share one instance
/// across concurrent calls.
#[async_trait]
pub trait ClientSearch: Send + Sync {
    async fn by_incorporation_number(
        &self,
        number: &str,
    ) -> Result<Vec<CandidateRecord>, SearchError>;

    async fn by_registration_number(
        &self,
        number: &str,
    ) -> Result<Vec<CandidateRecord>, SearchError>;

    async fn by_legal_name_fuzzy(&self, name: &str) -> Result<Vec<CandidateRecord>, SearchError>;

    async fn by_doing_business_as(&self, name: &str)
        -> Result<Vec<CandidateRecord>, SearchError>;

    async fn by_individual(
        &self,
        query: &IndividualQuery,
    ) -> Result<Vec<CandidateRecord>, SearchError>;

    async fn by_contact(&self, query: &ContactQuery) -> Result<Vec<CandidateRecord>, SearchError>;

    async fn by_location(&self, query: &AddressQuery)
        -> Result<Vec<CandidateRecord>, SearchError>;

    async fn find_by_client_number(
        &self,
        client_number: &str,
    ) -> Result<Option<CandidateRecord>, SearchError>;
}
