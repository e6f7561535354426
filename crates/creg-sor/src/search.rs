use async_trait::async_trait;
use creg_matching::{
    AddressQuery, CandidateRecord, ClientSearch, ContactQuery, IndividualQuery, SearchError,
};
use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::{error_text, SorHttp};

/// [`ClientSearch`] over the system-of-record REST search API.
///
/// Exact lookups are `GET /api/search/{kind}/{value}`; fuzzy name searches
/// take `?name=`; structured searches `POST` a JSON query. Every search
/// returns a JSON array of candidates.
#[derive(Debug, Clone)]
pub struct HttpClientSearch {
    sor: SorHttp,
}

impl HttpClientSearch {
    pub fn new(sor: SorHttp) -> Self {
        Self { sor }
    }

    pub fn new_with_base_url(api_key: Option<String>, base_url: String) -> Self {
        Self::new(SorHttp::new_with_base_url(api_key, base_url))
    }

    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, SearchError> {
        self.sor.url(segments).map_err(SearchError::Transport)
    }

    async fn get_by(&self, kind: &str, value: &str) -> Result<Vec<CandidateRecord>, SearchError> {
        let url = self.url(&["api", "search", kind, value])?;
        self.send(kind, self.sor.get(url)).await
    }

    async fn get_by_name(&self, kind: &str, name: &str) -> Result<Vec<CandidateRecord>, SearchError> {
        let url = self.url(&["api", "search", kind])?;
        self.send(kind, self.sor.get(url).query(&[("name", name)])).await
    }

    async fn post_query<Q: Serialize + Sync>(
        &self,
        kind: &str,
        query: &Q,
    ) -> Result<Vec<CandidateRecord>, SearchError> {
        let url = self.url(&["api", "search", kind])?;
        self.send(kind, self.sor.post(url).json(query)).await
    }

    async fn send(
        &self,
        kind: &str,
        req: RequestBuilder,
    ) -> Result<Vec<CandidateRecord>, SearchError> {
        let resp = req
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let (status, message) = error_text(resp).await;
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let found: Vec<CandidateRecord> = resp
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;
        debug!(search = kind, candidates = found.len(), "search returned");
        Ok(found)
    }
}

#[async_trait]
impl ClientSearch for HttpClientSearch {
    async fn by_incorporation_number(
        &self,
        number: &str,
    ) -> Result<Vec<CandidateRecord>, SearchError> {
        self.get_by("incorporation", number).await
    }

    async fn by_registration_number(
        &self,
        number: &str,
    ) -> Result<Vec<CandidateRecord>, SearchError> {
        self.get_by("registration", number).await
    }

    async fn by_legal_name_fuzzy(&self, name: &str) -> Result<Vec<CandidateRecord>, SearchError> {
        self.get_by_name("legal-name", name).await
    }

    async fn by_doing_business_as(
        &self,
        name: &str,
    ) -> Result<Vec<CandidateRecord>, SearchError> {
        self.get_by_name("doing-business-as", name).await
    }

    async fn by_individual(
        &self,
        query: &IndividualQuery,
    ) -> Result<Vec<CandidateRecord>, SearchError> {
        self.post_query("individual", query).await
    }

    async fn by_contact(&self, query: &ContactQuery) -> Result<Vec<CandidateRecord>, SearchError> {
        self.post_query("contact", query).await
    }

    async fn by_location(
        &self,
        query: &AddressQuery,
    ) -> Result<Vec<CandidateRecord>, SearchError> {
        self.post_query("location", query).await
    }

    async fn find_by_client_number(
        &self,
        client_number: &str,
    ) -> Result<Option<CandidateRecord>, SearchError> {
        let url = self.url(&["api", "clients", client_number])?;
        let resp = self
            .sor
            .get(url)
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let (status, message) = error_text(resp).await;
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }
        resp.json::<CandidateRecord>()
            .await
            .map(Some)
            .map_err(|e| SearchError::Decode(e.to_string()))
    }
}
