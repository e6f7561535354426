//! creg-sor
//!
//! HTTP adapters for the client system of record.
//!
//! - [`HttpClientSearch`]: duplicate searches used by the matchers.
//! - [`HttpReferenceData`]: code-table lookups used by the validators.
//! - [`HttpSyncClient`]: write accepted submissions and read them back.
//!
//! All three share one [`SorHttp`] (connection pool, base URL, API key). The
//! API key is resolved by the caller and passed in; it is sent as a header
//! and never logged.

mod reference;
mod search;
mod sync;

pub use reference::HttpReferenceData;
pub use search::HttpClientSearch;
pub use sync::HttpSyncClient;

use std::time::Duration;

use anyhow::{Context, Result};
use creg_config::secrets::ResolvedSecrets;
use creg_config::SorSettings;
use reqwest::{RequestBuilder, Response, StatusCode, Url};

pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Shared HTTP plumbing for the system-of-record adapters.
#[derive(Clone)]
pub struct SorHttp {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for SorHttp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SorHttp")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl SorHttp {
    pub fn new_with_base_url(api_key: Option<String>, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Client with the configured request timeout.
    pub fn from_settings(settings: &SorSettings, secrets: &ResolvedSecrets) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .context("failed to build system-of-record http client")?;
        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
            api_key: secrets.sor_api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `base_url` with each of `segments` appended as one escaped path segment.
    pub(crate) fn url(&self, segments: &[&str]) -> std::result::Result<Url, String> {
        let mut url = Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|e| format!("bad system-of-record base url: {e}"))?;
        url.path_segments_mut()
            .map_err(|_| "system-of-record base url cannot take a path".to_string())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn get(&self, url: Url) -> RequestBuilder {
        self.authorize(self.http.get(url))
    }

    pub(crate) fn post(&self, url: Url) -> RequestBuilder {
        self.authorize(self.http.post(url))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header("Accept", "application/json");
        match &self.api_key {
            Some(k) => req.header(API_KEY_HEADER, k),
            None => req,
        }
    }
}

/// Body of a non-success response, truncated for error messages.
pub(crate) async fn error_text(resp: Response) -> (StatusCode, String) {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    (status, body.chars().take(200).collect())
}
