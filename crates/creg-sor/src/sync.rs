use async_trait::async_trait;
use creg_runtime::{SyncClient, SyncOutcome};
use creg_schemas::Submission;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{error_text, SorHttp};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedClient {
    client_number: String,
}

/// [`SyncClient`] over the client write API.
///
/// `POST /api/clients` creates the record and answers with its client
/// number; `GET /api/clients/{number}` answers 404 until the write is
/// visible to readers.
#[derive(Debug, Clone)]
pub struct HttpSyncClient {
    sor: SorHttp,
}

impl HttpSyncClient {
    pub fn new(sor: SorHttp) -> Self {
        Self { sor }
    }

    pub fn new_with_base_url(api_key: Option<String>, base_url: String) -> Self {
        Self::new(SorHttp::new_with_base_url(api_key, base_url))
    }
}

#[async_trait]
impl SyncClient for HttpSyncClient {
    async fn apply(&self, submission: &Submission) -> SyncOutcome {
        let url = match self.sor.url(&["api", "clients"]) {
            Ok(u) => u,
            Err(e) => return SyncOutcome::Failed(e),
        };
        let resp = match self.sor.post(url).json(submission).send().await {
            Ok(r) => r,
            Err(e) => return SyncOutcome::Failed(format!("apply request failed: {e}")),
        };

        if !resp.status().is_success() {
            let (status, body) = error_text(resp).await;
            warn!(submission_id = %submission.id, status = status.as_u16(), "apply rejected");
            return SyncOutcome::Failed(format!("apply status={} body={}", status.as_u16(), body));
        }

        match resp.json::<CreatedClient>().await {
            Ok(c) => {
                debug!(submission_id = %submission.id, client_number = %c.client_number, "applied");
                SyncOutcome::Created(c.client_number)
            }
            Err(e) => SyncOutcome::Failed(format!("apply response decode failed: {e}")),
        }
    }

    async fn read_back(&self, client_number: &str) -> SyncOutcome {
        let url = match self.sor.url(&["api", "clients", client_number]) {
            Ok(u) => u,
            Err(e) => return SyncOutcome::Failed(e),
        };
        let resp = match self.sor.get(url).send().await {
            Ok(r) => r,
            Err(e) => return SyncOutcome::Failed(format!("read-back request failed: {e}")),
        };

        match resp.status() {
            s if s.is_success() => SyncOutcome::Created(client_number.to_string()),
            StatusCode::NOT_FOUND => SyncOutcome::NotFoundYet,
            _ => {
                let (status, body) = error_text(resp).await;
                SyncOutcome::Failed(format!("read-back status={} body={}", status.as_u16(), body))
            }
        }
    }
}
