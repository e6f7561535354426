use async_trait::async_trait;
use creg_validation::{CollaboratorError, ReferenceData};
use reqwest::StatusCode;

use crate::{error_text, SorHttp};

/// [`ReferenceData`] over the code-table API.
///
/// `GET /api/codes/...` answers 200 when the code exists and 404 when it
/// does not; anything else is a collaborator error.
#[derive(Debug, Clone)]
pub struct HttpReferenceData {
    sor: SorHttp,
}

impl HttpReferenceData {
    pub fn new(sor: SorHttp) -> Self {
        Self { sor }
    }

    pub fn new_with_base_url(api_key: Option<String>, base_url: String) -> Self {
        Self::new(SorHttp::new_with_base_url(api_key, base_url))
    }

    async fn exists(&self, segments: &[&str]) -> Result<bool, CollaboratorError> {
        let url = self
            .sor
            .url(segments)
            .map_err(CollaboratorError::Unavailable)?;
        let resp = self
            .sor
            .get(url)
            .send()
            .await
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => {
                let (status, body) = error_text(resp).await;
                Err(CollaboratorError::BadResponse(format!(
                    "code lookup status={} body={}",
                    status.as_u16(),
                    body
                )))
            }
        }
    }
}

#[async_trait]
impl ReferenceData for HttpReferenceData {
    async fn country_exists(&self, country_code: &str) -> Result<bool, CollaboratorError> {
        self.exists(&["api", "codes", "countries", country_code]).await
    }

    async fn province_exists(
        &self,
        country_code: &str,
        province_code: &str,
    ) -> Result<bool, CollaboratorError> {
        self.exists(&["api", "codes", "countries", country_code, "provinces", province_code])
            .await
    }

    async fn client_type_exists(&self, client_type: &str) -> Result<bool, CollaboratorError> {
        self.exists(&["api", "codes", "client-types", client_type]).await
    }

    async fn district_exists(&self, district: &str) -> Result<bool, CollaboratorError> {
        self.exists(&["api", "codes", "districts", district]).await
    }
}
