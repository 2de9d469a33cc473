use std::time::Duration;

use serde_json::Value;

use super::{normalize_nct_id, DocumentSource, SourceError};

/// Public ClinicalTrials.gov v2 API.
pub const DEFAULT_REGISTRY_URL: &str = "https://clinicaltrials.gov/api/v2";

/// Blocking client for the registry `/studies/{nct_id}` endpoint.
pub struct RegistryClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl RegistryClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Request(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn study_url(&self, nct_id: &str) -> String {
        format!("{}/studies/{nct_id}", self.base_url)
    }
}

impl DocumentSource for RegistryClient {
    fn fetch(&self, nct_id: &str) -> Result<Value, SourceError> {
        let id = normalize_nct_id(nct_id)?;
        let url = self.study_url(&id);
        tracing::info!(nct_id = %id, url = %url, "Fetching registry document");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(id));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SourceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .map_err(|e| SourceError::Request(e.to_string()))?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn study_url_trims_trailing_slash() {
        let client = RegistryClient::new("https://example.test/api/v2/", None).unwrap();
        assert_eq!(
            client.study_url("NCT04000001"),
            "https://example.test/api/v2/studies/NCT04000001"
        );
    }

    #[test]
    fn invalid_identifier_fails_before_any_request() {
        let client = RegistryClient::new("http://127.0.0.1:9", None).unwrap();
        assert!(matches!(client.fetch("bogus"), Err(SourceError::InvalidIdentifier(_))));
    }

    #[test]
    fn unreachable_registry_is_request_error() {
        let client = RegistryClient::new("http://127.0.0.1:9", Some(Duration::from_secs(2))).unwrap();
        assert!(matches!(client.fetch("NCT04000001"), Err(SourceError::Request(_))));
    }
}
