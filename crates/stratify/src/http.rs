//! HTTP client for the stratification service.

use async_trait::async_trait;

use crate::stratifier::{StratifyError, StratifyOutcome, StratifyRequest, Stratifier};

/// Configuration for the stratification service.
#[derive(Debug, Clone)]
pub struct StratifyConfig {
    pub base_url: String,
}

impl StratifyConfig {
    /// | Env Var             | Default                  |
    /// |---------------------|--------------------------|
    /// | `STRATIFY_BASE_URL` | `http://localhost:8091`  |
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("STRATIFY_BASE_URL").unwrap_or_else(|_| "http://localhost:8091".into());
        Self { base_url }
    }
}

/// Calls the stratification service's single endpoint.
#[derive(Debug, Clone)]
pub struct StratifyClient {
    http: reqwest::Client,
    config: StratifyConfig,
}

impl StratifyClient {
    pub fn new(config: StratifyConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Stratifier for StratifyClient {
    async fn stratify(&self, request: &StratifyRequest) -> Result<StratifyOutcome, StratifyError> {
        let url = format!("{}/v1/stratify", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| StratifyError::Connectivity(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(StratifyError::BadRequest(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StratifyError::Connectivity(format!(
                "Algorithm service returned {status}: {body}"
            )));
        }

        let outcome: StratifyOutcome = response
            .json()
            .await
            .map_err(|e| StratifyError::Connectivity(format!("Malformed algorithm response: {e}")))?;

        tracing::debug!(
            feasible = outcome.feasible,
            panels = outcome.panels.len(),
            "Stratification response received",
        );
        Ok(outcome)
    }
}
