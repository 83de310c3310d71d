//! HTTP client for the spreadsheet service.
//!
//! [`SheetsClient`] holds the connection configuration for the spreadsheet
//! gateway (base URL plus the service identity it authenticates as) and
//! exposes the small set of grid operations the adapter needs.

use serde::Deserialize;

use crate::error::SheetsError;

/// Configuration for the spreadsheet gateway, loaded from environment
/// variables by the binaries.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    /// Base HTTP URL of the spreadsheet gateway.
    pub base_url: String,
    /// Bearer token the gateway authenticates requests with.
    pub api_token: String,
}

impl SheetsConfig {
    /// | Env Var            | Default                  |
    /// |--------------------|--------------------------|
    /// | `SHEETS_BASE_URL`  | `http://localhost:8090`  |
    /// | `SHEETS_API_TOKEN` | *(required)*             |
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("SHEETS_BASE_URL").unwrap_or_else(|_| "http://localhost:8090".into());
        let api_token = std::env::var("SHEETS_API_TOKEN").expect("SHEETS_API_TOKEN must be set");
        Self { base_url, api_token }
    }
}

/// Thin HTTP wrapper over the spreadsheet gateway.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    config: SheetsConfig,
}

#[derive(Debug, Deserialize)]
struct GridResponse {
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TabsResponse {
    tabs: Vec<String>,
}

impl SheetsClient {
    pub fn new(config: SheetsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Read a whole tab as a grid of trimmed cell strings.
    pub async fn read_grid(
        &self,
        spreadsheet_id: &str,
        tab: &str,
    ) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = format!(
            "{}/v1/spreadsheets/{spreadsheet_id}/tabs/{tab}/values",
            self.config.base_url
        );
        let response = self.send(self.http.get(&url)).await?;
        let grid: GridResponse = response
            .json()
            .await
            .map_err(|e| SheetsError::Connectivity(format!("Malformed grid response: {e}")))?;
        Ok(grid.rows)
    }

    /// Create a tab (replacing any existing tab of the same name) and write
    /// a grid into it.
    pub async fn write_grid(
        &self,
        spreadsheet_id: &str,
        tab: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SheetsError> {
        let url = format!(
            "{}/v1/spreadsheets/{spreadsheet_id}/tabs/{tab}/values",
            self.config.base_url
        );
        self.send(self.http.put(&url).json(&serde_json::json!({ "rows": rows })))
            .await?;
        Ok(())
    }

    /// All tab names in the spreadsheet.
    pub async fn list_tabs(&self, spreadsheet_id: &str) -> Result<Vec<String>, SheetsError> {
        let url = format!("{}/v1/spreadsheets/{spreadsheet_id}/tabs", self.config.base_url);
        let response = self.send(self.http.get(&url)).await?;
        let tabs: TabsResponse = response
            .json()
            .await
            .map_err(|e| SheetsError::Connectivity(format!("Malformed tabs response: {e}")))?;
        Ok(tabs.tabs)
    }

    /// Delete one tab.
    pub async fn delete_tab(&self, spreadsheet_id: &str, tab: &str) -> Result<(), SheetsError> {
        let url = format!(
            "{}/v1/spreadsheets/{spreadsheet_id}/tabs/{tab}",
            self.config.base_url
        );
        self.send(self.http.delete(&url)).await?;
        Ok(())
    }

    /// Issue a request and map transport-level failures onto [`SheetsError`].
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SheetsError> {
        let response = request
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .map_err(|e| SheetsError::Connectivity(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::UNAUTHORIZED => {
                // Some gateways deny with an empty body; keep the detail
                // optional so the executor can substitute a useful message.
                let detail = response.text().await.ok().filter(|t| !t.trim().is_empty());
                Err(SheetsError::PermissionDenied { detail })
            }
            reqwest::StatusCode::NOT_FOUND => {
                Err(SheetsError::TabNotFound("requested tab or spreadsheet".into()))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SheetsError::Connectivity(format!(
                    "Spreadsheet service returned {status}: {body}"
                )))
            }
        }
    }
}
