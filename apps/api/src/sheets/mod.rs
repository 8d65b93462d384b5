//! Google Sheets client — values read/write/clear plus tab creation.
//! Same rule as the HubSpot module: all Sheets API traffic goes through here,
//! and callers depend on the [`SheetsApi`] trait.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Reads all values from a tab. Rows are returned as they appear; the
    /// first row is the header row by convention.
    async fn get_values(&self, sheet_id: &str, tab_name: &str)
        -> Result<Vec<Vec<String>>, SheetsError>;

    /// Overwrites a tab's values starting at A1.
    async fn update_values(
        &self,
        sheet_id: &str,
        tab_name: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SheetsError>;

    /// Clears all values in a tab.
    async fn clear_values(&self, sheet_id: &str, tab_name: &str) -> Result<(), SheetsError>;

    /// Creates the tab if it does not exist yet.
    async fn ensure_tab(&self, sheet_id: &str, tab_name: &str) -> Result<(), SheetsError>;
}

#[derive(Clone)]
pub struct SheetsClient {
    client: Client,
    token: String,
    base_url: String,
}

impl SheetsClient {
    pub fn new(token: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            token,
            base_url: SHEETS_BASE_URL.to_string(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("HTTP {status}"));
        Err(SheetsError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SheetsApi for SheetsClient {
    async fn get_values(
        &self,
        sheet_id: &str,
        tab_name: &str,
    ) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = format!("{}/{}/values/{}", self.base_url, sheet_id, tab_name);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let body: Value = Self::check(response).await?.json().await?;
        let rows = body
            .get("values")
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| {
                                cells
                                    .iter()
                                    .map(|c| match c {
                                        Value::String(s) => s.clone(),
                                        other => other.to_string(),
                                    })
                                    .collect()
                            })
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn update_values(
        &self,
        sheet_id: &str,
        tab_name: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SheetsError> {
        let url = format!(
            "{}/{}/values/{}!A1?valueInputOption=RAW",
            self.base_url, sheet_id, tab_name
        );
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "values": rows }))
            .send()
            .await?;
        Self::check(response).await?;
        debug!("Wrote {} rows to {tab_name}", rows.len());
        Ok(())
    }

    async fn clear_values(&self, sheet_id: &str, tab_name: &str) -> Result<(), SheetsError> {
        let url = format!(
            "{}/{}/values/{}:clear",
            self.base_url, sheet_id, tab_name
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn ensure_tab(&self, sheet_id: &str, tab_name: &str) -> Result<(), SheetsError> {
        let url = format!("{}/{}:batchUpdate", self.base_url, sheet_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({
                "requests": [{ "addSheet": { "properties": { "title": tab_name } } }]
            }))
            .send()
            .await?;
        match Self::check(response).await {
            Ok(_) => Ok(()),
            // addSheet rejects duplicates; an existing tab is fine.
            Err(SheetsError::Api { status: 400, message }) if message.contains("already exists") => {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
