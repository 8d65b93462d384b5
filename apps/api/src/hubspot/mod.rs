//! HubSpot client — the single point of entry for all HubSpot CMS API calls.
//!
//! ARCHITECTURAL RULE: no other module may call the HubSpot API directly.
//! Engines depend on the [`ContentApi`] trait, carried in `AppState` as an
//! `Arc<dyn ContentApi>`, so they can be tested against a mock.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::content::ContentType;

const HUBSPOT_BASE_URL: &str = "https://api.hubapi.com";
const REQUEST_TIMEOUT_SECS: u64 = 15;
const PAGE_LIMIT: u32 = 100;
const MAX_RETRIES: u32 = 3;

pub type JsonMap = Map<String, Value>;

#[derive(Debug, Error)]
pub enum HubSpotError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response shape: {0}")]
    Shape(String),
}

impl HubSpotError {
    /// The message to surface per record: the parsed vendor message for API
    /// errors, the full error text for transport and shape failures.
    pub fn vendor_message(&self) -> String {
        match self {
            HubSpotError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Publish actions live on a dedicated endpoint, separate from field PATCHes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishAction {
    PushLive,
    Unpublish,
}

impl PublishAction {
    pub fn as_str(self) -> &'static str {
        match self {
            PublishAction::PushLive => "push-live",
            PublishAction::Unpublish => "unpublish",
        }
    }
}

/// One page of a cursor-paginated listing.
#[derive(Debug)]
pub struct ListingPage {
    pub results: Vec<JsonMap>,
    pub next_after: Option<String>,
}

/// The seam the export, discovery, and sync-back engines depend on.
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Fetches every record of a content type, following the `after` cursor
    /// to completion. Pages are sequential: each cursor depends on the
    /// previous response.
    async fn fetch_all(&self, content_type: ContentType) -> Result<Vec<JsonMap>, HubSpotError>;

    /// Fetches a single live record for runtime type discovery.
    async fn fetch_sample(
        &self,
        content_type: ContentType,
    ) -> Result<Option<JsonMap>, HubSpotError>;

    /// PATCHes only the given fields to the record's endpoint. The body must
    /// never contain `id`.
    async fn patch_record(
        &self,
        content_type: ContentType,
        id: &str,
        body: &Value,
    ) -> Result<(), HubSpotError>;

    /// Sends a push-live/unpublish action for a record.
    async fn publish_action(
        &self,
        content_type: ContentType,
        id: &str,
        action: PublishAction,
    ) -> Result<(), HubSpotError>;
}

#[derive(Clone)]
pub struct HubSpotClient {
    client: Client,
    token: String,
    base_url: String,
}

impl HubSpotClient {
    pub fn new(token: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            token,
            base_url: HUBSPOT_BASE_URL.to_string(),
        }
    }

    /// Sends one request, retrying on 429 and 5xx with linear backoff.
    /// Other non-2xx statuses return immediately with the parsed vendor
    /// message.
    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, HubSpotError> {
        let mut last_error: Option<HubSpotError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = std::time::Duration::from_millis(500 * attempt as u64);
                warn!(
                    "HubSpot request attempt {} failed, retrying after {}ms",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match build().bearer_auth(&self.token).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(HubSpotError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(HubSpotError::Api {
                    status: status.as_u16(),
                    message: parse_error_body(&body, status.as_u16()),
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(HubSpotError::Api {
                    status: status.as_u16(),
                    message: parse_error_body(&body, status.as_u16()),
                });
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or(HubSpotError::Api {
            status: 429,
            message: format!("Rate limited after {MAX_RETRIES} retries"),
        }))
    }

    async fn fetch_page(
        &self,
        content_type: ContentType,
        after: Option<&str>,
    ) -> Result<ListingPage, HubSpotError> {
        let url = format!(
            "{}/{}",
            self.base_url,
            content_type.capabilities().endpoint_path
        );
        let after = after.map(str::to_string);
        let response = self
            .send_with_retry(|| {
                let mut req = self
                    .client
                    .get(&url)
                    .query(&[("limit", PAGE_LIMIT.to_string())]);
                if let Some(cursor) = &after {
                    req = req.query(&[("after", cursor.clone())]);
                }
                req
            })
            .await?;

        let body: Value = response.json().await?;
        let results = body
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| HubSpotError::Shape("listing response missing 'results'".into()))?
            .iter()
            .filter_map(|v| v.as_object().cloned())
            .collect();

        // v3 listings paginate via paging.next.after; some legacy surfaces
        // only return paging.next.link with the cursor embedded.
        let next_after = body
            .pointer("/paging/next/after")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                body.pointer("/paging/next/link")
                    .and_then(Value::as_str)
                    .and_then(cursor_from_link)
            });

        Ok(ListingPage {
            results,
            next_after,
        })
    }
}

#[async_trait]
impl ContentApi for HubSpotClient {
    async fn fetch_all(&self, content_type: ContentType) -> Result<Vec<JsonMap>, HubSpotError> {
        let mut all = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let page = self.fetch_page(content_type, after.as_deref()).await?;
            all.extend(page.results);
            match page.next_after {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }
        debug!("Fetched {} {} records", all.len(), content_type);
        Ok(all)
    }

    async fn fetch_sample(
        &self,
        content_type: ContentType,
    ) -> Result<Option<JsonMap>, HubSpotError> {
        let page = self.fetch_page(content_type, None).await?;
        Ok(page.results.into_iter().next())
    }

    async fn patch_record(
        &self,
        content_type: ContentType,
        id: &str,
        body: &Value,
    ) -> Result<(), HubSpotError> {
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            content_type.capabilities().endpoint_path,
            id
        );
        self.send_with_retry(|| self.client.patch(&url).json(body))
            .await?;
        Ok(())
    }

    async fn publish_action(
        &self,
        content_type: ContentType,
        id: &str,
        action: PublishAction,
    ) -> Result<(), HubSpotError> {
        let url = format!(
            "{}/{}/{}/{}",
            self.base_url,
            content_type.capabilities().endpoint_path,
            id,
            action.as_str()
        );
        self.send_with_retry(|| self.client.post(&url)).await?;
        Ok(())
    }
}

/// Extracts a human-readable message from a HubSpot error body.
/// Preference order: `message`, then `error`, then joined `errors[].message`,
/// then the HTTP status as a last resort.
pub fn parse_error_body(body: &str, status: u16) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = parsed.get("message").and_then(Value::as_str) {
            if !msg.is_empty() {
                return msg.to_string();
            }
        }
        if let Some(msg) = parsed.get("error").and_then(Value::as_str) {
            if !msg.is_empty() {
                return msg.to_string();
            }
        }
        if let Some(errors) = parsed.get("errors").and_then(Value::as_array) {
            let joined: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect();
            if !joined.is_empty() {
                return joined.join("; ");
            }
        }
    }
    format!("HTTP {status}")
}

/// Pulls the `after` cursor out of a `paging.next.link` URL.
fn cursor_from_link(link: &str) -> Option<String> {
    let (_, query) = link.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("after="))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_body_prefers_message() {
        let body = r#"{"message": "Page not found", "error": "ignored"}"#;
        assert_eq!(parse_error_body(body, 404), "Page not found");
    }

    #[test]
    fn test_parse_error_body_falls_back_to_error() {
        let body = r#"{"error": "invalid token"}"#;
        assert_eq!(parse_error_body(body, 401), "invalid token");
    }

    #[test]
    fn test_parse_error_body_joins_errors_array() {
        let body = r#"{"errors": [{"message": "bad slug"}, {"message": "bad title"}]}"#;
        assert_eq!(parse_error_body(body, 400), "bad slug; bad title");
    }

    #[test]
    fn test_parse_error_body_status_fallback() {
        assert_eq!(parse_error_body("<html>oops</html>", 502), "HTTP 502");
        assert_eq!(parse_error_body("{}", 500), "HTTP 500");
    }

    #[test]
    fn test_vendor_message_strips_api_wrapper() {
        let api = HubSpotError::Api {
            status: 400,
            message: "Invalid slug".to_string(),
        };
        assert_eq!(api.vendor_message(), "Invalid slug");

        let shape = HubSpotError::Shape("listing response missing 'results'".to_string());
        assert_eq!(
            shape.vendor_message(),
            "Unexpected response shape: listing response missing 'results'"
        );
    }

    #[test]
    fn test_cursor_from_link() {
        assert_eq!(
            cursor_from_link("https://api.hubapi.com/cms/v3/blogs/posts?limit=100&after=NTI1Cg"),
            Some("NTI1Cg".to_string())
        );
        assert_eq!(cursor_from_link("https://api.hubapi.com/no-query"), None);
    }
}
