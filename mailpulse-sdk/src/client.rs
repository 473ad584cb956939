//! Paginating HTTP client for the Mailgun Events API.
//!
//! Mailgun returns time-windowed event pages chained by opaque
//! `paging.next` URLs. [`EventsClient::list_events`] follows the chain
//! within one call and returns the aggregated records, so callers never
//! see a partial window.

use reqwest::{Client, StatusCode};
use url::Url;

use crate::objects::events::{EventRecord, EventsPage};

/// Default API root (US region). The EU region uses
/// `https://api.eu.mailgun.net`.
pub const DEFAULT_API_BASE: &str = "https://api.mailgun.net";

/// Basic-auth username; Mailgun authenticates every request as `api:{key}`.
const AUTH_USER: &str = "api";

/// Errors produced by the events client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the events path, or a
    /// `paging.next` URL was malformed.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Typed HTTP client for the Mailgun **Events API**.
#[derive(Debug, Clone)]
pub struct EventsClient {
    http: Client,
    base_url: Url,
    domain: String,
    api_key: String,
}

impl EventsClient {
    /// Create a new `EventsClient`.
    ///
    /// * `base_url` – API root, usually [`DEFAULT_API_BASE`].
    /// * `domain` – the sending domain whose event log is queried.
    /// * `api_key` – the account's private API key.
    pub fn new(base_url: Url, domain: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            domain: domain.into(),
            api_key: api_key.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET /v3/{domain}/events` – fetch every event in `[begin, end]`
    /// (epoch seconds), oldest first.
    ///
    /// Pages through the listing at `limit` records per page and returns
    /// all records. The provider attaches a `next` URL to every page, so
    /// the loop terminates on the first short or empty page rather than
    /// on a missing cursor.
    pub async fn list_events(
        &self,
        begin_epoch: i64,
        end_epoch: i64,
        limit: u32,
    ) -> Result<Vec<EventRecord>, ClientError> {
        let first_url = self.base_url.join(&format!("/v3/{}/events", self.domain))?;
        let mut page = self
            .fetch_first_page(first_url, begin_epoch, end_epoch, limit)
            .await?;

        let mut records = Vec::new();
        loop {
            if page.items.is_empty() {
                break;
            }
            let short_page = (page.items.len() as u64) < u64::from(limit);
            records.extend(page.items);
            if short_page {
                break;
            }

            let Some(next) = page.paging.next else { break };
            page = self.fetch_page(Url::parse(&next)?).await?;
        }

        Ok(records)
    }

    async fn fetch_first_page(
        &self,
        url: Url,
        begin_epoch: i64,
        end_epoch: i64,
        limit: u32,
    ) -> Result<EventsPage, ClientError> {
        let resp = self
            .http
            .get(url)
            .basic_auth(AUTH_USER, Some(&self.api_key))
            .query(&[
                ("begin", begin_epoch.to_string()),
                ("end", end_epoch.to_string()),
                ("limit", limit.to_string()),
                ("ascending", "yes".to_string()),
            ])
            .send()
            .await?;
        parse_response(resp).await
    }

    async fn fetch_page(&self, url: Url) -> Result<EventsPage, ClientError> {
        let resp = self
            .http
            .get(url)
            .basic_auth(AUTH_USER, Some(&self.api_key))
            .send()
            .await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
