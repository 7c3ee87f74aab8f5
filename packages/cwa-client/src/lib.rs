//! Pure Calibre-Web-Automated book downloader REST API client.
//!
//! A minimal client for the downloader's JSON API. Supports logging in,
//! searching the catalogue by free text, and queueing a download.
//!
//! A client keeps its own cookie jar, so one instance is one session: log in
//! once and every later call carries the session cookie.
//!
//! # Example
//!
//! ```rust,ignore
//! use cwa_client::CwaClient;
//!
//! let client = CwaClient::new("http://localhost:8084")?;
//! client.login("reader", "secret").await?;
//!
//! if let Some(book) = client.search("Dune").await?.top() {
//!     client.enqueue(&book.id, 10).await?;
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{CwaError, Result};
pub use types::{LoginRequest, QueueAck, SearchOutcome, SearchResult};

use std::time::Duration;

use serde_json::Value;

/// Browser user-agent sent on every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";

/// Per-request timeouts, covering connect and read together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub login: Duration,
    pub search: Duration,
    pub enqueue: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            login: Duration::from_secs(10),
            search: Duration::from_secs(30),
            enqueue: Duration::from_secs(10),
        }
    }
}

pub struct CwaClient {
    client: reqwest::Client,
    base_url: String,
    timeouts: Timeouts,
}

impl CwaClient {
    /// Build an unauthenticated session against `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeouts: Timeouts::default(),
        })
    }

    /// Override the default per-request timeouts.
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Log in with username and password. The session cookie is kept for later calls.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let url = format!("{}/api/auth/login", self.base_url);
        tracing::debug!(%url, username, "Logging in to book downloader");

        let resp = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .timeout(self.timeouts.login)
            .send()
            .await?;

        check_status(resp).await?;
        Ok(())
    }

    /// Search the catalogue. Candidates keep the service's ranking order.
    pub async fn search(&self, query: &str) -> Result<SearchOutcome> {
        let url = format!("{}/api/search", self.base_url);
        tracing::debug!(%url, query, "Searching book downloader");

        let resp = self
            .client
            .get(&url)
            .query(&[("query", query)])
            .timeout(self.timeouts.search)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| CwaError::UnexpectedResponse(format!("search body is not JSON: {}", e)))?;

        interpret_search(body)
    }

    /// Queue a download for a search result id.
    pub async fn enqueue(&self, book_id: &str, priority: u32) -> Result<QueueAck> {
        let url = format!("{}/api/download", self.base_url);
        tracing::debug!(%url, book_id, priority, "Queueing download");

        let priority = priority.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[("id", book_id), ("priority", priority.as_str())])
            .timeout(self.timeouts.enqueue)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let body = resp.text().await.unwrap_or_default();
        let status = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("status").and_then(Value::as_str).map(str::to_string));

        Ok(QueueAck { status })
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(CwaError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(resp)
}

fn interpret_search(body: Value) -> Result<SearchOutcome> {
    match body {
        Value::Null => Ok(SearchOutcome::NoMatch { reason: None }),
        Value::Array(items) if items.is_empty() => Ok(SearchOutcome::NoMatch { reason: None }),
        Value::Array(items) => {
            let mut items = items.into_iter();
            let Some(first) = items.next() else {
                return Ok(SearchOutcome::NoMatch { reason: None });
            };

            // Only the first candidate gets queued; later malformed entries are dropped.
            let first: SearchResult = serde_json::from_value(first)
                .map_err(|e| CwaError::UnexpectedResponse(format!("malformed search result: {}", e)))?;
            let mut results = vec![first];
            results.extend(items.filter_map(|v| serde_json::from_value(v).ok()));

            Ok(SearchOutcome::Matches(results))
        }
        Value::Object(map) if map.is_empty() => Ok(SearchOutcome::NoMatch { reason: None }),
        Value::Object(map) => match map.get("error") {
            Some(Value::String(reason)) => Ok(SearchOutcome::NoMatch {
                reason: Some(reason.clone()),
            }),
            Some(other) => Ok(SearchOutcome::NoMatch {
                reason: Some(other.to_string()),
            }),
            None => Err(CwaError::UnexpectedResponse(
                "search returned an object without results".to_string(),
            )),
        },
        other => Err(CwaError::UnexpectedResponse(format!(
            "search returned {}",
            other
        ))),
    }
}
