//! Homepage fetcher: one bounded-timeout request per URL, never raises.
//!
//! Every failure mode (bad URL, transport error, non-success status, empty
//! body, page without visible text) is reported as [`FetchOutcome::Failed`]
//! so the pipeline can downgrade the record and move on.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use prospector_shared::{FetchConfig, ProspectorError, Result, UNRESOLVED_MARKER};

use crate::extract::page_text;

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// Why a homepage could not be turned into text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("empty response body")]
    EmptyBody,

    #[error("no visible text on page")]
    NoText,
}

/// Result of a single fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Cleaned, non-empty page text.
    Content(String),
    /// The page could not be used.
    Failed(FetchFailure),
}

impl FetchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The page text, if the fetch succeeded.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Content(text) => Some(text),
            Self::Failed(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Turns a URL into cleaned page text.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch `url` once. Implementations must not retry and must not panic on
    /// network or content errors.
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

/// Fetch every URL in order, one at a time.
pub async fn scrape_all(
    fetcher: &dyn ContentFetcher,
    urls: &[String],
) -> Vec<(String, FetchOutcome)> {
    let mut results = Vec::with_capacity(urls.len());
    for url in urls {
        let outcome = fetcher.fetch(url).await;
        results.push((url.clone(), outcome));
    }
    results
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// [`ContentFetcher`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with the configured timeout and user agent.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProspectorError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn try_fetch(&self, raw_url: &str) -> std::result::Result<String, FetchFailure> {
        let url = normalize_url(raw_url)?;
        debug!(%url, "fetching homepage");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| FetchFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchFailure::Transport(format!("body read failed: {e}")))?;

        if body.trim().is_empty() {
            return Err(FetchFailure::EmptyBody);
        }

        // A page reading only the unresolved marker would reload as a failure.
        let text = page_text(&body);
        if text.is_empty() || text == UNRESOLVED_MARKER {
            return Err(FetchFailure::NoText);
        }
        Ok(text)
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> FetchOutcome {
        match self.try_fetch(url).await {
            Ok(text) => {
                info!(url, chars = text.chars().count(), "scrape complete");
                FetchOutcome::Content(text)
            }
            Err(failure) => {
                warn!(url, reason = %failure, "scrape failed");
                FetchOutcome::Failed(failure)
            }
        }
    }
}

/// Parse a spreadsheet-style website cell into an http(s) URL.
///
/// Bare hosts such as `acme.com` or `www.acme.com/about` get `https://`.
pub fn normalize_url(raw: &str) -> std::result::Result<Url, FetchFailure> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FetchFailure::InvalidUrl("empty URL".into()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|e| FetchFailure::InvalidUrl(format!("{raw}: {e}")))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Ok(url),
        _ => Err(FetchFailure::InvalidUrl(format!(
            "{raw}: only http(s) URLs with a host are fetched"
        ))),
    }
}
