//! Feed fetching and parsing
//!
//! A [`SourceFetcher`] turns a [`Source`] into the calendar entries its feed
//! currently publishes. The HTTP implementation downloads iCalendar feeds;
//! tests substitute canned fetchers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evcal_common::db::Source;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub mod ics;

/// One calendar entry read from a feed, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    pub uid: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ParsedEvent {
    /// Entries still running or yet to start at `now`
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.end_time.unwrap_or(self.start_time) >= now
    }
}

/// The fetch failures the import workflow reports to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    AuthenticationRequired,
    RemoteHttp,
    HostUnreachable,
    DnsFailure,
}

/// Fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// Remote answered 401
    #[error("Source requires authentication")]
    AuthenticationRequired,

    /// Remote answered with a non-success status
    #[error("Remote returned HTTP {0}")]
    RemoteHttp(u16),

    /// Connection refused, reset or timed out
    #[error("Host unreachable: {0}")]
    HostUnreachable(String),

    /// Hostname did not resolve
    #[error("DNS resolution failed: {0}")]
    DnsFailure(String),

    /// Anything else, including unparseable feeds
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FetchError {
    /// `None` for failures outside the fixed set
    pub fn kind(&self) -> Option<FetchErrorKind> {
        match self {
            FetchError::AuthenticationRequired => Some(FetchErrorKind::AuthenticationRequired),
            FetchError::RemoteHttp(_) => Some(FetchErrorKind::RemoteHttp),
            FetchError::HostUnreachable(_) => Some(FetchErrorKind::HostUnreachable),
            FetchError::DnsFailure(_) => Some(FetchErrorKind::DnsFailure),
            FetchError::Other(_) => None,
        }
    }
}

/// Fetches and parses the feed behind a source
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &Source) -> Result<Vec<ParsedEvent>, FetchError>;
}

/// Downloads iCalendar feeds over HTTP(S)
pub struct HttpSourceFetcher {
    http_client: reqwest::Client,
}

impl HttpSourceFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<ParsedEvent>, FetchError> {
        let url = fetchable_url(&source.url);
        debug!(source_id = source.id, url = %url, "Fetching source feed");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FetchError::AuthenticationRequired);
        }
        if !status.is_success() {
            return Err(FetchError::RemoteHttp(status.as_u16()));
        }

        let body = read_body(response, MAX_FEED_BYTES).await?;
        let entries = ics::parse_feed(&body)?;

        info!(
            source_id = source.id,
            count = entries.len(),
            "Parsed source feed"
        );
        Ok(entries)
    }
}

/// Feeds larger than this are refused
pub const MAX_FEED_BYTES: usize = 10 * 1024 * 1024;

/// Read the response body, giving up once it exceeds `limit` bytes
async fn read_body(mut response: reqwest::Response, limit: usize) -> Result<String, FetchError> {
    if let Some(length) = response.content_length() {
        if length > limit as u64 {
            return Err(oversize(limit));
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(classify_transport_error)? {
        append_limited(&mut body, &chunk, limit)?;
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}

fn append_limited(body: &mut Vec<u8>, chunk: &[u8], limit: usize) -> Result<(), FetchError> {
    if body.len() + chunk.len() > limit {
        return Err(oversize(limit));
    }
    body.extend_from_slice(chunk);
    Ok(())
}

fn oversize(limit: usize) -> FetchError {
    FetchError::Other(anyhow::anyhow!("Feed is larger than {} bytes", limit))
}

/// `webcal://` is iCalendar over plain HTTP
pub fn fetchable_url(url: &str) -> String {
    let trimmed = url.trim();
    match trimmed.get(..9) {
        Some(scheme) if scheme.eq_ignore_ascii_case("webcal://") => {
            format!("http://{}", &trimmed[9..])
        }
        _ => trimmed.to_string(),
    }
}

fn classify_transport_error(err: reqwest::Error) -> FetchError {
    if is_dns_failure(&err) {
        FetchError::DnsFailure(err.to_string())
    } else if err.is_connect() || err.is_timeout() {
        FetchError::HostUnreachable(err.to_string())
    } else {
        FetchError::Other(err.into())
    }
}

/// hyper reports resolver failures only through the error chain text
fn is_dns_failure(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        let message = e.to_string();
        if message.contains("dns error") || message.contains("failed to lookup address") {
            return true;
        }
        current = e.source();
    }
    false
}
