//! One bounded HTTP GET per feed source.
//!
//! [`fetch_feed`] never returns an error: timeouts, HTTP failures and
//! undecodable documents all become a failed [`FeedStatus`] with zero
//! articles, so one broken source cannot abort a run.

use crate::feeds::decode::decode;
use crate::models::{Article, FeedSource, FeedStatus};
use crate::normalize::{normalize_entry, normalize_google_news_entry};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Why a source produced nothing.
///
/// The `Display` text is what ends up in [`FeedStatus::error`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timeout")]
    Timeout,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("Malformed feed: {0}")]
    Malformed(String),
    #[error("{0}")]
    Request(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Request(e.to_string())
        }
    }
}

/// Which normalizer applies to a source's entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryVariant {
    /// Ordinary feed: the source name comes from configuration.
    Standard,
    /// Google News search: publisher split out of the title, image extracted.
    GoogleNews,
}

/// Articles from one source plus its status record.
#[derive(Debug, Clone)]
pub struct FeedFetch {
    pub articles: Vec<Article>,
    pub status: FeedStatus,
}

/// Fetch, decode and normalize one source.
///
/// At most `max_per_source` entries are taken, in document order.
#[instrument(level = "info", skip(client, timeout, now), fields(source = %source.name))]
pub async fn fetch_feed(
    client: &Client,
    source: &FeedSource,
    timeout: Duration,
    max_per_source: usize,
    variant: EntryVariant,
    now: DateTime<Utc>,
) -> FeedFetch {
    match try_fetch(client, source, timeout, max_per_source, variant, now).await {
        Ok(fetch) => {
            info!(
                count = fetch.status.article_count,
                skipped = fetch.status.skipped,
                defaulted_dates = fetch.status.defaulted_dates,
                "Fetched feed"
            );
            fetch
        }
        Err(e) => {
            match e {
                FetchError::Timeout | FetchError::Status(_) => {
                    warn!(error = %e, url = %source.url, "Feed fetch failed")
                }
                FetchError::Malformed(_) | FetchError::Request(_) => {
                    error!(error = %e, url = %source.url, "Feed fetch failed")
                }
            }
            FeedFetch {
                articles: Vec::new(),
                status: FeedStatus::failed(source, e.to_string()),
            }
        }
    }
}

async fn try_fetch(
    client: &Client,
    source: &FeedSource,
    timeout: Duration,
    max_per_source: usize,
    variant: EntryVariant,
    now: DateTime<Utc>,
) -> Result<FeedFetch, FetchError> {
    let body = download(client, &source.url, timeout).await?;
    debug!(bytes = body.len(), "Downloaded feed body");

    let parsed = decode(&body);
    if let Some(reason) = &parsed.malformed {
        if parsed.entries.is_empty() {
            return Err(FetchError::Malformed(reason.clone()));
        }
        warn!(%reason, kept = parsed.entries.len(), "Feed is malformed, keeping entries read before the fault");
    }

    let mut articles = Vec::new();
    let mut skipped = 0;
    let mut defaulted_dates = 0;
    for entry in parsed.entries.iter().take(max_per_source) {
        let normalized = match variant {
            EntryVariant::Standard => normalize_entry(entry, &source.name, now),
            EntryVariant::GoogleNews => normalize_google_news_entry(entry, now),
        };
        match normalized {
            Some(n) => {
                if n.date.is_defaulted() {
                    defaulted_dates += 1;
                }
                articles.push(n.article);
            }
            None => skipped += 1,
        }
    }

    let mut status = FeedStatus::ok(source, articles.len());
    status.skipped = skipped;
    status.defaulted_dates = defaulted_dates;
    Ok(FeedFetch { articles, status })
}

/// GET `url` and return the body; non-2xx is an error.
pub async fn download(client: &Client, url: &str, timeout: Duration) -> Result<String, FetchError> {
    let response = client.get(url).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    Ok(response.text().await?)
}
