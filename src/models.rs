//! Data models for articles, feed sources and run reports.
//!
//! This module defines the core data structures shared by every stage:
//! - [`Article`]: one normalized news item
//! - [`ArticleCollection`]: the persisted snapshot read by the frontend
//! - [`FeedSource`]: static configuration for one syndication endpoint
//! - [`FeedStatus`]: transient per-fetch outcome, reported but never persisted
//! - [`RunStats`] / [`RunReport`]: what a pipeline run tells its caller
//!
//! The JSON field names are camelCase to match the snapshot format the static
//! frontend already consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single news article.
///
/// Identity for deduplication is the URL with query string and fragment
/// removed (see [`crate::merge::normalize_url`]).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Headline, trimmed and never empty.
    pub title: String,
    /// Absolute article URL.
    pub url: String,
    /// Publisher or feed name.
    pub source: String,
    /// Publication time in UTC.
    pub published_at: DateTime<Utc>,
    /// Representative image, only ever set by the Google News normalizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// When this process picked the article up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// The persisted artifact: every article the frontend can show.
///
/// Articles are kept sorted newest first and capped by
/// `Settings::max_total_articles`. The whole collection is replaced on
/// every write.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleCollection {
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub articles: Vec<Article>,
}

impl ArticleCollection {
    /// An empty collection stamped with the current time (cold start).
    pub fn empty() -> Self {
        Self {
            last_updated: Utc::now(),
            articles: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

impl Default for ArticleCollection {
    fn default() -> Self {
        Self::empty()
    }
}

/// One configured syndication endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedSource {
    /// Display name, copied into every article from this feed.
    pub name: String,
    /// Feed URL (RSS 2.0, RSS 1.0/RDF or Atom).
    pub url: String,
    /// Free-form grouping such as `politics` or `regional`.
    #[serde(default)]
    pub category: String,
}

impl FeedSource {
    pub fn new(name: &str, url: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            category: category.to_string(),
        }
    }
}

/// Outcome of fetching one source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatus {
    pub name: String,
    pub url: String,
    pub success: bool,
    pub article_count: usize,
    /// Entries dropped by the normalizer (missing title or link, bad URL).
    #[serde(default)]
    pub skipped: usize,
    /// Articles whose publish date fell back to "now".
    #[serde(default)]
    pub defaulted_dates: usize,
    /// Human-readable failure classification, `None` on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FeedStatus {
    pub fn ok(source: &FeedSource, article_count: usize) -> Self {
        Self {
            name: source.name.clone(),
            url: source.url.clone(),
            success: true,
            article_count,
            skipped: 0,
            defaulted_dates: 0,
            error: None,
        }
    }

    pub fn failed(source: &FeedSource, error: impl Into<String>) -> Self {
        Self {
            name: source.name.clone(),
            url: source.url.clone(),
            success: false,
            article_count: 0,
            skipped: 0,
            defaulted_dates: 0,
            error: Some(error.into()),
        }
    }
}

/// Aggregate numbers for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RunStats {
    pub total_fetched: usize,
    /// Articles leaving the filter, dedupe and cap stages.
    pub filtered_count: usize,
    pub successful_feeds: usize,
    pub failed_feeds: usize,
    pub skipped_entries: usize,
    pub defaulted_dates: usize,
    pub existing_articles: usize,
    pub new_articles: usize,
    pub pruned_articles: usize,
    pub merged_total: usize,
    pub duration_seconds: f64,
}

/// Result of writing the snapshot to the primary store and the export mirrors.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PersistReport {
    pub uploaded: bool,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub export_errors: Vec<String>,
}

/// Everything a caller learns from one refresh.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunReport {
    pub stats: RunStats,
    pub feed_statuses: Vec<FeedStatus>,
    pub persist: PersistReport,
}
