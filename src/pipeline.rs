//! Orchestrates one collection run.
//!
//! All sources are fetched concurrently on a shared client and awaited
//! together; a source that fails (or whose task panics) becomes a failed
//! status and the rest of the batch carries on. The collected batch then goes
//! through the stages and is merged into the persisted snapshot.

use crate::BoxError;
use crate::config::Settings;
use crate::feeds::{EntryVariant, FeedFetch, fetch_feed};
use crate::merge::{IdentityPolicy, merge, prune_older_than};
use crate::models::{Article, ArticleCollection, FeedSource, FeedStatus, RunReport, RunStats};
use crate::persist::{load_collection, persist};
use crate::search::search_sources;
use crate::stages::{SortOrder, cap, dedupe_exact, filter_by_keywords, sort_articles};
use crate::store::ObjectStore;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Client;
use reqwest::redirect::Policy;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, instrument};

/// Which collection path to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Configured RSS feeds, keyword-filtered, exact-URL deduped.
    Feeds,
    /// Google News keyword search. No keyword filter; the merge also rejects
    /// repeated titles.
    Search,
}

impl Mode {
    pub fn identity_policy(self) -> IdentityPolicy {
        match self {
            Mode::Feeds => IdentityPolicy::UrlOnly,
            Mode::Search => IdentityPolicy::UrlAndTitle,
        }
    }
}

/// Fresh articles from one run, before merging.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub articles: Vec<Article>,
    pub feed_statuses: Vec<FeedStatus>,
    pub stats: RunStats,
}

/// A finished refresh: what was persisted and the report about it.
#[derive(Debug, Clone)]
pub struct Refreshed {
    pub collection: ArticleCollection,
    pub report: RunReport,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    settings: Settings,
    client: Client,
}

impl Pipeline {
    /// Build the shared HTTP client. This is the only fatal failure point.
    pub fn new(settings: Settings) -> Result<Self, BoxError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .redirect(Policy::limited(10))
            .build()?;
        Ok(Self { settings, client })
    }

    pub fn with_client(settings: Settings, client: Client) -> Self {
        Self { settings, client }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetch every source at once and wait for all of them.
    #[instrument(level = "info", skip_all, fields(sources = sources.len()))]
    pub async fn fetch_all(&self, sources: &[FeedSource], variant: EntryVariant, now: DateTime<Utc>) -> Vec<FeedFetch> {
        let timeout = self.settings.fetch_timeout();
        let max_per_source = self.settings.max_articles_per_source;

        let tasks = sources.iter().cloned().map(|source| {
            let client = self.client.clone();
            tokio::spawn(async move { fetch_feed(&client, &source, timeout, max_per_source, variant, now).await })
        });

        join_all(tasks)
            .await
            .into_iter()
            .zip(sources)
            .map(|(joined, source)| match joined {
                Ok(fetch) => fetch,
                Err(e) => {
                    error!(source = %source.name, error = %e, "Fetch task failed");
                    FeedFetch {
                        articles: Vec::new(),
                        status: FeedStatus::failed(source, format!("task failed: {e}")),
                    }
                }
            })
            .collect()
    }

    /// Configured feeds: filter, exact dedupe, sort newest first, cap.
    pub async fn run_feeds(&self, now: DateTime<Utc>) -> Batch {
        let fetches = self.fetch_all(&self.settings.feeds, EntryVariant::Standard, now).await;
        let (articles, mut batch) = gather(fetches);

        let mut articles = dedupe_exact(filter_by_keywords(articles, &self.settings.filter_keywords));
        sort_articles(&mut articles, SortOrder::Desc);
        batch.articles = cap(articles, self.settings.max_total_articles);
        batch.stats.filtered_count = batch.articles.len();
        batch
    }

    /// Google News search for every configured keyword: sort newest first, cap.
    pub async fn run_search(&self, now: DateTime<Utc>) -> Batch {
        let sources = search_sources(
            &self.settings.search_keywords,
            &self.settings.search_language,
            &self.settings.search_region,
        );
        let fetches = self.fetch_all(&sources, EntryVariant::GoogleNews, now).await;
        let (mut articles, mut batch) = gather(fetches);
        sort_articles(&mut articles, SortOrder::Desc);
        batch.articles = cap(articles, self.settings.max_total_articles);
        batch.stats.filtered_count = batch.articles.len();
        batch
    }

    /// Load the snapshot, run `mode`, merge, prune if configured, then save and export.
    #[instrument(level = "info", skip(self, store, exports), fields(location = %store.locate(key)))]
    pub async fn refresh<S: ObjectStore>(&self, mode: Mode, store: &S, key: &str, exports: &[PathBuf]) -> Refreshed {
        let started = Instant::now();
        let now = Utc::now();

        let existing = load_collection(store, key).await;
        let existing_articles = existing.len();

        let batch = match mode {
            Mode::Feeds => self.run_feeds(now).await,
            Mode::Search => self.run_search(now).await,
        };

        let outcome = merge(
            existing,
            batch.articles,
            mode.identity_policy(),
            self.settings.max_total_articles,
            now,
        );
        let mut collection = outcome.collection;
        let pruned_articles = match self.settings.retention_days {
            Some(days) => prune_older_than(&mut collection, days, now),
            None => 0,
        };

        let persist_report = persist(store, key, &collection, exports).await;

        let stats = RunStats {
            existing_articles,
            new_articles: outcome.added,
            pruned_articles,
            merged_total: collection.len(),
            duration_seconds: started.elapsed().as_secs_f64(),
            ..batch.stats
        };
        info!(
            total = stats.total_fetched,
            filtered = stats.filtered_count,
            successful = stats.successful_feeds,
            failed = stats.failed_feeds,
            skipped = stats.skipped_entries,
            defaulted_dates = stats.defaulted_dates,
            added = stats.new_articles,
            merged = stats.merged_total,
            elapsed = %format!("{:.2}s", stats.duration_seconds),
            "Run complete"
        );

        Refreshed {
            collection,
            report: RunReport {
                stats,
                feed_statuses: batch.feed_statuses,
                persist: persist_report,
            },
        }
    }
}

/// Concatenate per-source results in source order and count outcomes.
fn gather(fetches: Vec<FeedFetch>) -> (Vec<Article>, Batch) {
    let mut batch = Batch::default();
    let mut articles = Vec::new();
    for fetch in fetches {
        let status = fetch.status;
        if status.success {
            batch.stats.successful_feeds += 1;
        } else {
            batch.stats.failed_feeds += 1;
        }
        batch.stats.skipped_entries += status.skipped;
        batch.stats.defaulted_dates += status.defaulted_dates;
        articles.extend(fetch.articles);
        batch.feed_statuses.push(status);
    }
    batch.stats.total_fetched = articles.len();
    (articles, batch)
}
