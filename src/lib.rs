//! # Territory News
//!
//! Collects news about the Northern Territories from Japanese RSS feeds and
//! Google News, keeps the relevant articles, and publishes them as one JSON
//! snapshot for a static frontend.
//!
//! ## Architecture
//!
//! Every run is the same pipeline:
//! 1. **Fetching**: one bounded GET per source, all sources concurrently ([`feeds`])
//! 2. **Normalizing**: raw entries become [`models::Article`]s ([`normalize`], [`dates`])
//! 3. **Stages**: keyword filter, exact dedupe, sort, cap ([`stages`])
//! 4. **Merging**: append unseen articles to the stored snapshot ([`merge`])
//! 5. **Persisting**: write the snapshot and its export mirrors ([`persist`], [`store`])
//!
//! [`pipeline::Pipeline`] drives the run. Three adapters sit on top: the CLI
//! commands in the binary, the HTTP API in [`server`], and the scheduled
//! handler in [`job`].

pub mod config;
pub mod dates;
pub mod feeds;
pub mod job;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod persist;
pub mod pipeline;
pub mod search;
pub mod server;
pub mod stages;
pub mod store;
pub mod utils;

/// Error type for everything that is not a typed seam.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use config::Settings;
pub use models::{Article, ArticleCollection, FeedSource, FeedStatus, RunReport, RunStats};
pub use pipeline::{Mode, Pipeline};
