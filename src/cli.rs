//! Command-line interface definitions for Territory News.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Store and export options can be provided via flags or environment variables.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Command-line arguments for the Territory News application.
///
/// # Examples
///
/// ```sh
/// # Fetch feeds into data/articles.json and mirror to the frontend
/// territory_news fetch --export frontend/data/articles.json
///
/// # Serve the API from a remote bucket
/// territory_news --store-url https://bucket.example.com serve
///
/// # Scheduled run with an event payload
/// territory_news job --event '{"source":"aws.events"}'
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Local snapshot file, used when no store URL is given
    #[arg(long, env = "NEWS_DATA_FILE", default_value = "data/articles.json", global = true)]
    pub data_file: PathBuf,

    /// Base URL of an HTTP object store (GET/PUT `<url>/<key>`)
    #[arg(long, env = "NEWS_STORE_URL", global = true)]
    pub store_url: Option<String>,

    /// Object key of the snapshot in the HTTP store
    #[arg(long, env = "NEWS_STORE_KEY", default_value = "data/articles.json", global = true)]
    pub store_key: String,

    /// Bearer token for the HTTP store
    #[arg(long, env = "NEWS_STORE_TOKEN", hide_env_values = true, global = true)]
    pub store_token: Option<String>,

    /// Extra path to mirror the snapshot to (repeatable)
    #[arg(long = "export", global = true)]
    pub exports: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Fetch the configured RSS feeds, merge and persist
    Fetch,
    /// Search Google News for keywords, merge and persist
    Search {
        /// Keyword to search for (repeatable); defaults to the configured list
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,
    },
    /// Serve the query API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run once as a scheduled job and print a status-coded JSON response
    Job {
        /// Triggering event as JSON
        #[arg(long)]
        event: Option<String>,
    },
}

/// Where the snapshot lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File { root: PathBuf, key: String },
    Http { base_url: String, key: String, token: Option<String> },
}

impl StoreLocation {
    pub fn key(&self) -> &str {
        match self {
            StoreLocation::File { key, .. } | StoreLocation::Http { key, .. } => key,
        }
    }
}

impl Cli {
    /// A store URL wins over the data file.
    pub fn store_location(&self) -> StoreLocation {
        match &self.store_url {
            Some(base_url) if !base_url.trim().is_empty() => StoreLocation::Http {
                base_url: base_url.trim().to_string(),
                key: self.store_key.clone(),
                token: self.store_token.clone(),
            },
            _ => {
                let root = self
                    .data_file
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or(Path::new("."))
                    .to_path_buf();
                let key = self
                    .data_file
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "articles.json".to_string());
                StoreLocation::File { root, key }
            }
        }
    }
}
