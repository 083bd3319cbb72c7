//! # Territory News
//!
//! Command-line entry point. Sets up tracing, resolves settings, opens the
//! snapshot store and dispatches to one of the adapters:
//!
//! - `fetch`: configured RSS feeds, merged into the snapshot
//! - `search`: Google News keyword search, merged with title identity
//! - `serve`: the query API
//! - `job`: one scheduled run, printed as a status-coded JSON response
//!
//! ## Usage
//!
//! ```sh
//! territory_news fetch --export frontend/data/articles.json
//! territory_news serve --port 8000
//! ```

use clap::Parser;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use territory_news::job::{self, JobResponse};
use territory_news::models::{Article, RunReport};
use territory_news::server::{self, AppState};
use territory_news::store::{FileStore, HttpStore, Store};
use territory_news::{BoxError, Mode, Pipeline, Settings};
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::{Cli, Command, StoreLocation};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("territory_news starting up");

    let args = Cli::parse();
    debug!(?args.command, ?args.config, "Parsed CLI arguments");

    let mut settings = Settings::load(args.config.as_deref())?;
    match &args.command {
        Command::Search { keywords } if !keywords.is_empty() => settings.search_keywords = keywords.clone(),
        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.host = host.clone();
            }
            if let Some(port) = port {
                settings.port = *port;
            }
        }
        _ => {}
    }

    let location = args.store_location();
    let key = location.key().to_string();
    let pipeline = Pipeline::new(settings);

    match args.command {
        Command::Fetch => {
            let pipeline = pipeline?;
            let store = open_store(&location, pipeline.client());
            let refreshed = pipeline.refresh(Mode::Feeds, &store, &key, &args.exports).await;
            print_summary(&refreshed.report, &refreshed.collection.articles);
        }
        Command::Search { .. } => {
            let pipeline = pipeline?;
            let store = open_store(&location, pipeline.client());
            let refreshed = pipeline.refresh(Mode::Search, &store, &key, &args.exports).await;
            print_summary(&refreshed.report, &refreshed.collection.articles);
        }
        Command::Serve { .. } => {
            let pipeline = pipeline?;
            let store = open_store(&location, pipeline.client());
            let state = AppState::load(pipeline, store, key, args.exports).await;
            server::serve(Arc::new(state)).await?;
        }
        Command::Job { event } => {
            let event = parse_event(event.as_deref());
            let response = match pipeline {
                Ok(pipeline) => {
                    let store = open_store(&location, pipeline.client());
                    job::run(&event, &pipeline, &store, &key, &args.exports).await
                }
                Err(e) => JobResponse::failure(&e),
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(client))]
fn open_store(location: &StoreLocation, client: &Client) -> Store {
    match location {
        StoreLocation::File { root, .. } => Store::File(FileStore::new(root)),
        StoreLocation::Http { base_url, token, .. } => Store::Http(HttpStore::new(client.clone(), base_url, token.clone())),
    }
}

/// Events are JSON; anything else is kept as a plain string.
fn parse_event(raw: Option<&str>) -> Value {
    match raw {
        None => Value::Object(Default::default()),
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
            warn!(error = %e, "Event is not JSON; passing it through as text");
            Value::String(raw.to_string())
        }),
    }
}

fn print_summary(report: &RunReport, articles: &[Article]) {
    for status in &report.feed_statuses {
        match &status.error {
            None => println!("OK      {} ({}) {} articles", status.name, status.url, status.article_count),
            Some(error) => println!("FAILED  {} ({}) {}", status.name, status.url, error),
        }
    }

    let stats = &report.stats;
    println!();
    println!("=== Summary ===");
    println!("Feeds: {} successful, {} failed", stats.successful_feeds, stats.failed_feeds);
    println!(
        "Fetched: {}  matching: {}  new: {}  total: {}",
        stats.total_fetched, stats.filtered_count, stats.new_articles, stats.merged_total
    );
    match &report.persist.error {
        None => println!("Saved to {}", report.persist.key),
        Some(error) => println!("Save FAILED: {error}"),
    }
    for failure in &report.persist.export_errors {
        println!("Export FAILED: {failure}");
    }

    if !articles.is_empty() {
        println!();
        println!("=== Latest Articles ===");
        for article in articles.iter().take(5) {
            let title: String = article.title.chars().take(50).collect();
            println!("  - [{}] {}", article.source, title);
        }
    }
}
