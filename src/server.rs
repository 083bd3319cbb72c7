//! HTTP query surface over the current snapshot.
//!
//! Readers clone an `Arc` to the collection and never wait on a refresh; a
//! refresh builds a whole new collection and swaps it in.

use crate::BoxError;
use crate::models::{Article, ArticleCollection, RunReport};
use crate::persist::load_collection;
use crate::pipeline::{Mode, Pipeline};
use crate::stages::{SortOrder, sort_articles};
use crate::store::Store;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tracing::{error, info, instrument, warn};

pub struct AppState {
    snapshot: RwLock<Arc<ArticleCollection>>,
    pipeline: Pipeline,
    store: Store,
    key: String,
    exports: Vec<PathBuf>,
    refreshing: Mutex<()>,
}

impl AppState {
    /// Load the persisted snapshot and wrap everything the handlers need.
    pub async fn load(pipeline: Pipeline, store: Store, key: String, exports: Vec<PathBuf>) -> Self {
        let collection = load_collection(&store, &key).await;
        Self {
            snapshot: RwLock::new(Arc::new(collection)),
            pipeline,
            store,
            key,
            exports,
            refreshing: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<ArticleCollection> {
        let guard = self.snapshot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    fn replace(&self, collection: ArticleCollection) {
        let mut guard = self.snapshot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(collection);
    }

    /// Run the feed pipeline against the store and swap in the result.
    /// Overlapping refreshes queue up behind each other.
    pub async fn refresh(&self) -> RunReport {
        let _running = self.refreshing.lock().await;
        let refreshed = self
            .pipeline
            .refresh(Mode::Feeds, &self.store, &self.key, &self.exports)
            .await;
        self.replace(refreshed.collection);
        refreshed.report
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ArticleQuery {
    pub source: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlesResponse {
    pub articles: Vec<Article>,
    pub last_updated: DateTime<Utc>,
    pub total_count: usize,
}

/// Exact source match, case-insensitive title substring, then sort.
pub fn query_articles(collection: &ArticleCollection, query: &ArticleQuery) -> Vec<Article> {
    let source = query.source.as_deref().filter(|s| !s.is_empty());
    let needle = query
        .q
        .as_deref()
        .map(str::to_lowercase)
        .filter(|q| !q.is_empty());

    let mut articles: Vec<Article> = collection
        .articles
        .iter()
        .filter(|a| source.is_none_or(|s| a.source == s))
        .filter(|a| needle.as_deref().is_none_or(|q| a.title.to_lowercase().contains(q)))
        .cloned()
        .collect();
    sort_articles(&mut articles, query.sort);
    articles
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Northern Territories News API is running" }))
}

async fn list_articles(State(state): State<Arc<AppState>>, Query(query): Query<ArticleQuery>) -> Json<ArticlesResponse> {
    let snapshot = state.snapshot();
    let articles = query_articles(&snapshot, &query);
    Json(ArticlesResponse {
        total_count: articles.len(),
        articles,
        last_updated: snapshot.last_updated,
    })
}

async fn list_sources(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let snapshot = state.snapshot();
    let sources: Vec<&str> = snapshot
        .articles
        .iter()
        .map(|a| a.source.as_str())
        .unique()
        .sorted()
        .collect();
    Json(json!({ "sources": sources }))
}

async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "lastUpdated": state.snapshot().last_updated }))
}

#[instrument(level = "info", skip_all)]
async fn trigger_refresh(State(state): State<Arc<AppState>>) -> Response {
    // Run detached so a panic inside the pipeline becomes a 500, not a dropped connection.
    match tokio::spawn(async move { state.refresh().await }).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            error!(error = %e, "Refresh failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Refresh failed", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

fn cors(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        // Credentials rule out a `*` header list, so echo what the browser asks for.
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors(&state.pipeline.settings().cors_origins);

    Router::new()
        .route("/", get(root))
        .route("/api/articles", get(list_articles))
        .route("/api/sources", get(list_sources))
        .route("/api/status", get(status))
        .route("/api/refresh", post(trigger_refresh))
        .layer(cors)
        .with_state(state)
}

/// Bind `host:port` from the settings and serve until the process exits.
pub async fn serve(state: Arc<AppState>) -> Result<(), BoxError> {
    let settings = state.pipeline.settings();
    let listener = TcpListener::bind((settings.host.as_str(), settings.port)).await?;
    let addr = listener.local_addr()?;
    info!(%addr, articles = state.snapshot().len(), "Serving news API");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
