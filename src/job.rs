//! Scheduled-job entry point.
//!
//! One invocation loads the stored snapshot, runs the feed pipeline, merges,
//! and writes the result back. The response mirrors what a function-as-a-
//! service runtime expects: a status code plus a JSON body. Only a pipeline
//! that cannot start at all yields 500; feed and upload failures are reported
//! inside a 200 body.

use crate::BoxError;
use crate::pipeline::{Mode, Pipeline};
use crate::store::ObjectStore;
use serde::Serialize;
use serde_json::{Value, json};
use std::path::PathBuf;
use tracing::{error, info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub status_code: u16,
    pub body: Value,
}

impl JobResponse {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    /// The pipeline could not be started.
    pub fn failure(e: &BoxError) -> Self {
        error!(error = %e, "Job failed");
        Self {
            status_code: 500,
            body: json!({ "message": "RSS fetch failed", "error": e.to_string() }),
        }
    }
}

/// Run the feed pipeline once for a triggering `event`.
#[instrument(level = "info", skip_all, fields(key = %key))]
pub async fn run<S: ObjectStore>(
    event: &Value,
    pipeline: &Pipeline,
    store: &S,
    key: &str,
    exports: &[PathBuf],
) -> JobResponse {
    info!(event = %event, "Job invoked");
    let refreshed = pipeline.refresh(Mode::Feeds, store, key, exports).await;
    let report = refreshed.report;

    info!(
        existing = report.stats.existing_articles,
        merged = report.stats.merged_total,
        uploaded = report.persist.uploaded,
        "Job completed"
    );

    JobResponse {
        status_code: 200,
        body: json!({
            "message": "RSS fetch completed successfully",
            "stats": report.stats,
            "feeds": report.feed_statuses,
            "upload": report.persist,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::models::FeedSource;
    use crate::store::MemoryStore;
    use axum::Router;
    use axum::routing::get;
    use reqwest::Client;

    #[test]
    fn test_unbuildable_pipeline_is_500() {
        let settings = Settings {
            user_agent: "bad\nagent".to_string(),
            ..Default::default()
        };
        let response = JobResponse::failure(&Pipeline::new(settings).unwrap_err());
        assert_eq!(response.status_code, 500);
        assert!(!response.is_success());
        assert_eq!(response.body["message"], "RSS fetch failed");
        assert!(response.body["error"].is_string());
    }

    #[tokio::test]
    async fn test_run_reports_stats_and_upload() {
        let app = Router::new().route(
            "/rss.xml",
            get(|| async {
                r#"<rss version="2.0"><channel><title>t</title>
                <item><title>北方四島交流事業</title><link>https://c/1</link></item>
                </channel></rss>"#
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let settings = Settings {
            feeds: vec![
                FeedSource::new("時事通信", &format!("http://{addr}/rss.xml"), "general"),
                FeedSource::new("Gone", &format!("http://{addr}/missing.xml"), "general"),
            ],
            ..Default::default()
        };
        let pipeline = Pipeline::with_client(settings, Client::builder().no_proxy().build().unwrap());
        let store = MemoryStore::new();

        let response = run(&json!({"source": "aws.events"}), &pipeline, &store, "data/articles.json", &[]).await;
        assert!(response.is_success());
        let body = &response.body;
        assert_eq!(body["stats"]["existing_articles"], 0);
        assert_eq!(body["stats"]["merged_total"], 1);
        assert_eq!(body["stats"]["failed_feeds"], 1);
        assert_eq!(body["stats"]["defaulted_dates"], 1);
        assert_eq!(body["upload"]["uploaded"], true);
        assert_eq!(body["upload"]["key"], "data/articles.json");

        let serialized = serde_json::to_value(&response).unwrap();
        assert_eq!(serialized["statusCode"], 200);
    }
}
