//! Runtime settings.
//!
//! Resolved in three layers: built-in defaults, an optional YAML file, then
//! `NEWS_*` environment variables. A malformed environment value is logged
//! and ignored rather than aborting startup.

use crate::BoxError;
use crate::models::FeedSource;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub fetch_timeout_secs: u64,
    pub max_articles_per_source: usize,
    pub max_total_articles: usize,
    /// Drop articles older than this many days after each merge. Unset keeps
    /// everything until the size cap pushes it out.
    pub retention_days: Option<u32>,
    pub user_agent: String,
    pub filter_keywords: Vec<String>,
    pub feeds: Vec<FeedSource>,
    pub search_keywords: Vec<String>,
    pub search_language: String,
    pub search_region: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: strings(&["http://localhost:8080", "http://localhost:8081", "http://127.0.0.1:8080"]),
            fetch_timeout_secs: 30,
            max_articles_per_source: 50,
            max_total_articles: 500,
            retention_days: None,
            user_agent: "NorthernTerritoriesNewsBot/1.0".to_string(),
            filter_keywords: strings(&[
                "北方領土",
                "択捉",
                "国後",
                "色丹",
                "歯舞",
                "北方四島",
                "千島列島",
                "クリル",
                "日露",
                "日ロ",
            ]),
            feeds: vec![
                FeedSource::new("NHK", "https://www.nhk.or.jp/rss/news/cat6.xml", "politics"),
                FeedSource::new("NHK", "https://www.nhk.or.jp/rss/news/cat1.xml", "society"),
                FeedSource::new("朝日新聞", "https://www.asahi.com/rss/asahi/newsheadlines.rdf", "general"),
                FeedSource::new("毎日新聞", "https://mainichi.jp/rss/etc/mainichi-flash.rss", "general"),
                FeedSource::new("時事通信", "https://www.jiji.com/rss/ranking.rdf", "general"),
                FeedSource::new(
                    "北海道新聞",
                    "https://www.hokkaido-np.co.jp/output/7/free/index.ad.xml",
                    "regional",
                ),
            ],
            search_keywords: strings(&["北方領土", "択捉島", "国後島", "色丹島", "歯舞群島"]),
            search_language: "ja".to_string(),
            search_region: "JP".to_string(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Settings {
    /// Defaults, then the YAML file at `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, BoxError> {
        let mut settings = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Read a YAML file; fields it omits keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, BoxError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
        let settings: Settings = serde_yaml::from_str(&text)?;
        info!(path = %path.display(), feeds = settings.feeds.len(), "Loaded config file");
        Ok(settings)
    }

    /// Apply `NEWS_*` overrides looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("NEWS_HOST").filter(|h| !h.trim().is_empty()) {
            self.host = host.trim().to_string();
        }
        if let Some(agent) = lookup("NEWS_USER_AGENT").filter(|a| !a.trim().is_empty()) {
            self.user_agent = agent.trim().to_string();
        }
        override_parsed(&lookup, "NEWS_PORT", &mut self.port);
        override_parsed(&lookup, "NEWS_FETCH_TIMEOUT", &mut self.fetch_timeout_secs);
        override_parsed(&lookup, "NEWS_MAX_ARTICLES_PER_SOURCE", &mut self.max_articles_per_source);
        override_parsed(&lookup, "NEWS_MAX_TOTAL_ARTICLES", &mut self.max_total_articles);

        let mut retention = 0u32;
        if override_parsed(&lookup, "NEWS_RETENTION_DAYS", &mut retention) {
            self.retention_days = (retention > 0).then_some(retention);
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Returns whether `target` was overwritten.
fn override_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) -> bool {
    let Some(raw) = lookup(key) else {
        return false;
    };
    match raw.trim().parse() {
        Ok(value) => {
            *target = value;
            true
        }
        Err(_) => {
            warn!(key, value = %raw, "Ignoring malformed environment override");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(settings.max_articles_per_source, 50);
        assert_eq!(settings.max_total_articles, 500);
        assert_eq!(settings.retention_days, None);
        assert_eq!(settings.feeds.len(), 6);
        assert_eq!(settings.filter_keywords.len(), 10);
        assert_eq!(settings.search_keywords[0], "北方領土");
    }

    #[test]
    fn test_env_overrides_and_malformed_values() {
        let mut settings = Settings::default();
        settings.apply_env(env(&[
            ("NEWS_PORT", "9000"),
            ("NEWS_FETCH_TIMEOUT", "soon"),
            ("NEWS_MAX_TOTAL_ARTICLES", " 200 "),
            ("NEWS_RETENTION_DAYS", "180"),
            ("NEWS_HOST", "127.0.0.1"),
        ]));

        assert_eq!(settings.port, 9000);
        assert_eq!(settings.fetch_timeout_secs, 30);
        assert_eq!(settings.max_total_articles, 200);
        assert_eq!(settings.retention_days, Some(180));
        assert_eq!(settings.host, "127.0.0.1");
    }

    #[test]
    fn test_zero_retention_disables_pruning() {
        let mut settings = Settings {
            retention_days: Some(30),
            ..Default::default()
        };
        settings.apply_env(env(&[("NEWS_RETENTION_DAYS", "0")]));
        assert_eq!(settings.retention_days, None);
    }

    #[test]
    fn test_yaml_file_keeps_unset_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "max_total_articles: 100\nfeeds:\n  - name: Test\n    url: https://example.com/rss.xml\n"
        )
        .unwrap();

        let settings = Settings::from_yaml_file(file.path()).unwrap();
        assert_eq!(settings.max_total_articles, 100);
        assert_eq!(settings.feeds.len(), 1);
        assert_eq!(settings.feeds[0].category, "");
        assert_eq!(settings.port, 8000);
    }

    #[test]
    fn test_missing_yaml_file_is_an_error() {
        assert!(Settings::from_yaml_file(Path::new("/nonexistent/territory_news.yaml")).is_err());
    }
}
