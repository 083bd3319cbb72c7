//! Google News keyword search as a set of feed sources.

use crate::models::FeedSource;

const SEARCH_ENDPOINT: &str = "https://news.google.com/rss/search";

/// RSS search URL for one keyword in the given language and region.
pub fn search_url(keyword: &str, language: &str, region: &str) -> String {
    format!(
        "{SEARCH_ENDPOINT}?q={}&hl={language}&gl={region}&ceid={region}:{language}",
        urlencoding::encode(keyword.trim())
    )
}

/// One source per non-blank keyword, named `Google News (<keyword>)`.
pub fn search_sources(keywords: &[String], language: &str, region: &str) -> Vec<FeedSource> {
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|keyword| FeedSource {
            name: format!("Google News ({keyword})"),
            url: search_url(keyword, language, region),
            category: "search".to_string(),
        })
        .collect()
}
