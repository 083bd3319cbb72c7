//! Filter, dedupe, sort and cap stages over a batch of fresh articles.

use crate::models::Article;
use itertools::Itertools;
use serde::Deserialize;
use std::cmp::Reverse;

/// Sort direction by publish time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Keep articles whose title contains any keyword, ignoring case.
///
/// An empty keyword list keeps nothing.
pub fn filter_by_keywords(articles: Vec<Article>, keywords: &[String]) -> Vec<Article> {
    let needles: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    articles
        .into_iter()
        .filter(|article| {
            let title = article.title.to_lowercase();
            needles.iter().any(|needle| title.contains(needle.as_str()))
        })
        .collect()
}

/// Drop later articles whose URL string was already seen. No normalization.
pub fn dedupe_exact(articles: Vec<Article>) -> Vec<Article> {
    articles.into_iter().unique_by(|a| a.url.clone()).collect()
}

/// Stable sort by publish time.
pub fn sort_articles(articles: &mut [Article], order: SortOrder) {
    match order {
        SortOrder::Asc => articles.sort_by_key(|a| a.published_at),
        SortOrder::Desc => articles.sort_by_key(|a| Reverse(a.published_at)),
    }
}

/// Keep the first `max` articles.
pub fn cap(mut articles: Vec<Article>, max: usize) -> Vec<Article> {
    articles.truncate(max);
    articles
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn article(title: &str, url: &str, day: u32) -> Article {
        Article {
            title: title.to_string(),
            url: url.to_string(),
            source: "test".to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            image_url: None,
            fetched_at: None,
        }
    }

    #[test]
    fn test_filter_keeps_keyword_matches_only() {
        let keywords = vec!["北方領土".to_string(), "Kuril".to_string()];
        let articles = vec![
            article("北方領土 返還問題", "https://a/1", 1),
            article("unrelated", "https://a/2", 2),
            article("Russia and the KURIL islands", "https://a/3", 3),
        ];

        let kept = filter_by_keywords(articles, &keywords);
        let titles: Vec<&str> = kept.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["北方領土 返還問題", "Russia and the KURIL islands"]);
    }

    #[test]
    fn test_filter_with_no_keywords_keeps_nothing() {
        assert!(filter_by_keywords(vec![article("北方領土", "https://a/1", 1)], &[]).is_empty());
    }

    #[test]
    fn test_dedupe_exact_keeps_first_and_ignores_query() {
        let articles = vec![
            article("first", "https://a/1", 1),
            article("with query", "https://a/1?ref=xyz", 2),
            article("second copy", "https://a/1", 3),
        ];
        let deduped = dedupe_exact(articles);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "first");
        assert_eq!(deduped[1].url, "https://a/1?ref=xyz");
    }

    #[test]
    fn test_full_stage_is_idempotent() {
        let keywords = vec!["北方領土".to_string(), "択捉".to_string()];
        let stage = |articles: Vec<Article>| {
            let mut kept = dedupe_exact(filter_by_keywords(articles, &keywords));
            sort_articles(&mut kept, SortOrder::Desc);
            cap(kept, 3)
        };
        let articles = vec![
            article("北方領土の日", "https://a/1", 1),
            article("択捉島で演習", "https://a/2", 4),
            article("unrelated", "https://a/3", 9),
            article("北方領土の日", "https://a/1", 1),
            article("択捉 同日", "https://a/4", 4),
            article("北方領土 交渉", "https://a/5", 7),
            article("北方領土 古い", "https://a/6", 2),
        ];

        let once = stage(articles);
        let twice = stage(once.clone());
        assert_eq!(once, twice);
        let urls: Vec<&str> = once.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a/5", "https://a/2", "https://a/4"]);
    }

    #[test]
    fn test_sort_is_monotonic_and_stable() {
        let mut articles = vec![
            article("old", "https://a/1", 1),
            article("tie-first", "https://a/2", 5),
            article("new", "https://a/3", 9),
            article("tie-second", "https://a/4", 5),
        ];

        sort_articles(&mut articles, SortOrder::Desc);
        assert!(articles.windows(2).all(|w| w[0].published_at >= w[1].published_at));
        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "tie-first", "tie-second", "old"]);

        sort_articles(&mut articles, SortOrder::Asc);
        assert!(articles.windows(2).all(|w| w[0].published_at <= w[1].published_at));
    }

    #[test]
    fn test_cap_keeps_head() {
        let articles = vec![article("a", "https://a/1", 3), article("b", "https://a/2", 2), article("c", "https://a/3", 1)];
        let capped = cap(articles, 2);
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[1].title, "b");
        assert_eq!(cap(Vec::new(), 5).len(), 0);
    }

    #[test]
    fn test_sort_order_deserializes_lowercase() {
        let order: SortOrder = serde_json::from_str("\"asc\"").unwrap();
        assert_eq!(order, SortOrder::Asc);
        assert!(serde_json::from_str::<SortOrder>("\"sideways\"").is_err());
        assert_eq!(SortOrder::default(), SortOrder::Desc);
    }
}
