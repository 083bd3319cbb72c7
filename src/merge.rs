//! Merge fresh articles into the persisted collection.
//!
//! The merge is append-biased: an article already in the collection stays
//! until the size cap pushes it out (or [`prune_older_than`] is run).

use crate::models::{Article, ArticleCollection};
use chrono::{DateTime, TimeDelta, Utc};
use std::cmp::Reverse;
use std::collections::HashSet;
use url::Url;

/// What makes two articles "the same".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// Normalized URL only.
    UrlOnly,
    /// Normalized URL, and separately the lowercased trimmed title. A match on
    /// either counts as a duplicate.
    UrlAndTitle,
}

/// Result of [`merge`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub collection: ArticleCollection,
    /// New articles that made it into the merged list before capping.
    pub added: usize,
}

/// Scheme, host, port and path; query string and fragment removed.
///
/// Strings that do not parse as URLs are cut at the first `?` or `#`.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

fn title_key(article: &Article) -> String {
    article.title.trim().to_lowercase()
}

/// Append unseen `fresh` articles to `existing`, newest first, capped at `max_total`.
///
/// Duplicates inside `fresh` or already inside `existing` are dropped too, first one wins.
pub fn merge(
    existing: ArticleCollection,
    fresh: Vec<Article>,
    policy: IdentityPolicy,
    max_total: usize,
    now: DateTime<Utc>,
) -> MergeOutcome {
    let mut seen_urls = HashSet::new();
    let mut seen_titles = HashSet::new();
    let mut admit = |article: &Article| {
        if !seen_urls.insert(normalize_url(&article.url)) {
            return false;
        }
        policy == IdentityPolicy::UrlOnly || seen_titles.insert(title_key(article))
    };

    // Older snapshots may already hold duplicates; the first copy stays.
    let mut articles: Vec<Article> = existing.articles.into_iter().filter(|a| admit(a)).collect();
    let mut added = 0;
    for article in fresh {
        if admit(&article) {
            articles.push(article);
            added += 1;
        }
    }

    articles.sort_by_key(|a| Reverse(a.published_at));
    articles.truncate(max_total);

    MergeOutcome {
        collection: ArticleCollection {
            last_updated: now,
            articles,
        },
        added,
    }
}

/// Drop articles published more than `days` before `now`. Returns how many went.
pub fn prune_older_than(collection: &mut ArticleCollection, days: u32, now: DateTime<Utc>) -> usize {
    let Some(cutoff) = TimeDelta::try_days(i64::from(days)).and_then(|d| now.checked_sub_signed(d)) else {
        return 0;
    };
    let before = collection.articles.len();
    collection.articles.retain(|a| a.published_at >= cutoff);
    before - collection.articles.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + TimeDelta::minutes(minutes)
    }

    fn article(title: &str, url: &str, minutes: i64) -> Article {
        Article {
            title: title.to_string(),
            url: url.to_string(),
            source: "test".to_string(),
            published_at: at(minutes),
            image_url: None,
            fetched_at: None,
        }
    }

    fn collection(articles: Vec<Article>) -> ArticleCollection {
        ArticleCollection {
            last_updated: at(0),
            articles,
        }
    }

    #[test]
    fn test_normalize_url_strips_query_and_fragment() {
        assert_eq!(normalize_url("https://a/1?ref=xyz"), "https://a/1");
        assert_eq!(normalize_url("https://a/1#top"), "https://a/1");
        assert_eq!(normalize_url(" https://a/1 "), "https://a/1");
        assert_eq!(normalize_url("https://Example.COM:8080/p?q=1"), "https://example.com:8080/p");
        assert_eq!(normalize_url("not a url?x=1"), "not a url");
    }

    #[test]
    fn test_query_variant_is_same_identity() {
        let existing = collection(vec![article("first", "https://a/1", 1)]);
        let outcome = merge(
            existing,
            vec![article("second", "https://a/1?ref=xyz", 2)],
            IdentityPolicy::UrlOnly,
            500,
            at(10),
        );
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.collection.len(), 1);
        assert_eq!(outcome.collection.last_updated, at(10));
    }

    #[test]
    fn test_duplicates_already_in_snapshot_are_collapsed() {
        let existing = collection(vec![
            article("tracked", "https://a/3?ref=rss", 3),
            article("plain", "https://a/3", 2),
        ]);
        let outcome = merge(
            existing,
            vec![article("fresh", "https://b/1", 5)],
            IdentityPolicy::UrlOnly,
            500,
            at(10),
        );
        assert_eq!(outcome.added, 1);
        let keys: Vec<String> = outcome.collection.articles.iter().map(|a| normalize_url(&a.url)).collect();
        assert_eq!(keys, vec!["https://b/1", "https://a/3"]);
        assert_eq!(outcome.collection.articles[1].title, "tracked");

        let titled = collection(vec![
            article("同じ見出し", "https://a/1", 2),
            article("同じ見出し", "https://a/2", 1),
        ]);
        let outcome = merge(titled, Vec::new(), IdentityPolicy::UrlAndTitle, 500, at(10));
        assert_eq!(outcome.collection.len(), 1);
        assert_eq!(outcome.collection.articles[0].url, "https://a/1");
    }

    #[test]
    fn test_duplicates_within_batch_are_rejected() {
        let outcome = merge(
            collection(Vec::new()),
            vec![
                article("one", "https://a/1", 1),
                article("one again", "https://a/1#x", 2),
                article("two", "https://a/2", 3),
            ],
            IdentityPolicy::UrlOnly,
            500,
            at(10),
        );
        assert_eq!(outcome.added, 2);
        let titles: Vec<&str> = outcome.collection.articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["two", "one"]);
    }

    #[test]
    fn test_title_identity_catches_syndicated_copies() {
        let existing = collection(vec![article("択捉島で演習", "https://a/1", 1)]);
        let fresh = vec![
            article("  択捉島で演習 ", "https://b/other", 2),
            article("Kuril Talks", "https://c/1", 3),
            article("kuril talks", "https://c/2", 4),
        ];

        let strict = merge(existing.clone(), fresh.clone(), IdentityPolicy::UrlAndTitle, 500, at(10));
        assert_eq!(strict.added, 1);

        let loose = merge(existing, fresh, IdentityPolicy::UrlOnly, 500, at(10));
        assert_eq!(loose.added, 3);
    }

    #[test]
    fn test_cap_drops_oldest() {
        let existing: Vec<Article> = (0..500)
            .map(|i| article(&format!("old {i}"), &format!("https://a/{i}"), i))
            .collect();
        let fresh: Vec<Article> = (0..10)
            .map(|i| article(&format!("new {i}"), &format!("https://b/{i}"), 1000 + i))
            .collect();

        let outcome = merge(collection(existing), fresh, IdentityPolicy::UrlOnly, 500, at(2000));
        assert_eq!(outcome.added, 10);
        assert_eq!(outcome.collection.len(), 500);
        assert_eq!(outcome.collection.articles[0].title, "new 9");
        // The ten oldest (minutes 0..10) fell off the tail.
        assert_eq!(outcome.collection.articles.last().unwrap().title, "old 10");
        assert!(!outcome.collection.articles.iter().any(|a| a.title == "old 9"));
    }

    #[test]
    fn test_merge_never_drops_below_cap() {
        let existing: Vec<Article> = (0..5).map(|i| article("e", &format!("https://a/{i}"), i)).collect();
        let fresh: Vec<Article> = (0..3).map(|i| article("f", &format!("https://a/{i}?dup"), i)).collect();
        let outcome = merge(collection(existing), fresh, IdentityPolicy::UrlOnly, 100, at(50));
        assert_eq!(outcome.collection.len(), 5);
        assert!(
            outcome
                .collection
                .articles
                .windows(2)
                .all(|w| w[0].published_at >= w[1].published_at)
        );
    }

    #[test]
    fn test_prune_older_than() {
        let now = at(0) + TimeDelta::days(40);
        let mut c = collection(vec![
            article("recent", "https://a/1", 60 * 24 * 35),
            article("stale", "https://a/2", 0),
        ]);
        assert_eq!(prune_older_than(&mut c, 30, now), 1);
        assert_eq!(c.articles[0].title, "recent");
        assert_eq!(prune_older_than(&mut c, 30, now), 0);
    }
}
