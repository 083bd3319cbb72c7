//! Turn decoded feed entries into [`Article`]s.
//!
//! An entry without a title or link is dropped silently; so is one whose link
//! is not an absolute URL. Dates go through [`crate::dates::resolve`] and
//! fall back to "now" when nothing parses.

use crate::dates::{self, DateResolution};
use crate::feeds::decode::{MediaRef, RawEntry};
use crate::models::Article;
use chrono::{DateTime, Utc};
use url::Url;

/// Source name used for Google News items whose title has no publisher suffix.
pub const GOOGLE_NEWS: &str = "Google News";

/// A normalized article plus how its date was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub article: Article,
    pub date: DateResolution,
}

/// Map one ordinary feed entry to an article attributed to `source_name`.
pub fn normalize_entry(entry: &RawEntry, source_name: &str, now: DateTime<Utc>) -> Option<Normalized> {
    let title = non_empty(entry.title.as_deref())?;
    let url = absolute_url(entry.link.as_deref())?;
    let date = resolve_date(entry, now);

    Some(Normalized {
        article: Article {
            title: title.to_string(),
            url,
            source: source_name.to_string(),
            published_at: date.timestamp(),
            image_url: None,
            fetched_at: Some(now),
        },
        date,
    })
}

/// Map one Google News search result.
///
/// Titles look like `headline - publisher`; the publisher becomes the
/// source. Without a separator the `<source>` element is used, then
/// [`GOOGLE_NEWS`].
pub fn normalize_google_news_entry(entry: &RawEntry, now: DateTime<Utc>) -> Option<Normalized> {
    let composite = non_empty(entry.title.as_deref())?;
    let url = absolute_url(entry.link.as_deref())?;

    let (title, source) = match split_google_title(composite) {
        Some((headline, publisher)) => (headline.to_string(), publisher.to_string()),
        None => (
            composite.to_string(),
            non_empty(entry.source.as_deref()).unwrap_or(GOOGLE_NEWS).to_string(),
        ),
    };

    let date = resolve_date(entry, now);
    Some(Normalized {
        article: Article {
            title,
            url,
            source,
            published_at: date.timestamp(),
            image_url: extract_image_url(entry),
            fetched_at: Some(now),
        },
        date,
    })
}

/// Split `headline - publisher` on the last ` - `.
///
/// Returns `None` when there is no separator or either side is blank.
pub fn split_google_title(title: &str) -> Option<(&str, &str)> {
    let idx = title.rfind(" - ")?;
    let headline = title[..idx].trim();
    let publisher = title[idx + 3..].trim();
    if headline.is_empty() || publisher.is_empty() {
        return None;
    }
    Some((headline, publisher))
}

/// First plausible image: media content, then thumbnails, then image enclosures.
pub fn extract_image_url(entry: &RawEntry) -> Option<String> {
    entry
        .media_content
        .iter()
        .filter(|m| is_image(m) || (m.medium.is_none() && m.mime_type.is_none()))
        .chain(entry.media_thumbnails.iter())
        .chain(entry.enclosures.iter().filter(|m| is_image(m)))
        .find_map(|m| absolute_url(Some(m.url.as_str())))
}

fn is_image(media: &MediaRef) -> bool {
    media.medium.as_deref() == Some("image")
        || media
            .mime_type
            .as_deref()
            .is_some_and(|t| t.starts_with("image/"))
}

fn resolve_date(entry: &RawEntry, now: DateTime<Utc>) -> DateResolution {
    dates::resolve(
        [entry.published_parsed, entry.updated_parsed, entry.created_parsed],
        [
            entry.published.as_deref(),
            entry.updated.as_deref(),
            entry.created.as_deref(),
        ],
        now,
    )
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn absolute_url(link: Option<&str>) -> Option<String> {
    let link = non_empty(link)?;
    let parsed = Url::parse(link).ok()?;
    matches!(parsed.scheme(), "http" | "https").then(|| link.to_string())
}
