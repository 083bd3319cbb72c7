//! Tolerant syndication feed decoder.
//!
//! Reads RSS 2.0, RSS 1.0 (RDF) and Atom documents into flat [`RawEntry`]
//! records. Real-world feeds are often slightly broken, so decoding never
//! fails outright: a fatal XML fault stops the read, is recorded in
//! [`ParsedFeed::malformed`], and every entry completed before the fault is
//! kept. Callers decide whether a malformed feed with zero entries is an
//! error.

use crate::dates::parse_strict;
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// A media reference attached to an entry (`media:content`,
/// `media:thumbnail` or `<enclosure>`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaRef {
    pub url: String,
    /// Declared MIME type, e.g. `image/jpeg`.
    pub mime_type: Option<String>,
    /// `medium` attribute of `media:content`, e.g. `image`.
    pub medium: Option<String>,
}

/// One feed entry exactly as found in the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub created: Option<String>,
    pub published_parsed: Option<DateTime<Utc>>,
    pub updated_parsed: Option<DateTime<Utc>>,
    pub created_parsed: Option<DateTime<Utc>>,
    /// Text of a `<source>` element (Google News puts the publisher here).
    pub source: Option<String>,
    pub media_content: Vec<MediaRef>,
    pub media_thumbnails: Vec<MediaRef>,
    pub enclosures: Vec<MediaRef>,
}

/// Result of decoding one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<RawEntry>,
    /// Set when the document could not be read to the end.
    pub malformed: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    FeedTitle,
    Title,
    Link,
    Published,
    Updated,
    Created,
    Source,
}

/// Decode a feed document. Never fails; see [`ParsedFeed::malformed`].
pub fn decode(xml: &str) -> ParsedFeed {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut feed = ParsedFeed::default();
    let mut root: Option<String> = None;
    let mut depth = 0usize;
    let mut entry: Option<RawEntry> = None;
    let mut capture: Option<(Field, String)> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                let name = qname(&e);
                if root.is_none() {
                    root = Some(name.clone());
                }
                if capture.is_some() {
                    continue;
                }
                if is_entry(&name) {
                    entry = Some(RawEntry::default());
                    continue;
                }
                match entry.as_mut() {
                    Some(current) => {
                        if name == "link" {
                            if let Some(href) = attr(&e, "href") {
                                take_atom_link(current, &e, href);
                                continue;
                            }
                        }
                        attach_media(current, &name, &e);
                        if let Some(field) = entry_field(&name) {
                            capture = Some((field, name));
                            text.clear();
                        }
                    }
                    None if name == "title" && feed.title.is_none() => {
                        capture = Some((Field::FeedTitle, name));
                        text.clear();
                    }
                    None => {}
                }
            }
            Ok(Event::Empty(e)) => {
                if root.is_none() {
                    root = Some(qname(&e));
                }
                if capture.is_some() {
                    continue;
                }
                if let Some(current) = entry.as_mut() {
                    let name = qname(&e);
                    if name == "link" {
                        if let Some(href) = attr(&e, "href") {
                            take_atom_link(current, &e, href);
                        }
                    } else {
                        attach_media(current, &name, &e);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if capture.is_some() {
                    let chunk = match e.unescape() {
                        Ok(unescaped) => unescaped.into_owned(),
                        Err(_) => String::from_utf8_lossy(&e).into_owned(),
                    };
                    text.push_str(&chunk);
                }
            }
            Ok(Event::CData(e)) => {
                if capture.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

                if let Some((field, open)) = capture.as_ref() {
                    if *open == name {
                        let value = text.trim().to_string();
                        match (field, entry.as_mut()) {
                            (Field::FeedTitle, _) => feed.title = Some(value),
                            (field, Some(current)) => store_field(current, *field, value),
                            (_, None) => {}
                        }
                        capture = None;
                        text.clear();
                    }
                    continue;
                }

                if is_entry(&name) {
                    if let Some(finished) = entry.take() {
                        feed.entries.push(finished);
                    }
                }
            }
            Ok(Event::Eof) => {
                if depth > 0 {
                    feed.malformed = Some("unexpected end of document".to_string());
                }
                break;
            }
            Err(e) => {
                feed.malformed = Some(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                ));
                break;
            }
            Ok(_) => {}
        }
    }

    match root.as_deref() {
        Some("rss") | Some("feed") | Some("rdf:RDF") | Some("RDF") => {}
        Some(other) if feed.malformed.is_none() => {
            feed.malformed = Some(format!("not a syndication feed (root element <{other}>)"));
        }
        None if feed.malformed.is_none() => {
            feed.malformed = Some("empty document".to_string());
        }
        _ => {}
    }

    feed
}

fn qname(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
}

fn is_entry(name: &str) -> bool {
    name == "item" || name == "entry"
}

fn entry_field(name: &str) -> Option<Field> {
    match name {
        "title" => Some(Field::Title),
        "link" => Some(Field::Link),
        "pubDate" | "published" | "issued" => Some(Field::Published),
        "updated" | "modified" | "dc:date" | "dcterms:modified" => Some(Field::Updated),
        "created" | "dcterms:created" => Some(Field::Created),
        "source" => Some(Field::Source),
        _ => None,
    }
}

fn store_field(entry: &mut RawEntry, field: Field, value: String) {
    if value.is_empty() {
        return;
    }
    let slot = match field {
        Field::Title => &mut entry.title,
        Field::Link => &mut entry.link,
        Field::Published => &mut entry.published,
        Field::Updated => &mut entry.updated,
        Field::Created => &mut entry.created,
        Field::Source => &mut entry.source,
        Field::FeedTitle => return,
    };
    if slot.is_none() {
        *slot = Some(value);
    }

    entry.published_parsed = entry.published_parsed.or_else(|| entry.published.as_deref().and_then(parse_strict));
    entry.updated_parsed = entry.updated_parsed.or_else(|| entry.updated.as_deref().and_then(parse_strict));
    entry.created_parsed = entry.created_parsed.or_else(|| entry.created.as_deref().and_then(parse_strict));
}

/// Atom links: prefer `rel="alternate"` (or no rel) and keep the first one.
fn take_atom_link(entry: &mut RawEntry, e: &BytesStart<'_>, href: String) {
    let rel = attr(e, "rel");
    match rel.as_deref() {
        None | Some("alternate") => {
            if entry.link.is_none() {
                entry.link = Some(href);
            }
        }
        Some("enclosure") => entry.enclosures.push(MediaRef {
            url: href,
            mime_type: attr(e, "type"),
            medium: None,
        }),
        Some(_) => {}
    }
}

fn attach_media(entry: &mut RawEntry, name: &str, e: &BytesStart<'_>) {
    let target = match name {
        "media:content" => &mut entry.media_content,
        "media:thumbnail" => &mut entry.media_thumbnails,
        "enclosure" => &mut entry.enclosures,
        _ => return,
    };
    if let Some(url) = attr(e, "url") {
        target.push(MediaRef {
            url,
            mime_type: attr(e, "type"),
            medium: attr(e, "medium"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>NHKニュース</title>
    <link>https://www.nhk.or.jp/</link>
    <item>
      <title>北方領土 返還問題</title>
      <link>https://a/1</link>
      <pubDate>Mon, 01 Jan 2024 09:00:00 +0900</pubDate>
      <media:content url="https://img/1.jpg" medium="image"/>
      <enclosure url="https://img/1.mp3" type="audio/mpeg"/>
    </item>
    <item>
      <title><![CDATA[unrelated & other]]></title>
      <link>https://a/2</link>
      <pubDate>Tue, 02 Jan 2024 09:00:00 JST</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_decodes_rss2() {
        let feed = decode(RSS);
        assert_eq!(feed.malformed, None);
        assert_eq!(feed.title.as_deref(), Some("NHKニュース"));
        assert_eq!(feed.entries.len(), 2);

        let first = &feed.entries[0];
        assert_eq!(first.title.as_deref(), Some("北方領土 返還問題"));
        assert_eq!(first.link.as_deref(), Some("https://a/1"));
        assert_eq!(
            first.published_parsed,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(first.media_content[0].url, "https://img/1.jpg");
        assert_eq!(first.media_content[0].medium.as_deref(), Some("image"));
        assert_eq!(first.enclosures[0].mime_type.as_deref(), Some("audio/mpeg"));

        let second = &feed.entries[1];
        assert_eq!(second.title.as_deref(), Some("unrelated & other"));
        // Named zone: strict parse fails, the raw string is kept for later.
        assert_eq!(second.published.as_deref(), Some("Tue, 02 Jan 2024 09:00:00 JST"));
        assert_eq!(second.published_parsed, None);
    }

    #[test]
    fn test_decodes_rdf_with_dc_date() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns="http://purl.org/rss/1.0/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel rdf:about="https://www.asahi.com/">
    <title>朝日新聞</title>
  </channel>
  <item rdf:about="https://www.asahi.com/articles/1.html">
    <title>日ロ外相会談</title>
    <link>https://www.asahi.com/articles/1.html</link>
    <dc:date>2024-03-01T10:00:00+09:00</dc:date>
  </item>
</rdf:RDF>"#;

        let feed = decode(xml);
        assert_eq!(feed.malformed, None);
        assert_eq!(feed.entries.len(), 1);
        assert_eq!(
            feed.entries[0].updated_parsed,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 1, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_decodes_atom_links_and_nested_source() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom feed</title>
  <entry>
    <title>色丹島の現状</title>
    <link rel="self" href="https://b/self"/>
    <link rel="alternate" href="https://b/1"/>
    <link rel="enclosure" type="image/png" href="https://b/1.png"/>
    <published>2024-05-01T00:00:00Z</published>
    <updated>2024-05-02T00:00:00Z</updated>
    <source><title>Upstream</title></source>
  </entry>
</feed>"#;

        let feed = decode(xml);
        assert_eq!(feed.malformed, None);
        let entry = &feed.entries[0];
        assert_eq!(entry.title.as_deref(), Some("色丹島の現状"));
        assert_eq!(entry.link.as_deref(), Some("https://b/1"));
        assert_eq!(entry.source.as_deref(), Some("Upstream"));
        assert_eq!(entry.enclosures[0].url, "https://b/1.png");
        assert!(entry.published_parsed.is_some());
        assert!(entry.updated_parsed.is_some());
    }

    #[test]
    fn test_keeps_entries_before_fault() {
        let xml = r#"<rss><channel>
            <item><title>one</title><link>https://a/1</link></item>
            <item><title>two</title><link>https://a/2</link></wrong>
        </channel></rss>"#;

        let feed = decode(xml);
        assert!(feed.malformed.is_some());
        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.entries[0].title.as_deref(), Some("one"));
    }

    #[test]
    fn test_truncated_document_is_malformed() {
        let feed = decode("<rss><channel><item><title>Unclosed");
        assert!(feed.malformed.is_some());
        assert!(feed.entries.is_empty());
    }

    #[test]
    fn test_html_page_is_not_a_feed() {
        let feed = decode("<html><body><p>Service Unavailable</p></body></html>");
        assert!(feed.malformed.unwrap().contains("not a syndication feed"));
        assert!(feed.entries.is_empty());
    }
}
