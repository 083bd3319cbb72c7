//! Best-effort date normalization.
//!
//! Feeds in the wild carry dates in many shapes: RFC-2822 (`pubDate`),
//! RFC-3339 (`dc:date`, Atom), bare ISO strings without a zone, slash
//! separated Japanese dates and relative phrases such as `3 時間前`.
//! Everything is reduced to a UTC timestamp.
//!
//! Resolution order for one entry:
//! 1. structured timestamps already parsed by the decoder (published, updated, created)
//! 2. the raw strings of the same fields, parsed permissively
//! 3. "now", reported as [`DateResolution::DefaultedToNow`]
//!
//! The fallback keeps undated articles instead of dropping them; they sort
//! as the newest items of the run.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// How a publish time was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateResolution {
    /// A real date was found in the entry.
    Parsed(DateTime<Utc>),
    /// Nothing usable was found; the value is the time of resolution.
    DefaultedToNow(DateTime<Utc>),
}

impl DateResolution {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DateResolution::Parsed(ts) | DateResolution::DefaultedToNow(ts) => *ts,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, DateResolution::DefaultedToNow(_))
    }
}

/// Resolve a publish time from candidate fields given in priority order.
///
/// `structured` holds timestamps the decoder could already parse strictly;
/// `text` holds the raw strings of the same fields.
pub fn resolve<'a>(
    structured: impl IntoIterator<Item = Option<DateTime<Utc>>>,
    text: impl IntoIterator<Item = Option<&'a str>>,
    now: DateTime<Utc>,
) -> DateResolution {
    if let Some(ts) = structured.into_iter().flatten().next() {
        return DateResolution::Parsed(ts);
    }

    text.into_iter()
        .flatten()
        .find_map(|raw| parse_permissive(raw, now))
        .map(DateResolution::Parsed)
        .unwrap_or(DateResolution::DefaultedToNow(now))
}

/// Strict parse used by the decoder: RFC-2822 or RFC-3339 only.
pub fn parse_strict(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y/%m/%d %H:%M:%S%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%a, %d %b %Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Named zones seen in Japanese feeds that RFC-2822 parsing rejects.
const ZONE_ABBREVIATIONS: &[(&str, &str)] = &[("JST", "+0900"), ("KST", "+0900"), ("UTC", "+0000")];

static ABSOLUTE_YMD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})[/年.\-](\d{1,2})[/月.\-](\d{1,2})").expect("valid regex"));

// Not part of a longer `M/D/Y` run.
static ABSOLUTE_MD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\d/])(\d{1,2})[/月](\d{1,2})日?(?:$|[^\d/])").expect("valid regex")
});

/// Relative phrases, ordered from the smallest unit up.
static RELATIVE: Lazy<Vec<(Regex, i64)>> = Lazy::new(|| {
    [
        (r"(\d+)\s*秒前", 1),
        (r"(\d+)\s*分前", 60),
        (r"(\d+)\s*時間前", 60 * 60),
        (r"(\d+)\s*日前", 24 * 60 * 60),
        (r"(\d+)\s*週間前", 7 * 24 * 60 * 60),
        (r"(\d+)\s*[かヶカケ]月前", 30 * 24 * 60 * 60),
        (r"(\d+)\s*年前", 365 * 24 * 60 * 60),
    ]
    .into_iter()
    .map(|(pattern, unit)| (Regex::new(pattern).expect("valid regex"), unit))
    .collect()
});

/// Permissive parse of a free-form date string. Never panics.
///
/// Zone-less values are taken as UTC. `M/D` and `M月D日` assume the year of
/// `now`; relative phrases are subtracted from `now`.
pub fn parse_permissive(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(ts) = parse_strict(raw) {
        return Some(ts);
    }

    for (abbreviation, offset) in ZONE_ABBREVIATIONS {
        if let Some(head) = raw.strip_suffix(abbreviation) {
            let rewritten = format!("{} {}", head.trim_end(), offset);
            if let Some(ts) = parse_strict(&rewritten) {
                return Some(ts);
            }
        }
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    // A trailing `Z` without seconds is not RFC-3339; read the rest as UTC.
    let zoneless = raw.strip_suffix(['Z', 'z']).unwrap_or(raw);
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(zoneless, format) {
            return Some(naive.and_utc());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    parse_japanese(raw, now)
}

/// Japanese absolute (`2024/12/15`, `2024年12月15日`, `12月15日`) and
/// relative (`3 時間前`, `2 か月前`) phrases.
pub fn parse_japanese(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(caps) = ABSOLUTE_YMD.captures(raw) {
        if let Some(ts) = ymd_to_utc(&caps[1], &caps[2], &caps[3]) {
            return Some(ts);
        }
    }

    if let Some(caps) = ABSOLUTE_MD.captures(raw) {
        if let Some(ts) = ymd_to_utc(&now.year().to_string(), &caps[1], &caps[2]) {
            return Some(ts);
        }
    }

    for (pattern, unit_seconds) in RELATIVE.iter() {
        if let Some(caps) = pattern.captures(raw) {
            let delta = caps[1]
                .parse::<i64>()
                .ok()
                .and_then(|n| n.checked_mul(*unit_seconds))
                .and_then(TimeDelta::try_seconds);
            if let Some(ts) = delta.and_then(|d| now.checked_sub_signed(d)) {
                return Some(ts);
            }
        }
    }

    None
}

fn ymd_to_utc(year: &str, month: &str, day: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}
