//! Syndication feed access: HTTP retrieval and tolerant XML decoding.

pub mod decode;
pub mod fetch;

pub use decode::{MediaRef, ParsedFeed, RawEntry, decode};
pub use fetch::{EntryVariant, FeedFetch, FetchError, fetch_feed};
