use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::storage::{utc_now_string, Dialect, KeyGen, Post};

/// Syndication-dialect titles longer than this are dropped
pub const MAX_TITLE_CHARS: usize = 150;

/// Errors from parsing a fetched feed document
#[derive(Debug, Error)]
pub enum ParseError {
    /// Document could not be deserialized against the dialect's schema
    #[error("Malformed feed document: {0}")]
    Xml(#[from] quick_xml::DeError),
}

/// A normalized feed document: its display title plus posts in document order
#[derive(Debug)]
pub struct ParsedFeed {
    pub feed_name: String,
    pub posts: Vec<Post>,
}

// ============================================================================
// Dialect Document Schemas
// ============================================================================

#[derive(Debug, Deserialize)]
struct SyndicationDoc {
    channel: SyndicationChannel,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SyndicationChannel {
    title: String,
    #[serde(rename = "item")]
    items: Vec<SyndicationItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SyndicationItem {
    title: String,
    link: String,
    #[serde(rename = "pubDate")]
    pub_date: String,
    description: String,
    #[serde(rename = "content:encoded", alias = "encoded")]
    content: String,
    #[serde(rename = "category")]
    categories: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VideoFeedDoc {
    title: String,
    #[serde(rename = "entry")]
    entries: Vec<VideoEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VideoEntry {
    title: String,
    published: String,
    link: VideoLink,
    #[serde(rename = "media:group", alias = "group")]
    media_group: VideoMediaGroup,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VideoLink {
    #[serde(rename = "@href")]
    href: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VideoMediaGroup {
    #[serde(rename = "media:description", alias = "description")]
    description: String,
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a fetched document into normalized posts per the source's dialect.
///
/// Posts come out in document order. Each gets a fresh round-scoped key from
/// `keys` so later stages can correlate results without relying on position.
pub fn parse_document(dialect: Dialect, body: &str, keys: &KeyGen) -> Result<ParsedFeed, ParseError> {
    match dialect {
        Dialect::Syndication => parse_syndication(body, keys),
        Dialect::VideoPlatform => parse_video(body, keys),
    }
}

fn parse_syndication(body: &str, keys: &KeyGen) -> Result<ParsedFeed, ParseError> {
    let doc: SyndicationDoc = quick_xml::de::from_str(body)?;

    let mut posts = Vec::with_capacity(doc.channel.items.len());
    for item in doc.channel.items {
        // Oversized titles are almost always scraped junk; drop the whole item
        if item.title.chars().count() > MAX_TITLE_CHARS {
            continue;
        }
        posts.push(Post {
            key: keys.next_key(),
            title: item.title,
            pub_date: normalize_syndication_date(&item.pub_date),
            link: item.link,
            description: item.description,
            content: item.content,
            categories: item.categories,
            media_ids: Vec::new(),
        });
    }

    Ok(ParsedFeed {
        feed_name: doc.channel.title,
        posts,
    })
}

fn parse_video(body: &str, keys: &KeyGen) -> Result<ParsedFeed, ParseError> {
    let doc: VideoFeedDoc = quick_xml::de::from_str(body)?;

    let posts = doc
        .entries
        .into_iter()
        .map(|entry| Post {
            key: keys.next_key(),
            title: entry.title,
            pub_date: normalize_video_date(&entry.published),
            link: entry.link.href,
            description: entry.media_group.description,
            content: String::new(),
            categories: Vec::new(),
            media_ids: Vec::new(),
        })
        .collect();

    Ok(ParsedFeed {
        feed_name: doc.title,
        posts,
    })
}

// ============================================================================
// Date Normalization
// ============================================================================

/// Offset-numeric forms tried in order before falling back to RFC 2822
/// (which resolves named zones like "MST")
const SYNDICATION_DATE_FORMATS: &[&str] =
    &["%a, %d %b %Y %H:%M:%S %z", "%a, %e %b %Y %H:%M:%S %z"];

fn normalize_syndication_date(raw: &str) -> String {
    for format in SYNDICATION_DATE_FORMATS {
        if let Ok(date) = DateTime::parse_from_str(raw, format) {
            return to_store_utc(date);
        }
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
        return to_store_utc(date);
    }
    tracing::debug!(date = raw, "Unparseable publish date, substituting current time");
    utc_now_string()
}

fn normalize_video_date(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(date) => to_store_utc(date),
        Err(_) => {
            tracing::debug!(date = raw, "Unparseable publish date, substituting current time");
            utc_now_string()
        }
    }
}

fn to_store_utc(date: DateTime<FixedOffset>) -> String {
    date.with_timezone(&Utc)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn keys() -> KeyGen {
        KeyGen::default()
    }

    const PILOT_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
<channel>
    <title>Example Show Blog</title>
    <item>
        <title>Pilot Episode</title>
        <link>http://x/1</link>
        <pubDate>Mon, 02 Jan 2006 15:04:05 +0000</pubDate>
        <description>First impressions</description>
        <content:encoded><![CDATA[<p>Full review body</p>]]></content:encoded>
        <category>Comedy</category>
        <category>Episodic</category>
    </item>
</channel></rss>"#;

    #[test]
    fn test_syndication_pilot_episode() {
        let parsed = parse_document(Dialect::Syndication, PILOT_RSS, &keys()).unwrap();
        assert_eq!(parsed.feed_name, "Example Show Blog");
        assert_eq!(parsed.posts.len(), 1);

        let post = &parsed.posts[0];
        assert_eq!(post.title, "Pilot Episode");
        assert_eq!(post.pub_date, "2006-01-02 15:04:05");
        assert_eq!(post.link, "http://x/1");
        assert_eq!(post.description, "First impressions");
        assert_eq!(post.content, "<p>Full review body</p>");
        assert_eq!(post.categories, vec!["Comedy", "Episodic"]);
        assert!(post.media_ids.is_empty());
    }

    #[test]
    fn test_syndication_offset_converted_to_utc() {
        let rss = PILOT_RSS.replace("+0000", "-0700");
        let parsed = parse_document(Dialect::Syndication, &rss, &keys()).unwrap();
        assert_eq!(parsed.posts[0].pub_date, "2006-01-02 22:04:05");
    }

    #[test]
    fn test_syndication_single_digit_day() {
        let rss = PILOT_RSS.replace("Mon, 02 Jan 2006", "Mon, 2 Jan 2006");
        let parsed = parse_document(Dialect::Syndication, &rss, &keys()).unwrap();
        assert_eq!(parsed.posts[0].pub_date, "2006-01-02 15:04:05");
    }

    #[test]
    fn test_syndication_named_zone() {
        let rss = PILOT_RSS.replace("15:04:05 +0000", "15:04:05 MST");
        let parsed = parse_document(Dialect::Syndication, &rss, &keys()).unwrap();
        // MST is UTC-7
        assert_eq!(parsed.posts[0].pub_date, "2006-01-02 22:04:05");
    }

    #[test]
    fn test_syndication_unparseable_date_falls_back_to_now() {
        let rss = PILOT_RSS.replace("Mon, 02 Jan 2006 15:04:05 +0000", "yesterday-ish");
        let parsed = parse_document(Dialect::Syndication, &rss, &keys()).unwrap();
        // Normalization never fails outward: the fallback is still a valid
        // store timestamp
        assert!(chrono::NaiveDateTime::parse_from_str(
            &parsed.posts[0].pub_date,
            "%Y-%m-%d %H:%M:%S"
        )
        .is_ok());
    }

    #[test]
    fn test_syndication_oversized_title_dropped() {
        let long_title = "x".repeat(MAX_TITLE_CHARS + 1);
        let rss = PILOT_RSS.replace("Pilot Episode", &long_title);
        let parsed = parse_document(Dialect::Syndication, &rss, &keys()).unwrap();
        assert!(parsed.posts.is_empty());
    }

    #[test]
    fn test_syndication_title_at_limit_kept() {
        let title = "x".repeat(MAX_TITLE_CHARS);
        let rss = PILOT_RSS.replace("Pilot Episode", &title);
        let parsed = parse_document(Dialect::Syndication, &rss, &keys()).unwrap();
        assert_eq!(parsed.posts.len(), 1);
    }

    #[test]
    fn test_syndication_preserves_document_order() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Ordered</title>
    <item><title>First</title><link>http://x/1</link></item>
    <item><title>Second</title><link>http://x/2</link></item>
    <item><title>Third</title><link>http://x/3</link></item>
</channel></rss>"#;
        let parsed = parse_document(Dialect::Syndication, rss, &keys()).unwrap();
        let titles: Vec<_> = parsed.posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_posts_get_distinct_keys() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Keys</title>
    <item><title>A</title><link>http://x/1</link></item>
    <item><title>B</title><link>http://x/2</link></item>
</channel></rss>"#;
        let parsed = parse_document(Dialect::Syndication, rss, &keys()).unwrap();
        assert_ne!(parsed.posts[0].key, parsed.posts[1].key);
    }

    #[test]
    fn test_malformed_document_is_error() {
        let result = parse_document(Dialect::Syndication, "<not really xml", &keys());
        assert!(matches!(result, Err(ParseError::Xml(_))));
    }

    const VIDEO_FEED: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
    <title>Example Channel</title>
    <entry>
        <title>Episode 12 is out</title>
        <published>2006-01-02T15:04:05-07:00</published>
        <link rel="alternate" href="http://v/watch?v=abc123"/>
        <media:group>
            <media:description>Watch episode twelve now</media:description>
        </media:group>
    </entry>
</feed>"#;

    #[test]
    fn test_video_entry_normalized() {
        let parsed = parse_document(Dialect::VideoPlatform, VIDEO_FEED, &keys()).unwrap();
        assert_eq!(parsed.feed_name, "Example Channel");
        assert_eq!(parsed.posts.len(), 1);

        let post = &parsed.posts[0];
        assert_eq!(post.title, "Episode 12 is out");
        assert_eq!(post.pub_date, "2006-01-02 22:04:05");
        assert_eq!(post.link, "http://v/watch?v=abc123");
        assert_eq!(post.description, "Watch episode twelve now");
        // No content body or categories under the video dialect
        assert!(post.content.is_empty());
        assert!(post.categories.is_empty());
    }

    #[test]
    fn test_video_no_title_length_filter() {
        let long_title = "y".repeat(MAX_TITLE_CHARS + 50);
        let feed = VIDEO_FEED.replace("Episode 12 is out", &long_title);
        let parsed = parse_document(Dialect::VideoPlatform, &feed, &keys()).unwrap();
        assert_eq!(parsed.posts.len(), 1);
    }

    #[test]
    fn test_video_unparseable_date_falls_back_to_now() {
        let feed = VIDEO_FEED.replace("2006-01-02T15:04:05-07:00", "last tuesday");
        let parsed = parse_document(Dialect::VideoPlatform, &feed, &keys()).unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(
            &parsed.posts[0].pub_date,
            "%Y-%m-%d %H:%M:%S"
        )
        .is_ok());
    }
}
