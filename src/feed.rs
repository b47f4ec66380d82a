//! Feed persistence.
//!
//! Every derived index the engine keeps between runs — the uncapped archive
//! feed, the capped public feed, and the per-tag chunk files — is an RSS 2.0
//! document with an Atom self-link and two custom-namespace elements per
//! item: `blog:tag` (one per tag) and `blog:type` (the post type, persisted
//! so latest-post selection stays deterministic when state is reloaded from
//! disk).
//!
//! Feeds are read whole, merged in memory, and rewritten whole. A missing
//! file is not an error: readers get a fresh shell and the caller
//! synthesizes title/link/description for it.

use crate::config::SiteConfig;
use crate::frontmatter::{ContentDocument, PostKind};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Namespace URI for the custom `blog:*` elements.
pub const BLOG_NS: &str = "urn:blogsmith:feed";
const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("feed XML error in {0}: {1}")]
    Xml(String, String),
}

/// A persisted feed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "rss")]
pub struct Feed {
    #[serde(rename = "@version", default)]
    pub version: String,
    #[serde(rename = "@xmlns:atom", default)]
    xmlns_atom: String,
    #[serde(rename = "@xmlns:blog", default)]
    xmlns_blog: String,
    pub channel: Channel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub copyright: String,
    #[serde(rename = "lastBuildDate", default)]
    pub last_build_date: String,
    #[serde(default)]
    pub generator: String,
    #[serde(rename = "webMaster", default)]
    pub web_master: String,
    #[serde(default)]
    pub ttl: String,
    #[serde(rename = "atom:link", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<AtomLink>,
    #[serde(rename = "item", default)]
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomLink {
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "@rel")]
    pub rel: String,
    #[serde(rename = "@type")]
    pub media_type: String,
}

/// A publication-ready projection of a live content document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "pubDate", default)]
    pub pub_date: String,
    /// The document's canonical link — the registry key.
    #[serde(default)]
    pub guid: String,
    #[serde(rename = "blog:type", default, skip_serializing_if = "String::is_empty")]
    pub post_type: String,
    #[serde(rename = "blog:tag", default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl FeedItem {
    /// Publication date, parsed from the persisted `pubDate`. Unparseable
    /// dates sort to the epoch rather than failing the run.
    pub fn published_at(&self) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc2822(&self.pub_date)
            .ok()
            .or_else(|| crate::frontmatter::parse_loose_date(&self.pub_date))
            .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH.fixed_offset())
    }

    pub fn kind(&self) -> Option<PostKind> {
        PostKind::parse(&self.post_type)
    }
}

impl Feed {
    /// A fresh feed shell with the given channel identity.
    pub fn shell(title: &str, link: &str, description: &str, config: &SiteConfig) -> Self {
        Self {
            version: "2.0".to_string(),
            xmlns_atom: ATOM_NS.to_string(),
            xmlns_blog: BLOG_NS.to_string(),
            channel: Channel {
                title: title.to_string(),
                link: link.to_string(),
                description: description.to_string(),
                language: config.metadata.language.clone(),
                copyright: config.metadata.copyright.clone(),
                ttl: config.metadata.ttl.to_string(),
                web_master: config.metadata.webmaster.clone(),
                generator: concat!("blogsmith ", env!("CARGO_PKG_VERSION")).to_string(),
                ..Channel::default()
            },
        }
    }

    /// True when this feed was never persisted (no channel identity yet).
    pub fn is_fresh(&self) -> bool {
        self.channel.title.is_empty()
    }
}

impl Default for Feed {
    fn default() -> Self {
        Self {
            version: "2.0".to_string(),
            xmlns_atom: ATOM_NS.to_string(),
            xmlns_blog: BLOG_NS.to_string(),
            channel: Channel::default(),
        }
    }
}

/// Project a live document into its feed item.
pub fn item_from_document(doc: &ContentDocument) -> FeedItem {
    FeedItem {
        title: doc.title.clone(),
        description: doc.synopsis.clone(),
        pub_date: doc.created.to_rfc2822(),
        guid: doc.link.clone(),
        post_type: doc.kind.as_str().to_string(),
        tags: doc.tags.clone(),
    }
}

/// Read a persisted feed. A missing file yields a fresh default shell.
pub fn read_feed(path: &Path) -> Result<Feed, FeedError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Feed::default()),
        Err(e) => return Err(e.into()),
    };
    quick_xml::de::from_str(&text)
        .map_err(|e| FeedError::Xml(path.display().to_string(), e.to_string()))
}

/// Write a feed: stamp the build date and self-link, sort items newest
/// first (stable, so equal dates keep their order), and persist.
///
/// The build date is the newest item's publication date, not the wall
/// clock, so rewriting an unchanged feed reproduces it byte for byte.
///
/// Channel identity (title/link/description) is the caller's — it was
/// either recovered from the prior file or synthesized via [`Feed::shell`].
pub fn write_feed(feed: &mut Feed, path: &Path, self_link_url: &str) -> Result<(), FeedError> {
    feed.version = "2.0".to_string();
    feed.xmlns_atom = ATOM_NS.to_string();
    feed.xmlns_blog = BLOG_NS.to_string();
    feed.channel.last_build_date = feed
        .channel
        .items
        .iter()
        .map(FeedItem::published_at)
        .max()
        .map(|date| date.to_rfc2822())
        .unwrap_or_default();
    feed.channel.self_link = Some(AtomLink {
        href: self_link_url.to_string(),
        rel: "self".to_string(),
        media_type: "application/rss+xml".to_string(),
    });
    feed.channel
        .items
        .sort_by(|a, b| b.published_at().cmp(&a.published_at()));

    let mut body = String::new();
    let mut ser = quick_xml::se::Serializer::new(&mut body);
    ser.indent(' ', 4);
    feed.serialize(ser)
        .map_err(|e| FeedError::Xml(path.display().to_string(), e.to_string()))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{body}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::parse_document;

    fn config() -> SiteConfig {
        SiteConfig::default()
    }

    fn sample_item(title: &str, guid: &str, date: &str) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            description: "desc".to_string(),
            pub_date: date.to_string(),
            guid: guid.to_string(),
            post_type: "article".to_string(),
            tags: vec!["tagone".to_string()],
        }
    }

    #[test]
    fn missing_file_yields_fresh_shell() {
        let tmp = tempfile::TempDir::new().unwrap();
        let feed = read_feed(&tmp.path().join("nope.xml")).unwrap();
        assert!(feed.is_fresh());
        assert_eq!(feed.version, "2.0");
        assert!(feed.channel.items.is_empty());
    }

    #[test]
    fn round_trips_items_and_shell() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("rss.xml");
        let mut feed = Feed::shell("My Feed", "https://example.com/", "stuff", &config());
        feed.channel.items.push(sample_item(
            "MySQL Learnings",
            "https://example.com/blog/posts/article/2021/03/mysql.html",
            "Wed, 31 Mar 2021 17:11:15 +1000",
        ));
        write_feed(&mut feed, &path, "https://example.com/rss.xml").unwrap();

        let read = read_feed(&path).unwrap();
        assert_eq!(read.channel.title, "My Feed");
        assert_eq!(read.channel.items.len(), 1);
        let item = &read.channel.items[0];
        assert_eq!(item.title, "MySQL Learnings");
        assert_eq!(item.tags, vec!["tagone"]);
        assert_eq!(item.kind(), Some(PostKind::Article));
        assert_eq!(
            item.published_at(),
            DateTime::parse_from_rfc2822("Wed, 31 Mar 2021 17:11:15 +1000").unwrap()
        );
        let self_link = read.channel.self_link.unwrap();
        assert_eq!(self_link.rel, "self");
    }

    #[test]
    fn write_sorts_newest_first() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("rss.xml");
        let mut feed = Feed::shell("F", "l", "d", &config());
        feed.channel.items.push(sample_item(
            "older",
            "g1",
            "Mon, 01 Feb 2021 00:00:00 +0000",
        ));
        feed.channel.items.push(sample_item(
            "newer",
            "g2",
            "Mon, 01 Mar 2021 00:00:00 +0000",
        ));
        write_feed(&mut feed, &path, "u").unwrap();
        let read = read_feed(&path).unwrap();
        let titles: Vec<&str> = read.channel.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["newer", "older"]);
    }

    #[test]
    fn item_projection_uses_link_as_guid() {
        let text = "---\nTitle: T\nTags: [a, b]\nCreated: 2021-03-31T17:11:15+10:00\nType: article\nSynopsis: s\n---\nB.\n";
        let (doc, _) = parse_document(text, "posts/article/t.md", &config()).unwrap();
        let item = item_from_document(&doc);
        assert_eq!(item.guid, doc.link);
        assert_eq!(item.tags, vec!["a", "b"]);
        assert_eq!(item.post_type, "article");
        assert_eq!(item.published_at(), doc.created);
    }

    #[test]
    fn unparseable_pub_date_sorts_to_epoch() {
        let item = sample_item("t", "g", "whenever");
        assert_eq!(
            item.published_at(),
            DateTime::<Utc>::UNIX_EPOCH.fixed_offset()
        );
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("rss.xml");
        std::fs::write(&path, "<rss><channel><title>x").unwrap();
        assert!(matches!(read_feed(&path), Err(FeedError::Xml(_, _))));
    }
}
