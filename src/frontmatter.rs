//! Front matter parsing and the content document model.
//!
//! A source file is a YAML front matter block fenced by `---` lines followed
//! by a markdown body. Parsing is cheap and happens fresh on every run that
//! touches a file — documents are never persisted as entities.
//!
//! ```text
//! ---
//! Title: MySQL Learnings
//! Tags: [tagone]
//! Created: 2021-03-31T17:11:15+1000
//! Type: article
//! Status: live
//! ---
//! Body markdown...
//! ```
//!
//! Defaults fill most omissions: `Created` falls back to now, `Updated` to
//! `Created`, the slug to a slugged title, the status to `live`, and the
//! type to the `posts/<type>/` segment of the source path. The permalink is
//! derived from type + creation date + slug unless `Link` overrides it, and
//! the relative link is always the permalink's suffix after `/posts`.

use crate::config::SiteConfig;
use chrono::{DateTime, FixedOffset, Local};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no front matter block in {0}")]
    MissingFrontMatter(String),
    #[error("bad front matter in {0}: {1}")]
    Yaml(String, serde_yaml::Error),
    #[error("missing required Title in {0}")]
    MissingTitle(String),
    #[error("missing Synopsis and no body to derive one from in {0}")]
    MissingSynopsis(String),
    #[error("bad type: {0}")]
    BadType(String),
    #[error("bad status: {0}")]
    BadStatus(String),
    #[error("could not get a posts link for {0}")]
    NoPostsLink(String),
}

/// Document type. Controls the permalink shape, the page template, and
/// whether the document feeds the publication registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostKind {
    Article,
    Reply,
    Indieweb,
    Tweet,
    Toot,
    Resume,
    Event,
    Page,
    Review,
}

impl PostKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "article" => Some(Self::Article),
            "reply" => Some(Self::Reply),
            "indieweb" => Some(Self::Indieweb),
            "tweet" => Some(Self::Tweet),
            "toot" => Some(Self::Toot),
            "resume" => Some(Self::Resume),
            "event" => Some(Self::Event),
            "page" => Some(Self::Page),
            "review" => Some(Self::Review),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Reply => "reply",
            Self::Indieweb => "indieweb",
            Self::Tweet => "tweet",
            Self::Toot => "toot",
            Self::Resume => "resume",
            Self::Event => "event",
            Self::Page => "page",
            Self::Review => "review",
        }
    }
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    Draft,
    #[default]
    Live,
    Retired,
}

impl Status {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "live" => Some(Self::Live),
            "retired" => Some(Self::Retired),
            _ => None,
        }
    }
}

/// Per-target syndication state as recorded in front matter.
///
/// The pending marker is the literal `XPOST`; anything else non-empty is the
/// resolved crosspost URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyndicationState {
    #[default]
    Unset,
    Pending,
    Resolved(String),
}

/// The literal a target field carries to request a crosspost.
pub const PENDING_MARKER: &str = "XPOST";

impl SyndicationState {
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::Unset,
            Some(PENDING_MARKER) => Self::Pending,
            Some(url) => Self::Resolved(url.to_string()),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Syndication targets this blog knows how to crosspost to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyndicationTarget {
    Mastodon,
    Bluesky,
}

impl SyndicationTarget {
    /// The front matter key the target's state lives under.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Mastodon => "Mastodon",
            Self::Bluesky => "Bluesky",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyndicationLinks {
    pub mastodon: SyndicationState,
    pub bluesky: SyndicationState,
}

impl SyndicationLinks {
    pub fn state(&self, target: SyndicationTarget) -> &SyndicationState {
        match target {
            SyndicationTarget::Mastodon => &self.mastodon,
            SyndicationTarget::Bluesky => &self.bluesky,
        }
    }

    /// Targets currently carrying the pending marker.
    pub fn pending(&self) -> Vec<SyndicationTarget> {
        [SyndicationTarget::Mastodon, SyndicationTarget::Bluesky]
            .into_iter()
            .filter(|t| self.state(*t).is_pending())
            .collect()
    }
}

/// A parsed content document. Ephemeral — recomputed from source on every
/// run that touches its file.
#[derive(Debug, Clone)]
pub struct ContentDocument {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub created: DateTime<FixedOffset>,
    pub updated: DateTime<FixedOffset>,
    pub kind: PostKind,
    pub status: Status,
    pub synopsis: String,
    pub slug: String,
    /// Canonical absolute URL.
    pub link: String,
    /// The link's suffix after the posts root, e.g. `/article/2021/03/foo.html`.
    pub relative_link: String,
    pub syndication: SyndicationLinks,
    pub in_reply_to: String,
    pub bookmark_of: String,
    pub like_of: String,
    pub repost_of: String,
    pub favorite_of: String,
}

impl ContentDocument {
    /// Whether this document belongs in the publication registry (and hence
    /// the master feeds). Drafts are excluded upstream of this check.
    pub fn feeds_registry(&self) -> bool {
        match self.kind {
            PostKind::Article | PostKind::Review => true,
            PostKind::Indieweb => !self.bookmark_of.is_empty() || !self.like_of.is_empty(),
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawSyndication {
    #[serde(rename = "Mastodon")]
    mastodon: Option<String>,
    #[serde(rename = "Bluesky")]
    bluesky: Option<String>,
    #[serde(rename = "Twitter")]
    _twitter: Option<String>,
    #[serde(rename = "Instagram")]
    _instagram: Option<String>,
}

/// The YAML shape of a front matter block. Field names match the on-disk
/// keys; everything is optional at this stage and validated afterwards.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawFrontMatter {
    #[serde(rename = "Id")]
    id: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Tags")]
    tags: Vec<String>,
    #[serde(rename = "Created")]
    created: Option<String>,
    #[serde(rename = "Updated")]
    updated: Option<String>,
    #[serde(rename = "Type")]
    kind: Option<String>,
    #[serde(rename = "Status")]
    status: Option<String>,
    #[serde(rename = "Synopsis")]
    synopsis: Option<String>,
    #[serde(rename = "Slug")]
    slug: Option<String>,
    #[serde(rename = "Link")]
    link: Option<String>,
    #[serde(rename = "Syndication")]
    syndication: RawSyndication,
    #[serde(rename = "in-reply-to")]
    in_reply_to: Option<String>,
    #[serde(rename = "bookmark-of")]
    bookmark_of: Option<String>,
    #[serde(rename = "favorite-of")]
    favorite_of: Option<String>,
    #[serde(rename = "repost-of")]
    repost_of: Option<String>,
    #[serde(rename = "like-of")]
    like_of: Option<String>,
}

/// Slug a tag or title: lowercase, anything outside `[a-z0-9.-]` becomes
/// `-`, runs of `-` collapse, leading/trailing `-` trimmed.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = false;
    for c in text.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}

/// Parse a date in any of the formats that have appeared in front matter
/// over the years. Returns `None` rather than guessing on garbage.
pub fn parse_loose_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S %z"] {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    // Date-only forms get midnight local time.
    for fmt in ["%Y-%m-%d", "%d %B %Y", "%d %b %Y"] {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(text, fmt) {
            let naive = date.and_hms_opt(0, 0, 0)?;
            let offset = *Local::now().offset();
            return naive.and_local_timezone(offset).single();
        }
    }
    None
}

/// Infer a missing `Type` from the `posts/<type>/` segment of the source path.
fn kind_from_path(rel_path: &str) -> Option<PostKind> {
    let normalized = rel_path.replace('\\', "/");
    let mut parts = normalized.split('/').peekable();
    while let Some(part) = parts.next() {
        if part == "posts" {
            return parts.peek().and_then(|p| PostKind::parse(p));
        }
    }
    None
}

fn join_url(base: &str, parts: &[&str]) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for part in parts {
        let part = part.trim_matches('/');
        if !part.is_empty() {
            url.push('/');
            url.push_str(part);
        }
    }
    url
}

/// Split a source file into its front matter block and markdown body.
fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix("---")?;
    let (block, body) = rest.split_once("\n---")?;
    // Drop the delimiter's own line ending from the body.
    let body = body.strip_prefix('\r').unwrap_or(body);
    let body = body.strip_prefix('\n').unwrap_or(body);
    Some((block, body))
}

/// Parse a source file's text into a document and its markdown body.
///
/// `rel_path` is the repo-relative source path; it seeds the default id and
/// the type inference. Link and relative link are derived here so the
/// change-set pre-pass can learn output targets without rendering.
pub fn parse_document(
    text: &str,
    rel_path: &str,
    config: &SiteConfig,
) -> Result<(ContentDocument, String), ParseError> {
    let (block, body) = split_front_matter(text)
        .ok_or_else(|| ParseError::MissingFrontMatter(rel_path.to_string()))?;
    let raw: RawFrontMatter = serde_yaml::from_str(block)
        .map_err(|e| ParseError::Yaml(rel_path.to_string(), e))?;

    let title = raw
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ParseError::MissingTitle(rel_path.to_string()))?;

    let created = raw
        .created
        .as_deref()
        .and_then(parse_loose_date)
        .unwrap_or_else(|| Local::now().fixed_offset());
    let updated = raw
        .updated
        .as_deref()
        .and_then(parse_loose_date)
        .unwrap_or(created);

    let kind = match raw.kind.as_deref() {
        Some(k) => PostKind::parse(k).ok_or_else(|| ParseError::BadType(k.to_string()))?,
        None => kind_from_path(rel_path)
            .ok_or_else(|| ParseError::BadType(format!("none for {rel_path}")))?,
    };
    let status = match raw.status.as_deref() {
        Some(s) => Status::parse(s).ok_or_else(|| ParseError::BadStatus(s.to_string()))?,
        None => Status::Live,
    };

    let mut slug = raw
        .slug
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(&title));
    if Path::new(&slug).extension().map(|e| e != "html").unwrap_or(true) {
        slug.push_str(".html");
    }

    let link = match raw.link.filter(|l| !l.is_empty()) {
        Some(link) => link,
        None if kind == PostKind::Page => {
            join_url(&config.base_url, &["posts", kind.as_str(), &slug])
        }
        None => {
            let month = created.format("%Y/%m").to_string();
            join_url(&config.base_url, &["posts", kind.as_str(), &month, &slug])
        }
    };
    let relative_link = link
        .split_once("/posts")
        .map(|(_, suffix)| suffix.to_string())
        .ok_or_else(|| ParseError::NoPostsLink(link.clone()))?;

    let id = raw
        .id
        .filter(|i| !i.is_empty())
        .unwrap_or_else(|| rel_path.to_string());

    let doc = ContentDocument {
        id,
        title,
        tags: raw.tags,
        created,
        updated,
        kind,
        status,
        synopsis: raw.synopsis.unwrap_or_default(),
        slug,
        link,
        relative_link,
        syndication: SyndicationLinks {
            mastodon: SyndicationState::parse(raw.syndication.mastodon.as_deref()),
            bluesky: SyndicationState::parse(raw.syndication.bluesky.as_deref()),
        },
        in_reply_to: raw.in_reply_to.unwrap_or_default(),
        bookmark_of: raw.bookmark_of.unwrap_or_default(),
        like_of: raw.like_of.unwrap_or_default(),
        repost_of: raw.repost_of.unwrap_or_default(),
        favorite_of: raw.favorite_of.unwrap_or_default(),
    };
    Ok((doc, body.to_string()))
}

/// Read and parse a source file from disk.
pub fn parse_file(
    path: &Path,
    rel_path: &str,
    config: &SiteConfig,
) -> Result<(ContentDocument, String), ParseError> {
    let text = std::fs::read_to_string(path)?;
    parse_document(&text, rel_path, config)
}

/// First words of a rendered body, for the synopsis fallback.
///
/// Takes the first paragraph's text (tags stripped) and cuts at a word
/// boundary once `width` characters are exceeded.
pub fn first_words(html: &str, width: usize) -> String {
    let para = match (html.find("<p>"), html.find("</p>")) {
        (Some(start), Some(end)) if start < end => &html[start + 3..end],
        _ => html,
    };
    let mut text = String::with_capacity(para.len());
    let mut in_tag = false;
    for c in para.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return String::new();
    }
    let mut wrapped = words[0].to_string();
    for word in &words[1..] {
        if wrapped.len() + 1 + word.len() > width {
            wrapped.push_str("...");
            return wrapped;
        }
        wrapped.push(' ');
        wrapped.push_str(word);
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SiteConfig {
        SiteConfig {
            base_url: "https://example.com/blog/".to_string(),
            ..SiteConfig::default()
        }
    }

    const BASIC: &str = "---\nTitle: MySQL Learnings\nTags: [tagone]\nCreated: 2021-03-31T17:11:15+10:00\nType: article\nStatus: live\nSynopsis: Upskilling my MySQL\n---\nBody text here.\n";

    #[test]
    fn parses_basic_document() {
        let (doc, body) = parse_document(BASIC, "posts/article/mysql.md", &config()).unwrap();
        assert_eq!(doc.title, "MySQL Learnings");
        assert_eq!(doc.tags, vec!["tagone"]);
        assert_eq!(doc.kind, PostKind::Article);
        assert_eq!(doc.status, Status::Live);
        assert_eq!(body.trim(), "Body text here.");
    }

    #[test]
    fn link_derived_from_type_date_slug() {
        let (doc, _) = parse_document(BASIC, "posts/article/mysql.md", &config()).unwrap();
        assert_eq!(
            doc.link,
            "https://example.com/blog/posts/article/2021/03/mysql-learnings.html"
        );
        assert_eq!(doc.relative_link, "/article/2021/03/mysql-learnings.html");
    }

    #[test]
    fn page_link_has_no_date_segment() {
        let text = "---\nTitle: About\nType: page\n---\nHi.\n";
        let (doc, _) = parse_document(text, "posts/page/about.md", &config()).unwrap();
        assert_eq!(doc.link, "https://example.com/blog/posts/page/about.html");
    }

    #[test]
    fn explicit_link_overrides_derivation() {
        let text =
            "---\nTitle: T\nType: article\nLink: https://example.com/blog/posts/article/x.html\n---\nB.\n";
        let (doc, _) = parse_document(text, "posts/article/t.md", &config()).unwrap();
        assert_eq!(doc.relative_link, "/article/x.html");
    }

    #[test]
    fn type_inferred_from_path() {
        let text = "---\nTitle: T\n---\nB.\n";
        let (doc, _) = parse_document(text, "posts/review/t.md", &config()).unwrap();
        assert_eq!(doc.kind, PostKind::Review);
    }

    #[test]
    fn missing_title_is_parse_error() {
        let text = "---\nTags: [a]\nType: article\n---\nB.\n";
        let err = parse_document(text, "posts/article/t.md", &config()).unwrap_err();
        assert!(matches!(err, ParseError::MissingTitle(_)));
    }

    #[test]
    fn unknown_type_is_parse_error() {
        let text = "---\nTitle: T\nType: podcast\n---\nB.\n";
        let err = parse_document(text, "posts/article/t.md", &config()).unwrap_err();
        assert!(matches!(err, ParseError::BadType(_)));
    }

    #[test]
    fn unknown_status_is_parse_error() {
        let text = "---\nTitle: T\nType: article\nStatus: hidden\n---\nB.\n";
        let err = parse_document(text, "posts/article/t.md", &config()).unwrap_err();
        assert!(matches!(err, ParseError::BadStatus(_)));
    }

    #[test]
    fn status_defaults_to_live() {
        let text = "---\nTitle: T\nType: article\n---\nB.\n";
        let (doc, _) = parse_document(text, "posts/article/t.md", &config()).unwrap();
        assert_eq!(doc.status, Status::Live);
    }

    #[test]
    fn pending_marker_detected() {
        let text = "---\nTitle: T\nType: article\nSyndication:\n  Mastodon: XPOST\n---\nB.\n";
        let (doc, _) = parse_document(text, "posts/article/t.md", &config()).unwrap();
        assert!(doc.syndication.mastodon.is_pending());
        assert_eq!(doc.syndication.pending(), vec![SyndicationTarget::Mastodon]);
    }

    #[test]
    fn resolved_syndication_url_kept() {
        let text =
            "---\nTitle: T\nType: article\nSyndication:\n  Mastodon: \"https://m.social/1\"\n---\nB.\n";
        let (doc, _) = parse_document(text, "posts/article/t.md", &config()).unwrap();
        assert_eq!(
            doc.syndication.mastodon,
            SyndicationState::Resolved("https://m.social/1".to_string())
        );
    }

    #[test]
    fn indieweb_bookmark_feeds_registry() {
        let text = "---\nTitle: T\nType: indieweb\nbookmark-of: https://elsewhere\n---\nB.\n";
        let (doc, _) = parse_document(text, "posts/indieweb/t.md", &config()).unwrap();
        assert!(doc.feeds_registry());
    }

    #[test]
    fn plain_indieweb_does_not_feed_registry() {
        let text = "---\nTitle: T\nType: indieweb\nin-reply-to: https://elsewhere\n---\nB.\n";
        let (doc, _) = parse_document(text, "posts/indieweb/t.md", &config()).unwrap();
        assert!(!doc.feeds_registry());
    }

    #[test]
    fn slugify_replaces_and_collapses() {
        assert_eq!(slugify("asdf#$324#@$"), "asdf-324");
        assert_eq!(slugify("MySQL Learnings"), "mysql-learnings");
        assert_eq!(slugify("--Already-dashed--"), "already-dashed");
        assert_eq!(slugify("v1.2 release"), "v1.2-release");
    }

    #[test]
    fn loose_dates_parse() {
        assert!(parse_loose_date("2021-03-31T17:11:15+10:00").is_some());
        assert!(parse_loose_date("2021-03-31T17:11:15+1000").is_some());
        assert!(parse_loose_date("2021-03-31 17:11:15 +1000").is_some());
        assert!(parse_loose_date("2021-03-31").is_some());
        assert!(parse_loose_date("31 March 2021").is_some());
        assert!(parse_loose_date("not a date").is_none());
    }

    #[test]
    fn first_words_cuts_at_word_boundary() {
        let html = "<p>one two three four five</p><p>later</p>";
        assert_eq!(first_words(html, 13), "one two three...");
        assert_eq!(first_words(html, 200), "one two three four five");
    }

    #[test]
    fn first_words_strips_markup() {
        let html = "<p>one <em>two</em> three</p>";
        assert_eq!(first_words(html, 200), "one two three");
    }
}
