//! Page rendering.
//!
//! [`PageRenderer`] is the seam between the regeneration engine and HTML
//! production: the engine hands it source paths, item lists, and the latest
//! post, and gets back markup to write. [`MaudRenderer`] is the shipped
//! implementation — markdown via pulldown-cmark, HTML via
//! [maud](https://maud.lambda.xyz/) so templates are compile-time checked
//! and interpolation is escaped by default.
//!
//! Page shells are keyed by the document's type: indieweb posts get their
//! reply-context lines, everything else shares the article shell. List pages
//! and the latest-post fragment have their own templates.

use crate::config::SiteConfig;
use crate::feed::FeedItem;
use crate::frontmatter::{self, ContentDocument, ParseError, PostKind};
use crate::paginate::PageVars;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Options, Parser, html as md_html};
use std::collections::BTreeMap;
use std::path::Path;

/// Width at which a derived synopsis is cut, matching the historical feeds.
const SYNOPSIS_WIDTH: usize = 310;

pub trait PageRenderer {
    /// Parse and render a source document to a full HTML page.
    fn render(&self, source: &Path, rel_path: &str)
    -> Result<(String, ContentDocument), ParseError>;
    /// Render one paginated list page (template `list`).
    fn render_list(&self, items: &[FeedItem], title: &str, vars: &PageVars) -> String;
    /// Render the homepage latest-post fragment (template `latest-article`).
    fn render_latest(&self, item: &FeedItem) -> String;
    /// Render an externally-embeddable related-tags fragment for one tag.
    fn render_tag_snippet(&self, tag: &str, items: &[FeedItem]) -> String;
}

pub struct MaudRenderer {
    config: SiteConfig,
}

impl MaudRenderer {
    pub fn new(config: SiteConfig) -> Self {
        Self { config }
    }

    fn tag_url(&self, tag: &str) -> String {
        format!(
            "{}/tag/{}-1.html",
            self.config.base_url.trim_end_matches('/'),
            frontmatter::slugify(tag)
        )
    }

    fn markdown_to_html(body: &str) -> String {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS;
        let parser = Parser::new_ext(body, options);
        let mut out = String::new();
        md_html::push_html(&mut out, parser);
        out
    }

    fn tag_list(&self, tags: &[String]) -> Markup {
        html! {
            @if !tags.is_empty() {
                ul.tags {
                    @for tag in tags {
                        li { a.p-category href=(self.tag_url(tag)) { (tag) } }
                    }
                }
            }
        }
    }

    /// Reply-context lines for indieweb posts; empty for everything else.
    fn reply_context(doc: &ContentDocument) -> Markup {
        let lines = [
            ("In reply to", "u-in-reply-to", &doc.in_reply_to),
            ("Bookmark of", "u-bookmark-of", &doc.bookmark_of),
            ("Like of", "u-like-of", &doc.like_of),
            ("Repost of", "u-repost-of", &doc.repost_of),
            ("Favourite of", "u-favorite-of", &doc.favorite_of),
        ];
        html! {
            @for (label, class, url) in lines {
                @if !url.is_empty() {
                    p.reply-context { (label) " " a class=(class) href=(url) { (url) } }
                }
            }
        }
    }

    fn base_document(title: &str, content: Markup) -> Markup {
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="UTF-8";
                    meta name="viewport" content="width=device-width, initial-scale=1.0";
                    title { (title) }
                }
                body {
                    (content)
                }
            }
        }
    }

    fn page_shell(&self, doc: &ContentDocument, content_html: &str) -> Markup {
        let created = doc.created.format("%-d %B %Y").to_string();
        let body = html! {
            article.h-entry.(format!("type-{}", doc.kind)) {
                @if doc.kind != PostKind::Page {
                    header {
                        h1.p-name { (doc.title) }
                        time.dt-published datetime=(doc.created.to_rfc3339()) { (created) }
                    }
                }
                @if doc.kind == PostKind::Indieweb { (Self::reply_context(doc)) }
                div.e-content { (PreEscaped(content_html)) }
                footer {
                    a.u-url href=(doc.link) { "Permalink" }
                    (self.tag_list(&doc.tags))
                }
            }
        };
        Self::base_document(&doc.title, body)
    }
}

impl PageRenderer for MaudRenderer {
    fn render(
        &self,
        source: &Path,
        rel_path: &str,
    ) -> Result<(String, ContentDocument), ParseError> {
        let (mut doc, body) = frontmatter::parse_file(source, rel_path, &self.config)?;
        let content_html = Self::markdown_to_html(&body);
        if doc.synopsis.is_empty() {
            doc.synopsis = frontmatter::first_words(&content_html, SYNOPSIS_WIDTH);
        }
        if doc.synopsis.is_empty() {
            return Err(ParseError::MissingSynopsis(rel_path.to_string()));
        }
        let page = self.page_shell(&doc, &content_html);
        Ok((page.into_string(), doc))
    }

    fn render_list(&self, items: &[FeedItem], title: &str, vars: &PageVars) -> String {
        let page_title = format!("{} Page {}", title, vars.page);
        let body = html! {
            h1 { (page_title) }
            nav.pagination {
                @if vars.page > 1 {
                    a href=(format!("{}1.html", vars.link_prefix)) {
                        "Newest: " (vars.first_page_start) " – " (vars.first_page_end)
                    }
                    @if let (Some(start), Some(end)) = (&vars.prev_page_start, &vars.prev_page_end) {
                        a rel="prev" href=(format!("{}{}.html", vars.link_prefix, vars.page - 1)) {
                            "Newer: " (start) " – " (end)
                        }
                    }
                }
                @if let (Some(start), Some(end)) = (&vars.next_page_start, &vars.next_page_end) {
                    a rel="next" href=(format!("{}{}.html", vars.link_prefix, vars.page + 1)) {
                        "Older: " (start) " – " (end)
                    }
                    a href=(format!("{}{}.html", vars.link_prefix, vars.page_count)) {
                        "Oldest: " (vars.last_page_start) " – " (vars.last_page_end)
                    }
                }
            }
            @for item in items {
                article.entry {
                    h2 { a.u-url href=(item.guid) { (item.title) } }
                    time.dt-published { (item.published_at().format("%-d %B %Y").to_string()) }
                    p.p-summary { (item.description) }
                    (self.tag_list(&item.tags))
                }
            }
        };
        Self::base_document(&page_title, body).into_string()
    }

    fn render_latest(&self, item: &FeedItem) -> String {
        // A fragment, not a document — it gets spliced into the homepage.
        html! {
            article.h-entry.latest-post {
                h2 { a.u-url href=(item.guid) { (item.title) } }
                time.dt-published { (item.published_at().format("%-d %B %Y").to_string()) }
                p.p-summary { (item.description) }
            }
        }
        .into_string()
    }

    fn render_tag_snippet(&self, tag: &str, items: &[FeedItem]) -> String {
        let mut related: BTreeMap<&str, Vec<&FeedItem>> = BTreeMap::new();
        for item in items {
            for other in &item.tags {
                if other != tag {
                    related.entry(other).or_default().push(item);
                }
            }
        }
        html! {
            div.tag-snippet data-tag=(tag) {
                @for (other, posts) in &related {
                    section {
                        h3 { a href=(self.tag_url(other)) { (other) } }
                        ul {
                            @for post in posts {
                                li { a href=(post.guid) { (post.title) } }
                            }
                        }
                    }
                }
            }
        }
        .into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> MaudRenderer {
        MaudRenderer::new(SiteConfig {
            base_url: "https://example.com/blog/".to_string(),
            ..SiteConfig::default()
        })
    }

    fn write_source(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn renders_article_page() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = write_source(
            tmp.path(),
            "a.md",
            "---\nTitle: Hello\nType: article\nCreated: 2021-03-31T17:11:15+10:00\nTags: [rust]\n---\nSome *body* text.\n",
        );
        let (html, doc) = renderer().render(&source, "posts/article/a.md").unwrap();
        assert!(html.contains("<h1 class=\"p-name\">Hello</h1>"));
        assert!(html.contains("<em>body</em>"));
        assert!(html.contains("https://example.com/blog/tag/rust-1.html"));
        assert_eq!(doc.synopsis, "Some body text.");
    }

    #[test]
    fn explicit_synopsis_wins_over_fallback() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = write_source(
            tmp.path(),
            "a.md",
            "---\nTitle: Hello\nType: article\nSynopsis: given\n---\nDerived would differ.\n",
        );
        let (_, doc) = renderer().render(&source, "posts/article/a.md").unwrap();
        assert_eq!(doc.synopsis, "given");
    }

    #[test]
    fn empty_body_without_synopsis_is_parse_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = write_source(tmp.path(), "a.md", "---\nTitle: Hello\nType: article\n---\n");
        let err = renderer()
            .render(&source, "posts/article/a.md")
            .unwrap_err();
        assert!(matches!(err, ParseError::MissingSynopsis(_)));
    }

    #[test]
    fn indieweb_page_carries_reply_context() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = write_source(
            tmp.path(),
            "r.md",
            "---\nTitle: Neat link\nType: indieweb\nbookmark-of: https://elsewhere/post\n---\nWorth keeping.\n",
        );
        let (html, _) = renderer().render(&source, "posts/indieweb/r.md").unwrap();
        assert!(html.contains("Bookmark of"));
        assert!(html.contains("https://elsewhere/post"));
    }

    #[test]
    fn latest_fragment_is_not_a_document() {
        let item = FeedItem {
            title: "T".to_string(),
            description: "s".to_string(),
            pub_date: "Wed, 31 Mar 2021 17:11:15 +1000".to_string(),
            guid: "https://example.com/blog/posts/article/t.html".to_string(),
            post_type: "article".to_string(),
            tags: vec![],
        };
        let html = renderer().render_latest(&item);
        assert!(!html.contains("<!DOCTYPE"));
        assert!(html.contains("latest-post"));
        assert!(html.contains("31 March 2021"));
    }

    #[test]
    fn tag_snippet_groups_by_related_tag() {
        let make = |title: &str, tags: &[&str]| FeedItem {
            title: title.to_string(),
            description: String::new(),
            pub_date: "Wed, 31 Mar 2021 17:11:15 +1000".to_string(),
            guid: format!("https://example.com/{title}"),
            post_type: "article".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        };
        let items = vec![
            make("one", &["code", "rust"]),
            make("two", &["code", "sql"]),
            make("three", &["code"]),
        ];
        let html = renderer().render_tag_snippet("code", &items);
        assert!(html.contains(">rust</a>"));
        assert!(html.contains(">sql</a>"));
        // A post tagged only with the snippet tag has no related entry.
        assert!(!html.contains(">three</a>"));
    }
}
