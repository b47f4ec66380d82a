//! Syndication: crossposting documents to external platforms.
//!
//! A document opts in per target by carrying the pending marker (`XPOST`)
//! in its front matter. When the engine processes such a document it asks
//! the [`SyndicationDispatcher`] for the crosspost, substitutes the
//! returned URL over the marker in the source file, and commits the edit
//! back through version control — the source tree is the system of record
//! for where a post has been syndicated.
//!
//! HTTP transports live behind the trait and are not part of this crate;
//! implementations own their own deadlines.

use crate::frontmatter::{ContentDocument, PENDING_MARKER, PostKind, SyndicationTarget};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyndicationError {
    #[error("crosspost to {target} failed: {reason}")]
    Failed { target: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One configured crosspost transport.
pub trait SyndicationDispatcher {
    /// Post the document to `target`, returning the resulting URL.
    fn post(
        &self,
        target: SyndicationTarget,
        doc: &ContentDocument,
    ) -> Result<String, SyndicationError>;
}

/// The status text a crosspost carries: the synopsis, plus either the
/// indieweb interaction context or the permalink.
pub fn compose_status(doc: &ContentDocument) -> String {
    let mut status = doc.synopsis.clone();
    if doc.kind == PostKind::Indieweb {
        let contexts = [
            ("In reply to", &doc.in_reply_to),
            ("Repost of", &doc.repost_of),
            ("Like of", &doc.like_of),
            ("Favourite of", &doc.favorite_of),
            ("Bookmark of", &doc.bookmark_of),
        ];
        for (label, url) in contexts {
            if !url.is_empty() {
                status.push_str("\n\n");
                status.push_str(label);
                status.push(' ');
                status.push_str(url);
            }
        }
    } else {
        status.push_str("\n\n");
        status.push_str(&doc.link);
    }
    status
}

/// Substitute the resolved URL over the pending marker in the source file.
///
/// A single-field edit: the first front matter line for the target's field
/// that carries the marker is rewritten in place; the rest of the file is
/// untouched.
pub fn write_back_link(
    source: &Path,
    target: SyndicationTarget,
    url: &str,
) -> Result<bool, SyndicationError> {
    let text = std::fs::read_to_string(source)?;
    let field = target.field_name();
    let mut replaced = false;
    let mut out = Vec::with_capacity(text.lines().count());
    for line in text.lines() {
        let trimmed = line.trim_start();
        if !replaced && trimmed.starts_with(field) && line.contains(PENDING_MARKER) {
            let indent = &line[..line.len() - trimmed.len()];
            out.push(format!("{indent}{field}: \"{url}\""));
            replaced = true;
        } else {
            out.push(line.to_string());
        }
    }
    if replaced {
        let mut joined = out.join("\n");
        if text.ends_with('\n') {
            joined.push('\n');
        }
        std::fs::write(source, joined)?;
    }
    Ok(replaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::frontmatter::parse_document;

    fn doc(text: &str, rel: &str) -> ContentDocument {
        parse_document(text, rel, &SiteConfig::default()).unwrap().0
    }

    #[test]
    fn status_for_article_appends_permalink() {
        let d = doc(
            "---\nTitle: T\nType: article\nSynopsis: the gist\n---\nB.\n",
            "posts/article/t.md",
        );
        let status = compose_status(&d);
        assert!(status.starts_with("the gist"));
        assert!(status.ends_with(&d.link));
    }

    #[test]
    fn status_for_indieweb_appends_context() {
        let d = doc(
            "---\nTitle: T\nType: indieweb\nSynopsis: neat\nbookmark-of: https://elsewhere\n---\nB.\n",
            "posts/indieweb/t.md",
        );
        let status = compose_status(&d);
        assert!(status.contains("Bookmark of https://elsewhere"));
        assert!(!status.contains(&d.link));
    }

    #[test]
    fn write_back_rewrites_only_the_marker_line() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("t.md");
        std::fs::write(
            &path,
            "---\nTitle: T\nSyndication:\n  Mastodon: XPOST\n  Bluesky: \"https://done\"\n---\nXPOST appears in the body too.\n",
        )
        .unwrap();

        let replaced =
            write_back_link(&path, SyndicationTarget::Mastodon, "https://m.social/123").unwrap();
        assert!(replaced);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("  Mastodon: \"https://m.social/123\""));
        assert!(text.contains("  Bluesky: \"https://done\""));
        assert!(text.contains("XPOST appears in the body too."));
    }

    #[test]
    fn write_back_without_marker_is_a_no_op() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("t.md");
        let original = "---\nTitle: T\nSyndication:\n  Mastodon: \"https://done\"\n---\nB.\n";
        std::fs::write(&path, original).unwrap();
        let replaced =
            write_back_link(&path, SyndicationTarget::Mastodon, "https://new").unwrap();
        assert!(!replaced);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }
}
