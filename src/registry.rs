//! The publication registry.
//!
//! The canonical map of published items, keyed by permalink. It backs both
//! master feeds, the master paginated index, the homepage latest-post
//! snippet, and the embeddable tag snippets. Between runs it persists as
//! the uncapped archive feed (`all-rss.xml`); incremental runs reload it
//! from there before applying the change set.

use crate::config::SiteConfig;
use crate::feed::{self, Feed, FeedError, FeedItem};
use crate::frontmatter::PostKind;
use crate::paginate;
use crate::renderer::PageRenderer;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Uncapped archive feed — the registry's persistent form.
pub const ARCHIVE_FEED: &str = "all-rss.xml";
/// Recency-capped public feed.
pub const PUBLIC_FEED: &str = "rss.xml";
/// Homepage file carrying the latest-post splice markers.
pub const WELCOME_PAGE: &str = "posts/page/welcome.html";
pub const LATEST_START: &str = "<!-- latest-post:start -->";
pub const LATEST_END: &str = "<!-- latest-post:end -->";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Feed(#[from] FeedError),
}

#[derive(Default)]
pub struct PublicationRegistry {
    entries: HashMap<String, FeedItem>,
}

impl PublicationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reload registry state from the persisted archive feed. A missing
    /// archive yields an empty registry (first run, or full rebuild).
    pub fn load(site_root: &Path) -> Result<Self, RegistryError> {
        let archive = feed::read_feed(&site_root.join(ARCHIVE_FEED))?;
        let entries = archive
            .channel
            .items
            .into_iter()
            .map(|item| (item.guid.clone(), item))
            .collect();
        Ok(Self { entries })
    }

    /// Replace any prior entry for the same permalink. Last write wins.
    pub fn upsert(&mut self, item: FeedItem) {
        self.entries.insert(item.guid.clone(), item);
    }

    pub fn remove(&mut self, link: &str) {
        self.entries.remove(link);
    }

    pub fn contains(&self, link: &str) -> bool {
        self.entries.contains_key(link)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recently created non-indieweb entry, if any. Deterministic:
    /// maximum by publication date, permalink as the tie-break.
    pub fn latest_non_indieweb(&self) -> Option<&FeedItem> {
        self.entries
            .values()
            .filter(|item| item.kind() != Some(PostKind::Indieweb))
            .max_by(|a, b| {
                a.published_at()
                    .cmp(&b.published_at())
                    .then_with(|| a.guid.cmp(&b.guid))
            })
    }

    /// Persist both master feeds and regenerate the master index, homepage
    /// snippet, and configured tag snippet fragments.
    pub fn rebuild(
        &self,
        site_root: &Path,
        config: &SiteConfig,
        renderer: &dyn PageRenderer,
    ) -> Result<(), RegistryError> {
        let mut items: Vec<FeedItem> = self.entries.values().cloned().collect();
        items.sort_by(|a, b| {
            b.published_at()
                .cmp(&a.published_at())
                .then_with(|| a.guid.cmp(&b.guid))
        });

        let base = config.base_url.trim_end_matches('/');
        let mut archive = Feed::shell(
            &config.metadata.title,
            &config.base_url,
            &config.metadata.description,
            config,
        );
        archive.channel.items = items.clone();
        feed::write_feed(
            &mut archive,
            &site_root.join(ARCHIVE_FEED),
            &format!("{base}/{ARCHIVE_FEED}"),
        )?;

        let mut public = Feed::shell(
            &config.metadata.title,
            &config.base_url,
            &config.metadata.description,
            config,
        );
        public.channel.items = items.iter().take(config.feed_cap).cloned().collect();
        feed::write_feed(
            &mut public,
            &site_root.join(PUBLIC_FEED),
            &format!("{base}/{PUBLIC_FEED}"),
        )?;

        paginate::write_list_html(
            items.clone(),
            "index",
            &config.metadata.title,
            site_root,
            &config.base_url,
            config.per_page,
            renderer,
        )?;

        if let Some(latest) = self.latest_non_indieweb() {
            splice_latest(site_root, &renderer.render_latest(latest))?;
        }

        for tag in &config.tag_snippets {
            let lowered = tag.to_lowercase();
            let tagged: Vec<FeedItem> = items
                .iter()
                .filter(|item| item.tags.iter().any(|t| t.to_lowercase() == lowered))
                .cloned()
                .collect();
            log::info!("regenerating snippet for {tag} ({} items)", tagged.len());
            let html = renderer.render_tag_snippet(&lowered, &tagged);
            std::fs::write(site_root.join(format!("tag-snippet-{lowered}.html")), html)?;
        }
        Ok(())
    }
}

/// Splice the latest-post fragment into the homepage between the fixed
/// markers. A text substitution: the rest of the file is left byte-for-byte
/// alone, and a homepage without both markers is left untouched.
fn splice_latest(site_root: &Path, fragment: &str) -> Result<(), RegistryError> {
    let path = site_root.join(WELCOME_PAGE);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("no homepage at {} to splice latest post into", path.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let Some(start) = text.find(LATEST_START) else {
        log::warn!("homepage missing {LATEST_START} marker; skipping splice");
        return Ok(());
    };
    let Some(end) = text[start..].find(LATEST_END).map(|i| start + i) else {
        log::warn!("homepage missing {LATEST_END} marker; skipping splice");
        return Ok(());
    };
    let mut out = String::with_capacity(text.len() + fragment.len());
    out.push_str(&text[..start + LATEST_START.len()]);
    out.push('\n');
    out.push_str(fragment);
    out.push('\n');
    out.push_str(&text[end..]);
    std::fs::write(&path, out)?;
    Ok(())
}
