//! Tag index management.
//!
//! During a run the manager accumulates which tags were touched and by which
//! documents; at the end, each touched tag's persisted artifacts are rebuilt
//! by a read-merge-rewrite over its chunk files:
//!
//! 1. discover existing `tag/<slug>-<n>.xml` chunks and read them all;
//! 2. keep the recovered feed shell (or synthesize one for a new tag);
//! 3. merge the run's touched documents in, keyed by GUID — the same
//!    document touched twice collapses to one item, and retired GUIDs
//!    (deleted or drafted documents) drop out;
//! 4. rewrite the chunk files bounded by the configured max items per chunk,
//!    then regenerate the tag's paginated HTML from the full current set.
//!
//! The union of a tag's chunk files therefore always equals exactly the live
//! documents currently carrying that tag.

use crate::config::SiteConfig;
use crate::feed::{self, Feed, FeedError, FeedItem};
use crate::frontmatter::{ContentDocument, slugify};
use crate::paginate;
use crate::renderer::PageRenderer;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TagError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Feed(#[from] FeedError),
}

/// Accumulates touched tags over a run and rewrites their artifacts.
#[derive(Default)]
pub struct TagIndexManager {
    /// Lowercased tag -> items touched this run, in touch order.
    touched: BTreeMap<String, Vec<FeedItem>>,
    /// GUIDs to drop from every touched tag's feed.
    retired: BTreeSet<String>,
}

impl TagIndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a live document's tags for rewrite. Safe to call more than
    /// once for the same document — the merge collapses duplicates.
    pub fn touch(&mut self, doc: &ContentDocument) {
        let item = feed::item_from_document(doc);
        for tag in &doc.tags {
            self.touched
                .entry(tag.to_lowercase())
                .or_default()
                .push(item.clone());
        }
    }

    /// Mark tags as touched without contributing items. Used by the
    /// pre-pass so a tag a document just dropped still gets rewritten.
    pub fn touch_tags_only<'a>(&mut self, tags: impl IntoIterator<Item = &'a String>) {
        for tag in tags {
            self.touched.entry(tag.to_lowercase()).or_default();
        }
    }

    /// Drop this GUID from every touched tag's feed on rewrite. Called for
    /// deleted documents and documents edited to draft.
    pub fn retire(&mut self, link: &str) {
        self.retired.insert(link.to_string());
    }

    pub fn touched_tags(&self) -> Vec<String> {
        self.touched.keys().cloned().collect()
    }

    /// Rewrite feed chunks and paginated HTML for every touched tag.
    pub fn regenerate(
        &self,
        site_root: &Path,
        config: &SiteConfig,
        renderer: &dyn PageRenderer,
    ) -> Result<(), TagError> {
        for (tag, touched_items) in &self.touched {
            self.regenerate_tag(tag, touched_items, site_root, config, renderer)?;
        }
        Ok(())
    }

    fn regenerate_tag(
        &self,
        tag: &str,
        touched_items: &[FeedItem],
        site_root: &Path,
        config: &SiteConfig,
        renderer: &dyn PageRenderer,
    ) -> Result<(), TagError> {
        let slug = slugify(tag);
        let tag_dir = site_root.join("tag");
        let chunks = discover_chunks(&tag_dir, &slug)?;

        // Read every chunk: the first recovered shell carries the channel
        // identity, items accumulate across all of them.
        let mut shell: Option<Feed> = None;
        let mut items: Vec<FeedItem> = Vec::new();
        for (_, path) in &chunks {
            let feed = feed::read_feed(path)?;
            items.extend(feed.channel.items.iter().cloned());
            if shell.is_none() && !feed.is_fresh() {
                shell = Some(feed);
            }
        }
        let shell = shell.unwrap_or_else(|| {
            let link = format!(
                "{}/tag/{}-1.xml",
                config.base_url.trim_end_matches('/'),
                slug
            );
            Feed::shell(
                &format!("{} Tagged {}", config.metadata.title, tag),
                &link,
                &format!("A feed of posts containing the tag '{tag}'"),
                config,
            )
        });

        // Merge by GUID: touched documents replace their prior items,
        // retired GUIDs drop out.
        let mut index: HashMap<String, usize> = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.guid.clone(), i))
            .collect();
        for item in touched_items {
            match index.get(&item.guid) {
                Some(&i) => items[i] = item.clone(),
                None => {
                    index.insert(item.guid.clone(), items.len());
                    items.push(item.clone());
                }
            }
        }
        items.retain(|item| !self.retired.contains(&item.guid));
        items.sort_by(|a, b| b.published_at().cmp(&a.published_at()));

        // Rewrite chunk files, newest chunk first, then drop any surplus
        // chunks a shrinking tag leaves behind.
        let chunk_count = items.len().div_ceil(config.chunk_size).max(1);
        let mut slices = items.chunks(config.chunk_size);
        for number in 1..=chunk_count {
            let slice = slices.next().unwrap_or(&[]);
            let path = tag_dir.join(format!("{slug}-{number}.xml"));
            let self_link = format!(
                "{}/tag/{}-{}.xml",
                config.base_url.trim_end_matches('/'),
                slug,
                number
            );
            let mut feed = shell.clone();
            feed.channel.items = slice.to_vec();
            feed::write_feed(&mut feed, &path, &self_link)?;
        }
        for (number, path) in &chunks {
            if *number > chunk_count {
                std::fs::remove_file(path)?;
            }
        }

        paginate::write_list_html(
            items,
            &format!("tag/{slug}"),
            &format!("Tag: {tag}"),
            site_root,
            &config.base_url,
            config.per_page,
            renderer,
        )?;
        Ok(())
    }
}

/// Existing chunk files for a slug, in numeric order.
fn discover_chunks(tag_dir: &Path, slug: &str) -> std::io::Result<Vec<(usize, PathBuf)>> {
    let mut chunks = Vec::new();
    let entries = match std::fs::read_dir(tag_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(chunks),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(stem) = name.strip_suffix(".xml") else { continue };
        let Some((prefix, number)) = stem.rsplit_once('-') else { continue };
        if prefix != slug {
            continue;
        }
        if let Ok(number) = number.parse::<usize>() {
            chunks.push((number, entry.path()));
        }
    }
    chunks.sort();
    Ok(chunks)
}
