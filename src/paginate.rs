//! Pagination of item sequences into fixed-size HTML pages.
//!
//! Items are stably sorted newest-first and partitioned into consecutive
//! pages of exactly `per_page` items (the final page takes the remainder).
//! Each page carries enough date-range metadata to render prev/next
//! navigation with human-readable ranges without re-scanning neighbouring
//! pages: the whole feed's first-page and last-page ranges, the preceding
//! page's range, and the following page's first/last dates.

use crate::feed::FeedItem;
use crate::renderer::PageRenderer;
use chrono::{DateTime, FixedOffset};
use std::path::Path;

/// Human-readable date format used in page navigation, e.g. `2 January 2006`.
const RANGE_FORMAT: &str = "%-d %B %Y";

fn range_date(date: DateTime<FixedOffset>) -> String {
    date.format(RANGE_FORMAT).to_string()
}

/// Cross-page navigation metadata for a single rendered page.
#[derive(Debug, Clone, Default)]
pub struct PageVars {
    /// 1-based page number.
    pub page: usize,
    pub page_count: usize,
    /// URL prefix for sibling page links, e.g. `<base>/index-`.
    pub link_prefix: String,
    pub first_page_start: String,
    pub first_page_end: String,
    pub last_page_start: String,
    pub last_page_end: String,
    pub prev_page_start: Option<String>,
    pub prev_page_end: Option<String>,
    pub next_page_start: Option<String>,
    pub next_page_end: Option<String>,
}

/// Sort, partition, and render a feed into `<prefix>-<n>.html` pages under
/// `site_root`. Returns the number of pages written; an empty feed writes
/// nothing.
pub fn write_list_html(
    mut items: Vec<FeedItem>,
    filename_prefix: &str,
    title: &str,
    site_root: &Path,
    base_url: &str,
    per_page: usize,
    renderer: &dyn PageRenderer,
) -> std::io::Result<usize> {
    if items.is_empty() {
        return Ok(0);
    }
    items.sort_by(|a, b| b.published_at().cmp(&a.published_at()));

    let page_count = items.len().div_ceil(per_page);
    let first_page_start = range_date(items[0].published_at());
    let first_page_end = range_date(items[(per_page - 1).min(items.len() - 1)].published_at());
    let last_page_start = range_date(items[(page_count - 1) * per_page].published_at());
    let last_page_end = range_date(items[items.len() - 1].published_at());
    let link_prefix = format!(
        "{}/{}-",
        base_url.trim_end_matches('/'),
        filename_prefix
    );

    let chunks: Vec<&[FeedItem]> = items.chunks(per_page).collect();
    let mut prev_range: Option<(String, String)> = None;
    for (index, chunk) in chunks.iter().enumerate() {
        let next_range = chunks.get(index + 1).map(|next| {
            (
                range_date(next[0].published_at()),
                range_date(next[next.len() - 1].published_at()),
            )
        });
        let vars = PageVars {
            page: index + 1,
            page_count,
            link_prefix: link_prefix.clone(),
            first_page_start: first_page_start.clone(),
            first_page_end: first_page_end.clone(),
            last_page_start: last_page_start.clone(),
            last_page_end: last_page_end.clone(),
            prev_page_start: prev_range.as_ref().map(|r| r.0.clone()),
            prev_page_end: prev_range.as_ref().map(|r| r.1.clone()),
            next_page_start: next_range.as_ref().map(|r| r.0.clone()),
            next_page_end: next_range.as_ref().map(|r| r.1.clone()),
        };
        let html = renderer.render_list(chunk, title, &vars);
        let target = site_root.join(format!("{}-{}.html", filename_prefix, index + 1));
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, html)?;
        prev_range = Some((
            range_date(chunk[0].published_at()),
            range_date(chunk[chunk.len() - 1].published_at()),
        ));
    }
    Ok(page_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::MaudRenderer;
    use chrono::TimeZone;

    fn item(n: u32) -> FeedItem {
        // Item n is created on day n of January 2021, so higher n is newer.
        let date = chrono::FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2021, 1, n, 12, 0, 0)
            .unwrap();
        FeedItem {
            title: format!("post-{n}"),
            description: "d".to_string(),
            pub_date: date.to_rfc2822(),
            guid: format!("https://example.com/blog/posts/article/p{n}.html"),
            post_type: "article".to_string(),
            tags: vec![],
        }
    }

    fn renderer() -> MaudRenderer {
        MaudRenderer::new(crate::config::SiteConfig::default())
    }

    #[test]
    fn forty_five_items_make_three_pages() {
        let tmp = tempfile::TempDir::new().unwrap();
        let items: Vec<FeedItem> = (1..=31).chain(1..=14).map(item).collect();
        assert_eq!(items.len(), 45);
        let pages = write_list_html(
            items,
            "index",
            "Journal",
            tmp.path(),
            "https://example.com/blog/",
            20,
            &renderer(),
        )
        .unwrap();
        assert_eq!(pages, 3);
        for n in 1..=3 {
            assert!(tmp.path().join(format!("index-{n}.html")).exists());
        }
        assert!(!tmp.path().join("index-4.html").exists());

        // Page 1 holds the 20 newest; page boundaries respect global order.
        let page1 = std::fs::read_to_string(tmp.path().join("index-1.html")).unwrap();
        let page2 = std::fs::read_to_string(tmp.path().join("index-2.html")).unwrap();
        let page3 = std::fs::read_to_string(tmp.path().join("index-3.html")).unwrap();
        assert!(page1.contains("post-31"));
        assert!(!page2.contains("post-31"));
        assert_eq!(page3.matches("class=\"entry\"").count(), 5);
        assert_eq!(page1.matches("class=\"entry\"").count(), 20);
        assert_eq!(page2.matches("class=\"entry\"").count(), 20);
    }

    #[test]
    fn empty_feed_writes_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pages = write_list_html(
            vec![],
            "index",
            "Journal",
            tmp.path(),
            "https://example.com/",
            20,
            &renderer(),
        )
        .unwrap();
        assert_eq!(pages, 0);
        assert!(!tmp.path().join("index-1.html").exists());
    }

    #[test]
    fn single_page_ranges_cover_whole_feed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let items: Vec<FeedItem> = (1..=3).map(item).collect();
        write_list_html(
            items,
            "index",
            "Journal",
            tmp.path(),
            "https://example.com/",
            20,
            &renderer(),
        )
        .unwrap();
        let html = std::fs::read_to_string(tmp.path().join("index-1.html")).unwrap();
        assert!(html.contains("3 January 2021"));
        assert!(html.contains("1 January 2021"));
    }

    #[test]
    fn middle_page_links_both_neighbours() {
        let tmp = tempfile::TempDir::new().unwrap();
        let items: Vec<FeedItem> = (1..=9).map(item).collect();
        write_list_html(
            items,
            "index",
            "Journal",
            tmp.path(),
            "https://example.com/blog/",
            3,
            &renderer(),
        )
        .unwrap();
        let page2 = std::fs::read_to_string(tmp.path().join("index-2.html")).unwrap();
        assert!(page2.contains("https://example.com/blog/index-1.html"));
        assert!(page2.contains("https://example.com/blog/index-3.html"));
        // Prev page (newest three: 9..7), next page (oldest three: 3..1).
        assert!(page2.contains("9 January 2021"));
        assert!(page2.contains("1 January 2021"));
    }

    #[test]
    fn tag_prefix_creates_subdirectory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let items: Vec<FeedItem> = (1..=2).map(item).collect();
        write_list_html(
            items,
            "tag/rust",
            "Tag: rust",
            tmp.path(),
            "https://example.com/",
            20,
            &renderer(),
        )
        .unwrap();
        assert!(tmp.path().join("tag/rust-1.html").exists());
    }
}
