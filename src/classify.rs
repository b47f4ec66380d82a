//! Path classification and media handling.
//!
//! Every changed path routes one of three ways: `.md` files are content
//! documents, files under `media/` that look like media get byte-copied into
//! the published tree, and everything else is checked against a small
//! allow-list of harmless extensions — anything outside it that also fails
//! content sniffing is an unknown file, reported and skipped.
//!
//! Sniffing reads the first 512 bytes and matches magic numbers, the same
//! families the blog has always accepted: image, audio, video, zip, pdf,
//! ogg, plus `.svg` served as text and the `.htaccess` special case.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown file type: {0}")]
    UnknownFile(String),
}

/// Where a changed path routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    ContentDocument,
    MediaAsset,
    Unknown,
}

/// Extensions that are fine to leave unpublished without complaint.
const BENIGN_EXTENSIONS: &[&str] = &["m4v", "xcf", "html", "txt", "json"];

/// Route a repo-relative path. `repo_root` is needed because media routing
/// sniffs file content, not just the name.
pub fn classify(rel_path: &str, repo_root: &Path) -> PathKind {
    if rel_path.ends_with(".md") {
        return PathKind::ContentDocument;
    }
    let under_media = rel_path.starts_with("media/") || rel_path.starts_with("/media");
    if under_media {
        let full = repo_root.join(rel_path.trim_start_matches('/'));
        let sniffed = sniff_kind(&full).ok().flatten().is_some();
        if sniffed || rel_path.ends_with(".mov") {
            return PathKind::MediaAsset;
        }
    }
    PathKind::Unknown
}

/// Byte-copy a media asset into the published tree, creating parents.
pub fn process_media_asset(
    rel_path: &str,
    repo_root: &Path,
    site_root: &Path,
) -> std::io::Result<()> {
    let source = repo_root.join(rel_path.trim_start_matches('/'));
    let target = site_root.join(rel_path.trim_start_matches('/'));
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(&source, &target)?;
    Ok(())
}

/// Check an unclassifiable path. No processing happens either way; a path
/// that exists, is a regular file, and is neither benign nor sniffable
/// media is an [`ClassifyError::UnknownFile`].
pub fn process_unknown(rel_path: &str, repo_root: &Path) -> Result<(), ClassifyError> {
    let full = repo_root.join(rel_path.trim_start_matches('/'));
    let Ok(info) = std::fs::metadata(&full) else {
        return Ok(());
    };
    if !info.is_file() {
        return Ok(());
    }
    if rel_path.ends_with("README") {
        return Ok(());
    }
    let ext = Path::new(rel_path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if BENIGN_EXTENSIONS.contains(&ext.as_str()) {
        return Ok(());
    }
    if sniff_kind(&full)?.is_some() {
        return Ok(());
    }
    Err(ClassifyError::UnknownFile(rel_path.to_string()))
}

/// Magic-number sniff of the media family, or `None` if unrecognized.
pub fn sniff_kind(path: &Path) -> std::io::Result<Option<&'static str>> {
    if path.to_string_lossy().ends_with(".htaccess") {
        return Ok(Some("htaccess"));
    }
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut buffer = [0u8; 512];
    let read = file.read(&mut buffer)?;
    let head = &buffer[..read];
    Ok(sniff_bytes(head, path))
}

fn sniff_bytes(head: &[u8], path: &Path) -> Option<&'static str> {
    let starts = |prefix: &[u8]| head.starts_with(prefix);
    let at = |offset: usize, needle: &[u8]| {
        head.len() >= offset + needle.len() && &head[offset..offset + needle.len()] == needle
    };

    if starts(&[0xFF, 0xD8, 0xFF])
        || starts(&[0x89, b'P', b'N', b'G'])
        || starts(b"GIF8")
        || (starts(b"RIFF") && at(8, b"WEBP"))
        || starts(b"BM")
    {
        return Some("image");
    }
    if starts(b"ID3")
        || starts(&[0xFF, 0xFB])
        || starts(&[0xFF, 0xF3])
        || starts(b"fLaC")
        || (starts(b"RIFF") && at(8, b"WAVE"))
    {
        return Some("audio");
    }
    if at(4, b"ftyp") || starts(&[0x1A, 0x45, 0xDF, 0xA3]) || (starts(b"RIFF") && at(8, b"AVI "))
    {
        return Some("video");
    }
    if starts(b"OggS") {
        return Some("ogg");
    }
    if starts(b"PK\x03\x04") {
        return Some("zip");
    }
    if starts(b"%PDF") {
        return Some("pdf");
    }
    // SVG is only media when it is served as text and named .svg.
    if path.extension().is_some_and(|e| e == "svg") {
        let text = std::str::from_utf8(head).unwrap_or("");
        let trimmed = text.trim_start();
        if trimmed.starts_with("<?xml") || trimmed.starts_with("<svg") {
            return Some("image");
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn repo_with(rel: &str, bytes: &[u8]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        let full = tmp.path().join(rel);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, bytes).unwrap();
        tmp
    }

    #[test]
    fn markdown_routes_to_content() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            classify("posts/article/a.md", tmp.path()),
            PathKind::ContentDocument
        );
    }

    #[test]
    fn sniffed_image_under_media_routes_to_media() {
        let repo = repo_with("media/2021/pic.png", PNG_HEADER);
        assert_eq!(
            classify("media/2021/pic.png", repo.path()),
            PathKind::MediaAsset
        );
    }

    #[test]
    fn image_outside_media_is_unknown() {
        let repo = repo_with("posts/pic.png", PNG_HEADER);
        assert_eq!(classify("posts/pic.png", repo.path()), PathKind::Unknown);
    }

    #[test]
    fn mov_under_media_routes_by_extension() {
        let repo = repo_with("media/clip.mov", b"not sniffable");
        assert_eq!(classify("media/clip.mov", repo.path()), PathKind::MediaAsset);
    }

    #[test]
    fn media_copy_creates_parents() {
        let repo = repo_with("media/2021/03/pic.png", PNG_HEADER);
        let site = TempDir::new().unwrap();
        process_media_asset("media/2021/03/pic.png", repo.path(), site.path()).unwrap();
        assert!(site.path().join("media/2021/03/pic.png").exists());
    }

    #[test]
    fn unknown_check_passes_benign_extensions() {
        let repo = repo_with("posts/notes.txt", b"just text");
        process_unknown("posts/notes.txt", repo.path()).unwrap();
        let repo = repo_with("posts/README", b"read me");
        process_unknown("posts/README", repo.path()).unwrap();
    }

    #[test]
    fn unknown_check_passes_missing_path() {
        let tmp = TempDir::new().unwrap();
        process_unknown("posts/gone.bin", tmp.path()).unwrap();
    }

    #[test]
    fn unrecognized_file_is_unknown_error() {
        let repo = repo_with("posts/blob.bin", &[0x00, 0x01, 0x02, 0x03]);
        let err = process_unknown("posts/blob.bin", repo.path()).unwrap_err();
        assert!(matches!(err, ClassifyError::UnknownFile(_)));
    }

    #[test]
    fn sniffs_media_families() {
        let cases: &[(&str, &[u8], &str)] = &[
            ("a.jpg", &[0xFF, 0xD8, 0xFF, 0xE0], "image"),
            ("a.mp3", b"ID3\x04rest", "audio"),
            ("a.pdf", b"%PDF-1.4", "pdf"),
            ("a.zip", b"PK\x03\x04rest", "zip"),
            ("a.ogg", b"OggSrest", "ogg"),
            ("a.mp4", b"\x00\x00\x00\x20ftypisom", "video"),
        ];
        for (name, bytes, expected) in cases {
            let repo = repo_with(name, bytes);
            let kind = sniff_kind(&repo.path().join(name)).unwrap();
            assert_eq!(kind, Some(*expected), "for {name}");
        }
    }

    #[test]
    fn svg_text_sniffs_as_image() {
        let repo = repo_with("media/logo.svg", b"<?xml version=\"1.0\"?><svg></svg>");
        assert_eq!(
            sniff_kind(&repo.path().join("media/logo.svg")).unwrap(),
            Some("image")
        );
        assert_eq!(classify("media/logo.svg", repo.path()), PathKind::MediaAsset);
    }

    #[test]
    fn htaccess_is_media() {
        let repo = repo_with("media/.htaccess", b"Deny from all");
        assert_eq!(classify("media/.htaccess", repo.path()), PathKind::MediaAsset);
    }
}
