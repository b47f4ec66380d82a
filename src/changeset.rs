//! Change set resolution.
//!
//! A run's work list is a [`ChangeSet`]: six disjoint path lists keyed by
//! the version-control status letter. It comes from one of two places:
//!
//! - [`incremental_diff`] parses `--name-status` output against the upstream
//!   head (incremental runs);
//! - [`full_enumeration`] walks the `posts/` and `media/` subtrees and
//!   classifies every file as Added (bootstrap for a full rebuild).
//!
//! Paths are repo-relative with forward slashes. A path appears in at most
//! one list.

use std::path::Path;
use walkdir::WalkDir;

/// Classified changed paths, one list per `--name-status` code.
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    pub rename_edit: Vec<String>,
    pub copy_edit: Vec<String>,
    pub unmerged: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.rename_edit.is_empty()
            && self.copy_edit.is_empty()
            && self.unmerged.is_empty()
    }

    /// Every list except Deleted, in processing order. Documents under these
    /// lists are (re)rendered; Deleted paths only ever remove output.
    pub fn surviving(&self) -> impl Iterator<Item = &str> {
        self.added
            .iter()
            .chain(self.copy_edit.iter())
            .chain(self.modified.iter())
            .chain(self.rename_edit.iter())
            .chain(self.unmerged.iter())
            .map(String::as_str)
    }
}

/// Parse `git diff --name-status` output into a change set.
///
/// Lines look like `M\tposts/foo.md` or, for renames and copies,
/// `R100\told\tnew` — the last field is always the path that exists after
/// the change, which is the one worth processing. Lines with an
/// unrecognized status letter are skipped, not fatal.
pub fn incremental_diff(name_status: &str) -> ChangeSet {
    let mut changes = ChangeSet::default();
    for line in name_status.lines() {
        let mut fields = line.split('\t');
        let Some(status) = fields.next() else { continue };
        let Some(code) = status.chars().next() else { continue };
        let Some(path) = fields.next_back().map(str::trim).filter(|p| !p.is_empty()) else {
            continue;
        };
        let path = path.replace('\\', "/");
        match code {
            'M' => changes.modified.push(path),
            'C' => changes.copy_edit.push(path),
            'R' => changes.rename_edit.push(path),
            'A' => changes.added.push(path),
            'D' => changes.deleted.push(path),
            'U' => changes.unmerged.push(path),
            _ => log::debug!("skipping unrecognized diff line: {line}"),
        }
    }
    changes
}

/// Walk `media/` and `posts/` under the repository root, classifying every
/// file found as Added. Used to bootstrap a full rebuild.
pub fn full_enumeration(repo_root: &Path) -> std::io::Result<ChangeSet> {
    let mut changes = ChangeSet::default();
    for subtree in ["media", "posts"] {
        let root = repo_root.join(subtree);
        if !root.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(repo_root)
                .expect("walked path is under repo root");
            changes
                .added
                .push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(changes)
}
