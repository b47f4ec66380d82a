//! The regeneration orchestrator.
//!
//! Sequences a run end to end. Two entry points share one pipeline:
//!
//! - [`Orchestrator::full_run`] enumerates the whole source tree and builds
//!   into a fresh generation directory, then atomically swaps the live
//!   pointer — a failed build never affects the published site.
//! - [`Orchestrator::incremental_run`] reloads registry state from the
//!   persisted archive feed, diffs against upstream, and rewrites only what
//!   the change set touches, in place.
//!
//! Both conclude the same way: delete outputs for deleted sources, rewrite
//! every touched tag's artifacts, and rebuild the master feeds, index,
//! homepage snippet, and configured tag snippets.
//!
//! Per-path parse/IO/syndication/unknown-file failures do not stop a run —
//! they accumulate in the [`RunReport`] and the run publishes everything
//! that succeeded. Configuration, version-control, and build-phase failures
//! abort. A filesystem lock serializes whole runs; concurrent invocations
//! would otherwise race on the feed read-merge-rewrites.

use crate::changeset::{self, ChangeSet};
use crate::classify::{self, PathKind};
use crate::config::SiteConfig;
use crate::feed::{self, FeedError};
use crate::frontmatter::{self, ContentDocument, Status};
use crate::output::{Mark, Progress};
use crate::registry::{PublicationRegistry, RegistryError};
use crate::renderer::PageRenderer;
use crate::swap::{DeploymentSwapper, PointerSwap, SwapError};
use crate::syndicate::{self, SyndicationDispatcher};
use crate::tags::{TagError, TagIndexManager};
use crate::vcs::{VcsError, VersionControl};
use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fatal run failures. Everything per-path lands in the report instead.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Vcs(#[from] VcsError),
    #[error(transparent)]
    Swap(#[from] SwapError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Tag(#[from] TagError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("another run holds the lock at {}", .0.display())]
    Locked(PathBuf),
    #[error("repository is not a directory: {}", .0.display())]
    Repository(PathBuf),
}

/// One skipped path and why.
#[derive(Debug)]
pub struct PathFailure {
    pub path: String,
    pub error: String,
}

/// What a run did, and what it could not do.
#[derive(Debug, Default)]
pub struct RunReport {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
    pub failures: Vec<PathFailure>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, path: &str, error: impl ToString) {
        log::error!("failed {path}: {}", error.to_string());
        self.failures.push(PathFailure {
            path: path.to_string(),
            error: error.to_string(),
        });
    }
}

/// Holds the advisory run lock for the lifetime of a run.
struct RunLock {
    _file: File,
}

fn acquire_lock(config: &SiteConfig) -> Result<RunLock, RunError> {
    let parent = config
        .site_root
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;
    let path = parent.join(".blogsmith.lock");
    let file = File::create(&path)?;
    file.try_lock_exclusive()
        .map_err(|_| RunError::Locked(path))?;
    Ok(RunLock { _file: file })
}

/// Mutable state threaded through one run.
struct RunState {
    site_root: PathBuf,
    registry: PublicationRegistry,
    tags: TagIndexManager,
    /// Output files to remove during finalization, relative to the site root.
    doomed: Vec<PathBuf>,
    report: RunReport,
}

pub struct Orchestrator<'a> {
    config: &'a SiteConfig,
    vcs: &'a dyn VersionControl,
    renderer: &'a dyn PageRenderer,
    dispatcher: Option<&'a dyn SyndicationDispatcher>,
    progress: Progress,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a SiteConfig,
        vcs: &'a dyn VersionControl,
        renderer: &'a dyn PageRenderer,
        dispatcher: Option<&'a dyn SyndicationDispatcher>,
        progress: Progress,
    ) -> Self {
        Self {
            config,
            vcs,
            renderer,
            dispatcher,
            progress,
        }
    }

    /// Full rebuild through an isolated generation directory and an atomic
    /// pointer swap.
    pub fn full_run(&self, pointer: Box<dyn PointerSwap>) -> Result<RunReport, RunError> {
        let _lock = acquire_lock(self.config)?;
        self.check_repository()?;
        self.progress.note("Full rebuild");

        let swapper = DeploymentSwapper::new(self.config.generations_dir.clone(), pointer);
        let generation = swapper.begin()?;

        let report = match self.build_full(generation.root()) {
            Ok(report) => report,
            Err(e) => {
                swapper.abort(generation);
                return Err(e);
            }
        };

        self.progress.note("Swapping across");
        swapper.commit(&generation, &self.config.site_root)?;
        Ok(report)
    }

    fn build_full(&self, build_root: &Path) -> Result<RunReport, RunError> {
        self.vcs.pull()?;
        let changes = changeset::full_enumeration(&self.config.repository)?;
        let mut state = RunState {
            site_root: build_root.to_path_buf(),
            registry: PublicationRegistry::new(),
            tags: TagIndexManager::new(),
            doomed: Vec::new(),
            report: count_changes(&changes),
        };
        self.collect_old_state(&changes, &mut state);
        self.process_changes(&changes, &mut state)?;
        self.finalize(&mut state)?;
        Ok(state.report)
    }

    /// Incremental regeneration over the upstream diff; writes land in place.
    pub fn incremental_run(&self) -> Result<RunReport, RunError> {
        let _lock = acquire_lock(self.config)?;
        self.check_repository()?;
        self.progress.note("Incremental");

        let mut state = RunState {
            site_root: self.config.site_root.clone(),
            registry: PublicationRegistry::load(&self.config.site_root)?,
            tags: TagIndexManager::new(),
            doomed: Vec::new(),
            report: RunReport::default(),
        };

        self.vcs.fetch()?;
        let diff = self.vcs.diff_name_status(&self.config.upstream)?;
        let changes = changeset::incremental_diff(&diff);
        state.report = count_changes(&changes);

        // Pre-pass while the working tree still holds the old versions:
        // learn the tags documents are about to drop and the outputs
        // deleted documents leave behind.
        self.collect_old_state(&changes, &mut state);

        self.vcs.pull()?;
        self.process_changes(&changes, &mut state)?;
        self.finalize(&mut state)?;
        Ok(state.report)
    }

    /// A missing repository would enumerate as an empty tree (and a full
    /// rebuild would swap an empty site live); fail before any work starts.
    fn check_repository(&self) -> Result<(), RunError> {
        if self.config.repository.is_dir() {
            Ok(())
        } else {
            Err(RunError::Repository(self.config.repository.clone()))
        }
    }

    /// Best-effort parse of pre-pull content. Old tags from every surviving
    /// changed document mark those tags touched; deleted documents yield
    /// their output path, registry key, and retired GUID.
    fn collect_old_state(&self, changes: &ChangeSet, state: &mut RunState) {
        for rel_path in changes.surviving() {
            if !rel_path.ends_with(".md") {
                continue;
            }
            let full = self.config.repository.join(rel_path);
            if let Ok((doc, _)) = frontmatter::parse_file(&full, rel_path, self.config) {
                state.tags.touch_tags_only(&doc.tags);
            }
        }
        for rel_path in &changes.deleted {
            if rel_path.ends_with(".md") {
                let full = self.config.repository.join(rel_path);
                match frontmatter::parse_file(&full, rel_path, self.config) {
                    Ok((doc, _)) => {
                        state
                            .doomed
                            .push(posts_output_path(&doc.relative_link));
                        state.registry.remove(&doc.link);
                        state.tags.touch_tags_only(&doc.tags);
                        state.tags.retire(&doc.link);
                    }
                    Err(e) => state.report.fail(rel_path, e),
                }
            } else {
                state
                    .doomed
                    .push(PathBuf::from(rel_path.trim_start_matches('/')));
            }
        }
    }

    fn process_changes(&self, changes: &ChangeSet, state: &mut RunState) -> Result<(), RunError> {
        for rel_path in changes.surviving() {
            match classify::classify(rel_path, &self.config.repository) {
                PathKind::ContentDocument => self.process_document(rel_path, state)?,
                PathKind::MediaAsset => {
                    match classify::process_media_asset(
                        rel_path,
                        &self.config.repository,
                        &state.site_root,
                    ) {
                        Ok(()) => self.progress.mark(Mark::Media),
                        Err(e) => state.report.fail(rel_path, e),
                    }
                }
                PathKind::Unknown => {
                    if let Err(e) = classify::process_unknown(rel_path, &self.config.repository) {
                        state.report.fail(rel_path, e);
                    }
                }
            }
        }
        self.progress.finish();
        Ok(())
    }

    fn process_document(&self, rel_path: &str, state: &mut RunState) -> Result<(), RunError> {
        let full = self.config.repository.join(rel_path);
        let (html, doc) = match self.renderer.render(&full, rel_path) {
            Ok(rendered) => rendered,
            Err(e) => {
                state.report.fail(rel_path, e);
                return Ok(());
            }
        };

        if doc.status == Status::Draft {
            // A document edited to draft leaves the registry and, via the
            // retired GUID, every touched tag feed.
            state.registry.remove(&doc.link);
            state.tags.retire(&doc.link);
            self.progress.mark(Mark::Draft);
            return Ok(());
        }

        let target = state.site_root.join(posts_output_path(&doc.relative_link));
        let written = target
            .parent()
            .map(std::fs::create_dir_all)
            .unwrap_or(Ok(()))
            .and_then(|()| std::fs::write(&target, &html));
        if let Err(e) = written {
            state.report.fail(rel_path, e);
            return Ok(());
        }

        if doc.feeds_registry() {
            state.registry.upsert(feed::item_from_document(&doc));
        }
        state.tags.touch(&doc);
        self.syndicate(rel_path, &full, &doc, state)?;
        self.progress.mark(Mark::Published);
        Ok(())
    }

    /// Crosspost every target carrying the pending marker, writing resolved
    /// URLs back into the source and committing the edit. Transport
    /// failures skip the target; a version-control failure is fatal.
    fn syndicate(
        &self,
        rel_path: &str,
        full: &Path,
        doc: &ContentDocument,
        state: &mut RunState,
    ) -> Result<(), RunError> {
        let Some(dispatcher) = self.dispatcher else {
            return Ok(());
        };
        for target in doc.syndication.pending() {
            match dispatcher.post(target, doc) {
                Ok(url) => {
                    match syndicate::write_back_link(full, target, &url) {
                        Ok(true) => self.vcs.commit_and_push(rel_path, "XPost")?,
                        Ok(false) => {}
                        Err(e) => state.report.fail(rel_path, e),
                    }
                }
                Err(e) => {
                    self.progress.mark(Mark::SyndicationFailed);
                    state.report.fail(rel_path, e);
                }
            }
        }
        Ok(())
    }

    /// Shared run tail: remove doomed outputs, rewrite touched tag
    /// artifacts, then the master feeds, index, and homepage snippet.
    fn finalize(&self, state: &mut RunState) -> Result<(), RunError> {
        for doomed in &state.doomed {
            let target = state.site_root.join(doomed);
            match std::fs::remove_file(&target) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => state
                    .report
                    .fail(&target.display().to_string(), e),
            }
        }
        state
            .tags
            .regenerate(&state.site_root, self.config, self.renderer)?;
        state
            .registry
            .rebuild(&state.site_root, self.config, self.renderer)?;
        Ok(())
    }
}

/// Where a document's rendered page lives relative to the site root.
fn posts_output_path(relative_link: &str) -> PathBuf {
    Path::new("posts").join(relative_link.trim_start_matches('/'))
}

fn count_changes(changes: &ChangeSet) -> RunReport {
    RunReport {
        added: changes.added.len(),
        modified: changes.modified.len() + changes.rename_edit.len() + changes.unmerged.len(),
        deleted: changes.deleted.len(),
        failures: Vec::new(),
    }
}
