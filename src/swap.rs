//! Atomic deployment swapping for full rebuilds.
//!
//! A full rebuild never touches the live site while it works. It builds
//! into a fresh timestamp-named generation directory, and only when the
//! build succeeds does the live pointer move — one atomic repoint, the
//! single visible instant the published site changes. After a successful
//! swap every other generation is garbage-collected; after a failure the
//! partial directory is discarded and the live pointer is untouched.
//!
//! The pointer move goes through [`PointerSwap`] so non-POSIX targets can
//! supply an equivalent (swapping a manifest key, say) without changing the
//! orchestrator. [`SymlinkSwap`] is the default.

use chrono::Local;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("failed to build generation directory: {0}")]
    Build(std::io::Error),
    #[error("failed to repoint live site: {0}")]
    Swap(std::io::Error),
}

/// The atomic pointer-replace step.
pub trait PointerSwap {
    /// Make `live` resolve to `target`. Must tolerate `live` not existing.
    fn repoint(&self, live: &Path, target: &Path) -> std::io::Result<()>;
}

/// POSIX implementation: remove the old symlink, create the new one.
pub struct SymlinkSwap;

impl PointerSwap for SymlinkSwap {
    fn repoint(&self, live: &Path, target: &Path) -> std::io::Result<()> {
        match std::fs::remove_file(live) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        #[cfg(unix)]
        return std::os::unix::fs::symlink(target, live);
        #[cfg(windows)]
        return std::os::windows::fs::symlink_dir(target, live);
    }
}

/// An in-progress generation directory.
#[derive(Debug)]
pub struct Generation {
    name: String,
    root: PathBuf,
}

impl Generation {
    /// The directory all build writes target.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub struct DeploymentSwapper {
    generations_dir: PathBuf,
    pointer: Box<dyn PointerSwap>,
}

impl DeploymentSwapper {
    pub fn new(generations_dir: PathBuf, pointer: Box<dyn PointerSwap>) -> Self {
        Self {
            generations_dir,
            pointer,
        }
    }

    /// Allocate a fresh timestamp-named generation with the `tag/`, `media/`
    /// and `posts/` skeleton inside it.
    pub fn begin(&self) -> Result<Generation, SwapError> {
        // Fixed-width and lexicographically monotonic, so string comparison
        // against sibling names is safe.
        let name = Local::now().format("%Y%m%d%H%M%S").to_string();
        let root = self.generations_dir.join(&name);
        for subdir in ["tag", "media", "posts"] {
            std::fs::create_dir_all(root.join(subdir)).map_err(SwapError::Build)?;
        }
        Ok(Generation { name, root })
    }

    /// Repoint the live path at the finished generation, then delete every
    /// other generation directory.
    pub fn commit(&self, generation: &Generation, live: &Path) -> Result<(), SwapError> {
        self.pointer
            .repoint(live, &generation.root)
            .map_err(SwapError::Swap)?;
        self.collect_garbage(&generation.name);
        Ok(())
    }

    /// Discard a partial generation after a failed build. Best-effort: the
    /// live site is already safe, a leftover directory is only disk space.
    pub fn abort(&self, generation: Generation) {
        if let Err(e) = std::fs::remove_dir_all(&generation.root) {
            log::warn!(
                "could not remove partial generation {}: {e}",
                generation.root.display()
            );
        }
    }

    fn collect_garbage(&self, keep: &str) {
        let Ok(entries) = std::fs::read_dir(&self.generations_dir) else {
            return;
        };
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy() == keep {
                continue;
            }
            let path = entry.path();
            if path.is_dir() {
                if let Err(e) = std::fs::remove_dir_all(&path) {
                    log::warn!("could not remove old generation {}: {e}", path.display());
                }
            }
        }
    }
}
