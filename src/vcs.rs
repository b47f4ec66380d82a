//! Version control collaborator.
//!
//! The engine only ever asks four things of version control: bring the
//! remote refs up to date, materialize them locally, name what changed, and
//! record a syndication write-back. [`VersionControl`] is the seam; the
//! shipped [`GitCli`] shells out to `git` in the repository directory.
//!
//! Deadlines are owned by implementations — `GitCli` has none of its own
//! and relies on whatever scheduler invokes the run.

use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VcsError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("{command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// The subprocess contract the orchestrator depends on.
pub trait VersionControl {
    /// Update remote refs without touching the working tree.
    fn fetch(&self) -> Result<(), VcsError>;
    /// Materialize upstream changes in the working tree.
    fn pull(&self) -> Result<(), VcsError>;
    /// `--name-status` lines between the working head and `base`.
    fn diff_name_status(&self, base: &str) -> Result<String, VcsError>;
    /// Stage, commit, and push a single file (syndication write-back).
    fn commit_and_push(&self, path: &str, message: &str) -> Result<(), VcsError>;
}

/// `git` subprocess implementation, run in the repository directory.
pub struct GitCli {
    repo_dir: PathBuf,
}

impl GitCli {
    pub fn new(repo_dir: PathBuf) -> Self {
        Self { repo_dir }
    }

    fn run(&self, args: &[&str]) -> Result<String, VcsError> {
        let command = format!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .map_err(|source| VcsError::Spawn {
                command: command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(VcsError::Failed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl VersionControl for GitCli {
    fn fetch(&self) -> Result<(), VcsError> {
        self.run(&["fetch"]).map(|_| ())
    }

    fn pull(&self) -> Result<(), VcsError> {
        self.run(&["pull"]).map(|_| ())
    }

    fn diff_name_status(&self, base: &str) -> Result<String, VcsError> {
        self.run(&["diff", "HEAD", base, "--name-status"])
    }

    fn commit_and_push(&self, path: &str, message: &str) -> Result<(), VcsError> {
        self.run(&["add", path])?;
        self.run(&["commit", "-m", message])?;
        self.run(&["push"]).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_names_the_command() {
        let vcs = GitCli::new(PathBuf::from("/definitely/not/a/repo/dir"));
        let err = vcs.fetch().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("git fetch"), "unexpected error: {text}");
    }
}
