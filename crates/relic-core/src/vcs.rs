//! Version-control interface.
//!
//! The sync controller needs exactly two capabilities: the current
//! source-tree revision and the changed-file set between two revisions.
//! The provided implementation shells out to the `git` binary; tests use
//! in-memory fakes.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

/// Errors from the version-control layer.
#[derive(Debug, Error)]
pub enum VcsError {
    /// git could not be spawned
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    /// git exited non-zero (not a repo, unreachable revision, ...)
    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },
}

/// Minimal version-control capability set.
pub trait Vcs: Send + Sync {
    /// Identifier of the current source-tree revision.
    fn current_revision(&self) -> Result<String, VcsError>;

    /// Paths changed between two revisions, relative to the repo root.
    ///
    /// Fails when either revision is unknown to the repository (rewritten
    /// history); callers degrade to the unknown-baseline path.
    fn changed_files(&self, from: &str, to: &str) -> Result<Vec<PathBuf>, VcsError>;
}

/// `git` CLI implementation.
pub struct GitCli {
    repo_root: PathBuf,
}

impl GitCli {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    fn run(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()?;

        if !output.status.success() {
            return Err(VcsError::Command {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Vcs for GitCli {
    fn current_revision(&self) -> Result<String, VcsError> {
        Ok(self.run(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    fn changed_files(&self, from: &str, to: &str) -> Result<Vec<PathBuf>, VcsError> {
        let output = self.run(&["diff", "--name-only", from, to])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .status()
            .expect("git available in test environment");
        assert!(status.success(), "git {:?} failed", args);
    }

    #[test]
    fn revision_and_diff_round_trip() {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "-q"]);
        fs::write(dir.path().join("a.cpp"), "void f() {}\n").unwrap();
        git(dir.path(), &["add", "."]);
        git(dir.path(), &["commit", "-q", "-m", "one"]);

        let vcs = GitCli::new(dir.path());
        let first = vcs.current_revision().unwrap();

        fs::write(dir.path().join("b.cpp"), "void g() {}\n").unwrap();
        git(dir.path(), &["add", "."]);
        git(dir.path(), &["commit", "-q", "-m", "two"]);

        let second = vcs.current_revision().unwrap();
        assert_ne!(first, second);

        let changed = vcs.changed_files(&first, &second).unwrap();
        assert_eq!(changed, vec![PathBuf::from("b.cpp")]);
    }

    #[test]
    fn unknown_revision_is_an_error() {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "-q"]);
        fs::write(dir.path().join("a.cpp"), "void f() {}\n").unwrap();
        git(dir.path(), &["add", "."]);
        git(dir.path(), &["commit", "-q", "-m", "one"]);

        let vcs = GitCli::new(dir.path());
        let head = vcs.current_revision().unwrap();
        let err = vcs.changed_files("0000000000000000000000000000000000000000", &head);
        assert!(matches!(err, Err(VcsError::Command { .. })));
    }
}
