//! Version-control provenance read from the `git` command line.

use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use flowrun_engine::VcsProvenance;
use flowrun_types::RepositoryInfo;
use tracing::debug;

/// Queries a `git` executable for the repository containing a directory.
///
/// Any failure (git missing, directory outside a work tree, detached or
/// empty repository) is reported as "no repository".
#[derive(Debug, Clone)]
pub struct GitCliProvenance {
    git_binary: PathBuf,
}

impl Default for GitCliProvenance {
    fn default() -> Self {
        Self {
            git_binary: PathBuf::from("git"),
        }
    }
}

impl GitCliProvenance {
    /// Uses the given executable instead of `git` from `PATH`.
    pub fn with_binary(git_binary: impl Into<PathBuf>) -> Self {
        Self {
            git_binary: git_binary.into(),
        }
    }

    fn run(&self, directory: &Path, args: &[&str]) -> Option<String> {
        let output = Command::new(&self.git_binary)
            .arg("-C")
            .arg(directory)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|error| debug!(binary = %self.git_binary.display(), %error, "git could not be started"))
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8(output.stdout).ok()?;
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

impl VcsProvenance for GitCliProvenance {
    fn lookup(&self, directory: &Path) -> Option<RepositoryInfo> {
        let toplevel = self.run(directory, &["rev-parse", "--show-toplevel"])?;
        let commit_id = self.run(directory, &["rev-parse", "HEAD"])?;
        let revision = self.run(directory, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        let repository_url = self
            .run(directory, &["config", "--get", "remote.origin.url"])
            .unwrap_or_else(|| format!("file://{toplevel}"));

        debug!(%repository_url, %commit_id, %revision, "git provenance resolved");
        Some(RepositoryInfo {
            repository_url,
            commit_id,
            revision,
        })
    }
}
