//! Collaborator interfaces consumed by descriptor construction and event dispatch.
//!
//! Modules:
//! - `null`: collaborators that report nothing, for runs outside version control or without containers
//!
//! Concrete filesystem, git and configuration backed implementations live in `flowrun-util`.

mod null;

use std::{
    io,
    path::{Path, PathBuf},
};

use flowrun_types::{RepositoryInfo, RunConfig, ScriptFile, ToolVersion};
use serde_json::Value;
use thiserror::Error;

pub use null::{NoContainer, NoRepository};

/// Failure to resolve or read the main script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The script path does not exist.
    #[error("script file not found: {}", path.display())]
    NotFound { path: PathBuf },
    /// The script exists but could not be read.
    #[error("failed to read script file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolves a script path into its absolute location, name and content.
pub trait ScriptLocator {
    fn resolve(&self, path: &Path) -> Result<ScriptFile, ScriptError>;
}

/// Looks up version-control provenance for a directory.
///
/// Implementations return `None` when the directory is not inside a repository.
pub trait VcsProvenance {
    fn lookup(&self, directory: &Path) -> Option<RepositoryInfo>;
}

/// Resolves the effective container image of a run.
pub trait ContainerResolver {
    fn resolve(&self, config: &RunConfig) -> Option<String>;
}

/// The run's shared variable namespace.
///
/// Populated by the executing pipeline; handlers see it as a fallback scope.
/// Writes go through `&self` so a single namespace can be shared by every
/// component of a run.
pub trait RunNamespace: Send + Sync {
    fn get(&self, name: &str) -> Option<Value>;
    fn set(&self, name: &str, value: Value);
}

/// Read-only collaborators needed to construct a run descriptor.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub scripts: &'a dyn ScriptLocator,
    pub vcs: &'a dyn VcsProvenance,
    pub containers: &'a dyn ContainerResolver,
    pub tool_version: &'a ToolVersion,
}
