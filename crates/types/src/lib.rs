//! Shared type definitions for the flowrun crates.
//!
//! These are plain data carriers exchanged between the engine, the default
//! collaborator implementations in `flowrun-util`, and the CLI. None of them
//! carries behavior beyond small accessors.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod run;

pub use run::{ContainerEngine, ContainerSettings, DEFAULT_PROFILE, RunConfig};

/// Version stamp of the running toolchain.
///
/// The stamp is a process-wide constant; it is captured into every run
/// descriptor so that a finished run records which build produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolVersion {
    /// Semantic version, e.g. `0.1.0`.
    pub version: String,
    /// Build identifier (commit hash or CI build number).
    pub build: String,
    /// Build timestamp as recorded at compile time.
    pub timestamp: String,
}

impl ToolVersion {
    pub fn new(version: impl Into<String>, build: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            build: build.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// A script file resolved by a script locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    /// Absolute location of the script on disk.
    pub absolute_path: PathBuf,
    /// Display name of the script (its file name).
    pub name: String,
    /// Raw script content.
    pub content: Vec<u8>,
}

/// Version-control provenance of a script's containing directory.
///
/// The three facts travel together: a lookup either yields all of them or
/// nothing at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    /// Remote (or local fallback) URL of the repository.
    pub repository_url: String,
    /// Full commit identifier of the checked-out revision.
    pub commit_id: String,
    /// Symbolic revision, usually the branch name.
    pub revision: String,
}

/// Error record attached to an error event.
///
/// Handlers registered for the error event receive this record under the
/// reserved `error` name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    /// Short human-readable description of the failure.
    pub message: String,
    /// Extended report, typically a trace or the failing task's log tail.
    #[serde(default)]
    pub report: Option<String>,
    /// Exit status of the run, when the failure produced one.
    #[serde(default)]
    pub exit_status: Option<i32>,
}

impl RunError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            report: None,
            exit_status: None,
        }
    }

    pub fn with_report(mut self, report: impl Into<String>) -> Self {
        self.report = Some(report.into());
        self
    }

    pub fn with_exit_status(mut self, exit_status: i32) -> Self {
        self.exit_status = Some(exit_status);
        self
    }
}
