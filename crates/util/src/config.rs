//! # Run Configuration Files
//!
//! Run settings come from YAML or JSON files (JSON is read through the YAML
//! parser) and from command-line flags. Every field is optional; sources are
//! merged in order with later sources overriding earlier ones, and the result
//! is frozen into a [`RunConfig`] for descriptor construction.
//!
//! ```yaml
//! profile: test
//! runName: nightly-qc
//! resume: true
//! workDir: ~/scratch/work
//! container:
//!   image: quay.io/biocontainers/fastqc:0.12.1
//!   enabled: [docker]
//! ```
//!
//! When no source selects a profile, the `FLOWRUN_PROFILE` environment
//! variable is consulted before falling back to the default profile.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use dirs_next::home_dir;
use flowrun_types::{ContainerEngine, ContainerSettings, RunConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Environment variable providing a profile when neither files nor flags do.
pub const PROFILE_ENV: &str = "FLOWRUN_PROFILE";

/// Work directory used when no source sets one.
pub const DEFAULT_WORK_DIR: &str = "work";

/// Error surfaced when a configuration file cannot be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Container section of a settings source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerOverrides {
    pub image: Option<String>,
    /// Replaces, rather than extends, the engines enabled by earlier sources.
    pub enabled: Option<Vec<ContainerEngine>>,
}

/// One source of run settings: a config file or the command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunSettings {
    pub profile: Option<String>,
    pub run_name: Option<String>,
    pub resume: Option<bool>,
    pub stub_run: Option<bool>,
    pub work_dir: Option<PathBuf>,
    pub container: ContainerOverrides,
}

/// Facts about the invocation that no settings source provides.
#[derive(Debug, Clone)]
pub struct RunInvocation {
    pub command_line: String,
    pub session_id: String,
    /// Used when no source names the run.
    pub default_run_name: String,
    pub launch_dir: PathBuf,
    /// Files the settings were loaded from, in load order.
    pub config_files: Vec<PathBuf>,
}

impl RunSettings {
    /// Loads one YAML or JSON settings file. An empty file yields empty settings.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            debug!(path = %path.display(), "config file is empty");
            return Ok(Self::default());
        }
        let settings: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "config file loaded");
        Ok(settings)
    }

    /// Loads and merges `paths` in order; later files win.
    pub fn load_all(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        paths
            .iter()
            .try_fold(Self::default(), |merged, path| Ok(merged.merge(Self::load(path)?)))
    }

    /// Overlays `later` on top of `self`, field by field.
    pub fn merge(self, later: RunSettings) -> RunSettings {
        RunSettings {
            profile: later.profile.or(self.profile),
            run_name: later.run_name.or(self.run_name),
            resume: later.resume.or(self.resume),
            stub_run: later.stub_run.or(self.stub_run),
            work_dir: later.work_dir.or(self.work_dir),
            container: ContainerOverrides {
                image: later.container.image.or(self.container.image),
                enabled: later.container.enabled.or(self.container.enabled),
            },
        }
    }

    /// Freezes the merged settings into the read-only configuration of a run.
    pub fn into_run_config(self, invocation: RunInvocation) -> RunConfig {
        let profile = self.profile.or_else(profile_from_env);
        let work_dir = self
            .work_dir
            .map(|path| expand_home(&path))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR));

        RunConfig {
            profile,
            command_line: invocation.command_line,
            session_id: invocation.session_id,
            run_name: self.run_name.unwrap_or(invocation.default_run_name),
            config_files: invocation.config_files,
            resume: self.resume.unwrap_or(false),
            stub_run: self.stub_run.unwrap_or(false),
            launch_dir: invocation.launch_dir,
            work_dir,
            container: ContainerSettings {
                image: self.container.image,
                enabled: self.container.enabled.unwrap_or_default(),
            },
        }
    }
}

fn profile_from_env() -> Option<String> {
    env::var(PROFILE_ENV)
        .ok()
        .map(|profile| profile.trim().to_string())
        .filter(|profile| !profile.is_empty())
}

/// Expands a leading `~` to the home directory; other paths are returned unchanged.
fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
