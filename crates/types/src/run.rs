//! Run configuration shared between config loading and descriptor construction.

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Profile reported when neither configuration nor flags select one.
pub const DEFAULT_PROFILE: &str = "standard";

/// Container engines a run can be configured to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerEngine {
    Docker,
    Podman,
    Singularity,
    Apptainer,
    Charliecloud,
    Sarus,
    Shifter,
}

impl ContainerEngine {
    /// Fixed precedence used when several engines are enabled at once.
    /// The first enabled engine in this order wins.
    pub const PRECEDENCE: [ContainerEngine; 7] = [
        ContainerEngine::Docker,
        ContainerEngine::Podman,
        ContainerEngine::Singularity,
        ContainerEngine::Apptainer,
        ContainerEngine::Charliecloud,
        ContainerEngine::Sarus,
        ContainerEngine::Shifter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContainerEngine::Docker => "docker",
            ContainerEngine::Podman => "podman",
            ContainerEngine::Singularity => "singularity",
            ContainerEngine::Apptainer => "apptainer",
            ContainerEngine::Charliecloud => "charliecloud",
            ContainerEngine::Sarus => "sarus",
            ContainerEngine::Shifter => "shifter",
        }
    }

    /// Parses an engine name case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        Self::PRECEDENCE
            .into_iter()
            .find(|engine| engine.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for ContainerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container-related configuration flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSettings {
    /// Image configured for the run's processes, if any.
    #[serde(default)]
    pub image: Option<String>,
    /// Engines whose `enabled` flag is set. Order is irrelevant; see
    /// [`ContainerEngine::PRECEDENCE`].
    #[serde(default)]
    pub enabled: Vec<ContainerEngine>,
}

impl ContainerSettings {
    pub fn is_enabled(&self, engine: ContainerEngine) -> bool {
        self.enabled.contains(&engine)
    }
}

/// Read-only view of a run's configuration, as consumed by descriptor construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Selected configuration profile; `None` means [`DEFAULT_PROFILE`].
    pub profile: Option<String>,
    /// Command line that launched the run.
    pub command_line: String,
    /// Unique session identifier of the run.
    pub session_id: String,
    /// Human-friendly run name.
    pub run_name: String,
    /// Configuration files that contributed to this run, in load order.
    pub config_files: Vec<PathBuf>,
    /// Whether the run resumes a previous session.
    pub resume: bool,
    /// Whether process bodies are replaced by their stubs.
    pub stub_run: bool,
    /// Directory the run was launched from. Relative paths resolve against it.
    pub launch_dir: PathBuf,
    /// Scratch directory for task work files.
    pub work_dir: PathBuf,
    /// Container flags.
    pub container: ContainerSettings,
}

impl RunConfig {
    /// Effective profile name.
    pub fn profile_name(&self) -> &str {
        self.profile.as_deref().unwrap_or(DEFAULT_PROFILE)
    }
}
