//! # Run Descriptor
//!
//! The [`RunDescriptor`] is the read-mostly record of facts about one run:
//! script provenance, timing, container runtime, session identity and the
//! run's final status. It is created once per run and afterwards mutated only
//! by [`RunDescriptor::record_error`] and [`RunDescriptor::mark_complete`].
//!
//! ## Lifecycle
//!
//! 1. [`RunDescriptor::create`] resolves the script, hashes it, queries version
//!    control and the container resolver, normalizes config file paths and
//!    stamps the start time. Any script failure aborts construction.
//! 2. On failure the runner calls [`RunDescriptor::record_error`] (usually via
//!    `EventDispatcher::fire_error`).
//! 3. [`RunDescriptor::mark_complete`] stamps the completion time exactly once
//!    and marks the run successful unless an error was recorded.
//!
//! Handlers never see this struct's fields directly; they go through the
//! whitelist in [`properties`].

pub mod properties;

use std::{
    env,
    path::{Component, Path, PathBuf},
};

use chrono::{DateTime, TimeDelta, Utc};
use flowrun_types::{ContainerEngine, ContainerSettings, RepositoryInfo, RunConfig, RunError, ToolVersion};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    checksum::script_checksum,
    collaborators::{Collaborators, ScriptError},
};

pub use properties::{DESCRIPTOR_BINDING, public_property_names};

/// Exit status reported when an error record does not carry one.
const DEFAULT_ERROR_EXIT_STATUS: i32 = 1;

/// Errors raised by descriptor construction and lifecycle transitions.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The main script could not be resolved or read; no descriptor was produced.
    #[error(transparent)]
    Script(#[from] ScriptError),
    /// `mark_complete` was called on a run that already completed.
    #[error("run was already marked complete at {completed_at}")]
    AlreadyCompleted { completed_at: DateTime<Utc> },
    /// `record_error` was called on a run that already completed.
    #[error("cannot record an error: run already completed at {completed_at}")]
    ErrorAfterCompletion { completed_at: DateTime<Utc> },
}

/// Facts describing one execution of a pipeline.
#[derive(Debug, Clone)]
pub struct RunDescriptor {
    script_checksum: String,
    script_path: PathBuf,
    script_name: String,
    project_dir: PathBuf,
    repository: Option<RepositoryInfo>,
    container_image: Option<String>,
    container_engine: Option<ContainerEngine>,
    command_line: String,
    profile: String,
    run_id: String,
    run_name: String,
    config_files: Vec<PathBuf>,
    resume: bool,
    stub_run: bool,
    launch_dir: PathBuf,
    work_dir: PathBuf,
    home_dir: Option<PathBuf>,
    user_name: Option<String>,
    tool_version: ToolVersion,
    start_time: DateTime<Utc>,
    complete_time: Option<DateTime<Utc>>,
    success: bool,
    exit_status: Option<i32>,
    /// Error recorded on the error path; blocks `success`.
    failure: Option<RunError>,
}

impl RunDescriptor {
    /// Builds the descriptor for a new run of the script at `script_path`.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Script`] when the script locator cannot
    /// resolve or read the script.
    pub fn create(script_path: &Path, config: &RunConfig, collaborators: &Collaborators<'_>) -> Result<Self, DescriptorError> {
        let script = collaborators.scripts.resolve(script_path)?;
        let script_checksum = script_checksum(&script.content);
        let project_dir = script
            .absolute_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| script.absolute_path.clone());

        let repository = collaborators.vcs.lookup(&project_dir);
        if repository.is_none() {
            debug!(project_dir = %project_dir.display(), "script is not under version control");
        }
        let container_image = collaborators.containers.resolve(config);
        let container_engine = select_container_engine(&config.container);

        let config_files = config
            .config_files
            .iter()
            .map(|path| absolute_path(&config.launch_dir, path))
            .collect();
        let launch_dir = absolute_path(&config.launch_dir, Path::new("."));
        let work_dir = absolute_path(&config.launch_dir, &config.work_dir);

        let descriptor = Self {
            script_checksum,
            script_path: script.absolute_path,
            script_name: script.name,
            project_dir,
            repository,
            container_image,
            container_engine,
            command_line: config.command_line.clone(),
            profile: config.profile_name().to_string(),
            run_id: config.session_id.clone(),
            run_name: config.run_name.clone(),
            config_files,
            resume: config.resume,
            stub_run: config.stub_run,
            launch_dir,
            work_dir,
            home_dir: dirs_next::home_dir(),
            user_name: current_user_name(),
            tool_version: collaborators.tool_version.clone(),
            start_time: Utc::now(),
            complete_time: None,
            success: false,
            exit_status: None,
            failure: None,
        };

        info!(
            run_name = %descriptor.run_name,
            run_id = %descriptor.run_id,
            script = %descriptor.script_path.display(),
            checksum = %descriptor.script_checksum,
            container_engine = descriptor.container_engine.map(ContainerEngine::as_str).unwrap_or("none"),
            "run descriptor created"
        );
        Ok(descriptor)
    }

    /// Marks the run complete. Callable exactly once.
    ///
    /// The run is marked successful, with exit status `0`, unless an error was
    /// recorded beforehand.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::AlreadyCompleted`] on every call after the
    /// first; the descriptor is left untouched.
    pub fn mark_complete(&mut self) -> Result<(), DescriptorError> {
        if let Some(completed_at) = self.complete_time {
            return Err(DescriptorError::AlreadyCompleted { completed_at });
        }

        // Wall clocks can step backwards; completion never precedes the start.
        let completed_at = Utc::now().max(self.start_time);
        self.complete_time = Some(completed_at);
        if self.failure.is_none() {
            self.success = true;
            self.exit_status = Some(0);
        }

        info!(
            run_name = %self.run_name,
            success = self.success,
            duration_ms = (completed_at - self.start_time).num_milliseconds(),
            "run marked complete"
        );
        Ok(())
    }

    /// Records the error that ended the run. Must precede [`Self::mark_complete`].
    ///
    /// A later call replaces the earlier record.
    pub fn record_error(&mut self, error: &RunError) -> Result<(), DescriptorError> {
        if let Some(completed_at) = self.complete_time {
            return Err(DescriptorError::ErrorAfterCompletion { completed_at });
        }
        self.exit_status = Some(error.exit_status.unwrap_or(DEFAULT_ERROR_EXIT_STATUS));
        self.failure = Some(error.clone());
        debug!(run_name = %self.run_name, message = %error.message, "run error recorded");
        Ok(())
    }

    pub fn script_checksum(&self) -> &str {
        &self.script_checksum
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    /// Directory containing the main script.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn repository_url(&self) -> Option<&str> {
        self.repository.as_ref().map(|info| info.repository_url.as_str())
    }

    pub fn commit_id(&self) -> Option<&str> {
        self.repository.as_ref().map(|info| info.commit_id.as_str())
    }

    pub fn revision(&self) -> Option<&str> {
        self.repository.as_ref().map(|info| info.revision.as_str())
    }

    pub fn container_image(&self) -> Option<&str> {
        self.container_image.as_deref()
    }

    pub fn container_engine(&self) -> Option<ContainerEngine> {
        self.container_engine
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Config files in load order, all absolute.
    pub fn config_files(&self) -> &[PathBuf] {
        &self.config_files
    }

    pub fn resume(&self) -> bool {
        self.resume
    }

    pub fn stub_run(&self) -> bool {
        self.stub_run
    }

    pub fn launch_dir(&self) -> &Path {
        &self.launch_dir
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn home_dir(&self) -> Option<&Path> {
        self.home_dir.as_deref()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn tool_version(&self) -> &ToolVersion {
        &self.tool_version
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn complete_time(&self) -> Option<DateTime<Utc>> {
        self.complete_time
    }

    /// Elapsed time between start and completion; `None` until completion.
    pub fn duration(&self) -> Option<TimeDelta> {
        self.complete_time.map(|completed_at| completed_at - self.start_time)
    }

    pub fn is_complete(&self) -> bool {
        self.complete_time.is_some()
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.failure.as_ref().map(|error| error.message.as_str())
    }

    pub fn error_report(&self) -> Option<&str> {
        self.failure.as_ref().and_then(|error| error.report.as_deref())
    }
}

/// Picks the single engine to report when one or more engines are enabled.
pub fn select_container_engine(settings: &ContainerSettings) -> Option<ContainerEngine> {
    ContainerEngine::PRECEDENCE
        .into_iter()
        .find(|engine| settings.is_enabled(*engine))
}

fn absolute_path(launch_dir: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        launch_dir.join(path)
    };
    let anchored = std::path::absolute(&joined).unwrap_or(joined);
    normalize_lexically(&anchored)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn current_user_name() -> Option<String> {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .ok()
        .filter(|name| !name.is_empty())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::collaborators::{NoContainer, NoRepository};

    #[test]
    fn captures_static_facts_at_creation() {
        let descriptor = descriptor();

        assert_eq!(descriptor.script_checksum(), script_checksum(HELLO_SCRIPT));
        assert_eq!(descriptor.script_path(), Path::new("/pipelines/hello/main.nf"));
        assert_eq!(descriptor.script_name(), "main.nf");
        assert_eq!(descriptor.project_dir(), Path::new("/pipelines/hello"));
        assert_eq!(descriptor.repository_url(), Some("https://example.com/org/pipeline.git"));
        assert_eq!(descriptor.revision(), Some("main"));
        assert_eq!(descriptor.command_line(), "flowrun run main.nf -resume");
        assert_eq!(descriptor.profile(), "standard");
        assert_eq!(descriptor.run_name(), "focused-turing");
        assert!(descriptor.resume());
        assert_eq!(descriptor.tool_version().build, "abc1234");
        assert!(descriptor.start_time() <= Utc::now());
    }

    #[test]
    fn checksum_is_reproducible_across_constructions() {
        let first = descriptor();
        let second = descriptor();

        assert_eq!(first.script_checksum(), second.script_checksum());
    }

    #[test]
    fn normalizes_config_files_against_launch_dir() {
        let descriptor = descriptor();

        assert_eq!(
            descriptor.config_files(),
            &[PathBuf::from("/pipelines/hello/flowrun.config"), PathBuf::from("/launch/extra.yaml")]
        );
        assert!(descriptor.config_files().iter().all(|path| path.is_absolute()));
        assert_eq!(descriptor.work_dir(), Path::new("/launch/work"));
        assert_eq!(descriptor.launch_dir(), Path::new("/launch"));
    }

    #[test]
    fn repository_facts_are_absent_together() {
        let scripts = StaticScripts {
            content: HELLO_SCRIPT.to_vec(),
        };
        let version = tool_version();
        let collaborators = Collaborators {
            scripts: &scripts,
            vcs: &NoRepository,
            containers: &NoContainer,
            tool_version: &version,
        };

        let descriptor =
            RunDescriptor::create(Path::new("/pipelines/hello/main.nf"), &run_config(), &collaborators).expect("create descriptor");

        assert_eq!(descriptor.repository_url(), None);
        assert_eq!(descriptor.commit_id(), None);
        assert_eq!(descriptor.revision(), None);
        assert_eq!(descriptor.container_image(), None);
    }

    #[test]
    fn missing_script_fails_construction() {
        let scripts = StaticScripts { content: Vec::new() };
        let version = tool_version();
        let collaborators = Collaborators {
            scripts: &scripts,
            vcs: &NoRepository,
            containers: &NoContainer,
            tool_version: &version,
        };

        let result = RunDescriptor::create(Path::new("/elsewhere/main.nf"), &run_config(), &collaborators);

        assert!(matches!(result, Err(DescriptorError::Script(ScriptError::NotFound { .. }))));
    }

    #[test]
    fn completion_sets_time_duration_and_success() {
        let mut descriptor = descriptor();
        assert!(descriptor.complete_time().is_none());
        assert!(descriptor.duration().is_none());
        assert!(!descriptor.success());

        descriptor.mark_complete().expect("first completion");

        let completed_at = descriptor.complete_time().expect("complete time set");
        assert!(completed_at >= descriptor.start_time());
        assert_eq!(descriptor.duration(), Some(completed_at - descriptor.start_time()));
        assert!(descriptor.success());
        assert_eq!(descriptor.exit_status(), Some(0));
    }

    #[test]
    fn second_completion_is_a_fault() {
        let mut descriptor = descriptor();
        descriptor.mark_complete().expect("first completion");
        let completed_at = descriptor.complete_time();

        let second = descriptor.mark_complete();

        assert!(matches!(second, Err(DescriptorError::AlreadyCompleted { .. })));
        assert_eq!(descriptor.complete_time(), completed_at);
    }

    #[test]
    fn recorded_error_blocks_success() {
        let mut descriptor = descriptor();
        descriptor
            .record_error(&RunError::new("process `align` failed").with_report("exit 137"))
            .expect("record error");

        descriptor.mark_complete().expect("complete after error");

        assert!(!descriptor.success());
        assert_eq!(descriptor.exit_status(), Some(DEFAULT_ERROR_EXIT_STATUS));
        assert_eq!(descriptor.error_message(), Some("process `align` failed"));
        assert_eq!(descriptor.error_report(), Some("exit 137"));
    }

    #[test]
    fn error_after_completion_is_rejected() {
        let mut descriptor = descriptor();
        descriptor.mark_complete().expect("complete");

        let result = descriptor.record_error(&RunError::new("late"));

        assert!(matches!(result, Err(DescriptorError::ErrorAfterCompletion { .. })));
        assert!(descriptor.success());
        assert_eq!(descriptor.error_message(), None);
    }

    #[test]
    fn container_engine_follows_fixed_precedence() {
        let mut settings = ContainerSettings {
            image: None,
            enabled: vec![ContainerEngine::Shifter, ContainerEngine::Singularity, ContainerEngine::Podman],
        };
        assert_eq!(select_container_engine(&settings), Some(ContainerEngine::Podman));

        settings.enabled.push(ContainerEngine::Docker);
        assert_eq!(select_container_engine(&settings), Some(ContainerEngine::Docker));

        settings.enabled = vec![ContainerEngine::Sarus, ContainerEngine::Apptainer];
        assert_eq!(select_container_engine(&settings), Some(ContainerEngine::Apptainer));

        settings.enabled.clear();
        assert_eq!(select_container_engine(&settings), None);
    }

    #[test]
    fn descriptor_reports_configured_container() {
        let mut config = run_config();
        config.container = ContainerSettings {
            image: Some("quay.io/org/tools:1.0".into()),
            enabled: vec![ContainerEngine::Singularity, ContainerEngine::Docker],
        };

        let descriptor = descriptor_with(&config);

        assert_eq!(descriptor.container_image(), Some("quay.io/org/tools:1.0"));
        assert_eq!(descriptor.container_engine(), Some(ContainerEngine::Docker));
    }

    #[test]
    fn normalize_lexically_drops_dot_segments() {
        assert_eq!(normalize_lexically(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_lexically(Path::new("/../x")), PathBuf::from("/x"));
    }
}
