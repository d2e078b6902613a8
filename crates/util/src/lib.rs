//! Default collaborators and helpers for flowrun.
//!
//! The engine only knows collaborator traits; this crate supplies the
//! implementations a real run uses: scripts read from disk, provenance read
//! from `git`, container images and profiles read from configuration files, and
//! an in-memory namespace.

pub mod build_info;
pub mod command_line;
pub mod config;
pub mod container;
pub mod git;
pub mod namespace;
pub mod redaction;
pub mod scripts;
pub mod session;

pub use build_info::current_tool_version;
pub use command_line::{quote_arg, render_command_line};
pub use config::{ConfigError, ContainerOverrides, PROFILE_ENV, RunInvocation, RunSettings};
pub use container::ConfiguredContainerResolver;
pub use git::GitCliProvenance;
pub use namespace::InMemoryNamespace;
pub use redaction::redact_sensitive;
pub use scripts::FsScriptLocator;
pub use session::{new_session_id, run_name_for};
