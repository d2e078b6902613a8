//! # Flowrun Engine
//!
//! The engine describes one run of a pipeline and dispatches its lifecycle
//! events to user-supplied handlers.
//!
//! ## Key Features
//!
//! - **Run Descriptor**: script provenance, timing, container runtime and session identity of a run
//! - **Scoped Handlers**: completion and error callbacks that resolve free names through a fixed chain
//! - **Failure Isolation**: one failing handler never prevents the others from running
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::{path::Path, sync::Arc};
//!
//! use flowrun_engine::{Collaborators, EventDispatcher, EventHandler, NoContainer, NoRepository, RunDescriptor};
//! # use flowrun_engine::{RunNamespace, ScriptError, ScriptLocator};
//! # use flowrun_types::{RunConfig, ScriptFile, ToolVersion};
//! # use serde_json::Value;
//! # struct Scripts;
//! # impl ScriptLocator for Scripts {
//! #     fn resolve(&self, _path: &Path) -> Result<ScriptFile, ScriptError> { unimplemented!() }
//! # }
//! # struct Namespace;
//! # impl RunNamespace for Namespace {
//! #     fn get(&self, _: &str) -> Option<Value> { None }
//! #     fn set(&self, _: &str, _: Value) {}
//! # }
//! # fn config() -> RunConfig { unimplemented!() }
//!
//! let version = ToolVersion::new("0.1.0", "dev", "");
//! let collaborators = Collaborators {
//!     scripts: &Scripts,
//!     vcs: &NoRepository,
//!     containers: &NoContainer,
//!     tool_version: &version,
//! };
//! let mut descriptor = RunDescriptor::create(Path::new("main.nf"), &config(), &collaborators)?;
//!
//! let mut dispatcher = EventDispatcher::new(Arc::new(Namespace));
//! dispatcher.on_complete(EventHandler::new(|scope| {
//!     println!("{}", scope.interpolate("Run ${runName} finished, success=${success}"));
//!     Ok(())
//! }));
//!
//! descriptor.mark_complete()?;
//! dispatcher.fire_complete(&descriptor)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`descriptor`**: the run record and its property whitelist
//! - **`scope`**: name resolution for handlers
//! - **`events`**: handler registration and firing
//! - **`collaborators`**: interfaces to script, version-control, container and namespace backends
//! - **`checksum`**: script content hashing

pub mod checksum;
pub mod collaborators;
pub mod descriptor;
pub mod events;
pub mod scope;

// Re-export commonly used types for convenience
pub use collaborators::{
    Collaborators, ContainerResolver, NoContainer, NoRepository, RunNamespace, ScriptError, ScriptLocator, VcsProvenance,
};
pub use descriptor::{DESCRIPTOR_BINDING, DescriptorError, RunDescriptor, public_property_names, select_container_engine};
pub use events::{DispatchError, EventDispatcher, EventHandler, HandlerFailure, HandlerFailureReport, RunEvent};
pub use scope::{ERROR_BINDING, HandlerScope, HelperFn, Resolution};
