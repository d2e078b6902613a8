//! Whitelist of descriptor properties visible to handlers.
//!
//! Handlers resolve descriptor facts by name through this table only. A field
//! of [`RunDescriptor`] that is not listed here does not exist as far as
//! handler code is concerned, whatever it happens to be called.
//!
//! Values are rendered to JSON on every lookup, so a handler always observes
//! the descriptor's current state:
//!
//! - paths render as strings
//! - timestamps render as RFC 3339 strings
//! - `duration` renders as whole milliseconds
//! - absent optional facts render as `null`

use std::path::Path;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde_json::{Map as JsonMap, Value, json};

use super::RunDescriptor;
use crate::collaborators::RunNamespace;

/// Name under which [`RunDescriptor::publish`] binds the descriptor in the shared namespace.
pub const DESCRIPTOR_BINDING: &str = "workflow";

type PropertyAccessor = fn(&RunDescriptor) -> Value;

static PUBLIC_PROPERTIES: Lazy<IndexMap<&'static str, PropertyAccessor>> = Lazy::new(|| {
    let mut table: IndexMap<&'static str, PropertyAccessor> = IndexMap::new();
    table.insert("scriptChecksum", |descriptor: &RunDescriptor| json!(descriptor.script_checksum()));
    table.insert("scriptPath", |descriptor: &RunDescriptor| path_value(descriptor.script_path()));
    table.insert("scriptName", |descriptor: &RunDescriptor| json!(descriptor.script_name()));
    table.insert("projectDir", |descriptor: &RunDescriptor| path_value(descriptor.project_dir()));
    table.insert("repositoryUrl", |descriptor: &RunDescriptor| json!(descriptor.repository_url()));
    table.insert("commitId", |descriptor: &RunDescriptor| json!(descriptor.commit_id()));
    table.insert("revision", |descriptor: &RunDescriptor| json!(descriptor.revision()));
    table.insert("containerImage", |descriptor: &RunDescriptor| json!(descriptor.container_image()));
    table.insert("containerEngine", |descriptor: &RunDescriptor| {
        json!(descriptor.container_engine().map(|engine| engine.as_str()))
    });
    table.insert("startTime", |descriptor: &RunDescriptor| json!(descriptor.start_time().to_rfc3339()));
    table.insert("completeTime", |descriptor: &RunDescriptor| {
        json!(descriptor.complete_time().map(|completed_at| completed_at.to_rfc3339()))
    });
    table.insert("duration", |descriptor: &RunDescriptor| {
        json!(descriptor.duration().map(|duration| duration.num_milliseconds()))
    });
    table.insert("commandLine", |descriptor: &RunDescriptor| json!(descriptor.command_line()));
    table.insert("profile", |descriptor: &RunDescriptor| json!(descriptor.profile()));
    table.insert("runId", |descriptor: &RunDescriptor| json!(descriptor.run_id()));
    table.insert("runName", |descriptor: &RunDescriptor| json!(descriptor.run_name()));
    table.insert("configFiles", |descriptor: &RunDescriptor| {
        Value::Array(descriptor.config_files().iter().map(|path| path_value(path)).collect())
    });
    table.insert("resume", |descriptor: &RunDescriptor| json!(descriptor.resume()));
    table.insert("stubRun", |descriptor: &RunDescriptor| json!(descriptor.stub_run()));
    table.insert("success", |descriptor: &RunDescriptor| json!(descriptor.success()));
    table.insert("exitStatus", |descriptor: &RunDescriptor| json!(descriptor.exit_status()));
    table.insert("errorMessage", |descriptor: &RunDescriptor| json!(descriptor.error_message()));
    table.insert("errorReport", |descriptor: &RunDescriptor| json!(descriptor.error_report()));
    table.insert("launchDir", |descriptor: &RunDescriptor| path_value(descriptor.launch_dir()));
    table.insert("workDir", |descriptor: &RunDescriptor| path_value(descriptor.work_dir()));
    table.insert("homeDir", |descriptor: &RunDescriptor| {
        descriptor.home_dir().map(path_value).unwrap_or(Value::Null)
    });
    table.insert("userName", |descriptor: &RunDescriptor| json!(descriptor.user_name()));
    table.insert("toolVersion", |descriptor: &RunDescriptor| {
        let version = descriptor.tool_version();
        json!({
            "version": version.version,
            "build": version.build,
            "timestamp": version.timestamp,
        })
    });
    table
});

/// Names of all properties handlers may read, in table order.
pub fn public_property_names() -> impl Iterator<Item = &'static str> {
    PUBLIC_PROPERTIES.keys().copied()
}

impl RunDescriptor {
    /// Current value of a whitelisted property, or `None` if `name` is not public.
    pub fn property(&self, name: &str) -> Option<Value> {
        PUBLIC_PROPERTIES.get(name).map(|accessor| accessor(self))
    }

    /// Renders every public property into a JSON object.
    pub fn to_json(&self) -> Value {
        let object: JsonMap<String, Value> = PUBLIC_PROPERTIES
            .iter()
            .map(|(name, accessor)| ((*name).to_string(), accessor(self)))
            .collect();
        Value::Object(object)
    }

    /// Binds a snapshot of the public properties under [`DESCRIPTOR_BINDING`].
    ///
    /// The snapshot serves readers of the namespace outside handlers; inside a
    /// handler scope the name resolves against the live descriptor instead.
    pub fn publish(&self, namespace: &dyn RunNamespace) {
        namespace.set(DESCRIPTOR_BINDING, self.to_json());
    }
}

fn path_value(path: &Path) -> Value {
    Value::String(path.display().to_string())
}
