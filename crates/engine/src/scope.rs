//! # Handler Scope Resolution
//!
//! Event handlers read run facts by name through a [`HandlerScope`]. Every
//! lookup walks a fixed chain at the moment it is made, so a handler always
//! observes current values:
//!
//! 0. names bound by the invocation itself (the [`ERROR_BINDING`] payload on error events)
//! 1. public descriptor properties (see [`crate::descriptor::properties`]), plus
//!    the whole property object under [`DESCRIPTOR_BINDING`]
//! 2. the run's shared namespace
//! 3. helpers registered on the handler
//! 4. otherwise the name is [`Resolution::Absent`]
//!
//! An unknown name is never an error. Descriptor internals are unreachable
//! because step 1 consults the property whitelist, not the struct.
//!
//! ## Template Syntax
//!
//! [`HandlerScope::interpolate`] replaces `${ ... }` expressions with resolved values:
//!
//! - `${runName}` - any name visible through the chain
//! - `${toolVersion.version}` - dotted navigation into object values
//! - `${configFiles.0}` - numeric segments index into arrays
//!
//! Absent names and `null` values render as the empty string.

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value};

use crate::{
    collaborators::RunNamespace,
    descriptor::{DESCRIPTOR_BINDING, RunDescriptor},
};

/// Reserved name under which error handlers see the error payload.
pub const ERROR_BINDING: &str = "error";

/// Helper routine visible to a single handler by name.
pub type HelperFn = Box<dyn Fn() -> Value + Send>;

/// Outcome of resolving a name, tagged with the tier that answered.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Bound by the event invocation (for example the error payload).
    Bound(Value),
    /// A public descriptor property.
    Descriptor(Value),
    /// A variable of the run's shared namespace.
    Namespace(Value),
    /// Result of invoking a helper registered on the handler.
    Lexical(Value),
    /// No tier knows the name.
    Absent,
}

impl Resolution {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Resolution::Bound(value) | Resolution::Descriptor(value) | Resolution::Namespace(value) | Resolution::Lexical(value) => {
                Some(value)
            }
            Resolution::Absent => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Resolution::Bound(value) | Resolution::Descriptor(value) | Resolution::Namespace(value) | Resolution::Lexical(value) => {
                Some(value)
            }
            Resolution::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Resolution::Absent)
    }

    /// Short label of the answering tier, used in logs and CLI output.
    pub fn source(&self) -> &'static str {
        match self {
            Resolution::Bound(_) => "bound",
            Resolution::Descriptor(_) => "descriptor",
            Resolution::Namespace(_) => "namespace",
            Resolution::Lexical(_) => "lexical",
            Resolution::Absent => "absent",
        }
    }
}

/// Name-resolution environment handed to a running handler.
pub struct HandlerScope<'a> {
    descriptor: &'a RunDescriptor,
    namespace: &'a dyn RunNamespace,
    bindings: Option<&'a JsonMap<String, Value>>,
    helpers: Option<&'a IndexMap<String, HelperFn>>,
}

impl<'a> HandlerScope<'a> {
    /// Creates a scope over a descriptor and a namespace, without bindings or helpers.
    pub fn new(descriptor: &'a RunDescriptor, namespace: &'a dyn RunNamespace) -> Self {
        Self {
            descriptor,
            namespace,
            bindings: None,
            helpers: None,
        }
    }

    /// Adds invocation-bound names that shadow the rest of the chain.
    pub fn with_bindings(mut self, bindings: &'a JsonMap<String, Value>) -> Self {
        self.bindings = Some(bindings);
        self
    }

    /// Adds handler-local helpers, consulted after the namespace.
    pub fn with_helpers(mut self, helpers: &'a IndexMap<String, HelperFn>) -> Self {
        self.helpers = Some(helpers);
        self
    }

    /// Resolves `name` through the chain.
    pub fn resolve(&self, name: &str) -> Resolution {
        if let Some(value) = self.bindings.and_then(|bindings| bindings.get(name)) {
            return Resolution::Bound(value.clone());
        }
        if let Some(value) = self.descriptor.property(name) {
            return Resolution::Descriptor(value);
        }
        // Rendered on every lookup; a published copy in the namespace may be stale.
        if name == DESCRIPTOR_BINDING {
            return Resolution::Descriptor(self.descriptor.to_json());
        }
        if let Some(value) = self.namespace.get(name) {
            return Resolution::Namespace(value);
        }
        if let Some(helper) = self.helpers.and_then(|helpers| helpers.get(name)) {
            return Resolution::Lexical(helper());
        }
        Resolution::Absent
    }

    /// Resolved value of `name`, or `None` when absent.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.resolve(name).into_value()
    }

    /// Resolves a dotted path such as `toolVersion.version` or `configFiles.0`.
    ///
    /// The first segment goes through the chain; the rest navigates the value.
    /// Returns `None` when any segment is missing.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let mut segments = path.trim().split('.');
        let head = segments.next().filter(|segment| !segment.is_empty())?;
        let root = self.get(head)?;
        let rest: Vec<&str> = segments.collect();
        navigate_json_path(&root, &rest).cloned()
    }

    /// Replaces every `${ ... }` expression in `template` with its resolved value.
    ///
    /// A missing closing brace leaves the remainder of the template untouched.
    pub fn interpolate(&self, template: &str) -> String {
        let mut output = String::new();
        let mut remaining = template;

        while let Some(start) = remaining.find("${") {
            let (before, after) = remaining.split_at(start);
            output.push_str(before);

            let Some(end) = after.find('}') else {
                output.push_str(after);
                return output;
            };
            let expression = after[2..end].trim();
            if let Some(value) = self.lookup(expression) {
                output.push_str(&format_json_value(&value));
            }
            remaining = &after[end + 1..];
        }

        output.push_str(remaining);
        output
    }

    /// Binds a variable in the shared namespace.
    pub fn set(&self, name: &str, value: Value) {
        self.namespace.set(name, value);
    }

    /// The descriptor this scope reads from.
    pub fn descriptor(&self) -> &RunDescriptor {
        self.descriptor
    }
}

/// Walks object keys and numeric array indices; `None` on the first miss.
fn navigate_json_path<'v>(root: &'v Value, segments: &[&str]) -> Option<&'v Value> {
    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(*segment)?,
            Value::Array(values) => values.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Formats a JSON value for template output.
///
/// - **Strings**: returned as-is
/// - **Numbers** and **booleans**: their literal text
/// - **Null**: empty string
/// - **Objects/Arrays**: compact JSON
pub fn format_json_value(value: &Value) -> String {
    match value {
        Value::String(string_value) => string_value.clone(),
        Value::Number(number_value) => number_value.to_string(),
        Value::Bool(boolean_value) => boolean_value.to_string(),
        Value::Null => String::new(),
        other_value => other_value.to_string(),
    }
}
