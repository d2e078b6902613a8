//! In-memory run namespace.

use std::sync::Mutex;

use flowrun_engine::RunNamespace;
use indexmap::IndexMap;
use serde_json::Value;

/// Thread-safe, insertion-ordered variable store shared by every component of a run.
#[derive(Debug, Default)]
pub struct InMemoryNamespace {
    values: Mutex<IndexMap<String, Value>>,
}

impl InMemoryNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every binding in insertion order.
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.values.lock().expect("namespace lock poisoned").clone()
    }
}

impl RunNamespace for InMemoryNamespace {
    fn get(&self, name: &str) -> Option<Value> {
        self.values.lock().expect("namespace lock poisoned").get(name).cloned()
    }

    fn set(&self, name: &str, value: Value) {
        self.values.lock().expect("namespace lock poisoned").insert(name.to_string(), value);
    }
}
