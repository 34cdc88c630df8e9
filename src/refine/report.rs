use std::fmt::Display;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// Structured diagnostic output for one dataset's refinement run.
///
/// Check names map to outcomes (counts, booleans, error strings, or
/// timestamp lists). Keys are dataset-specific but structurally parallel
/// across dataset types; they are kept byte-compatible with the upstream
/// report format consumed by the frontend.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct QaReport(Map<String, JsonValue>);

impl QaReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.0.insert(key.to_string(), JsonValue::Bool(value));
    }

    pub fn set_count(&mut self, key: &str, count: usize) {
        self.0.insert(key.to_string(), JsonValue::from(count));
    }

    pub fn set_text(&mut self, key: &str, value: &str) {
        self.0
            .insert(key.to_string(), JsonValue::String(value.to_string()));
    }

    pub fn set_error(&mut self, key: &str, error: impl Display) {
        self.0
            .insert(key.to_string(), JsonValue::String(error.to_string()));
    }

    pub fn set_list(&mut self, key: &str, items: Vec<String>) {
        self.0.insert(
            key.to_string(),
            JsonValue::Array(items.into_iter().map(JsonValue::String).collect()),
        );
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Count entry as usize, if present and numeric. Test and assertion
    /// convenience.
    pub fn count(&self, key: &str) -> Option<usize> {
        self.0.get(key)?.as_u64().map(|n| n as usize)
    }
}
