//! Task result type
//!
//! TaskResult is the opaque mapping a handler returns. It always carries a
//! `status` field; failed results additionally carry an error description
//! and a fallback flag.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Terminal status of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Failed,
}

/// Result payload of one executed task.
///
/// Owned by the engine for one plan's lifetime and discarded after the
/// facade returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskResult(Map<String, Value>);

impl TaskResult {
    /// Build a completed result from a payload map
    pub fn completed(mut payload: Map<String, Value>) -> Self {
        payload.insert("status".to_string(), Value::String("completed".to_string()));
        Self(payload)
    }

    /// Build a failed result with an error description
    pub fn failed(error: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("status".to_string(), Value::String("failed".to_string()));
        payload.insert("error".to_string(), Value::String(error.into()));
        Self(payload)
    }

    /// Build a failed result that downstream tasks should treat as a
    /// degraded-but-usable placeholder
    pub fn failed_with_fallback(error: impl Into<String>) -> Self {
        let mut result = Self::failed(error);
        result
            .0
            .insert("fallback_used".to_string(), Value::Bool(true));
        result
    }

    /// Build a completed result from `(key, value)` pairs
    pub fn from_pairs(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        let mut payload = Map::new();
        for (key, value) in pairs {
            payload.insert(key.to_string(), value);
        }
        Self::completed(payload)
    }

    /// The status field every result carries
    pub fn status(&self) -> TaskStatus {
        match self.0.get("status").and_then(|v| v.as_str()) {
            Some("failed") => TaskStatus::Failed,
            _ => TaskStatus::Completed,
        }
    }

    /// Whether this result records a handler failure
    pub fn is_failed(&self) -> bool {
        self.status() == TaskStatus::Failed
    }

    /// Whether a fallback placeholder was substituted for real output
    pub fn fallback_used(&self) -> bool {
        self.0
            .get("fallback_used")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Recorded error description, if any
    pub fn error(&self) -> Option<&str> {
        self.0.get("error").and_then(|v| v.as_str())
    }

    /// Get one field of the payload
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Borrow the full payload map
    pub fn payload(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert into a plain JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// View as a JSON value without consuming
    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}
