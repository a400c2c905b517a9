//! Task handler abstraction
//!
//! Handlers are the execution units the engine dispatches to. The engine
//! treats them as black boxes: resolved input in, status-carrying result
//! out. Each task kind maps to exactly one handler via the registry;
//! extending the pipeline means registering another implementation.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::types::TaskKind;
use crate::types::TaskResult;

/// Handler execution errors.
///
/// For non-critical task kinds the engine converts these into recorded
/// failures and keeps going; for critical kinds they abort the plan.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("execution failed: {0}")]
    Execution(String),
}

/// Fully resolved input for one task dispatch.
///
/// Built by the engine from the original query, all previously completed
/// results, and the task's own input spec.
#[derive(Debug, Clone, Default)]
pub struct ResolvedInput {
    values: Map<String, Value>,
}

impl ResolvedInput {
    /// Create an empty input
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from an existing map
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Insert a value, replacing any existing entry
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a string value by key
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    /// The original question text, present in every resolved input
    pub fn original_query(&self) -> &str {
        self.get_str("original_query").unwrap_or_default()
    }

    /// A previously completed task's full result, keyed by its id
    pub fn result_of(&self, task_id: &str) -> Option<&Value> {
        self.values.get(task_id)
    }

    /// Borrow the underlying map
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Convert into the underlying map
    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }
}

/// The handler trait - one implementation per task kind
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// The task kind this handler serves
    fn kind(&self) -> TaskKind;

    /// Execute with fully resolved input
    async fn execute(&self, input: ResolvedInput) -> Result<TaskResult, HandlerError>;
}

/// Registry mapping task kinds to handler implementations
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its declared kind
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    /// Get the handler for a kind
    pub fn get(&self, kind: TaskKind) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(&kind).cloned()
    }

    /// Kinds with a registered handler
    pub fn kinds(&self) -> Vec<TaskKind> {
        self.handlers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl TaskHandler for EchoHandler {
        fn kind(&self) -> TaskKind {
            TaskKind::SemanticAnalysis
        }

        async fn execute(&self, input: ResolvedInput) -> Result<TaskResult, HandlerError> {
            Ok(TaskResult::from_pairs([(
                "echo",
                json!(input.original_query()),
            )]))
        }
    }

    #[test]
    fn test_registry_dispatches_by_kind() {
        tokio_test::block_on(async {
            let mut registry = HandlerRegistry::new();
            registry.register(Arc::new(EchoHandler));

            let handler = registry.get(TaskKind::SemanticAnalysis).expect("handler");
            let mut input = ResolvedInput::new();
            input.insert("original_query", json!("top products"));

            let result = handler.execute(input).await.expect("result");
            assert_eq!(result.get("echo"), Some(&json!("top products")));
            assert!(registry.get(TaskKind::Execution).is_none());
        });
    }
}
