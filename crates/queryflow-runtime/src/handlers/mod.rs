//! Handler implementations
//!
//! Schema discovery and similarity matching carry real pipeline logic;
//! the remaining kinds are thin adapters over downstream collaborators.
//! `build_registry` assembles the full kind -> handler table the engine
//! dispatches through.

mod schema_discovery;
mod similarity;
mod verification;

pub use schema_discovery::SchemaDiscoveryHandler;
pub use similarity::SimilarityMatchingHandler;
pub use verification::{
    AutoApproveVerifier, UserVerificationHandler, VerificationDecision, VerificationRequest,
    Verifier,
};

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use queryflow_core::handler::{HandlerError, HandlerRegistry, ResolvedInput, TaskHandler};
use queryflow_core::types::{TaskKind, TaskResult};

use crate::bootstrap::AppContext;
use crate::collaborator::{Collaborator, CollaboratorError};

/// Adapter exposing an opaque collaborator as a task handler
pub struct AdapterHandler {
    kind: TaskKind,
    collaborator: Arc<dyn Collaborator>,
}

impl AdapterHandler {
    /// Wrap a collaborator under a task kind
    pub fn new(kind: TaskKind, collaborator: Arc<dyn Collaborator>) -> Self {
        Self { kind, collaborator }
    }
}

#[async_trait]
impl TaskHandler for AdapterHandler {
    fn kind(&self) -> TaskKind {
        self.kind
    }

    async fn execute(&self, input: ResolvedInput) -> Result<TaskResult, HandlerError> {
        let value = self
            .collaborator
            .execute(&input)
            .await
            .map_err(|e| match e {
                CollaboratorError::Unavailable(msg) => HandlerError::Unavailable(format!(
                    "{}: {}",
                    self.collaborator.name(),
                    msg
                )),
                CollaboratorError::Execution(msg) => {
                    HandlerError::Execution(format!("{}: {}", self.collaborator.name(), msg))
                }
            })?;

        let payload = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        Ok(TaskResult::completed(payload))
    }
}

/// The downstream services one pipeline instance talks to
#[derive(Clone)]
pub struct CollaboratorSet {
    pub analyzer: Arc<dyn Collaborator>,
    pub query_builder: Arc<dyn Collaborator>,
    pub query_runner: Arc<dyn Collaborator>,
    pub chart_builder: Arc<dyn Collaborator>,
    pub verifier: Arc<dyn Verifier>,
}

impl CollaboratorSet {
    /// Assemble a set with the built-in auto-approving verifier
    pub fn new(
        analyzer: Arc<dyn Collaborator>,
        query_builder: Arc<dyn Collaborator>,
        query_runner: Arc<dyn Collaborator>,
        chart_builder: Arc<dyn Collaborator>,
    ) -> Self {
        Self {
            analyzer,
            query_builder,
            query_runner,
            chart_builder,
            verifier: Arc::new(AutoApproveVerifier),
        }
    }

    /// Replace the verifier (e.g. with an interactive one)
    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = verifier;
        self
    }
}

/// Build the full handler registry for one pipeline instance
pub fn build_registry(context: &AppContext, collaborators: CollaboratorSet) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(SchemaDiscoveryHandler::new(
        context.matcher.clone(),
        context.catalog.clone(),
        context.build_options(),
    )));
    registry.register(Arc::new(SimilarityMatchingHandler::new(
        context.matcher.clone(),
    )));
    registry.register(Arc::new(UserVerificationHandler::new(
        collaborators.verifier,
    )));
    registry.register(Arc::new(AdapterHandler::new(
        TaskKind::SemanticAnalysis,
        collaborators.analyzer,
    )));
    registry.register(Arc::new(AdapterHandler::new(
        TaskKind::QueryGeneration,
        collaborators.query_builder,
    )));
    registry.register(Arc::new(AdapterHandler::new(
        TaskKind::Execution,
        collaborators.query_runner,
    )));
    registry.register(Arc::new(AdapterHandler::new(
        TaskKind::Visualization,
        collaborators.chart_builder,
    )));
    registry
}

/// Find a field either at the top level of the resolved input or inside
/// any upstream result carried in it. Plans differ in task ids, so
/// handlers locate well-known fields by name rather than by producer id.
pub(crate) fn find_field<'a>(input: &'a ResolvedInput, key: &str) -> Option<&'a Value> {
    if let Some(value) = input.get(key) {
        return Some(value);
    }
    input
        .values()
        .values()
        .filter_map(|v| v.as_object())
        .find_map(|obj| obj.get(key))
}

/// Collect the strings of a JSON array field, ignoring non-strings
pub(crate) fn string_items(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NamedCollaborator {
        name: &'static str,
        reply: Value,
    }

    #[async_trait]
    impl Collaborator for NamedCollaborator {
        fn name(&self) -> &str {
            self.name
        }

        async fn execute(&self, _input: &ResolvedInput) -> Result<Value, CollaboratorError> {
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_adapter_wraps_object_reply_as_completed_result() {
        let adapter = AdapterHandler::new(
            TaskKind::SemanticAnalysis,
            Arc::new(NamedCollaborator {
                name: "analyzer",
                reply: json!({"entities": ["orders"], "intent": "lookup"}),
            }),
        );

        let result = adapter.execute(ResolvedInput::new()).await.expect("result");
        assert!(!result.is_failed());
        assert_eq!(result.get("entities"), Some(&json!(["orders"])));
    }

    #[tokio::test]
    async fn test_adapter_wraps_scalar_reply_under_result_key() {
        let adapter = AdapterHandler::new(
            TaskKind::Visualization,
            Arc::new(NamedCollaborator {
                name: "charts",
                reply: json!("<svg/>"),
            }),
        );

        let result = adapter.execute(ResolvedInput::new()).await.expect("result");
        assert_eq!(result.get("result"), Some(&json!("<svg/>")));
    }

    #[test]
    fn test_find_field_searches_nested_upstream_results() {
        let mut input = ResolvedInput::new();
        input.insert("top_level", json!(1));
        input.insert(
            "1_discover_schema",
            json!({"discovered_tables": ["orders"], "status": "completed"}),
        );

        assert_eq!(find_field(&input, "top_level"), Some(&json!(1)));
        assert_eq!(
            find_field(&input, "discovered_tables"),
            Some(&json!(["orders"]))
        );
        assert_eq!(find_field(&input, "missing"), None);
    }

    #[test]
    fn test_string_items_filters_non_strings() {
        let value = json!(["a", 1, "b", null]);
        assert_eq!(string_items(Some(&value)), vec!["a", "b"]);
        assert!(string_items(None).is_empty());
    }
}
