//! Capability registry
//!
//! Static, read-only descriptors of the agents the pipeline can dispatch
//! to. The planner reads this registry to know what work is available;
//! nothing mutates it after startup.

use serde::{Deserialize, Serialize};

use crate::types::TaskKind;

/// Describes what one agent can do
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    /// Agent name (unique)
    pub name: String,
    /// One-line description for planner prompts
    pub description: String,
    /// Kind of task this agent handles
    pub kind: TaskKind,
    /// Input tags the agent consumes
    pub input_types: Vec<String>,
    /// Output tags the agent produces
    pub output_types: Vec<String>,
    /// Relative cost of invoking the agent
    pub cost_factor: f32,
    /// Historical reliability in [0, 1]
    pub reliability_score: f32,
    /// Domain tags for planner matching
    pub specialized_domains: Vec<String>,
}

impl Capability {
    fn new(
        name: &str,
        description: &str,
        kind: TaskKind,
        input_types: &[&str],
        output_types: &[&str],
        cost_factor: f32,
        reliability_score: f32,
        specialized_domains: &[&str],
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind,
            input_types: input_types.iter().map(|s| s.to_string()).collect(),
            output_types: output_types.iter().map(|s| s.to_string()).collect(),
            cost_factor,
            reliability_score,
            specialized_domains: specialized_domains.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Read-only registry of agent capabilities
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    capabilities: Vec<Capability>,
}

impl CapabilityRegistry {
    /// Registry of the built-in pipeline agents
    pub fn builtin() -> Self {
        Self {
            capabilities: vec![
                Capability::new(
                    "schema_discoverer",
                    "Discovers database schema, tables, columns, relationships",
                    TaskKind::SchemaDiscovery,
                    &["natural_language_query", "database_connection"],
                    &["schema_context", "table_list", "column_mappings"],
                    0.3,
                    0.95,
                    &["database", "schema", "metadata"],
                ),
                Capability::new(
                    "semantic_analyzer",
                    "Understands business intent and extracts entities",
                    TaskKind::SemanticAnalysis,
                    &["natural_language_query", "business_context"],
                    &["entities", "intent", "business_terms"],
                    0.2,
                    0.90,
                    &["nlp", "business_logic"],
                ),
                Capability::new(
                    "vector_matcher",
                    "Performs similarity matching between query and schema",
                    TaskKind::SimilarityMatching,
                    &["entities", "schema_context", "embeddings"],
                    &["similarity_scores", "matched_tables", "matched_columns"],
                    0.4,
                    0.88,
                    &["vector_search", "embeddings", "similarity"],
                ),
                Capability::new(
                    "user_verifier",
                    "Interacts with the user to confirm schema selections and queries",
                    TaskKind::UserVerification,
                    &["proposed_tables", "proposed_columns", "generated_query"],
                    &["user_confirmation", "modifications", "approval"],
                    0.1,
                    0.98,
                    &["user_interaction", "verification", "confirmation"],
                ),
                Capability::new(
                    "query_builder",
                    "Generates SQL queries with validation and safety checks",
                    TaskKind::QueryGeneration,
                    &["matched_schema", "business_logic", "filters"],
                    &["sql_query", "explanation", "safety_assessment"],
                    0.3,
                    0.92,
                    &["sql", "query_optimization", "safety"],
                ),
                Capability::new(
                    "query_executor",
                    "Safely executes queries and handles results",
                    TaskKind::Execution,
                    &["validated_query", "database_connection", "safety_params"],
                    &["query_results", "execution_stats", "error_handling"],
                    0.5,
                    0.94,
                    &["execution", "database", "safety"],
                ),
                Capability::new(
                    "visualizer",
                    "Creates interactive visualizations and summaries",
                    TaskKind::Visualization,
                    &["query_results", "data_types", "user_preferences"],
                    &["charts", "tables", "narrative_summary"],
                    0.3,
                    0.89,
                    &["visualization", "charts", "reporting"],
                ),
            ],
        }
    }

    /// All capabilities in registration order
    pub fn all(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Look up the capability serving one task kind
    pub fn for_kind(&self, kind: TaskKind) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.kind == kind)
    }

    /// Look up a capability by agent name
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_covers_pipeline_kinds() {
        let registry = CapabilityRegistry::builtin();
        assert_eq!(registry.all().len(), 7);
        for kind in [
            TaskKind::SchemaDiscovery,
            TaskKind::SemanticAnalysis,
            TaskKind::SimilarityMatching,
            TaskKind::UserVerification,
            TaskKind::QueryGeneration,
            TaskKind::Execution,
            TaskKind::Visualization,
        ] {
            assert!(registry.for_kind(kind).is_some(), "missing {kind}");
        }
    }

    #[test]
    fn test_lookup_by_name() {
        let registry = CapabilityRegistry::builtin();
        let matcher = registry.get("vector_matcher").expect("vector_matcher");
        assert_eq!(matcher.kind, TaskKind::SimilarityMatching);
        assert!(matcher
            .specialized_domains
            .iter()
            .any(|d| d == "embeddings"));
    }
}
