//! Deterministic fallback planner
//!
//! Whenever the reasoning backend fails or returns an invalid plan, the
//! pipeline falls back to this fixed 7-step chain. It must always exist
//! and must always validate as acyclic.

use async_trait::async_trait;
use serde_json::json;

use queryflow_core::planner::{PlanError, Planner, PlannerContext};
use queryflow_core::types::{InputValue, Plan, QueryRequest, TaskKind, TaskRef, TaskSpec};

/// The fixed default pipeline for a question:
/// discover schema and analyze semantics in parallel, then match,
/// verify, generate, execute, and visualize in sequence.
pub fn default_plan(query: &QueryRequest) -> Plan {
    let question = query.text.clone();

    Plan::new(
        question.clone(),
        vec![
            TaskSpec::new("1_discover_schema", TaskKind::SchemaDiscovery)
                .with_input("query", InputValue::literal(json!(question.clone())))
                .with_required_output("schema_context", "discovered_tables_and_columns")
                .with_constraint("max_tables", json!(20)),
            TaskSpec::new("2_semantic_analysis", TaskKind::SemanticAnalysis)
                .with_input("query", InputValue::literal(json!(question.clone())))
                .with_required_output("entities", "extracted_entities")
                .with_required_output("intent", "business_intent"),
            TaskSpec::new("3_similarity_matching", TaskKind::SimilarityMatching)
                .with_dependencies(vec![
                    "1_discover_schema".to_string(),
                    "2_semantic_analysis".to_string(),
                ])
                .with_input(
                    "entities",
                    InputValue::Reference(TaskRef::output("2_semantic_analysis", "entities")),
                )
                .with_input(
                    "schema",
                    InputValue::Reference(TaskRef::task("1_discover_schema")),
                )
                .with_required_output("matched_tables", "relevant_tables")
                .with_required_output("matched_columns", "relevant_columns")
                .with_constraint("min_similarity", json!(0.7)),
            TaskSpec::new("4_user_verification", TaskKind::UserVerification)
                .with_dependencies(vec!["3_similarity_matching".to_string()])
                .with_input(
                    "proposed_matches",
                    InputValue::Reference(TaskRef::task("3_similarity_matching")),
                )
                .with_required_output("confirmed_tables", "user_approved_tables")
                .with_constraint("require_explicit_approval", json!(true)),
            TaskSpec::new("5_query_generation", TaskKind::QueryGeneration)
                .with_dependencies(vec!["4_user_verification".to_string()])
                .with_input(
                    "confirmed_schema",
                    InputValue::Reference(TaskRef::task("4_user_verification")),
                )
                .with_input("original_query", InputValue::literal(json!(question.clone())))
                .with_required_output("sql_query", "generated_sql")
                .with_required_output("explanation", "query_explanation")
                .with_constraint("add_safety_checks", json!(true)),
            TaskSpec::new("6_query_execution", TaskKind::Execution)
                .with_dependencies(vec!["5_query_generation".to_string()])
                .with_input(
                    "validated_query",
                    InputValue::Reference(TaskRef::output("5_query_generation", "sql_query")),
                )
                .with_required_output("results", "query_results")
                .with_constraint("timeout", json!(300))
                .with_constraint("max_rows", json!(10_000)),
            TaskSpec::new("7_visualization", TaskKind::Visualization)
                .with_dependencies(vec!["6_query_execution".to_string()])
                .with_input(
                    "results",
                    InputValue::Reference(TaskRef::output("6_query_execution", "results")),
                )
                .with_input("original_query", InputValue::literal(json!(question)))
                .with_required_output("charts", "interactive_charts")
                .with_required_output("summary", "narrative_summary")
                .with_constraint("interactive", json!(true)),
        ],
    )
}

/// Planner that always answers with the default chain
pub struct DefaultPlanner;

#[async_trait]
impl Planner for DefaultPlanner {
    async fn plan(
        &self,
        query: &QueryRequest,
        _context: &PlannerContext,
    ) -> Result<Plan, PlanError> {
        Ok(default_plan(query))
    }
}
