//! Similarity matching handler
//!
//! Ranks discovered tables and columns against the question through the
//! similarity index. When the index yields nothing (degraded provider,
//! empty index), matching falls back to the discovery ordering so the
//! pipeline still produces candidates.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use queryflow_core::handler::{HandlerError, ResolvedInput, TaskHandler};
use queryflow_core::types::{TaskKind, TaskResult};
use queryflow_semantic::SchemaMatcher;

use super::{find_field, string_items};

/// How many tables a match proposes downstream
const MATCH_TOP_K: usize = 3;

/// Column detail per matched table
const MATCH_COLUMNS_PER_TABLE: usize = 5;

/// Default score attached to fallback-ordered tables
const FALLBACK_SCORE: f64 = 0.8;

pub struct SimilarityMatchingHandler {
    matcher: Arc<SchemaMatcher>,
}

impl SimilarityMatchingHandler {
    pub fn new(matcher: Arc<SchemaMatcher>) -> Self {
        Self { matcher }
    }
}

fn confidence_tier(best_score: Option<f32>) -> &'static str {
    match best_score {
        Some(score) if score > 0.8 => "high",
        Some(_) => "medium",
        None => "low",
    }
}

#[async_trait]
impl TaskHandler for SimilarityMatchingHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::SimilarityMatching
    }

    async fn execute(&self, input: ResolvedInput) -> Result<TaskResult, HandlerError> {
        let query = input.original_query().to_string();
        let entities = string_items(find_field(&input, "entities"));
        let discovered = string_items(find_field(&input, "discovered_tables"));

        tracing::info!(
            entities = entities.len(),
            discovered_tables = discovered.len(),
            "similarity matching"
        );

        let ranked = self
            .matcher
            .find_similar_tables(&query, MATCH_TOP_K, None)
            .await;

        let (matched_tables, scores, tier) = if !ranked.is_empty() {
            let tables: Vec<String> = ranked.iter().map(|m| m.table_name.clone()).collect();
            let scores: Vec<f64> = ranked.iter().map(|m| m.confidence as f64).collect();
            let tier = confidence_tier(ranked.first().map(|m| m.similarity));
            (tables, scores, tier)
        } else if !discovered.is_empty() {
            // Index produced nothing; keep the discovery ordering.
            let tables: Vec<String> = discovered.iter().take(MATCH_TOP_K).cloned().collect();
            let scores = vec![FALLBACK_SCORE; tables.len()];
            (tables, scores, "medium")
        } else {
            return Ok(TaskResult::from_pairs([
                ("matched_tables", json!([])),
                ("matched_columns", json!([])),
                ("similarity_scores", json!([])),
                ("confidence", json!("low")),
                ("entities_matched", json!(entities)),
                ("note", json!("no tables discovered for matching")),
            ]));
        };

        let mut matched_columns = Vec::new();
        for table in &matched_tables {
            let columns = self
                .matcher
                .find_relevant_columns(&query, Some(table.as_str()), MATCH_COLUMNS_PER_TABLE)
                .await;
            for column in columns {
                matched_columns.push(json!({
                    "table_name": column.table_name,
                    "column_name": column.column_name,
                    "confidence": column.confidence,
                }));
            }
        }

        Ok(TaskResult::from_pairs([
            ("matched_tables", json!(matched_tables)),
            ("matched_columns", Value::Array(matched_columns)),
            ("similarity_scores", json!(scores)),
            ("confidence", json!(tier)),
            ("entities_matched", json!(entities)),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use queryflow_semantic::{
        BuildOptions, CatalogError, CatalogSource, ColumnDef, EmbeddingProvider, MatcherConfig,
        ProviderError,
    };

    /// Axis 0 = order language, axis 1 = customer language.
    struct TopicProvider;

    #[async_trait]
    impl EmbeddingProvider for TopicProvider {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    vec![
                        lower.contains("order") as u8 as f32,
                        lower.contains("customer") as u8 as f32,
                        0.1,
                    ]
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model(&self) -> &str {
            "topic"
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Err(ProviderError::MissingCredentials)
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model(&self) -> &str {
            "failing"
        }
    }

    struct TwoTableCatalog;

    #[async_trait]
    impl CatalogSource for TwoTableCatalog {
        async fn list_tables(&self) -> Result<Vec<String>, CatalogError> {
            Ok(vec!["orders".to_string(), "customers".to_string()])
        }

        async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnDef>, CatalogError> {
            match table {
                "orders" => Ok(vec![ColumnDef::new("order_total", "decimal")]),
                _ => Ok(vec![ColumnDef::new("customer_name", "varchar")]),
            }
        }
    }

    async fn built_matcher(
        dir: &tempfile::TempDir,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Arc<SchemaMatcher> {
        let matcher = Arc::new(SchemaMatcher::new(
            provider,
            MatcherConfig::new(dir.path().join("cache.json")),
        ));
        matcher
            .build_or_load(&TwoTableCatalog, &BuildOptions::default())
            .await
            .expect("build");
        matcher
    }

    fn input_with_discovery(query: &str, tables: Vec<&str>) -> ResolvedInput {
        let mut input = ResolvedInput::new();
        input.insert("original_query", json!(query));
        input.insert(
            "1_discover_schema",
            json!({"discovered_tables": tables, "status": "completed"}),
        );
        input.insert(
            "2_semantic_analysis",
            json!({"entities": ["order"], "status": "completed"}),
        );
        input
    }

    #[tokio::test]
    async fn test_ranks_topically_matching_table_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let matcher = built_matcher(&dir, Arc::new(TopicProvider)).await;
        let handler = SimilarityMatchingHandler::new(matcher);

        let result = handler
            .execute(input_with_discovery(
                "total order value",
                vec!["orders", "customers"],
            ))
            .await
            .expect("result");

        let matched = result
            .get("matched_tables")
            .and_then(|v| v.as_array())
            .expect("tables");
        assert_eq!(matched[0], json!("orders"));
        assert_eq!(result.get("entities_matched"), Some(&json!(["order"])));
        let columns = result
            .get("matched_columns")
            .and_then(|v| v.as_array())
            .expect("columns");
        assert!(!columns.is_empty());
    }

    #[tokio::test]
    async fn test_degraded_index_falls_back_to_discovery_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let matcher = built_matcher(&dir, Arc::new(FailingProvider)).await;
        let handler = SimilarityMatchingHandler::new(matcher);

        let result = handler
            .execute(input_with_discovery("anything", vec!["customers", "orders"]))
            .await
            .expect("result");

        assert_eq!(
            result.get("matched_tables"),
            Some(&json!(["customers", "orders"]))
        );
        assert_eq!(result.get("confidence"), Some(&json!("medium")));
    }

    #[tokio::test]
    async fn test_no_candidates_completes_with_empty_match_set() {
        let dir = tempfile::tempdir().expect("tempdir");
        let matcher = built_matcher(&dir, Arc::new(FailingProvider)).await;
        let handler = SimilarityMatchingHandler::new(matcher);

        let mut input = ResolvedInput::new();
        input.insert("original_query", json!("q"));
        let result = handler.execute(input).await.expect("result");

        assert!(!result.is_failed());
        assert_eq!(result.get("matched_tables"), Some(&json!([])));
        assert_eq!(result.get("confidence"), Some(&json!("low")));
    }
}
