//! Schema discovery handler
//!
//! Answers from the similarity index, but first checks the index is
//! actually complete: a partially built index would silently return an
//! incomplete candidate set. When the index or the catalog source is
//! unusable, discovery degrades to a bounded table listing instead of
//! failing the plan.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use queryflow_core::handler::{HandlerError, ResolvedInput, TaskHandler};
use queryflow_core::types::{TaskKind, TaskResult};
use queryflow_semantic::{BuildOptions, CatalogSource, SchemaMatcher};

/// Conservative estimate of indexed vectors per table (the table entry
/// plus its typical column chunks)
const EXPECTED_CHUNKS_PER_TABLE: usize = 4;

/// Rebuild when indexed/expected falls below this ratio
const COMPLETENESS_THRESHOLD: f64 = 0.8;

/// How many tables discovery proposes
const DISCOVERY_TOP_K: usize = 4;

/// Column detail fetched per proposed table
const COLUMNS_PER_TABLE: usize = 20;

/// Bounded listing size for the fallback path
const FALLBACK_TABLE_LIMIT: usize = 10;

/// Relevance score reported by the fallback path
const FALLBACK_RELEVANCE: f64 = 0.5;

pub struct SchemaDiscoveryHandler {
    matcher: Arc<SchemaMatcher>,
    catalog: Arc<dyn CatalogSource>,
    build_options: BuildOptions,
}

impl SchemaDiscoveryHandler {
    pub fn new(
        matcher: Arc<SchemaMatcher>,
        catalog: Arc<dyn CatalogSource>,
        build_options: BuildOptions,
    ) -> Self {
        Self {
            matcher,
            catalog,
            build_options,
        }
    }

    /// Compare live indexed-vector count against the expected count and
    /// rebuild when the ratio is too low or the index is empty.
    async fn ensure_index_complete(&self) -> Result<(), HandlerError> {
        let table_count = self
            .catalog
            .list_tables()
            .await
            .map_err(|e| HandlerError::Unavailable(e.to_string()))?
            .len();
        if table_count == 0 {
            return Ok(());
        }

        let indexed = self.matcher.vector_count().await;
        let expected = table_count * EXPECTED_CHUNKS_PER_TABLE;
        let completeness = indexed as f64 / expected as f64;

        tracing::info!(
            indexed,
            expected,
            completeness = format!("{:.1}%", completeness * 100.0),
            "index completeness check"
        );

        if indexed == 0 || completeness < COMPLETENESS_THRESHOLD {
            tracing::info!("index incomplete; triggering full rebuild");
            self.matcher
                .rebuild(self.catalog.as_ref(), &self.build_options)
                .await
                .map_err(|e| HandlerError::Execution(e.to_string()))?;
        }
        Ok(())
    }

    /// Discovery through the similarity index
    async fn discover(&self, query: &str) -> TaskResult {
        let tables = self
            .matcher
            .find_similar_tables(query, DISCOVERY_TOP_K, None)
            .await;

        let mut table_details = Vec::new();
        let mut suggestions = Vec::new();
        for (rank, table) in tables.iter().enumerate() {
            let columns = self
                .matcher
                .find_relevant_columns(query, Some(table.table_name.as_str()), COLUMNS_PER_TABLE)
                .await;
            table_details.push(json!({
                "name": table.table_name,
                "columns": columns
                    .iter()
                    .map(|c| json!({"name": c.column_name, "confidence": c.confidence}))
                    .collect::<Vec<_>>(),
            }));
            suggestions.push(json!({
                "rank": rank + 1,
                "table_name": table.table_name,
                "relevance_score": table.confidence,
                "estimated_relevance": relevance_label(table.confidence),
            }));
        }

        TaskResult::from_pairs([
            (
                "discovered_tables",
                json!(tables.iter().map(|t| &t.table_name).collect::<Vec<_>>()),
            ),
            ("table_details", Value::Array(table_details)),
            ("table_suggestions", Value::Array(suggestions)),
            ("discovery_method", json!("vector_index")),
        ])
    }

    /// Reduced-scope fallback: bounded listing with default relevance
    async fn fallback_discover(&self) -> Result<TaskResult, HandlerError> {
        let all_tables = self
            .catalog
            .list_tables()
            .await
            .map_err(|e| HandlerError::Unavailable(format!("fallback discovery failed: {e}")))?;
        let tables: Vec<String> = all_tables.into_iter().take(FALLBACK_TABLE_LIMIT).collect();

        let mut table_details = Vec::new();
        let mut suggestions = Vec::new();
        for (rank, table) in tables.iter().take(DISCOVERY_TOP_K).enumerate() {
            let columns = match self.catalog.describe_columns(table).await {
                Ok(columns) => columns
                    .iter()
                    .map(|c| json!({"name": c.name, "data_type": c.data_type}))
                    .collect::<Vec<_>>(),
                Err(error) => {
                    tracing::warn!(table = %table, %error, "fallback column fetch failed");
                    Vec::new()
                }
            };
            table_details.push(json!({"name": table, "columns": columns}));
            suggestions.push(json!({
                "rank": rank + 1,
                "table_name": table,
                "relevance_score": FALLBACK_RELEVANCE,
                "estimated_relevance": "Medium",
            }));
        }

        Ok(TaskResult::from_pairs([
            ("discovered_tables", json!(tables)),
            ("table_details", Value::Array(table_details)),
            ("table_suggestions", Value::Array(suggestions)),
            ("discovery_method", json!("fallback_listing")),
        ]))
    }
}

fn relevance_label(score: f32) -> &'static str {
    if score > 0.8 {
        "High"
    } else if score > 0.6 {
        "Medium"
    } else {
        "Low"
    }
}

#[async_trait]
impl TaskHandler for SchemaDiscoveryHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::SchemaDiscovery
    }

    async fn execute(&self, input: ResolvedInput) -> Result<TaskResult, HandlerError> {
        let query = input.original_query().to_string();

        match self.ensure_index_complete().await {
            Ok(()) => Ok(self.discover(&query).await),
            Err(error) => {
                tracing::warn!(%error, "index unavailable; using fallback discovery");
                self.fallback_discover().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use queryflow_semantic::{
        CatalogError, ColumnDef, EmbeddingProvider, MatcherConfig, ProviderError,
    };

    struct UnitProvider;

    #[async_trait]
    impl EmbeddingProvider for UnitProvider {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model(&self) -> &str {
            "unit"
        }
    }

    struct CountingCatalog {
        tables: Vec<String>,
        columns: HashMap<String, Vec<ColumnDef>>,
        list_calls: AtomicUsize,
        fail_listing: bool,
    }

    impl CountingCatalog {
        fn with_tables(count: usize) -> Self {
            let tables: Vec<String> = (0..count).map(|i| format!("table_{i}")).collect();
            let columns = tables
                .iter()
                .map(|t| {
                    (
                        t.clone(),
                        vec![
                            ColumnDef::new("id", "int"),
                            ColumnDef::new("created_at", "timestamp"),
                            ColumnDef::new("amount", "decimal"),
                        ],
                    )
                })
                .collect();
            Self {
                tables,
                columns,
                list_calls: AtomicUsize::new(0),
                fail_listing: false,
            }
        }

        fn failing() -> Self {
            Self {
                tables: Vec::new(),
                columns: HashMap::new(),
                list_calls: AtomicUsize::new(0),
                fail_listing: true,
            }
        }
    }

    #[async_trait]
    impl CatalogSource for CountingCatalog {
        async fn list_tables(&self) -> Result<Vec<String>, CatalogError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_listing {
                return Err(CatalogError::Connection("source down".to_string()));
            }
            Ok(self.tables.clone())
        }

        async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnDef>, CatalogError> {
            Ok(self.columns.get(table).cloned().unwrap_or_default())
        }
    }

    fn handler_for(
        dir: &tempfile::TempDir,
        catalog: Arc<CountingCatalog>,
    ) -> (SchemaDiscoveryHandler, Arc<SchemaMatcher>) {
        let matcher = Arc::new(SchemaMatcher::new(
            Arc::new(UnitProvider),
            MatcherConfig::new(dir.path().join("schema_embeddings.json")),
        ));
        let handler = SchemaDiscoveryHandler::new(
            matcher.clone(),
            catalog,
            BuildOptions::default(),
        );
        (handler, matcher)
    }

    fn query_input(text: &str) -> ResolvedInput {
        let mut input = ResolvedInput::new();
        input.insert("original_query", json!(text));
        input
    }

    #[tokio::test]
    async fn test_empty_index_with_ten_tables_triggers_rebuild() {
        let dir = tempfile::tempdir().expect("tempdir");
        let catalog = Arc::new(CountingCatalog::with_tables(10));
        let (handler, matcher) = handler_for(&dir, catalog);

        assert_eq!(matcher.vector_count().await, 0);
        let result = handler
            .execute(query_input("show amounts"))
            .await
            .expect("result");

        // 10 tables x (1 table + 3 columns) = 40 vectors after the rebuild.
        assert_eq!(matcher.vector_count().await, 40);
        assert!(!result.is_failed());
        assert_eq!(result.get("discovery_method"), Some(&json!("vector_index")));
        let suggestions = result
            .get("table_suggestions")
            .and_then(|v| v.as_array())
            .expect("suggestions");
        assert!(!suggestions.is_empty());
        assert_eq!(suggestions[0]["rank"], json!(1));
    }

    #[tokio::test]
    async fn test_complete_index_is_not_rebuilt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let catalog = Arc::new(CountingCatalog::with_tables(3));
        let (handler, matcher) = handler_for(&dir, catalog.clone());

        // First call rebuilds (completeness check + catalog collection each
        // list tables once); the second call only re-checks completeness.
        handler.execute(query_input("q")).await.expect("first");
        let calls_after_first = catalog.list_calls.load(Ordering::SeqCst);
        assert_eq!(calls_after_first, 2);

        handler.execute(query_input("q")).await.expect("second");
        assert_eq!(catalog.list_calls.load(Ordering::SeqCst), calls_after_first + 1);
        assert_eq!(matcher.vector_count().await, 12);
    }

    #[tokio::test]
    async fn test_source_failure_falls_back_or_degrades_without_plan_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let catalog = Arc::new(CountingCatalog::failing());
        let (handler, _matcher) = handler_for(&dir, catalog);

        // Both the completeness check and the fallback listing fail here;
        // the handler surfaces a handler error, which the engine records
        // as a non-critical fallback result.
        let result = handler.execute(query_input("q")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_relevance_labels_follow_score_boundaries() {
        assert_eq!(relevance_label(0.9), "High");
        assert_eq!(relevance_label(0.7), "Medium");
        assert_eq!(relevance_label(0.3), "Low");
    }
}
