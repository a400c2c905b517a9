//! Index construction
//!
//! Pulls the full catalog from the source of truth, orders and truncates
//! tables, generates descriptions, and embeds them in dynamically sized
//! batches. Column fetches fan out over a small bounded worker pool;
//! per-worker results are merged afterwards so no shared accumulator
//! needs locking.

use futures_util::stream::{self, StreamExt};

use crate::catalog::{CatalogSource, SchemaItem};
use crate::describe;
use crate::error::CatalogError;
use crate::provider::{zero_vectors, EmbeddingProvider};

/// Bounded concurrency for per-table column fetches. Motivated by
/// latency-hiding on metadata reads, not CPU parallelism.
const CATALOG_FETCH_WORKERS: usize = 3;

/// Schemas above this table count get name-pattern prioritization
const LARGE_SCHEMA_THRESHOLD: usize = 50;

/// Name fragments that mark a table as likely important
const PRIORITY_NAME_PATTERNS: &[&str] = &[
    "main", "core", "primary", "fact", "dim", "lookup", "ref", "analytics",
];

/// Options controlling a build
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Rebuild even when a fresh cache exists
    pub force_rebuild: bool,
    /// Cap on the number of tables to embed (priority items always kept)
    pub max_tables: Option<usize>,
    /// Table names to order first regardless of heuristics
    pub important_tables: Vec<String>,
}

/// Embedding batch size scaled to total corpus volume: small batches keep
/// latency low for small corpora, larger ones amortize provider overhead
/// for thousands of items.
pub fn batch_size_for(total: usize) -> usize {
    if total < 100 {
        20
    } else if total < 500 {
        30
    } else if total < 1000 {
        40
    } else if total < 3000 {
        50
    } else {
        75
    }
}

/// Order tables so prioritized ones come first, then optionally truncate.
///
/// Explicit `important_tables` win; otherwise large schemas fall back to
/// name-pattern heuristics. Truncation keeps the front of the ordered
/// list, so priority items survive it.
pub fn prioritize_tables(
    all_tables: Vec<String>,
    important_tables: &[String],
    max_tables: Option<usize>,
) -> Vec<String> {
    let mut ordered = if !important_tables.is_empty() {
        let mut priority: Vec<String> = important_tables
            .iter()
            .filter(|t| all_tables.contains(t))
            .cloned()
            .collect();
        let rest: Vec<String> = all_tables
            .into_iter()
            .filter(|t| !priority.contains(t))
            .collect();
        priority.extend(rest);
        priority
    } else if all_tables.len() > LARGE_SCHEMA_THRESHOLD {
        let (mut priority, other): (Vec<String>, Vec<String>) =
            all_tables.into_iter().partition(|table| {
                let lower = table.to_lowercase();
                PRIORITY_NAME_PATTERNS.iter().any(|p| lower.contains(p))
            });
        priority.extend(other);
        priority
    } else {
        all_tables
    };

    if let Some(max) = max_tables {
        if ordered.len() > max {
            tracing::info!(kept = max, "table list truncated for index build");
            ordered.truncate(max);
        }
    }
    ordered
}

/// Fetch one table's items: the table itself plus its columns. A column
/// fetch failure keeps the table item and drops its columns.
async fn collect_table(source: &dyn CatalogSource, table_name: &str) -> Vec<SchemaItem> {
    let mut table_item = SchemaItem::table(table_name);
    table_item.description = describe::describe(&table_item);
    let mut items = vec![table_item];

    match source.describe_columns(table_name).await {
        Ok(columns) => {
            for column in columns {
                let mut item = SchemaItem::column(table_name, &column.name, &column.data_type);
                item.description = describe::describe(&item);
                items.push(item);
            }
        }
        Err(error) => {
            tracing::warn!(
                table = table_name,
                %error,
                "column fetch failed; keeping table without columns"
            );
        }
    }

    items
}

/// Pull the catalog and produce described items, tables first within each
/// table group. Table metadata reads are independent and side-effect-free,
/// so they fan out across a fixed worker pool.
pub async fn collect_catalog(
    source: &dyn CatalogSource,
    options: &BuildOptions,
) -> Result<Vec<SchemaItem>, CatalogError> {
    let all_tables = source.list_tables().await?;
    if all_tables.is_empty() {
        tracing::warn!("catalog reported no tables");
        return Ok(Vec::new());
    }

    let total = all_tables.len();
    let tables = prioritize_tables(all_tables, &options.important_tables, options.max_tables);
    tracing::info!(
        selected = tables.len(),
        total,
        "collecting schema items for index build"
    );

    let per_table: Vec<Vec<SchemaItem>> = stream::iter(tables)
        .map(|table| async move { collect_table(source, &table).await })
        .buffered(CATALOG_FETCH_WORKERS)
        .collect()
        .await;

    Ok(per_table.into_iter().flatten().collect())
}

/// Embed all descriptions, batch by batch. A failed batch degrades to
/// zero vectors for its members instead of aborting the build.
pub async fn embed_descriptions(
    provider: &dyn EmbeddingProvider,
    descriptions: &[String],
) -> Vec<Vec<f32>> {
    let total = descriptions.len();
    if total == 0 {
        return Vec::new();
    }

    let batch_size = batch_size_for(total);
    let total_batches = total.div_ceil(batch_size);
    tracing::info!(total, batch_size, total_batches, "embedding descriptions");

    let mut vectors = Vec::with_capacity(total);
    for (batch_index, batch) in descriptions.chunks(batch_size).enumerate() {
        match provider.embed(batch).await {
            Ok(mut batch_vectors) if batch_vectors.len() == batch.len() => {
                vectors.append(&mut batch_vectors);
            }
            Ok(batch_vectors) => {
                tracing::warn!(
                    batch = batch_index + 1,
                    expected = batch.len(),
                    actual = batch_vectors.len(),
                    "provider returned wrong batch length; substituting zero vectors"
                );
                vectors.extend(zero_vectors(batch.len(), provider.dimension()));
            }
            Err(error) => {
                tracing::warn!(
                    batch = batch_index + 1,
                    total_batches,
                    %error,
                    "embedding batch failed; substituting zero vectors"
                );
                vectors.extend(zero_vectors(batch.len(), provider.dimension()));
            }
        }
    }

    vectors
}

/// Full build: collect, describe, embed, attach
pub async fn build_items(
    source: &dyn CatalogSource,
    provider: &dyn EmbeddingProvider,
    options: &BuildOptions,
) -> Result<Vec<SchemaItem>, CatalogError> {
    let mut items = collect_catalog(source, options).await?;
    let descriptions: Vec<String> = items.iter().map(|i| i.description.clone()).collect();
    let vectors = embed_descriptions(provider, &descriptions).await;

    for (item, vector) in items.iter_mut().zip(vectors) {
        item.embedding = Some(vector);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::catalog::ColumnDef;
    use crate::error::ProviderError;

    struct FixtureCatalog {
        tables: Vec<String>,
        columns: HashMap<String, Vec<ColumnDef>>,
        failing_tables: Vec<String>,
    }

    #[async_trait]
    impl CatalogSource for FixtureCatalog {
        async fn list_tables(&self) -> Result<Vec<String>, CatalogError> {
            Ok(self.tables.clone())
        }

        async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnDef>, CatalogError> {
            if self.failing_tables.iter().any(|t| t == table) {
                return Err(CatalogError::Query(format!("cannot describe {table}")));
            }
            Ok(self.columns.get(table).cloned().unwrap_or_default())
        }
    }

    struct CountingProvider {
        calls: AtomicUsize,
        fail_batch: Option<usize>,
    }

    impl CountingProvider {
        fn new(fail_batch: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_batch,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(call) == self.fail_batch {
                return Err(ProviderError::Http("batch failure".to_string()));
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_batch_size_scales_with_corpus_volume() {
        assert_eq!(batch_size_for(10), 20);
        assert_eq!(batch_size_for(100), 30);
        assert_eq!(batch_size_for(700), 40);
        assert_eq!(batch_size_for(2500), 50);
        assert_eq!(batch_size_for(5000), 75);
    }

    #[test]
    fn test_explicit_important_tables_come_first_and_survive_truncation() {
        let all = vec![
            "alpha".to_string(),
            "beta".to_string(),
            "gamma".to_string(),
        ];
        let ordered = prioritize_tables(all, &["gamma".to_string()], Some(2));
        assert_eq!(ordered, vec!["gamma".to_string(), "alpha".to_string()]);
    }

    #[test]
    fn test_pattern_heuristics_apply_only_to_large_schemas() {
        let small = vec!["zzz".to_string(), "fact_sales".to_string()];
        assert_eq!(prioritize_tables(small.clone(), &[], None), small);

        let mut large: Vec<String> = (0..60).map(|i| format!("misc_{i}")).collect();
        large.push("fact_sales".to_string());
        let ordered = prioritize_tables(large, &[], None);
        assert_eq!(ordered[0], "fact_sales");
    }

    #[tokio::test]
    async fn test_collect_keeps_table_when_column_fetch_fails() {
        let catalog = FixtureCatalog {
            tables: vec!["orders".to_string(), "broken".to_string()],
            columns: HashMap::from([(
                "orders".to_string(),
                vec![
                    ColumnDef::new("id", "int"),
                    ColumnDef::new("created_at", "timestamp"),
                ],
            )]),
            failing_tables: vec!["broken".to_string()],
        };

        let items = collect_catalog(&catalog, &BuildOptions::default())
            .await
            .expect("collect");

        let keys: Vec<String> = items.iter().map(|i| i.key()).collect();
        assert!(keys.contains(&"orders".to_string()));
        assert!(keys.contains(&"orders.id".to_string()));
        assert!(keys.contains(&"orders.created_at".to_string()));
        // The failing table survives as a bare table item.
        assert!(keys.contains(&"broken".to_string()));
        assert!(!keys.iter().any(|k| k.starts_with("broken.")));
        // Every item carries a generated description.
        assert!(items.iter().all(|i| !i.description.is_empty()));
    }

    #[tokio::test]
    async fn test_failed_batch_degrades_to_zero_vectors() {
        let provider = CountingProvider::new(Some(1));
        // 50 descriptions with batch size 20 -> 3 batches; batch index 1 fails.
        let descriptions: Vec<String> = (0..50).map(|i| format!("desc {i}")).collect();

        let vectors = embed_descriptions(&provider, &descriptions).await;
        assert_eq!(vectors.len(), 50);
        assert!(vectors[0].iter().any(|x| *x != 0.0));
        assert!(vectors[25].iter().all(|x| *x == 0.0));
        assert!(vectors[45].iter().any(|x| *x != 0.0));
    }

    #[tokio::test]
    async fn test_build_items_attaches_embeddings() {
        let catalog = FixtureCatalog {
            tables: vec!["orders".to_string()],
            columns: HashMap::from([(
                "orders".to_string(),
                vec![ColumnDef::new("id", "int")],
            )]),
            failing_tables: vec![],
        };
        let provider = CountingProvider::new(None);

        let items = build_items(&catalog, &provider, &BuildOptions::default())
            .await
            .expect("build");
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.embedding.is_some()));
    }
}
