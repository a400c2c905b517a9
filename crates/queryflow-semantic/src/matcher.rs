//! Schema matcher facade
//!
//! Owns the embedding provider, the persistent cache, and the current
//! similarity index generation. Many concurrent readers query the index;
//! writes happen only during build/rebuild and swap a complete new
//! generation in, so readers never observe a partial index.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::builder::{self, BuildOptions};
use crate::cache::{default_max_age, EmbeddingCache};
use crate::catalog::CatalogSource;
use crate::error::SemanticError;
use crate::index::{ColumnMatch, HybridMatches, SimilarityIndex, TableMatch};
use crate::provider::EmbeddingProvider;

/// Default similarity threshold for table searches
pub const DEFAULT_TABLE_THRESHOLD: f32 = 0.3;

/// Matcher configuration
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Location of the persistent cache document
    pub cache_path: PathBuf,
    /// Freshness window for loaded caches
    pub max_cache_age: chrono::Duration,
    /// Similarity threshold applied to table matches
    pub table_threshold: f32,
}

impl MatcherConfig {
    /// Config with defaults for everything but the cache location
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            max_cache_age: default_max_age(),
            table_threshold: DEFAULT_TABLE_THRESHOLD,
        }
    }
}

/// Point-in-time report of matcher state
#[derive(Debug, Clone, Serialize)]
pub struct MatcherStatus {
    /// Whether an index with at least one table is live
    pub initialized: bool,
    /// Embedding model backing the index
    pub embedding_model: String,
    /// Indexed table count
    pub table_count: usize,
    /// Indexed column count
    pub column_count: usize,
    /// Whether the persistent cache document exists on disk
    pub cache_file_exists: bool,
}

/// The schema matcher
pub struct SchemaMatcher {
    provider: Arc<dyn EmbeddingProvider>,
    config: MatcherConfig,
    index: RwLock<Arc<SimilarityIndex>>,
}

impl SchemaMatcher {
    /// Create a matcher with an empty index; call `build_or_load` to
    /// populate it.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: MatcherConfig) -> Self {
        let empty = SimilarityIndex::empty(provider.model(), provider.dimension());
        Self {
            provider,
            config,
            index: RwLock::new(Arc::new(empty)),
        }
    }

    /// Load a fresh cache if one exists, otherwise build from the catalog
    /// source, persist, and swap the new index in.
    pub async fn build_or_load(
        &self,
        source: &dyn CatalogSource,
        options: &BuildOptions,
    ) -> Result<(), SemanticError> {
        if !options.force_rebuild {
            if let Some(cache) = EmbeddingCache::load(&self.config.cache_path)? {
                if cache.is_fresh(self.config.max_cache_age) && !cache.is_empty() {
                    tracing::info!(
                        tables = cache.metadata.table_count,
                        columns = cache.metadata.column_count,
                        "loaded cached embeddings"
                    );
                    self.swap_index(SimilarityIndex::from_cache(&cache)).await;
                    return Ok(());
                }
                tracing::info!("cached embeddings stale or empty; rebuilding");
            }
        }

        self.rebuild(source, options).await
    }

    /// Unconditionally rebuild from the catalog source and swap the new
    /// generation in on completion.
    pub async fn rebuild(
        &self,
        source: &dyn CatalogSource,
        options: &BuildOptions,
    ) -> Result<(), SemanticError> {
        let items = builder::build_items(source, self.provider.as_ref(), options).await?;
        let cache = EmbeddingCache::new(
            self.provider.model(),
            self.provider.dimension(),
            items,
        );

        // A failed save only costs the next process a rebuild.
        if let Err(error) = cache.save(&self.config.cache_path) {
            tracing::warn!(%error, "failed to persist embedding cache");
        }

        tracing::info!(
            tables = cache.metadata.table_count,
            columns = cache.metadata.column_count,
            "embedding index rebuilt"
        );
        self.swap_index(SimilarityIndex::from_cache(&cache)).await;
        Ok(())
    }

    async fn swap_index(&self, index: SimilarityIndex) {
        *self.index.write().await = Arc::new(index);
    }

    async fn current_index(&self) -> Arc<SimilarityIndex> {
        self.index.read().await.clone()
    }

    /// Embed the query text through the same provider the index used.
    /// Provider failure degrades to a zero vector, which similarity
    /// defines as matching nothing.
    async fn embed_query(&self, text: &str) -> Vec<f32> {
        match self.provider.embed(&[text.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
            Ok(_) => vec![0.0; self.provider.dimension()],
            Err(error) => {
                tracing::warn!(%error, "query embedding failed; using zero vector");
                vec![0.0; self.provider.dimension()]
            }
        }
    }

    /// Top-k tables for a question, using the configured threshold unless
    /// overridden
    pub async fn find_similar_tables(
        &self,
        text: &str,
        top_k: usize,
        threshold: Option<f32>,
    ) -> Vec<TableMatch> {
        let query = self.embed_query(text).await;
        let threshold = threshold.unwrap_or(self.config.table_threshold);
        self.current_index().await.top_tables(&query, top_k, threshold)
    }

    /// Top-k columns for a question, optionally within one table
    pub async fn find_relevant_columns(
        &self,
        text: &str,
        table: Option<&str>,
        top_k: usize,
    ) -> Vec<ColumnMatch> {
        let query = self.embed_query(text).await;
        self.current_index().await.top_columns(&query, table, top_k)
    }

    /// Combined table and column search
    pub async fn hybrid_search(&self, text: &str, top_k: usize) -> HybridMatches {
        let query = self.embed_query(text).await;
        self.current_index()
            .await
            .hybrid(&query, top_k, self.config.table_threshold)
    }

    /// Number of indexed vectors (tables + columns)
    pub async fn vector_count(&self) -> usize {
        self.current_index().await.vector_count()
    }

    /// Number of indexed tables
    pub async fn table_count(&self) -> usize {
        self.current_index().await.table_count()
    }

    /// Current matcher status
    pub async fn status(&self) -> MatcherStatus {
        let index = self.current_index().await;
        MatcherStatus {
            initialized: index.table_count() > 0,
            embedding_model: index.metadata().model.clone(),
            table_count: index.table_count(),
            column_count: index.column_count(),
            cache_file_exists: self.config.cache_path.exists(),
        }
    }
}
