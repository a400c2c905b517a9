//! In-memory similarity index
//!
//! Two lookup tables (by table name, by `table.column`) over the cached
//! vectors, queried with brute-force cosine similarity. Scores are
//! normalized so higher means more similar; results are deterministic for
//! a given index (ties broken by name).

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheMetadata, EmbeddingCache};
use crate::catalog::SchemaItem;

/// Cosine similarity: dot(a,b) / (||a|| * ||b||).
///
/// Defined as 0.0 when either operand has zero norm, so zero-vector
/// placeholders from a degraded provider rank below every real match.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Confidence is the clamped similarity itself; no calibration is applied.
fn similarity_to_confidence(similarity: f32) -> f32 {
    similarity.clamp(0.0, 1.0)
}

/// A table ranked against a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMatch {
    pub table_name: String,
    pub similarity: f32,
    /// Clamped similarity in [0, 1]
    pub confidence: f32,
}

/// A column ranked against a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMatch {
    pub table_name: String,
    pub column_name: String,
    pub similarity: f32,
    /// Clamped similarity in [0, 1]
    pub confidence: f32,
}

/// Combined table/column search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridMatches {
    /// Top tables above the threshold
    pub tables: Vec<TableMatch>,
    /// Broader column list across all tables
    pub columns: Vec<ColumnMatch>,
    /// Best per-table columns for the top tables
    pub table_columns: HashMap<String, Vec<ColumnMatch>>,
}

/// How many of the top tables get a per-table column breakdown
const HYBRID_TABLE_DETAIL: usize = 3;
/// Per-table column list length in hybrid results
const HYBRID_COLUMNS_PER_TABLE: usize = 5;

/// Immutable in-memory index over one cache generation.
///
/// Rebuilds produce a fresh index that is swapped in whole, so concurrent
/// readers never observe a partially built one.
#[derive(Debug)]
pub struct SimilarityIndex {
    tables: HashMap<String, Vec<f32>>,
    columns: HashMap<String, Vec<f32>>,
    metadata: CacheMetadata,
}

impl SimilarityIndex {
    /// Build the lookup tables from a cache document
    pub fn from_cache(cache: &EmbeddingCache) -> Self {
        let mut tables = HashMap::new();
        let mut columns = HashMap::new();

        for item in &cache.items {
            let Some(embedding) = &item.embedding else {
                continue;
            };
            match item.kind {
                crate::catalog::ItemKind::Table => {
                    tables.insert(item.name.clone(), embedding.clone());
                }
                crate::catalog::ItemKind::Column => {
                    columns.insert(item.key(), embedding.clone());
                }
            }
        }

        Self {
            tables,
            columns,
            metadata: cache.metadata.clone(),
        }
    }

    /// An index with no entries (provider or catalog unavailable)
    pub fn empty(model: impl Into<String>, dimension: usize) -> Self {
        Self::from_cache(&EmbeddingCache::new(model, dimension, Vec::<SchemaItem>::new()))
    }

    /// Number of indexed vectors (tables + columns)
    pub fn vector_count(&self) -> usize {
        self.tables.len() + self.columns.len()
    }

    /// Number of indexed tables
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Number of indexed columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Provenance of the cache generation backing this index
    pub fn metadata(&self) -> &CacheMetadata {
        &self.metadata
    }

    /// Top-k tables with similarity >= threshold, descending
    pub fn top_tables(&self, query: &[f32], top_k: usize, threshold: f32) -> Vec<TableMatch> {
        let mut matches: Vec<TableMatch> = self
            .tables
            .iter()
            .filter_map(|(name, embedding)| {
                let similarity = cosine_similarity(query, embedding);
                (similarity >= threshold).then(|| TableMatch {
                    table_name: name.clone(),
                    similarity,
                    confidence: similarity_to_confidence(similarity),
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.table_name.cmp(&b.table_name))
        });
        matches.truncate(top_k);
        matches
    }

    /// Top-k columns, optionally restricted to one table's candidates
    pub fn top_columns(
        &self,
        query: &[f32],
        table: Option<&str>,
        top_k: usize,
    ) -> Vec<ColumnMatch> {
        let mut matches: Vec<ColumnMatch> = self
            .columns
            .iter()
            .filter(|(key, _)| match table {
                Some(table) => key.starts_with(&format!("{}.", table)),
                None => true,
            })
            .filter_map(|(key, embedding)| {
                let (table_name, column_name) = key.split_once('.')?;
                let similarity = cosine_similarity(query, embedding);
                Some(ColumnMatch {
                    table_name: table_name.to_string(),
                    column_name: column_name.to_string(),
                    similarity,
                    confidence: similarity_to_confidence(similarity),
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    (a.table_name.as_str(), a.column_name.as_str())
                        .cmp(&(b.table_name.as_str(), b.column_name.as_str()))
                })
        });
        matches.truncate(top_k);
        matches
    }

    /// Combined search: top tables, a broader column list, and the best
    /// per-table columns for the leading tables.
    pub fn hybrid(&self, query: &[f32], top_k: usize, threshold: f32) -> HybridMatches {
        let tables = self.top_tables(query, top_k, threshold);
        let columns = self.top_columns(query, None, top_k * 2);

        let mut table_columns = HashMap::new();
        for table in tables.iter().take(HYBRID_TABLE_DETAIL) {
            table_columns.insert(
                table.table_name.clone(),
                self.top_columns(query, Some(table.table_name.as_str()), HYBRID_COLUMNS_PER_TABLE),
            );
        }

        HybridMatches {
            tables,
            columns,
            table_columns,
        }
    }
}
