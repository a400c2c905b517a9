//! Persistent embedding cache
//!
//! One JSON document holding the embedded schema items plus provenance
//! metadata. Saves are write-then-rename so a crash mid-write never
//! leaves a corrupt cache; a cache that fails to parse is treated as a
//! miss, not an error.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{ItemKind, SchemaItem};
use crate::error::SemanticError;

/// File name of the cache document inside the cache directory
pub const CACHE_FILE_NAME: &str = "schema_embeddings.json";

/// Default freshness window: caches older than this are treated as absent
pub fn default_max_age() -> Duration {
    Duration::days(1)
}

/// Provenance metadata persisted with the vectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the cache was built
    pub created_at: DateTime<Utc>,
    /// Embedding model that produced the vectors
    pub model: String,
    /// Uniform dimensionality of every vector
    pub dimension: usize,
    /// Number of table entries
    pub table_count: usize,
    /// Number of column entries
    pub column_count: usize,
}

/// The persisted cache document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingCache {
    /// Provenance and counts
    pub metadata: CacheMetadata,
    /// Embedded schema items
    pub items: Vec<SchemaItem>,
}

impl EmbeddingCache {
    /// Build a cache document from embedded items
    pub fn new(model: impl Into<String>, dimension: usize, items: Vec<SchemaItem>) -> Self {
        let table_count = items.iter().filter(|i| i.kind == ItemKind::Table).count();
        let column_count = items.iter().filter(|i| i.kind == ItemKind::Column).count();
        Self {
            metadata: CacheMetadata {
                created_at: Utc::now(),
                model: model.into(),
                dimension,
                table_count,
                column_count,
            },
            items,
        }
    }

    /// Whether the cache is younger than the freshness window
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        Utc::now() - self.metadata.created_at <= max_age
    }

    /// Whether the cache holds no table entries
    pub fn is_empty(&self) -> bool {
        self.metadata.table_count == 0
    }

    /// Persist atomically: write to a temp file in the target directory,
    /// then rename over the destination.
    pub fn save(&self, path: &Path) -> Result<(), SemanticError> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let bytes = serde_json::to_vec(self)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(&bytes)?;
        tmp.persist(path).map_err(|e| e.error)?;

        tracing::info!(
            path = %path.display(),
            tables = self.metadata.table_count,
            columns = self.metadata.column_count,
            "embedding cache saved"
        );
        Ok(())
    }

    /// Load a cache document. A missing file is a miss; a corrupt or
    /// unparsable file is logged and also treated as a miss so the caller
    /// rebuilds.
    pub fn load(path: &Path) -> Result<Option<Self>, SemanticError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<Self>(&bytes) {
            Ok(cache) => Ok(Some(cache)),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "embedding cache unparsable; treating as miss"
                );
                Ok(None)
            }
        }
    }
}
