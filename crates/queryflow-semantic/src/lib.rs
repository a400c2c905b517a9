//! # Queryflow Semantic
//!
//! Semantic retrieval over relational schemas:
//! - Catalog contracts and normalized schema items
//! - Deterministic description generation for embedding
//! - Embedding provider trait with an OpenAI-compatible HTTP client
//! - Persistent, freshness-bounded embedding cache (atomic writes)
//! - In-memory cosine-similarity index with swap-on-rebuild semantics
//!
//! Semantic matching is an enhancement, not a correctness requirement:
//! every failure path in this crate degrades (zero vectors, cache miss,
//! dropped columns) instead of propagating fatally.

pub mod builder;
pub mod cache;
pub mod catalog;
pub mod describe;
pub mod error;
pub mod index;
pub mod matcher;
pub mod provider;

pub use builder::{batch_size_for, BuildOptions};
pub use cache::{default_max_age, CacheMetadata, EmbeddingCache, CACHE_FILE_NAME};
pub use catalog::{CatalogSource, ColumnDef, ItemKind, SchemaItem};
pub use error::{CatalogError, ProviderError, SemanticError};
pub use index::{cosine_similarity, ColumnMatch, HybridMatches, SimilarityIndex, TableMatch};
pub use matcher::{MatcherConfig, MatcherStatus, SchemaMatcher, DEFAULT_TABLE_THRESHOLD};
pub use provider::{
    sanitize_batch, zero_vectors, EmbeddingProvider, OpenAiEmbeddings, OpenAiEmbeddingsConfig,
};
