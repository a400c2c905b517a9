//! Semantic subsystem error types

use thiserror::Error;

/// Embedding provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no API credentials available")]
    MissingCredentials,

    #[error("http error: {0}")]
    Http(String),

    #[error("response error: {0}")]
    Response(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Catalog source errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),
}

/// Semantic subsystem errors
#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("cache IO error: {0}")]
    CacheIo(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    CacheSerialization(#[from] serde_json::Error),

    #[error("index not built")]
    IndexNotBuilt,
}
