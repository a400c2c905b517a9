//! Runtime configuration
//!
//! One YAML document configures the provider endpoints, the cache
//! location and freshness window, catalog limits, and engine timeouts.
//! Loading validates the document; components receive their settings
//! through the bootstrap context rather than reading ambient state.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Embedding provider settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Endpoint base URL
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Output dimensionality of the model
    pub dimension: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            timeout_secs: 180,
        }
    }
}

/// Reasoning-backend settings for the LLM planner
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// Whether to consult the LLM planner at all; the default plan is
    /// used directly when disabled
    pub enabled: bool,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Endpoint base URL
    pub base_url: String,
    /// Reasoning model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
        }
    }
}

/// Embedding cache settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Directory holding the cache document
    pub dir: PathBuf,
    /// Freshness window in hours; older caches are rebuilt
    pub max_age_hours: i64,
    /// Similarity threshold for table matches
    pub table_threshold: f32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("storage"),
            max_age_hours: 24,
            table_threshold: 0.3,
        }
    }
}

/// Catalog traversal limits
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Cap on tables to embed (None = all)
    pub max_tables: Option<usize>,
    /// Tables to prioritize during index builds
    pub important_tables: Vec<String>,
}

/// Engine settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Plan-level timeout in seconds
    pub plan_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            plan_timeout_secs: 300,
        }
    }
}

/// Root runtime configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub provider: ProviderSettings,
    pub planner: PlannerSettings,
    pub cache: CacheSettings,
    pub catalog: CatalogSettings,
    pub engine: EngineSettings,
}

/// Load and validate configuration from a YAML file
pub fn load_config(path: &Path) -> Result<RuntimeConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: RuntimeConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &RuntimeConfig) -> Result<(), ConfigError> {
    if config.provider.dimension == 0 {
        return Err(ConfigError::Invalid(
            "provider.dimension must be > 0".to_string(),
        ));
    }
    if config.provider.api_key_env.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "provider.api_key_env must not be empty".to_string(),
        ));
    }
    if config.cache.max_age_hours <= 0 {
        return Err(ConfigError::Invalid(
            "cache.max_age_hours must be > 0".to_string(),
        ));
    }
    if !(-1.0..=1.0).contains(&config.cache.table_threshold) {
        return Err(ConfigError::Invalid(
            "cache.table_threshold must be within [-1, 1]".to_string(),
        ));
    }
    if config.engine.plan_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "engine.plan_timeout_secs must be > 0".to_string(),
        ));
    }
    Ok(())
}
