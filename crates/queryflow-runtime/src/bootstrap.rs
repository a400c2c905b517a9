//! Explicit initialization
//!
//! All shared components (catalog source, embedding provider, schema
//! matcher) are constructed once here and handed to whoever needs them.
//! No component reaches for ambient singletons.

use std::sync::{Arc, OnceLock};

use queryflow_semantic::{
    BuildOptions, CatalogSource, EmbeddingProvider, MatcherConfig, OpenAiEmbeddings,
    OpenAiEmbeddingsConfig, SchemaMatcher, SemanticError, CACHE_FILE_NAME,
};

use crate::config::RuntimeConfig;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Initialize the tracing subscriber once, honoring `RUST_LOG`
pub fn init_tracing() {
    TRACING_INIT.get_or_init(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

/// Shared components for one pipeline instance
pub struct AppContext {
    pub config: RuntimeConfig,
    pub catalog: Arc<dyn CatalogSource>,
    pub provider: Arc<dyn EmbeddingProvider>,
    pub matcher: Arc<SchemaMatcher>,
}

impl AppContext {
    /// Build the context with the HTTP embedding provider configured from
    /// the environment
    pub fn new(config: RuntimeConfig, catalog: Arc<dyn CatalogSource>) -> Self {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(OpenAiEmbeddings::from_env(
            &config.provider.api_key_env,
            OpenAiEmbeddingsConfig {
                base_url: config.provider.base_url.clone(),
                model: config.provider.model.clone(),
                dimension: config.provider.dimension,
                timeout_secs: config.provider.timeout_secs,
            },
        ));
        Self::with_provider(config, catalog, provider)
    }

    /// Build the context with an injected provider (tests, custom backends)
    pub fn with_provider(
        config: RuntimeConfig,
        catalog: Arc<dyn CatalogSource>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let matcher_config = MatcherConfig {
            cache_path: config.cache.dir.join(CACHE_FILE_NAME),
            max_cache_age: chrono::Duration::hours(config.cache.max_age_hours),
            table_threshold: config.cache.table_threshold,
        };
        let matcher = Arc::new(SchemaMatcher::new(provider.clone(), matcher_config));
        Self {
            config,
            catalog,
            provider,
            matcher,
        }
    }

    /// Index build options derived from the catalog settings
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            force_rebuild: false,
            max_tables: self.config.catalog.max_tables,
            important_tables: self.config.catalog.important_tables.clone(),
        }
    }

    /// Startup warm-up: load or build the embedding index. Failures leave
    /// the matcher in degraded (empty-index) mode; startup proceeds.
    pub async fn warm_up(&self) -> Result<(), SemanticError> {
        self.matcher
            .build_or_load(self.catalog.as_ref(), &self.build_options())
            .await
    }
}
