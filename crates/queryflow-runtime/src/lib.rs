//! # Queryflow Runtime
//!
//! Wires the pipeline together:
//! - YAML configuration and validated settings
//! - Explicit bootstrap producing the shared `AppContext`
//! - Concrete handlers (schema discovery with completeness checking,
//!   similarity matching, verification, collaborator adapters)
//! - The orchestrator facade: `process_query` in, structured response out

pub mod bootstrap;
pub mod collaborator;
pub mod config;
pub mod handlers;
pub mod orchestrator;

pub use bootstrap::{init_tracing, AppContext};
pub use collaborator::{Collaborator, CollaboratorError};
pub use config::{
    load_config, CacheSettings, CatalogSettings, ConfigError, EngineSettings, PlannerSettings,
    ProviderSettings, RuntimeConfig,
};
pub use handlers::{
    build_registry, AdapterHandler, AutoApproveVerifier, CollaboratorSet, SchemaDiscoveryHandler,
    SimilarityMatchingHandler, UserVerificationHandler, VerificationDecision,
    VerificationRequest, Verifier,
};
pub use orchestrator::{Orchestrator, QueryResponse, TaskSummary};
