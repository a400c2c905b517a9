//! Downstream collaborator contract
//!
//! The semantic analyzer, query builder, query runner, and chart builder
//! are external services the pipeline consumes as opaque executors:
//! resolved input in, JSON result out. The engine-facing adapter lives in
//! the handlers module.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use queryflow_core::handler::ResolvedInput;

/// Collaborator errors
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator failed: {0}")]
    Execution(String),
}

/// An opaque downstream service
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Name for logging and error messages
    fn name(&self) -> &str;

    /// Execute with the task's resolved input
    async fn execute(&self, input: &ResolvedInput) -> Result<Value, CollaboratorError>;
}
