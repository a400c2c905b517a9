//! Planner contract
//!
//! The Planner is responsible for:
//! - Turning one question into an executable task list
//! - Wiring dependencies between the tasks
//!
//! The Planner does NOT handle:
//! - Scheduling or retry strategies
//! - Runtime error recovery
//!
//! A planner either returns a structurally valid plan or a typed error;
//! the runtime responds to any error by substituting the default plan.
//! Free-form planner output is never parsed inside the engine.

use async_trait::async_trait;
use thiserror::Error;

use crate::capability::Capability;
use crate::types::{Plan, PlanValidationError, QueryRequest};

/// Planner errors
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("planner backend unavailable: {0}")]
    Unavailable(String),

    #[error("planner backend error: {0}")]
    Backend(String),

    #[error("planner returned unparseable output: {0}")]
    Malformed(String),

    #[error("planner returned an invalid plan: {0}")]
    Invalid(#[from] PlanValidationError),
}

/// Context provided to the planner
pub struct PlannerContext {
    /// Capabilities the plan may draw on
    pub capabilities: Vec<Capability>,
}

impl PlannerContext {
    /// Create a new planner context
    pub fn new(capabilities: Vec<Capability>) -> Self {
        Self { capabilities }
    }
}

/// Planner trait - generates execution plans from a question
///
/// Implementations can use different reasoning backends or deterministic
/// strategies.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Generate a plan for the given question
    async fn plan(&self, query: &QueryRequest, context: &PlannerContext)
        -> Result<Plan, PlanError>;
}
