//! # Queryflow Core
//!
//! Core abstractions and deterministic logic for the Queryflow pipeline.
//!
//! This crate contains:
//! - QueryRequest / Plan / TaskSpec / TaskResult definitions
//! - The wave-based execution engine and task graph
//! - Handler and Planner abstractions with their registries
//! - The static capability registry
//!
//! This crate does NOT care about:
//! - How plans are produced (see queryflow-planners)
//! - How schema embeddings are built or matched (see queryflow-semantic)
//! - How the pipeline is wired together (see queryflow-runtime)

pub mod capability;
pub mod engine;
pub mod handler;
pub mod planner;
pub mod types;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::capability::{Capability, CapabilityRegistry};
    pub use crate::engine::{Engine, EngineError, PlanOutcome, PlanStatus, TaskGraph, TaskState};
    pub use crate::handler::{HandlerError, HandlerRegistry, ResolvedInput, TaskHandler};
    pub use crate::planner::{PlanError, Planner, PlannerContext};
    pub use crate::types::{
        InputValue, Plan, PlanValidationError, QueryRequest, TaskId, TaskKind, TaskRef,
        TaskResult, TaskSpec, TaskStatus,
    };
}

// Re-export key types at crate root
pub use capability::{Capability, CapabilityRegistry};
pub use engine::{Engine, EngineError, PlanOutcome, PlanStatus, TaskGraph, TaskState};
pub use handler::{HandlerError, HandlerRegistry, ResolvedInput, TaskHandler};
pub use planner::{PlanError, Planner, PlannerContext};
pub use types::{
    InputValue, Plan, PlanValidationError, QueryRequest, TaskId, TaskKind, TaskRef, TaskResult,
    TaskSpec, TaskStatus,
};
