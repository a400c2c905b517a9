//! # Queryflow Planners
//!
//! Planner implementations for the Queryflow pipeline:
//! - `LlmPlanner`: prompts a chat-completions backend and strictly parses
//!   its JSON task list into a validated Plan
//! - `DefaultPlanner` / `default_plan`: the fixed 7-step fallback chain
//!   used whenever the backend fails or returns an invalid plan

mod default_plan;
mod llm;

pub use default_plan::{default_plan, DefaultPlanner};
pub use llm::{
    LlmClient, LlmError, LlmPlanner, LlmPlannerConfig, LlmRequest, OpenAiChatClient,
};
