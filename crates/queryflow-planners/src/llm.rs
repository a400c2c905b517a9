//! LLM-backed planner
//!
//! Builds a planning prompt from the capability registry, calls a
//! chat-completions backend, and strictly parses the reply into a
//! validated Plan. Anything short of a valid plan is a typed `PlanError`;
//! the runtime reacts by substituting the default plan. No best-effort
//! text scraping happens downstream of this module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;
use thiserror::Error;

use queryflow_core::capability::Capability;
use queryflow_core::planner::{PlanError, Planner, PlannerContext};
use queryflow_core::types::{InputValue, Plan, QueryRequest, TaskId, TaskKind, TaskSpec};

/// LLM request payload
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub temperature: f32,
}

/// LLM client trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;
}

/// LLM errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("http error: {0}")]
    Http(String),

    #[error("response error: {0}")]
    Response(String),
}

/// Chat-completions client for OpenAI-compatible backends
pub struct OpenAiChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OpenAiChatClient {
    /// Create a client for the given endpoint
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::MissingCredentials);
        }

        let payload = ChatRequest {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Response(format!("status {}: {}", status, body)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Response(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Response("no choices in response".to_string()))
    }
}

/// Planner config for the LLM backend
#[derive(Debug, Clone)]
pub struct LlmPlannerConfig {
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
}

impl Default for LlmPlannerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            system_prompt: "You are a query-pipeline planner. Return ONLY a valid JSON array \
                            of tasks."
                .to_string(),
        }
    }
}

/// Wire shape of one planned task as the backend returns it
#[derive(Debug, Deserialize)]
struct PlannedTask {
    task_id: TaskId,
    task_type: TaskKind,
    #[serde(default)]
    input: HashMap<String, InputValue>,
    #[serde(default)]
    required_output: HashMap<String, String>,
    #[serde(default)]
    constraints: HashMap<String, Value>,
    #[serde(default)]
    dependencies: Vec<TaskId>,
}

impl From<PlannedTask> for TaskSpec {
    fn from(task: PlannedTask) -> Self {
        TaskSpec {
            id: task.task_id,
            kind: task.task_type,
            input: task.input,
            required_output: task.required_output,
            constraints: task.constraints,
            dependencies: task.dependencies,
        }
    }
}

/// LLM-based planner
pub struct LlmPlanner<C: LlmClient> {
    pub client: C,
    pub config: LlmPlannerConfig,
}

impl<C: LlmClient> LlmPlanner<C> {
    pub fn new(client: C, config: LlmPlannerConfig) -> Self {
        Self { client, config }
    }

    fn build_prompt(&self, query: &QueryRequest, context: &PlannerContext) -> (String, String) {
        let mut system = self.config.system_prompt.clone();
        system.push_str("\n\nAvailable agents:\n");
        for capability in &context.capabilities {
            system.push_str(&format_capability(capability));
        }

        let mut user = String::new();
        let _ = writeln!(user, "Question:\n{}\n", query.text);
        user.push_str(
            "Create a step-by-step execution plan that discovers schema, analyzes \
             semantics, matches similarity, verifies selections with the user, \
             generates the query, executes it, and visualizes the results.\n",
        );
        user.push_str("Return a JSON array of tasks with shape:\n");
        user.push_str(
            r#"[{"task_id":"1_discover_schema","task_type":"schema_discovery","input":{},"required_output":{},"constraints":{},"dependencies":[]}]"#,
        );
        user.push_str(
            "\nReference a prior task's output inside input as \
             {\"from_task\":\"<task_id>\",\"output\":\"<key>\"}. \
             Use only the listed task types. Return JSON only.\n",
        );

        (system, user)
    }
}

fn format_capability(capability: &Capability) -> String {
    format!(
        "- {} ({}): {}\n  inputs: {}\n  outputs: {}\n  domains: {}\n",
        capability.name,
        capability.kind,
        capability.description,
        capability.input_types.join(", "),
        capability.output_types.join(", "),
        capability.specialized_domains.join(", "),
    )
}

/// Strip a surrounding markdown code fence, if present
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[async_trait]
impl<C: LlmClient> Planner for LlmPlanner<C> {
    async fn plan(
        &self,
        query: &QueryRequest,
        context: &PlannerContext,
    ) -> Result<Plan, PlanError> {
        let (system, user) = self.build_prompt(query, context);
        let output = self
            .client
            .complete(LlmRequest {
                system,
                user,
                model: self.config.model.clone(),
                temperature: self.config.temperature,
            })
            .await
            .map_err(|e| match e {
                LlmError::MissingCredentials => PlanError::Unavailable(e.to_string()),
                other => PlanError::Backend(other.to_string()),
            })?;

        let body = strip_code_fence(&output);
        let tasks: Vec<PlannedTask> = serde_json::from_str(body)
            .map_err(|e| PlanError::Malformed(format!("{e}; output: {}", truncate(body, 200))))?;

        let plan = Plan::new(
            query.text.clone(),
            tasks.into_iter().map(TaskSpec::from).collect(),
        );
        plan.validate()?;

        tracing::info!(plan_id = %plan.id, tasks = plan.len(), "planner produced plan");
        Ok(plan)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect::<String>() + "..."
}
