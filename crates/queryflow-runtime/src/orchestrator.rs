//! Orchestrator facade
//!
//! One entry point ties everything together: plan the question (falling
//! back to the default chain on any planner failure), execute the plan
//! wave by wave, and shape the outcome into a structured response. No
//! error escapes `process_query`; every path produces a response with a
//! status field.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use queryflow_core::capability::CapabilityRegistry;
use queryflow_core::engine::{Engine, PlanOutcome, PlanStatus};
use queryflow_core::handler::HandlerRegistry;
use queryflow_core::planner::{Planner, PlannerContext};
use queryflow_core::types::{Plan, QueryRequest, TaskKind};
use queryflow_planners::default_plan;

/// Summary of one planned task, echoed in the response
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub task_type: TaskKind,
}

/// The facade's structured response
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub plan_id: String,
    pub query: String,
    pub tasks: Vec<TaskSummary>,
    pub reasoning_steps: Vec<String>,
    pub estimated_execution_time: String,
    /// completed | partial | failed
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
    /// Task results keyed by task id
    pub results: Map<String, Value>,
}

/// The orchestrator
pub struct Orchestrator {
    /// Reasoning planner; None goes straight to the default plan
    planner: Option<Arc<dyn Planner>>,
    engine: Engine,
    capabilities: CapabilityRegistry,
}

impl Orchestrator {
    /// Create an orchestrator over a handler registry
    pub fn new(
        planner: Option<Arc<dyn Planner>>,
        registry: Arc<HandlerRegistry>,
        plan_timeout: Duration,
    ) -> Self {
        Self {
            planner,
            engine: Engine::new(registry).with_plan_timeout(plan_timeout),
            capabilities: CapabilityRegistry::builtin(),
        }
    }

    /// Process one natural-language question end to end
    pub async fn process_query(
        &self,
        text: &str,
        user_id: &str,
        session_id: &str,
    ) -> QueryResponse {
        let request = QueryRequest::new(text).with_identity(user_id, session_id);
        tracing::info!(request_id = %request.id, user_id, session_id, "processing query");

        let (plan, plan_source) = self.plan_for(&request).await;
        let tasks: Vec<TaskSummary> = plan
            .tasks
            .iter()
            .map(|t| TaskSummary {
                task_id: t.id.clone(),
                task_type: t.kind,
            })
            .collect();
        let estimated_execution_time = format!("{}s", plan.len() * 2);

        let outcome = match self.engine.execute(&plan, &request).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(plan_id = %plan.id, %error, "plan was structurally unrunnable");
                return QueryResponse {
                    plan_id: plan.id,
                    query: request.text,
                    tasks,
                    reasoning_steps: vec![format!("Planning via {plan_source}")],
                    estimated_execution_time,
                    status: "failed".to_string(),
                    status_detail: Some(error.to_string()),
                    results: Map::new(),
                };
            }
        };

        let (status, status_detail) = describe_status(&outcome.status);
        let reasoning_steps = vec![
            format!("Planned {} execution steps via {}", plan.len(), plan_source),
            "Matched schema candidates through the embedding index".to_string(),
            format!("Executed {} dependency waves", outcome.waves.len()),
        ];

        QueryResponse {
            plan_id: plan.id,
            query: request.text,
            tasks,
            reasoning_steps,
            estimated_execution_time,
            status,
            status_detail,
            results: results_map(outcome),
        }
    }

    /// Ask the planner, falling back to the default chain on failure or
    /// on a structurally invalid plan.
    async fn plan_for(&self, request: &QueryRequest) -> (Plan, &'static str) {
        let Some(planner) = &self.planner else {
            return (default_plan(request), "default plan");
        };

        let context = PlannerContext::new(self.capabilities.all().to_vec());
        match planner.plan(request, &context).await {
            Ok(plan) => match plan.validate() {
                Ok(()) => (plan, "reasoning backend"),
                Err(error) => {
                    tracing::warn!(%error, "planner returned invalid plan; using default");
                    (default_plan(request), "default plan (planner invalid)")
                }
            },
            Err(error) => {
                tracing::warn!(%error, "planner failed; using default plan");
                (default_plan(request), "default plan (planner failed)")
            }
        }
    }
}

fn describe_status(status: &PlanStatus) -> (String, Option<String>) {
    match status {
        PlanStatus::Completed => ("completed".to_string(), None),
        PlanStatus::Deadlocked => (
            "partial".to_string(),
            Some("aborted on unresolvable dependencies".to_string()),
        ),
        PlanStatus::TimedOut => (
            "partial".to_string(),
            Some("plan timeout elapsed".to_string()),
        ),
        PlanStatus::Aborted { task_id, error } => (
            "failed".to_string(),
            Some(format!("critical task '{task_id}' failed: {error}")),
        ),
    }
}

fn results_map(outcome: PlanOutcome) -> Map<String, Value> {
    outcome
        .results
        .into_iter()
        .map(|(task_id, result)| (task_id, result.into_value()))
        .collect()
}
