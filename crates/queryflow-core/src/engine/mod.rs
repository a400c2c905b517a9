//! Execution engine
//!
//! The engine is responsible for:
//! - Building a task graph from a validated plan
//! - Wave-based scheduling: all ready tasks dispatch together, the next
//!   wave is computed only after the whole wave lands
//! - Partial-failure tolerance: non-critical handler errors become
//!   recorded fallback results, critical ones abort the plan
//! - Deadlock and timeout detection with partial results

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::time::Instant;

use crate::handler::{HandlerError, HandlerRegistry, ResolvedInput};
use crate::types::{InputValue, Plan, QueryRequest, TaskId, TaskResult, TaskSpec};

const DEFAULT_PLAN_TIMEOUT: Duration = Duration::from_secs(300);

/// Engine errors - only structural problems surface here; runtime task
/// failures are folded into the outcome instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("task '{0}' depends on unknown task '{1}'")]
    UnknownDependency(TaskId, TaskId),

    #[error("duplicate task id: {0}")]
    DuplicateTaskId(TaskId),
}

/// Scheduling state of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Dependencies not yet satisfied
    Pending,
    /// All dependencies completed, awaiting dispatch
    Ready,
    /// Currently executing
    Running,
    /// Finished; result recorded (possibly a fallback failure)
    Completed,
    /// Critical failure; the plan aborted here
    FailedFatal,
}

/// A node in the task graph
#[derive(Debug, Clone)]
struct TaskNode {
    spec: TaskSpec,
    state: TaskState,
}

/// Dependency graph over one plan's tasks
pub struct TaskGraph {
    nodes: HashMap<TaskId, TaskNode>,
    /// Planner order, kept for stable wave ordering
    order: Vec<TaskId>,
}

impl TaskGraph {
    /// Build a graph from a plan, checking referential integrity
    pub fn from_plan(plan: &Plan) -> Result<Self, EngineError> {
        let mut nodes = HashMap::new();
        let mut order = Vec::with_capacity(plan.tasks.len());

        for task in &plan.tasks {
            if nodes.contains_key(&task.id) {
                return Err(EngineError::DuplicateTaskId(task.id.clone()));
            }
            order.push(task.id.clone());
            nodes.insert(
                task.id.clone(),
                TaskNode {
                    spec: task.clone(),
                    state: TaskState::Pending,
                },
            );
        }

        for task in &plan.tasks {
            for dep in &task.dependencies {
                if !nodes.contains_key(dep) {
                    return Err(EngineError::UnknownDependency(task.id.clone(), dep.clone()));
                }
            }
        }

        Ok(Self { nodes, order })
    }

    /// Pending tasks whose dependencies are all completed, in plan order.
    /// Matching nodes are promoted to Ready.
    pub fn take_ready(&mut self) -> Vec<TaskId> {
        let ready: Vec<TaskId> = self
            .order
            .iter()
            .filter(|id| {
                let node = &self.nodes[*id];
                node.state == TaskState::Pending
                    && node
                        .spec
                        .dependencies
                        .iter()
                        .all(|dep| self.nodes[dep].state == TaskState::Completed)
            })
            .cloned()
            .collect();

        for id in &ready {
            if let Some(node) = self.nodes.get_mut(id) {
                node.state = TaskState::Ready;
            }
        }
        ready
    }

    /// Get a task's spec
    pub fn spec(&self, id: &str) -> Option<&TaskSpec> {
        self.nodes.get(id).map(|n| &n.spec)
    }

    /// Get a task's state
    pub fn state(&self, id: &str) -> Option<TaskState> {
        self.nodes.get(id).map(|n| n.state)
    }

    /// Mark a task running
    pub fn mark_running(&mut self, id: &str) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.state = TaskState::Running;
        }
    }

    /// Mark a task completed
    pub fn mark_completed(&mut self, id: &str) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.state = TaskState::Completed;
        }
    }

    /// Mark a task fatally failed
    pub fn mark_failed(&mut self, id: &str) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.state = TaskState::FailedFatal;
        }
    }

    /// Number of completed tasks
    pub fn completed_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| n.state == TaskState::Completed)
            .count()
    }

    /// Total number of tasks
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no tasks
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether every task completed
    pub fn is_complete(&self) -> bool {
        self.completed_count() == self.nodes.len()
    }
}

/// Why a plan stopped short of full completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStatus {
    /// Every task completed (some possibly with recorded fallbacks)
    Completed,
    /// No ready tasks while work remained - unresolvable dependencies
    Deadlocked,
    /// The plan-level timeout elapsed mid-execution
    TimedOut,
    /// A critical task failed
    Aborted { task_id: TaskId, error: String },
}

impl PlanStatus {
    /// Whether the outcome carries only part of the planned results
    pub fn is_partial(&self) -> bool {
        matches!(self, PlanStatus::Deadlocked | PlanStatus::TimedOut)
    }
}

/// Outcome of executing one plan
#[derive(Debug)]
pub struct PlanOutcome {
    /// Results keyed by task id; present for every task that finished
    pub results: HashMap<TaskId, TaskResult>,
    /// Terminal status of the plan
    pub status: PlanStatus,
    /// Task ids grouped by the wave they were dispatched in
    pub waves: Vec<Vec<TaskId>>,
}

/// The engine - schedules a plan's tasks wave by wave
pub struct Engine {
    registry: Arc<HandlerRegistry>,
    plan_timeout: Duration,
}

impl Engine {
    /// Create an engine over a handler registry
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            plan_timeout: DEFAULT_PLAN_TIMEOUT,
        }
    }

    /// Override the plan-level timeout
    pub fn with_plan_timeout(mut self, timeout: Duration) -> Self {
        self.plan_timeout = timeout;
        self
    }

    /// Execute a plan to completion, deadlock, abort, or timeout.
    ///
    /// Tasks within one wave run concurrently; the next wave's readiness
    /// computation waits for the whole wave, since readiness depends on
    /// the complete completed-set.
    pub async fn execute(
        &self,
        plan: &Plan,
        query: &QueryRequest,
    ) -> Result<PlanOutcome, EngineError> {
        let mut graph = TaskGraph::from_plan(plan)?;
        let mut results: HashMap<TaskId, TaskResult> = HashMap::new();
        let mut waves: Vec<Vec<TaskId>> = Vec::new();
        let deadline = Instant::now() + self.plan_timeout;

        while !graph.is_complete() {
            let ready = graph.take_ready();
            if ready.is_empty() {
                tracing::warn!(
                    plan_id = %plan.id,
                    completed = graph.completed_count(),
                    total = graph.len(),
                    "no ready tasks with work remaining; aborting as deadlock"
                );
                return Ok(PlanOutcome {
                    results,
                    status: PlanStatus::Deadlocked,
                    waves,
                });
            }

            tracing::debug!(
                plan_id = %plan.id,
                wave = waves.len(),
                tasks = ?ready,
                "dispatching wave"
            );
            waves.push(ready.clone());

            let mut in_flight = FuturesUnordered::new();
            for task_id in ready {
                let Some(spec) = graph.spec(&task_id).cloned() else {
                    continue;
                };
                graph.mark_running(&task_id);
                let input = resolve_inputs(&spec, &results, &query.text);
                let handler = self.registry.get(spec.kind);
                in_flight.push(async move {
                    let outcome = match handler {
                        Some(handler) => handler.execute(input).await,
                        None => Err(HandlerError::Unavailable(format!(
                            "no handler registered for kind '{}'",
                            spec.kind
                        ))),
                    };
                    (spec, outcome)
                });
            }

            let wave_future = async {
                let mut landed = Vec::new();
                while let Some(item) = in_flight.next().await {
                    landed.push(item);
                }
                landed
            };

            let landed = match tokio::time::timeout_at(deadline, wave_future).await {
                Ok(landed) => landed,
                Err(_) => {
                    tracing::warn!(
                        plan_id = %plan.id,
                        completed = graph.completed_count(),
                        "plan timeout elapsed; returning partial results"
                    );
                    return Ok(PlanOutcome {
                        results,
                        status: PlanStatus::TimedOut,
                        waves,
                    });
                }
            };

            for (spec, outcome) in landed {
                match outcome {
                    Ok(result) => {
                        tracing::info!(
                            plan_id = %plan.id,
                            task_id = %spec.id,
                            kind = %spec.kind,
                            failed = result.is_failed(),
                            "task completed"
                        );
                        results.insert(spec.id.clone(), result);
                        graph.mark_completed(&spec.id);
                    }
                    Err(error) if spec.kind.is_critical() => {
                        tracing::error!(
                            plan_id = %plan.id,
                            task_id = %spec.id,
                            kind = %spec.kind,
                            error = %error,
                            "critical task failed; aborting plan"
                        );
                        graph.mark_failed(&spec.id);
                        return Ok(PlanOutcome {
                            results,
                            status: PlanStatus::Aborted {
                                task_id: spec.id,
                                error: error.to_string(),
                            },
                            waves,
                        });
                    }
                    Err(error) => {
                        // Degraded path: downstream tasks proceed with the
                        // recorded failure as their input.
                        tracing::warn!(
                            plan_id = %plan.id,
                            task_id = %spec.id,
                            kind = %spec.kind,
                            error = %error,
                            "task failed; recording fallback and continuing"
                        );
                        results.insert(
                            spec.id.clone(),
                            TaskResult::failed_with_fallback(error.to_string()),
                        );
                        graph.mark_completed(&spec.id);
                    }
                }
            }
        }

        Ok(PlanOutcome {
            results,
            status: PlanStatus::Completed,
            waves,
        })
    }
}

/// Build a task's input: original query, every completed result keyed by
/// task id, then the task's own spec with references substituted.
fn resolve_inputs(
    spec: &TaskSpec,
    results: &HashMap<TaskId, TaskResult>,
    original_query: &str,
) -> ResolvedInput {
    let mut input = ResolvedInput::new();
    input.insert("original_query", Value::String(original_query.to_string()));

    for (task_id, result) in results {
        input.insert(task_id.clone(), result.as_value());
    }

    for (key, value) in &spec.input {
        match value {
            InputValue::Literal(literal) => input.insert(key.clone(), literal.clone()),
            InputValue::Reference(reference) => {
                let resolved = results.get(&reference.from_task).and_then(|result| {
                    match &reference.output {
                        Some(output_key) => result.get(output_key).cloned(),
                        None => Some(result.as_value()),
                    }
                });
                match resolved {
                    Some(resolved) => input.insert(key.clone(), resolved),
                    None => {
                        tracing::warn!(
                            task_id = %spec.id,
                            from_task = %reference.from_task,
                            output = ?reference.output,
                            "unresolvable input reference; substituting empty mapping"
                        );
                        input.insert(key.clone(), Value::Object(Map::new()));
                    }
                }
            }
        }
    }

    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::time::sleep;

    use crate::handler::TaskHandler;
    use crate::types::{TaskKind, TaskRef};

    /// Configurable stub handler for scheduler tests.
    struct StubHandler {
        kind: TaskKind,
        delay: Duration,
        fail: bool,
    }

    impl StubHandler {
        fn new(kind: TaskKind) -> Self {
            Self {
                kind,
                delay: Duration::ZERO,
                fail: false,
            }
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl TaskHandler for StubHandler {
        fn kind(&self) -> TaskKind {
            self.kind
        }

        async fn execute(&self, _input: ResolvedInput) -> Result<TaskResult, HandlerError> {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            if self.fail {
                return Err(HandlerError::Execution("synthetic failure".to_string()));
            }
            Ok(TaskResult::from_pairs([(
                "kind",
                json!(self.kind.as_str()),
            )]))
        }
    }

    fn registry_with(handlers: Vec<StubHandler>) -> Arc<HandlerRegistry> {
        let mut registry = HandlerRegistry::new();
        for handler in handlers {
            registry.register(Arc::new(handler));
        }
        Arc::new(registry)
    }

    fn chain_plan() -> Plan {
        Plan::new(
            "chain",
            vec![
                TaskSpec::new("t1", TaskKind::SchemaDiscovery),
                TaskSpec::new("t2", TaskKind::SemanticAnalysis),
                TaskSpec::new("t3", TaskKind::SimilarityMatching)
                    .with_dependencies(vec!["t1".to_string(), "t2".to_string()]),
            ],
        )
    }

    #[tokio::test]
    async fn test_execute_completes_acyclic_plan_in_dependency_waves() {
        let registry = registry_with(vec![
            StubHandler::new(TaskKind::SchemaDiscovery),
            StubHandler::new(TaskKind::SemanticAnalysis),
            StubHandler::new(TaskKind::SimilarityMatching),
        ]);
        let engine = Engine::new(registry);
        let query = QueryRequest::new("show sales");

        let outcome = engine.execute(&chain_plan(), &query).await.expect("run");
        assert_eq!(outcome.status, PlanStatus::Completed);
        assert_eq!(outcome.results.len(), 3);

        // t1 and t2 share the first wave; t3 waits for both.
        assert_eq!(outcome.waves.len(), 2);
        assert_eq!(outcome.waves[0], vec!["t1".to_string(), "t2".to_string()]);
        assert_eq!(outcome.waves[1], vec!["t3".to_string()]);
    }

    #[tokio::test]
    async fn test_task_dispatches_only_after_dependencies_complete() {
        let registry = registry_with(vec![
            StubHandler::new(TaskKind::SchemaDiscovery)
                .slow(Duration::from_millis(30)),
            StubHandler::new(TaskKind::SemanticAnalysis),
            StubHandler::new(TaskKind::SimilarityMatching),
        ]);
        let engine = Engine::new(registry);
        let query = QueryRequest::new("q");

        let outcome = engine.execute(&chain_plan(), &query).await.expect("run");
        assert_eq!(outcome.status, PlanStatus::Completed);

        // Every wave containing a dependency must come before the wave of
        // its dependent.
        let wave_of = |id: &str| {
            outcome
                .waves
                .iter()
                .position(|wave| wave.iter().any(|t| t == id))
                .expect("dispatched")
        };
        assert!(wave_of("t1") < wave_of("t3"));
        assert!(wave_of("t2") < wave_of("t3"));
    }

    #[tokio::test]
    async fn test_cyclic_dependencies_abort_with_deadlock_and_partial_results() {
        let registry = registry_with(vec![StubHandler::new(TaskKind::SchemaDiscovery)]);
        let engine = Engine::new(registry);

        // "free" runs; "a" and "b" depend on each other and never become ready.
        let plan = Plan::new(
            "cycle",
            vec![
                TaskSpec::new("free", TaskKind::SchemaDiscovery),
                TaskSpec::new("a", TaskKind::SchemaDiscovery)
                    .with_dependencies(vec!["b".to_string()]),
                TaskSpec::new("b", TaskKind::SchemaDiscovery)
                    .with_dependencies(vec!["a".to_string()]),
            ],
        );
        let query = QueryRequest::new("q");

        let outcome = engine.execute(&plan, &query).await.expect("run");
        assert_eq!(outcome.status, PlanStatus::Deadlocked);
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results.contains_key("free"));
    }

    #[tokio::test]
    async fn test_non_critical_failure_records_fallback_and_continues() {
        let registry = registry_with(vec![
            StubHandler::new(TaskKind::SchemaDiscovery).failing(),
            StubHandler::new(TaskKind::QueryGeneration),
        ]);
        let engine = Engine::new(registry);

        let plan = Plan::new(
            "degrade",
            vec![
                TaskSpec::new("t1", TaskKind::SchemaDiscovery),
                TaskSpec::new("t2", TaskKind::QueryGeneration)
                    .with_dependencies(vec!["t1".to_string()]),
            ],
        );
        let query = QueryRequest::new("q");

        let outcome = engine.execute(&plan, &query).await.expect("run");
        assert_eq!(outcome.status, PlanStatus::Completed);

        let failed = &outcome.results["t1"];
        assert!(failed.is_failed());
        assert!(failed.fallback_used());
        // Downstream still ran.
        assert!(!outcome.results["t2"].is_failed());
    }

    #[tokio::test]
    async fn test_critical_failure_aborts_plan_before_downstream_runs() {
        let registry = registry_with(vec![
            StubHandler::new(TaskKind::UserVerification).failing(),
            StubHandler::new(TaskKind::QueryGeneration),
        ]);
        let engine = Engine::new(registry);

        let plan = Plan::new(
            "abort",
            vec![
                TaskSpec::new("verify", TaskKind::UserVerification),
                TaskSpec::new("generate", TaskKind::QueryGeneration)
                    .with_dependencies(vec!["verify".to_string()]),
            ],
        );
        let query = QueryRequest::new("q");

        let outcome = engine.execute(&plan, &query).await.expect("run");
        match outcome.status {
            PlanStatus::Aborted { task_id, .. } => assert_eq!(task_id, "verify"),
            other => panic!("expected abort, got {:?}", other),
        }
        assert!(!outcome.results.contains_key("generate"));
    }

    #[tokio::test]
    async fn test_missing_handler_degrades_non_critical_task() {
        let registry = Arc::new(HandlerRegistry::new());
        let engine = Engine::new(registry);

        let plan = Plan::new(
            "unhandled",
            vec![TaskSpec::new("t1", TaskKind::Visualization)],
        );
        let query = QueryRequest::new("q");

        let outcome = engine.execute(&plan, &query).await.expect("run");
        assert_eq!(outcome.status, PlanStatus::Completed);
        let result = &outcome.results["t1"];
        assert!(result.is_failed());
        assert!(result.error().unwrap().contains("no handler registered"));
    }

    #[tokio::test]
    async fn test_plan_timeout_returns_partial_results() {
        let registry = registry_with(vec![
            StubHandler::new(TaskKind::SchemaDiscovery),
            StubHandler::new(TaskKind::Execution)
                .slow(Duration::from_secs(5)),
        ]);
        let engine = Engine::new(registry).with_plan_timeout(Duration::from_millis(50));

        let plan = Plan::new(
            "slow",
            vec![
                TaskSpec::new("t1", TaskKind::SchemaDiscovery),
                TaskSpec::new("t2", TaskKind::Execution)
                    .with_dependencies(vec!["t1".to_string()]),
            ],
        );
        let query = QueryRequest::new("q");

        let outcome = engine.execute(&plan, &query).await.expect("run");
        assert_eq!(outcome.status, PlanStatus::TimedOut);
        assert!(outcome.results.contains_key("t1"));
        assert!(!outcome.results.contains_key("t2"));
    }

    #[tokio::test]
    async fn test_reference_inputs_resolve_against_prior_results() {
        struct ProbeHandler {
            seen: Arc<Mutex<Option<ResolvedInput>>>,
        }

        #[async_trait]
        impl TaskHandler for ProbeHandler {
            fn kind(&self) -> TaskKind {
                TaskKind::SimilarityMatching
            }

            async fn execute(&self, input: ResolvedInput) -> Result<TaskResult, HandlerError> {
                *self.seen.lock().unwrap() = Some(input);
                Ok(TaskResult::completed(Map::new()))
            }
        }

        struct EntityHandler;

        #[async_trait]
        impl TaskHandler for EntityHandler {
            fn kind(&self) -> TaskKind {
                TaskKind::SemanticAnalysis
            }

            async fn execute(&self, _input: ResolvedInput) -> Result<TaskResult, HandlerError> {
                Ok(TaskResult::from_pairs([(
                    "entities",
                    json!(["orders", "dates"]),
                )]))
            }
        }

        let seen = Arc::new(Mutex::new(None));
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(EntityHandler));
        registry.register(Arc::new(ProbeHandler { seen: seen.clone() }));
        let engine = Engine::new(Arc::new(registry));

        let plan = Plan::new(
            "refs",
            vec![
                TaskSpec::new("analyze", TaskKind::SemanticAnalysis),
                TaskSpec::new("match", TaskKind::SimilarityMatching)
                    .with_dependencies(vec!["analyze".to_string()])
                    .with_input(
                        "entities",
                        InputValue::Reference(TaskRef::output("analyze", "entities")),
                    )
                    .with_input(
                        "dangling",
                        InputValue::Reference(TaskRef::task("never_ran")),
                    )
                    .with_input("limit", InputValue::literal(json!(5))),
            ],
        );
        let query = QueryRequest::new("when was the order placed");

        let outcome = engine.execute(&plan, &query).await.expect("run");
        assert_eq!(outcome.status, PlanStatus::Completed);

        let input = seen.lock().unwrap().clone().expect("probe input");
        assert_eq!(input.original_query(), "when was the order placed");
        assert_eq!(input.get("entities"), Some(&json!(["orders", "dates"])));
        // Unresolvable reference degrades to an empty mapping.
        assert_eq!(input.get("dangling"), Some(&json!({})));
        assert_eq!(input.get("limit"), Some(&json!(5)));
        // The full upstream result is also available keyed by task id.
        assert!(input.result_of("analyze").is_some());
    }
}
