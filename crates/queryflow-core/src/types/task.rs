//! Task type definitions
//!
//! TaskSpec is one node of an execution plan: what to do, what it needs,
//! and which other tasks must complete first.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Type alias for task IDs (unique within one plan)
pub type TaskId = String;

/// Closed set of task kinds the pipeline understands.
///
/// Handlers are registered per kind; extending the pipeline means
/// registering a new handler, not growing a conditional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    SchemaDiscovery,
    SemanticAnalysis,
    SimilarityMatching,
    UserVerification,
    QueryGeneration,
    Execution,
    Visualization,
    Validation,
}

impl TaskKind {
    /// Kinds whose failure must abort the whole plan.
    ///
    /// Confirmation and validation steps exist to stop bad queries from
    /// reaching the data source; running past their failure would defeat them.
    pub fn is_critical(&self) -> bool {
        matches!(self, TaskKind::UserVerification | TaskKind::Validation)
    }

    /// Stable snake_case label, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::SchemaDiscovery => "schema_discovery",
            TaskKind::SemanticAnalysis => "semantic_analysis",
            TaskKind::SimilarityMatching => "similarity_matching",
            TaskKind::UserVerification => "user_verification",
            TaskKind::QueryGeneration => "query_generation",
            TaskKind::Execution => "execution",
            TaskKind::Visualization => "visualization",
            TaskKind::Validation => "validation",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed reference to another task's output.
///
/// References are resolved by the engine against the set of completed
/// results; an unresolvable reference becomes an empty mapping plus a
/// warning, never a hard failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRef {
    /// Id of the task whose result is referenced
    pub from_task: TaskId,
    /// Optional key within that task's result; None takes the full result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl TaskRef {
    /// Reference a task's full result
    pub fn task(from_task: impl Into<TaskId>) -> Self {
        Self {
            from_task: from_task.into(),
            output: None,
        }
    }

    /// Reference one key of a task's result
    pub fn output(from_task: impl Into<TaskId>, output: impl Into<String>) -> Self {
        Self {
            from_task: from_task.into(),
            output: Some(output.into()),
        }
    }
}

/// One value in a task's input spec: either a literal or a typed reference
/// to a prior task's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    /// Reference to another task's output, resolved at dispatch time
    Reference(TaskRef),
    /// Plain JSON literal passed through unchanged
    Literal(Value),
}

impl InputValue {
    /// Shorthand for a literal value
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Shorthand for a full-result reference
    pub fn from_task(task_id: impl Into<TaskId>) -> Self {
        Self::Reference(TaskRef::task(task_id))
    }
}

/// A single task in an execution plan.
///
/// Created once by the planner, immutable afterwards, consumed exactly
/// once by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique identifier within the plan
    pub id: TaskId,
    /// What kind of work this task performs
    pub kind: TaskKind,
    /// Input spec: key -> literal or reference
    #[serde(default)]
    pub input: HashMap<String, InputValue>,
    /// Keys the task is expected to produce
    #[serde(default)]
    pub required_output: HashMap<String, String>,
    /// Execution constraints (limits, thresholds, flags)
    #[serde(default)]
    pub constraints: HashMap<String, Value>,
    /// Ids of tasks that must complete before this one
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
}

impl TaskSpec {
    /// Create a new task with no inputs or dependencies
    pub fn new(id: impl Into<TaskId>, kind: TaskKind) -> Self {
        Self {
            id: id.into(),
            kind,
            input: HashMap::new(),
            required_output: HashMap::new(),
            constraints: HashMap::new(),
            dependencies: Vec::new(),
        }
    }

    /// Add dependencies
    pub fn with_dependencies(mut self, deps: Vec<TaskId>) -> Self {
        self.dependencies = deps;
        self
    }

    /// Add one input entry
    pub fn with_input(mut self, key: impl Into<String>, value: InputValue) -> Self {
        self.input.insert(key.into(), value);
        self
    }

    /// Add one expected-output entry
    pub fn with_required_output(
        mut self,
        key: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.required_output.insert(key.into(), description.into());
        self
    }

    /// Add one constraint entry
    pub fn with_constraint(mut self, key: impl Into<String>, value: Value) -> Self {
        self.constraints.insert(key.into(), value);
        self
    }
}
