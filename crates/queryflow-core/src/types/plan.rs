//! Plan type and structural validation
//!
//! A Plan is the planner's output: an acyclic set of tasks with
//! dependencies. Validation runs before anything is scheduled so the
//! engine only ever sees well-formed graphs; a plan that fails validation
//! is discarded in favor of the default plan.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::task::{TaskId, TaskSpec};

/// Structural plan errors
#[derive(Debug, Error)]
pub enum PlanValidationError {
    #[error("plan has no tasks")]
    Empty,

    #[error("duplicate task id: {0}")]
    DuplicateTaskId(TaskId),

    #[error("task '{0}' depends on undefined task '{1}'")]
    MissingDependency(TaskId, TaskId),

    #[error("dependency cycle involving task: {0}")]
    CycleDetected(TaskId),
}

/// An execution plan for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Unique plan identifier
    pub id: String,
    /// The goal this plan serves (usually the original question)
    pub goal: String,
    /// Tasks in planner order
    pub tasks: Vec<TaskSpec>,
}

impl Plan {
    /// Create a new plan
    pub fn new(goal: impl Into<String>, tasks: Vec<TaskSpec>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            goal: goal.into(),
            tasks,
        }
    }

    /// Get a task by id
    pub fn get_task(&self, id: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Number of tasks in the plan
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the plan has no tasks
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Validate plan structure: non-empty, unique ids, dependencies that
    /// exist, and no cycles.
    pub fn validate(&self) -> Result<(), PlanValidationError> {
        if self.tasks.is_empty() {
            return Err(PlanValidationError::Empty);
        }

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.id.as_str()) {
                return Err(PlanValidationError::DuplicateTaskId(task.id.clone()));
            }
        }

        let ids: HashSet<&str> = self.tasks.iter().map(|t| t.id.as_str()).collect();
        for task in &self.tasks {
            for dep in &task.dependencies {
                if !ids.contains(dep.as_str()) {
                    return Err(PlanValidationError::MissingDependency(
                        task.id.clone(),
                        dep.clone(),
                    ));
                }
            }
        }

        self.detect_cycles()
    }

    /// DFS cycle detection over the dependency edges
    fn detect_cycles(&self) -> Result<(), PlanValidationError> {
        let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
        for task in &self.tasks {
            adj.entry(task.id.as_str()).or_default();
            for dep in &task.dependencies {
                adj.entry(dep.as_str()).or_default().push(task.id.as_str());
            }
        }

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        fn dfs<'a>(
            node: &'a str,
            adj: &HashMap<&'a str, Vec<&'a str>>,
            visited: &mut HashSet<&'a str>,
            rec_stack: &mut HashSet<&'a str>,
        ) -> Option<&'a str> {
            visited.insert(node);
            rec_stack.insert(node);

            if let Some(neighbors) = adj.get(node) {
                for &neighbor in neighbors {
                    if !visited.contains(neighbor) {
                        if let Some(cycle_node) = dfs(neighbor, adj, visited, rec_stack) {
                            return Some(cycle_node);
                        }
                    } else if rec_stack.contains(neighbor) {
                        return Some(neighbor);
                    }
                }
            }

            rec_stack.remove(node);
            None
        }

        for task in &self.tasks {
            if !visited.contains(task.id.as_str()) {
                if let Some(cycle_node) =
                    dfs(task.id.as_str(), &adj, &mut visited, &mut rec_stack)
                {
                    return Err(PlanValidationError::CycleDetected(cycle_node.to_string()));
                }
            }
        }

        Ok(())
    }
}
