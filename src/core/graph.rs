// src/core/graph.rs — Task dependency graph for one goal
//
// Edges point from a dependency to its dependent. Nodes can only depend on
// nodes added before them, so the graph is acyclic by construction.

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use super::types::{TaskNode, TaskStatus};
use crate::infra::errors::GoalForgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphStatus {
    Pending,
    Running,
    Completed,
    Partial,
    Failed,
}

impl GraphStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphStatus::Pending => "pending",
            GraphStatus::Running => "running",
            GraphStatus::Completed => "completed",
            GraphStatus::Partial => "partial",
            GraphStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for GraphStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct TaskGraph {
    goal_id: String,
    graph: DiGraph<TaskNode, ()>,
    index: HashMap<String, NodeIndex>,
    status: GraphStatus,
}

impl TaskGraph {
    pub fn new(goal_id: impl Into<String>) -> Self {
        Self {
            goal_id: goal_id.into(),
            graph: DiGraph::new(),
            index: HashMap::new(),
            status: GraphStatus::Pending,
        }
    }

    /// Fresh graph with a random goal id.
    pub fn for_new_goal() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    /// Add a node. Every dependency must already be in the graph.
    pub fn add_task(&mut self, node: TaskNode) -> Result<NodeIndex, GoalForgeError> {
        if self.index.contains_key(&node.id) {
            return Err(GoalForgeError::InvalidGraph(format!(
                "duplicate task id '{}'",
                node.id
            )));
        }
        let mut dep_indices = Vec::with_capacity(node.dependencies.len());
        let mut seen = HashSet::new();
        for dep in &node.dependencies {
            if dep == &node.id {
                return Err(GoalForgeError::InvalidGraph(format!(
                    "task '{}' depends on itself",
                    node.id
                )));
            }
            let idx = self.index.get(dep).copied().ok_or_else(|| {
                GoalForgeError::InvalidGraph(format!(
                    "task '{}' depends on unknown task '{}'",
                    node.id, dep
                ))
            })?;
            if seen.insert(idx) {
                dep_indices.push(idx);
            }
        }

        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        for dep_idx in dep_indices {
            self.graph.add_edge(dep_idx, idx, ());
        }
        self.index.insert(id, idx);
        Ok(idx)
    }

    pub fn goal_id(&self) -> &str {
        &self.goal_id
    }

    pub fn status(&self) -> GraphStatus {
        self.status
    }

    pub fn set_status(&mut self, status: GraphStatus) {
        self.status = status;
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn get(&self, id: &str) -> Option<&TaskNode> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut TaskNode> {
        match self.index.get(id) {
            Some(&idx) => self.graph.node_weight_mut(idx),
            None => None,
        }
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.nodes().map(|n| n.id.clone()).collect()
    }

    /// (dependency, dependent) pairs.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.graph
            .raw_edges()
            .iter()
            .map(|e| {
                (
                    self.graph[e.source()].id.clone(),
                    self.graph[e.target()].id.clone(),
                )
            })
            .collect()
    }

    /// Pending nodes whose every dependency is done, in declaration order.
    pub fn ready_tasks(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph[idx].status == TaskStatus::Pending)
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .all(|dep| self.graph[dep].status == TaskStatus::Done)
            })
            .map(|idx| self.graph[idx].id.clone())
            .collect()
    }

    pub fn pending_tasks(&self) -> Vec<String> {
        self.nodes()
            .filter(|n| n.status == TaskStatus::Pending)
            .map(|n| n.id.clone())
            .collect()
    }

    /// Every node reachable from `id`, excluding `id`, in declaration order.
    pub fn transitive_dependents(&self, id: &str) -> Vec<String> {
        let Some(&start) = self.index.get(id) else {
            return Vec::new();
        };
        let mut reached = HashSet::new();
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(idx) = dfs.next(&self.graph) {
            if idx != start {
                reached.insert(idx);
            }
        }
        let mut out: Vec<NodeIndex> = reached.into_iter().collect();
        out.sort();
        out.into_iter()
            .map(|idx| self.graph[idx].id.clone())
            .collect()
    }

    /// A sink has no dependents.
    pub fn is_sink(&self, id: &str) -> bool {
        self.index
            .get(id)
            .map(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .unwrap_or(false)
    }

    /// Outputs of the direct dependencies of `id` as (title, output).
    pub fn dependency_outputs(&self, id: &str) -> Vec<(String, String)> {
        let Some(node) = self.get(id) else {
            return Vec::new();
        };
        node.dependencies
            .iter()
            .filter_map(|dep| self.get(dep))
            .filter_map(|dep| dep.output.as_ref().map(|o| (dep.title.clone(), o.clone())))
            .collect()
    }

    pub fn topological_order(&self) -> Result<Vec<String>, GoalForgeError> {
        let order = toposort(&self.graph, None).map_err(|cycle| {
            GoalForgeError::InvalidGraph(format!(
                "cycle through task '{}'",
                self.graph[cycle.node_id()].id
            ))
        })?;
        Ok(order
            .into_iter()
            .map(|idx| self.graph[idx].id.clone())
            .collect())
    }

    pub fn total_tasks(&self) -> usize {
        self.len()
    }

    pub fn done_tasks(&self) -> usize {
        self.count(|s| s == TaskStatus::Done)
    }

    /// Includes nodes failed by a dependency.
    pub fn failed_tasks(&self) -> usize {
        self.count(|s| s.is_failed())
    }

    fn count(&self, pred: impl Fn(TaskStatus) -> bool) -> usize {
        self.nodes().filter(|n| pred(n.status)).count()
    }

    /// Terminal status from node outcomes. `partial` needs at least one done node.
    pub fn outcome(&self) -> GraphStatus {
        let done = self.done_tasks();
        if done == self.len() && done > 0 {
            GraphStatus::Completed
        } else if done > 0 {
            GraphStatus::Partial
        } else {
            GraphStatus::Failed
        }
    }

    /// Outputs of done sink nodes; falling back to all done outputs, then to a
    /// description of what failed.
    pub fn final_output(&self) -> String {
        let sinks: Vec<&str> = self
            .nodes()
            .filter(|n| n.status == TaskStatus::Done && self.is_sink(&n.id))
            .filter_map(|n| n.output.as_deref())
            .collect();
        if !sinks.is_empty() {
            return sinks.join("\n\n");
        }

        let done: Vec<&str> = self
            .nodes()
            .filter(|n| n.status == TaskStatus::Done)
            .filter_map(|n| n.output.as_deref())
            .collect();
        if !done.is_empty() {
            return done.join("\n\n");
        }

        let failures: Vec<String> = self
            .nodes()
            .filter(|n| n.status.is_failed())
            .map(|n| {
                format!(
                    "{}: {}",
                    n.title,
                    n.error.as_deref().unwrap_or("not completed")
                )
            })
            .collect();
        if failures.is_empty() {
            "No output produced.".to_string()
        } else {
            format!("All tasks failed.\n{}", failures.join("\n"))
        }
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            goal_id: self.goal_id.clone(),
            status: self.status,
            total_tasks: self.total_tasks(),
            done_tasks: self.done_tasks(),
            failed_tasks: self.failed_tasks(),
            nodes: self.nodes().cloned().collect(),
            edges: self.edges(),
        }
    }
}

/// Serializable view of a graph, as returned by inspect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub goal_id: String,
    pub status: GraphStatus,
    pub total_tasks: usize,
    pub done_tasks: usize,
    pub failed_tasks: usize,
    pub nodes: Vec<TaskNode>,
    pub edges: Vec<(String, String)>,
}
