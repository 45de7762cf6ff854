// src/core/orchestrator.rs — Goal orchestrator: one runtime context, three entry points

use std::sync::Arc;

use serde_json::json;

use super::council::{Council, CouncilResult};
use super::events::{AutonomyEvent, EventKind, EventSink};
use super::executor::{ExecutionReport, Executor, ExecutorOptions};
use super::graph::{GraphSnapshot, GraphStatus, TaskGraph};
use super::planner::{PlanOverrides, Planner};
use super::routing::RoutingPolicy;
use super::types::{Goal, GoalMode};
use crate::evaluator::{OutputValidator, Validator};
use crate::infra::config::Config;
use crate::infra::errors::GoalForgeError;
use crate::memory::{GoalSummary, QueuePolicy, SummaryQueue, SummaryStore};
use crate::provider::ProviderRegistry;

/// One goal submission.
#[derive(Debug, Clone, Default)]
pub struct GoalRequest {
    pub goal: String,
    pub context: Option<String>,
    pub mode: GoalMode,
    /// Plan only; nothing is executed.
    pub inspect: bool,
    pub overrides: PlanOverrides,
    /// Overrides `execution.allow_parallelism`.
    pub allow_parallelism: Option<bool>,
    /// Stream task output as `task_progress` delta frames.
    pub stream: bool,
}

impl GoalRequest {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_mode(mut self, mode: GoalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn inspect_only(mut self) -> Self {
        self.inspect = true;
        self
    }

    pub fn with_overrides(mut self, overrides: PlanOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.allow_parallelism = Some(false);
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    fn to_goal(&self) -> Goal {
        let goal = Goal::new(self.goal.clone()).with_mode(self.mode);
        match &self.context {
            Some(c) => goal.with_context(c.clone()),
            None => goal,
        }
    }
}

#[derive(Debug, Clone)]
pub enum GoalOutcome {
    Planned(GraphSnapshot),
    Executed(ExecutionReport),
    Council(CouncilResult),
}

impl GoalOutcome {
    pub fn goal_id(&self) -> &str {
        match self {
            GoalOutcome::Planned(s) => &s.goal_id,
            GoalOutcome::Executed(r) => &r.goal_id,
            GoalOutcome::Council(c) => &c.goal_id,
        }
    }

    pub fn status(&self) -> GraphStatus {
        match self {
            GoalOutcome::Planned(s) => s.status,
            GoalOutcome::Executed(r) => r.status,
            GoalOutcome::Council(c) => c.status,
        }
    }

    /// None for inspect-only runs.
    pub fn final_output(&self) -> Option<&str> {
        match self {
            GoalOutcome::Planned(_) => None,
            GoalOutcome::Executed(r) => Some(&r.final_output),
            GoalOutcome::Council(c) => Some(&c.final_output),
        }
    }
}

pub struct GoalOrchestrator {
    config: Config,
    providers: ProviderRegistry,
    routing: RoutingPolicy,
    validator: Arc<dyn OutputValidator>,
    queue: SummaryQueue,
}

impl GoalOrchestrator {
    /// Build the runtime context. Routing prefers providers that are actually
    /// registered. Spawns the summary worker, so call inside a runtime.
    pub fn new(config: Config, providers: ProviderRegistry, store: Option<Arc<dyn SummaryStore>>) -> Self {
        let routing = RoutingPolicy::new(&config.routing).with_available_providers(providers.ids());
        let validator: Arc<dyn OutputValidator> =
            Arc::new(Validator::new(providers.clone(), config.validation.clone()));
        let queue = match store {
            Some(store) if config.persistence.enabled => {
                SummaryQueue::spawn(store, QueuePolicy::from(&config.persistence))
            }
            _ => SummaryQueue::disabled(),
        };
        Self {
            config,
            providers,
            routing,
            validator,
            queue,
        }
    }

    /// Swap the output validator (tests, custom quality gates).
    pub fn with_validator(mut self, validator: Arc<dyn OutputValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn routing_for(&self, overrides: &PlanOverrides) -> RoutingPolicy {
        match overrides.allow_expensive {
            Some(allow) => self.routing.clone().with_allow_expensive(allow),
            None => self.routing.clone(),
        }
    }

    fn planner(&self, overrides: &PlanOverrides) -> Planner {
        Planner::new(
            self.config.planner.clone(),
            self.routing_for(overrides),
            self.providers.clone(),
        )
    }

    async fn plan(&self, goal: &Goal, request: &GoalRequest) -> Result<TaskGraph, GoalForgeError> {
        self.planner(&request.overrides).plan(goal, &request.overrides).await
    }

    /// Planned task graph without executing anything.
    pub async fn inspect(&self, request: &GoalRequest) -> Result<GraphSnapshot, GoalForgeError> {
        let goal = request.to_goal();
        Ok(self.plan(&goal, request).await?.snapshot())
    }

    /// Plan and execute one goal. Planning errors are returned before any
    /// task runs, after an `error` frame on `sink`. Every other outcome,
    /// including total task failure, is an `Ok` carrying its status.
    pub async fn run(&self, request: GoalRequest, sink: EventSink) -> Result<GoalOutcome, GoalForgeError> {
        if request.inspect {
            return self.inspect(&request).await.map(GoalOutcome::Planned);
        }
        let goal = request.to_goal();

        if goal.mode == GoalMode::Council {
            if goal.text.trim().is_empty() {
                return Err(planning_failed(&sink, GoalForgeError::planning("goal is empty")));
            }
            let goal_id = uuid::Uuid::new_v4().to_string();
            tracing::info!(goal_id = %goal_id, "Running council");
            let result = self.council().run(&goal, &goal_id, sink).await;
            self.queue.enqueue(GoalSummary::from_council(&goal, &result));
            return Ok(GoalOutcome::Council(result));
        }

        let graph = match self.plan(&goal, &request).await {
            Ok(g) => g,
            Err(e) => return Err(planning_failed(&sink, e)),
        };

        let report = self.executor(&request).execute(&goal, graph, sink).await;
        self.queue.enqueue(GoalSummary::from_report(&goal, &report));
        Ok(GoalOutcome::Executed(report))
    }

    fn executor(&self, request: &GoalRequest) -> Executor {
        let mut options = ExecutorOptions::from(&self.config.execution);
        if let Some(parallel) = request.allow_parallelism {
            options.allow_parallelism = parallel;
        }
        options.stream_output = request.stream;
        Executor::new(
            self.providers.clone(),
            self.routing_for(&request.overrides),
            self.validator.clone(),
            options,
        )
    }

    fn council(&self) -> Council {
        Council::new(
            self.providers.clone(),
            *self.routing.cost(),
            self.config.council.clone(),
            self.config.execution.task_max_tokens,
            self.config.execution.temperature,
        )
    }

    /// Flush pending summaries.
    pub async fn shutdown(self) {
        self.queue.shutdown().await;
    }
}

fn planning_failed(sink: &EventSink, error: GoalForgeError) -> GoalForgeError {
    let goal_id = uuid::Uuid::new_v4().to_string();
    tracing::warn!(goal_id = %goal_id, "Planning failed: {}", error);
    sink(
        AutonomyEvent::new(EventKind::Error, goal_id).with_meta(json!({
            "status": GraphStatus::Failed,
            "stage": "planning",
            "error": error.to_string(),
        })),
    );
    error
}
