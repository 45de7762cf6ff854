// src/core/executor.rs — Dependency-ordered task execution
//
// The run loop owns the graph. Spawned jobs get an immutable snapshot of one
// task (prompt + routing), run the retry/escalation schedule, and hand back a
// TaskOutcome that only the loop applies. Terminal task events are emitted by
// the loop, so a dependent's task_started can never overtake them.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::cost::{estimate_tokens, CostLedger, RoutingDecision};
use super::events::{EventEmitter, EventKind, EventSink};
use super::graph::{GraphSnapshot, GraphStatus, TaskGraph};
use super::routing::RoutingPolicy;
use super::types::{Goal, TaskNode, TaskRouting, TaskStatus};
use crate::evaluator::utils::truncate_for_eval;
use crate::evaluator::{OutputValidator, ValidationInput};
use crate::infra::config::ExecutionConfig;
use crate::infra::errors::GoalForgeError;
use crate::provider::{Completion, CompletionRequest, ModelProvider, ProviderRegistry, TokenUsage};

const TASK_SYSTEM: &str = "You are one step of an automated pipeline working toward a larger goal. \
Complete only the task you are given and reply with the finished result.";

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub allow_parallelism: bool,
    /// 0 = bounded only by the ready set.
    pub max_concurrency: usize,
    pub same_tier_retries: u32,
    pub escalated_retries: u32,
    pub goal_timeout: Duration,
    pub task_max_tokens: u32,
    pub temperature: f32,
    pub dependency_output_chars: usize,
    /// Stream completions and forward each delta as a `task_progress` frame.
    pub stream_output: bool,
}

impl From<&ExecutionConfig> for ExecutorOptions {
    fn from(c: &ExecutionConfig) -> Self {
        Self {
            allow_parallelism: c.allow_parallelism,
            max_concurrency: c.max_concurrency,
            same_tier_retries: c.same_tier_retries,
            escalated_retries: c.escalated_retries,
            goal_timeout: Duration::from_secs(c.goal_timeout_secs),
            task_max_tokens: c.task_max_tokens,
            temperature: c.temperature,
            dependency_output_chars: c.dependency_output_chars,
            stream_output: false,
        }
    }
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::from(&ExecutionConfig::default())
    }
}

impl ExecutorOptions {
    fn concurrency_limit(&self) -> usize {
        if !self.allow_parallelism {
            1
        } else if self.max_concurrency == 0 {
            usize::MAX
        } else {
            self.max_concurrency
        }
    }

    fn total_attempts(&self) -> u32 {
        1 + self.same_tier_retries + self.escalated_retries
    }
}

/// Result of one goal run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub goal_id: String,
    pub status: GraphStatus,
    pub final_output: String,
    pub total_tasks: usize,
    pub done_tasks: usize,
    pub failed_tasks: usize,
    pub duration_ms: u64,
    pub providers_used: Vec<String>,
    pub cost_usd: f64,
    pub credits_charged: u64,
    pub graph: GraphSnapshot,
}

struct Shared {
    providers: ProviderRegistry,
    routing: RoutingPolicy,
    validator: Arc<dyn OutputValidator>,
    options: ExecutorOptions,
}

pub struct Executor {
    shared: Arc<Shared>,
}

/// Everything a spawned job needs; nothing in here points back at the graph.
struct TaskJob {
    task_id: String,
    /// Task instruction, used by the validator.
    instruction: String,
    /// Full prompt including goal and dependency outputs.
    prompt: String,
    routing: TaskRouting,
    emitter: EventEmitter,
}

struct TaskOutcome {
    task_id: String,
    attempts: u32,
    routing: TaskRouting,
    usage: TokenUsage,
    charges: Vec<(u32, RoutingDecision)>,
    result: Result<TaskSuccess, String>,
}

struct TaskSuccess {
    output: String,
    corrected: bool,
}

impl Executor {
    pub fn new(
        providers: ProviderRegistry,
        routing: RoutingPolicy,
        validator: Arc<dyn OutputValidator>,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                providers,
                routing,
                validator,
                options,
            }),
        }
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.shared.options
    }

    /// Run every task in the graph. Always emits exactly one terminal
    /// `done` or `error` event, whatever happens to individual tasks.
    pub async fn execute(&self, goal: &Goal, mut graph: TaskGraph, sink: EventSink) -> ExecutionReport {
        let emitter = EventEmitter::new(graph.goal_id(), sink);
        let options = &self.shared.options;
        let started = Instant::now();
        let deadline = started + options.goal_timeout;
        let limit = options.concurrency_limit();
        let mut ledger = CostLedger::new();

        graph.set_status(GraphStatus::Running);
        emitter.goal(EventKind::PlanCreated, plan_meta(&graph));
        tracing::info!(
            goal_id = graph.goal_id(),
            tasks = graph.len(),
            parallel = options.allow_parallelism,
            "Executing plan"
        );

        let mut join_set: JoinSet<TaskOutcome> = JoinSet::new();
        let mut deadline_hit = false;

        loop {
            if !deadline_hit && Instant::now() >= deadline {
                deadline_hit = true;
                self.expire_pending(&mut graph, &emitter);
            }

            if !deadline_hit {
                for task_id in graph.ready_tasks() {
                    if join_set.len() >= limit {
                        break;
                    }
                    if let Some(job) = self.prepare(goal, &mut graph, &task_id, &emitter) {
                        let shared = self.shared.clone();
                        join_set.spawn(async move {
                            let task_id = job.task_id.clone();
                            let routing = job.routing.clone();
                            match AssertUnwindSafe(run_job(shared, job)).catch_unwind().await {
                                Ok(outcome) => outcome,
                                Err(_) => TaskOutcome {
                                    task_id,
                                    attempts: 1,
                                    routing,
                                    usage: TokenUsage::default(),
                                    charges: Vec::new(),
                                    result: Err("task panicked".into()),
                                },
                            }
                        });
                    }
                }
            }

            if join_set.is_empty() {
                break;
            }

            let joined = if deadline_hit {
                join_set.join_next().await
            } else {
                tokio::select! {
                    joined = join_set.join_next() => joined,
                    _ = tokio::time::sleep_until(deadline) => continue,
                }
            };

            match joined {
                Some(Ok(outcome)) => self.apply(&mut graph, &mut ledger, &emitter, outcome),
                Some(Err(e)) => tracing::error!("Task join returned error: {}", e),
                None => break,
            }
        }

        // Only reachable after a join error.
        let stranded: Vec<String> = graph
            .nodes()
            .filter(|n| n.status == TaskStatus::Running || n.status == TaskStatus::Pending)
            .map(|n| n.id.clone())
            .collect();
        for id in stranded {
            fail_node(&mut graph, &id, TaskStatus::Failed, "task did not complete".into());
            emitter.task(
                EventKind::TaskFailed,
                &id,
                json!({"reason": "not_completed", "error": "task did not complete"}),
            );
        }

        let status = graph.outcome();
        graph.set_status(status);
        let report = ExecutionReport {
            goal_id: graph.goal_id().to_string(),
            status,
            final_output: graph.final_output(),
            total_tasks: graph.total_tasks(),
            done_tasks: graph.done_tasks(),
            failed_tasks: graph.failed_tasks(),
            duration_ms: started.elapsed().as_millis() as u64,
            providers_used: ledger.providers_used(),
            cost_usd: ledger.total_cost_usd(),
            credits_charged: ledger.total_credits(),
            graph: graph.snapshot(),
        };

        let meta = json!({
            "status": report.status,
            "finalOutput": report.final_output,
            "totalTasks": report.total_tasks,
            "doneTasks": report.done_tasks,
            "failedTasks": report.failed_tasks,
            "durationMs": report.duration_ms,
            "providersUsed": report.providers_used,
            "costUsd": report.cost_usd,
            "creditsCharged": report.credits_charged,
        });
        if status == GraphStatus::Failed {
            tracing::error!(goal_id = %report.goal_id, "Goal failed");
            emitter.goal(EventKind::Error, meta);
        } else {
            tracing::info!(
                goal_id = %report.goal_id,
                status = %status,
                done = report.done_tasks,
                total = report.total_tasks,
                cost = %ledger.summary(),
                "Goal finished"
            );
            emitter.goal(EventKind::Done, meta);
        }
        report
    }

    /// Mark a ready task running, emit `task_started`, and build its job.
    fn prepare(
        &self,
        goal: &Goal,
        graph: &mut TaskGraph,
        task_id: &str,
        emitter: &EventEmitter,
    ) -> Option<TaskJob> {
        let deps = graph.dependency_outputs(task_id);
        let node = graph.get_mut(task_id)?;
        node.status = TaskStatus::Running;
        node.attempt = 1;

        let prompt = build_prompt(goal, node, &deps, self.shared.options.dependency_output_chars);
        emitter.task(
            EventKind::TaskStarted,
            task_id,
            json!({
                "title": node.title,
                "type": node.task_type(),
                "attempt": 1,
                "provider": node.routing.provider,
                "model": node.routing.model,
                "tier": node.routing.tier,
            }),
        );
        tracing::debug!(task_id, model = %node.routing.key(), "Task dispatched");

        Some(TaskJob {
            task_id: task_id.to_string(),
            instruction: node.prompt.clone(),
            prompt,
            routing: node.routing.clone(),
            emitter: emitter.clone(),
        })
    }

    fn apply(
        &self,
        graph: &mut TaskGraph,
        ledger: &mut CostLedger,
        emitter: &EventEmitter,
        outcome: TaskOutcome,
    ) {
        let cost = self.shared.routing.cost();
        for (attempt, decision) in &outcome.charges {
            if ledger.charge(&outcome.task_id, *attempt, decision) {
                cost.assert_profitable(decision.estimated_cost_usd, decision.minimum_credits_to_charge);
            }
        }

        let task_cost = ledger.task_cost(&outcome.task_id);
        let Some(node) = graph.get_mut(&outcome.task_id) else {
            return;
        };
        node.attempt = outcome.attempts;
        node.routing = outcome.routing.clone();
        node.tokens_used = outcome.usage;
        node.cost_usd = task_cost;

        match outcome.result {
            Ok(success) => {
                node.status = TaskStatus::Done;
                node.corrected = success.corrected;
                let chars = success.output.chars().count();
                node.output = Some(success.output);
                emitter.task(
                    EventKind::TaskCompleted,
                    &outcome.task_id,
                    json!({
                        "attempt": outcome.attempts,
                        "corrected": success.corrected,
                        "provider": outcome.routing.provider,
                        "model": outcome.routing.model,
                        "tier": outcome.routing.tier,
                        "outputChars": chars,
                        "costUsd": task_cost,
                    }),
                );
            }
            Err(error) => {
                node.status = TaskStatus::Failed;
                node.error = Some(error.clone());
                tracing::warn!(task_id = %outcome.task_id, attempts = outcome.attempts, "Task failed: {}", error);
                emitter.task(
                    EventKind::TaskFailed,
                    &outcome.task_id,
                    json!({
                        "reason": "attempts_exhausted",
                        "attempt": outcome.attempts,
                        "error": error,
                    }),
                );
                self.cascade(graph, emitter, &outcome.task_id);
            }
        }
    }

    /// Fail every pending transitive dependent of a failed task.
    fn cascade(&self, graph: &mut TaskGraph, emitter: &EventEmitter, failed_id: &str) {
        for id in graph.transitive_dependents(failed_id) {
            let pending = graph
                .get(&id)
                .map(|n| n.status == TaskStatus::Pending)
                .unwrap_or(false);
            if !pending {
                continue;
            }
            let error = format!("dependency '{failed_id}' failed");
            fail_node(graph, &id, TaskStatus::FailedByDependency, error.clone());
            emitter.task(
                EventKind::TaskFailed,
                &id,
                json!({
                    "reason": "dependency_failed",
                    "failedDependency": failed_id,
                    "error": error,
                }),
            );
        }
    }

    fn expire_pending(&self, graph: &mut TaskGraph, emitter: &EventEmitter) {
        let pending = graph.pending_tasks();
        if pending.is_empty() {
            return;
        }
        tracing::warn!(
            goal_id = graph.goal_id(),
            pending = pending.len(),
            "Goal deadline exceeded, not dispatching remaining tasks"
        );
        for id in pending {
            fail_node(graph, &id, TaskStatus::Failed, "goal deadline exceeded".into());
            emitter.task(
                EventKind::TaskFailed,
                &id,
                json!({"reason": "deadline_exceeded", "error": "goal deadline exceeded"}),
            );
        }
    }
}

fn fail_node(graph: &mut TaskGraph, id: &str, status: TaskStatus, error: String) {
    if let Some(node) = graph.get_mut(id) {
        node.status = status;
        node.error = Some(error);
    }
}

fn plan_meta(graph: &TaskGraph) -> serde_json::Value {
    let tasks: Vec<serde_json::Value> = graph
        .nodes()
        .map(|n| {
            json!({
                "id": n.id,
                "title": n.title,
                "type": n.task_type(),
                "dependencies": n.dependencies,
                "provider": n.routing.provider,
                "model": n.routing.model,
                "tier": n.routing.tier,
                "requiresValidation": n.routing.requires_validation(),
                "highRisk": n.routing.high_risk(),
            })
        })
        .collect();
    json!({"totalTasks": graph.len(), "tasks": tasks})
}

/// Prompt for one task: goal, context, direct dependency outputs, instruction.
pub fn build_prompt(
    goal: &Goal,
    node: &TaskNode,
    dependency_outputs: &[(String, String)],
    max_dep_chars: usize,
) -> String {
    let mut prompt = format!("## Goal\n{}\n", goal.text.trim());
    if let Some(context) = &goal.context {
        prompt.push_str(&format!("\n## Context\n{}\n", context.trim()));
    }
    if !dependency_outputs.is_empty() {
        prompt.push_str("\n## Results from earlier tasks\n");
        for (title, output) in dependency_outputs {
            prompt.push_str(&format!(
                "### {}\n{}\n",
                title,
                truncate_for_eval(output, max_dep_chars)
            ));
        }
    }
    prompt.push_str(&format!("\n## Your task\n{}\n", node.prompt));
    prompt
}

/// Per-attempt bookkeeping a job accumulates.
struct Attempts {
    usage: TokenUsage,
    charges: Vec<(u32, RoutingDecision)>,
}

async fn run_job(shared: Arc<Shared>, job: TaskJob) -> TaskOutcome {
    let options = &shared.options;
    let total = options.total_attempts();
    let first_escalated = options.same_tier_retries + 2;
    let mut routing = job.routing.clone();
    let mut acc = Attempts {
        usage: TokenUsage::default(),
        charges: Vec::new(),
    };
    let mut last_error = String::new();

    for attempt in 1..=total {
        if attempt > 1 {
            if attempt == first_escalated {
                match shared.routing.escalate(&routing) {
                    Some(up) => {
                        tracing::info!(
                            task_id = %job.task_id,
                            from = %routing.key(),
                            to = %up.key(),
                            "Escalating task"
                        );
                        routing = up;
                    }
                    None => tracing::debug!(
                        task_id = %job.task_id,
                        "No higher tier allowed, retrying on the same model"
                    ),
                }
            }
            job.emitter.task(
                EventKind::TaskProgress,
                &job.task_id,
                json!({
                    "attempt": attempt,
                    "reason": last_error,
                    "provider": routing.provider,
                    "model": routing.model,
                    "tier": routing.tier,
                }),
            );
        }

        match attempt_once(&shared, &job, &routing, attempt, &mut acc).await {
            Ok(success) => {
                return TaskOutcome {
                    task_id: job.task_id,
                    attempts: attempt,
                    routing,
                    usage: acc.usage,
                    charges: acc.charges,
                    result: Ok(success),
                }
            }
            Err(reason) => {
                tracing::warn!(
                    task_id = %job.task_id,
                    attempt,
                    provider = %routing.provider,
                    model = %routing.model,
                    "Attempt failed: {}",
                    reason
                );
                last_error = reason;
            }
        }
    }

    TaskOutcome {
        task_id: job.task_id,
        attempts: total,
        routing,
        usage: acc.usage,
        charges: acc.charges,
        result: Err(last_error),
    }
}

/// Streamed calls report no usage, so tokens are estimated from the text.
async fn call_provider(
    shared: &Shared,
    job: &TaskJob,
    provider: &dyn ModelProvider,
    request: CompletionRequest,
    attempt: u32,
) -> Result<Completion, GoalForgeError> {
    if !shared.options.stream_output {
        return provider.execute(request).await;
    }

    let input_tokens = estimate_tokens(&request.prompt)
        .saturating_add(request.system.as_deref().map_or(0, estimate_tokens));
    let mut stream = provider.stream(request).await?;
    let mut text = String::new();
    while let Some(delta) = stream.next().await {
        let delta = delta?;
        job.emitter.task(
            EventKind::TaskProgress,
            &job.task_id,
            json!({ "attempt": attempt, "delta": delta }),
        );
        text.push_str(&delta);
    }
    let output_tokens = estimate_tokens(&text);
    Ok(Completion {
        completion: text,
        tokens_used: TokenUsage::new(input_tokens, output_tokens),
    })
}

/// One provider call plus, when required, one validation.
async fn attempt_once(
    shared: &Shared,
    job: &TaskJob,
    routing: &TaskRouting,
    attempt: u32,
    acc: &mut Attempts,
) -> Result<TaskSuccess, String> {
    let provider = shared.providers.get(&routing.provider).map_err(|e| e.to_string())?;
    let request = CompletionRequest::new(&routing.model, &job.prompt)
        .with_system(TASK_SYSTEM)
        .with_max_tokens(shared.options.task_max_tokens)
        .with_temperature(shared.options.temperature);

    let completion = call_provider(shared, job, provider.as_ref(), request, attempt)
        .await
        .map_err(|e| e.to_string())?;
    acc.usage.add(&completion.tokens_used);
    let decision = shared
        .routing
        .cost()
        .charge_for(&routing.key(), &completion.tokens_used);
    acc.charges.push((attempt, decision));

    if completion.completion.trim().is_empty() {
        return Err(format!("{} returned an empty completion", routing.key()));
    }

    if !(routing.requires_validation() || routing.high_risk()) {
        return Ok(TaskSuccess {
            output: completion.completion,
            corrected: false,
        });
    }

    let result = shared
        .validator
        .validate(ValidationInput {
            prompt: job.instruction.clone(),
            content: completion.completion.clone(),
            context: routing.context,
            options: shared.validator.default_options(),
        })
        .await;

    let mut meta = serde_json::to_value(&result).unwrap_or(serde_json::Value::Null);
    if let Some(obj) = meta.as_object_mut() {
        obj.insert("attempt".into(), json!(attempt));
    }
    job.emitter
        .task(EventKind::ValidationResult, &job.task_id, meta);

    if result.passed {
        return Ok(TaskSuccess {
            output: completion.completion,
            corrected: false,
        });
    }
    if let Some(corrected) = result.corrected {
        tracing::info!(task_id = %job.task_id, attempt, "Using validator correction");
        return Ok(TaskSuccess {
            output: corrected,
            corrected: true,
        });
    }
    Err(format!(
        "validation failed (score {}): {}",
        result.score,
        result.issues.join("; ")
    ))
}
