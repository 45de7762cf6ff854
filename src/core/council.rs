// src/core/council.rs — Fixed architect → builder → validator → summarizer pipeline

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::cost::{CostLedger, CostPolicy};
use super::events::{EventEmitter, EventKind, EventSink};
use super::graph::GraphStatus;
use super::types::Goal;
use crate::infra::config::CouncilConfig;
use crate::infra::errors::GoalForgeError;
use crate::provider::{CompletionRequest, ModelRef, ProviderRegistry, TokenUsage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouncilRole {
    Architect,
    Builder,
    Validator,
    Summarizer,
}

impl CouncilRole {
    pub const ORDER: [CouncilRole; 4] = [
        CouncilRole::Architect,
        CouncilRole::Builder,
        CouncilRole::Validator,
        CouncilRole::Summarizer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CouncilRole::Architect => "architect",
            CouncilRole::Builder => "builder",
            CouncilRole::Validator => "validator",
            CouncilRole::Summarizer => "summarizer",
        }
    }

    fn system(&self) -> &'static str {
        match self {
            CouncilRole::Architect => {
                "You are the architect. Produce a concise, ordered implementation plan."
            }
            CouncilRole::Builder => "You are the builder. Carry out the plan and produce the deliverable.",
            CouncilRole::Validator => {
                "You are the reviewer. Critique the deliverable: correctness, gaps, risks."
            }
            CouncilRole::Summarizer => {
                "You are the summarizer. Produce the final answer, folding in valid review points."
            }
        }
    }
}

impl std::fmt::Display for CouncilRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouncilStep {
    pub step: u8,
    pub role: CouncilRole,
    pub model: String,
    pub prompt: String,
    pub response: Option<String>,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
    pub tokens_used: TokenUsage,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouncilResult {
    pub goal_id: String,
    pub status: GraphStatus,
    pub success: bool,
    pub final_output: String,
    pub steps: Vec<CouncilStep>,
    pub duration_ms: u64,
    pub providers_used: Vec<String>,
    pub cost_usd: f64,
    pub credits_charged: u64,
}

impl CouncilResult {
    pub fn done_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.success).count()
    }
}

pub struct Council {
    providers: ProviderRegistry,
    cost: CostPolicy,
    config: CouncilConfig,
    max_tokens: u32,
    temperature: f32,
}

impl Council {
    pub fn new(
        providers: ProviderRegistry,
        cost: CostPolicy,
        config: CouncilConfig,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            providers,
            cost,
            config,
            max_tokens,
            temperature,
        }
    }

    fn model_for(&self, role: CouncilRole) -> &str {
        match role {
            CouncilRole::Architect => &self.config.architect,
            CouncilRole::Builder => &self.config.builder,
            CouncilRole::Validator => &self.config.validator,
            CouncilRole::Summarizer => &self.config.summarizer,
        }
    }

    pub async fn run(&self, goal: &Goal, goal_id: &str, sink: EventSink) -> CouncilResult {
        let emitter = EventEmitter::new(goal_id, sink);
        let started = Instant::now();
        let mut ledger = CostLedger::new();
        let mut steps: Vec<CouncilStep> = Vec::with_capacity(4);

        let roles: Vec<serde_json::Value> = CouncilRole::ORDER
            .iter()
            .map(|r| json!({"role": r, "model": self.model_for(*r)}))
            .collect();
        emitter.goal(
            EventKind::PlanCreated,
            json!({"mode": "council", "totalTasks": 4, "steps": roles}),
        );

        let goal_block = goal_block(goal);

        // Architect
        let architect = self
            .step(1, CouncilRole::Architect, goal_block.clone(), &emitter, &mut ledger)
            .await;
        let plan = architect.response.clone();
        steps.push(architect);
        let Some(plan) = plan else {
            return self.finish(goal_id, steps, None, started, ledger, &emitter);
        };

        // Builder
        let prompt = format!("{goal_block}\n## Plan\n{plan}\n");
        let builder = self
            .step(2, CouncilRole::Builder, prompt, &emitter, &mut ledger)
            .await;
        let built = builder.response.clone();
        steps.push(builder);
        let Some(built) = built else {
            return self.finish(goal_id, steps, Some(plan), started, ledger, &emitter);
        };

        // Validator, failure tolerated
        let prompt = format!("{goal_block}\n## Deliverable\n{built}\n");
        let validator = self
            .step(3, CouncilRole::Validator, prompt, &emitter, &mut ledger)
            .await;
        let critique = validator.response.clone();
        steps.push(validator);

        // Summarizer
        let review = critique
            .as_deref()
            .unwrap_or("(review unavailable, use the deliverable as is)");
        let prompt = format!(
            "{goal_block}\n## Plan\n{plan}\n\n## Deliverable\n{built}\n\n## Review\n{review}\n"
        );
        let summarizer = self
            .step(4, CouncilRole::Summarizer, prompt, &emitter, &mut ledger)
            .await;
        let summary = summarizer.response.clone();
        steps.push(summarizer);

        match summary {
            Some(summary) => self.finish_ok(goal_id, steps, summary, started, ledger, &emitter),
            None => self.finish(goal_id, steps, Some(built), started, ledger, &emitter),
        }
    }

    async fn step(
        &self,
        number: u8,
        role: CouncilRole,
        prompt: String,
        emitter: &EventEmitter,
        ledger: &mut CostLedger,
    ) -> CouncilStep {
        let model_key = self.model_for(role).to_string();
        emitter.task(
            EventKind::TaskStarted,
            role.as_str(),
            json!({"step": number, "model": model_key}),
        );
        let started = Instant::now();
        let outcome = self.call(&model_key, role, &prompt).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok((response, usage)) => {
                let decision = self.cost.charge_for(&model_key, &usage);
                if ledger.charge(role.as_str(), 1, &decision) {
                    self.cost
                        .assert_profitable(decision.estimated_cost_usd, decision.minimum_credits_to_charge);
                }
                emitter.task(
                    EventKind::TaskCompleted,
                    role.as_str(),
                    json!({
                        "step": number,
                        "model": model_key,
                        "durationMs": duration_ms,
                        "costUsd": decision.estimated_cost_usd,
                    }),
                );
                tracing::info!(role = %role, model = %model_key, duration_ms, "Council step done");
                CouncilStep {
                    step: number,
                    role,
                    model: model_key,
                    prompt,
                    response: Some(response),
                    duration_ms,
                    success: true,
                    error: None,
                    tokens_used: usage,
                    cost_usd: decision.estimated_cost_usd,
                }
            }
            Err(e) => {
                let error = e.to_string();
                tracing::warn!(role = %role, model = %model_key, "Council step failed: {}", error);
                emitter.task(
                    EventKind::TaskFailed,
                    role.as_str(),
                    json!({"step": number, "model": model_key, "error": error}),
                );
                CouncilStep {
                    step: number,
                    role,
                    model: model_key,
                    prompt,
                    response: None,
                    duration_ms,
                    success: false,
                    error: Some(error),
                    tokens_used: TokenUsage::default(),
                    cost_usd: 0.0,
                }
            }
        }
    }

    async fn call(
        &self,
        model_key: &str,
        role: CouncilRole,
        prompt: &str,
    ) -> Result<(String, TokenUsage), GoalForgeError> {
        let model = ModelRef::parse(model_key)
            .ok_or_else(|| GoalForgeError::Config(format!("invalid {role} model '{model_key}'")))?;
        let provider = self.providers.get(&model.provider)?;
        let request = CompletionRequest::new(&model.model, prompt)
            .with_system(role.system())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);
        let timeout = Duration::from_secs(self.config.step_timeout_secs);
        let completion = tokio::time::timeout(timeout, provider.execute(request))
            .await
            .map_err(|_| GoalForgeError::Timeout {
                provider: model.provider.clone(),
                after_ms: timeout.as_millis() as u64,
            })??;
        if completion.completion.trim().is_empty() {
            return Err(GoalForgeError::MalformedOutput {
                provider: model.provider,
                message: "empty completion".into(),
            });
        }
        Ok((completion.completion, completion.tokens_used))
    }

    fn finish_ok(
        &self,
        goal_id: &str,
        steps: Vec<CouncilStep>,
        output: String,
        started: Instant,
        ledger: CostLedger,
        emitter: &EventEmitter,
    ) -> CouncilResult {
        let status = if steps.iter().all(|s| s.success) {
            GraphStatus::Completed
        } else {
            GraphStatus::Partial
        };
        self.result(goal_id, steps, output, true, status, started, ledger, emitter)
    }

    /// Pipeline stopped short; `best` is the latest successful stage output.
    fn finish(
        &self,
        goal_id: &str,
        steps: Vec<CouncilStep>,
        best: Option<String>,
        started: Instant,
        ledger: CostLedger,
        emitter: &EventEmitter,
    ) -> CouncilResult {
        match best {
            Some(output) => {
                self.result(goal_id, steps, output, false, GraphStatus::Partial, started, ledger, emitter)
            }
            None => {
                let error = steps
                    .last()
                    .and_then(|s| s.error.clone())
                    .unwrap_or_else(|| "council produced no output".into());
                let output = format!("Council failed: {error}");
                self.result(goal_id, steps, output, false, GraphStatus::Failed, started, ledger, emitter)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn result(
        &self,
        goal_id: &str,
        steps: Vec<CouncilStep>,
        final_output: String,
        success: bool,
        status: GraphStatus,
        started: Instant,
        ledger: CostLedger,
        emitter: &EventEmitter,
    ) -> CouncilResult {
        let result = CouncilResult {
            goal_id: goal_id.to_string(),
            status,
            success,
            final_output,
            duration_ms: started.elapsed().as_millis() as u64,
            providers_used: ledger.providers_used(),
            cost_usd: ledger.total_cost_usd(),
            credits_charged: ledger.total_credits(),
            steps,
        };
        let meta = json!({
            "mode": "council",
            "status": result.status,
            "success": result.success,
            "finalOutput": result.final_output,
            "totalTasks": CouncilRole::ORDER.len(),
            "doneTasks": result.done_steps(),
            "failedTasks": CouncilRole::ORDER.len() - result.done_steps(),
            "durationMs": result.duration_ms,
            "providersUsed": result.providers_used,
            "costUsd": result.cost_usd,
            "creditsCharged": result.credits_charged,
        });
        if status == GraphStatus::Failed {
            emitter.goal(EventKind::Error, meta);
        } else {
            emitter.goal(EventKind::Done, meta);
        }
        result
    }
}

fn goal_block(goal: &Goal) -> String {
    match &goal.context {
        Some(context) => format!("## Goal\n{}\n\n## Context\n{}\n", goal.text.trim(), context.trim()),
        None => format!("## Goal\n{}\n", goal.text.trim()),
    }
}
