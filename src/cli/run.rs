// src/cli/run.rs — Default command: plan and run one goal

use std::sync::Arc;

use super::progress;
use super::Cli;
use crate::core::events::{noop_sink, EventSink};
use crate::core::graph::GraphStatus;
use crate::core::orchestrator::{GoalOrchestrator, GoalOutcome, GoalRequest};
use crate::core::planner::PlanOverrides;
use crate::infra::config::Config;
use crate::infra::paths;
use crate::memory::{JsonlSummaryStore, SummaryStore};
use crate::provider::{ModelRef, ProviderRegistry};

/// Translate CLI flags into a request. Flags only ever tighten or widen
/// what config says when they are actually given.
pub fn build_request(cli: &Cli) -> anyhow::Result<GoalRequest> {
    let goal = cli.goal_text();
    if goal.trim().is_empty() {
        anyhow::bail!("no goal given. Usage: goalforge \"<goal>\"");
    }

    let force_model = match cli.model.as_deref() {
        Some(m) => Some(
            ModelRef::parse(m)
                .ok_or_else(|| anyhow::anyhow!("--model must look like provider/model, got '{m}'"))?,
        ),
        None => None,
    };

    let overrides = PlanOverrides {
        max_tasks: cli.max_tasks,
        use_llm: cli.llm_plan.then_some(true),
        allow_expensive: cli.allow_expensive.then_some(true),
        force_model,
    };

    let mut request = GoalRequest::new(goal)
        .with_mode(cli.mode)
        .with_overrides(overrides);
    if let Some(context) = &cli.context {
        request = request.with_context(context.clone());
    }
    if cli.sequential {
        request = request.sequential();
    }
    request.inspect = cli.inspect;
    request.stream = cli.stream;
    Ok(request)
}

fn event_sink(cli: &Cli) -> EventSink {
    if cli.stream {
        progress::json_lines()
    } else if cli.quiet || cli.inspect {
        noop_sink()
    } else {
        progress::terminal_progress()
    }
}

pub async fn run_goal(cli: &Cli, config: Config) -> anyhow::Result<()> {
    let request = build_request(cli)?;

    let providers = ProviderRegistry::from_config(&config);
    if providers.is_empty() && !request.inspect {
        tracing::warn!("No providers configured; every task will fail. Set an API key or run Ollama.");
    }

    let store: Option<Arc<dyn SummaryStore>> = if config.persistence.enabled {
        Some(Arc::new(JsonlSummaryStore::new(paths::history_file_path())))
    } else {
        None
    };

    let orchestrator = GoalOrchestrator::new(config, providers, store);
    let outcome = orchestrator.run(request, event_sink(cli)).await;
    orchestrator.shutdown().await;
    let outcome = outcome?;

    match &outcome {
        GoalOutcome::Planned(snapshot) => {
            println!("{}", serde_json::to_string_pretty(snapshot)?);
        }
        GoalOutcome::Executed(_) | GoalOutcome::Council(_) => {
            if !cli.stream {
                println!("{}", outcome.final_output().unwrap_or_default());
            }
        }
    }

    if outcome.status() == GraphStatus::Failed {
        anyhow::bail!("goal {} failed", outcome.goal_id());
    }
    Ok(())
}
