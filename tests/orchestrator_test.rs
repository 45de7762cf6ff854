// tests/orchestrator_test.rs — Integration test: goal orchestrator end to end

mod common;

use std::sync::Arc;

use common::*;
use goalforge::core::events::{channel_sink, EventKind};
use goalforge::core::graph::GraphStatus;
use goalforge::core::orchestrator::{GoalOrchestrator, GoalOutcome, GoalRequest};
use goalforge::core::types::{GoalMode, TaskType};
use goalforge::infra::config::Config;
use goalforge::memory::{JsonlSummaryStore, MemorySummaryStore, SummaryStore};
use goalforge::provider::ProviderRegistry;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[tokio::test]
async fn test_add_a_footer_end_to_end() {
    let provider = ScriptedProvider::replying("ollama", "<footer>© 2026 Acme Inc.</footer>");
    let store = Arc::new(MemorySummaryStore::new());
    let orchestrator = GoalOrchestrator::new(
        Config::default(),
        ProviderRegistry::new().with(provider.clone()),
        Some(store.clone()),
    );

    let (sink, mut rx) = channel_sink();
    let outcome = orchestrator
        .run(GoalRequest::new("add a footer"), sink)
        .await
        .unwrap();
    orchestrator.shutdown().await;
    let events = drain(&mut rx);

    let GoalOutcome::Executed(report) = outcome else {
        panic!("expected an executed goal");
    };
    assert_eq!(report.total_tasks, 1);
    assert_eq!(report.status, GraphStatus::Completed);
    assert_eq!(report.graph.nodes[0].task_type(), TaskType::CodeGen);
    assert!(report.graph.nodes[0].dependencies.is_empty());
    assert_eq!(report.graph.nodes[0].routing.key(), "ollama/llama3.1");
    assert_eq!(provider.calls(), 1);

    assert_eq!(events[0].kind, EventKind::PlanCreated);
    assert_eq!(events[0].goal_id, report.goal_id);
    assert_single_terminal(&events);

    let saved = store.all();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].goal_id, report.goal_id);
    assert_eq!(saved[0].goal_text, "add a footer");
    assert_eq!(saved[0].final_output, "<footer>© 2026 Acme Inc.</footer>");
    assert_eq!(saved[0].providers_used, vec!["ollama"]);
}

#[tokio::test]
async fn test_inspect_returns_plan_without_calls() {
    let provider = ScriptedProvider::replying("ollama", "unused");
    let store = Arc::new(MemorySummaryStore::new());
    let orchestrator = GoalOrchestrator::new(
        Config::default(),
        ProviderRegistry::new().with(provider.clone()),
        Some(store.clone()),
    );

    let request = GoalRequest::new("Research pricing pages, then build a pricing table").inspect_only();
    let (sink, mut rx) = channel_sink();
    let outcome = orchestrator.run(request, sink).await.unwrap();
    orchestrator.shutdown().await;

    let GoalOutcome::Planned(snapshot) = outcome else {
        panic!("expected a plan");
    };
    assert_eq!(snapshot.total_tasks, 2);
    assert_eq!(snapshot.edges, vec![("task-1".to_string(), "task-2".to_string())]);
    assert_eq!(provider.calls(), 0);
    assert!(drain(&mut rx).is_empty());
    assert!(store.all().is_empty());
}

#[tokio::test]
async fn test_council_mode_persists_summary() {
    let anthropic = ScriptedProvider::replying("anthropic", "Plan: add markup, then style.");
    let openai = ScriptedProvider::new("openai", std::time::Duration::ZERO, |req, _| {
        Ok(format!("answer from {}", req.model_id))
    });
    let store = Arc::new(MemorySummaryStore::new());
    let orchestrator = GoalOrchestrator::new(
        Config::default(),
        ProviderRegistry::new().with(anthropic.clone()).with(openai.clone()),
        Some(store.clone()),
    );

    let (sink, mut rx) = channel_sink();
    let outcome = orchestrator
        .run(GoalRequest::new("add a footer").with_mode(GoalMode::Council), sink)
        .await
        .unwrap();
    orchestrator.shutdown().await;

    let GoalOutcome::Council(result) = outcome else {
        panic!("expected a council result");
    };
    assert!(result.success);
    assert_eq!(result.final_output, "answer from gpt-4o-mini");
    assert_eq!(anthropic.calls(), 1);
    assert_eq!(openai.calls(), 3);
    assert_single_terminal(&drain(&mut rx));

    let saved = store.all();
    assert_eq!(saved[0].mode, GoalMode::Council);
    assert_eq!(saved[0].total_tasks, 4);
    assert_eq!(saved[0].done_tasks, 4);
}

#[tokio::test]
async fn test_summaries_written_to_jsonl_history() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("goal-history.jsonl");
    let store = Arc::new(JsonlSummaryStore::new(&path));
    let orchestrator = GoalOrchestrator::new(
        Config::default(),
        ProviderRegistry::new().with(ScriptedProvider::replying("ollama", "a finished answer")),
        Some(store.clone()),
    );

    for goal in ["add a footer", "add a header"] {
        let (sink, _rx) = channel_sink();
        orchestrator.run(GoalRequest::new(goal), sink).await.unwrap();
    }
    orchestrator.shutdown().await;

    let recent = store.recent(10).await.unwrap();
    let goals: Vec<&str> = recent.iter().map(|s| s.goal_text.as_str()).collect();
    assert_eq!(goals, vec!["add a footer", "add a header"]);
}

#[tokio::test]
async fn test_persistence_disabled_skips_store() {
    let mut config = Config::default();
    config.persistence.enabled = false;
    let store = Arc::new(MemorySummaryStore::new());
    let orchestrator = GoalOrchestrator::new(
        config,
        ProviderRegistry::new().with(ScriptedProvider::replying("ollama", "a finished answer")),
        Some(store.clone()),
    );
    let (sink, _rx) = channel_sink();
    orchestrator.run(GoalRequest::new("add a footer"), sink).await.unwrap();
    orchestrator.shutdown().await;
    assert!(store.all().is_empty());
}

#[tokio::test]
async fn test_no_providers_fails_goal_cleanly() {
    let orchestrator = GoalOrchestrator::new(Config::default(), ProviderRegistry::new(), None);
    let (sink, mut rx) = channel_sink();
    let outcome = orchestrator.run(GoalRequest::new("add a footer"), sink).await.unwrap();
    orchestrator.shutdown().await;

    assert_eq!(outcome.status(), GraphStatus::Failed);
    let events = drain(&mut rx);
    assert_eq!(events.last().unwrap().kind, EventKind::Error);
    assert_single_terminal(&events);
}
