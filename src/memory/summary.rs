// src/memory/summary.rs — Goal summaries and the JSONL history store

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::council::CouncilResult;
use crate::core::executor::ExecutionReport;
use crate::core::graph::GraphStatus;
use crate::core::types::{Goal, GoalMode};
use crate::infra::errors::GoalForgeError;

/// Rotate once the history file passes either limit.
const MAX_HISTORY_BYTES: u64 = 1_000_000;
const MAX_HISTORY_LINES: usize = 1_000;
/// Lines kept after rotation.
const KEEP_HISTORY_LINES: usize = 500;

/// What survives a goal run once its graph is discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSummary {
    pub goal_id: String,
    pub goal_text: String,
    pub mode: GoalMode,
    pub status: GraphStatus,
    pub final_output: String,
    pub total_tasks: usize,
    pub done_tasks: usize,
    pub failed_tasks: usize,
    pub duration_ms: u64,
    pub providers_used: Vec<String>,
    pub cost_usd: f64,
    pub credits_charged: u64,
    pub completed_at: DateTime<Utc>,
}

impl GoalSummary {
    pub fn from_report(goal: &Goal, report: &ExecutionReport) -> Self {
        Self {
            goal_id: report.goal_id.clone(),
            goal_text: goal.text.clone(),
            mode: goal.mode,
            status: report.status,
            final_output: report.final_output.clone(),
            total_tasks: report.total_tasks,
            done_tasks: report.done_tasks,
            failed_tasks: report.failed_tasks,
            duration_ms: report.duration_ms,
            providers_used: report.providers_used.clone(),
            cost_usd: report.cost_usd,
            credits_charged: report.credits_charged,
            completed_at: Utc::now(),
        }
    }

    /// Council runs count each of the four steps as one task.
    pub fn from_council(goal: &Goal, result: &CouncilResult) -> Self {
        let total = result.steps.len().max(4);
        let done = result.done_steps();
        Self {
            goal_id: result.goal_id.clone(),
            goal_text: goal.text.clone(),
            mode: GoalMode::Council,
            status: result.status,
            final_output: result.final_output.clone(),
            total_tasks: total,
            done_tasks: done,
            failed_tasks: total - done,
            duration_ms: result.duration_ms,
            providers_used: result.providers_used.clone(),
            cost_usd: result.cost_usd,
            credits_charged: result.credits_charged,
            completed_at: Utc::now(),
        }
    }
}

/// Persistence collaborator. Writes are best-effort from the engine's
/// point of view: the queue retries and finally drops.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn write_goal_summary(&self, summary: &GoalSummary) -> Result<(), GoalForgeError>;

    /// Most recent summaries, oldest first.
    async fn recent(&self, limit: usize) -> Result<Vec<GoalSummary>, GoalForgeError>;
}

/// Append-only JSON-lines file with size-based rotation.
#[derive(Debug, Clone)]
pub struct JsonlSummaryStore {
    path: PathBuf,
}

impl JsonlSummaryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, summary: &GoalSummary) -> Result<(), GoalForgeError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if needs_rotation(&self.path)? {
            rotate(&self.path)?;
        }
        let line = serde_json::to_string(summary)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Last `limit` parsable lines. Corrupt lines are skipped with a warning.
    pub fn read_recent(&self, limit: usize) -> Result<Vec<GoalSummary>, GoalForgeError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let lines: Vec<String> = std::io::BufReader::new(file)
            .lines()
            .collect::<Result<_, _>>()?;
        let start = lines.len().saturating_sub(limit);
        let mut out = Vec::with_capacity(lines.len() - start);
        for (n, line) in lines[start..].iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<GoalSummary>(line) {
                Ok(s) => out.push(s),
                Err(e) => tracing::warn!(line = start + n + 1, "Skipping corrupt history line: {}", e),
            }
        }
        Ok(out)
    }
}

fn needs_rotation(path: &Path) -> Result<bool, GoalForgeError> {
    let Ok(meta) = std::fs::metadata(path) else {
        return Ok(false);
    };
    if meta.len() > MAX_HISTORY_BYTES {
        return Ok(true);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().count() >= MAX_HISTORY_LINES)
}

fn rotate(path: &Path) -> Result<(), GoalForgeError> {
    let content = std::fs::read_to_string(path)?;
    let lines: Vec<&str> = content.lines().collect();
    let keep = &lines[lines.len().saturating_sub(KEEP_HISTORY_LINES)..];
    let mut kept = keep.join("\n");
    kept.push('\n');
    std::fs::write(path, kept)?;
    tracing::debug!(path = %path.display(), kept = keep.len(), "Rotated goal history");
    Ok(())
}

#[async_trait]
impl SummaryStore for JsonlSummaryStore {
    async fn write_goal_summary(&self, summary: &GoalSummary) -> Result<(), GoalForgeError> {
        let store = self.clone();
        let summary = summary.clone();
        tokio::task::spawn_blocking(move || store.append(&summary))
            .await
            .map_err(|e| GoalForgeError::Persistence(format!("history writer panicked: {e}")))?
    }

    async fn recent(&self, limit: usize) -> Result<Vec<GoalSummary>, GoalForgeError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.read_recent(limit))
            .await
            .map_err(|e| GoalForgeError::Persistence(format!("history reader panicked: {e}")))?
    }
}

/// In-process store, used when persistence is disabled and by tests.
#[derive(Debug, Default)]
pub struct MemorySummaryStore {
    summaries: Mutex<Vec<GoalSummary>>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<GoalSummary> {
        self.summaries
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SummaryStore for MemorySummaryStore {
    async fn write_goal_summary(&self, summary: &GoalSummary) -> Result<(), GoalForgeError> {
        self.summaries
            .lock()
            .map_err(|_| GoalForgeError::Persistence("summary store lock poisoned".into()))?
            .push(summary.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<GoalSummary>, GoalForgeError> {
        let all = self.all();
        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn summary(id: &str) -> GoalSummary {
        GoalSummary {
            goal_id: id.into(),
            goal_text: "add a footer".into(),
            mode: GoalMode::Auto,
            status: GraphStatus::Completed,
            final_output: "<footer>done</footer>".into(),
            total_tasks: 1,
            done_tasks: 1,
            failed_tasks: 0,
            duration_ms: 42,
            providers_used: vec!["ollama".into()],
            cost_usd: 0.0,
            credits_charged: 1,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let store = JsonlSummaryStore::new(dir.path().join("nested/history.jsonl"));
        store.append(&summary("g1")).unwrap();
        store.append(&summary("g2")).unwrap();

        let recent = store.read_recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].goal_id, "g1");
        assert_eq!(recent[1].goal_id, "g2");

        let last = store.read_recent(1).unwrap();
        assert_eq!(last[0].goal_id, "g2");
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonlSummaryStore::new(dir.path().join("none.jsonl"));
        assert!(store.read_recent(5).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.jsonl");
        let store = JsonlSummaryStore::new(&path);
        store.append(&summary("g1")).unwrap();
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "{{not json").unwrap();
        store.append(&summary("g2")).unwrap();

        let ids: Vec<String> = store
            .read_recent(10)
            .unwrap()
            .into_iter()
            .map(|s| s.goal_id)
            .collect();
        assert_eq!(ids, vec!["g1", "g2"]);
    }

    #[test]
    fn test_rotation_keeps_latest_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.jsonl");
        let body: String = (0..1100).map(|i| format!("line {i}\n")).collect();
        std::fs::write(&path, body).unwrap();

        assert!(needs_rotation(&path).unwrap());
        rotate(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), KEEP_HISTORY_LINES);
        assert_eq!(lines[0], "line 600");
        assert_eq!(lines[lines.len() - 1], "line 1099");
    }

    #[test]
    fn test_camel_case_wire_format() {
        let json = serde_json::to_value(summary("g1")).unwrap();
        assert_eq!(json["goalId"], "g1");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["mode"], "auto");
        assert!(json.get("creditsCharged").is_some());
    }

    #[tokio::test]
    async fn test_async_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = JsonlSummaryStore::new(dir.path().join("h.jsonl"));
        store.write_goal_summary(&summary("g9")).await.unwrap();
        let recent = store.recent(3).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].goal_id, "g9");
    }

    #[tokio::test]
    async fn test_memory_store_limit() {
        let store = MemorySummaryStore::new();
        for id in ["a", "b", "c"] {
            store.write_goal_summary(&summary(id)).await.unwrap();
        }
        let recent = store.recent(2).await.unwrap();
        assert_eq!(recent[0].goal_id, "b");
        assert_eq!(recent[1].goal_id, "c");
    }
}
