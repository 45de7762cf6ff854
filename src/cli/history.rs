// src/cli/history.rs — `goalforge history`

use crate::infra::paths;
use crate::memory::{GoalSummary, JsonlSummaryStore};

pub fn format_summary(s: &GoalSummary) -> String {
    let goal: String = s.goal_text.chars().take(60).collect();
    format!(
        "{}  {:<9} {}/{} tasks  ${:.4}  {}",
        s.completed_at.format("%Y-%m-%d %H:%M"),
        s.status.as_str(),
        s.done_tasks,
        s.total_tasks,
        s.cost_usd,
        goal,
    )
}

pub async fn show_history(limit: usize, json: bool) -> anyhow::Result<()> {
    let store = JsonlSummaryStore::new(paths::history_file_path());
    let summaries = store.read_recent(limit)?;
    if summaries.is_empty() {
        eprintln!("No goals recorded yet ({}).", store.path().display());
        return Ok(());
    }
    for s in summaries.iter().rev() {
        if json {
            println!("{}", serde_json::to_string(s)?);
        } else {
            println!("{}", format_summary(s));
        }
    }
    Ok(())
}
