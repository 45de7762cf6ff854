// src/cli/progress.rs — Terminal renderers for the event stream

use std::io::Write;
use std::sync::Arc;

use serde_json::Value;

use crate::core::events::{AutonomyEvent, EventKind, EventSink};

/// Human-readable progress on stderr, so stdout stays clean for the result.
pub fn terminal_progress() -> EventSink {
    Arc::new(|event| {
        eprintln!("{}", format_event(&event));
    })
}

/// `--stream`: one JSON frame per line on stdout.
pub fn json_lines() -> EventSink {
    Arc::new(|event: AutonomyEvent| {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", event.to_json_line());
        let _ = out.flush();
    })
}

fn text<'a>(meta: &'a Value, key: &str) -> &'a str {
    meta.get(key).and_then(Value::as_str).unwrap_or("?")
}

fn num(meta: &Value, key: &str) -> u64 {
    meta.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn cost(meta: &Value, key: &str) -> f64 {
    meta.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn model(meta: &Value) -> String {
    match meta.get("provider").and_then(Value::as_str) {
        Some(p) => format!("{}/{}", p, text(meta, "model")),
        None => text(meta, "model").to_string(),
    }
}

pub fn format_event(event: &AutonomyEvent) -> String {
    let meta = &event.meta;
    let task = event.task_id.as_deref().unwrap_or("-");
    match event.kind {
        EventKind::PlanCreated => {
            if meta.get("mode").and_then(Value::as_str) == Some("council") {
                "[plan] council: architect -> builder -> validator -> summarizer".to_string()
            } else {
                format!("[plan] {} task(s)", num(meta, "totalTasks"))
            }
        }
        EventKind::TaskStarted => match meta.get("title").and_then(Value::as_str) {
            Some(title) => format!("[{task}] start  {title} ({})", model(meta)),
            None => format!("[{task}] start  ({})", model(meta)),
        },
        EventKind::TaskProgress if meta.get("delta").is_some() => format!(
            "[{task}] output +{} char(s)",
            text(meta, "delta").chars().count()
        ),
        EventKind::TaskProgress => format!(
            "[{task}] retry  attempt {} on {}: {}",
            num(meta, "attempt"),
            model(meta),
            text(meta, "reason"),
        ),
        EventKind::ValidationResult => {
            if meta.get("skipped").and_then(Value::as_bool) == Some(true) {
                format!("[{task}] check  skipped ({})", text(meta, "skipReason"))
            } else {
                let verdict = if meta.get("passed").and_then(Value::as_bool) == Some(true) {
                    "pass"
                } else {
                    "fail"
                };
                format!("[{task}] check  {verdict} score={}", num(meta, "score"))
            }
        }
        EventKind::TaskCompleted => format!("[{task}] done   (${:.4})", cost(meta, "costUsd")),
        EventKind::TaskFailed => match meta.get("reason").and_then(Value::as_str) {
            Some("dependency_failed") => format!(
                "[{task}] skip   dependency {} failed",
                text(meta, "failedDependency")
            ),
            _ => format!("[{task}] failed {}", text(meta, "error")),
        },
        EventKind::Done | EventKind::Error => format!(
            "[{}] {}/{} task(s) in {}ms, cost=${:.4}, credits={}",
            text(meta, "status"),
            num(meta, "doneTasks"),
            num(meta, "totalTasks"),
            num(meta, "durationMs"),
            cost(meta, "costUsd"),
            num(meta, "creditsCharged"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(kind: EventKind, task: Option<&str>, meta: Value) -> AutonomyEvent {
        let e = AutonomyEvent::new(kind, "g1").with_meta(meta);
        match task {
            Some(t) => e.for_task(t),
            None => e,
        }
    }

    #[test]
    fn test_plan_created_format() {
        let line = format_event(&event(EventKind::PlanCreated, None, json!({"totalTasks": 3})));
        assert_eq!(line, "[plan] 3 task(s)");
    }

    #[test]
    fn test_council_plan_format() {
        let line = format_event(&event(
            EventKind::PlanCreated,
            None,
            json!({"mode": "council", "totalTasks": 4}),
        ));
        assert!(line.contains("architect -> builder"));
    }

    #[test]
    fn test_task_started_format() {
        let line = format_event(&event(
            EventKind::TaskStarted,
            Some("task-1"),
            json!({"title": "Add a footer", "provider": "ollama", "model": "llama3.1"}),
        ));
        assert_eq!(line, "[task-1] start  Add a footer (ollama/llama3.1)");
    }

    #[test]
    fn test_validation_formats() {
        let pass = format_event(&event(
            EventKind::ValidationResult,
            Some("task-2"),
            json!({"passed": false, "score": 20, "skipped": false}),
        ));
        assert_eq!(pass, "[task-2] check  fail score=20");

        let skipped = format_event(&event(
            EventKind::ValidationResult,
            Some("task-2"),
            json!({"passed": true, "skipped": true, "skipReason": "timeout"}),
        ));
        assert!(skipped.contains("skipped (timeout)"));
    }

    #[test]
    fn test_progress_formats() {
        let retry = format_event(&event(
            EventKind::TaskProgress,
            Some("task-1"),
            json!({"attempt": 2, "reason": "timeout", "provider": "groq", "model": "llama-3.1-8b-instant"}),
        ));
        assert_eq!(retry, "[task-1] retry  attempt 2 on groq/llama-3.1-8b-instant: timeout");

        let delta = format_event(&event(
            EventKind::TaskProgress,
            Some("task-1"),
            json!({"attempt": 1, "delta": "<footer>"}),
        ));
        assert_eq!(delta, "[task-1] output +8 char(s)");
    }

    #[test]
    fn test_cascade_format() {
        let line = format_event(&event(
            EventKind::TaskFailed,
            Some("task-3"),
            json!({"reason": "dependency_failed", "failedDependency": "task-1"}),
        ));
        assert_eq!(line, "[task-3] skip   dependency task-1 failed");
    }

    #[test]
    fn test_terminal_format() {
        let line = format_event(&event(
            EventKind::Done,
            None,
            json!({
                "status": "partial",
                "doneTasks": 1,
                "totalTasks": 2,
                "durationMs": 1500,
                "costUsd": 0.0123,
                "creditsCharged": 3,
            }),
        ));
        assert!(line.starts_with("[partial] 1/2 task(s)"));
        assert!(line.contains("cost=$0.0123"));
        assert!(line.contains("credits=3"));
    }
}
