// src/core/events.rs — Lifecycle events streamed to an observer

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PlanCreated,
    TaskStarted,
    TaskProgress,
    ValidationResult,
    TaskCompleted,
    TaskFailed,
    Done,
    Error,
}

impl EventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Done | EventKind::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PlanCreated => "plan_created",
            EventKind::TaskStarted => "task_started",
            EventKind::TaskProgress => "task_progress",
            EventKind::ValidationResult => "validation_result",
            EventKind::TaskCompleted => "task_completed",
            EventKind::TaskFailed => "task_failed",
            EventKind::Done => "done",
            EventKind::Error => "error",
        }
    }
}

/// One frame of the event stream: `{type, goalId, taskId?, timestamp, meta?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutonomyEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub goal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

impl AutonomyEvent {
    pub fn new(kind: EventKind, goal_id: impl Into<String>) -> Self {
        Self {
            kind,
            goal_id: goal_id.into(),
            task_id: None,
            timestamp: Utc::now(),
            meta: serde_json::Value::Null,
        }
    }

    pub fn for_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }

    /// One JSON line, as written by `--stream`.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"type\":\"{}\",\"goalId\":\"{}\"}}",
                self.kind.as_str(),
                self.goal_id
            )
        })
    }
}

/// Observer callback. Must not block; the executor calls it inline.
pub type EventSink = Arc<dyn Fn(AutonomyEvent) + Send + Sync>;

pub fn noop_sink() -> EventSink {
    Arc::new(|_| {})
}

/// Sink that forwards into an unbounded channel. Sends after the receiver is
/// dropped are discarded, so a detached consumer never stops execution.
pub fn channel_sink() -> (EventSink, mpsc::UnboundedReceiver<AutonomyEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink: EventSink = Arc::new(move |event| {
        let _ = tx.send(event);
    });
    (sink, rx)
}

/// Goal-scoped emitter so call sites don't repeat the goal id.
#[derive(Clone)]
pub struct EventEmitter {
    goal_id: String,
    sink: EventSink,
}

impl EventEmitter {
    pub fn new(goal_id: impl Into<String>, sink: EventSink) -> Self {
        Self {
            goal_id: goal_id.into(),
            sink,
        }
    }

    pub fn goal_id(&self) -> &str {
        &self.goal_id
    }

    pub fn goal(&self, kind: EventKind, meta: serde_json::Value) {
        (self.sink)(AutonomyEvent::new(kind, &self.goal_id).with_meta(meta));
    }

    pub fn task(&self, kind: EventKind, task_id: &str, meta: serde_json::Value) {
        (self.sink)(
            AutonomyEvent::new(kind, &self.goal_id)
                .for_task(task_id)
                .with_meta(meta),
        );
    }
}
