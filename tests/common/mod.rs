// tests/common/mod.rs — Scripted providers and validators shared by integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use goalforge::core::events::{AutonomyEvent, EventKind};
use goalforge::core::types::{CostTier, RoutingContext, TaskRouting};
use goalforge::evaluator::{OutputValidator, ValidationInput, ValidationOptions, ValidationResult};
use goalforge::infra::errors::GoalForgeError;
use goalforge::provider::{Completion, CompletionRequest, ModelProvider, TextStream, TokenUsage};

type Responder = dyn Fn(&CompletionRequest, u32) -> Result<String, GoalForgeError> + Send + Sync;

/// Provider whose reply is computed from the request and the 1-based call
/// number. Tracks calls and peak concurrency.
pub struct ScriptedProvider {
    id: String,
    delay: Duration,
    respond: Box<Responder>,
    calls: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(
        id: &str,
        delay: Duration,
        respond: impl Fn(&CompletionRequest, u32) -> Result<String, GoalForgeError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            delay,
            respond: Box::new(respond),
            calls: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(id: &str, text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(id, Duration::ZERO, move |_, _| Ok(text.clone()))
    }

    pub fn failing(id: &str) -> Arc<Self> {
        let provider = id.to_string();
        Self::new(id, Duration::ZERO, move |_, _| {
            Err(GoalForgeError::Provider {
                provider: provider.clone(),
                message: "HTTP 500".into(),
                retriable: false,
            })
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id
    }

    async fn execute(&self, request: CompletionRequest) -> Result<Completion, GoalForgeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let text = (self.respond)(&request, call)?;
        Ok(Completion {
            completion: text,
            tokens_used: TokenUsage::new(100, 50),
        })
    }
}

/// Provider with native streaming: every stream yields `chunks` in order.
/// With `break_first`, the first stream fails after its first chunk.
pub struct ChunkedProvider {
    id: String,
    chunks: Vec<String>,
    break_first: bool,
    executes: AtomicU32,
    streams: AtomicU32,
}

impl ChunkedProvider {
    pub fn new(id: &str, chunks: &[&str], break_first: bool) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            break_first,
            executes: AtomicU32::new(0),
            streams: AtomicU32::new(0),
        })
    }

    pub fn executes(&self) -> u32 {
        self.executes.load(Ordering::SeqCst)
    }

    pub fn streams(&self) -> u32 {
        self.streams.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for ChunkedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id
    }

    async fn execute(&self, _request: CompletionRequest) -> Result<Completion, GoalForgeError> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        Ok(Completion {
            completion: self.chunks.concat(),
            tokens_used: TokenUsage::new(100, 50),
        })
    }

    async fn stream(&self, _request: CompletionRequest) -> Result<TextStream, GoalForgeError> {
        let call = self.streams.fetch_add(1, Ordering::SeqCst) + 1;
        let items: Vec<Result<String, GoalForgeError>> = if self.break_first && call == 1 {
            vec![
                Ok(self.chunks[0].clone()),
                Err(GoalForgeError::Provider {
                    provider: self.id.clone(),
                    message: "SSE stream error: connection reset".into(),
                    retriable: false,
                }),
            ]
        } else {
            self.chunks.iter().cloned().map(Ok).collect()
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Validator double. The verdict for call `n` (1-based) comes from the closure.
pub struct CountingValidator {
    verdict: Box<dyn Fn(&ValidationInput, u32) -> ValidationResult + Send + Sync>,
    calls: AtomicU32,
    inputs: Mutex<Vec<ValidationInput>>,
}

impl CountingValidator {
    pub fn new(
        verdict: impl Fn(&ValidationInput, u32) -> ValidationResult + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            verdict: Box::new(verdict),
            calls: AtomicU32::new(0),
            inputs: Mutex::new(Vec::new()),
        })
    }

    pub fn passing() -> Arc<Self> {
        Self::new(|_, _| verdict(true, 90, None))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<ValidationInput> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutputValidator for CountingValidator {
    fn default_options(&self) -> ValidationOptions {
        ValidationOptions {
            max_content_chars: 6_000,
            use_full_model: false,
            attempt_fix: true,
        }
    }

    async fn validate(&self, input: ValidationInput) -> ValidationResult {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let result = (self.verdict)(&input, n);
        self.inputs.lock().unwrap().push(input);
        result
    }
}

pub fn verdict(passed: bool, score: u8, corrected: Option<&str>) -> ValidationResult {
    ValidationResult {
        passed,
        score,
        issues: if passed { vec![] } else { vec!["incomplete".into()] },
        corrected: corrected.map(str::to_string),
        model: "mock/judge".into(),
        duration_ms: 1,
        skipped: false,
        skip_reason: None,
    }
}

pub fn routing(key: &str, tier: CostTier, context: RoutingContext) -> TaskRouting {
    let (provider, model) = key.split_once('/').unwrap();
    TaskRouting {
        provider: provider.into(),
        model: model.into(),
        tier,
        context,
    }
}

pub fn drain(rx: &mut UnboundedReceiver<AutonomyEvent>) -> Vec<AutonomyEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}

pub fn kinds(events: &[AutonomyEvent]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind).collect()
}

pub fn index_of(events: &[AutonomyEvent], kind: EventKind, task: &str) -> Option<usize> {
    events
        .iter()
        .position(|e| e.kind == kind && e.task_id.as_deref() == Some(task))
}

pub fn for_task<'a>(events: &'a [AutonomyEvent], kind: EventKind, task: &str) -> Vec<&'a AutonomyEvent> {
    events
        .iter()
        .filter(|e| e.kind == kind && e.task_id.as_deref() == Some(task))
        .collect()
}

/// Exactly one terminal frame, and it is the last one.
pub fn assert_single_terminal(events: &[AutonomyEvent]) {
    let terminals = events.iter().filter(|e| e.kind.is_terminal()).count();
    assert_eq!(terminals, 1, "expected one terminal event, got {:?}", kinds(events));
    assert!(events.last().unwrap().kind.is_terminal());
}
