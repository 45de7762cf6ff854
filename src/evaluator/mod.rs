// src/evaluator/mod.rs — Output validator: heuristics, then an LLM rubric

pub mod heuristics;
pub mod judge;
pub mod parser;
pub mod utils;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::types::RoutingContext;
use crate::infra::config::ValidationConfig;
use crate::provider::{ModelRef, ProviderRegistry};
use judge::{run_judge, JudgeRequest};

/// Score given to content rejected by heuristics alone.
pub const HEURISTIC_FAIL_SCORE: u8 = 20;
/// Penalty per heuristic soft issue.
pub const SOFT_ISSUE_PENALTY: u8 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub passed: bool,
    pub score: u8,
    pub issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected: Option<String>,
    pub model: String,
    pub duration_ms: u64,
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    pub max_content_chars: usize,
    pub use_full_model: bool,
    pub attempt_fix: bool,
}

#[derive(Debug, Clone)]
pub struct ValidationInput {
    pub prompt: String,
    pub content: String,
    pub context: RoutingContext,
    pub options: ValidationOptions,
}

/// Quality gate the executor consults for validated tasks.
#[async_trait]
pub trait OutputValidator: Send + Sync {
    fn default_options(&self) -> ValidationOptions;

    /// Never fails: problems calling the rubric model degrade to a
    /// pass-through result.
    async fn validate(&self, input: ValidationInput) -> ValidationResult;
}

pub struct Validator {
    providers: ProviderRegistry,
    config: ValidationConfig,
}

impl Validator {
    pub fn new(providers: ProviderRegistry, config: ValidationConfig) -> Self {
        Self { providers, config }
    }

    fn pass_through(&self, model: &str, started: Instant, reason: String) -> ValidationResult {
        tracing::warn!(model, reason = %reason, "Validator unavailable, passing output through");
        ValidationResult {
            passed: true,
            score: self.config.pass_through_score,
            issues: vec![format!("unverified: {reason}")],
            corrected: None,
            model: model.to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            skipped: true,
            skip_reason: Some(reason),
        }
    }

    fn rubric_model(&self, input: &ValidationInput) -> &str {
        if input.context.high_risk() || input.options.use_full_model {
            &self.config.full_model
        } else {
            &self.config.fast_model
        }
    }
}

#[async_trait]
impl OutputValidator for Validator {
    fn default_options(&self) -> ValidationOptions {
        ValidationOptions {
            max_content_chars: self.config.max_content_chars,
            use_full_model: false,
            attempt_fix: self.config.attempt_fix,
        }
    }

    async fn validate(&self, input: ValidationInput) -> ValidationResult {
        let started = Instant::now();
        let report = heuristics::check(&input.prompt, &input.content, &self.config);

        if let Some(reason) = report.hard_failure {
            tracing::debug!(reason = %reason, "Heuristic validation failed");
            return ValidationResult {
                passed: false,
                score: HEURISTIC_FAIL_SCORE,
                issues: vec![reason],
                corrected: None,
                model: "heuristic".into(),
                duration_ms: started.elapsed().as_millis() as u64,
                skipped: false,
                skip_reason: None,
            };
        }

        let model_key = self.rubric_model(&input).to_string();
        let Some(model) = ModelRef::parse(&model_key) else {
            return self.pass_through(
                &model_key,
                started,
                format!("invalid validator model '{model_key}'"),
            );
        };
        let provider = match self.providers.get(&model.provider) {
            Ok(p) => p,
            Err(e) => return self.pass_through(&model_key, started, e.to_string()),
        };

        let verdict = run_judge(
            provider.as_ref(),
            JudgeRequest {
                model_id: &model.model,
                prompt: &input.prompt,
                content: &input.content,
                max_content_chars: input.options.max_content_chars,
                attempt_fix: input.options.attempt_fix,
                timeout: Duration::from_secs(self.config.timeout_secs),
            },
        )
        .await;

        let verdict = match verdict {
            Ok(v) => v,
            Err(e) => return self.pass_through(&model_key, started, e.to_string()),
        };

        let penalty = SOFT_ISSUE_PENALTY.saturating_mul(report.soft_issues.len() as u8);
        let score = verdict.score.saturating_sub(penalty);
        let passed = verdict.passed && score >= self.config.pass_threshold;
        let mut issues = verdict.issues;
        issues.extend(report.soft_issues);
        let corrected = if input.options.attempt_fix {
            verdict.corrected.filter(|c| !c.trim().is_empty())
        } else {
            None
        };

        ValidationResult {
            passed,
            score,
            issues,
            corrected,
            model: model_key,
            duration_ms: started.elapsed().as_millis() as u64,
            skipped: false,
            skip_reason: None,
        }
    }
}
