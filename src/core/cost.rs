// src/core/cost.rs — Model catalog, pricing, credits and the per-goal ledger

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::types::CostTier;
use crate::provider::{ModelRef, TokenUsage};

/// Token shape used to place a model in a tier.
pub const REFERENCE_INPUT_TOKENS: u32 = 3_000;
pub const REFERENCE_OUTPUT_TOKENS: u32 = 1_000;

/// Price used for models missing from the catalog, per Mtok (input, output).
pub const DEFAULT_PRICING: (f64, f64) = (1.0, 3.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpec {
    pub provider: &'static str,
    pub model: &'static str,
    pub tier: CostTier,
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl ModelSpec {
    pub fn key(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }

    pub fn model_ref(&self) -> ModelRef {
        ModelRef::new(self.provider, self.model)
    }

    /// Cost of one reference-sized call. Used to rank models within a tier.
    pub fn blended_price(&self) -> f64 {
        price_call(
            (self.input_per_mtok, self.output_per_mtok),
            REFERENCE_INPUT_TOKENS,
            REFERENCE_OUTPUT_TOKENS,
        )
    }
}

const fn spec(
    provider: &'static str,
    model: &'static str,
    tier: CostTier,
    input_per_mtok: f64,
    output_per_mtok: f64,
) -> ModelSpec {
    ModelSpec {
        provider,
        model,
        tier,
        input_per_mtok,
        output_per_mtok,
    }
}

pub static CATALOG: &[ModelSpec] = &[
    // Local (free)
    spec("ollama", "llama3.1", CostTier::Free, 0.0, 0.0),
    spec("ollama", "qwen2.5-coder", CostTier::Free, 0.0, 0.0),
    // Low
    spec("groq", "llama-3.1-8b-instant", CostTier::Low, 0.05, 0.08),
    spec("google", "gemini-2.0-flash", CostTier::Low, 0.1, 0.4),
    spec("openai", "gpt-4o-mini", CostTier::Low, 0.15, 0.6),
    spec("google", "gemini-2.5-flash", CostTier::Low, 0.15, 0.6),
    spec("openai", "gpt-4.1-mini", CostTier::Low, 0.4, 1.6),
    // Moderate
    spec("anthropic", "claude-haiku-3-5-20241022", CostTier::Moderate, 0.8, 4.0),
    spec("openai", "o3-mini", CostTier::Moderate, 1.1, 4.4),
    spec("openai", "gpt-4.1", CostTier::Moderate, 2.0, 8.0),
    spec("google", "gemini-2.5-pro", CostTier::Moderate, 1.25, 10.0),
    spec("openai", "gpt-4o", CostTier::Moderate, 2.5, 10.0),
    spec("anthropic", "claude-sonnet-4-20250514", CostTier::Moderate, 3.0, 15.0),
    // Expensive
    spec("openai", "o3", CostTier::Expensive, 10.0, 40.0),
    spec("anthropic", "claude-opus-4-20250514", CostTier::Expensive, 15.0, 75.0),
];

/// Catalog entry for a `provider/model` key.
pub fn lookup(model_key: &str) -> Option<&'static ModelSpec> {
    let r = ModelRef::parse(model_key)?;
    CATALOG
        .iter()
        .find(|s| s.provider == r.provider && s.model == r.model)
}

/// Returns (input_price_per_mtok, output_price_per_mtok).
pub fn model_pricing(model_key: &str) -> (f64, f64) {
    lookup(model_key)
        .map(|s| (s.input_per_mtok, s.output_per_mtok))
        .unwrap_or(DEFAULT_PRICING)
}

/// Catalog tier, or the tier a reference call's cost falls into.
pub fn tier_of(model_key: &str) -> CostTier {
    match lookup(model_key) {
        Some(spec) => spec.tier,
        None => CostTier::for_cost(price_call(
            DEFAULT_PRICING,
            REFERENCE_INPUT_TOKENS,
            REFERENCE_OUTPUT_TOKENS,
        )),
    }
}

fn price_call(pricing: (f64, f64), input_tokens: u32, output_tokens: u32) -> f64 {
    let (input_price, output_price) = pricing;
    (input_tokens as f64 / 1_000_000.0) * input_price
        + (output_tokens as f64 / 1_000_000.0) * output_price
}

/// Rough token count for text: one token per four chars, rounded up.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count() as u32;
    chars.div_ceil(4)
}

/// What a call costs and what to charge for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub provider: String,
    pub model: String,
    pub tier: CostTier,
    #[serde(rename = "estimatedCostUSD")]
    pub estimated_cost_usd: f64,
    pub minimum_credits_to_charge: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct CostPolicy {
    pub credit_value_usd: f64,
}

impl Default for CostPolicy {
    fn default() -> Self {
        Self {
            credit_value_usd: 0.01,
        }
    }
}

impl CostPolicy {
    pub fn new(credit_value_usd: f64) -> Self {
        Self { credit_value_usd }
    }

    pub fn calculate_cost(
        &self,
        model_key: &str,
        est_input_tokens: u32,
        est_output_tokens: u32,
    ) -> RoutingDecision {
        let cost = price_call(model_pricing(model_key), est_input_tokens, est_output_tokens);
        let tier = tier_of(model_key);
        let (provider, model) = match ModelRef::parse(model_key) {
            Some(r) => (r.provider, r.model),
            None => (String::new(), model_key.to_string()),
        };
        RoutingDecision {
            provider,
            model,
            tier,
            estimated_cost_usd: cost,
            minimum_credits_to_charge: self.credits_for(cost, tier),
        }
    }

    /// Priced from actual usage rather than an estimate.
    pub fn charge_for(&self, model_key: &str, usage: &TokenUsage) -> RoutingDecision {
        self.calculate_cost(model_key, usage.input_tokens, usage.output_tokens)
    }

    /// `ceil(cost * multiplier / credit_value)`, at least 1.
    pub fn credits_for(&self, cost_usd: f64, tier: CostTier) -> u64 {
        let revenue = cost_usd * tier.multiplier();
        let credits = (revenue / self.credit_value_usd).ceil();
        if credits.is_finite() && credits >= 1.0 {
            credits as u64
        } else {
            1
        }
    }

    /// Advisory margin check. Logs, never blocks.
    pub fn assert_profitable(&self, cost_usd: f64, credits_charged: u64) -> bool {
        let charged = credits_charged as f64 * self.credit_value_usd;
        let ok = charged >= cost_usd;
        if !ok {
            tracing::warn!(
                cost_usd,
                credits_charged,
                charged_usd = charged,
                "Charge does not cover provider cost"
            );
        }
        ok
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderTotals {
    pub cost_usd: f64,
    pub credits: u64,
    pub calls: u64,
}

/// Per-goal charge ledger. One charge per (task, attempt).
#[derive(Debug, Default)]
pub struct CostLedger {
    charged: HashSet<(String, u32)>,
    by_provider: BTreeMap<String, ProviderTotals>,
    by_task: BTreeMap<String, f64>,
    total_cost_usd: f64,
    total_credits: u64,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a charge. Returns false when this (task, attempt) was already charged.
    pub fn charge(&mut self, task_id: &str, attempt: u32, decision: &RoutingDecision) -> bool {
        if !self.charged.insert((task_id.to_string(), attempt)) {
            tracing::debug!(task_id, attempt, "Duplicate charge ignored");
            return false;
        }
        let totals = self.by_provider.entry(decision.provider.clone()).or_default();
        totals.cost_usd += decision.estimated_cost_usd;
        totals.credits += decision.minimum_credits_to_charge;
        totals.calls += 1;
        *self.by_task.entry(task_id.to_string()).or_default() += decision.estimated_cost_usd;
        self.total_cost_usd += decision.estimated_cost_usd;
        self.total_credits += decision.minimum_credits_to_charge;
        true
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.total_cost_usd
    }

    pub fn total_credits(&self) -> u64 {
        self.total_credits
    }

    pub fn task_cost(&self, task_id: &str) -> f64 {
        self.by_task.get(task_id).copied().unwrap_or(0.0)
    }

    pub fn by_provider(&self) -> &BTreeMap<String, ProviderTotals> {
        &self.by_provider
    }

    /// Sorted provider ids that were charged at least once.
    pub fn providers_used(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self.by_provider.keys().collect();
        set.into_iter().cloned().collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "${:.4} total, {} credits ({} providers)",
            self.total_cost_usd,
            self.total_credits,
            self.by_provider.len()
        )
    }
}
