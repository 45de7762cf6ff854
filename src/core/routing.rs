// src/core/routing.rs — Pick a provider/model per task and escalate on failure

use std::collections::BTreeSet;

use super::cost::{self, CostPolicy, ModelSpec, CATALOG};
use super::types::{Complexity, CostTier, RoutingContext, TaskRouting};
use crate::infra::config::RoutingConfig;
use crate::provider::ModelRef;

/// Routing policy for one process. Built once from config and shared.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    cost: CostPolicy,
    allow_expensive: bool,
    /// Provider ids with a live client. `None` means every catalog provider.
    available: Option<BTreeSet<String>>,
}

impl RoutingPolicy {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            cost: CostPolicy::new(config.credit_value_usd),
            allow_expensive: config.allow_expensive,
            available: None,
        }
    }

    pub fn with_available_providers(mut self, providers: BTreeSet<String>) -> Self {
        self.available = Some(providers);
        self
    }

    pub fn with_allow_expensive(mut self, allow: bool) -> Self {
        self.allow_expensive = allow;
        self
    }

    pub fn cost(&self) -> &CostPolicy {
        &self.cost
    }

    pub fn allow_expensive(&self) -> bool {
        self.allow_expensive
    }

    /// Tier a task of this complexity starts at.
    pub fn target_tier(complexity: Complexity) -> CostTier {
        match complexity {
            Complexity::Trivial | Complexity::Simple => CostTier::Free,
            Complexity::Moderate => CostTier::Low,
            Complexity::Complex => CostTier::Moderate,
        }
    }

    /// Cheapest model for a complexity level. Looks in the target tier first,
    /// then upward (never into expensive unless allowed), then downward.
    pub fn select_cheapest_model(&self, complexity: Complexity) -> &'static ModelSpec {
        let target = Self::target_tier(complexity);
        let order = self.search_order(target);

        // Prefer providers that are actually registered; if none of them
        // appear in the catalog, route anyway and let dispatch fail loudly.
        order
            .iter()
            .find_map(|&tier| self.cheapest_in(tier, true))
            .or_else(|| order.iter().find_map(|&tier| self.cheapest_in(tier, false)))
            .unwrap_or(&CATALOG[0])
    }

    fn search_order(&self, target: CostTier) -> Vec<CostTier> {
        let ceiling = if self.allow_expensive {
            CostTier::Expensive
        } else {
            CostTier::Moderate
        };
        let mut order: Vec<CostTier> = CostTier::ALL
            .iter()
            .copied()
            .filter(|t| *t >= target && *t <= ceiling)
            .collect();
        order.extend(CostTier::ALL.iter().rev().copied().filter(|t| *t < target));
        order
    }

    fn cheapest_in(&self, tier: CostTier, only_available: bool) -> Option<&'static ModelSpec> {
        CATALOG
            .iter()
            .filter(|s| s.tier == tier)
            .filter(|s| !only_available || self.is_available(s.provider))
            .min_by(|a, b| {
                a.blended_price()
                    .partial_cmp(&b.blended_price())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    fn is_available(&self, provider: &str) -> bool {
        match &self.available {
            Some(set) => set.contains(provider),
            None => true,
        }
    }

    /// Routing for a task. A forced model wins over complexity.
    pub fn route(
        &self,
        context: RoutingContext,
        complexity: Complexity,
        force_model: Option<&ModelRef>,
    ) -> TaskRouting {
        match force_model {
            Some(model) => TaskRouting {
                provider: model.provider.clone(),
                model: model.model.clone(),
                tier: cost::tier_of(&model.to_string()),
                context,
            },
            None => {
                let spec = self.select_cheapest_model(complexity);
                TaskRouting {
                    provider: spec.provider.to_string(),
                    model: spec.model.to_string(),
                    tier: spec.tier,
                    context,
                }
            }
        }
    }

    /// Cheapest available model in the next tier up. `None` at the top, or
    /// when the next tier is expensive and that is not allowed.
    pub fn escalate(&self, routing: &TaskRouting) -> Option<TaskRouting> {
        let mut tier = routing.tier.next()?;
        loop {
            if tier == CostTier::Expensive && !self.allow_expensive {
                return None;
            }
            if let Some(spec) = self.cheapest_in(tier, true) {
                return Some(routing.with_model(&spec.model_ref(), spec.tier));
            }
            tier = tier.next()?;
        }
    }
}
