// src/core/types.rs — Core domain types

use serde::{Deserialize, Serialize};

use crate::provider::{ModelRef, TokenUsage};

/// Natural-language objective submitted for autonomous execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub text: String,
    pub context: Option<String>,
    pub mode: GoalMode,
}

impl Goal {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
            mode: GoalMode::Auto,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.context = if context.trim().is_empty() {
            None
        } else {
            Some(context)
        };
        self
    }

    pub fn with_mode(mut self, mode: GoalMode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum GoalMode {
    /// Plan a task graph and execute it.
    #[default]
    Auto,
    /// Fixed architect → builder → validator → summarizer pipeline.
    Council,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Research,
    Analysis,
    CodeGen,
    FileWrite,
    Deploy,
    Validate,
    Summarize,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Research => "research",
            TaskType::Analysis => "analysis",
            TaskType::CodeGen => "code_gen",
            TaskType::FileWrite => "file_write",
            TaskType::Deploy => "deploy",
            TaskType::Validate => "validate",
            TaskType::Summarize => "summarize",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let t = match label.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "research" => TaskType::Research,
            "analysis" | "analyze" => TaskType::Analysis,
            "code_gen" | "codegen" | "code" => TaskType::CodeGen,
            "file_write" | "write_file" => TaskType::FileWrite,
            "deploy" => TaskType::Deploy,
            "validate" | "validation" | "test" => TaskType::Validate,
            "summarize" | "summary" => TaskType::Summarize,
            _ => return None,
        };
        Some(t)
    }

    /// Producing tasks whose output later validate/deploy steps consume.
    pub fn is_build(&self) -> bool {
        matches!(self, TaskType::CodeGen | TaskType::FileWrite)
    }

    pub fn is_discovery(&self) -> bool {
        matches!(self, TaskType::Research | TaskType::Analysis)
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Trivial,
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "trivial" => Some(Complexity::Trivial),
            "simple" | "low" => Some(Complexity::Simple),
            "moderate" | "medium" => Some(Complexity::Moderate),
            "complex" | "high" => Some(Complexity::Complex),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostSensitivity {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Free,
    Low,
    Moderate,
    Expensive,
}

impl CostTier {
    pub const ALL: [CostTier; 4] = [
        CostTier::Free,
        CostTier::Low,
        CostTier::Moderate,
        CostTier::Expensive,
    ];

    /// Margin multiplier applied to provider cost.
    pub fn multiplier(&self) -> f64 {
        match self {
            CostTier::Free => 1.0,
            CostTier::Low => 5.0,
            CostTier::Moderate => 4.0,
            CostTier::Expensive => 3.0,
        }
    }

    /// Upper bound on a single call's cost in USD.
    pub fn max_cost_per_call(&self) -> f64 {
        match self {
            CostTier::Free => 0.0,
            CostTier::Low => 0.005,
            CostTier::Moderate => 0.05,
            CostTier::Expensive => 0.50,
        }
    }

    pub fn next(&self) -> Option<CostTier> {
        match self {
            CostTier::Free => Some(CostTier::Low),
            CostTier::Low => Some(CostTier::Moderate),
            CostTier::Moderate => Some(CostTier::Expensive),
            CostTier::Expensive => None,
        }
    }

    /// Smallest tier whose per-call ceiling covers `cost_usd`.
    pub fn for_cost(cost_usd: f64) -> CostTier {
        if cost_usd <= f64::EPSILON {
            CostTier::Free
        } else if cost_usd < CostTier::Low.max_cost_per_call() {
            CostTier::Low
        } else if cost_usd < CostTier::Moderate.max_cost_per_call() {
            CostTier::Moderate
        } else {
            CostTier::Expensive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CostTier::Free => "free",
            CostTier::Low => "low",
            CostTier::Moderate => "moderate",
            CostTier::Expensive => "expensive",
        }
    }
}

impl std::fmt::Display for CostTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-task-type routing context. Each variant carries only what that kind of
/// task needs; the flags the executor consults are derived by matching.
/// Deploy is always high risk, so it carries no flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutingContext {
    Research { cost_sensitivity: CostSensitivity, high_risk: bool },
    Analysis { cost_sensitivity: CostSensitivity, high_risk: bool },
    CodeGen { requires_validation: bool, high_risk: bool },
    FileWrite { high_risk: bool },
    Deploy,
    Validate { high_risk: bool },
    Summarize { cost_sensitivity: CostSensitivity, high_risk: bool },
}

impl RoutingContext {
    pub fn for_task(task_type: TaskType, high_risk: bool, cost_sensitivity: CostSensitivity) -> Self {
        match task_type {
            TaskType::Research => RoutingContext::Research {
                cost_sensitivity,
                high_risk,
            },
            TaskType::Analysis => RoutingContext::Analysis {
                cost_sensitivity,
                high_risk,
            },
            TaskType::CodeGen => RoutingContext::CodeGen {
                requires_validation: high_risk,
                high_risk,
            },
            TaskType::FileWrite => RoutingContext::FileWrite { high_risk },
            TaskType::Deploy => RoutingContext::Deploy,
            TaskType::Validate => RoutingContext::Validate { high_risk },
            TaskType::Summarize => RoutingContext::Summarize {
                cost_sensitivity,
                high_risk,
            },
        }
    }

    pub fn task_type(&self) -> TaskType {
        match self {
            RoutingContext::Research { .. } => TaskType::Research,
            RoutingContext::Analysis { .. } => TaskType::Analysis,
            RoutingContext::CodeGen { .. } => TaskType::CodeGen,
            RoutingContext::FileWrite { .. } => TaskType::FileWrite,
            RoutingContext::Deploy => TaskType::Deploy,
            RoutingContext::Validate { .. } => TaskType::Validate,
            RoutingContext::Summarize { .. } => TaskType::Summarize,
        }
    }

    /// High-risk tasks are always validated, whatever their type.
    pub fn requires_validation(&self) -> bool {
        match self {
            RoutingContext::Research { high_risk, .. }
            | RoutingContext::Analysis { high_risk, .. }
            | RoutingContext::Validate { high_risk }
            | RoutingContext::Summarize { high_risk, .. } => *high_risk,
            RoutingContext::CodeGen {
                requires_validation,
                high_risk,
            } => *requires_validation || *high_risk,
            RoutingContext::FileWrite { .. } | RoutingContext::Deploy => true,
        }
    }

    pub fn high_risk(&self) -> bool {
        match self {
            RoutingContext::Research { high_risk, .. }
            | RoutingContext::Analysis { high_risk, .. }
            | RoutingContext::CodeGen { high_risk, .. }
            | RoutingContext::FileWrite { high_risk }
            | RoutingContext::Validate { high_risk }
            | RoutingContext::Summarize { high_risk, .. } => *high_risk,
            RoutingContext::Deploy => true,
        }
    }

    pub fn cost_sensitivity(&self) -> CostSensitivity {
        match self {
            RoutingContext::Research { cost_sensitivity, .. }
            | RoutingContext::Analysis { cost_sensitivity, .. }
            | RoutingContext::Summarize { cost_sensitivity, .. } => *cost_sensitivity,
            RoutingContext::CodeGen { .. } | RoutingContext::FileWrite { .. } => {
                CostSensitivity::Medium
            }
            RoutingContext::Deploy => CostSensitivity::Low,
            RoutingContext::Validate { .. } => CostSensitivity::High,
        }
    }
}

/// Which backend handles a task, plus the task-type context that drove it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRouting {
    pub provider: String,
    pub model: String,
    pub tier: CostTier,
    pub context: RoutingContext,
}

impl TaskRouting {
    pub fn model_ref(&self) -> ModelRef {
        ModelRef::new(&self.provider, &self.model)
    }

    /// Catalog key, `provider/model`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }

    pub fn requires_validation(&self) -> bool {
        self.context.requires_validation()
    }

    pub fn high_risk(&self) -> bool {
        self.context.high_risk()
    }

    pub fn cost_sensitivity(&self) -> CostSensitivity {
        self.context.cost_sensitivity()
    }

    /// Same task context on a different model.
    pub fn with_model(&self, model: &ModelRef, tier: CostTier) -> Self {
        Self {
            provider: model.provider.clone(),
            model: model.model.clone(),
            tier,
            context: self.context,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
    FailedByDependency,
}

impl TaskStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::FailedByDependency)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    pub id: String,
    pub title: String,
    /// Instruction handed to the model.
    pub prompt: String,
    pub dependencies: Vec<String>,
    pub routing: TaskRouting,
    pub status: TaskStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub attempt: u32,
    /// Output was replaced by the validator's correction.
    pub corrected: bool,
    pub tokens_used: TokenUsage,
    pub cost_usd: f64,
}

impl TaskNode {
    pub fn new(id: impl Into<String>, title: impl Into<String>, routing: TaskRouting) -> Self {
        let title = title.into();
        Self {
            id: id.into(),
            prompt: title.clone(),
            title,
            dependencies: Vec::new(),
            routing,
            status: TaskStatus::Pending,
            output: None,
            error: None,
            attempt: 0,
            corrected: false,
            tokens_used: TokenUsage::default(),
            cost_usd: 0.0,
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn task_type(&self) -> TaskType {
        self.routing.context.task_type()
    }
}
