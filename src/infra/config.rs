// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub council: CouncilConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// OpenAI-compatible endpoints. Empty means "use the built-in defaults".
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// USD value of one credit.
    pub credit_value_usd: f64,
    /// Permit the expensive tier (auto-selection and escalation).
    pub allow_expensive: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            credit_value_usd: 0.01,
            allow_expensive: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub allow_parallelism: bool,
    /// 0 = bounded only by the ready set.
    pub max_concurrency: usize,
    pub same_tier_retries: u32,
    pub escalated_retries: u32,
    pub goal_timeout_secs: u64,
    pub task_max_tokens: u32,
    pub temperature: f32,
    pub dependency_output_chars: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            allow_parallelism: true,
            max_concurrency: 0,
            same_tier_retries: 1,
            escalated_retries: 1,
            goal_timeout_secs: 600,
            task_max_tokens: 2048,
            temperature: 0.4,
            dependency_output_chars: 4_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub min_chars: usize,
    pub truncation_min_chars: usize,
    pub max_content_chars: usize,
    pub timeout_secs: u64,
    pub pass_threshold: u8,
    pub pass_through_score: u8,
    pub fast_model: String,
    pub full_model: String,
    pub attempt_fix: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_chars: 15,
            truncation_min_chars: 100,
            max_content_chars: 6_000,
            timeout_secs: 12,
            pass_threshold: 70,
            pass_through_score: 70,
            fast_model: "openai/gpt-4o-mini".into(),
            full_model: "anthropic/claude-sonnet-4-20250514".into(),
            attempt_fix: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub use_llm: bool,
    pub model: String,
    pub max_tasks: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            use_llm: false,
            model: "openai/gpt-4o-mini".into(),
            max_tasks: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilConfig {
    pub architect: String,
    pub builder: String,
    pub validator: String,
    pub summarizer: String,
    pub step_timeout_secs: u64,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            architect: "anthropic/claude-sonnet-4-20250514".into(),
            builder: "openai/gpt-4.1".into(),
            validator: "openai/gpt-4o-mini".into(),
            summarizer: "openai/gpt-4o-mini".into(),
            step_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub enabled: bool,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            initial_backoff_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub base_url: String,
    /// Env var holding the API key. Providers without a key are skipped
    /// unless the var name is empty (local servers).
    #[serde(default)]
    pub api_key_env: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_provider_timeout() -> u64 {
    60
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.check()?;
        Ok(config)
    }

    /// Reject values that would make routing or validation meaningless.
    pub fn check(&self) -> anyhow::Result<()> {
        let credit = self.routing.credit_value_usd;
        if credit.is_nan() || credit <= 0.0 {
            anyhow::bail!("routing.credit_value_usd must be positive");
        }
        if self.validation.pass_threshold > 100 || self.validation.pass_through_score > 100 {
            anyhow::bail!("validation scores are on a 0-100 scale");
        }
        if self.planner.max_tasks == 0 {
            anyhow::bail!("planner.max_tasks must be at least 1");
        }
        Ok(())
    }
}
