// src/cli/mod.rs — CLI definition (clap derive)

pub mod history;
pub mod progress;
pub mod run;

use clap::{Parser, Subcommand};

use crate::core::types::GoalMode;

#[derive(Parser)]
#[command(
    name = "goalforge",
    about = "Plan a goal into tasks, route each to a cost-appropriate model, validate and retry",
    version
)]
pub struct Cli {
    /// Goal to run (default command when no subcommand given)
    #[arg(trailing_var_arg = true)]
    pub goal: Vec<String>,

    /// Extra context handed to every task
    #[arg(short, long)]
    pub context: Option<String>,

    /// Execution mode
    #[arg(short, long, value_enum, default_value_t = GoalMode::Auto)]
    pub mode: GoalMode,

    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    /// Print the planned task graph as JSON without executing it
    #[arg(long)]
    pub inspect: bool,

    /// Emit lifecycle events as JSON lines on stdout
    #[arg(long)]
    pub stream: bool,

    /// Run one task at a time
    #[arg(long)]
    pub sequential: bool,

    /// Permit the expensive tier for routing and escalation
    #[arg(long)]
    pub allow_expensive: bool,

    /// Plan with an LLM instead of keyword heuristics
    #[arg(long)]
    pub llm_plan: bool,

    /// Upper bound on planned tasks
    #[arg(long)]
    pub max_tasks: Option<usize>,

    /// Route every task to this model (provider/model)
    #[arg(long)]
    pub model: Option<String>,

    /// Suppress progress output (only emit the final result)
    #[arg(short, long)]
    pub quiet: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List recently completed goals
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Print raw JSON lines
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub fn goal_text(&self) -> String {
        self.goal.join(" ")
    }
}
