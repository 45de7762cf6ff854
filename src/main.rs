// src/main.rs — goalforge entry point

use clap::Parser;

use goalforge::cli::{Cli, Commands};
use goalforge::infra::config::Config;
use goalforge::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init_logging(&cli.log_level);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(Commands::History { limit, json }) = &cli.command {
        return goalforge::cli::history::show_history(*limit, *json).await;
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(std::path::Path::new(path))?,
        None => Config::load()?,
    };

    goalforge::cli::run::run_goal(&cli, config).await
}
