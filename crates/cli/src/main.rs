//! toolloop CLI: the main entry point.
//!
//! Commands:
//! - `ask`      Ask a question (one-shot or interactive)
//! - `tools`    List the registered tools and their parameters
//! - `onboard`  Write a default config file
//! - `doctor`   Diagnose configuration and API keys

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "toolloop",
    about = "toolloop: a tool-using reasoning agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.toolloop/config.toml
    #[arg(short, long, global = true, env = "TOOLLOOP_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the agent a question
    Ask {
        /// Ask a single question instead of entering interactive mode
        message: Option<String>,

        /// Print thoughts, actions and observations as they happen
        #[arg(short, long)]
        trace: bool,

        /// Override agent.max_iterations
        #[arg(long)]
        max_iterations: Option<usize>,
    },

    /// List the available tools
    Tools,

    /// Write a default configuration file
    Onboard,

    /// Diagnose configuration and API keys
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Answers go to stdout; keep logs quiet unless asked.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Ask {
            message,
            trace,
            max_iterations,
        } => commands::ask::run(config, message, trace, max_iterations).await?,
        Commands::Tools => commands::tools::run(config).await?,
        Commands::Onboard => commands::onboard::run(config).await?,
        Commands::Doctor => commands::doctor::run(config).await?,
    }

    Ok(())
}
