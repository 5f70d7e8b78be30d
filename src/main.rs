use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use composite::config::CompositeConfig;
use composite::logging::{LogOptions, init_logging};
use composite::{DivisorTable, Round, TokenId};

mod cmd;

#[derive(Parser)]
#[command(name = "composite")]
#[command(version, about = "Fold a set of tokens into one survivor through pairwise merge rounds")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Comma-separated divisor table (e.g. "80,40,20,0"). Overrides composite.toml.
    #[arg(long, global = true)]
    pub divisors: Option<DivisorTable>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge the given tokens round by round until one survives
    Reduce {
        /// Token ids in merge order; the first one survives
        #[arg(required = true)]
        tokens: Vec<TokenId>,

        /// Divisor table index of the first round
        #[arg(short, long, default_value = "0")]
        round: Round,

        /// Record every round member and the survivor
        #[arg(long)]
        snapshot: bool,

        /// Directory for snapshot files (implies --snapshot)
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,

        /// Identity the merge batches are submitted as
        #[arg(long)]
        actor: Option<String>,
    },
    /// Show the rounds a reduction would take without merging anything
    Plan {
        #[arg(required = true)]
        tokens: Vec<TokenId>,

        #[arg(short, long, default_value = "0")]
        round: Round,
    },
    /// Show the effective divisor table
    Divisors,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default composite.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let config = CompositeConfig::with_cli_args(
        project_dir,
        cli.verbose,
        cli.divisors.clone(),
        None,
        None,
    )?;

    let log_dir = config.log_dir();
    let _log_guard = init_logging(LogOptions {
        level: &config.toml.logging.level,
        verbose: cli.verbose,
        json: config.toml.logging.json,
        dir: log_dir.as_deref(),
    })?;

    match &cli.command {
        Commands::Reduce {
            tokens,
            round,
            snapshot,
            snapshot_dir,
            actor,
        } => {
            let mut config = config.clone();
            config.cli_snapshot_dir = snapshot_dir.clone();
            config.cli_actor = actor.clone();
            let snapshot = *snapshot || snapshot_dir.is_some() || config.snapshot_enabled();
            cmd::cmd_reduce(&config, tokens, *round, snapshot, cli.json).await?;
        }
        Commands::Plan { tokens, round } => cmd::cmd_plan(&config, tokens, *round, cli.json)?,
        Commands::Divisors => cmd::cmd_divisors(&config, cli.json)?,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
