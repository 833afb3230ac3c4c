mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sc_core::config::Config;
use sc_telemetry::logging::{self, LogFormat};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// stagecraft -- explain, plan and review code changes with a language model.
#[derive(Parser)]
#[command(name = "sc", version, about)]
struct Cli {
    /// Config file (default: ~/.stagecraft/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the explanation pipeline for a change to FILE and print the plan.
    Plan {
        /// File the change applies to.
        file: PathBuf,
        /// What should change.
        #[arg(short, long)]
        instruction: String,
        /// Generate the implementation and overwrite FILE with it.
        #[arg(long)]
        apply: bool,
        /// Print the final response as JSON instead of streaming text.
        #[arg(long)]
        json: bool,
    },

    /// Review FILE for bugs, performance, security and clarity.
    Review {
        /// File to review.
        file: PathBuf,
        /// Print results as JSON.
        #[arg(long)]
        json: bool,
        /// Generate fixed code for one aspect (bug, performance, security, clarity).
        #[arg(long, value_name = "ASPECT")]
        fix: Option<String>,
    },

    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    logging::init(
        &config.general.project_name,
        &config.general.log_level,
        LogFormat::from_setting(&config.general.log_format),
    );

    match cli.command {
        Commands::Plan {
            file,
            instruction,
            apply,
            json,
        } => commands::plan::run(&config, &file, &instruction, apply, json).await?,
        Commands::Review { file, json, fix } => {
            commands::review::run(&config, &file, json, fix.as_deref()).await?
        }
        Commands::Config => commands::config::run(&config)?,
    }

    Ok(())
}
