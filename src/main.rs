//! Troupe - plan-then-execute collaboration for hosted LLM agents
//!
//! Main entry point for the CLI application.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use troupe::cli::commands;
use troupe::{Config, ModelClient, ProviderKind};

/// Troupe - multi-agent task runner for OpenAI and Anthropic models
#[derive(Parser, Debug)]
#[command(name = "troupe")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Provider to use (openai or claude)
    #[arg(long, global = true)]
    provider: Option<ProviderKind>,

    /// Model identifier
    #[arg(long, short = 'm', global = true)]
    model: Option<String>,

    /// Sampling temperature (0.0 - 2.0)
    #[arg(long, short = 't', global = true)]
    temperature: Option<f32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan and execute a task with the agents in a roster file
    Run {
        /// Roster TOML file
        roster: PathBuf,
        /// Task description
        task: String,
    },
    /// Print the validated plan for a task without executing it
    Plan {
        /// Roster TOML file
        roster: PathBuf,
        /// Task description
        task: String,
    },
    /// Send one message to a single agent
    Chat {
        /// System prompt for the agent
        #[arg(long, short = 's')]
        system: Option<String>,
        /// Print the reply as it streams in (no tools)
        #[arg(long)]
        stream: bool,
        /// Message to send
        message: String,
    },
    /// Show the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        init: bool,
        /// Show the built-in defaults instead
        #[arg(long, conflicts_with = "init")]
        defaults: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(kind) = args.provider {
        if kind != config.provider.kind {
            config.set_provider(kind);
            config.resolve_api_key();
        }
    }

    if let Some(model) = args.model {
        config.model.name = model;
    }

    if let Some(temperature) = args.temperature {
        config.model.temperature = temperature;
    }

    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    troupe::telemetry::init_logging(&config.logging.level);

    if let Command::Config { init, defaults } = args.command {
        if defaults {
            print!("{}", Config::default_config_toml());
            return Ok(());
        }
        print!("{}", toml::to_string_pretty(&config)?);
        if init {
            config.save()?;
            eprintln!("Wrote {}", Config::config_file().display());
        }
        return Ok(());
    }

    let client = ModelClient::from_config(config).context("invalid configuration")?;
    tracing::debug!(provider = client.provider_name(), "Model client ready");

    match args.command {
        Command::Run { roster, task } => {
            let result = commands::run(&client, &roster, &task).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Plan { roster, task } => {
            let plan = commands::plan(&client, &roster, &task).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Chat {
            system,
            stream: true,
            message,
        } => {
            let mut stdout = std::io::stdout();
            commands::chat_stream(&client, system.as_deref(), &message, &mut stdout).await?;
        }
        Command::Chat {
            system, message, ..
        } => {
            let reply = commands::chat(&client, system.as_deref(), &message).await?;
            println!("{}", reply);
        }
        Command::Config { .. } => {}
    }

    Ok(())
}
