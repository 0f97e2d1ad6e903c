mod config;
mod plan_cmds;
#[cfg(test)]
mod test_util;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};

use stepgraph_core::source::{ModelSource, OllamaSource, SourceConfig};

use config::{CliOverrides, StepgraphConfig};

#[derive(Parser)]
#[command(
    name = "stepgraph",
    about = "Turn LLM answers into validated, ordered file-action plans"
)]
struct Cli {
    /// Model backend URL (overrides STEPGRAPH_MODEL_URL env var)
    #[arg(long, global = true)]
    model_url: Option<String>,

    /// Model name (overrides STEPGRAPH_MODEL env var)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a stepgraph config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Check that the model backend is reachable
    Health,
    /// Plan generation
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Ask the model for a plan and print it
    Generate {
        /// What you want done, in plain language
        request: String,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
        /// Also write the plan as JSON to this file
        #[arg(long)]
        output: Option<String>,
        /// Fail if the model does not explain its plan
        #[arg(long)]
        require_reasoning: bool,
    },
    /// Build a plan from a saved model response
    Parse {
        /// Response file, or `-` for stdin
        file: String,
        /// The request the response answers
        #[arg(long)]
        request: String,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
        /// Fail if the response does not explain its plan
        #[arg(long)]
        require_reasoning: bool,
    },
    /// Print the prompt that would be sent for a request
    Prompt {
        /// What you want done, in plain language
        request: String,
    },
}

/// Execute the `stepgraph init` command: write config file.
fn cmd_init(model_url: Option<&str>, model: Option<&str>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        model: config::ModelSection {
            url: model_url.unwrap_or(SourceConfig::DEFAULT_URL).to_string(),
            name: model.unwrap_or(SourceConfig::DEFAULT_MODEL).to_string(),
            timeout_secs: SourceConfig::DEFAULT_TIMEOUT_SECS,
        },
        planning: config::PlanningSection::default(),
    };

    config::save_config_to(&cfg, &path)?;

    println!("Config written to {}", path.display());
    println!("  model.url = {}", cfg.model.url);
    println!("  model.name = {}", cfg.model.name);
    println!("  model.timeout_secs = {}", cfg.model.timeout_secs);
    println!("  planning.max_steps = {}", cfg.planning.max_steps);
    println!();
    println!("Next: run `stepgraph health` to check the model backend.");

    Ok(())
}

/// Execute the `stepgraph health` command.
async fn cmd_health(config: &StepgraphConfig) -> anyhow::Result<()> {
    let source =
        OllamaSource::new(config.source.clone()).context("failed to create model client")?;

    println!("Backend:  {} ({})", config.source.base_url, source.name());
    println!("Model:    {}", config.source.model);

    if !source.is_available().await {
        bail!("model backend at {} is not reachable", config.source.base_url);
    }
    println!("Status:   reachable");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `--json` output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = CliOverrides {
        model_url: cli.model_url.as_deref(),
        model: cli.model.as_deref(),
        require_reasoning: false,
    };

    match cli.command {
        Commands::Init { force } => {
            cmd_init(overrides.model_url, overrides.model, force)?;
        }
        Commands::Health => {
            let resolved = StepgraphConfig::resolve(&overrides)?;
            cmd_health(&resolved).await?;
        }
        Commands::Plan { command } => {
            plan_cmds::run_plan_command(command, overrides).await?;
        }
    }

    Ok(())
}
