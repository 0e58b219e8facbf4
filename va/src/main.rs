//! Vision-Agent - interactive vision code synthesis
//!
//! CLI entry point for the interactive session.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use vision_agent::agent::{Agent, LlmAgent};
use vision_agent::cli::{Cli, generate_after_help};
use vision_agent::config::Config;
use vision_agent::llm::create_client;
use vision_agent::prompts::PromptLoader;
use vision_agent::session::{ReadlinePrompter, Session};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vision-agent")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("vision-agent.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(max_attempts) = cli.max_attempts {
        debug!(max_attempts, "main: overriding max attempts from CLI");
        config.runner.max_attempts = max_attempts;
    }
    if cli.confirm {
        config.runner.confirm_execution = true;
    }
    info!(
        provider = %config.agent.provider,
        model = %config.agent.model,
        interpreter = %config.runner.interpreter,
        "vision-agent loaded config"
    );

    // A missing key is reported and the program ends without entering the loop
    if let Err(e) = config.validate() {
        warn!(error = %e, "main: configuration invalid");
        println!("{}", e.to_string().red());
        return Ok(());
    }

    run_session(&config).await
}

async fn run_session(config: &Config) -> Result<()> {
    debug!("run_session: called");
    let resolved = config.resolve_agent()?;
    let llm = create_client(&resolved).context("Failed to create LLM client")?;

    let root = std::env::current_dir().context("Failed to read current directory")?;
    let agent_prompts = PromptLoader::new(&root);
    let agent: Arc<dyn Agent> =
        Arc::new(LlmAgent::from_config(llm, config, &agent_prompts).context("Failed to create agent")?);

    let mut session = Session::from_config(agent, config, PromptLoader::new(&root));
    let mut prompter = ReadlinePrompter::new()?;
    session.run(&mut prompter).await
}
