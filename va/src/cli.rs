//! CLI definitions

use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use tracing::debug;

/// Vision-Agent - interactive vision code synthesis
#[derive(Debug, Parser)]
#[command(
    name = "va",
    about = "Describe a vision task, get a program for it and run it with self-correction",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)")]
    pub log_level: Option<String>,

    /// Override the maximum number of test executions per task
    #[arg(short = 'm', long = "max-attempts", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,

    /// Ask before executing generated code
    #[arg(long)]
    pub confirm: bool,
}

/// Location of the log file written by `va`
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vision-agent")
        .join("logs")
        .join("vision-agent.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Help footer showing where logs and config live
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let config_path = dirs::config_dir()
        .map(|d| d.join("vision-agent").join("vision-agent.yml"))
        .unwrap_or_else(|| PathBuf::from("vision-agent.yml"));

    let mut help = String::new();
    help.push_str(&format!("{}\n", "Files:".bold()));
    help.push_str(&format!("  config: .vision-agent.yml or {}\n", config_path.display()));
    help.push_str("  prompts: .vision-agent/prompts/{generate,correct}.pmt\n");
    help.push_str(&format!("  logs: {}\n", get_log_path().display()));
    help
}
