//! s3mirror CLI - Command-line interface for s3mirror
//!
//! Provides commands for:
//! - Viewing and editing the configuration
//! - Showing the remote key a local path maps to
//! - Checking the connection to the object store
//! - Running a mirroring session in the foreground

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use s3mirror_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    check::CheckCommand, completions::CompletionsCommand, config::ConfigCommand, key::KeyCommand,
    run::RunCommand,
};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(
    name = "s3mirror",
    version,
    about = "Mirror a local directory into an S3 bucket"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Show the remote key for a local path
    Key(KeyCommand),
    /// Check the connection to the object store
    Check(CheckCommand),
    /// Mirror the configured folder until Ctrl+C
    Run(RunCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::from_json_flag(cli.json);
    let config_path = cli.config.unwrap_or_else(Config::default_path);

    let result = match cli.command {
        Commands::Config(cmd) => cmd.execute(format, &config_path).await,
        Commands::Key(cmd) => cmd.execute(format, &config_path).await,
        Commands::Check(cmd) => cmd.execute(format, &config_path).await,
        Commands::Run(cmd) => cmd.execute(format, &config_path).await,
        Commands::Completions(cmd) => cmd.execute(format, &config_path).await,
    };

    if let Err(e) = result {
        get_formatter(format).error(&format!("{e:#}"));
        std::process::exit(1);
    }
    Ok(())
}
