//! Dealdesk CLI - merchant dashboard API client

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use dealdesk_core::{ClientConfig, FileCredentialStore};
use dealdesk_http::client::error::SignOutReason;
use dealdesk_http::{ApiClientBuilder, ClientError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug, error};

#[derive(Parser)]
#[command(name = "dealdesk")]
#[command(about = "Manage a marketplace store from the command line")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Configuration file (JSON, TOML or YAML)
    #[arg(short = 'c', long, global = true, env = "DEALDESK_CONFIG")]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Timeout for the whole command in seconds (0 = no timeout)
    #[arg(short = 't', long, global = true, default_value = "60")]
    timeout: u64,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Exit status used when the session is gone and a new login is needed
const EXIT_SESSION_EXPIRED: u8 = 2;

/// Forced sign-out for a terminal session: tell the user to log in again
struct PromptLogin;

impl dealdesk_http::client::SessionReload for PromptLogin {
    fn reload(&self, reason: &SignOutReason) {
        eprintln!("Session expired ({reason}). Run `dealdesk login <username>` to sign in again.");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.log_level.clone().into(), cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if matches!(e.downcast_ref::<ClientError>(), Some(err) if err.is_session_expired()) {
                return ExitCode::from(EXIT_SESSION_EXPIRED);
            }
            error!("Command failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
        config.validate()?;
    }
    debug!(base_url = %config.base_url, "Loaded configuration");

    let store = FileCredentialStore::open(&config.credentials_file)?;
    let client = ApiClientBuilder::from_config(&config)
        .credentials(Arc::new(store))
        .on_sign_out(PromptLogin)
        .build()?;

    let command = cli.command.execute(&client, &config);
    if cli.timeout == 0 {
        command.await
    } else {
        tokio::time::timeout(Duration::from_secs(cli.timeout), command)
            .await
            .map_err(|_| anyhow::anyhow!("Command timed out after {} seconds", cli.timeout))?
    }
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}
