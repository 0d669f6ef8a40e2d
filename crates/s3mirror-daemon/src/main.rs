//! s3mirror Daemon - Background mirroring service
//!
//! This binary runs unattended (typically as a systemd user service) and:
//! - Loads the YAML configuration
//! - Starts one sync session for the configured target
//! - Waits for SIGTERM/SIGINT
//! - Stops the session, waiting for the in-flight remote call, and persists
//!   the configuration
//!
//! # Architecture
//!
//! The session's worker task does all the mirroring. The main task only
//! waits on a `CancellationToken` that the signal handler cancels.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use s3mirror_core::config::{Config, FileCheckpoint, LoggingConfig};
use s3mirror_core::ports::{ICheckpointStore, IStoreConnector};
use s3mirror_store::{S3Connector, StoreSettings};
use s3mirror_sync::SyncSession;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Command line
// ============================================================================

/// s3mirror background daemon
#[derive(Debug, Parser)]
#[command(name = "s3mirrord", version, about)]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the configuration and the single sync session of this process
struct DaemonService {
    config: Config,
    checkpoint: FileCheckpoint,
    session: SyncSession,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Creates the service with the S3 connector described by the config
    fn new(config_path: &Path, shutdown: CancellationToken) -> Result<Self> {
        let config = load_config(config_path)?;
        let connector = Arc::new(S3Connector::new(StoreSettings::from(&config.store)));
        Ok(Self::with_connector(config, config_path, connector, shutdown))
    }

    fn with_connector(
        config: Config,
        config_path: &Path,
        connector: Arc<dyn IStoreConnector>,
        shutdown: CancellationToken,
    ) -> Self {
        let checkpoint = FileCheckpoint::new(config_path);
        let session = SyncSession::new(connector).with_checkpoint(Arc::new(checkpoint.clone()));
        Self {
            config,
            checkpoint,
            session,
            shutdown,
        }
    }

    /// Runs until the shutdown token is cancelled
    ///
    /// 1. Starts the session (start errors end the process)
    /// 2. Waits for shutdown
    /// 3. Stops the session and saves the configuration
    async fn run(&mut self) -> Result<()> {
        let credentials = self.config.credentials();
        self.session
            .start(self.config.sync_target(), &credentials)
            .await
            .context("Failed to start sync session")?;

        let target = self
            .session
            .target()
            .cloned()
            .context("Session has no target after start")?;
        info!(sync_target = %target, "Mirroring; waiting for shutdown signal");

        self.shutdown.cancelled().await;
        info!("Shutdown signal received");

        self.session.stop().await;

        if let Err(e) = self.checkpoint.save(&target, &credentials) {
            warn!(error = %e, "Failed to save configuration on shutdown");
        }
        Ok(())
    }
}

/// Loads and validates the configuration
fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load(path)?;
    info!(config_path = %path.display(), "Loaded configuration");

    let errors = config.validate();
    if !errors.is_empty() {
        for err in &errors {
            error!(field = %err.field, "{}", err.message);
        }
        bail!(
            "Configuration {} has {} error(s)",
            path.display(),
            errors.len()
        );
    }
    Ok(config)
}

// ============================================================================
// Logging
// ============================================================================

/// Builds the filter: `RUST_LOG` wins, otherwise the configured level
fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
}

fn init_tracing(logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(logging))
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and cancels `token`
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(Config::default_path);

    // Logging settings are read before validation so config errors get logged
    let logging = Config::load_or_default(&config_path).logging;
    init_tracing(&logging);

    info!("s3mirror daemon starting (s3mirrord)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let result = match DaemonService::new(&config_path, shutdown_token) {
        Ok(mut service) => service.run().await,
        Err(e) => Err(e),
    };

    match &result {
        Ok(()) => info!("s3mirror daemon shut down gracefully"),
        Err(e) => error!(error = %format!("{e:#}"), "s3mirror daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
