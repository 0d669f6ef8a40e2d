//! Run command - Mirror the configured folder in the foreground
//!
//! Provides the `s3mirror run` CLI command which:
//! 1. Loads and validates the configuration
//! 2. Starts a sync session (S3, or the in-memory store with `--dry-run`)
//! 3. Prints one line per synced change until Ctrl+C
//! 4. Stops the session and prints a summary

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use s3mirror_core::config::{Config, FileCheckpoint};
use s3mirror_core::domain::{Credentials, Operation, SyncTarget};
use s3mirror_core::ports::IStoreConnector;
use s3mirror_store::{MemoryConnector, S3Connector, StoreSettings};
use s3mirror_sync::SyncSession;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Record changes in memory instead of uploading them
    #[arg(long)]
    pub dry_run: bool,
}

/// Counters printed when the session ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub uploaded: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl RunCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let formatter = get_formatter(format);
        let config = Config::load(config_path)?;

        let errors = config.validate();
        if !errors.is_empty() {
            for error in &errors {
                formatter.warn(&error.to_string());
            }
            bail!("Configuration {} is invalid", config_path.display());
        }

        let session = if self.dry_run {
            formatter.info("Dry run: changes are recorded in memory, nothing is uploaded");
            SyncSession::new(Arc::new(MemoryConnector::default()))
        } else {
            let connector: Arc<dyn IStoreConnector> =
                Arc::new(S3Connector::new(StoreSettings::from(&config.store)));
            SyncSession::new(connector).with_checkpoint(Arc::new(FileCheckpoint::new(config_path)))
        };

        let shutdown = CancellationToken::new();
        let ctrl_c_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received SIGINT (Ctrl+C)");
            }
            ctrl_c_token.cancel();
        });

        let summary = run_session(
            session,
            config.sync_target(),
            config.credentials(),
            shutdown,
            formatter.as_ref(),
        )
        .await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "status": "Disconnected",
                "uploaded": summary.uploaded,
                "deleted": summary.deleted,
                "failed": summary.failed,
            }));
        } else {
            formatter.success("Disconnected");
            formatter.info(&format!(
                "{} uploaded, {} deleted, {} failed",
                summary.uploaded, summary.deleted, summary.failed
            ));
        }
        Ok(())
    }
}

/// Runs `session` until `shutdown` is cancelled, printing each outcome
async fn run_session(
    mut session: SyncSession,
    target: SyncTarget,
    credentials: Credentials,
    shutdown: CancellationToken,
    formatter: &dyn OutputFormatter,
) -> Result<RunSummary> {
    let mut outcomes = session.subscribe();
    session
        .start(target, &credentials)
        .await
        .context("Connection failed")?;

    if let Some(target) = session.target() {
        formatter.success(&format!("Connected, mirroring {target}"));
    }

    let mut summary = RunSummary::default();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = outcomes.recv() => match received {
                Ok(outcome) => {
                    formatter.outcome(&outcome);
                    match (outcome.is_success(), outcome.operation()) {
                        (true, Operation::Upload) => summary.uploaded += 1,
                        (true, Operation::Delete) => summary.deleted += 1,
                        (false, _) => summary.failed += 1,
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    formatter.warn(&format!("{skipped} outcome(s) not shown"));
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.stop().await;
    Ok(summary)
}
