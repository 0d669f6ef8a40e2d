//! Check command - Verify the object store connection
//!
//! Builds a store client from the configured credentials exactly as a sync
//! session would and reports `Connected` or `Connection failed`.

use std::path::Path;

use anyhow::{bail, Result};
use clap::Args;
use s3mirror_core::config::Config;
use s3mirror_core::ports::IStoreConnector;
use s3mirror_store::{S3Connector, StoreSettings};
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct CheckCommand {}

impl CheckCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let config = Config::load(config_path)?;
        let connector = S3Connector::new(StoreSettings::from(&config.store));
        check(&connector, &config, format).await
    }
}

async fn check(connector: &dyn IStoreConnector, config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let credentials = config.credentials();
    let bucket = config.target.bucket.as_str();

    info!(
        bucket = %bucket,
        explicit_credentials = credentials.is_explicit(),
        "Checking store connection"
    );

    if let Err(e) = connector.connect(&credentials, bucket).await {
        bail!("Connection failed: {e}");
    }

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "status": "Connected",
            "bucket": bucket,
            "credentials": if credentials.is_explicit() { "explicit" } else { "ambient" },
            "endpoint_url": config.store.endpoint_url,
        }));
    } else {
        formatter.success("Connected");
        formatter.info(&format!("Bucket: {bucket}"));
        formatter.info(&format!(
            "Credentials: {}",
            if credentials.is_explicit() {
                "from configuration"
            } else {
                "from environment"
            }
        ));
    }
    Ok(())
}
