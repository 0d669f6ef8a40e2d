//! S3RemoteStore - IRemoteStore implementation for Amazon S3
//!
//! Wraps an `aws_sdk_s3::Client` bound to one bucket and fulfils the
//! [`IRemoteStore`] port. [`S3Connector`] builds the client from
//! [`StoreSettings`] and the session's [`Credentials`].
//!
//! ## Design Notes
//!
//! - Credentials are bound once in `connect`; explicit keys become a static
//!   provider, otherwise the SDK's default chain (environment, profile, instance
//!   role) is used. Rejected credentials surface through the bucket probe.
//! - When no region can be resolved the client falls back to `us-east-1`.
//! - `verify_bucket` issues a `HeadBucket` so rejected credentials and unknown
//!   buckets fail the session start instead of every later upload.
//! - Uploads read the whole file into memory and send a single `PutObject`.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use s3mirror_core::config::StoreConfig;
use s3mirror_core::domain::{Credentials, RemoteKey};
use s3mirror_core::ports::{IRemoteStore, IStoreConnector, StoreError};

/// Region used when neither the settings nor the environment provide one
const FALLBACK_REGION: &str = "us-east-1";

/// Provider name attached to static credentials from the config file
const STATIC_PROVIDER_NAME: &str = "s3mirror-config";

// ============================================================================
// StoreSettings
// ============================================================================

/// Client settings for [`S3Connector`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Region override
    pub region: Option<String>,
    /// Custom endpoint URL (MinIO, LocalStack)
    pub endpoint_url: Option<String>,
    /// Use path-style bucket addressing
    pub force_path_style: bool,
    /// Probe the bucket with `HeadBucket` while connecting
    pub verify_bucket: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for StoreSettings {
    fn from(config: &StoreConfig) -> Self {
        Self {
            region: config.region.clone(),
            endpoint_url: config.endpoint_url.clone(),
            force_path_style: config.force_path_style,
            verify_bucket: config.verify_bucket,
        }
    }
}

// ============================================================================
// S3Connector
// ============================================================================

/// Builds [`S3RemoteStore`] handles
#[derive(Debug, Clone, Default)]
pub struct S3Connector {
    settings: StoreSettings,
}

impl S3Connector {
    pub fn new(settings: StoreSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    async fn build_client(&self, credentials: &Credentials) -> Result<Client, StoreError> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &self.settings.region {
            loader = loader.region(Region::new(region.clone()));
        }

        if let Credentials::Explicit {
            access_key,
            secret_key,
        } = credentials
        {
            loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                STATIC_PROVIDER_NAME,
            ));
        }

        let sdk_config = loader.load().await;

        if sdk_config.credentials_provider().is_none() {
            return Err(StoreError::Auth(
                "no credentials provider available".to_string(),
            ));
        }

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if sdk_config.region().is_none() {
            debug!(region = FALLBACK_REGION, "No region configured, using fallback");
            builder = builder.region(Region::new(FALLBACK_REGION));
        }
        if let Some(endpoint_url) = &self.settings.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }
        builder = builder.force_path_style(self.settings.force_path_style);

        Ok(Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl IStoreConnector for S3Connector {
    async fn connect(
        &self,
        credentials: &Credentials,
        bucket: &str,
    ) -> Result<Box<dyn IRemoteStore>, StoreError> {
        let bucket = bucket.trim();
        if bucket.is_empty() {
            return Err(StoreError::Config("bucket name is empty".to_string()));
        }

        let client = self.build_client(credentials).await?;
        let store = S3RemoteStore::new(client, bucket);

        if self.settings.verify_bucket {
            store.verify_bucket().await?;
        }

        info!(
            bucket = %bucket,
            explicit_credentials = credentials.is_explicit(),
            "Connected to object store"
        );
        Ok(Box::new(store))
    }
}

// ============================================================================
// S3RemoteStore
// ============================================================================

/// [`IRemoteStore`] backed by one S3 bucket
#[derive(Debug, Clone)]
pub struct S3RemoteStore {
    client: Client,
    bucket: String,
}

impl S3RemoteStore {
    /// Wraps an existing client; no network traffic happens here.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Checks that the bucket exists and the credentials may access it
    pub async fn verify_bucket(&self) -> Result<(), StoreError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let detail = DisplayErrorContext(&err).to_string();
                Err(probe_error(&self.bucket, service_status(&err), detail))
            }
        }
    }
}

#[async_trait]
impl IRemoteStore for S3RemoteStore {
    async fn put(&self, key: &RemoteKey, local_path: &Path) -> Result<(), StoreError> {
        let data = tokio::fs::read(local_path)
            .await
            .map_err(|e| StoreError::local_read(local_path, e))?;
        let size = data.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| StoreError::transfer(key, DisplayErrorContext(&err).to_string()))?;

        debug!(bucket = %self.bucket, key = %key, size, "PutObject complete");
        Ok(())
    }

    async fn delete(&self, key: &RemoteKey) -> Result<(), StoreError> {
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
        {
            Ok(_) => {
                debug!(bucket = %self.bucket, key = %key, "DeleteObject complete");
                Ok(())
            }
            Err(err) if service_status(&err) == Some(404) => {
                debug!(bucket = %self.bucket, key = %key, "Object already absent");
                Ok(())
            }
            Err(err) => Err(StoreError::transfer(
                key,
                DisplayErrorContext(&err).to_string(),
            )),
        }
    }
}

// ============================================================================
// Error classification
// ============================================================================

/// HTTP status of a service error, if the request reached the service
fn service_status<E>(err: &SdkError<E>) -> Option<u16> {
    match err {
        SdkError::ServiceError(e) => Some(e.raw().status().as_u16()),
        _ => None,
    }
}

/// Maps a failed bucket probe to a start-time error
///
/// A missing bucket is a configuration problem. Everything else, including
/// requests that never reached the service, is reported as an authentication
/// failure since the store cannot be used with these credentials.
fn probe_error(bucket: &str, status: Option<u16>, detail: String) -> StoreError {
    match status {
        Some(404) => StoreError::Config(format!("bucket '{bucket}' does not exist")),
        Some(401) | Some(403) => {
            StoreError::Auth(format!("access to bucket '{bucket}' denied: {detail}"))
        }
        _ => StoreError::Auth(format!("cannot reach bucket '{bucket}': {detail}")),
    }
}
