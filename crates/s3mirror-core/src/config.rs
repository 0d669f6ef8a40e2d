//! Configuration module for s3mirror.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, saving, validation, defaults, and a builder pattern for
//! programmatic use. The `target` and `credentials` sections form the durable
//! record that is rewritten whenever a session starts and when the daemon
//! shuts down.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::credentials::Credentials;
use crate::domain::target::SyncTarget;
use crate::ports::checkpoint::ICheckpointStore;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for s3mirror.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub credentials: CredentialsConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// What is mirrored where.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Local directory to mirror.
    pub local_folder: PathBuf,
    /// Destination bucket.
    pub bucket: String,
    /// Key prefix inside the bucket (may be empty).
    pub s3_path: String,
}

/// Static credentials. Leave both empty to use the ambient credential chain.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &mask(&self.secret_key))
            .finish()
    }
}

/// Object store client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Region override; `None` uses the ambient region.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    pub endpoint_url: Option<String>,
    /// Use path-style addressing (`endpoint/bucket/key`).
    pub force_path_style: bool,
    /// Probe the bucket when a session starts so bad credentials fail early.
    pub verify_bucket: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Loading and saving
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create configuration directory")?;
            }
        }

        let yaml = serde_yaml::to_string(self).context("Failed to serialize configuration")?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/s3mirror/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("s3mirror")
            .join("config.yaml")
    }

    // -----------------------------------------------------------------------
    // Session inputs
    // -----------------------------------------------------------------------

    /// The sync target described by the `target` section.
    pub fn sync_target(&self) -> SyncTarget {
        SyncTarget::new(
            self.target.local_folder.clone(),
            self.target.bucket.clone(),
            &self.target.s3_path,
        )
    }

    /// The credentials described by the `credentials` section.
    pub fn credentials(&self) -> Credentials {
        Credentials::from_optional(
            Some(self.credentials.access_key.as_str()),
            Some(self.credentials.secret_key.as_str()),
        )
    }

    /// Record the target and credentials of a started session.
    pub fn record_session(&mut self, target: &SyncTarget, credentials: &Credentials) {
        self.target.local_folder = target.root().to_path_buf();
        self.target.bucket = target.bucket().to_string();
        self.target.s3_path = target.prefix().to_string();

        match credentials {
            Credentials::Explicit {
                access_key,
                secret_key,
            } => {
                self.credentials.access_key = access_key.clone();
                self.credentials.secret_key = secret_key.clone();
            }
            Credentials::Ambient => {
                self.credentials = CredentialsConfig::default();
            }
        }
    }

    /// Copy of this configuration with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.credentials.access_key = mask(&self.credentials.access_key);
        copy.credentials.secret_key = mask(&self.credentials.secret_key);
        copy
    }
}

fn mask(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        "*".repeat(8)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            force_path_style: false,
            verify_bucket: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"target.bucket"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- target ---
        if self.target.local_folder.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "target.local_folder".into(),
                message: "must be set".into(),
            });
        } else if !self.target.local_folder.is_dir() {
            errors.push(ValidationError {
                field: "target.local_folder".into(),
                message: format!(
                    "directory does not exist: {}",
                    self.target.local_folder.display()
                ),
            });
        }

        let bucket = self.target.bucket.trim();
        if bucket.is_empty() {
            errors.push(ValidationError {
                field: "target.bucket".into(),
                message: "must be set".into(),
            });
        } else if !is_plausible_bucket_name(bucket) {
            errors.push(ValidationError {
                field: "target.bucket".into(),
                message: format!(
                    "invalid bucket name '{bucket}'; expected 3-63 characters of a-z, 0-9, '.' or '-'"
                ),
            });
        }

        // --- credentials ---
        let has_access = !self.credentials.access_key.trim().is_empty();
        let has_secret = !self.credentials.secret_key.trim().is_empty();
        if has_access != has_secret {
            let (field, missing) = if has_access {
                ("credentials.secret_key", "secret_key")
            } else {
                ("credentials.access_key", "access_key")
            };
            errors.push(ValidationError {
                field: field.into(),
                message: format!(
                    "{missing} must be set together with the other key, or leave both empty to use ambient credentials"
                ),
            });
        }

        // --- store ---
        if let Some(endpoint) = &self.store.endpoint_url {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                errors.push(ValidationError {
                    field: "store.endpoint_url".into(),
                    message: format!("must start with http:// or https://, got '{endpoint}'"),
                });
            }
        }
        if matches!(&self.store.region, Some(region) if region.trim().is_empty()) {
            errors.push(ValidationError {
                field: "store.region".into(),
                message: "must not be blank; remove it to use the ambient region".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

fn is_plausible_bucket_name(name: &str) -> bool {
    (3..=63).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
        && !name.starts_with(['.', '-'])
        && !name.ends_with(['.', '-'])
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`].
///
/// Starts from [`Config::default`] and lets callers override individual
/// fields before producing the final value.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder pre-filled with default values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- target ---

    pub fn local_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.config.target.local_folder = folder.into();
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.target.bucket = bucket.into();
        self
    }

    pub fn s3_path(mut self, s3_path: impl Into<String>) -> Self {
        self.config.target.s3_path = s3_path.into();
        self
    }

    // --- credentials ---

    pub fn access_key(mut self, key: impl Into<String>) -> Self {
        self.config.credentials.access_key = key.into();
        self
    }

    pub fn secret_key(mut self, key: impl Into<String>) -> Self {
        self.config.credentials.secret_key = key.into();
        self
    }

    // --- store ---

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.store.region = Some(region.into());
        self
    }

    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.store.endpoint_url = Some(url.into());
        self
    }

    pub fn force_path_style(mut self, enabled: bool) -> Self {
        self.config.store.force_path_style = enabled;
        self
    }

    pub fn verify_bucket(mut self, enabled: bool) -> Self {
        self.config.store.verify_bucket = enabled;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// FileCheckpoint
// ---------------------------------------------------------------------------

/// [`ICheckpointStore`] backed by the YAML configuration file.
///
/// Saving loads the current file (or defaults), replaces the `target` and
/// `credentials` sections and writes it back, leaving other sections as
/// the user set them.
#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ICheckpointStore for FileCheckpoint {
    fn save(&self, target: &SyncTarget, credentials: &Credentials) -> anyhow::Result<()> {
        let mut config = Config::load_or_default(&self.path);
        config.record_session(target, credentials);
        config.save(&self.path)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
