//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Remote object keys
// ============================================================================

/// Key of an object in the remote store, e.g. `"backup/photos/a.jpg"`
///
/// A RemoteKey is always `/`-separated regardless of the host path
/// convention. It must be:
/// - Non-empty
/// - Relative (no leading `/`)
/// - Free of empty segments (no `//`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteKey(String);

impl RemoteKey {
    /// Create a new RemoteKey
    ///
    /// # Errors
    /// Returns `DomainError::InvalidRemoteKey` if the key is empty, starts
    /// with `/` or contains an empty segment
    pub fn new(key: String) -> Result<Self, DomainError> {
        if key.is_empty() {
            return Err(DomainError::InvalidRemoteKey(
                "Remote key must not be empty".to_string(),
            ));
        }

        if key.starts_with('/') {
            return Err(DomainError::InvalidRemoteKey(format!(
                "Remote key must not start with '/': {key}"
            )));
        }

        if key.contains("//") {
            return Err(DomainError::InvalidRemoteKey(format!(
                "Remote key contains an empty segment: {key}"
            )));
        }

        Ok(Self(key))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemoteKey {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemoteKey> for String {
    fn from(key: RemoteKey) -> Self {
        key.0
    }
}

impl AsRef<str> for RemoteKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
