//! Credential selection for the remote store
//!
//! Credentials are either supplied explicitly or left to the store's
//! ambient resolution chain (environment, shared profile, instance role).
//! They are resolved once when the store client is constructed.

use std::fmt;

/// How the remote store client authenticates
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credentials {
    /// Static access key / secret key pair
    Explicit {
        /// Access key identifier
        access_key: String,
        /// Secret access key
        secret_key: String,
    },
    /// Resolve credentials from the environment
    #[default]
    Ambient,
}

impl Credentials {
    /// Creates explicit credentials
    pub fn explicit(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Credentials::Explicit {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Selects explicit credentials only when both keys are non-blank
    ///
    /// A missing or blank key on either side falls back to
    /// [`Credentials::Ambient`].
    pub fn from_optional(access_key: Option<&str>, secret_key: Option<&str>) -> Self {
        let access = access_key.map(str::trim).filter(|s| !s.is_empty());
        let secret = secret_key.map(str::trim).filter(|s| !s.is_empty());

        match (access, secret) {
            (Some(access), Some(secret)) => Self::explicit(access, secret),
            _ => Credentials::Ambient,
        }
    }

    /// Returns true for explicit credentials
    pub fn is_explicit(&self) -> bool {
        matches!(self, Credentials::Explicit { .. })
    }

    /// Returns the access key for explicit credentials
    pub fn access_key(&self) -> Option<&str> {
        match self {
            Credentials::Explicit { access_key, .. } => Some(access_key),
            Credentials::Ambient => None,
        }
    }

    /// Returns the secret key for explicit credentials
    pub fn secret_key(&self) -> Option<&str> {
        match self {
            Credentials::Explicit { secret_key, .. } => Some(secret_key),
            Credentials::Ambient => None,
        }
    }
}

// Secrets never reach logs through `{:?}`.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Explicit { access_key, .. } => f
                .debug_struct("Explicit")
                .field("access_key", access_key)
                .field("secret_key", &"***")
                .finish(),
            Credentials::Ambient => write!(f, "Ambient"),
        }
    }
}
