//! Domain entities and business logic
//!
//! This module contains the core domain types for s3mirror:
//! - Remote object keys and the key mapper
//! - Sync targets (root, bucket, prefix)
//! - Credential selection (explicit or ambient)
//! - Outcome records emitted for every synchronized file event
//! - Domain-specific error types

pub mod credentials;
pub mod errors;
pub mod key_mapper;
pub mod newtypes;
pub mod outcome;
pub mod target;

// Re-export commonly used types
pub use credentials::Credentials;
pub use errors::DomainError;
pub use key_mapper::derive_key;
pub use newtypes::RemoteKey;
pub use outcome::{FailureReason, Operation, OutcomeResult, SyncOutcome};
pub use target::SyncTarget;
