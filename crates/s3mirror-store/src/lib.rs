//! s3mirror Store - Remote object store adapters
//!
//! Implements the [`IRemoteStore`] and [`IStoreConnector`] ports from
//! `s3mirror-core`:
//!
//! - [`s3`] - Amazon S3 and S3-compatible services via `aws-sdk-s3`
//! - [`memory`] - In-process store used for dry runs and tests
//!
//! [`IRemoteStore`]: s3mirror_core::ports::IRemoteStore
//! [`IStoreConnector`]: s3mirror_core::ports::IStoreConnector

pub mod memory;
pub mod s3;

pub use memory::{MemoryConnector, MemoryRemoteStore, StoreCall};
pub use s3::{S3Connector, S3RemoteStore, StoreSettings};
