//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Object put/delete against one bucket
//! - [`IStoreConnector`] - Credential-based construction of an `IRemoteStore`
//! - [`ICheckpointStore`] - Durable record of the last started target

pub mod checkpoint;
pub mod remote_store;

pub use checkpoint::ICheckpointStore;
pub use remote_store::{IRemoteStore, IStoreConnector, StoreError};
