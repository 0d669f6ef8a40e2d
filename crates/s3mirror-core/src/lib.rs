//! s3mirror Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `SyncTarget`, `Credentials`, `RemoteKey`, `SyncOutcome`
//! - **Key mapping** - [`domain::key_mapper::derive_key`], local path → remote object key
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `IStoreConnector`, `ICheckpointStore`
//! - **Configuration** - YAML-backed [`config::Config`] and the file checkpoint
//!
//! # Architecture
//!
//! The domain module contains pure logic with no I/O beyond target validation.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
