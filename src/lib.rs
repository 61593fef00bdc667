//! # minidfs
//!
//! Coordinator-side bookkeeping for a distributed block store:
//! - Per-datanode storage registry and block lists
//! - Heartbeat ingestion with per-volume and per-node aggregates
//! - Bounded replication, lease-recovery and invalidation queues
//! - Cache-pipeline membership and decommission progress
//!
//! ## Architecture

#![allow(clippy::result_large_err)]
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │            DatanodeManager               │
//! │  NamespaceLock + uuid → descriptor map   │
//! └───────────┬──────────────────────────────┘
//!             │ heartbeat → commands
//!   ┌─────────┴──────────┬───────────────┐
//!   │                    │               │
//! ┌─▼────────────┐ ┌─────▼────────┐ ┌────▼─────────┐
//! │ Descriptor 1 │ │ Descriptor 2 │ │ Descriptor 3 │
//! │  storages    │ │  storages    │ │  storages    │
//! │  + queues    │ │  + queues    │ │  + queues    │
//! └──────────────┘ └──────────────┘ └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Print the effective configuration
//! minidfs-coord show-config --config ./minidfs.toml
//!
//! # Run an in-memory cluster for a few heartbeat rounds
//! minidfs-coord simulate --nodes 5 --storages 2 --rounds 10
//! ```

pub mod common;
pub mod coordinator;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use coordinator::{DatanodeCommand, DatanodeDescriptor, DatanodeManager};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
