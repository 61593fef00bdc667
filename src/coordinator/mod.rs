//! Coordinator-side datanode bookkeeping
//!
//! The coordinator keeps one [`DatanodeDescriptor`] per registered datanode:
//! - Storage volumes and the blocks each one holds
//! - Heartbeat aggregates and liveness
//! - Pending replication, lease recovery and invalidation work
//! - Cache-pipeline lists and decommission progress
//!
//! [`DatanodeManager`] turns heartbeats into commands for the node.

pub mod block;
pub mod cached;
pub mod decommission;
pub mod descriptor;
pub mod linked_slab;
pub mod manager;
pub mod namespace;
pub mod storage;
pub mod work_queue;

pub use block::{Block, BlockInfo, BlockInfoUnderConstruction, BlockUcState};
pub use cached::{CachedBlock, CachedBlocksLists, CachedListType};
pub use decommission::{AdminState, DecommissioningStatus};
pub use descriptor::{BlockIterator, DatanodeDescriptor, DatanodeId, DatanodeReport, DatanodeStats};
pub use manager::{DatanodeCommand, DatanodeManager, Heartbeat};
pub use namespace::{NamespaceGuard, NamespaceLock};
pub use storage::{DatanodeStorage, DatanodeStorageInfo, StorageReport, StorageState, StorageType};
pub use work_queue::{BlockQueue, BlockTargetPair, InvalidateSet};
