//! Storage volumes reported by datanodes
//!
//! [`DatanodeStorageInfo`] is the coordinator's record for one volume:
//! the last reported capacity figures and the list of blocks the volume
//! holds. Block-list mutations go through the owning datanode, which
//! requires the namespace lock.

use crate::common::utils::lock;
use crate::coordinator::block::BlockInfo;
use crate::coordinator::linked_slab::LinkedSlab;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// The block list of a storage is the only list in its arena.
const BLOCK_LIST: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageState {
    Normal,
    ReadOnly,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    #[default]
    Disk,
    Ssd,
    Archive,
    RamDisk,
}

/// Volume identity as announced by the datanode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatanodeStorage {
    pub storage_id: String,
    pub state: StorageState,
    #[serde(default)]
    pub storage_type: StorageType,
}

impl DatanodeStorage {
    pub fn new(storage_id: impl Into<String>) -> Self {
        Self {
            storage_id: storage_id.into(),
            state: StorageState::Normal,
            storage_type: StorageType::Disk,
        }
    }

    /// Fresh volume id in the `DS-<uuid>` form.
    pub fn generate_storage_id() -> String {
        format!("DS-{}", uuid::Uuid::new_v4())
    }
}

/// Per-volume figures carried by a heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageReport {
    pub storage: DatanodeStorage,
    #[serde(default)]
    pub failed: bool,
    pub capacity: u64,
    pub dfs_used: u64,
    pub remaining: u64,
    pub block_pool_used: u64,
}

impl StorageReport {
    pub fn storage_id(&self) -> &str {
        &self.storage.storage_id
    }
}

/// Last-heartbeat view of a storage.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StorageUsage {
    pub capacity: u64,
    pub dfs_used: u64,
    pub remaining: u64,
    pub block_pool_used: u64,
    pub last_update: u64,
}

#[derive(Debug)]
struct StorageStatus {
    state: StorageState,
    usage: StorageUsage,
    block_report_count: u32,
}

pub struct DatanodeStorageInfo {
    datanode_uuid: String,
    storage_id: String,
    storage_type: StorageType,
    status: Mutex<StorageStatus>,
    blocks_scheduled: AtomicU32,
    blocks: Mutex<LinkedSlab<u64, Arc<BlockInfo>>>,
}

impl DatanodeStorageInfo {
    pub fn new(datanode_uuid: impl Into<String>, storage: &DatanodeStorage) -> Arc<Self> {
        Arc::new(Self {
            datanode_uuid: datanode_uuid.into(),
            storage_id: storage.storage_id.clone(),
            storage_type: storage.storage_type,
            status: Mutex::new(StorageStatus {
                state: storage.state,
                usage: StorageUsage::default(),
                block_report_count: 0,
            }),
            blocks_scheduled: AtomicU32::new(0),
            blocks: Mutex::new(LinkedSlab::with_lists(1)),
        })
    }

    pub fn datanode_uuid(&self) -> &str {
        &self.datanode_uuid
    }

    pub fn storage_id(&self) -> &str {
        &self.storage_id
    }

    pub fn storage_type(&self) -> StorageType {
        self.storage_type
    }

    pub fn state(&self) -> StorageState {
        lock(&self.status).state
    }

    pub fn set_state(&self, state: StorageState) {
        lock(&self.status).state = state;
    }

    pub fn usage(&self) -> StorageUsage {
        lock(&self.status).usage
    }

    pub fn capacity(&self) -> u64 {
        self.usage().capacity
    }

    pub fn remaining(&self) -> u64 {
        self.usage().remaining
    }

    pub fn dfs_used(&self) -> u64 {
        self.usage().dfs_used
    }

    pub fn block_pool_used(&self) -> u64 {
        self.usage().block_pool_used
    }

    pub fn last_update(&self) -> u64 {
        self.usage().last_update
    }

    /// Refresh state and usage from a heartbeat report.
    pub fn received_heartbeat(&self, report: &StorageReport, last_update: u64) {
        let mut status = lock(&self.status);
        status.state = if report.failed {
            StorageState::Failed
        } else {
            report.storage.state
        };
        status.usage = StorageUsage {
            capacity: report.capacity,
            dfs_used: report.dfs_used,
            remaining: report.remaining,
            block_pool_used: report.block_pool_used,
            last_update,
        };
    }

    pub fn block_report_count(&self) -> u32 {
        lock(&self.status).block_report_count
    }

    pub fn set_block_report_count(&self, count: u32) {
        lock(&self.status).block_report_count = count;
    }

    pub fn received_block_report(&self) {
        lock(&self.status).block_report_count += 1;
    }

    /// Writes the placement path has directed at this storage but that
    /// have not been reported back yet.
    pub fn blocks_scheduled(&self) -> u32 {
        self.blocks_scheduled.load(Ordering::Relaxed)
    }

    pub fn increment_blocks_scheduled(&self) {
        self.blocks_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero.
    pub fn decrement_blocks_scheduled(&self) {
        let _ = self
            .blocks_scheduled
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Insert `block` at the head of this storage's list and record the
    /// back-reference. False if the block (or another record with the
    /// same id) is already here.
    pub(crate) fn add_block(self: &Arc<Self>, block: &Arc<BlockInfo>) -> bool {
        let mut blocks = lock(&self.blocks);
        if blocks.contains_key(&block.block_id()) || block.is_on_storage(self) {
            return false;
        }
        blocks.push_front(BLOCK_LIST, block.block_id(), Arc::clone(block));
        block.add_storage(Arc::downgrade(self));
        true
    }

    /// Unlink `block` and drop its back-reference. False unless this exact
    /// record is on the list.
    pub(crate) fn remove_block(&self, block: &Arc<BlockInfo>) -> bool {
        let mut blocks = lock(&self.blocks);
        match blocks.get(&block.block_id()) {
            Some(held) if Arc::ptr_eq(held, block) => {}
            _ => return false,
        }
        blocks.remove(&block.block_id());
        block.remove_storage(self);
        true
    }

    /// Whether this exact record is on the list.
    pub fn contains_block(&self, block: &Arc<BlockInfo>) -> bool {
        lock(&self.blocks)
            .get(&block.block_id())
            .is_some_and(|held| Arc::ptr_eq(held, block))
    }

    pub fn num_blocks(&self) -> usize {
        lock(&self.blocks).len(BLOCK_LIST)
    }

    /// Lazy head-to-tail cursor over this storage's blocks.
    pub fn block_cursor(self: &Arc<Self>) -> StorageBlockCursor {
        StorageBlockCursor {
            storage: Arc::clone(self),
            position: CursorPosition::Start,
        }
    }
}

impl fmt::Debug for DatanodeStorageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatanodeStorageInfo")
            .field("datanode_uuid", &self.datanode_uuid)
            .field("storage_id", &self.storage_id)
            .field("storage_type", &self.storage_type)
            .field("state", &self.state())
            .field("num_blocks", &self.num_blocks())
            .finish()
    }
}

impl fmt::Display for DatanodeStorageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}]{}:{:?}", self.storage_type, self.storage_id, self.state())
    }
}

#[derive(Debug, Clone, Copy)]
enum CursorPosition {
    Start,
    At(usize),
    Done,
}

/// Forward-only walk over one storage's block list.
///
/// The list lock is taken per step, not for the cursor's lifetime. If the
/// list changes mid-walk the cursor may skip blocks, repeat blocks or stop
/// early. It never yields a block from another storage.
#[derive(Debug)]
pub struct StorageBlockCursor {
    storage: Arc<DatanodeStorageInfo>,
    position: CursorPosition,
}

impl Iterator for StorageBlockCursor {
    type Item = Arc<BlockInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        let blocks = lock(&self.storage.blocks);
        let slot = match self.position {
            CursorPosition::Start => blocks.head(BLOCK_LIST),
            CursorPosition::At(slot) => Some(slot),
            CursorPosition::Done => None,
        };
        let Some((block, next)) = slot.and_then(|s| blocks.step(BLOCK_LIST, s)) else {
            self.position = CursorPosition::Done;
            return None;
        };
        self.position = next.map_or(CursorPosition::Done, CursorPosition::At);
        Some(Arc::clone(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::block::Block;

    fn storage(id: &str) -> Arc<DatanodeStorageInfo> {
        DatanodeStorageInfo::new("dn-1", &DatanodeStorage::new(id))
    }

    fn block(id: u64) -> Arc<BlockInfo> {
        BlockInfo::new(Block::new(id, 128, 1), 3)
    }

    #[test]
    fn test_add_block_sets_back_reference() {
        let s = storage("DS-1");
        let b = block(1);

        assert!(s.add_block(&b));
        assert!(!s.add_block(&b));
        assert_eq!(s.num_blocks(), 1);
        assert!(b.is_on_storage(&s));
        assert_eq!(
            b.find_storage_info("dn-1").map(|x| x.storage_id().to_string()),
            Some("DS-1".to_string())
        );
    }

    #[test]
    fn test_same_id_different_record_rejected() {
        let s = storage("DS-1");
        let first = block(1);
        let twin = block(1);

        assert!(s.add_block(&first));
        assert!(!s.add_block(&twin));
        assert!(!s.remove_block(&twin));
        assert!(s.contains_block(&first));
        assert_eq!(twin.num_storages(), 0);
    }

    #[test]
    fn test_remove_block_clears_both_sides() {
        let s = storage("DS-1");
        let b = block(1);
        s.add_block(&b);

        assert!(s.remove_block(&b));
        assert!(!s.remove_block(&b));
        assert_eq!(s.num_blocks(), 0);
        assert_eq!(b.num_storages(), 0);
    }

    #[test]
    fn test_cursor_yields_newest_first() {
        let s = storage("DS-1");
        for id in 1..=3 {
            s.add_block(&block(id));
        }

        let ids: Vec<u64> = s.block_cursor().map(|b| b.block_id()).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_cursor_repeats_after_slot_reuse() {
        let s = storage("DS-1");
        let blocks: Vec<_> = (1..=3).map(block).collect();
        for b in &blocks {
            assert!(s.add_block(b));
        }

        let mut cursor = s.block_cursor();
        assert_eq!(cursor.next().map(|b| b.block_id()), Some(3));

        // the freed slot is reused for a new head that links back to 3
        assert!(s.remove_block(&blocks[1]));
        assert!(s.add_block(&block(4)));

        let rest: Vec<u64> = cursor.map(|b| b.block_id()).collect();
        assert_eq!(rest, vec![4, 3, 1]);
    }

    #[test]
    fn test_received_heartbeat() {
        let s = storage("DS-1");
        let report = StorageReport {
            storage: DatanodeStorage::new("DS-1"),
            failed: false,
            capacity: 1000,
            dfs_used: 100,
            remaining: 900,
            block_pool_used: 50,
        };
        s.received_heartbeat(&report, 42);

        let usage = s.usage();
        assert_eq!(usage.capacity, 1000);
        assert_eq!(usage.remaining, 900);
        assert_eq!(usage.last_update, 42);

        let failed = StorageReport {
            failed: true,
            ..report
        };
        s.received_heartbeat(&failed, 43);
        assert_eq!(s.state(), StorageState::Failed);
    }

    #[test]
    fn test_blocks_scheduled_saturates() {
        let s = storage("DS-1");
        s.decrement_blocks_scheduled();
        assert_eq!(s.blocks_scheduled(), 0);
        s.increment_blocks_scheduled();
        s.increment_blocks_scheduled();
        s.decrement_blocks_scheduled();
        assert_eq!(s.blocks_scheduled(), 1);
    }
}
