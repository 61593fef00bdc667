//! Block identities and the coordinator's per-block records
//!
//! A [`BlockInfo`] is shared between the global block index and every
//! storage list that holds it. It keeps weak back-references to those
//! storages so a datanode can find which of its volumes holds the block
//! without scanning.

use crate::common::utils::lock;
use crate::coordinator::storage::DatanodeStorageInfo;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Block identity. Equality and hashing use `block_id` only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Block {
    pub block_id: u64,
    pub num_bytes: u64,
    pub generation_stamp: u64,
}

impl Block {
    pub fn new(block_id: u64, num_bytes: u64, generation_stamp: u64) -> Self {
        Self {
            block_id,
            num_bytes,
            generation_stamp,
        }
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.block_id == other.block_id
    }
}

impl Eq for Block {}

impl Hash for Block {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.block_id.hash(state);
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blk_{}_{}", self.block_id, self.generation_stamp)
    }
}

/// Coordinator record for a block: its identity, expected replication and
/// the storages currently holding a replica.
#[derive(Debug)]
pub struct BlockInfo {
    block: Block,
    replication: u16,
    storages: Mutex<Vec<Weak<DatanodeStorageInfo>>>,
}

impl BlockInfo {
    pub fn new(block: Block, replication: u16) -> Arc<Self> {
        Arc::new(Self {
            block,
            replication,
            storages: Mutex::new(Vec::new()),
        })
    }

    pub fn block(&self) -> Block {
        self.block
    }

    pub fn block_id(&self) -> u64 {
        self.block.block_id
    }

    pub fn replication(&self) -> u16 {
        self.replication
    }

    /// Number of live storages holding this block.
    pub fn num_storages(&self) -> usize {
        lock(&self.storages)
            .iter()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    pub fn storages(&self) -> Vec<Arc<DatanodeStorageInfo>> {
        lock(&self.storages)
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// The storage of datanode `datanode_uuid` holding this block, if any.
    pub fn find_storage_info(&self, datanode_uuid: &str) -> Option<Arc<DatanodeStorageInfo>> {
        lock(&self.storages)
            .iter()
            .filter_map(Weak::upgrade)
            .find(|s| s.datanode_uuid() == datanode_uuid)
    }

    pub fn is_on_storage(&self, storage: &DatanodeStorageInfo) -> bool {
        lock(&self.storages)
            .iter()
            .any(|s| std::ptr::eq(s.as_ptr(), storage))
    }

    /// Back-reference half of a storage insertion. Only called by the
    /// storage while it holds its own block-list lock.
    pub(crate) fn add_storage(&self, storage: Weak<DatanodeStorageInfo>) -> bool {
        let mut storages = lock(&self.storages);
        if storages.iter().any(|s| s.ptr_eq(&storage)) {
            return false;
        }
        storages.retain(|s| s.strong_count() > 0);
        storages.push(storage);
        true
    }

    /// Back-reference half of a storage removal.
    pub(crate) fn remove_storage(&self, storage: &DatanodeStorageInfo) -> bool {
        let mut storages = lock(&self.storages);
        match storages
            .iter()
            .position(|s| std::ptr::eq(s.as_ptr(), storage))
        {
            Some(idx) => {
                storages.swap_remove(idx);
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.block.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockUcState {
    UnderConstruction,
    UnderRecovery,
    Committed,
}

/// A block still being written; the lease-recovery work item.
///
/// Equality follows the block identity, so two records for the same block
/// count as the same recovery item.
#[derive(Debug)]
pub struct BlockInfoUnderConstruction {
    block: Block,
    state: Mutex<BlockUcState>,
    recovery_id: AtomicU64,
    expected_locations: Vec<String>,
}

impl BlockInfoUnderConstruction {
    /// `expected_locations` are the uuids of the datanodes in the write pipeline.
    pub fn new(block: Block, expected_locations: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            block,
            state: Mutex::new(BlockUcState::UnderConstruction),
            recovery_id: AtomicU64::new(0),
            expected_locations,
        })
    }

    pub fn block(&self) -> Block {
        self.block
    }

    pub fn state(&self) -> BlockUcState {
        *lock(&self.state)
    }

    pub fn recovery_id(&self) -> u64 {
        self.recovery_id.load(Ordering::Acquire)
    }

    pub fn expected_locations(&self) -> &[String] {
        &self.expected_locations
    }

    /// Move the block into recovery under a fresh recovery id.
    pub fn initialize_block_recovery(&self, recovery_id: u64) {
        let mut state = lock(&self.state);
        *state = BlockUcState::UnderRecovery;
        self.recovery_id.store(recovery_id, Ordering::Release);
    }

    pub fn commit(&self) {
        *lock(&self.state) = BlockUcState::Committed;
    }
}

impl PartialEq for BlockInfoUnderConstruction {
    fn eq(&self, other: &Self) -> bool {
        self.block == other.block
    }
}

impl Eq for BlockInfoUnderConstruction {}

impl fmt::Display for BlockInfoUnderConstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{{state={:?}, recovery_id={}}}",
            self.block,
            self.state(),
            self.recovery_id()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_block_identity_ignores_length_and_stamp() {
        let a = Block::new(42, 1024, 1);
        let b = Block::new(42, 2048, 7);
        assert_eq!(a, b);

        let set: HashSet<Block> = [a, b, Block::new(43, 0, 1)].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(a.to_string(), "blk_42_1");
    }

    #[test]
    fn test_under_construction_equality() {
        let first = BlockInfoUnderConstruction::new(Block::new(5, 0, 1), vec![]);
        let second = BlockInfoUnderConstruction::new(Block::new(5, 10, 2), vec!["dn-1".into()]);
        assert_eq!(first, second);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_block_recovery_state() {
        let uc = BlockInfoUnderConstruction::new(Block::new(9, 0, 3), vec!["dn-1".into()]);
        assert_eq!(uc.state(), BlockUcState::UnderConstruction);

        uc.initialize_block_recovery(1001);
        assert_eq!(uc.state(), BlockUcState::UnderRecovery);
        assert_eq!(uc.recovery_id(), 1001);

        uc.commit();
        assert_eq!(uc.state(), BlockUcState::Committed);
    }

    #[test]
    fn test_new_block_has_no_storages() {
        let info = BlockInfo::new(Block::new(1, 0, 1), 3);
        assert_eq!(info.num_storages(), 0);
        assert!(info.find_storage_info("dn-1").is_none());
        assert_eq!(info.replication(), 3);
    }
}
