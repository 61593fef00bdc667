//! Pending per-datanode work
//!
//! - [`BlockQueue`]: FIFO with a bounded, non-blocking drain. Holds
//!   replication pairs and lease-recovery items.
//! - [`InvalidateSet`]: set of blocks to delete; duplicates collapse.
//!
//! Each structure carries its own lock, so draining one never contends with
//! heartbeat ingestion or with the other queues.

use crate::common::utils::lock;
use crate::coordinator::block::Block;
use crate::coordinator::storage::DatanodeStorageInfo;
use crate::{Error, Result};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// A block and the ordered storages it should be copied to.
#[derive(Debug, Clone)]
pub struct BlockTargetPair {
    pub block: Block,
    pub targets: Vec<Arc<DatanodeStorageInfo>>,
}

impl BlockTargetPair {
    /// Rejects an empty target list.
    pub fn new(block: Block, targets: Vec<Arc<DatanodeStorageInfo>>) -> Result<Self> {
        if targets.is_empty() {
            return Err(Error::NoReplicationTargets(block.block_id));
        }
        Ok(Self { block, targets })
    }

    pub fn target_storage_ids(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.storage_id()).collect()
    }
}

#[derive(Debug)]
pub struct BlockQueue<E> {
    queue: Mutex<VecDeque<E>>,
}

impl<E> BlockQueue<E> {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn size(&self) -> usize {
        lock(&self.queue).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.queue).is_empty()
    }

    /// Enqueue at the tail. The queue is unbounded, so this always accepts.
    pub fn offer(&self, item: E) -> bool {
        lock(&self.queue).push_back(item);
        true
    }

    /// Remove up to `max_items` from the head, oldest first. `None` when the
    /// queue is empty or nothing was asked for.
    pub fn poll(&self, max_items: usize) -> Option<Vec<E>> {
        let mut queue = lock(&self.queue);
        if max_items == 0 || queue.is_empty() {
            return None;
        }
        let n = max_items.min(queue.len());
        Some(queue.drain(..n).collect())
    }

    pub fn clear(&self) {
        lock(&self.queue).clear();
    }
}

impl<E: PartialEq> BlockQueue<E> {
    /// Equality-based membership test.
    pub fn contains(&self, item: &E) -> bool {
        lock(&self.queue).iter().any(|queued| queued == item)
    }

    /// Enqueue unless an equal item is already queued. The check and the
    /// insert happen under one lock acquisition.
    pub fn offer_if_absent(&self, item: E) -> bool {
        let mut queue = lock(&self.queue);
        if queue.iter().any(|queued| *queued == item) {
            return false;
        }
        queue.push_back(item);
        true
    }
}

impl<E> Default for BlockQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct InvalidateSet {
    blocks: Mutex<HashSet<Block>>,
}

impl InvalidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many blocks were not already pending.
    pub fn add_all<I: IntoIterator<Item = Block>>(&self, blocks: I) -> usize {
        let mut pending = lock(&self.blocks);
        blocks
            .into_iter()
            .filter(|block| pending.insert(*block))
            .count()
    }

    pub fn size(&self) -> usize {
        lock(&self.blocks).len()
    }

    pub fn contains(&self, block: &Block) -> bool {
        lock(&self.blocks).contains(block)
    }

    /// Remove up to `max_items` blocks in no particular order. `None` when
    /// nothing is pending or nothing was asked for.
    pub fn drain(&self, max_items: usize) -> Option<Vec<Block>> {
        let mut pending = lock(&self.blocks);
        let n = max_items.min(pending.len());
        if n == 0 {
            return None;
        }
        let picked: Vec<Block> = pending.iter().take(n).copied().collect();
        for block in &picked {
            pending.remove(block);
        }
        Some(picked)
    }

    pub fn clear(&self) {
        lock(&self.blocks).clear();
    }
}
