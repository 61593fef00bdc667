//! Cache-pipeline membership of a datanode
//!
//! A cached block sits in at most one of three lists per datanode:
//! pending-cached, cached, pending-uncached. The lists share one arena so
//! moving a block between stages is an O(1) unlink plus insert. Which
//! transitions are legal is decided by the cache manager, not here.

use crate::coordinator::linked_slab::LinkedSlab;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachedListType {
    PendingCached,
    Cached,
    PendingUncached,
}

impl CachedListType {
    pub const ALL: [CachedListType; 3] = [
        CachedListType::PendingCached,
        CachedListType::Cached,
        CachedListType::PendingUncached,
    ];

    fn index(self) -> usize {
        match self {
            CachedListType::PendingCached => 0,
            CachedListType::Cached => 1,
            CachedListType::PendingUncached => 2,
        }
    }

    fn from_index(index: usize) -> Self {
        Self::ALL[index]
    }
}

impl fmt::Display for CachedListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachedListType::PendingCached => write!(f, "pending_cached"),
            CachedListType::Cached => write!(f, "cached"),
            CachedListType::PendingUncached => write!(f, "pending_uncached"),
        }
    }
}

/// A block the cache manager wants cached somewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedBlock {
    pub block_id: u64,
    pub generation_stamp: u64,
    pub replication: u16,
}

impl CachedBlock {
    pub fn new(block_id: u64, generation_stamp: u64, replication: u16) -> Self {
        Self {
            block_id,
            generation_stamp,
            replication,
        }
    }
}

#[derive(Debug)]
pub struct CachedBlocksLists {
    slab: LinkedSlab<u64, CachedBlock>,
}

impl CachedBlocksLists {
    pub fn new() -> Self {
        Self {
            slab: LinkedSlab::with_lists(CachedListType::ALL.len()),
        }
    }

    /// Append to `list`. False if the block already sits in any list.
    pub fn add(&mut self, list: CachedListType, block: CachedBlock) -> bool {
        self.slab.push_back(list.index(), block.block_id, block)
    }

    /// Remove from `list`; `None` if the block is not in that list.
    pub fn remove(&mut self, list: CachedListType, block_id: u64) -> Option<CachedBlock> {
        self.slab.remove_from(list.index(), &block_id)
    }

    /// Unlink the block from its current list (if any) and append it to
    /// `list`. Returns the list it came from.
    pub fn move_to(&mut self, list: CachedListType, block: CachedBlock) -> Option<CachedListType> {
        let previous = self
            .slab
            .remove(&block.block_id)
            .map(|(index, _)| CachedListType::from_index(index));
        self.slab.push_back(list.index(), block.block_id, block);
        previous
    }

    /// Which list holds the block.
    pub fn list_of(&self, block_id: u64) -> Option<CachedListType> {
        self.slab.list_of(&block_id).map(CachedListType::from_index)
    }

    pub fn contains(&self, list: CachedListType, block_id: u64) -> bool {
        self.list_of(block_id) == Some(list)
    }

    pub fn len(&self, list: CachedListType) -> usize {
        self.slab.len(list.index())
    }

    pub fn is_empty(&self) -> bool {
        self.slab.is_empty()
    }

    pub fn iter(&self, list: CachedListType) -> impl Iterator<Item = &CachedBlock> + '_ {
        self.slab.iter(list.index()).map(|(_, block)| block)
    }

    pub fn clear(&mut self, list: CachedListType) -> usize {
        self.slab.clear_list(list.index())
    }

    pub fn clear_all(&mut self) {
        self.slab.clear();
    }
}

impl Default for CachedBlocksLists {
    fn default() -> Self {
        Self::new()
    }
}
