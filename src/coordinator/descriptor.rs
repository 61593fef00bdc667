//! Per-datanode state kept by the coordinator
//!
//! A [`DatanodeDescriptor`] is shared by the heartbeat path, the
//! replication/recovery/invalidation policies, the cache manager and
//! monitoring readers. Locking is per field group:
//!
//! - storage registry, each work queue, the invalidation set and the
//!   heartbeat stats each have their own mutex;
//! - block membership (`add_block`, `remove_block`, `replace_block`, the
//!   block iterator) and the cache-pipeline lists need the caller to hold
//!   the namespace lock, proven by a [`NamespaceGuard`] argument. A record
//!   is bound to one [`NamespaceLock`] (at registration, or by the first
//!   guard it sees) and debug builds reject guards of any other lock.

use crate::common::utils::{
    format_bytes, format_timestamp_millis, lock, read, timestamp_now_millis, write,
};
use crate::coordinator::block::{Block, BlockInfo, BlockInfoUnderConstruction};
use crate::coordinator::cached::{CachedBlocksLists, CachedListType};
use crate::coordinator::decommission::{AdminState, AdminStateCell, DecommissioningStatus};
use crate::coordinator::namespace::{NamespaceGuard, NamespaceLock};
use crate::coordinator::storage::{
    DatanodeStorage, DatanodeStorageInfo, StorageBlockCursor, StorageReport,
};
use crate::coordinator::work_queue::{BlockQueue, BlockTargetPair, InvalidateSet};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Registration identity of a datanode. The uuid is the stable key; the
/// address fields may change on re-registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatanodeId {
    pub datanode_uuid: String,
    pub ip_addr: String,
    pub host_name: String,
    pub xfer_port: u16,
    pub info_port: u16,
    pub ipc_port: u16,
}

impl DatanodeId {
    pub fn new(datanode_uuid: impl Into<String>, ip_addr: impl Into<String>, xfer_port: u16) -> Self {
        let ip_addr = ip_addr.into();
        Self {
            datanode_uuid: datanode_uuid.into(),
            host_name: ip_addr.clone(),
            ip_addr,
            xfer_port,
            info_port: 9864,
            ipc_port: 9867,
        }
    }

    pub fn generate_uuid() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn xfer_addr(&self) -> String {
        format!("{}:{}", self.ip_addr, self.xfer_port)
    }
}

impl fmt::Display for DatanodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip_addr, self.xfer_port)
    }
}

/// Aggregates refreshed by each heartbeat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DatanodeStats {
    pub capacity: u64,
    pub remaining: u64,
    pub block_pool_used: u64,
    pub dfs_used: u64,
    pub cache_capacity: u64,
    pub cache_used: u64,
    pub xceiver_count: u32,
    pub last_update: u64,
}

/// Point-in-time view for monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct DatanodeReport {
    pub datanode_uuid: String,
    pub xfer_addr: String,
    pub admin_state: AdminState,
    pub alive: bool,
    pub stats: DatanodeStats,
    pub num_storages: usize,
    pub num_blocks: usize,
    pub volume_failures: u32,
    pub blocks_to_replicate: usize,
    pub blocks_to_recover: usize,
    pub blocks_to_invalidate: usize,
}

pub struct DatanodeDescriptor {
    datanode_uuid: String,
    registration: RwLock<DatanodeId>,
    network_location: String,

    storage_map: Mutex<HashMap<String, Arc<DatanodeStorageInfo>>>,
    stats: Mutex<DatanodeStats>,

    alive: AtomicBool,
    need_key_update: AtomicBool,
    disallowed: AtomicBool,
    /// Balancer bandwidth override in bytes/sec; 0 once sent to the node.
    balancer_bandwidth: AtomicU64,
    volume_failures: AtomicU32,

    admin_state: Arc<AdminStateCell>,
    decommissioning_status: DecommissioningStatus,

    replicate_blocks: BlockQueue<BlockTargetPair>,
    recover_blocks: BlockQueue<Arc<BlockInfoUnderConstruction>>,
    invalidate_blocks: InvalidateSet,

    // namespace lock
    cached_blocks: Mutex<CachedBlocksLists>,
    /// Id of the bound namespace lock; 0 until bound.
    namespace_id: AtomicU64,
}

impl DatanodeDescriptor {
    pub fn new(id: DatanodeId) -> Self {
        Self::with_network_location(id, "/default-rack")
    }

    pub fn with_network_location(id: DatanodeId, network_location: impl Into<String>) -> Self {
        let admin_state = AdminStateCell::new(AdminState::Normal);
        Self {
            datanode_uuid: id.datanode_uuid.clone(),
            registration: RwLock::new(id),
            network_location: network_location.into(),
            storage_map: Mutex::new(HashMap::new()),
            stats: Mutex::new(DatanodeStats::default()),
            alive: AtomicBool::new(false),
            need_key_update: AtomicBool::new(false),
            disallowed: AtomicBool::new(false),
            balancer_bandwidth: AtomicU64::new(0),
            volume_failures: AtomicU32::new(0),
            decommissioning_status: DecommissioningStatus::new(admin_state.clone()),
            admin_state,
            replicate_blocks: BlockQueue::new(),
            recover_blocks: BlockQueue::new(),
            invalidate_blocks: InvalidateSet::new(),
            cached_blocks: Mutex::new(CachedBlocksLists::new()),
            namespace_id: AtomicU64::new(0),
        }
    }

    // === Identity ===

    pub fn datanode_uuid(&self) -> &str {
        &self.datanode_uuid
    }

    pub fn datanode_id(&self) -> DatanodeId {
        read(&self.registration).clone()
    }

    pub fn xfer_addr(&self) -> String {
        read(&self.registration).xfer_addr()
    }

    pub fn network_location(&self) -> &str {
        &self.network_location
    }

    /// Take new address fields from a re-registration. Every storage must
    /// then be re-reported in full, so block report counts start over.
    pub fn update_reg_info(&self, id: DatanodeId) {
        debug_assert_eq!(id.datanode_uuid, self.datanode_uuid);
        {
            let mut registration = write(&self.registration);
            *registration = DatanodeId {
                datanode_uuid: self.datanode_uuid.clone(),
                ..id
            };
        }
        for storage in self.storage_infos() {
            storage.set_block_report_count(0);
        }
    }

    // === Storage registry ===

    /// Insert a storage record for a newly reported volume, or refresh the
    /// state of a known one.
    pub fn update_storage(&self, storage: &DatanodeStorage) -> Arc<DatanodeStorageInfo> {
        let mut map = lock(&self.storage_map);
        match map.get(&storage.storage_id) {
            Some(existing) => {
                existing.set_state(storage.state);
                Arc::clone(existing)
            }
            None => {
                tracing::debug!(
                    "Adding storage {} to datanode {}",
                    storage.storage_id,
                    self.datanode_uuid
                );
                let info = DatanodeStorageInfo::new(self.datanode_uuid.clone(), storage);
                map.insert(storage.storage_id.clone(), Arc::clone(&info));
                info
            }
        }
    }

    pub fn storage_info(&self, storage_id: &str) -> Option<Arc<DatanodeStorageInfo>> {
        lock(&self.storage_map).get(storage_id).cloned()
    }

    /// Snapshot of the registry; safe to walk while it changes.
    pub fn storage_infos(&self) -> Vec<Arc<DatanodeStorageInfo>> {
        lock(&self.storage_map).values().cloned().collect()
    }

    pub fn num_storages(&self) -> usize {
        lock(&self.storage_map).len()
    }

    // === Block membership (namespace lock) ===

    /// Tie this record to `namespace`. Guards of any other lock are then
    /// refused by the membership and cache-list operations.
    ///
    /// # Panics
    ///
    /// If the record is already bound to a different lock.
    pub fn bind_namespace(&self, namespace: &NamespaceLock) {
        if let Err(bound) = self.namespace_id.compare_exchange(
            0,
            namespace.id(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            assert_eq!(
                bound,
                namespace.id(),
                "datanode {} is already bound to another namespace lock",
                self.datanode_uuid
            );
        }
    }

    fn check_namespace(&self, guard: &NamespaceGuard<'_>) {
        let held = guard.lock_id();
        let bound = match self
            .namespace_id
            .compare_exchange(0, held, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => held,
            Err(bound) => bound,
        };
        debug_assert_eq!(
            bound, held,
            "datanode {} accessed under a foreign namespace lock",
            self.datanode_uuid
        );
    }

    /// Add `block` to the head of storage `storage_id`'s list. False when
    /// the storage is unknown or the block is already there.
    ///
    /// A block lives on at most one storage per node: if another storage of
    /// this node holds it, it is moved.
    pub fn add_block(
        &self,
        guard: &NamespaceGuard<'_>,
        storage_id: &str,
        block: &Arc<BlockInfo>,
    ) -> bool {
        self.check_namespace(guard);
        let Some(storage) = self.storage_info(storage_id) else {
            return false;
        };
        if let Some(other) = block.find_storage_info(&self.datanode_uuid) {
            if Arc::ptr_eq(&other, &storage) {
                return false;
            }
            tracing::debug!(
                "Moving {} from storage {} to {}",
                block,
                other.storage_id(),
                storage_id
            );
            other.remove_block(block);
        }
        storage.add_block(block)
    }

    /// Remove `block` from whichever of this node's storages holds it.
    pub fn remove_block(&self, guard: &NamespaceGuard<'_>, block: &Arc<BlockInfo>) -> bool {
        self.check_namespace(guard);
        match block.find_storage_info(&self.datanode_uuid) {
            Some(storage) => storage.remove_block(block),
            None => false,
        }
    }

    /// Remove `block` from storage `storage_id`.
    pub fn remove_block_from(
        &self,
        guard: &NamespaceGuard<'_>,
        storage_id: &str,
        block: &Arc<BlockInfo>,
    ) -> bool {
        self.check_namespace(guard);
        match self.storage_info(storage_id) {
            Some(storage) => storage.remove_block(block),
            None => false,
        }
    }

    /// Swap `old` for `new` in the storage that holds `old`.
    ///
    /// # Panics
    ///
    /// If `old` is not on this node, or `new` is already in that storage.
    /// Callers check membership first; continuing would corrupt the block
    /// index.
    pub fn replace_block(
        &self,
        guard: &NamespaceGuard<'_>,
        old: &Arc<BlockInfo>,
        new: Arc<BlockInfo>,
    ) -> Arc<BlockInfo> {
        self.check_namespace(guard);
        let storage = old.find_storage_info(&self.datanode_uuid).unwrap_or_else(|| {
            panic!(
                "Old block {} should belong to datanode {} when replacing",
                old, self.datanode_uuid
            )
        });

        let done = storage.remove_block(old);
        assert!(
            done,
            "Old block {} should belong to storage {} when replacing",
            old,
            storage.storage_id()
        );

        let done = storage.add_block(&new);
        assert!(
            done,
            "New block {} should not belong to storage {} when replacing",
            new,
            storage.storage_id()
        );
        new
    }

    /// Blocks across all storages, recounted on each call.
    pub fn num_blocks(&self) -> usize {
        self.storage_infos().iter().map(|s| s.num_blocks()).sum()
    }

    /// Every block on this node, storage by storage.
    ///
    /// Single pass and lazy. The iterator borrows `guard`, so it cannot
    /// outlive the namespace lock. Mutating the block lists while it is
    /// live is unspecified: blocks may be skipped or repeated, but no
    /// foreign block is ever returned.
    pub fn block_iterator<'g>(&self, guard: &'g NamespaceGuard<'_>) -> BlockIterator<'g> {
        self.check_namespace(guard);
        BlockIterator::new(self.storage_infos())
    }

    /// Blocks of a single storage; empty for an unknown id.
    pub fn storage_block_iterator<'g>(
        &self,
        guard: &'g NamespaceGuard<'_>,
        storage_id: &str,
    ) -> BlockIterator<'g> {
        self.check_namespace(guard);
        BlockIterator::new(self.storage_info(storage_id).into_iter().collect())
    }

    /// Drop every block membership of this node; used when the node leaves
    /// the cluster. Returns how many memberships were removed.
    pub fn remove_all_blocks(&self, guard: &NamespaceGuard<'_>) -> usize {
        let blocks: Vec<Arc<BlockInfo>> = self.block_iterator(guard).collect();
        blocks
            .iter()
            .filter(|block| self.remove_block(guard, block))
            .count()
    }

    // === Heartbeat ===

    /// Fold a heartbeat into the node's aggregates.
    ///
    /// Aggregates are replaced by the sums over recognised reports, never
    /// adjusted incrementally. Reports for volumes this node has not
    /// announced yet (normal before its first block report) are skipped;
    /// their count is returned.
    pub fn update_heartbeat(
        &self,
        reports: &[StorageReport],
        cache_capacity: u64,
        cache_used: u64,
        xceiver_count: u32,
        volume_failures: u32,
    ) -> usize {
        let now = timestamp_now_millis();
        let mut total_capacity = 0u64;
        let mut total_remaining = 0u64;
        let mut total_block_pool_used = 0u64;
        let mut total_dfs_used = 0u64;
        let mut unrecognised = 0;

        self.volume_failures.store(volume_failures, Ordering::Relaxed);
        for report in reports {
            match self.storage_info(report.storage_id()) {
                Some(storage) => {
                    storage.received_heartbeat(report, now);
                    total_capacity = total_capacity.saturating_add(report.capacity);
                    total_remaining = total_remaining.saturating_add(report.remaining);
                    total_block_pool_used =
                        total_block_pool_used.saturating_add(report.block_pool_used);
                    total_dfs_used = total_dfs_used.saturating_add(report.dfs_used);
                }
                None => {
                    tracing::warn!(
                        "Unrecognized storage ID {} from datanode {}",
                        report.storage_id(),
                        self.datanode_uuid
                    );
                    unrecognised += 1;
                }
            }
        }

        let mut stats = lock(&self.stats);
        *stats = DatanodeStats {
            capacity: total_capacity,
            remaining: total_remaining,
            block_pool_used: total_block_pool_used,
            dfs_used: total_dfs_used,
            cache_capacity,
            cache_used,
            xceiver_count,
            last_update: now,
        };
        unrecognised
    }

    pub fn stats(&self) -> DatanodeStats {
        *lock(&self.stats)
    }

    pub fn capacity(&self) -> u64 {
        self.stats().capacity
    }

    pub fn remaining(&self) -> u64 {
        self.stats().remaining
    }

    pub fn dfs_used(&self) -> u64 {
        self.stats().dfs_used
    }

    pub fn block_pool_used(&self) -> u64 {
        self.stats().block_pool_used
    }

    pub fn last_update(&self) -> u64 {
        self.stats().last_update
    }

    /// Overrides the last-update timestamp; used by liveness checks in tests
    /// and when restoring a node from a peer coordinator's view.
    pub fn set_last_update(&self, millis: u64) {
        lock(&self.stats).last_update = millis;
    }

    /// No heartbeat for longer than `stale_interval_ms`.
    pub fn is_stale(&self, now_millis: u64, stale_interval_ms: u64) -> bool {
        now_millis.saturating_sub(self.last_update()) > stale_interval_ms
    }

    /// Scheduled-but-unreported writes summed over storages.
    pub fn blocks_scheduled(&self) -> u32 {
        self.storage_infos()
            .iter()
            .map(|s| s.blocks_scheduled())
            .sum()
    }

    // === Pending work ===

    /// Queue `block` for copying to `targets`, in order.
    pub fn add_block_to_be_replicated(
        &self,
        block: Block,
        targets: Vec<Arc<DatanodeStorageInfo>>,
    ) -> Result<()> {
        let pair = BlockTargetPair::new(block, targets)?;
        self.replicate_blocks.offer(pair);
        Ok(())
    }

    /// Queue a lease recovery. A block already waiting is not queued twice;
    /// returns whether it was added.
    pub fn add_block_to_be_recovered(&self, block: Arc<BlockInfoUnderConstruction>) -> bool {
        let queued = block.block();
        if self.recover_blocks.offer_if_absent(block) {
            true
        } else {
            tracing::info!("{} is already in the recovery queue", queued);
            false
        }
    }

    /// Queue blocks for deletion on this node. Returns how many were new.
    pub fn add_blocks_to_be_invalidated(&self, blocks: &[Block]) -> Result<usize> {
        if blocks.is_empty() {
            return Err(Error::EmptyInvalidation(self.datanode_uuid.clone()));
        }
        Ok(self.invalidate_blocks.add_all(blocks.iter().copied()))
    }

    pub fn number_of_blocks_to_be_replicated(&self) -> usize {
        self.replicate_blocks.size()
    }

    pub fn number_of_blocks_to_be_recovered(&self) -> usize {
        self.recover_blocks.size()
    }

    pub fn number_of_blocks_to_be_invalidated(&self) -> usize {
        self.invalidate_blocks.size()
    }

    /// Up to `max_transfers` replication pairs, oldest first.
    pub fn replication_command(&self, max_transfers: usize) -> Option<Vec<BlockTargetPair>> {
        self.replicate_blocks.poll(max_transfers)
    }

    /// Up to `max_transfers` blocks to recover, oldest first.
    pub fn lease_recovery_command(
        &self,
        max_transfers: usize,
    ) -> Option<Vec<Arc<BlockInfoUnderConstruction>>> {
        self.recover_blocks.poll(max_transfers)
    }

    /// Up to `max_blocks` blocks to delete; `None` when nothing is pending.
    pub fn invalidate_blocks(&self, max_blocks: usize) -> Option<Vec<Block>> {
        self.invalidate_blocks.drain(max_blocks)
    }

    // === Cache pipeline (namespace lock) ===

    pub fn cached_blocks<'a>(
        &'a self,
        guard: &'a NamespaceGuard<'_>,
    ) -> MutexGuard<'a, CachedBlocksLists> {
        self.check_namespace(guard);
        lock(&self.cached_blocks)
    }

    pub fn num_cached(&self, guard: &NamespaceGuard<'_>, list: CachedListType) -> usize {
        self.cached_blocks(guard).len(list)
    }

    // === Reset ===

    /// Forget everything learned from the node's reports: aggregates,
    /// pending deletions, volume failures and cache state. Replication and
    /// recovery queues survive.
    pub fn reset_blocks(&self, guard: &NamespaceGuard<'_>) {
        {
            let mut stats = lock(&self.stats);
            let last_update = stats.last_update;
            *stats = DatanodeStats {
                last_update,
                ..DatanodeStats::default()
            };
        }
        self.invalidate_blocks.clear();
        self.volume_failures.store(0, Ordering::Relaxed);
        self.cached_blocks(guard).clear_all();
    }

    /// Drop all pending work and cache state. Aggregates are untouched.
    pub fn clear_block_queues(&self, guard: &NamespaceGuard<'_>) {
        self.invalidate_blocks.clear();
        self.recover_blocks.clear();
        self.replicate_blocks.clear();
        self.cached_blocks(guard).clear_all();
    }

    // === Flags & admin ===

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    pub fn need_key_update(&self) -> bool {
        self.need_key_update.load(Ordering::Acquire)
    }

    pub fn set_need_key_update(&self, need: bool) {
        self.need_key_update.store(need, Ordering::Release);
    }

    /// Clears the flag and returns its previous value.
    pub fn take_need_key_update(&self) -> bool {
        self.need_key_update.swap(false, Ordering::AcqRel)
    }

    /// Not in the include list; must not talk to the coordinator.
    pub fn is_disallowed(&self) -> bool {
        self.disallowed.load(Ordering::Acquire)
    }

    pub fn set_disallowed(&self, flag: bool) {
        self.disallowed.store(flag, Ordering::Release);
    }

    pub fn balancer_bandwidth(&self) -> u64 {
        self.balancer_bandwidth.load(Ordering::Acquire)
    }

    pub fn set_balancer_bandwidth(&self, bytes_per_sec: u64) {
        self.balancer_bandwidth.store(bytes_per_sec, Ordering::Release);
    }

    /// Returns the pending override (if any) and resets it to 0.
    pub fn take_balancer_bandwidth(&self) -> Option<u64> {
        match self.balancer_bandwidth.swap(0, Ordering::AcqRel) {
            0 => None,
            bandwidth => Some(bandwidth),
        }
    }

    pub fn volume_failures(&self) -> u32 {
        self.volume_failures.load(Ordering::Relaxed)
    }

    pub fn admin_state(&self) -> AdminState {
        self.admin_state.get()
    }

    pub fn is_decommission_in_progress(&self) -> bool {
        self.admin_state.is_decommission_in_progress()
    }

    pub fn is_decommissioned(&self) -> bool {
        self.admin_state.is_decommissioned()
    }

    pub fn start_decommission(&self) {
        self.admin_state.set(AdminState::DecommissionInProgress);
        self.decommissioning_status
            .set_start_time(timestamp_now_millis());
    }

    pub fn stop_decommission(&self) {
        self.admin_state.set(AdminState::Normal);
    }

    pub fn set_decommissioned(&self) {
        self.admin_state.set(AdminState::Decommissioned);
    }

    pub fn decommissioning_status(&self) -> &DecommissioningStatus {
        &self.decommissioning_status
    }

    // === Reporting ===

    pub fn report(&self) -> DatanodeReport {
        DatanodeReport {
            datanode_uuid: self.datanode_uuid.clone(),
            xfer_addr: self.xfer_addr(),
            admin_state: self.admin_state(),
            alive: self.is_alive(),
            stats: self.stats(),
            num_storages: self.num_storages(),
            num_blocks: self.num_blocks(),
            volume_failures: self.volume_failures(),
            blocks_to_replicate: self.number_of_blocks_to_be_replicated(),
            blocks_to_recover: self.number_of_blocks_to_be_recovered(),
            blocks_to_invalidate: self.number_of_blocks_to_be_invalidated(),
        }
    }

    /// One-line summary for logs and admin tools.
    pub fn dump_datanode(&self) -> String {
        let stats = self.stats();
        let mut out = format!(
            "{} ({}) {} {}: capacity {}, dfs used {}, remaining {}, last contact {}",
            self.xfer_addr(),
            self.datanode_uuid,
            self.network_location,
            self.admin_state(),
            format_bytes(stats.capacity),
            format_bytes(stats.dfs_used),
            format_bytes(stats.remaining),
            format_timestamp_millis(stats.last_update),
        );
        let repl = self.number_of_blocks_to_be_replicated();
        if repl > 0 {
            out += &format!(" {} blocks to be replicated;", repl);
        }
        let inval = self.number_of_blocks_to_be_invalidated();
        if inval > 0 {
            out += &format!(" {} blocks to be invalidated;", inval);
        }
        let recover = self.number_of_blocks_to_be_recovered();
        if recover > 0 {
            out += &format!(" {} blocks to be recovered;", recover);
        }
        out
    }
}

impl PartialEq for DatanodeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.datanode_uuid == other.datanode_uuid
    }
}

impl Eq for DatanodeDescriptor {}

impl Hash for DatanodeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.datanode_uuid.hash(state);
    }
}

impl fmt::Display for DatanodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.xfer_addr())
    }
}

impl fmt::Debug for DatanodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatanodeDescriptor")
            .field("datanode_uuid", &self.datanode_uuid)
            .field("xfer_addr", &self.xfer_addr())
            .field("admin_state", &self.admin_state())
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

/// Lazy walk over a node's blocks, one storage after another in registry
/// order. See [`DatanodeDescriptor::block_iterator`].
#[derive(Debug)]
pub struct BlockIterator<'g> {
    cursors: Vec<StorageBlockCursor>,
    index: usize,
    _guard: PhantomData<&'g ()>,
}

impl BlockIterator<'_> {
    fn new(storages: Vec<Arc<DatanodeStorageInfo>>) -> Self {
        Self {
            cursors: storages.iter().map(|s| s.block_cursor()).collect(),
            index: 0,
            _guard: PhantomData,
        }
    }
}

impl Iterator for BlockIterator<'_> {
    type Item = Arc<BlockInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(cursor) = self.cursors.get_mut(self.index) {
            if let Some(block) = cursor.next() {
                return Some(block);
            }
            self.index += 1;
        }
        None
    }
}
