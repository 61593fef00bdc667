//! Datanode record behavior as seen through the public API

use minidfs::coordinator::{
    AdminState, Block, BlockInfo, BlockInfoUnderConstruction, CachedBlock, CachedListType,
    DatanodeDescriptor, DatanodeId, DatanodeStorage, DatanodeStorageInfo, NamespaceLock,
    StorageReport,
};
use std::sync::Arc;

fn descriptor(storages: &[&str]) -> DatanodeDescriptor {
    let dn = DatanodeDescriptor::new(DatanodeId::new("dn-1", "192.168.1.10", 9866));
    for id in storages {
        dn.update_storage(&DatanodeStorage::new(*id));
    }
    dn
}

fn report(storage_id: &str, capacity: u64) -> StorageReport {
    StorageReport {
        storage: DatanodeStorage::new(storage_id),
        failed: false,
        capacity,
        dfs_used: capacity / 4,
        remaining: capacity / 2,
        block_pool_used: capacity / 8,
    }
}

#[test]
fn heartbeat_with_unknown_volume_is_skipped() {
    let dn = descriptor(&["A"]);

    let skipped = dn.update_heartbeat(&[report("A", 100), report("UNKNOWN", 999)], 0, 0, 0, 0);

    assert_eq!(skipped, 1);
    assert_eq!(dn.capacity(), 100);
    assert_eq!(dn.remaining(), 50);
    assert_eq!(dn.dfs_used(), 25);
    assert_eq!(dn.block_pool_used(), 12);
    assert!(dn.storage_info("UNKNOWN").is_none());
}

#[test]
fn reset_blocks_zeroes_reported_state() {
    let ns = NamespaceLock::new();
    let dn = descriptor(&["A", "B"]);
    dn.update_heartbeat(&[report("A", 100), report("B", 300)], 64, 32, 7, 1);
    dn.add_blocks_to_be_invalidated(&[Block::new(1, 0, 1), Block::new(2, 0, 1)])
        .unwrap();
    {
        let guard = ns.lock();
        let mut cached = dn.cached_blocks(&guard);
        cached.add(CachedListType::PendingCached, CachedBlock::new(10, 1, 1));
        cached.add(CachedListType::Cached, CachedBlock::new(11, 1, 1));
        cached.add(CachedListType::PendingUncached, CachedBlock::new(12, 1, 1));
    }

    let guard = ns.lock();
    dn.reset_blocks(&guard);

    let stats = dn.stats();
    assert_eq!(stats.capacity, 0);
    assert_eq!(stats.remaining, 0);
    assert_eq!(stats.dfs_used, 0);
    assert_eq!(stats.block_pool_used, 0);
    assert_eq!(dn.volume_failures(), 0);
    assert_eq!(dn.number_of_blocks_to_be_invalidated(), 0);
    for list in CachedListType::ALL {
        assert_eq!(dn.num_cached(&guard, list), 0);
    }
}

#[test]
fn clear_block_queues_keeps_aggregates() {
    let ns = NamespaceLock::new();
    let dn = descriptor(&["A"]);
    dn.update_heartbeat(&[report("A", 1000)], 0, 0, 0, 0);

    let target = DatanodeStorageInfo::new("dn-2", &DatanodeStorage::new("DS-2"));
    dn.add_block_to_be_replicated(Block::new(1, 0, 1), vec![target])
        .unwrap();
    dn.add_block_to_be_recovered(BlockInfoUnderConstruction::new(Block::new(2, 0, 1), vec![]));
    dn.add_blocks_to_be_invalidated(&[Block::new(3, 0, 1)])
        .unwrap();

    let guard = ns.lock();
    dn.cached_blocks(&guard)
        .add(CachedListType::Cached, CachedBlock::new(4, 1, 1));
    dn.clear_block_queues(&guard);

    assert_eq!(dn.number_of_blocks_to_be_replicated(), 0);
    assert_eq!(dn.number_of_blocks_to_be_recovered(), 0);
    assert_eq!(dn.number_of_blocks_to_be_invalidated(), 0);
    assert!(dn.cached_blocks(&guard).is_empty());
    assert_eq!(dn.capacity(), 1000);
}

#[test]
fn replace_block_swaps_in_same_storage() {
    let ns = NamespaceLock::new();
    let dn = descriptor(&["A", "B"]);
    let guard = ns.lock();

    let neighbour = BlockInfo::new(Block::new(1, 10, 1), 3);
    let old = BlockInfo::new(Block::new(2, 10, 1), 3);
    assert!(dn.add_block(&guard, "B", &neighbour));
    assert!(dn.add_block(&guard, "B", &old));

    let new = BlockInfo::new(Block::new(3, 10, 1), 3);
    dn.replace_block(&guard, &old, new.clone());

    let b = dn.storage_info("B").unwrap();
    assert!(!b.contains_block(&old));
    assert!(b.contains_block(&new));
    assert!(b.contains_block(&neighbour));
    assert_eq!(dn.storage_info("A").unwrap().num_blocks(), 0);
    assert_eq!(
        new.find_storage_info("dn-1").map(|s| s.storage_id().to_string()),
        Some("B".to_string())
    );
}

#[test]
fn recovery_submission_is_idempotent() {
    let dn = descriptor(&[]);
    let uc = BlockInfoUnderConstruction::new(Block::new(77, 0, 1), vec!["dn-1".into()]);

    assert!(dn.add_block_to_be_recovered(uc.clone()));
    assert!(!dn.add_block_to_be_recovered(uc.clone()));
    assert_eq!(dn.number_of_blocks_to_be_recovered(), 1);

    let batch = dn.lease_recovery_command(10).unwrap();
    assert!(Arc::ptr_eq(&batch[0], &uc));
    assert!(dn.lease_recovery_command(10).is_none());
}

#[test]
fn decommission_counters_follow_admin_state() {
    let dn = descriptor(&[]);
    let status = dn.decommissioning_status();

    status.set(5, 3, 1);
    assert_eq!(status.under_replicated_blocks(), 0);
    assert_eq!(status.decommission_only_replicas(), 0);

    dn.start_decommission();
    assert_eq!(dn.admin_state(), AdminState::DecommissionInProgress);
    status.set(5, 3, 1);
    assert_eq!(status.under_replicated_blocks(), 5);
    assert_eq!(status.decommission_only_replicas(), 3);
    assert_eq!(status.under_replicated_in_open_files(), 1);

    dn.set_decommissioned();
    assert!(dn.is_decommissioned());
    assert_eq!(status.under_replicated_blocks(), 0);
}

#[test]
fn block_iterator_visits_every_block_once() {
    let ns = NamespaceLock::new();
    let dn = descriptor(&["A", "B", "C"]);
    let guard = ns.lock();

    let mut expected = Vec::new();
    for (i, storage) in ["A", "B", "C"].iter().enumerate() {
        for j in 0..10u64 {
            let id = i as u64 * 100 + j;
            dn.add_block(&guard, storage, &BlockInfo::new(Block::new(id, 0, 1), 3));
            expected.push(id);
        }
    }

    let mut seen: Vec<u64> = dn.block_iterator(&guard).map(|b| b.block_id()).collect();
    seen.sort_unstable();
    assert_eq!(seen, expected);
    assert_eq!(dn.num_blocks(), 30);
}

#[test]
fn block_iterator_survives_removal_during_walk() {
    let ns = NamespaceLock::new();
    let dn = descriptor(&["A"]);
    let guard = ns.lock();

    let blocks: Vec<Arc<BlockInfo>> = (0..8)
        .map(|id| BlockInfo::new(Block::new(id, 0, 1), 3))
        .collect();
    for block in &blocks {
        dn.add_block(&guard, "A", block);
    }

    let mut visited = 0;
    for block in dn.block_iterator(&guard) {
        visited += 1;
        dn.remove_block(&guard, &block);
        assert!(blocks.iter().any(|b| Arc::ptr_eq(b, &block)));
    }
    assert!(visited <= blocks.len());
    assert_eq!(dn.num_blocks(), blocks.len() - visited);
}

#[test]
fn dump_reports_nonzero_work_only() {
    let dn = descriptor(&[]);
    let target = DatanodeStorageInfo::new("dn-2", &DatanodeStorage::new("DS-2"));
    dn.add_block_to_be_replicated(Block::new(1, 0, 1), vec![target])
        .unwrap();
    dn.add_block_to_be_recovered(BlockInfoUnderConstruction::new(Block::new(2, 0, 1), vec![]));

    let dump = dn.dump_datanode();
    assert!(dump.contains(" 1 blocks to be replicated;"));
    assert!(dump.contains(" 1 blocks to be recovered;"));
    assert!(!dump.contains("invalidated"));
    assert!(dump.contains("In Service"));
}

#[test]
fn report_serializes() {
    let dn = descriptor(&["A"]);
    dn.update_heartbeat(&[report("A", 100)], 0, 0, 0, 0);

    let json = serde_json::to_value(dn.report()).unwrap();
    assert_eq!(json["datanode_uuid"], "dn-1");
    assert_eq!(json["xfer_addr"], "192.168.1.10:9866");
    assert_eq!(json["admin_state"], "normal");
    assert_eq!(json["stats"]["capacity"], 100);
    assert_eq!(json["num_storages"], 1);
}
