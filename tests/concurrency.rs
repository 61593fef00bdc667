//! Concurrent heartbeats, submissions and drains against shared records

use minidfs::common::{DatanodeManagerConfig, MetricsRegistry};
use minidfs::coordinator::{
    Block, BlockInfo, BlockQueue, DatanodeCommand, DatanodeId, DatanodeManager, DatanodeStorage,
    Heartbeat, StorageReport,
};
use std::collections::HashSet;
use std::sync::Arc;

fn manager() -> Arc<DatanodeManager> {
    let metrics: &'static MetricsRegistry = Box::leak(Box::new(MetricsRegistry::new()));
    Arc::new(DatanodeManager::with_metrics(
        DatanodeManagerConfig::default(),
        metrics,
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_offers_are_never_lost() {
    let queue = Arc::new(BlockQueue::new());
    let producers = 8u64;
    let per_producer = 500u64;

    let mut handles = Vec::new();
    for p in 0..producers {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..per_producer {
                queue.offer(p * per_producer + i);
                if i % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }

    let drainer = {
        let queue = queue.clone();
        tokio::spawn(async move {
            let mut drained = Vec::new();
            for _ in 0..200 {
                if let Some(batch) = queue.poll(7) {
                    assert!(batch.len() <= 7);
                    drained.extend(batch);
                }
                tokio::task::yield_now().await;
            }
            drained
        })
    };

    for handle in handles {
        handle.await.unwrap();
    }
    let mut drained = drainer.await.unwrap();
    while let Some(batch) = queue.poll(100) {
        drained.extend(batch);
    }

    assert_eq!(drained.len() as u64, producers * per_producer);
    let unique: HashSet<u64> = drained.into_iter().collect();
    assert_eq!(unique.len() as u64, producers * per_producer);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn heartbeats_and_submissions_interleave() {
    let mgr = manager();
    let source = mgr.register_datanode(
        DatanodeId::new("dn-src", "10.0.0.1", 9866),
        &[DatanodeStorage::new("DS-src")],
    );
    let target = mgr.register_datanode(
        DatanodeId::new("dn-dst", "10.0.0.2", 9866),
        &[DatanodeStorage::new("DS-dst")],
    );
    let target_storage = target.storage_info("DS-dst").unwrap();
    let total = 200u64;

    let submitter = {
        let source = source.clone();
        tokio::spawn(async move {
            for id in 0..total {
                source
                    .add_block_to_be_replicated(Block::new(id, 0, 1), vec![target_storage.clone()])
                    .unwrap();
                if id % 10 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    let heartbeater = {
        let mgr = mgr.clone();
        tokio::spawn(async move {
            let heartbeat = Heartbeat {
                reports: vec![StorageReport {
                    storage: DatanodeStorage::new("DS-src"),
                    failed: false,
                    capacity: 1 << 30,
                    dfs_used: 0,
                    remaining: 1 << 30,
                    block_pool_used: 0,
                }],
                ..Heartbeat::default()
            };
            let mut replicated = Vec::new();
            for _ in 0..150 {
                for command in mgr.handle_heartbeat("dn-src", &heartbeat).unwrap() {
                    if let DatanodeCommand::Replicate(pairs) = command {
                        assert!(pairs.len() <= 2);
                        replicated.extend(pairs.into_iter().map(|p| p.block.block_id));
                    }
                }
                tokio::task::yield_now().await;
            }
            replicated
        })
    };

    submitter.await.unwrap();
    let mut replicated = heartbeater.await.unwrap();
    while let Some(pairs) = source.replication_command(50) {
        replicated.extend(pairs.into_iter().map(|p| p.block.block_id));
    }

    // a single submitter means ids come back in submission order
    assert_eq!(replicated, (0..total).collect::<Vec<_>>());
    assert_eq!(source.capacity(), 1 << 30);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn namespace_lock_serializes_membership_changes() {
    let mgr = manager();
    let dn = mgr.register_datanode(
        DatanodeId::new("dn-1", "10.0.0.1", 9866),
        &[DatanodeStorage::new("A"), DatanodeStorage::new("B")],
    );

    let mut handles = Vec::new();
    for worker in 0..4u64 {
        let mgr = mgr.clone();
        let dn = dn.clone();
        handles.push(tokio::spawn(async move {
            let storage = if worker % 2 == 0 { "A" } else { "B" };
            for i in 0..100u64 {
                let block = BlockInfo::new(Block::new(worker * 1000 + i, 0, 1), 3);
                {
                    let guard = mgr.lock_namespace();
                    assert!(dn.add_block(&guard, storage, &block));
                    if i % 3 == 0 {
                        assert!(dn.remove_block(&guard, &block));
                    }
                }
                tokio::task::yield_now().await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // 34 of every 100 were removed again
    assert_eq!(dn.num_blocks(), 4 * 66);
    let guard = mgr.lock_namespace();
    assert_eq!(dn.block_iterator(&guard).count(), 4 * 66);
}
