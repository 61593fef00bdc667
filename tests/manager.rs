//! Heartbeat responses driven by a file-loaded configuration

use minidfs::common::MetricsRegistry;
use minidfs::coordinator::{
    Block, BlockInfoUnderConstruction, DatanodeCommand, DatanodeId, DatanodeManager,
    DatanodeStorage, DatanodeStorageInfo, Heartbeat,
};
use minidfs::{Config, Error};
use std::io::Write;
use tempfile::NamedTempFile;

fn manager_from_toml(toml: &str) -> DatanodeManager {
    let mut file = NamedTempFile::with_suffix(".toml").unwrap();
    file.write_all(toml.as_bytes()).unwrap();
    let config = Config::load(Some(file.path())).unwrap();
    let metrics: &'static MetricsRegistry = Box::leak(Box::new(MetricsRegistry::new()));
    DatanodeManager::with_metrics(config.datanode_manager, metrics)
}

#[test]
fn configured_limits_bound_each_command() {
    let mgr = manager_from_toml(
        r#"
        [datanode_manager]
        max_replication_streams = 3
        max_recovery_streams = 1
        block_invalidate_limit = 4
        "#,
    );
    let dn = mgr.register_datanode(DatanodeId::new("dn-1", "10.0.0.1", 9866), &[]);
    let target = DatanodeStorageInfo::new("dn-2", &DatanodeStorage::new("DS-2"));
    for id in 0..10 {
        dn.add_block_to_be_replicated(Block::new(id, 0, 1), vec![target.clone()])
            .unwrap();
    }
    let doomed: Vec<Block> = (100..110).map(|id| Block::new(id, 0, 1)).collect();
    dn.add_blocks_to_be_invalidated(&doomed).unwrap();
    for id in 200..202 {
        dn.add_block_to_be_recovered(BlockInfoUnderConstruction::new(Block::new(id, 0, 1), vec![]));
    }

    // recovery goes out alone, one block per heartbeat
    for _ in 0..2 {
        let commands = mgr.handle_heartbeat("dn-1", &Heartbeat::default()).unwrap();
        assert_eq!(commands.len(), 1);
        match &commands[0] {
            DatanodeCommand::Recover(blocks) => assert_eq!(blocks.len(), 1),
            other => panic!("expected recovery, got {}", other),
        }
    }

    let commands = mgr.handle_heartbeat("dn-1", &Heartbeat::default()).unwrap();
    let mut saw_replicate = false;
    let mut saw_invalidate = false;
    for command in commands {
        match command {
            DatanodeCommand::Replicate(pairs) => {
                assert_eq!(pairs.len(), 3);
                saw_replicate = true;
            }
            DatanodeCommand::Invalidate(blocks) => {
                assert_eq!(blocks.len(), 4);
                saw_invalidate = true;
            }
            other => panic!("unexpected command {}", other),
        }
    }
    assert!(saw_replicate && saw_invalidate);
    assert_eq!(dn.number_of_blocks_to_be_replicated(), 7);
    assert_eq!(dn.number_of_blocks_to_be_invalidated(), 6);
}

#[test]
fn expiry_follows_configured_intervals() {
    let mgr = manager_from_toml(
        r#"
        [datanode_manager]
        heartbeat_interval_ms = 1000
        heartbeat_recheck_interval_ms = 5000
        stale_interval_ms = 4000
        "#,
    );
    assert_eq!(mgr.config().expiry_interval().as_millis(), 20_000);

    let dn = mgr.register_datanode(DatanodeId::new("dn-1", "10.0.0.1", 9866), &[]);
    let t0 = dn.last_update();

    assert!(mgr.heartbeat_check(t0 + 20_000).is_empty());
    assert!(mgr.is_stale(&dn, t0 + 4_001));
    assert_eq!(mgr.heartbeat_check(t0 + 20_001), vec!["dn-1".to_string()]);

    let commands = mgr.handle_heartbeat("dn-1", &Heartbeat::default()).unwrap();
    assert!(matches!(commands.as_slice(), [DatanodeCommand::Register]));
}

#[test]
fn zero_limit_is_rejected() {
    let mut file = NamedTempFile::with_suffix(".toml").unwrap();
    file.write_all(b"[datanode_manager]\nblock_invalidate_limit = 0\n")
        .unwrap();
    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn unknown_node_must_register() {
    let mgr = manager_from_toml("");
    let err = mgr
        .handle_heartbeat("nobody", &Heartbeat::default())
        .unwrap_err();
    assert!(matches!(err, Error::UnregisteredDatanode(ref uuid) if uuid == "nobody"));
    assert!(err.is_retryable());
}
