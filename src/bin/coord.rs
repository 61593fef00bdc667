//! Coordinator binary

use clap::{Parser, Subcommand};
use minidfs::common::{parse_duration, Config, METRICS};
use minidfs::coordinator::{
    Block, BlockInfo, BlockInfoUnderConstruction, DatanodeId, DatanodeManager, DatanodeStorage,
    Heartbeat, StorageReport,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minidfs-coord")]
#[command(about = "minidfs coordinator datanode bookkeeping")]
#[command(version = minidfs::VERSION)]
struct Cli {
    /// Config file (TOML); MINIDFS_* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as JSON
    ShowConfig,

    /// Run an in-memory cluster through a number of heartbeat rounds
    Simulate {
        /// Number of datanodes
        #[arg(long, default_value = "3")]
        nodes: usize,

        /// Storage volumes per datanode
        #[arg(long, default_value = "2")]
        storages: usize,

        /// Heartbeat rounds per datanode
        #[arg(long, default_value = "5")]
        rounds: usize,

        /// Pause between rounds (e.g. 50ms, 1s)
        #[arg(long, default_value = "20ms")]
        interval: String,

        /// RNG seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Simulate {
            nodes,
            storages,
            rounds,
            interval,
            seed,
        } => {
            let interval = parse_duration(&interval)?;
            let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
            tracing::info!(
                "Simulating {} datanodes x {} storages for {} rounds (seed {})",
                nodes,
                storages,
                rounds,
                seed
            );
            let manager = Arc::new(DatanodeManager::new(config.datanode_manager.clone()));
            simulate(manager.clone(), nodes, storages, rounds, interval, seed).await?;

            for dn in manager.datanodes() {
                println!("{}", dn.dump_datanode());
            }
            println!();
            print!("{}", METRICS.to_prometheus());
        }
    }

    Ok(())
}

async fn simulate(
    manager: Arc<DatanodeManager>,
    nodes: usize,
    storages: usize,
    rounds: usize,
    interval: Duration,
    seed: u64,
) -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut volumes = Vec::with_capacity(nodes);
    for i in 0..nodes {
        let id = DatanodeId::new(DatanodeId::generate_uuid(), format!("10.0.0.{}", i + 1), 9866);
        let node_storages: Vec<DatanodeStorage> = (0..storages)
            .map(|_| DatanodeStorage::new(DatanodeStorage::generate_storage_id()))
            .collect();
        let capacities: Vec<u64> = node_storages
            .iter()
            .map(|_| rng.gen_range(1u64 << 30..1u64 << 40))
            .collect();
        let dn = manager.register_datanode(id, &node_storages);
        volumes.push((dn.datanode_uuid().to_string(), node_storages, capacities));
    }

    let policy = tokio::spawn(submit_work(manager.clone(), rounds, interval, rng.gen()));

    let mut handles = Vec::with_capacity(nodes);
    for (uuid, node_storages, capacities) in volumes {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            for round in 0..rounds {
                let reports = node_storages
                    .iter()
                    .zip(&capacities)
                    .map(|(storage, &capacity)| usage_report(storage, capacity, round))
                    .collect();
                let heartbeat = Heartbeat {
                    reports,
                    ..Heartbeat::default()
                };
                match manager.handle_heartbeat(&uuid, &heartbeat) {
                    Ok(commands) => {
                        for command in commands {
                            tracing::debug!("{} <- {}", uuid, command);
                        }
                    }
                    Err(e) => tracing::warn!("Heartbeat from {} failed: {}", uuid, e),
                }
                tokio::time::sleep(interval).await;
            }
        }));
    }

    for handle in handles {
        handle.await?;
    }
    policy.await??;
    Ok(())
}

/// Synthetic usage for one volume: fills 1% per round, wrapping after 100.
fn usage_report(storage: &DatanodeStorage, capacity: u64, round: usize) -> StorageReport {
    let used = capacity / 100 * (round as u64 % 100 + 1);
    StorageReport {
        storage: storage.clone(),
        failed: false,
        capacity,
        dfs_used: used,
        remaining: capacity.saturating_sub(used),
        block_pool_used: used,
    }
}

/// Plays the block manager: places blocks, then schedules replication,
/// recovery and deletion work against the registered nodes.
async fn submit_work(
    manager: Arc<DatanodeManager>,
    rounds: usize,
    interval: Duration,
    seed: u64,
) -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut next_block_id = 1u64;

    for _ in 0..rounds {
        let datanodes = manager.datanodes();
        if datanodes.len() < 2 {
            break;
        }

        for _ in 0..4 {
            let source = &datanodes[rng.gen_range(0..datanodes.len())];
            let target = &datanodes[rng.gen_range(0..datanodes.len())];
            let block = Block::new(next_block_id, rng.gen_range(1u64..128) << 20, 1);
            next_block_id += 1;

            if let Some(storage) = source.storage_infos().first() {
                let info = BlockInfo::new(block, 3);
                manager.add_reported_block(source.datanode_uuid(), storage.storage_id(), &info)?;
            }

            let targets: Vec<_> = target.storage_infos().into_iter().take(1).collect();
            if source != target && !targets.is_empty() {
                source.add_block_to_be_replicated(block, targets)?;
            }
        }

        let node = &datanodes[rng.gen_range(0..datanodes.len())];
        let doomed = Block::new(rng.gen_range(1..next_block_id), 0, 1);
        node.add_blocks_to_be_invalidated(&[doomed])?;

        if rng.gen_bool(0.3) {
            let uc = BlockInfoUnderConstruction::new(
                Block::new(next_block_id, 0, 1),
                vec![node.datanode_uuid().to_string()],
            );
            next_block_id += 1;
            manager.add_block_to_be_recovered(node.datanode_uuid(), uc)?;
        }

        tokio::time::sleep(interval).await;
    }
    Ok(())
}
