//! Datanode registry and heartbeat responses
//!
//! The manager owns the namespace lock and the descriptors of every
//! registered datanode. Each heartbeat refreshes the node's aggregates and
//! turns its pending work into a bounded list of commands.

use crate::common::utils::{read, timestamp_now_millis, write};
use crate::common::{DatanodeManagerConfig, MetricsRegistry, METRICS};
use crate::coordinator::block::{Block, BlockInfo, BlockInfoUnderConstruction};
use crate::coordinator::descriptor::{DatanodeDescriptor, DatanodeId};
use crate::coordinator::namespace::{NamespaceGuard, NamespaceLock};
use crate::coordinator::storage::{DatanodeStorage, StorageReport};
use crate::coordinator::work_queue::BlockTargetPair;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Instruction returned to a datanode in a heartbeat response.
#[derive(Debug, Clone)]
pub enum DatanodeCommand {
    /// The coordinator lost track of the node; it must register again.
    Register,
    Replicate(Vec<BlockTargetPair>),
    Recover(Vec<Arc<BlockInfoUnderConstruction>>),
    Invalidate(Vec<Block>),
    /// New balancer bandwidth in bytes/sec.
    BalancerBandwidth(u64),
    KeyUpdate,
}

impl DatanodeCommand {
    pub fn name(&self) -> &'static str {
        match self {
            DatanodeCommand::Register => "register",
            DatanodeCommand::Replicate(_) => "replicate",
            DatanodeCommand::Recover(_) => "recover",
            DatanodeCommand::Invalidate(_) => "invalidate",
            DatanodeCommand::BalancerBandwidth(_) => "balancer_bandwidth",
            DatanodeCommand::KeyUpdate => "key_update",
        }
    }
}

impl fmt::Display for DatanodeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatanodeCommand::Replicate(pairs) => write!(f, "replicate({})", pairs.len()),
            DatanodeCommand::Recover(blocks) => write!(f, "recover({})", blocks.len()),
            DatanodeCommand::Invalidate(blocks) => write!(f, "invalidate({})", blocks.len()),
            DatanodeCommand::BalancerBandwidth(bw) => write!(f, "balancer_bandwidth({})", bw),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// One heartbeat as received from a datanode.
#[derive(Debug, Clone, Default)]
pub struct Heartbeat {
    pub reports: Vec<StorageReport>,
    pub cache_capacity: u64,
    pub cache_used: u64,
    pub xceiver_count: u32,
    pub volume_failures: u32,
}

pub struct DatanodeManager {
    config: DatanodeManagerConfig,
    namespace: NamespaceLock,
    datanodes: RwLock<HashMap<String, Arc<DatanodeDescriptor>>>,
    metrics: &'static MetricsRegistry,
}

impl DatanodeManager {
    /// Manager reporting into the process-wide [`METRICS`].
    pub fn new(config: DatanodeManagerConfig) -> Self {
        Self::with_metrics(config, &METRICS)
    }

    pub fn with_metrics(config: DatanodeManagerConfig, metrics: &'static MetricsRegistry) -> Self {
        Self {
            config,
            namespace: NamespaceLock::new(),
            datanodes: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    pub fn config(&self) -> &DatanodeManagerConfig {
        &self.config
    }

    pub fn namespace(&self) -> &NamespaceLock {
        &self.namespace
    }

    /// Shorthand for `namespace().lock()`.
    pub fn lock_namespace(&self) -> NamespaceGuard<'_> {
        self.namespace.lock()
    }

    pub fn datanode(&self, uuid: &str) -> Option<Arc<DatanodeDescriptor>> {
        read(&self.datanodes).get(uuid).cloned()
    }

    pub fn datanodes(&self) -> Vec<Arc<DatanodeDescriptor>> {
        read(&self.datanodes).values().cloned().collect()
    }

    pub fn num_datanodes(&self) -> usize {
        read(&self.datanodes).len()
    }

    pub fn num_live_datanodes(&self) -> usize {
        read(&self.datanodes)
            .values()
            .filter(|dn| dn.is_alive())
            .count()
    }

    /// Register a datanode, or re-register a known one.
    ///
    /// A re-registering node gets its address fields refreshed and its
    /// reported state reset: it is about to send full block reports.
    pub fn register_datanode(
        &self,
        id: DatanodeId,
        storages: &[DatanodeStorage],
    ) -> Arc<DatanodeDescriptor> {
        let (descriptor, is_new) = {
            let mut nodes = write(&self.datanodes);
            match nodes.get(&id.datanode_uuid) {
                Some(dn) => (Arc::clone(dn), false),
                None => {
                    let dn = Arc::new(DatanodeDescriptor::new(id.clone()));
                    dn.bind_namespace(&self.namespace);
                    nodes.insert(id.datanode_uuid.clone(), Arc::clone(&dn));
                    (dn, true)
                }
            }
        };

        if is_new {
            tracing::info!("Registering new datanode {} ({})", id, id.datanode_uuid);
            self.metrics.registered_datanodes.inc();
        } else {
            tracing::info!("Re-registering datanode {} ({})", id, id.datanode_uuid);
            descriptor.update_reg_info(id);
            let guard = self.namespace.lock();
            descriptor.reset_blocks(&guard);
        }

        for storage in storages {
            descriptor.update_storage(storage);
        }
        descriptor.set_last_update(timestamp_now_millis());
        self.mark_alive(&descriptor);
        descriptor
    }

    /// Forget a datanode: its block memberships and pending work go with it.
    pub fn remove_datanode(&self, uuid: &str) -> Option<Arc<DatanodeDescriptor>> {
        let removed = write(&self.datanodes).remove(uuid)?;
        let guard = self.namespace.lock();
        let blocks = removed.remove_all_blocks(&guard);
        removed.clear_block_queues(&guard);
        drop(guard);

        self.mark_dead(&removed);
        self.metrics.registered_datanodes.dec();
        tracing::info!(
            "Removed datanode {} ({} block replicas dropped)",
            removed,
            blocks
        );
        Some(removed)
    }

    /// Ingest a heartbeat and build the node's response.
    ///
    /// A node that is registered but was declared dead gets
    /// [`DatanodeCommand::Register`] only. When lease recovery is pending,
    /// the response carries the recovery batch alone.
    pub fn handle_heartbeat(&self, uuid: &str, heartbeat: &Heartbeat) -> Result<Vec<DatanodeCommand>> {
        let Some(dn) = self.datanode(uuid) else {
            self.metrics.rejected_heartbeats.inc();
            return Err(Error::UnregisteredDatanode(uuid.to_string()));
        };
        if dn.is_disallowed() {
            self.metrics.rejected_heartbeats.inc();
            tracing::warn!("Disallowed datanode {} sent a heartbeat", dn);
            return Err(Error::DisallowedDatanode(uuid.to_string()));
        }
        self.metrics.heartbeats_total.inc();

        if !dn.is_alive() {
            return Ok(vec![DatanodeCommand::Register]);
        }

        let skipped = dn.update_heartbeat(
            &heartbeat.reports,
            heartbeat.cache_capacity,
            heartbeat.cache_used,
            heartbeat.xceiver_count,
            heartbeat.volume_failures,
        );
        self.metrics.unknown_storage_reports.add(skipped as u64);

        if let Some(blocks) = dn.lease_recovery_command(self.config.max_recovery_streams) {
            self.metrics.blocks_to_recover_dispatched.add(blocks.len() as u64);
            return Ok(vec![DatanodeCommand::Recover(blocks)]);
        }

        let mut commands = Vec::new();
        if let Some(pairs) = dn.replication_command(self.config.max_replication_streams) {
            self.metrics.blocks_to_replicate_dispatched.add(pairs.len() as u64);
            commands.push(DatanodeCommand::Replicate(pairs));
        }
        if let Some(blocks) = dn.invalidate_blocks(self.config.block_invalidate_limit) {
            self.metrics.blocks_to_invalidate_dispatched.add(blocks.len() as u64);
            commands.push(DatanodeCommand::Invalidate(blocks));
        }
        if let Some(bandwidth) = dn.take_balancer_bandwidth() {
            commands.push(DatanodeCommand::BalancerBandwidth(bandwidth));
        }
        if dn.take_need_key_update() {
            commands.push(DatanodeCommand::KeyUpdate);
        }
        Ok(commands)
    }

    /// Record that `uuid` reported holding `block` on `storage_id`, as an
    /// incremental block report does. Returns whether membership changed.
    pub fn add_reported_block(
        &self,
        uuid: &str,
        storage_id: &str,
        block: &Arc<BlockInfo>,
    ) -> Result<bool> {
        let dn = self
            .datanode(uuid)
            .ok_or_else(|| Error::UnregisteredDatanode(uuid.to_string()))?;
        if dn.storage_info(storage_id).is_none() {
            return Err(Error::UnknownStorage {
                datanode: uuid.to_string(),
                storage_id: storage_id.to_string(),
            });
        }
        let guard = self.namespace.lock();
        Ok(dn.add_block(&guard, storage_id, block))
    }

    /// Queue a lease recovery on `uuid`. Returns whether it was queued.
    pub fn add_block_to_be_recovered(
        &self,
        uuid: &str,
        block: Arc<BlockInfoUnderConstruction>,
    ) -> Result<bool> {
        let dn = self
            .datanode(uuid)
            .ok_or_else(|| Error::UnregisteredDatanode(uuid.to_string()))?;
        let added = dn.add_block_to_be_recovered(block);
        if !added {
            self.metrics.duplicate_recovery_submissions.inc();
        }
        Ok(added)
    }

    /// Set the balancer bandwidth on every registered node; each receives
    /// it with its next heartbeat.
    pub fn set_balancer_bandwidth(&self, bytes_per_sec: u64) {
        for dn in self.datanodes() {
            dn.set_balancer_bandwidth(bytes_per_sec);
        }
    }

    /// Ask every node to fetch new block keys.
    pub fn mark_all_need_key_update(&self) {
        for dn in self.datanodes() {
            dn.set_need_key_update(true);
        }
    }

    pub fn is_stale(&self, dn: &DatanodeDescriptor, now_millis: u64) -> bool {
        dn.is_stale(now_millis, self.config.stale_interval_ms)
    }

    fn is_expired(&self, dn: &DatanodeDescriptor, now_millis: u64) -> bool {
        let expiry = self.config.expiry_interval().as_millis() as u64;
        now_millis.saturating_sub(dn.last_update()) > expiry
    }

    /// Mark every live node silent past the expiry interval as dead.
    /// Returns the uuids of the nodes that died in this pass.
    pub fn heartbeat_check(&self, now_millis: u64) -> Vec<String> {
        let mut dead = Vec::new();
        for dn in self.datanodes() {
            if dn.is_alive() && self.is_expired(&dn, now_millis) {
                tracing::warn!(
                    "Datanode {} ({}) missed heartbeats, marking dead",
                    dn,
                    dn.datanode_uuid()
                );
                self.mark_dead(&dn);
                dead.push(dn.datanode_uuid().to_string());
            }
        }
        dead
    }

    /// Nodes currently considered stale, for placement to avoid.
    pub fn stale_datanodes(&self, now_millis: u64) -> Vec<Arc<DatanodeDescriptor>> {
        self.datanodes()
            .into_iter()
            .filter(|dn| dn.is_alive() && self.is_stale(dn, now_millis))
            .collect()
    }

    fn mark_alive(&self, dn: &DatanodeDescriptor) {
        if !dn.is_alive() {
            dn.set_alive(true);
            self.metrics.live_datanodes.inc();
        }
    }

    fn mark_dead(&self, dn: &DatanodeDescriptor) {
        if dn.is_alive() {
            dn.set_alive(false);
            self.metrics.live_datanodes.dec();
        }
    }
}
