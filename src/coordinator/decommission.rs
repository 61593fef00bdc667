//! Administrative state and decommission progress
//!
//! The progress counters only mean something while the node is being
//! decommissioned: writes outside that phase are dropped and reads return
//! zero.

use crate::common::utils::lock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminState {
    Normal,
    DecommissionInProgress,
    Decommissioned,
}

impl AdminState {
    fn to_u8(self) -> u8 {
        match self {
            AdminState::Normal => 0,
            AdminState::DecommissionInProgress => 1,
            AdminState::Decommissioned => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => AdminState::DecommissionInProgress,
            2 => AdminState::Decommissioned,
            _ => AdminState::Normal,
        }
    }
}

impl fmt::Display for AdminState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminState::Normal => write!(f, "In Service"),
            AdminState::DecommissionInProgress => write!(f, "Decommission In Progress"),
            AdminState::Decommissioned => write!(f, "Decommissioned"),
        }
    }
}

/// Admin state shared between a datanode record and its progress tracker.
#[derive(Debug)]
pub struct AdminStateCell {
    state: AtomicU8,
}

impl AdminStateCell {
    pub fn new(state: AdminState) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(state.to_u8()),
        })
    }

    pub fn get(&self) -> AdminState {
        AdminState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, state: AdminState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    pub fn is_decommission_in_progress(&self) -> bool {
        self.get() == AdminState::DecommissionInProgress
    }

    pub fn is_decommissioned(&self) -> bool {
        self.get() == AdminState::Decommissioned
    }
}

#[derive(Debug, Default)]
struct Progress {
    under_replicated_blocks: u32,
    decommission_only_replicas: u32,
    under_replicated_in_open_files: u32,
    start_time: u64,
}

#[derive(Debug)]
pub struct DecommissioningStatus {
    admin_state: Arc<AdminStateCell>,
    progress: Mutex<Progress>,
}

impl DecommissioningStatus {
    pub fn new(admin_state: Arc<AdminStateCell>) -> Self {
        Self {
            admin_state,
            progress: Mutex::new(Progress::default()),
        }
    }

    /// Record the latest scan results. Ignored unless decommissioning.
    pub fn set(&self, under_rep: u32, only_rep: u32, under_construction: u32) {
        let mut progress = lock(&self.progress);
        if !self.admin_state.is_decommission_in_progress() {
            return;
        }
        progress.under_replicated_blocks = under_rep;
        progress.decommission_only_replicas = only_rep;
        progress.under_replicated_in_open_files = under_construction;
    }

    pub fn under_replicated_blocks(&self) -> u32 {
        self.read(|p| p.under_replicated_blocks)
    }

    /// Blocks whose only live replicas sit on decommissioning nodes.
    pub fn decommission_only_replicas(&self) -> u32 {
        self.read(|p| p.decommission_only_replicas)
    }

    pub fn under_replicated_in_open_files(&self) -> u32 {
        self.read(|p| p.under_replicated_in_open_files)
    }

    pub fn set_start_time(&self, millis: u64) {
        lock(&self.progress).start_time = millis;
    }

    pub fn start_time(&self) -> u64 {
        self.read(|p| p.start_time)
    }

    fn read<T: Default>(&self, field: impl FnOnce(&Progress) -> T) -> T {
        let progress = lock(&self.progress);
        if !self.admin_state.is_decommission_in_progress() {
            return T::default();
        }
        field(&progress)
    }
}
