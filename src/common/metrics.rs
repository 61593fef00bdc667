//! Coordinator-side datanode metrics
//!
//! Prometheus-compatible counters and gauges covering heartbeat ingestion
//! and the work handed out to datanodes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Gauge for tracking current values
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn set(&self, v: u64) {
        self.value.store(v, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero.
    pub fn dec(&self) {
        let _ = self
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct MetricsRegistry {
    pub heartbeats_total: Counter,
    pub unknown_storage_reports: Counter,
    pub rejected_heartbeats: Counter,

    pub blocks_to_replicate_dispatched: Counter,
    pub blocks_to_recover_dispatched: Counter,
    pub blocks_to_invalidate_dispatched: Counter,
    pub duplicate_recovery_submissions: Counter,

    pub registered_datanodes: Gauge,
    pub live_datanodes: Gauge,

    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            heartbeats_total: Counter::new(),
            unknown_storage_reports: Counter::new(),
            rejected_heartbeats: Counter::new(),
            blocks_to_replicate_dispatched: Counter::new(),
            blocks_to_recover_dispatched: Counter::new(),
            blocks_to_invalidate_dispatched: Counter::new(),
            duplicate_recovery_submissions: Counter::new(),
            registered_datanodes: Gauge::new(),
            live_datanodes: Gauge::new(),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-compatible metrics output
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        let counters = [
            (
                "minidfs_heartbeats_total",
                "Heartbeats processed",
                &self.heartbeats_total,
            ),
            (
                "minidfs_unknown_storage_reports_total",
                "Storage reports naming a volume unknown to the node",
                &self.unknown_storage_reports,
            ),
            (
                "minidfs_rejected_heartbeats_total",
                "Heartbeats from unregistered or disallowed nodes",
                &self.rejected_heartbeats,
            ),
            (
                "minidfs_replication_dispatched_total",
                "Blocks handed to datanodes for replication",
                &self.blocks_to_replicate_dispatched,
            ),
            (
                "minidfs_recovery_dispatched_total",
                "Blocks handed to datanodes for lease recovery",
                &self.blocks_to_recover_dispatched,
            ),
            (
                "minidfs_invalidation_dispatched_total",
                "Blocks handed to datanodes for deletion",
                &self.blocks_to_invalidate_dispatched,
            ),
            (
                "minidfs_duplicate_recovery_total",
                "Recovery submissions absorbed because the block was queued",
                &self.duplicate_recovery_submissions,
            ),
        ];
        for (name, help, counter) in counters {
            out += &format!("# HELP {} {}\n", name, help);
            out += &format!("# TYPE {} counter\n", name);
            out += &format!("{} {}\n", name, counter.get());
        }

        let gauges = [
            (
                "minidfs_registered_datanodes",
                "Datanodes known to the coordinator",
                &self.registered_datanodes,
            ),
            (
                "minidfs_live_datanodes",
                "Datanodes currently considered alive",
                &self.live_datanodes,
            ),
        ];
        for (name, help, gauge) in gauges {
            out += &format!("# HELP {} {}\n", name, help);
            out += &format!("# TYPE {} gauge\n", name);
            out += &format!("{} {}\n", name, gauge.get());
        }

        out += "# HELP minidfs_uptime_seconds Coordinator uptime in seconds\n";
        out += "# TYPE minidfs_uptime_seconds gauge\n";
        out += &format!("minidfs_uptime_seconds {}\n", self.uptime_seconds());

        out
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global metrics instance
pub static METRICS: once_cell::sync::Lazy<MetricsRegistry> =
    once_cell::sync::Lazy::new(MetricsRegistry::new);
