//! Common utilities and types shared across minidfs

pub mod config;
pub mod error;
pub mod metrics;
pub mod utils;

pub use config::{Config, DatanodeManagerConfig};
pub use error::{Error, Result};
pub use metrics::{MetricsRegistry, METRICS};
pub use utils::{format_bytes, format_timestamp_millis, parse_duration, timestamp_now_millis};
