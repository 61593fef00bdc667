//! Error types for minidfs
//!
//! Only recoverable conditions live here. Broken block-membership
//! invariants (see `DatanodeDescriptor::replace_block`) panic instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Registry Errors ===
    #[error("Unregistered datanode: {0}")]
    UnregisteredDatanode(String),

    #[error("Datanode {0} is not allowed to communicate with the coordinator")]
    DisallowedDatanode(String),

    #[error("Unknown storage {storage_id} on datanode {datanode}")]
    UnknownStorage { datanode: String, storage_id: String },

    // === Work Errors ===
    #[error("Replication of block {0} requested without targets")]
    NoReplicationTargets(u64),

    #[error("Empty invalidation list submitted for {0}")]
    EmptyInvalidation(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config source error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // === Generic ===
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Is this a retryable error?
    ///
    /// An unregistered node is told to register and retry its heartbeat.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::UnregisteredDatanode(_) | Error::Io(_))
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(Error::UnregisteredDatanode("dn-1".into()).is_retryable());
        assert!(!Error::NoReplicationTargets(7).is_retryable());
        assert!(!Error::InvalidConfig("zero".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = Error::UnknownStorage {
            datanode: "dn-1".into(),
            storage_id: "DS-9".into(),
        };
        assert_eq!(err.to_string(), "Unknown storage DS-9 on datanode dn-1");
    }
}
