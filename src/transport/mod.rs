//! Partitioned log transport.
//!
//! The pipeline only sees these traits. `MemoryLog` backs tests and embedding,
//! `FileLog` backs the standalone service.

pub mod file;
pub mod memory;
pub mod partitioner;

pub use file::FileLog;
pub use memory::MemoryLog;
pub use partitioner::partition_for_key;

use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// A message read from a topic partition.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub key: Option<String>,
    pub value: Vec<u8>,
}

/// Sequential reader over one partition, starting at the group's committed offset.
pub trait PartitionReader: Send {
    /// Returns the next record, or `None` if nothing arrived within `timeout`.
    fn poll(&mut self, timeout: Duration) -> Result<Option<LogRecord>>;

    /// Partition this reader is attached to.
    fn partition(&self) -> u32;
}

/// Keyed writer. Records with the same key always land in the same partition.
pub trait LogWriter: Send + Sync {
    fn send(&self, topic: &str, key: &str, value: &[u8]) -> Result<()>;

    /// Make every record sent so far durable.
    fn flush(&self) -> Result<()>;
}

/// A partitioned log with per-group committed offsets.
pub trait LogTransport: Send + Sync {
    /// Creates the topic if it does not exist. Existing topics are left untouched.
    fn create_topic(&self, topic: &str, partitions: u32) -> Result<()>;

    /// Number of partitions of an existing topic.
    fn partitions(&self, topic: &str) -> Result<u32>;

    /// Opens a reader positioned at the committed offset of `group`.
    fn open_reader(
        &self,
        topic: &str,
        partition: u32,
        group: &str,
    ) -> Result<Box<dyn PartitionReader>>;

    fn writer(&self) -> Arc<dyn LogWriter>;

    /// Records that `group` has fully processed everything before `next_offset`.
    fn commit(&self, group: &str, topic: &str, partition: u32, next_offset: u64) -> Result<()>;

    /// Next offset `group` will read from; 0 when nothing was committed yet.
    fn committed(&self, group: &str, topic: &str, partition: u32) -> Result<u64>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}
