//! In-process partitioned log.

use crate::error::{Result, VoxparseError};
use crate::transport::partitioner::partition_for_key;
use crate::transport::{LogRecord, LogTransport, LogWriter, PartitionReader};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct StoredEntry {
    key: Option<String>,
    value: Vec<u8>,
}

#[derive(Debug, Default)]
struct MemoryState {
    topics: HashMap<String, Vec<Vec<StoredEntry>>>,
    offsets: HashMap<(String, String, u32), u64>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MemoryState>,
    appended: Condvar,
}

/// Partitioned log held in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    shared: Arc<Shared>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `topic` with `partitions` partitions (builder form).
    pub fn with_topic(self, topic: &str, partitions: u32) -> Result<Self> {
        self.create_topic(topic, partitions)?;
        Ok(self)
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.shared
            .state
            .lock()
            .map_err(|_| VoxparseError::Transport {
                message: "memory log lock poisoned".to_string(),
            })
    }

    /// Appends to an explicit partition. Returns the new record's offset.
    pub fn append_to(
        &self,
        topic: &str,
        partition: u32,
        key: Option<&str>,
        value: &[u8],
    ) -> Result<u64> {
        let mut state = self.state()?;
        let partitions = state
            .topics
            .get_mut(topic)
            .ok_or_else(|| VoxparseError::UnknownTopic {
                topic: topic.to_string(),
            })?;
        let entries =
            partitions
                .get_mut(partition as usize)
                .ok_or_else(|| VoxparseError::UnknownPartition {
                    topic: topic.to_string(),
                    partition,
                })?;
        entries.push(StoredEntry {
            key: key.map(str::to_string),
            value: value.to_vec(),
        });
        let offset = entries.len() as u64 - 1;
        drop(state);
        self.shared.appended.notify_all();
        Ok(offset)
    }

    /// Appends keyed by `key`. Returns `(partition, offset)`.
    pub fn append(&self, topic: &str, key: &str, value: &[u8]) -> Result<(u32, u64)> {
        let partition = partition_for_key(key, self.partitions(topic)?);
        let offset = self.append_to(topic, partition, Some(key), value)?;
        Ok((partition, offset))
    }

    /// Every record of `topic`, partition by partition in offset order.
    pub fn records(&self, topic: &str) -> Result<Vec<LogRecord>> {
        let state = self.state()?;
        let partitions = state
            .topics
            .get(topic)
            .ok_or_else(|| VoxparseError::UnknownTopic {
                topic: topic.to_string(),
            })?;
        Ok(partitions
            .iter()
            .enumerate()
            .flat_map(|(partition, entries)| {
                entries
                    .iter()
                    .enumerate()
                    .map(move |(offset, entry)| LogRecord {
                        topic: topic.to_string(),
                        partition: partition as u32,
                        offset: offset as u64,
                        key: entry.key.clone(),
                        value: entry.value.clone(),
                    })
            })
            .collect())
    }
}

impl LogTransport for MemoryLog {
    fn create_topic(&self, topic: &str, partitions: u32) -> Result<()> {
        if partitions == 0 {
            return Err(VoxparseError::Transport {
                message: format!("topic '{}' needs at least one partition", topic),
            });
        }
        let mut state = self.state()?;
        state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); partitions as usize]);
        Ok(())
    }

    fn partitions(&self, topic: &str) -> Result<u32> {
        let state = self.state()?;
        state
            .topics
            .get(topic)
            .map(|p| p.len() as u32)
            .ok_or_else(|| VoxparseError::UnknownTopic {
                topic: topic.to_string(),
            })
    }

    fn open_reader(
        &self,
        topic: &str,
        partition: u32,
        group: &str,
    ) -> Result<Box<dyn PartitionReader>> {
        if partition >= self.partitions(topic)? {
            return Err(VoxparseError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            });
        }
        let position = self.committed(group, topic, partition)?;
        Ok(Box::new(MemoryReader {
            log: self.clone(),
            topic: topic.to_string(),
            partition,
            position,
        }))
    }

    fn writer(&self) -> Arc<dyn LogWriter> {
        Arc::new(self.clone())
    }

    fn commit(&self, group: &str, topic: &str, partition: u32, next_offset: u64) -> Result<()> {
        let mut state = self.state()?;
        state
            .offsets
            .insert((group.to_string(), topic.to_string(), partition), next_offset);
        Ok(())
    }

    fn committed(&self, group: &str, topic: &str, partition: u32) -> Result<u64> {
        let state = self.state()?;
        Ok(state
            .offsets
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
            .unwrap_or(0))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

impl LogWriter for MemoryLog {
    fn send(&self, topic: &str, key: &str, value: &[u8]) -> Result<()> {
        self.append(topic, key, value).map(|_| ())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

struct MemoryReader {
    log: MemoryLog,
    topic: String,
    partition: u32,
    position: u64,
}

impl PartitionReader for MemoryReader {
    fn poll(&mut self, timeout: Duration) -> Result<Option<LogRecord>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.log.state()?;

        loop {
            let entry = state
                .topics
                .get(&self.topic)
                .and_then(|p| p.get(self.partition as usize))
                .and_then(|entries| entries.get(self.position as usize))
                .cloned();

            if let Some(entry) = entry {
                let record = LogRecord {
                    topic: self.topic.clone(),
                    partition: self.partition,
                    offset: self.position,
                    key: entry.key,
                    value: entry.value,
                };
                self.position += 1;
                return Ok(Some(record));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            state = self
                .log
                .shared
                .appended
                .wait_timeout(state, deadline - now)
                .map_err(|_| VoxparseError::Transport {
                    message: "memory log lock poisoned".to_string(),
                })?
                .0;
        }
    }

    fn partition(&self) -> u32 {
        self.partition
    }
}
