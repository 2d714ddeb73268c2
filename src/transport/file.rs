//! Directory-backed partitioned log.
//!
//! Layout:
//!
//! ```text
//! <root>/<topic>/<partition>.jsonl            one JSON line per record
//! <root>/<topic>/<partition>.<group>.offset   next offset for a consumer group
//! ```
//!
//! Lines are appended with a single write so a concurrent reader never sees
//! half a record followed by another record; a trailing partial line is left
//! for the next poll.

use crate::error::{Result, VoxparseError};
use crate::transport::partitioner::partition_for_key;
use crate::transport::{LogRecord, LogTransport, LogWriter, PartitionReader};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const LOG_EXTENSION: &str = "jsonl";

/// How often a tailing reader re-checks the file when it is at the end.
const TAIL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Serialize, Deserialize)]
struct StoredLine {
    key: Option<String>,
    /// Base64 of the opaque value bytes.
    value: String,
}

/// Partitioned log stored under a directory.
#[derive(Debug, Clone)]
pub struct FileLog {
    root: PathBuf,
    writer: Arc<FileWriter>,
}

impl FileLog {
    /// Opens an existing log directory.
    ///
    /// A missing directory means the transport is unreachable.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(VoxparseError::TransportUnavailable {
                location: root.display().to_string(),
                message: "log directory does not exist".to_string(),
            });
        }
        Ok(Self {
            writer: Arc::new(FileWriter::new(root.clone())),
            root,
        })
    }

    /// Creates the log directory if needed, then opens it.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Self::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn topic_dir(root: &Path, topic: &str) -> PathBuf {
    root.join(topic)
}

fn partition_path(root: &Path, topic: &str, partition: u32) -> PathBuf {
    topic_dir(root, topic).join(format!("{}.{}", partition, LOG_EXTENSION))
}

fn offset_path(root: &Path, topic: &str, partition: u32, group: &str) -> PathBuf {
    topic_dir(root, topic).join(format!("{}.{}.offset", partition, group))
}

fn count_partitions(root: &Path, topic: &str) -> Result<u32> {
    let dir = topic_dir(root, topic);
    if !dir.is_dir() {
        return Err(VoxparseError::UnknownTopic {
            topic: topic.to_string(),
        });
    }
    let mut count = 0;
    while partition_path(root, topic, count).is_file() {
        count += 1;
    }
    if count == 0 {
        return Err(VoxparseError::UnknownTopic {
            topic: topic.to_string(),
        });
    }
    Ok(count)
}

fn encode_line(key: Option<&str>, value: &[u8]) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(&StoredLine {
        key: key.map(str::to_string),
        value: STANDARD.encode(value),
    })?;
    line.push(b'\n');
    Ok(line)
}

fn decode_line(line: &[u8], topic: &str, partition: u32, offset: u64) -> Result<LogRecord> {
    let stored: StoredLine =
        serde_json::from_slice(line).map_err(|e| VoxparseError::Transport {
            message: format!("corrupt line at {}/{}@{}: {}", topic, partition, offset, e),
        })?;
    let value = STANDARD
        .decode(stored.value.as_bytes())
        .map_err(|e| VoxparseError::Transport {
            message: format!("corrupt value at {}/{}@{}: {}", topic, partition, offset, e),
        })?;
    Ok(LogRecord {
        topic: topic.to_string(),
        partition,
        offset,
        key: stored.key,
        value,
    })
}

impl LogTransport for FileLog {
    fn create_topic(&self, topic: &str, partitions: u32) -> Result<()> {
        if partitions == 0 {
            return Err(VoxparseError::Transport {
                message: format!("topic '{}' needs at least one partition", topic),
            });
        }
        if count_partitions(&self.root, topic).is_ok() {
            return Ok(());
        }
        fs::create_dir_all(topic_dir(&self.root, topic))?;
        for partition in 0..partitions {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(partition_path(&self.root, topic, partition))?;
        }
        Ok(())
    }

    fn partitions(&self, topic: &str) -> Result<u32> {
        count_partitions(&self.root, topic)
    }

    fn open_reader(
        &self,
        topic: &str,
        partition: u32,
        group: &str,
    ) -> Result<Box<dyn PartitionReader>> {
        if partition >= count_partitions(&self.root, topic)? {
            return Err(VoxparseError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            });
        }
        let start = self.committed(group, topic, partition)?;
        let file = File::open(partition_path(&self.root, topic, partition))?;
        let mut reader = FileReader {
            topic: topic.to_string(),
            partition,
            reader: BufReader::new(file),
            next_offset: 0,
            pending: Vec::new(),
        };
        reader.skip_to(start)?;
        Ok(Box::new(reader))
    }

    fn writer(&self) -> Arc<dyn LogWriter> {
        self.writer.clone()
    }

    fn commit(&self, group: &str, topic: &str, partition: u32, next_offset: u64) -> Result<()> {
        let path = offset_path(&self.root, topic, partition, group);
        let tmp = path.with_extension("offset.tmp");
        fs::write(&tmp, next_offset.to_string())?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn committed(&self, group: &str, topic: &str, partition: u32) -> Result<u64> {
        let path = offset_path(&self.root, topic, partition, group);
        match fs::read_to_string(&path) {
            Ok(contents) => contents
                .trim()
                .parse()
                .map_err(|_| VoxparseError::Transport {
                    message: format!("corrupt offset file {}", path.display()),
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        format!("file:{}", self.root.display())
    }
}

/// Appending writer shared by every partition worker.
#[derive(Debug)]
struct FileWriter {
    root: PathBuf,
    files: Mutex<HashMap<PathBuf, File>>,
}

impl FileWriter {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            files: Mutex::new(HashMap::new()),
        }
    }
}

impl LogWriter for FileWriter {
    fn send(&self, topic: &str, key: &str, value: &[u8]) -> Result<()> {
        let partition = partition_for_key(key, count_partitions(&self.root, topic)?);
        let path = partition_path(&self.root, topic, partition);
        let line = encode_line(Some(key), value)?;

        let mut files = self.files.lock().map_err(|_| VoxparseError::Transport {
            message: "file writer lock poisoned".to_string(),
        })?;
        let file = match files.entry(path) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let file = OpenOptions::new().append(true).open(entry.key())?;
                entry.insert(file)
            }
        };
        file.write_all(&line)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let files = self.files.lock().map_err(|_| VoxparseError::Transport {
            message: "file writer lock poisoned".to_string(),
        })?;
        for file in files.values() {
            file.sync_data()?;
        }
        Ok(())
    }
}

struct FileReader {
    topic: String,
    partition: u32,
    reader: BufReader<File>,
    next_offset: u64,
    /// Bytes of a line whose newline has not been written yet.
    pending: Vec<u8>,
}

impl FileReader {
    /// Reads one complete line if available.
    fn read_complete_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.reader.read_until(b'\n', &mut self.pending)?;
        if self.pending.last() == Some(&b'\n') {
            let mut line = std::mem::take(&mut self.pending);
            line.pop();
            Ok(Some(line))
        } else {
            Ok(None)
        }
    }

    fn skip_to(&mut self, offset: u64) -> Result<()> {
        while self.next_offset < offset {
            if self.read_complete_line()?.is_none() {
                return Err(VoxparseError::Transport {
                    message: format!(
                        "committed offset {} is past the end of {}/{}",
                        offset, self.topic, self.partition
                    ),
                });
            }
            self.next_offset += 1;
        }
        Ok(())
    }
}

impl PartitionReader for FileReader {
    fn poll(&mut self, timeout: Duration) -> Result<Option<LogRecord>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(line) = self.read_complete_line()? {
                let offset = self.next_offset;
                self.next_offset += 1;
                // Unreadable lines keep their offset and travel on as raw bytes,
                // so the pipeline reports them as malformed
                let record = decode_line(&line, &self.topic, self.partition, offset)
                    .unwrap_or_else(|e| {
                        tracing::warn!("{}", e);
                        LogRecord {
                            topic: self.topic.clone(),
                            partition: self.partition,
                            offset,
                            key: None,
                            value: line,
                        }
                    });
                return Ok(Some(record));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(TAIL_INTERVAL.min(deadline - now));
        }
    }

    fn partition(&self) -> u32 {
        self.partition
    }
}
