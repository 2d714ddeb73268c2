//! Partition workers from startup until shutdown.
//!
//! Each input partition gets its own chain of threads:
//! reader → [`TopologyStation`] → [`DeliveryStation`] → tally.
//! The tally thread acknowledges every committed record back to the reader,
//! and the reader hands over the next record only after that acknowledgement.
//! A partition therefore has at most one record in flight, processed in
//! offset order, while partitions proceed independently.

use crate::config::{Config, TopicsConfig, TopologyConfig};
use crate::error::Result;
use crate::pipeline::delivery_station::DeliveryStation;
use crate::pipeline::error::{ErrorReporter, FailureLatch, LogReporter, StationError, StationFailure};
use crate::pipeline::station::StationRunner;
use crate::pipeline::topology::Topology;
use crate::pipeline::topology_station::TopologyStation;
use crate::pipeline::types::{PartitionStats, Receipt};
use crate::stt::SpeechToText;
use crate::translate::Translator;
use crate::transport::{LogRecord, LogTransport, PartitionReader};
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Reader errors in a row before a partition gives up.
const MAX_CONSECUTIVE_POLL_ERRORS: u32 = 10;

/// Configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub topology: TopologyConfig,
    pub topics: TopicsConfig,
    /// Consumer group used for offset commits
    pub group_id: String,
    /// How long a reader waits before re-checking for shutdown
    pub poll_interval: Duration,
    /// Channel buffer size between stations
    pub channel_buffer: usize,
    /// Upper bound on the wait for workers in `stop`
    pub shutdown_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            topology: config.topology.clone(),
            topics: config.topics.clone(),
            group_id: config.transport.group_id.clone(),
            poll_interval: Duration::from_millis(config.transport.poll_interval_ms),
            channel_buffer: config.transport.channel_buffer.max(1),
            shutdown_timeout: Duration::from_millis(config.transport.shutdown_timeout_ms),
        }
    }
}

/// Summary returned by [`PipelineHandle::stop`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    /// Committed-record tallies keyed by input partition.
    pub partitions: BTreeMap<u32, PartitionStats>,
    /// Fatal failures, each of which halted one partition.
    pub failures: Vec<StationFailure>,
    /// Threads that did not finish before the shutdown deadline.
    pub detached_threads: usize,
}

impl PipelineReport {
    /// True when no partition halted and every thread finished.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.detached_threads == 0
    }

    /// Totals across partitions.
    pub fn totals(&self) -> PartitionStats {
        self.partitions
            .values()
            .fold(PartitionStats::default(), |mut acc, stats| {
                acc.dropped += stats.dropped;
                acc.unrecognized += stats.unrecognized;
                acc.recognized += stats.recognized;
                acc.translated += stats.translated;
                acc.malformed += stats.malformed;
                acc.last_offset = acc.last_offset.max(stats.last_offset);
                acc
            })
    }
}

type SharedStats = Arc<Mutex<BTreeMap<u32, PartitionStats>>>;

/// Handle to a running pipeline.
pub struct PipelineHandle {
    running: Arc<AtomicBool>,
    /// One flag per partition, cleared when its worker chain ends
    active: Vec<Arc<AtomicBool>>,
    threads: Vec<JoinHandle<()>>,
    stats: SharedStats,
    latch: Arc<FailureLatch>,
    shutdown_timeout: Duration,
}

impl PipelineHandle {
    /// Stops pulling new records, lets the in-flight one finish, and reports.
    ///
    /// Threads still running after the shutdown timeout are detached; their
    /// records stay uncommitted and will be read again on the next start.
    pub fn stop(mut self) -> PipelineReport {
        self.running.store(false, Ordering::SeqCst);

        let deadline = Instant::now() + self.shutdown_timeout;
        let poll_interval = Duration::from_millis(20);

        loop {
            let mut remaining = Vec::new();
            for handle in self.threads.drain(..) {
                if handle.is_finished() {
                    if let Err(panic_info) = handle.join() {
                        let msg = panic_info
                            .downcast_ref::<&str>()
                            .copied()
                            .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                            .unwrap_or("unknown panic");
                        tracing::error!("pipeline thread panicked: {}", msg);
                    }
                } else {
                    remaining.push(handle);
                }
            }
            self.threads = remaining;

            if self.threads.is_empty() || Instant::now() >= deadline {
                break;
            }
            thread::sleep(poll_interval);
        }

        if !self.threads.is_empty() {
            tracing::warn!(
                "shutdown timeout: {} thread(s) still running, detaching",
                self.threads.len()
            );
        }

        PipelineReport {
            partitions: self.stats(),
            failures: self.latch.failures(),
            detached_threads: self.threads.len(),
        }
    }

    /// Returns true until `stop` is called.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns true once every partition worker has ended.
    pub fn is_finished(&self) -> bool {
        self.active.iter().all(|flag| !flag.load(Ordering::SeqCst))
    }

    /// Partitions whose worker chain has ended (halted or stopped).
    pub fn halted_partitions(&self) -> Vec<u32> {
        self.active
            .iter()
            .enumerate()
            .filter(|(_, flag)| !flag.load(Ordering::SeqCst))
            .map(|(partition, _)| partition as u32)
            .collect()
    }

    /// Fatal failures reported so far.
    pub fn failures(&self) -> Vec<StationFailure> {
        self.latch.failures()
    }

    /// Snapshot of the committed-record tallies.
    pub fn stats(&self) -> BTreeMap<u32, PartitionStats> {
        match self.stats.lock() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Voice command pipeline over a partitioned log.
pub struct Pipeline {
    config: PipelineConfig,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl Pipeline {
    /// Creates a new pipeline with the default error reporter.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            error_reporter: Arc::new(LogReporter),
        }
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Starts one worker chain per input partition.
    ///
    /// Fails without starting anything if the input or an output topic does
    /// not exist or a partition cannot be opened.
    pub fn start(
        self,
        transport: Arc<dyn LogTransport>,
        recognizer: Arc<dyn SpeechToText>,
        translator: Arc<dyn Translator>,
    ) -> Result<PipelineHandle> {
        let topics = &self.config.topics;
        let partitions = transport.partitions(&topics.input)?;
        for output in topics.outputs() {
            transport.partitions(output)?;
        }

        let mut readers = Vec::with_capacity(partitions as usize);
        for partition in 0..partitions {
            readers.push(transport.open_reader(&topics.input, partition, &self.config.group_id)?);
        }

        let topology = Arc::new(Topology::new(&self.config.topology, recognizer, translator));
        tracing::info!(
            input = %topics.input,
            partitions,
            transport = %transport.describe(),
            backends = %topology.backends(),
            threshold = topology.confidence_threshold(),
            target = topology.target_language(),
            "pipeline starting"
        );

        let running = Arc::new(AtomicBool::new(true));
        let stats: SharedStats = Arc::new(Mutex::new(BTreeMap::new()));
        let latch = Arc::new(FailureLatch::new(self.error_reporter.clone()));
        let reporter: Arc<dyn ErrorReporter> = latch.clone();

        let mut threads = Vec::new();
        let mut active = Vec::new();

        for reader in readers {
            let partition = reader.partition();
            let flag = Arc::new(AtomicBool::new(true));

            let (record_tx, record_rx) = bounded(self.config.channel_buffer);
            let (delivery_tx, delivery_rx) = bounded(self.config.channel_buffer);
            let (receipt_tx, receipt_rx) = bounded::<Receipt>(self.config.channel_buffer);
            let (done_tx, done_rx) = bounded::<()>(1);

            let topology_runner = StationRunner::spawn_named(
                TopologyStation::new(topology.clone(), reporter.clone()),
                Some(format!("topology-{}", partition)),
                record_rx,
                delivery_tx,
                reporter.clone(),
            );
            let delivery_runner = StationRunner::spawn_named(
                DeliveryStation::new(
                    transport.clone(),
                    self.config.topics.clone(),
                    &self.config.group_id,
                ),
                Some(format!("delivery-{}", partition)),
                delivery_rx,
                receipt_tx,
                reporter.clone(),
            );

            threads.push(spawn_reader(
                reader,
                record_tx,
                done_rx,
                running.clone(),
                flag.clone(),
                reporter.clone(),
                self.config.poll_interval,
            ));

            // Tally receipts until the delivery station hangs up
            let tally_stats = stats.clone();
            threads.push(thread::spawn(move || {
                for receipt in receipt_rx.iter() {
                    match tally_stats.lock() {
                        Ok(mut stats) => stats.entry(receipt.partition).or_default().record(&receipt),
                        Err(poisoned) => poisoned
                            .into_inner()
                            .entry(receipt.partition)
                            .or_default()
                            .record(&receipt),
                    }
                    if done_tx.send(()).is_err() {
                        tracing::debug!(partition, "reader gone before acknowledgement");
                    }
                }
            }));

            let chain_flag = flag.clone();
            threads.push(thread::spawn(move || {
                if let Err(msg) = topology_runner.join() {
                    tracing::error!("{}", msg);
                }
                if let Err(msg) = delivery_runner.join() {
                    tracing::error!("{}", msg);
                }
                chain_flag.store(false, Ordering::SeqCst);
                tracing::info!(partition, "partition worker stopped");
            }));

            active.push(flag);
        }

        Ok(PipelineHandle {
            running,
            active,
            threads,
            stats,
            latch,
            shutdown_timeout: self.config.shutdown_timeout,
        })
    }
}

/// Polls one partition and feeds its records to the topology station, one
/// at a time: each record must be acknowledged on `done_rx` before the next
/// is polled.
///
/// Stops on shutdown, when the downstream chain has ended, or after too many
/// consecutive poll errors. Dropping `record_tx` lets the stations finish the
/// record in flight and exit; nothing after it has been handed over, so the
/// uncommitted rest is read again on the next start.
fn spawn_reader(
    mut reader: Box<dyn PartitionReader>,
    record_tx: Sender<LogRecord>,
    done_rx: Receiver<()>,
    running: Arc<AtomicBool>,
    chain_active: Arc<AtomicBool>,
    error_reporter: Arc<dyn ErrorReporter>,
    poll_interval: Duration,
) -> JoinHandle<()> {
    let keep_going = move || running.load(Ordering::SeqCst) && chain_active.load(Ordering::SeqCst);

    thread::spawn(move || {
        let partition = reader.partition();
        let mut consecutive_errors: u32 = 0;

        'poll: while keep_going() {
            let mut record = match reader.poll(poll_interval) {
                Ok(Some(record)) => {
                    consecutive_errors = 0;
                    record
                }
                Ok(None) => continue,
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_CONSECUTIVE_POLL_ERRORS {
                        error_reporter.report(
                            "reader",
                            &StationError::Fatal(format!(
                                "partition {}: {} poll errors in a row, last: {}",
                                partition, consecutive_errors, e
                            )),
                        );
                        break;
                    }
                    tracing::warn!(partition, "poll failed: {}", e);
                    thread::sleep(poll_interval);
                    continue;
                }
            };

            loop {
                match record_tx.send_timeout(record, poll_interval) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Timeout(unsent)) => {
                        if !keep_going() {
                            break 'poll;
                        }
                        record = unsent;
                    }
                    Err(SendTimeoutError::Disconnected(_)) => break 'poll,
                }
            }

            loop {
                match done_rx.recv_timeout(poll_interval) {
                    Ok(()) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        if !keep_going() {
                            break 'poll;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break 'poll,
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_command;
    use crate::model::VoiceCommand;
    use crate::stt::{MockRecognition, MockRecognizer};
    use crate::translate::MockTranslator;
    use crate::transport::MemoryLog;

    fn config() -> PipelineConfig {
        PipelineConfig {
            poll_interval: Duration::from_millis(10),
            shutdown_timeout: Duration::from_secs(5),
            ..PipelineConfig::default()
        }
    }

    fn log(partitions: u32) -> MemoryLog {
        MemoryLog::new()
            .with_topic("voice-commands", partitions)
            .unwrap()
            .with_topic("recognized-commands", partitions)
            .unwrap()
            .with_topic("unrecognized-commands", partitions)
            .unwrap()
    }

    fn produce(log: &MemoryLog, id: &str, audio_len: usize, language: &str) {
        let command = VoiceCommand::new(id, vec![3; audio_len], "FLAC", language);
        log.append("voice-commands", id, &encode_command(&command).unwrap())
            .unwrap();
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met within 5s");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_pipeline_config_from_config() {
        let mut config = Config::default();
        config.transport.poll_interval_ms = 250;
        config.transport.group_id = "routers".to_string();

        let pipeline_config = PipelineConfig::from(&config);
        assert_eq!(pipeline_config.poll_interval, Duration::from_millis(250));
        assert_eq!(pipeline_config.group_id, "routers");
        assert_eq!(pipeline_config.topics.input, "voice-commands");
    }

    #[test]
    fn test_start_fails_on_missing_input_topic() {
        let log = MemoryLog::new();
        let result = Pipeline::new(config()).start(
            Arc::new(log),
            Arc::new(MockRecognizer::new()),
            Arc::new(MockTranslator::new("en")),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_start_fails_on_missing_output_topic() {
        let log = MemoryLog::new().with_topic("voice-commands", 1).unwrap();
        let result = Pipeline::new(config()).start(
            Arc::new(log),
            Arc::new(MockRecognizer::new()),
            Arc::new(MockTranslator::new("en")),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_pipeline_routes_and_commits() {
        let log = log(2);
        produce(&log, "X", 20, "en-US");
        produce(&log, "Z", 20, "en-US");
        produce(&log, "short", 4, "en-US");

        let recognizer = MockRecognizer::new()
            .with_default("call John", 0.30)
            .with_script("X", MockRecognition::new("call John", 0.98));
        let handle = Pipeline::new(config())
            .start(
                Arc::new(log.clone()),
                Arc::new(recognizer),
                Arc::new(MockTranslator::new("en")),
            )
            .unwrap();

        wait_for(|| {
            handle
                .stats()
                .values()
                .map(PartitionStats::committed)
                .sum::<u64>()
                == 3
        });
        assert!(handle.is_running());
        let report = handle.stop();

        assert!(report.is_clean(), "{:?}", report);
        let totals = report.totals();
        assert_eq!(totals.recognized, 1);
        assert_eq!(totals.unrecognized, 1);
        assert_eq!(totals.dropped, 1);
        assert_eq!(log.records("recognized-commands").unwrap().len(), 1);
        assert_eq!(log.records("unrecognized-commands").unwrap().len(), 1);
    }

    #[test]
    fn test_fatal_failure_halts_partition() {
        let log = log(1);
        produce(&log, "X", 20, "en-US");

        let handle = Pipeline::new(config())
            .start(
                Arc::new(log.clone()),
                Arc::new(MockRecognizer::new().with_failure()),
                Arc::new(MockTranslator::new("en")),
            )
            .unwrap();

        wait_for(|| handle.is_finished());
        assert_eq!(handle.halted_partitions(), vec![0]);
        let report = handle.stop();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].station, "topology");
        assert!(!report.is_clean());
        assert_eq!(log.committed("voxparse", "voice-commands", 0).unwrap(), 0);
    }

    #[test]
    fn test_report_totals_merge_partitions() {
        let mut report = PipelineReport::default();
        report.partitions.insert(
            0,
            PartitionStats {
                recognized: 2,
                last_offset: Some(4),
                ..PartitionStats::default()
            },
        );
        report.partitions.insert(
            1,
            PartitionStats {
                malformed: 1,
                last_offset: Some(9),
                ..PartitionStats::default()
            },
        );

        let totals = report.totals();
        assert_eq!(totals.committed(), 3);
        assert_eq!(totals.last_offset, Some(9));
        assert!(report.is_clean());
    }
}
