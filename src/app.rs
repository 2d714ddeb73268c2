//! Service entry points behind the `voxparse` subcommands.
//!
//! Composition root: wires configuration, the file-backed log, the
//! capabilities and the pipeline together.

use crate::codec;
use crate::config::{Config, TopicsConfig};
use crate::error::{Result, VoxparseError};
use crate::model::VoiceCommand;
use crate::pipeline::{Pipeline, PipelineConfig, PipelineHandle, PipelineReport};
use crate::stt::build_recognizer;
use crate::translate::build_translator;
use crate::transport::{FileLog, LogRecord, LogTransport, PartitionReader};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often `run` checks whether every partition has halted.
const FINISHED_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Opens the file-backed log named by the configuration.
pub fn open_log(config: &Config) -> Result<FileLog> {
    FileLog::open(&config.transport.log_dir)
}

/// Creates the input, output and dead-letter topics. Existing topics are kept.
///
/// Returns the names of all topics with their partition counts.
pub fn create_topics(
    transport: &dyn LogTransport,
    topics: &TopicsConfig,
    partitions: u32,
) -> Result<Vec<(String, u32)>> {
    let mut names = vec![topics.input.as_str()];
    names.extend(topics.outputs());

    let mut created = Vec::with_capacity(names.len());
    for name in names {
        transport.create_topic(name, partitions)?;
        created.push((name.to_string(), transport.partitions(name)?));
    }
    Ok(created)
}

/// Runs the router until Ctrl+C or until every partition has halted.
///
/// Startup problems (log directory missing, topic missing, capability
/// misconfigured) are returned as errors before any record is read.
pub async fn run_service(config: Config, create_missing_topics: bool) -> Result<PipelineReport> {
    // The blocking HTTP clients must be built off the async runtime
    let handle = tokio::task::spawn_blocking(move || start_pipeline(&config, create_missing_topics))
        .await
        .map_err(|e| VoxparseError::Other(format!("startup task failed: {}", e)))??;

    let finished = async {
        while !handle.is_finished() {
            tokio::time::sleep(FINISHED_CHECK_INTERVAL).await;
        }
    };

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::error!("failed to wait for Ctrl+C: {}", e);
            }
            tracing::info!("shutting down");
        }
        _ = finished => {
            tracing::warn!("every partition has halted");
        }
    }

    tokio::task::spawn_blocking(move || handle.stop())
        .await
        .map_err(|e| VoxparseError::Other(format!("shutdown task failed: {}", e)))
}

fn start_pipeline(config: &Config, create_missing_topics: bool) -> Result<PipelineHandle> {
    config.validate()?;

    let log = if create_missing_topics {
        let log = FileLog::create(&config.transport.log_dir)?;
        create_topics(&log, &config.topics, config.transport.partitions)?;
        log
    } else {
        open_log(config)?
    };
    let transport: Arc<dyn LogTransport> = Arc::new(log);

    let recognizer = build_recognizer(&config.recognizer)?;
    let translator = build_translator(&config.translator, &config.topology.target_language)?;

    Pipeline::new(PipelineConfig::from(config)).start(transport, recognizer, translator)
}

/// Appends every command of a JSON array file to `topic`, keyed by id.
pub fn produce_file(transport: &dyn LogTransport, topic: &str, path: &Path) -> Result<usize> {
    let contents = std::fs::read(path)?;
    let commands: Vec<VoiceCommand> =
        serde_json::from_slice(&contents).map_err(|e| VoxparseError::Decode {
            message: format!("{}: {}", path.display(), e),
        })?;
    produce(transport, topic, &commands)
}

/// Appends `commands` to `topic`, keyed by id.
pub fn produce(transport: &dyn LogTransport, topic: &str, commands: &[VoiceCommand]) -> Result<usize> {
    transport.partitions(topic)?;
    let writer = transport.writer();
    for command in commands {
        writer.send(topic, &command.id, &codec::encode_command(command)?)?;
    }
    writer.flush()?;
    Ok(commands.len())
}

/// Options for [`consume`].
#[derive(Debug, Clone)]
pub struct ConsumeOptions {
    /// Consumer group whose committed offsets position the readers.
    pub group: String,
    /// Keep reading forever instead of stopping when idle.
    pub follow: bool,
    /// Without `follow`, stop once nothing arrived for this long.
    pub idle: Duration,
    /// Commit what was read, so the next run continues after it.
    pub commit: bool,
}

impl Default for ConsumeOptions {
    fn default() -> Self {
        Self {
            group: "voxparse-console".to_string(),
            follow: false,
            idle: Duration::from_secs(1),
            commit: false,
        }
    }
}

/// Reads `topics` and hands every record to `on_record`. Returns the record count.
pub fn consume(
    transport: &dyn LogTransport,
    topics: &[String],
    options: &ConsumeOptions,
    mut on_record: impl FnMut(&LogRecord),
) -> Result<usize> {
    let mut readers: Vec<(String, Box<dyn PartitionReader>)> = Vec::new();
    for topic in topics {
        for partition in 0..transport.partitions(topic)? {
            readers.push((
                topic.clone(),
                transport.open_reader(topic, partition, &options.group)?,
            ));
        }
    }

    let poll = Duration::from_millis(20);
    let mut count = 0;
    let mut last_activity = Instant::now();

    loop {
        let mut got_any = false;
        for (topic, reader) in readers.iter_mut() {
            while let Some(record) = reader.poll(Duration::ZERO)? {
                on_record(&record);
                if options.commit {
                    transport.commit(&options.group, topic, record.partition, record.offset + 1)?;
                }
                count += 1;
                got_any = true;
            }
        }

        if got_any {
            last_activity = Instant::now();
        } else if !options.follow && last_activity.elapsed() >= options.idle {
            break;
        } else {
            std::thread::sleep(poll);
        }
    }

    Ok(count)
}

/// Configuration rendered as TOML.
pub fn render_config(config: &Config) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| VoxparseError::Other(e.to_string()))
}
