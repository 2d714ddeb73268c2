//! Default configuration constants for voxparse.
//!
//! Shared by the config layer, the topology and the CLI so the same
//! values are never spelled twice.

/// Input topic carrying inbound voice commands.
pub const VOICE_COMMANDS_TOPIC: &str = "voice-commands";

/// Output topic for commands that passed the confidence gate.
pub const RECOGNIZED_COMMANDS_TOPIC: &str = "recognized-commands";

/// Output topic for commands that failed the confidence gate.
pub const UNRECOGNIZED_COMMANDS_TOPIC: &str = "unrecognized-commands";

/// Default confidence threshold (exclusive lower bound for "confident").
pub const CONFIDENCE_THRESHOLD: f64 = 0.90;

/// Default target-language prefix. Matches regional variants such as `en-US`.
pub const TARGET_LANGUAGE: &str = "en";

/// Audio payloads of this many bytes or fewer are treated as noise and dropped.
pub const MIN_AUDIO_BYTES: usize = 10;

/// Default consumer group used for offset commits.
pub const GROUP_ID: &str = "voxparse";

/// Default directory of the file-backed log.
pub const LOG_DIR: &str = "voxparse-log";

/// Default number of partitions when creating topics.
pub const PARTITIONS: u32 = 3;

/// How long a partition reader waits for a new record before re-checking shutdown.
pub const POLL_INTERVAL_MS: u64 = 100;

/// Bounded channel capacity between stations of one partition.
pub const CHANNEL_BUFFER: usize = 16;

/// Timeout for a single recognition or translation request.
pub const CAPABILITY_TIMEOUT_MS: u64 = 10_000;

/// Upper bound on how long shutdown waits for partition workers.
pub const SHUTDOWN_TIMEOUT_MS: u64 = 5_000;
