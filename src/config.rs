use crate::defaults;
use crate::error::{Result, VoxparseError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub topology: TopologyConfig,
    pub topics: TopicsConfig,
    pub transport: TransportConfig,
    pub recognizer: CapabilityConfig,
    pub translator: CapabilityConfig,
}

/// Routing parameters of the topology
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TopologyConfig {
    /// Exclusive lower bound: `confidence > threshold` is confident.
    pub confidence_threshold: f64,
    /// Language tag prefix that needs no translation.
    pub target_language: String,
    /// Payloads of this many bytes or fewer are dropped.
    pub min_audio_bytes: usize,
    /// Reject translations whose language tag does not match `target_language`.
    pub verify_translation_language: bool,
}

/// Topic names
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TopicsConfig {
    pub input: String,
    pub recognized: String,
    pub unrecognized: String,
    /// Malformed inbound records are copied here when set.
    pub dead_letter: Option<String>,
}

/// Log transport parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    pub log_dir: PathBuf,
    pub group_id: String,
    pub partitions: u32,
    pub poll_interval_ms: u64,
    pub channel_buffer: usize,
    pub shutdown_timeout_ms: u64,
}

/// External capability selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CapabilityConfig {
    pub backend: CapabilityBackend,
    /// Service URL for the `Http` backend.
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
}

/// Capability backend enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityBackend {
    Mock,
    Http,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: defaults::CONFIDENCE_THRESHOLD,
            target_language: defaults::TARGET_LANGUAGE.to_string(),
            min_audio_bytes: defaults::MIN_AUDIO_BYTES,
            verify_translation_language: true,
        }
    }
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            input: defaults::VOICE_COMMANDS_TOPIC.to_string(),
            recognized: defaults::RECOGNIZED_COMMANDS_TOPIC.to_string(),
            unrecognized: defaults::UNRECOGNIZED_COMMANDS_TOPIC.to_string(),
            dead_letter: None,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(defaults::LOG_DIR),
            group_id: defaults::GROUP_ID.to_string(),
            partitions: defaults::PARTITIONS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            channel_buffer: defaults::CHANNEL_BUFFER,
            shutdown_timeout_ms: defaults::SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            backend: CapabilityBackend::Mock,
            endpoint: None,
            timeout_ms: defaults::CAPABILITY_TIMEOUT_MS,
        }
    }
}

impl TopicsConfig {
    /// Every output topic this configuration writes to.
    pub fn outputs(&self) -> Vec<&str> {
        let mut topics = vec![self.recognized.as_str(), self.unrecognized.as_str()];
        if let Some(ref dlq) = self.dead_letter {
            topics.push(dlq.as_str());
        }
        topics
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VoxparseError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                VoxparseError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(VoxparseError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXPARSE_THRESHOLD → topology.confidence_threshold
    /// - VOXPARSE_TARGET_LANGUAGE → topology.target_language
    /// - VOXPARSE_LOG_DIR → transport.log_dir
    /// - VOXPARSE_GROUP_ID → transport.group_id
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(threshold) = std::env::var("VOXPARSE_THRESHOLD")
            && !threshold.is_empty()
        {
            self.topology.confidence_threshold =
                threshold
                    .parse()
                    .map_err(|_| VoxparseError::ConfigInvalidValue {
                        key: "VOXPARSE_THRESHOLD".to_string(),
                        message: format!("'{}' is not a number", threshold),
                    })?;
        }

        if let Ok(language) = std::env::var("VOXPARSE_TARGET_LANGUAGE")
            && !language.is_empty()
        {
            self.topology.target_language = language;
        }

        if let Ok(dir) = std::env::var("VOXPARSE_LOG_DIR")
            && !dir.is_empty()
        {
            self.transport.log_dir = PathBuf::from(dir);
        }

        if let Ok(group) = std::env::var("VOXPARSE_GROUP_ID")
            && !group.is_empty()
        {
            self.transport.group_id = group;
        }

        Ok(self)
    }

    /// Check values that TOML types alone cannot constrain.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> VoxparseError {
            VoxparseError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        if !self.topology.confidence_threshold.is_finite() {
            return Err(invalid("topology.confidence_threshold", "must be finite"));
        }
        if self.topology.target_language.trim().is_empty() {
            return Err(invalid("topology.target_language", "must not be empty"));
        }

        let mut names = vec![self.topics.input.as_str()];
        names.extend(self.topics.outputs());
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(invalid("topics", "topic names must not be empty"));
            }
            if names[..i].contains(name) {
                return Err(invalid(
                    "topics",
                    &format!("topic '{}' is used more than once", name),
                ));
            }
        }

        if self.transport.partitions == 0 {
            return Err(invalid("transport.partitions", "must be at least 1"));
        }
        if self.transport.channel_buffer == 0 {
            return Err(invalid("transport.channel_buffer", "must be at least 1"));
        }
        if self.transport.group_id.trim().is_empty() {
            return Err(invalid("transport.group_id", "must not be empty"));
        }

        for (key, capability) in [
            ("recognizer", &self.recognizer),
            ("translator", &self.translator),
        ] {
            if capability.backend == CapabilityBackend::Http && capability.endpoint.is_none() {
                return Err(invalid(
                    &format!("{}.endpoint", key),
                    "required for the http backend",
                ));
            }
        }

        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxparse/config.toml on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("voxparse").join("config.toml"))
    }
}
