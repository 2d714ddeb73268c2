//! Error types for voxparse.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxparseError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Capability errors
    #[error("Speech recognition failed for {id}: {message}")]
    Recognition { id: String, message: String },

    #[error("Translation failed for {id}: {message}")]
    Translation { id: String, message: String },

    #[error("Translation of {id} produced language {actual}, expected prefix {expected}")]
    TranslationLanguageMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    // Codec errors
    #[error("Malformed record: {message}")]
    Decode { message: String },

    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    // Transport errors
    #[error("Log transport unavailable at {location}: {message}")]
    TransportUnavailable { location: String, message: String },

    #[error("Unknown topic: {topic}")]
    UnknownTopic { topic: String },

    #[error("Unknown partition {partition} for topic {topic}")]
    UnknownPartition { topic: String, partition: u32 },

    #[error("Log transport error: {message}")]
    Transport { message: String },

    // Network errors
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl VoxparseError {
    /// Returns true for failures of an external recognition or translation capability.
    pub fn is_capability_failure(&self) -> bool {
        matches!(
            self,
            VoxparseError::Recognition { .. }
                | VoxparseError::Translation { .. }
                | VoxparseError::TranslationLanguageMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, VoxparseError>;
