//! voxparse - voice command router
//!
//! Reads voice commands from a partitioned log, recognizes them, splits on
//! confidence and language, translates where needed, and writes each one to
//! exactly one output topic.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod app;
#[cfg(feature = "cli")]
pub mod cli;
pub mod codec;
pub mod config;
pub mod defaults;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod model;
pub mod pipeline;
pub mod stt;
pub mod translate;
pub mod transport;

// Records
pub use model::{ParsedVoiceCommand, VoiceCommand};

// Capabilities
pub use stt::{MockRecognizer, SpeechToText};
pub use translate::{MockTranslator, Translator};

// Topology and runtime
pub use pipeline::orchestrator::{Pipeline, PipelineConfig, PipelineHandle, PipelineReport};
pub use pipeline::topology::Topology;
pub use pipeline::types::{LanguagePath, Outcome};

// Transport
pub use transport::{FileLog, LogTransport, MemoryLog};

// Error handling
pub use error::{Result, VoxparseError};

// Config
pub use config::Config;

// Station framework (for advanced users)
pub use pipeline::error::{ErrorReporter, StationError};
pub use pipeline::station::Station;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
