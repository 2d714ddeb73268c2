//! Speech-to-text capability.

#[cfg(feature = "http")]
pub mod http;
pub mod recognizer;

#[cfg(feature = "http")]
pub use http::HttpRecognizer;
pub use recognizer::{MockRecognition, MockRecognizer, SpeechToText};

use crate::config::{CapabilityBackend, CapabilityConfig};
use crate::error::{Result, VoxparseError};
use std::sync::Arc;

/// Builds the recognizer selected by configuration.
pub fn build_recognizer(config: &CapabilityConfig) -> Result<Arc<dyn SpeechToText>> {
    match config.backend {
        CapabilityBackend::Mock => Ok(Arc::new(MockRecognizer::demo())),
        #[cfg(feature = "http")]
        CapabilityBackend::Http => {
            let url = config
                .endpoint
                .as_deref()
                .ok_or_else(|| VoxparseError::ConfigInvalidValue {
                    key: "recognizer.endpoint".to_string(),
                    message: "required for the http backend".to_string(),
                })?;
            let timeout = std::time::Duration::from_millis(config.timeout_ms);
            Ok(Arc::new(HttpRecognizer::new(url, timeout)?))
        }
        #[cfg(not(feature = "http"))]
        CapabilityBackend::Http => Err(VoxparseError::ConfigInvalidValue {
            key: "recognizer.backend".to_string(),
            message: "built without the `http` feature".to_string(),
        }),
    }
}
