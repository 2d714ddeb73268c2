//! Translation capability.

#[cfg(feature = "http")]
pub mod http;
pub mod translator;

#[cfg(feature = "http")]
pub use http::HttpTranslator;
pub use translator::{MockTranslator, Translator};

use crate::config::{CapabilityBackend, CapabilityConfig};
use crate::error::{Result, VoxparseError};
use std::sync::Arc;

/// Builds the translator selected by configuration, producing `target_language`.
pub fn build_translator(
    config: &CapabilityConfig,
    target_language: &str,
) -> Result<Arc<dyn Translator>> {
    match config.backend {
        CapabilityBackend::Mock => Ok(Arc::new(MockTranslator::demo(target_language))),
        #[cfg(feature = "http")]
        CapabilityBackend::Http => {
            let url = config
                .endpoint
                .as_deref()
                .ok_or_else(|| VoxparseError::ConfigInvalidValue {
                    key: "translator.endpoint".to_string(),
                    message: "required for the http backend".to_string(),
                })?;
            let timeout = std::time::Duration::from_millis(config.timeout_ms);
            Ok(Arc::new(HttpTranslator::new(url, target_language, timeout)?))
        }
        #[cfg(not(feature = "http"))]
        CapabilityBackend::Http => Err(VoxparseError::ConfigInvalidValue {
            key: "translator.backend".to_string(),
            message: "built without the `http` feature".to_string(),
        }),
    }
}
