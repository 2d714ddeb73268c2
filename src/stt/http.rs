//! Speech-to-text over a JSON HTTP service.
//!
//! The request body is the inbound command in its wire format; the service
//! answers with a parsed command.

use crate::error::{Result, VoxparseError};
use crate::http::JsonEndpoint;
use crate::model::{ParsedVoiceCommand, VoiceCommand};
use crate::stt::recognizer::SpeechToText;
use std::time::Duration;

/// Recognizer backed by a remote service.
#[derive(Debug, Clone)]
pub struct HttpRecognizer {
    endpoint: JsonEndpoint,
}

impl HttpRecognizer {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: JsonEndpoint::new(url, timeout)?,
        })
    }
}

impl SpeechToText for HttpRecognizer {
    fn speech_to_text(&self, command: &VoiceCommand) -> Result<ParsedVoiceCommand> {
        self.endpoint
            .post(command)
            .map_err(|e| VoxparseError::Recognition {
                id: command.id.clone(),
                message: format!("{} ({})", e, self.endpoint.url()),
            })
    }

    fn name(&self) -> &str {
        "http"
    }
}
