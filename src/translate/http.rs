//! Translation over a JSON HTTP service.

use crate::error::{Result, VoxparseError};
use crate::http::JsonEndpoint;
use crate::model::ParsedVoiceCommand;
use crate::translate::translator::Translator;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslationRequest<'a> {
    command: &'a ParsedVoiceCommand,
    target_language: &'a str,
}

/// Translator backed by a remote service.
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    endpoint: JsonEndpoint,
    target_language: String,
}

impl HttpTranslator {
    pub fn new(url: &str, target_language: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: JsonEndpoint::new(url, timeout)?,
            target_language: target_language.to_string(),
        })
    }
}

impl Translator for HttpTranslator {
    fn translate(&self, command: &ParsedVoiceCommand) -> Result<ParsedVoiceCommand> {
        let request = TranslationRequest {
            command,
            target_language: &self.target_language,
        };
        self.endpoint
            .post(&request)
            .map_err(|e| VoxparseError::Translation {
                id: command.id.clone(),
                message: format!("{} ({})", e, self.endpoint.url()),
            })
    }

    fn name(&self) -> &str {
        "http"
    }
}
