//! The transforming stages of the topology.

use crate::error::{Result, VoxparseError};
use crate::model::{ParsedVoiceCommand, VoiceCommand};
use crate::pipeline::gates::LanguageGate;
use crate::stt::SpeechToText;
use crate::translate::Translator;
use std::sync::Arc;

/// Drops commands whose audio is too short to hold speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthFilter {
    min_bytes: usize,
}

impl LengthFilter {
    /// Passes payloads strictly longer than `min_bytes`.
    pub fn new(min_bytes: usize) -> Self {
        Self { min_bytes }
    }

    pub fn passes(&self, command: &VoiceCommand) -> bool {
        command.audio.len() > self.min_bytes
    }
}

/// Runs speech-to-text and normalizes the result against the inbound command.
pub struct RecognitionStage {
    recognizer: Arc<dyn SpeechToText>,
}

impl RecognitionStage {
    pub fn new(recognizer: Arc<dyn SpeechToText>) -> Self {
        Self { recognizer }
    }

    /// One outbound record for `command`.
    ///
    /// Text and confidence come from the recognizer; id, language and codec
    /// always come from the inbound command.
    pub fn recognize(&self, command: &VoiceCommand) -> Result<ParsedVoiceCommand> {
        let recognized = self.recognizer.speech_to_text(command)?;
        Ok(ParsedVoiceCommand {
            id: command.id.clone(),
            text: recognized.text,
            audio_codec: Some(command.audio_codec.clone()),
            language: command.language.clone(),
            confidence: recognized.confidence,
        })
    }

    pub fn backend(&self) -> &str {
        self.recognizer.name()
    }
}

/// Translates a confident command into the target language.
pub struct TranslationStage {
    translator: Arc<dyn Translator>,
    target: LanguageGate,
    verify_language: bool,
}

impl TranslationStage {
    pub fn new(translator: Arc<dyn Translator>, target: LanguageGate, verify_language: bool) -> Self {
        Self {
            translator,
            target,
            verify_language,
        }
    }

    /// Replacement record for `command`.
    ///
    /// Only text and language are taken from the translator. When verification
    /// is on, a result outside the target language is an error.
    pub fn translate(&self, command: &ParsedVoiceCommand) -> Result<ParsedVoiceCommand> {
        let translated = self.translator.translate(command)?;

        if self.verify_language && !self.target.matches(&translated.language) {
            return Err(VoxparseError::TranslationLanguageMismatch {
                id: command.id.clone(),
                expected: self.target.target().to_string(),
                actual: translated.language,
            });
        }

        Ok(ParsedVoiceCommand {
            id: command.id.clone(),
            text: translated.text,
            audio_codec: command.audio_codec.clone(),
            language: translated.language,
            confidence: command.confidence,
        })
    }

    pub fn backend(&self) -> &str {
        self.translator.name()
    }
}
