use crate::error::{Result, VoxparseError};
use crate::model::{ParsedVoiceCommand, VoiceCommand};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for the external speech-to-text capability.
///
/// This trait allows swapping implementations (network service vs mock).
/// Calls block the calling partition worker until a result is available.
pub trait SpeechToText: Send + Sync {
    /// Recognize the audio of `command`.
    ///
    /// # Returns
    /// The recognized record, or an error if the capability could not
    /// produce a result. There is no degraded fallback.
    fn speech_to_text(&self, command: &VoiceCommand) -> Result<ParsedVoiceCommand>;

    /// Name of the backend, for logs.
    fn name(&self) -> &str;
}

/// Implement SpeechToText for Arc<T> so one recognizer can be shared by every partition.
impl<T: SpeechToText + ?Sized> SpeechToText for Arc<T> {
    fn speech_to_text(&self, command: &VoiceCommand) -> Result<ParsedVoiceCommand> {
        (**self).speech_to_text(command)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Scripted recognition result for the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct MockRecognition {
    pub text: String,
    pub confidence: f64,
}

impl MockRecognition {
    pub fn new(text: &str, confidence: f64) -> Self {
        Self {
            text: text.to_string(),
            confidence,
        }
    }
}

/// Deterministic recognizer for tests and offline runs.
///
/// Returns a scripted result per command id, or the default result.
#[derive(Debug)]
pub struct MockRecognizer {
    default: MockRecognition,
    scripted: HashMap<String, MockRecognition>,
    failing_ids: Vec<String>,
    should_fail: bool,
    fail_first: usize,
    calls: AtomicUsize,
}

impl MockRecognizer {
    /// Create a mock that recognizes everything as "mock transcription" with confidence 1.0
    pub fn new() -> Self {
        Self {
            default: MockRecognition::new("mock transcription", 1.0),
            scripted: HashMap::new(),
            failing_ids: Vec::new(),
            should_fail: false,
            fail_first: 0,
            calls: AtomicUsize::new(0),
        }
    }

    /// The script used by `voxparse run` with the mock backend: two known
    /// commands are recognized confidently, everything else is not.
    pub fn demo() -> Self {
        Self::new()
            .with_default("call John", 0.37)
            .with_script(
                "26679943-f55e-4731-986e-c5c5395715de",
                MockRecognition::new("call John", 0.957),
            )
            .with_script(
                "9821f112-ec35-4679-91e7-c558de479bc5",
                MockRecognition::new("llamar a Juan", 0.937),
            )
    }

    /// Result for ids without a script
    pub fn with_default(mut self, text: &str, confidence: f64) -> Self {
        self.default = MockRecognition::new(text, confidence);
        self
    }

    /// Result for one specific id
    pub fn with_script(mut self, id: &str, result: MockRecognition) -> Self {
        self.scripted.insert(id.to_string(), result);
        self
    }

    /// Fail every call
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Fail every call for one id
    pub fn with_failure_for(mut self, id: &str) -> Self {
        self.failing_ids.push(id.to_string());
        self
    }

    /// Fail the first `n` calls, then behave normally
    pub fn with_failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    /// Number of times `speech_to_text` was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechToText for MockRecognizer {
    fn speech_to_text(&self, command: &VoiceCommand) -> Result<ParsedVoiceCommand> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if self.should_fail || call < self.fail_first || self.failing_ids.contains(&command.id) {
            return Err(VoxparseError::Recognition {
                id: command.id.clone(),
                message: "mock recognition failure".to_string(),
            });
        }

        let result = self.scripted.get(&command.id).unwrap_or(&self.default);
        Ok(ParsedVoiceCommand::new(
            command.id.clone(),
            result.text.clone(),
            command.language.clone(),
            result.confidence,
        ))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
