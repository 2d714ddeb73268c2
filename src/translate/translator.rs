use crate::error::{Result, VoxparseError};
use crate::model::ParsedVoiceCommand;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for the external translation capability.
///
/// This trait allows swapping implementations (network service vs mock).
pub trait Translator: Send + Sync {
    /// Translate a recognized command into the target language.
    fn translate(&self, command: &ParsedVoiceCommand) -> Result<ParsedVoiceCommand>;

    /// Name of the backend, for logs.
    fn name(&self) -> &str;
}

/// Implement Translator for Arc<T> so one translator can be shared by every partition.
impl<T: Translator + ?Sized> Translator for Arc<T> {
    fn translate(&self, command: &ParsedVoiceCommand) -> Result<ParsedVoiceCommand> {
        (**self).translate(command)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Deterministic translator for tests and offline runs.
///
/// Looks the text up in a phrase table; unknown phrases become the fixed
/// text when one is set, otherwise they pass through unchanged.
#[derive(Debug)]
pub struct MockTranslator {
    language: String,
    phrases: HashMap<String, String>,
    fixed_text: Option<String>,
    should_fail: bool,
    calls: AtomicUsize,
}

impl MockTranslator {
    /// Create a mock whose output is tagged with `language`
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            phrases: HashMap::new(),
            fixed_text: None,
            should_fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// The phrase table used by `voxparse run` with the mock backend
    pub fn demo(language: &str) -> Self {
        Self::new(language)
            .with_phrase("llamar a Juan", "call John")
            .with_phrase("llamar a casa", "call home")
    }

    /// Add a translation for one phrase
    pub fn with_phrase(mut self, source: &str, translated: &str) -> Self {
        self.phrases
            .insert(source.to_string(), translated.to_string());
        self
    }

    /// Translate every unknown phrase to `text`
    pub fn with_text(mut self, text: &str) -> Self {
        self.fixed_text = Some(text.to_string());
        self
    }

    /// Fail every call
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Number of times `translate` was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Translator for MockTranslator {
    fn translate(&self, command: &ParsedVoiceCommand) -> Result<ParsedVoiceCommand> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.should_fail {
            return Err(VoxparseError::Translation {
                id: command.id.clone(),
                message: "mock translation failure".to_string(),
            });
        }

        let text = self
            .phrases
            .get(&command.text)
            .or(self.fixed_text.as_ref())
            .cloned()
            .unwrap_or_else(|| command.text.clone());

        Ok(ParsedVoiceCommand {
            text,
            language: self.language.clone(),
            ..command.clone()
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spanish(text: &str) -> ParsedVoiceCommand {
        ParsedVoiceCommand::new("Y", text, "es-AR", 0.98)
    }

    #[test]
    fn test_phrase_table_lookup() {
        let translator = MockTranslator::new("en-US").with_phrase("hola", "hello");
        let translated = translator.translate(&spanish("hola")).unwrap();

        assert_eq!(translated.text, "hello");
        assert_eq!(translated.language, "en-US");
        assert_eq!(translated.id, "Y");
        assert_eq!(translator.calls(), 1);
    }

    #[test]
    fn test_fixed_text_for_unknown_phrases() {
        let translator = MockTranslator::new("en-US")
            .with_phrase("hola", "hello")
            .with_text("call John");
        assert_eq!(
            translator.translate(&spanish("algo")).unwrap().text,
            "call John"
        );
        assert_eq!(translator.translate(&spanish("hola")).unwrap().text, "hello");
    }

    #[test]
    fn test_unknown_phrase_passes_through() {
        let translator = MockTranslator::new("en");
        assert_eq!(translator.translate(&spanish("algo")).unwrap().text, "algo");
    }

    #[test]
    fn test_failure() {
        let translator = MockTranslator::new("en").with_failure();
        assert!(matches!(
            translator.translate(&spanish("hola")),
            Err(VoxparseError::Translation { .. })
        ));
        assert_eq!(translator.calls(), 1);
    }

    #[test]
    fn test_demo_table() {
        let translator = MockTranslator::demo("en-US");
        assert_eq!(
            translator.translate(&spanish("llamar a Juan")).unwrap().text,
            "call John"
        );
    }
}
