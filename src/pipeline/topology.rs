//! The routing graph: filter, recognize, split on confidence, split on
//! language, translate, merge.
//!
//! Every step is a plain function of its input, so the whole graph can be
//! exercised without channels or a log.

use crate::config::TopologyConfig;
use crate::error::Result;
use crate::model::{ParsedVoiceCommand, VoiceCommand};
use crate::pipeline::gates::{Confidence, ConfidenceGate, Language, LanguageGate};
use crate::pipeline::stages::{LengthFilter, RecognitionStage, TranslationStage};
use crate::pipeline::types::{LanguagePath, Outcome};
use crate::stt::SpeechToText;
use crate::translate::Translator;
use std::sync::Arc;

/// The assembled routing graph. Holds no per-record state.
pub struct Topology {
    filter: LengthFilter,
    recognition: RecognitionStage,
    confidence: ConfidenceGate,
    language: LanguageGate,
    translation: TranslationStage,
}

impl Topology {
    pub fn new(
        config: &TopologyConfig,
        recognizer: Arc<dyn SpeechToText>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        let language = LanguageGate::new(config.target_language.clone());
        Self {
            filter: LengthFilter::new(config.min_audio_bytes),
            recognition: RecognitionStage::new(recognizer),
            confidence: ConfidenceGate::new(config.confidence_threshold),
            translation: TranslationStage::new(
                translator,
                language.clone(),
                config.verify_translation_language,
            ),
            language,
        }
    }

    /// Routes one command to its terminal outcome.
    ///
    /// Errors are capability failures. No partial result is ever returned
    /// alongside one.
    pub fn process(&self, command: &VoiceCommand) -> Result<Outcome> {
        if !self.filter.passes(command) {
            tracing::debug!(id = %command.id, bytes = command.audio.len(), "dropped short audio");
            return Ok(Outcome::Dropped);
        }

        let recognized = self.recognition.recognize(command)?;

        match self.confidence.classify(&recognized) {
            Confidence::Uncertain => {
                tracing::debug!(
                    id = %recognized.id,
                    confidence = recognized.confidence,
                    "below confidence threshold"
                );
                Ok(Outcome::Unrecognized(recognized))
            }
            Confidence::Confident => {
                let (path, command) = match self.language.classify(&recognized) {
                    Language::Target => (LanguagePath::AlreadyTarget, recognized),
                    Language::NeedsTranslation => {
                        (LanguagePath::Translated, self.translation.translate(&recognized)?)
                    }
                };
                Ok(merge(path, command))
            }
        }
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence.threshold()
    }

    pub fn target_language(&self) -> &str {
        self.language.target()
    }

    /// `recognizer/translator` backend names, for startup logs.
    pub fn backends(&self) -> String {
        format!(
            "{}/{}",
            self.recognition.backend(),
            self.translation.backend()
        )
    }
}

/// Joins the two confident branches into the single recognized output.
pub fn merge(path: LanguagePath, command: ParsedVoiceCommand) -> Outcome {
    Outcome::Recognized { command, path }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoxparseError;
    use crate::stt::{MockRecognition, MockRecognizer};
    use crate::translate::MockTranslator;

    fn topology(
        recognizer: MockRecognizer,
        translator: MockTranslator,
    ) -> (Topology, Arc<MockRecognizer>, Arc<MockTranslator>) {
        let recognizer = Arc::new(recognizer);
        let translator = Arc::new(translator);
        let topology = Topology::new(
            &TopologyConfig::default(),
            recognizer.clone(),
            translator.clone(),
        );
        (topology, recognizer, translator)
    }

    fn command(id: &str, audio_len: usize, language: &str) -> VoiceCommand {
        VoiceCommand::new(id, vec![1; audio_len], "FLAC", language)
    }

    #[test]
    fn test_short_audio_is_dropped_without_capability_calls() {
        let (topology, recognizer, translator) =
            topology(MockRecognizer::new(), MockTranslator::new("en"));

        assert_eq!(topology.process(&command("X", 10, "en-US")).unwrap(), Outcome::Dropped);
        assert_eq!(topology.process(&command("X", 0, "es-AR")).unwrap(), Outcome::Dropped);
        assert_eq!(recognizer.calls(), 0);
        assert_eq!(translator.calls(), 0);
    }

    #[test]
    fn test_confident_target_language_skips_translation() {
        let (topology, _, translator) = topology(
            MockRecognizer::new().with_script("X", MockRecognition::new("call John", 0.98)),
            MockTranslator::new("en"),
        );

        match topology.process(&command("X", 20, "en-US")).unwrap() {
            Outcome::Recognized { command, path } => {
                assert_eq!(path, LanguagePath::AlreadyTarget);
                assert_eq!(command.id, "X");
                assert_eq!(command.text, "call John");
                assert_eq!(command.language, "en-US");
            }
            other => panic!("Expected recognized, got {:?}", other),
        }
        assert_eq!(translator.calls(), 0);
    }

    #[test]
    fn test_confident_other_language_is_translated_once() {
        let (topology, _, translator) = topology(
            MockRecognizer::new().with_script("Y", MockRecognition::new("llamar a Juan", 0.98)),
            MockTranslator::new("en-US").with_text("call John"),
        );

        match topology.process(&command("Y", 20, "es-AR")).unwrap() {
            Outcome::Recognized { command, path } => {
                assert_eq!(path, LanguagePath::Translated);
                assert_eq!(command.id, "Y");
                assert_eq!(command.text, "call John");
                assert!((command.confidence - 0.98).abs() < f64::EPSILON);
            }
            other => panic!("Expected recognized, got {:?}", other),
        }
        assert_eq!(translator.calls(), 1);
    }

    #[test]
    fn test_uncertain_goes_to_unrecognized_without_translation() {
        let (topology, _, translator) = topology(
            MockRecognizer::new().with_default("call John", 0.30),
            MockTranslator::new("en"),
        );

        match topology.process(&command("Z", 20, "es-AR")).unwrap() {
            Outcome::Unrecognized(parsed) => assert_eq!(parsed.id, "Z"),
            other => panic!("Expected unrecognized, got {:?}", other),
        }
        assert_eq!(translator.calls(), 0);
    }

    #[test]
    fn test_threshold_score_is_unrecognized() {
        let (topology, _, _) = topology(
            MockRecognizer::new().with_default("call John", 0.90),
            MockTranslator::new("en"),
        );
        assert!(matches!(
            topology.process(&command("Z", 20, "en-US")).unwrap(),
            Outcome::Unrecognized(_)
        ));
    }

    #[test]
    fn test_capability_failures_surface_as_errors() {
        let (failing_stt, _, _) =
            topology(MockRecognizer::new().with_failure(), MockTranslator::new("en"));
        assert!(matches!(
            failing_stt.process(&command("X", 20, "en-US")),
            Err(VoxparseError::Recognition { .. })
        ));

        let (failing_translation, _, _) = topology(
            MockRecognizer::new().with_default("hola", 0.99),
            MockTranslator::new("en").with_failure(),
        );
        assert!(matches!(
            failing_translation.process(&command("Y", 20, "es-AR")),
            Err(VoxparseError::Translation { .. })
        ));
    }

    #[test]
    fn test_custom_threshold_and_target() {
        let config = TopologyConfig {
            confidence_threshold: 0.5,
            target_language: "es".to_string(),
            ..TopologyConfig::default()
        };
        let translator = Arc::new(MockTranslator::new("es"));
        let topology = Topology::new(
            &config,
            Arc::new(MockRecognizer::new().with_default("llamar a Juan", 0.6)),
            translator.clone(),
        );

        assert!(matches!(
            topology.process(&command("Y", 20, "es-AR")).unwrap(),
            Outcome::Recognized {
                path: LanguagePath::AlreadyTarget,
                ..
            }
        ));
        assert_eq!(translator.calls(), 0);
        assert_eq!(topology.target_language(), "es");
        assert!((topology.confidence_threshold() - 0.5).abs() < f64::EPSILON);
        assert_eq!(topology.backends(), "mock/mock");
    }

    #[test]
    fn test_merge_is_recognized() {
        let parsed = ParsedVoiceCommand::new("X", "call John", "en-US", 0.98);
        assert_eq!(
            merge(LanguagePath::AlreadyTarget, parsed.clone()).command(),
            Some(&parsed)
        );
    }
}
