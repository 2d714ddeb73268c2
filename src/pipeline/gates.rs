//! Stateless predicates that split the confident and language branches.

use crate::model::ParsedVoiceCommand;

/// Result of the confidence gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Confident,
    Uncertain,
}

/// Splits recognized commands on `confidence > threshold`.
///
/// A score equal to the threshold is uncertain, and so is NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceGate {
    threshold: f64,
}

impl ConfidenceGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn classify(&self, command: &ParsedVoiceCommand) -> Confidence {
        if command.confidence > self.threshold {
            Confidence::Confident
        } else {
            Confidence::Uncertain
        }
    }
}

/// Result of the language gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Target,
    NeedsTranslation,
}

/// Splits confident commands on whether their language tag starts with the target prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageGate {
    target: String,
}

impl LanguageGate {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Case-sensitive prefix match, so `"en"` accepts `"en-US"` and `"en"`.
    pub fn matches(&self, language: &str) -> bool {
        language.starts_with(&self.target)
    }

    pub fn classify(&self, command: &ParsedVoiceCommand) -> Language {
        if self.matches(&command.language) {
            Language::Target
        } else {
            Language::NeedsTranslation
        }
    }
}
