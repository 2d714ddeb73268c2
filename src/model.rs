//! Records flowing through the pipeline.
//!
//! Field names on the wire are camelCase and audio is standard base64, which
//! is what existing producers and consumers of these topics exchange.

use serde::{Deserialize, Serialize};

/// An inbound voice command as read from the input topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCommand {
    /// Globally unique, stable across retries. Also the message key.
    pub id: String,
    /// Opaque audio payload.
    #[serde(with = "audio_base64")]
    pub audio: Vec<u8>,
    /// Codec label, e.g. "FLAC".
    pub audio_codec: String,
    /// Declared source language tag, e.g. "en-US".
    pub language: String,
}

impl VoiceCommand {
    /// Creates a new inbound command.
    pub fn new(
        id: impl Into<String>,
        audio: Vec<u8>,
        audio_codec: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            audio,
            audio_codec: audio_codec.into(),
            language: language.into(),
        }
    }
}

/// A recognized (and possibly translated) command written to an output topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedVoiceCommand {
    /// Copied unchanged from the inbound command.
    pub id: String,
    /// Recognized text, possibly empty.
    #[serde(default)]
    pub text: String,
    /// Carried through from the inbound command when known.
    #[serde(default)]
    pub audio_codec: Option<String>,
    /// Effective language after any translation.
    pub language: String,
    /// Recognizer confidence. Never re-derived after translation.
    #[serde(rename = "probability")]
    pub confidence: f64,
}

impl ParsedVoiceCommand {
    /// Creates a new outbound record without codec information.
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        language: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            audio_codec: None,
            language: language.into(),
            confidence,
        }
    }

    /// Sets the carried-through audio codec.
    pub fn with_audio_codec(mut self, codec: impl Into<String>) -> Self {
        self.audio_codec = Some(codec.into());
        self
    }
}

mod audio_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_command_wire_format() {
        let command = VoiceCommand::new("X", vec![1, 2, 3], "FLAC", "en-US");
        let json = serde_json::to_value(&command).unwrap();

        assert_eq!(json["id"], "X");
        assert_eq!(json["audio"], "AQID");
        assert_eq!(json["audioCodec"], "FLAC");
        assert_eq!(json["language"], "en-US");
    }

    #[test]
    fn test_voice_command_rejects_invalid_base64() {
        let json = r#"{"id":"X","audio":"not base64!","audioCodec":"FLAC","language":"en-US"}"#;
        assert!(serde_json::from_str::<VoiceCommand>(json).is_err());
    }

    #[test]
    fn test_voice_command_requires_all_fields() {
        let json = r#"{"id":"X","audio":"AQID","language":"en-US"}"#;
        assert!(serde_json::from_str::<VoiceCommand>(json).is_err());
    }

    #[test]
    fn test_parsed_command_uses_probability_on_the_wire() {
        let parsed = ParsedVoiceCommand::new("Y", "call John", "en-US", 0.98);
        let json = serde_json::to_value(&parsed).unwrap();

        assert_eq!(json["probability"], 0.98);
        assert_eq!(json["text"], "call John");
        assert!(json["audioCodec"].is_null());
        assert!(json.get("confidence").is_none());
    }

    #[test]
    fn test_parsed_command_tolerates_missing_optional_fields() {
        let json = r#"{"id":"Z","language":"en-US","probability":0.3}"#;
        let parsed: ParsedVoiceCommand = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.id, "Z");
        assert_eq!(parsed.text, "");
        assert_eq!(parsed.audio_codec, None);
        assert!((parsed.confidence - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_with_audio_codec() {
        let parsed = ParsedVoiceCommand::new("Y", "hola", "es-AR", 0.5).with_audio_codec("OPUS");
        assert_eq!(parsed.audio_codec.as_deref(), Some("OPUS"));
    }
}
