//! JSON codec between log payloads and records.

use crate::error::{Result, VoxparseError};
use crate::model::{ParsedVoiceCommand, VoiceCommand};

/// Decodes an inbound command from a log message.
///
/// The message key, when present, must equal the record id: the id is the
/// partitioning key, so a disagreement means the record may sit in the wrong
/// partition and is rejected as malformed.
pub fn decode_command(key: Option<&str>, value: &[u8]) -> Result<VoiceCommand> {
    let command: VoiceCommand = serde_json::from_slice(value).map_err(|e| VoxparseError::Decode {
        message: e.to_string(),
    })?;

    if command.id.trim().is_empty() {
        return Err(VoxparseError::Decode {
            message: "empty command id".to_string(),
        });
    }

    if let Some(key) = key
        && key != command.id
    {
        return Err(VoxparseError::Decode {
            message: format!("message key '{}' does not match id '{}'", key, command.id),
        });
    }

    Ok(command)
}

/// Encodes an inbound command (producer side).
pub fn encode_command(command: &VoiceCommand) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(command)?)
}

/// Encodes an outbound record.
pub fn encode_parsed(parsed: &ParsedVoiceCommand) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(parsed)?)
}

/// Decodes an outbound record (consumer side).
pub fn decode_parsed(value: &[u8]) -> Result<ParsedVoiceCommand> {
    serde_json::from_slice(value).map_err(|e| VoxparseError::Decode {
        message: e.to_string(),
    })
}
