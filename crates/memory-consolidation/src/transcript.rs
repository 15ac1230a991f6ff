//! Normalizes raw session transcripts into a single internal message
//! shape (spec §4.F step 1). Hosts deliver transcripts as a JSON array
//! whose elements are either `{role, content}` directly or wrapped one
//! level down as `{message: {role, content}}`; both parse to the same
//! `Message` sequence.

use serde::Deserialize;

use memory_core::error::{MemoryError, MemoryResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct Inner {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ShapeB {
    message: Inner,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMessage {
    A(Inner),
    B(ShapeB),
}

/// Parses `transcript` as a JSON array of messages in either the
/// `{role, content}` or `{message: {role, content}}` shape. A malformed
/// element is skipped rather than failing the whole batch (spec §4.F:
/// "transcript shape errors -> skip message, continue"); only a
/// non-array/non-JSON payload is a hard error.
pub fn normalize(transcript: &str) -> MemoryResult<Vec<Message>> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(transcript)
        .map_err(|e| MemoryError::InvalidInput(format!("unrecognized transcript shape: {e}")))?;

    Ok(raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawMessage>(value) {
            Ok(RawMessage::A(inner)) => Some(Message { role: inner.role, content: inner.content }),
            Ok(RawMessage::B(wrapped)) => Some(Message { role: wrapped.message.role, content: wrapped.message.content }),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed transcript message");
                None
            }
        })
        .collect())
}
