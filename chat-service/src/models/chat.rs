//! Wire types for the `/api/chat` endpoint.

use serde::{Deserialize, Deserializer, Serialize};

/// Body posted by the chat widget.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Latest user message. Missing or blank is rejected.
    #[serde(default)]
    pub message: Option<String>,

    /// Prior turns kept by the client, oldest first. `null` means none.
    #[serde(default, deserialize_with = "null_as_default")]
    pub conversation_history: Vec<HistoryEntry>,
}

/// One prior turn as the client reports it.
///
/// The role stays a plain string on the wire; anything other than
/// `"assistant"` is treated as a user turn when the prompt is assembled.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub role: String,
    pub content: String,
}

/// Successful reply.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatResponse {
    pub response: String,
    /// ISO 8601 time the reply was produced.
    pub timestamp: String,
    pub quota: bool,
}

/// Body of `GET /`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusResponse {
    pub message: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
