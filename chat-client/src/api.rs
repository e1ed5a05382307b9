//! Transport to the chat relay.

use crate::error::ClientError;
use crate::history::HistoryEntry;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Used when a quota response carries no usable delay.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// What the relay answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    Reply {
        response: String,
        timestamp: Option<String>,
    },
    Quota {
        retry_after: u64,
        message: String,
    },
    /// Non-OK answer without the quota flag.
    Error { message: String },
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `message` with the prior `history` to the relay at `endpoint`.
    ///
    /// `Err` means no interpretable answer arrived at all.
    async fn send(
        &self,
        endpoint: &str,
        message: &str,
        history: &[HistoryEntry],
    ) -> Result<ChatReply, ClientError>;
}

/// `POST {endpoint}/api/chat` over reqwest.
pub struct HttpChatApi {
    client: Client,
}

impl HttpChatApi {
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequestBody<'a> {
    message: &'a str,
    conversation_history: &'a [HistoryEntry],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponseBody {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    quota: bool,
    #[serde(default)]
    retry_after: Option<u64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl ChatTransport for HttpChatApi {
    async fn send(
        &self,
        endpoint: &str,
        message: &str,
        history: &[HistoryEntry],
    ) -> Result<ChatReply, ClientError> {
        let url = format!("{}/api/chat", endpoint.trim_end_matches('/'));

        tracing::debug!(url = %url, history_len = history.len(), "Sending chat request");

        let response = self
            .client
            .post(&url)
            .json(&ChatRequestBody {
                message,
                conversation_history: history,
            })
            .send()
            .await?;

        let status = response.status();
        let header_delay = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let raw = response.text().await?;

        let body = match serde_json::from_str::<ChatResponseBody>(&raw) {
            Ok(body) => body,
            Err(_) if !status.is_success() => ChatResponseBody::default(),
            Err(e) => return Err(ClientError::Decode(e.to_string())),
        };

        if body.quota {
            let retry_after = body
                .retry_after
                .or(header_delay)
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Ok(ChatReply::Quota {
                retry_after,
                message: body.message.unwrap_or_else(|| {
                    format!("Quota exceeded. Please wait {} seconds.", retry_after)
                }),
            });
        }

        if !status.is_success() {
            let message = body
                .error
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            return Ok(ChatReply::Error { message });
        }

        match body.response {
            Some(response) => Ok(ChatReply::Reply {
                response,
                timestamp: body.timestamp,
            }),
            None => Err(ClientError::Decode(
                "response field missing from reply".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ConversationHistory;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api() -> HttpChatApi {
        HttpChatApi::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_reply_sends_history_in_wire_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({
                "message": "friend",
                "conversationHistory": [
                    { "role": "user", "content": "hi" },
                    { "role": "assistant", "content": "mentor or friend?" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "Then walk with me.",
                "timestamp": "2026-01-01T00:00:00.000Z",
                "quota": false
            })))
            .mount(&server)
            .await;

        let mut history = ConversationHistory::new();
        history.push_exchange("hi", "mentor or friend?");

        let reply = api()
            .send(&format!("{}/", server.uri()), "friend", history.entries())
            .await
            .unwrap();
        assert_eq!(
            reply,
            ChatReply::Reply {
                response: "Then walk with me.".to_string(),
                timestamp: Some("2026-01-01T00:00:00.000Z".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_quota_body_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "quota": true,
                "retryAfter": 5,
                "message": "Please wait 5 seconds"
            })))
            .mount(&server)
            .await;

        let reply = api().send(&server.uri(), "hello", &[]).await.unwrap();
        assert_eq!(
            reply,
            ChatReply::Quota {
                retry_after: 5,
                message: "Please wait 5 seconds".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_error_without_quota_flag_is_ordinary() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": "Failed to generate response",
                "details": "API error 401: bad key"
            })))
            .mount(&server)
            .await;

        let reply = api().send(&server.uri(), "hello", &[]).await.unwrap();
        assert_eq!(
            reply,
            ChatReply::Error {
                message: "Failed to generate response".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_non_json_success_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
            .mount(&server)
            .await;

        let err = api().send(&server.uri(), "hello", &[]).await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // Nothing listens on the discard port.
        let err = api()
            .send("http://127.0.0.1:9", "hello", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}
