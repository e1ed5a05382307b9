use crate::models::{ChatRequest, ChatResponse, GenerationOutcome, GenerationRequest};
use crate::startup::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use chrono::{SecondsFormat, Utc};
use service_core::error::AppError;

pub const MESSAGE_REQUIRED: &str = "Message is required";

/// `POST /api/chat`: answer the latest message in persona.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection, "Rejected malformed chat request");
        AppError::BadRequest(rejection.body_text())
    })?;

    let message = request
        .message
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(MESSAGE_REQUIRED.to_string()))?;

    let generation =
        GenerationRequest::new(&state.persona, &request.conversation_history, message);

    tracing::info!(
        history_len = request.conversation_history.len(),
        message_len = message.len(),
        "Generating chat reply"
    );

    match state.generator.generate(&generation).await {
        GenerationOutcome::Success { text } => Ok(Json(ChatResponse {
            response: text,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            quota: false,
        })),
        GenerationOutcome::QuotaExhausted {
            retry_after_seconds,
        } => Err(AppError::QuotaExhausted {
            retry_after: retry_after_seconds,
            message: format!(
                "The model is out of quota right now. Please wait {} seconds before trying again.",
                retry_after_seconds
            ),
        }),
        GenerationOutcome::Failure {
            error_kind,
            message,
        } => {
            tracing::error!(kind = ?error_kind, error = %message, "Error generating response");
            Err(AppError::UpstreamError(message))
        }
    }
}
