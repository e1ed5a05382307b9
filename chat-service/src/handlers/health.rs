use crate::models::StatusResponse;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// `GET /`: plain liveness message for the widget.
pub async fn root_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "Chatbot API is running!".to_string(),
    })
}

/// Health check endpoint for Docker/K8s liveness checks.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let generator = &state.generator;
    let provider = generator.provider();

    match provider.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "chat-service",
                "version": env!("CARGO_PKG_VERSION"),
                "provider": provider.kind().as_str(),
                "model": generator.primary_model(),
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "chat-service",
                "error": e.to_string()
            })),
        ),
    }
}
