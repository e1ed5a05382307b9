use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Message returned in the `error` field when generation fails for good.
pub const GENERATION_FAILED: &str = "Failed to generate response";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Quota exhausted, retry after {retry_after}s: {message}")]
    QuotaExhausted { retry_after: u64, message: String },

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
        }

        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct QuotaResponse {
            quota: bool,
            retry_after: u64,
            message: String,
        }

        let (status, error_message, details) = match self {
            AppError::QuotaExhausted {
                retry_after,
                message,
            } => {
                let mut res = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(QuotaResponse {
                        quota: true,
                        retry_after,
                        message,
                    }),
                )
                    .into_response();
                res.headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, retry_after.into());
                return res;
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::UpstreamError(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                GENERATION_FAILED.to_string(),
                Some(details),
            ),
            AppError::InternalError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                Some(format!("{:#}", err)),
            ),
            AppError::ConfigError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
                Some(err.to_string()),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: error_message,
                details,
            }),
        )
            .into_response()
    }
}
