//! Upstream text-generation providers.
//!
//! A trait-based abstraction over the chat APIs the relay can forward to,
//! so a deployment can switch between OpenAI, Gemini and the mock backend.

pub mod gemini;
pub mod mock;
pub mod openai;

use crate::models::ChatMessage;
use async_trait::async_trait;
use service_core::retry::parse_retry_delay;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Non-success HTTP response from the upstream API.
    #[error("API error {status}: {message}")]
    Api {
        status: u16,
        message: String,
        /// Delay the upstream asked for, when it sent one in a structured form.
        retry_after: Option<Duration>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Build an API error with no retry hint.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        ProviderError::Api {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-supplied delay: the structured hint, else one embedded in the message.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::Api {
                retry_after: Some(delay),
                ..
            } => Some(*delay),
            other => parse_retry_delay(&other.to_string()),
        }
    }
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    /// Temperature (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Maximum output tokens.
    pub max_tokens: Option<u32>,
}

/// Which upstream API a deployment talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    Mock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Mock => "mock",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Gemini => "gemini-2.0-flash",
            ProviderKind::Mock => "mock-model",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// Trait for chat text generation providers.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Generate a reply to `messages` with the given model.
    async fn generate(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String, ProviderError>;

    /// Check the provider is usable without spending a generation.
    async fn health_check(&self) -> Result<(), ProviderError>;

    fn kind(&self) -> ProviderKind;
}
