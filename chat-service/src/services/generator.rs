//! Resilient generation against the upstream model.
//!
//! Retries transient failures with exponential backoff, optionally makes one
//! attempt against a fallback model, and then resolves according to the
//! deployment's [`ExhaustionPolicy`].

use super::providers::{GenerationParams, ProviderError, TextProvider};
use crate::models::{
    AttemptOutcome, ErrorKind, GenerationAttempt, GenerationOutcome, GenerationRequest,
};
use service_core::retry::RetryConfig;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// HTTP statuses treated as transient.
const RETRYABLE_STATUSES: [u16; 3] = [429, 500, 503];

/// Message fragments that mark an error as transient when no status is known
/// or the status was wrapped into the message.
const RETRYABLE_MARKERS: &[&str] = &[
    "resource_exhausted",
    "unavailable",
    "rate limit",
    "quota",
    "overloaded",
    "too many requests",
    "service unavailable",
    "internal server error",
    "[429",
    "[500",
    "[503",
];

/// What a deployment reports once retries and fallback are spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Surface the last error as a failure (HTTP 500 to the client).
    Strict,
    /// Report quota exhaustion with a retry-after (HTTP 429 to the client).
    ReportQuota,
}

impl ExhaustionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExhaustionPolicy::Strict => "strict",
            ExhaustionPolicy::ReportQuota => "quota",
        }
    }
}

impl FromStr for ExhaustionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ExhaustionPolicy::Strict),
            "quota" => Ok(ExhaustionPolicy::ReportQuota),
            other => Err(format!("unknown exhaustion policy '{}'", other)),
        }
    }
}

/// Whether an upstream error is worth retrying.
pub fn is_retryable(error: &ProviderError) -> bool {
    if error
        .status()
        .is_some_and(|status| RETRYABLE_STATUSES.contains(&status))
    {
        return true;
    }

    let message = error.to_string().to_ascii_lowercase();
    RETRYABLE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

pub struct ResilientGenerator {
    provider: Arc<dyn TextProvider>,
    primary_model: String,
    fallback_model: Option<String>,
    params: GenerationParams,
    retry: RetryConfig,
    policy: ExhaustionPolicy,
}

impl ResilientGenerator {
    pub fn new(provider: Arc<dyn TextProvider>, primary_model: impl Into<String>) -> Self {
        Self {
            provider,
            primary_model: primary_model.into(),
            fallback_model: None,
            params: GenerationParams::default(),
            retry: RetryConfig::default(),
            policy: ExhaustionPolicy::ReportQuota,
        }
    }

    pub fn with_fallback(mut self, model: Option<String>) -> Self {
        self.fallback_model = model.filter(|m| !m.trim().is_empty());
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn primary_model(&self) -> &str {
        &self.primary_model
    }

    pub fn fallback_model(&self) -> Option<&str> {
        self.fallback_model.as_deref()
    }

    pub fn policy(&self) -> ExhaustionPolicy {
        self.policy
    }

    pub fn provider(&self) -> &Arc<dyn TextProvider> {
        &self.provider
    }

    /// Generate with the configured retry budget.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        self.generate_with_retries(request, self.retry.max_retries)
            .await
    }

    pub async fn generate_with_retries(
        &self,
        request: &GenerationRequest,
        max_retries: u32,
    ) -> GenerationOutcome {
        self.generate_with_attempts(request, max_retries).await.0
    }

    /// Generate and also return every upstream attempt made on the way.
    pub async fn generate_with_attempts(
        &self,
        request: &GenerationRequest,
        max_retries: u32,
    ) -> (GenerationOutcome, Vec<GenerationAttempt>) {
        let mut attempts = Vec::new();
        let mut attempt: u32 = 0;

        let last_error = loop {
            let result = self
                .call(&self.primary_model, request, &mut attempts)
                .await;

            let error = match result {
                Ok(text) => {
                    if attempt > 0 {
                        tracing::info!(
                            model = %self.primary_model,
                            attempt = attempt + 1,
                            "Generation succeeded after retry"
                        );
                    }
                    return (GenerationOutcome::Success { text }, attempts);
                }
                Err(error) => error,
            };

            if !is_retryable(&error) {
                tracing::warn!(
                    model = %self.primary_model,
                    attempt = attempt + 1,
                    error = %error,
                    "Generation failed with non-retryable error"
                );
                return (fatal(error), attempts);
            }

            if attempt >= max_retries {
                break error;
            }

            let backoff = self.retry.backoff_duration(attempt);
            // Server hints may lengthen a wait but never past the backoff cap.
            let delay = error.retry_after().map_or(backoff, |server_delay| {
                server_delay.min(self.retry.max_backoff).max(backoff)
            });

            tracing::warn!(
                model = %self.primary_model,
                attempt = attempt + 1,
                status = ?error.status(),
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "Generation failed, retrying after backoff"
            );

            sleep(delay).await;
            attempt += 1;
        };

        let last_error = match &self.fallback_model {
            Some(fallback) => {
                tracing::warn!(
                    primary = %self.primary_model,
                    fallback = %fallback,
                    "Primary model exhausted, trying fallback"
                );
                match self.call(fallback, request, &mut attempts).await {
                    Ok(text) => return (GenerationOutcome::Success { text }, attempts),
                    Err(error) if !is_retryable(&error) => return (fatal(error), attempts),
                    Err(error) => error,
                }
            }
            None => last_error,
        };

        let outcome = self.exhausted(last_error, self.retry.backoff_duration(attempt));
        (outcome, attempts)
    }

    /// One upstream call, recorded in `attempts`.
    async fn call(
        &self,
        model: &str,
        request: &GenerationRequest,
        attempts: &mut Vec<GenerationAttempt>,
    ) -> Result<String, ProviderError> {
        let result = self
            .provider
            .generate(model, request.messages(), &self.params)
            .await;

        let outcome = match &result {
            Ok(_) => AttemptOutcome::Succeeded,
            Err(error) if is_retryable(error) => AttemptOutcome::Retryable(error.to_string()),
            Err(error) => AttemptOutcome::Fatal(error.to_string()),
        };
        attempts.push(GenerationAttempt {
            model_id: model.to_string(),
            attempt_number: attempts.len() as u32 + 1,
            outcome,
        });

        result
    }

    fn exhausted(&self, last_error: ProviderError, backoff: Duration) -> GenerationOutcome {
        tracing::error!(
            model = %self.primary_model,
            policy = self.policy.as_str(),
            error = %last_error,
            "Generation failed after max retries"
        );

        match self.policy {
            ExhaustionPolicy::Strict => GenerationOutcome::Failure {
                error_kind: ErrorKind::RetriesExhausted,
                message: last_error.to_string(),
            },
            ExhaustionPolicy::ReportQuota => GenerationOutcome::QuotaExhausted {
                retry_after_seconds: backoff.as_millis().div_ceil(1000) as u64,
            },
        }
    }
}

fn fatal(error: ProviderError) -> GenerationOutcome {
    GenerationOutcome::Failure {
        error_kind: ErrorKind::Fatal,
        message: error.to_string(),
    }
}
