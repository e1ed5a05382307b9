//! Application startup and lifecycle management.
//!
//! Wires configuration into a provider and a resilient generator, builds the
//! HTTP router and runs it until a shutdown signal arrives.

use crate::config::{ChatConfig, ProviderConfig};
use crate::handlers;
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::mock::MockTextProvider;
use crate::services::providers::openai::{OpenAiConfig, OpenAiTextProvider};
use crate::services::providers::{GenerationParams, ProviderError, ProviderKind, TextProvider};
use crate::services::{load_persona, ResilientGenerator};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use service_core::retry::RetryConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<ResilientGenerator>,
    /// System prompt placed first in every generation request.
    pub persona: Arc<str>,
}

impl AppState {
    pub fn new(generator: ResilientGenerator, persona: impl Into<Arc<str>>) -> Self {
        Self {
            generator: Arc::new(generator),
            persona: persona.into(),
        }
    }
}

/// Instantiate the upstream provider selected by configuration.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn TextProvider>, AppError> {
    let provider: Arc<dyn TextProvider> = match config.kind {
        ProviderKind::OpenAi => Arc::new(
            OpenAiTextProvider::new(OpenAiConfig {
                api_key: config.api_key.clone(),
                base_url: config.base_url.clone(),
                timeout: config.timeout(),
            })
            .map_err(provider_config_error)?,
        ),
        ProviderKind::Gemini => Arc::new(
            GeminiTextProvider::new(GeminiConfig {
                api_key: config.api_key.clone(),
                base_url: config.base_url.clone(),
                timeout: config.timeout(),
            })
            .map_err(provider_config_error)?,
        ),
        ProviderKind::Mock => Arc::new(MockTextProvider::new()),
    };

    Ok(provider)
}

fn provider_config_error(err: ProviderError) -> AppError {
    AppError::ConfigError(anyhow::Error::new(err))
}

/// Wrap a provider in the retry/fallback policy from configuration.
pub fn build_generator(config: &ChatConfig, provider: Arc<dyn TextProvider>) -> ResilientGenerator {
    ResilientGenerator::new(provider, config.models.primary.clone())
        .with_fallback(config.models.fallback.clone())
        .with_params(GenerationParams {
            temperature: Some(config.generation.temperature),
            max_tokens: Some(config.generation.max_output_tokens),
        })
        .with_retry_config(RetryConfig::with_max_retries(config.generation.max_retries))
        .with_policy(config.generation.exhaustion_policy)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handlers::root_status))
        .route("/health", get(handlers::health_check))
        .route("/api/chat", post(handlers::chat))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ChatConfig) -> Result<Self, AppError> {
        let provider = build_provider(&config.provider)?;
        Self::build_with_provider(config, provider).await
    }

    /// Build with an already constructed provider (used by tests).
    pub async fn build_with_provider(
        config: ChatConfig,
        provider: Arc<dyn TextProvider>,
    ) -> Result<Self, AppError> {
        let persona = load_persona(config.persona_prompt_file.as_deref())?;
        let generator = build_generator(&config, provider);

        tracing::info!(
            provider = generator.provider().kind().as_str(),
            model = %generator.primary_model(),
            fallback = ?generator.fallback_model(),
            policy = generator.policy().as_str(),
            max_retries = config.generation.max_retries,
            "Initialized resilient generator"
        );

        let router = build_router(AppState::new(generator, persona), &config.allowed_origins);

        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Chat service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
