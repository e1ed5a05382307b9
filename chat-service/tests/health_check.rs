//! Integration tests for chat-service.
//!
//! Spawn the real server on a random port with the mock provider.
//! Run with: cargo test -p chat-service --test health_check

use chat_service::config::ChatConfig;
use chat_service::startup::Application;
use reqwest::Client;
use std::time::Duration;

/// Spawn the application on a random port and return the port number.
async fn spawn_app() -> u16 {
    std::env::set_var("ENVIRONMENT", "test");
    std::env::set_var("APP__PORT", "0"); // Random port
    std::env::set_var("LLM_PROVIDER", "mock");
    std::env::set_var("PRIMARY_MODEL", "mock-model");

    let config = ChatConfig::load().expect("Failed to load config");
    let app = Application::build(config)
        .await
        .expect("Failed to build application");

    let port = app.http_port();

    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    port
}

#[tokio::test]
async fn health_check_returns_ok() {
    let port = spawn_app().await;
    let client = Client::new();

    let response = client
        .get(format!("http://localhost:{}/health", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "chat-service");
    assert_eq!(body["provider"], "mock");
    assert_eq!(body["model"], "mock-model");
}

#[tokio::test]
async fn chat_round_trip_with_mock_provider() {
    let port = spawn_app().await;
    let client = Client::new();

    let response = client
        .post(format!("http://localhost:{}/api/chat", port))
        .json(&serde_json::json!({ "message": "ping", "conversationHistory": [] }))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["response"], "Mock response for: ping");
    assert_eq!(body["quota"], false);
}
