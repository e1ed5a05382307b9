use crate::error::ClientError;
use std::env;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_STORE_PATH: &str = ".chat-client-store.json";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Endpoint used until the user picks another one.
    pub api_url: String,
    pub store_path: String,
    pub request_timeout_secs: u64,
}

impl ClientConfig {
    pub fn load() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();

        let request_timeout_secs = match env::var("CHAT_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse().map_err(|e| {
                ClientError::Config(format!(
                    "CHAT_REQUEST_TIMEOUT_SECS has invalid value '{}': {}",
                    raw, e
                ))
            })?,
            Err(_) => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Ok(Self {
            api_url: env::var("CHAT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            store_path: env::var("CHAT_STORE_PATH")
                .unwrap_or_else(|_| DEFAULT_STORE_PATH.to_string()),
            request_timeout_secs,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
