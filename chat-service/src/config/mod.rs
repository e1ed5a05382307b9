use crate::services::providers::gemini::GEMINI_API_BASE;
use crate::services::providers::openai::OPENAI_API_BASE;
use crate::services::providers::ProviderKind;
use crate::services::ExhaustionPolicy;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 500;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 60;

/// Origins allowed to call the API from a browser.
const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://mishra-bhavya.github.io",
    "http://127.0.0.1:5500",
    "http://localhost:5500",
    "http://localhost:3000",
];

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub common: core_config::Config,
    pub provider: ProviderConfig,
    pub models: ModelConfig,
    pub generation: GenerationSettings,
    /// Optional override for the built-in persona prompt.
    pub persona_prompt_file: Option<String>,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Model every request starts with (e.g., gpt-4o-mini)
    pub primary: String,
    /// Model tried once after the primary's retries are spent
    pub fallback: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub max_retries: u32,
    pub exhaustion_policy: ExhaustionPolicy,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl ChatConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let kind: ProviderKind = parse_env("LLM_PROVIDER", ProviderKind::OpenAi.as_str(), is_prod)?;
        let (api_key, base_url) = match kind {
            ProviderKind::OpenAi => (
                get_env("OPENAI_API_KEY", None, is_prod)?,
                get_env("OPENAI_BASE_URL", Some(OPENAI_API_BASE), false)?,
            ),
            ProviderKind::Gemini => (
                get_env("GOOGLE_API_KEY", None, is_prod)?,
                get_env("GEMINI_BASE_URL", Some(GEMINI_API_BASE), false)?,
            ),
            ProviderKind::Mock => (String::new(), String::new()),
        };

        Ok(ChatConfig {
            common: common_config,
            provider: ProviderConfig {
                kind,
                api_key,
                base_url,
                timeout_secs: parse_env(
                    "UPSTREAM_TIMEOUT_SECS",
                    &DEFAULT_UPSTREAM_TIMEOUT_SECS.to_string(),
                    false,
                )?,
            },
            models: ModelConfig {
                primary: get_env("PRIMARY_MODEL", Some(kind.default_model()), is_prod)?,
                fallback: optional_env("FALLBACK_MODEL"),
            },
            generation: GenerationSettings {
                max_retries: parse_env("MAX_RETRIES", &DEFAULT_MAX_RETRIES.to_string(), false)?,
                exhaustion_policy: parse_env(
                    "EXHAUSTION_POLICY",
                    ExhaustionPolicy::ReportQuota.as_str(),
                    false,
                )?,
                temperature: parse_env("TEMPERATURE", &DEFAULT_TEMPERATURE.to_string(), false)?,
                max_output_tokens: parse_env(
                    "MAX_OUTPUT_TOKENS",
                    &DEFAULT_MAX_OUTPUT_TOKENS.to_string(),
                    false,
                )?,
            },
            persona_prompt_file: optional_env("PERSONA_PROMPT_FILE"),
            allowed_origins: optional_env("ALLOWED_ORIGINS")
                .map(|list| split_origins(&list))
                .unwrap_or_else(default_allowed_origins),
        })
    }
}

pub fn default_allowed_origins() -> Vec<String> {
    DEFAULT_ALLOWED_ORIGINS
        .iter()
        .map(|origin| origin.to_string())
        .collect()
}

fn split_origins(list: &str) -> Vec<String> {
    list.split(',')
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .map(|origin| origin.to_string())
        .collect()
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|val| !val.trim().is_empty())
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(default), is_prod)?;
    raw.parse().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
    })
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_origins() {
        assert_eq!(
            split_origins(" http://a.test , ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn test_parse_env_uses_default() {
        let retries: u32 = parse_env("CHAT_SERVICE_TEST_UNSET_RETRIES", "3", false).unwrap();
        assert_eq!(retries, 3);
    }

    #[test]
    fn test_parse_env_rejects_garbage_default() {
        let err = parse_env::<u32>("CHAT_SERVICE_TEST_UNSET_NUMBER", "three", false).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_get_env_required_without_default() {
        assert!(get_env("CHAT_SERVICE_TEST_UNSET_KEY", None, false).is_err());
    }
}
