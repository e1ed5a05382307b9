//! Mock provider for local development and tests.

use super::{GenerationParams, ProviderError, ProviderKind, TextProvider};
use crate::models::ChatMessage;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Mock text provider.
///
/// Replays scripted results in order, one per call, and echoes the latest
/// message once the script runs dry. Every call's model id is recorded.
#[derive(Default)]
pub struct MockTextProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: Mutex<Vec<String>>,
}

impl MockTextProvider {
    /// Echo-only provider.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(results: impl IntoIterator<Item = Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Model ids seen so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(
        &self,
        model: &str,
        messages: &[ChatMessage],
        _params: &GenerationParams,
    ) -> Result<String, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(model.to_string());

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();

        match scripted {
            Some(result) => result,
            None => {
                let latest = messages.last().map(|m| m.content.as_str()).unwrap_or("");
                Ok(format!("Mock response for: {}", latest))
            }
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[tokio::test]
    async fn test_script_then_echo() {
        let provider = MockTextProvider::scripted([Err(ProviderError::api(503, "overloaded"))]);
        let messages = vec![ChatMessage::new(Role::User, "ping")];
        let params = GenerationParams::default();

        assert!(provider.generate("a", &messages, &params).await.is_err());
        assert_eq!(
            provider.generate("b", &messages, &params).await.unwrap(),
            "Mock response for: ping"
        );
        assert_eq!(provider.calls(), vec!["a".to_string(), "b".to_string()]);
    }
}
