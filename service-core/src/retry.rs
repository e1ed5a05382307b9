//! Retry utilities for calls to upstream HTTP APIs.
//!
//! Provides exponential backoff configuration and helpers that read
//! server-supplied retry hints out of error payloads and headers.

use std::time::Duration;

/// Phrases that precede a retry hint such as `"retryDelay": "19s"` or
/// `Please retry in 19.5s`.
const RETRY_HINT_MARKERS: &[&str] = &["retrydelay", "retry in", "retry after", "try again in"];

/// How far past a marker (in chars) a `<N>s` token is looked for.
const RETRY_HINT_WINDOW: usize = 32;

/// Longest server-supplied delay honoured; larger hints are clamped to it.
pub const MAX_RETRY_HINT: Duration = Duration::from_secs(60);

/// Configuration for retry behavior.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Backoff before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for a single backoff.
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the specified max retries.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Create a config with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Backoff to wait after the given zero-based failed attempt.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let backoff =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let backoff_ms = backoff.min(self.max_backoff.as_millis() as f64) as u64;

        Duration::from_millis(backoff_ms)
    }
}

/// Extract a retry delay embedded in an error message or body.
///
/// Recognises `"retryDelay": "19s"` (Gemini `RetryInfo`), `retry in 19.2s`
/// and `try again in 20s` (OpenAI). Returns `None` when no hint is found.
/// Hints are clamped to [`MAX_RETRY_HINT`].
pub fn parse_retry_delay(text: &str) -> Option<Duration> {
    let lower = text.to_ascii_lowercase();

    RETRY_HINT_MARKERS.iter().find_map(|marker| {
        lower
            .match_indices(marker)
            .find_map(|(idx, _)| seconds_token(&lower[idx + marker.len()..]))
    })
}

/// Parse a `Retry-After` header given in delta-seconds, clamped to [`MAX_RETRY_HINT`].
pub fn parse_retry_after_header(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_HINT))
}

/// First `<number>s` token near the start of `tail`.
fn seconds_token(tail: &str) -> Option<Duration> {
    let chars: Vec<char> = tail.chars().take(RETRY_HINT_WINDOW).collect();
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
            i += 1;
        }

        let has_unit = chars.get(i) == Some(&'s')
            && !chars.get(i + 1).is_some_and(|c| c.is_alphanumeric());
        if has_unit {
            let number: String = chars[start..i].iter().collect();
            if let Ok(seconds) = number.parse::<f64>()
                && seconds.is_finite()
            {
                // Out of range for Duration means far past the clamp anyway.
                let delay = Duration::try_from_secs_f64(seconds).unwrap_or(MAX_RETRY_HINT);
                return Some(delay.min(MAX_RETRY_HINT));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_doubles() {
        let config = RetryConfig::default();

        assert_eq!(config.backoff_duration(0), Duration::from_millis(1000));
        assert_eq!(config.backoff_duration(1), Duration::from_millis(2000));
        assert_eq!(config.backoff_duration(2), Duration::from_millis(4000));
        assert_eq!(config.backoff_duration(3), Duration::from_millis(8000));
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig {
            max_backoff: Duration::from_secs(5),
            ..Default::default()
        };
        assert_eq!(config.backoff_duration(10), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_gemini_retry_info() {
        let body = r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED","details":[
            {"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"19s"}]}}"#;
        assert_eq!(parse_retry_delay(body), Some(Duration::from_secs(19)));
    }

    #[test]
    fn test_parse_fractional_retry_in() {
        let msg = "[429 Too Many Requests] Quota exceeded. Please retry in 2.5s.";
        assert_eq!(parse_retry_delay(msg), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_parse_openai_try_again() {
        let msg = "Rate limit reached for gpt-4o-mini. Please try again in 20s. Visit ...";
        assert_eq!(parse_retry_delay(msg), Some(Duration::from_secs(20)));
    }

    #[test]
    fn test_parse_ignores_unrelated_numbers() {
        assert_eq!(parse_retry_delay("model overloaded (503)"), None);
        assert_eq!(parse_retry_delay("retry in 30 seconds"), None);
        assert_eq!(parse_retry_delay("used 5s of compute"), None);
    }

    #[test]
    fn test_parse_clamps_oversized_hints() {
        let msg = "Quota exceeded. Please retry in 99999999999999999999999s.";
        assert_eq!(parse_retry_delay(msg), Some(MAX_RETRY_HINT));
        assert_eq!(
            parse_retry_delay(r#"{"retryDelay": "86400s"}"#),
            Some(MAX_RETRY_HINT)
        );
    }

    #[test]
    fn test_parse_retry_after_header() {
        assert_eq!(parse_retry_after_header(" 7 "), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after_header("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(
            parse_retry_after_header("18446744073709551615"),
            Some(MAX_RETRY_HINT)
        );
    }
}
