//! Persona system prompt.
//!
//! The prompt is static configuration: the built-in persona ships with the
//! binary and a deployment may point `PERSONA_PROMPT_FILE` at its own.

use anyhow::Context;
use service_core::error::AppError;

pub const DEFAULT_PERSONA: &str = include_str!("../../persona/bagheera.txt");

pub fn load_persona(path: Option<&str>) -> Result<String, AppError> {
    let Some(path) = path else {
        return Ok(DEFAULT_PERSONA.trim().to_string());
    };

    let prompt = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read persona prompt from {}", path))
        .map_err(AppError::ConfigError)?;

    if prompt.trim().is_empty() {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "Persona prompt file {} is empty",
            path
        )));
    }

    Ok(prompt.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_persona() {
        let prompt = load_persona(None).unwrap();
        assert!(prompt.starts_with("You are Bagheera"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = load_persona(Some("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
