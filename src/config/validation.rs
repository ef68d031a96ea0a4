use super::{AppConfig, ConfigError};

const MAX_READ_CHUNK_SIZE: usize = 16 * 1024 * 1024;
const VALID_LOG_LEVELS: &[&str] = &[
    "TRACE", "DEBUG", "INFO", "WARNING", "WARN", "ERROR", "CRITICAL", "DISABLED",
];

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_translator(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_translator(config: &AppConfig) -> Result<(), ConfigError> {
    let translator = &config.translator;
    if translator.read_chunk_size == 0 {
        return Err(validation_err(
            "translator.read_chunk_size must be greater than 0",
        ));
    }
    if translator.read_chunk_size > MAX_READ_CHUNK_SIZE {
        return Err(validation_err(format!(
            "translator.read_chunk_size must be at most {MAX_READ_CHUNK_SIZE}"
        )));
    }
    if translator.thinking_signature.chars().any(char::is_control) {
        return Err(validation_err(
            "translator.thinking_signature must not contain control characters",
        ));
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.features.log_level.to_uppercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(validation_err(format!(
            "Invalid log_level '{}'. Must be one of: {}",
            config.features.log_level,
            VALID_LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::default()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = base_config();
        config.translator.read_chunk_size = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("read_chunk_size"));
    }

    #[test]
    fn test_huge_chunk_size_rejected() {
        let mut config = base_config();
        config.translator.read_chunk_size = MAX_READ_CHUNK_SIZE + 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_control_chars_in_signature_rejected() {
        let mut config = base_config();
        config.translator.thinking_signature = "sig\nnature".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_log_level_case_insensitive() {
        let mut config = base_config();
        config.features.log_level = "debug".to_string();
        assert!(validate_config(&config).is_ok());
        config.features.log_level = "warning".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let mut config = base_config();
        config.features.log_level = "VERBOSE".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("Invalid log_level"));
    }
}
