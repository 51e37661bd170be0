//! Error types shared across Kart crates

use thiserror::Error;

/// Result type alias for Kart operations
pub type Result<T> = std::result::Result<T, KartError>;

/// Errors raised while assembling process-level state (configuration, paths)
#[derive(Error, Debug)]
pub enum KartError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}. Check your environment variables or .env file.")]
    Config(String),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

impl KartError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an error for an environment variable that failed to parse
    pub fn invalid_value(key: &str, value: &str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_message() {
        let err = KartError::invalid_value("COUPON_BATCH_SIZE", "lots");
        assert_eq!(err.to_string(), "Invalid value for COUPON_BATCH_SIZE: 'lots'");
    }

    #[test]
    fn test_config_message_mentions_env() {
        let err = KartError::config("batch size must be greater than 0");
        assert!(err.to_string().contains("batch size must be greater than 0"));
        assert!(err.to_string().contains("environment"));
    }
}
