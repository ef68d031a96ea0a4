use crate::config::ConfigError;

/// Top-level error for the `chat-bridge` binary.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Usage error: {0}")]
    Usage(String),
}

impl BridgeError {
    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            BridgeError::Usage(_) => 2,
            BridgeError::Config(_) | BridgeError::Io(_) => 1,
        }
    }
}
