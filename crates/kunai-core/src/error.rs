use thiserror::Error;

/// Errors raised while bootstrapping configuration and logging.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A loaded setting is outside the range the engine accepts.
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: &'static str, reason: String },
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
