//! Common error types for Vela

use thiserror::Error;

/// Common result type for Vela operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the Vela crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed
    #[error("Settings parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
