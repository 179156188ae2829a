//! Error types for caddis-sync.
//!
//! Library crates use [`SyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all caddis-sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport failure (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status that is not an exhaustion signal.
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    /// Response body did not match the endpoint schema.
    #[error("payload error: {message}")]
    Payload { message: String },

    /// Login failed or no token could be located in the login response.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// A record field could not be coerced to a finite decimal number.
    #[error("conversion error: {field} = {value:?} is not a finite number")]
    Conversion { field: &'static str, value: String },

    /// Destination table write failed.
    #[error("sink error: {0}")]
    Sink(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a payload error from any displayable message.
    pub fn payload(msg: impl Into<String>) -> Self {
        Self::Payload {
            message: msg.into(),
        }
    }

    /// Create a conversion error for a named record field.
    pub fn conversion(field: &'static str, value: impl Into<String>) -> Self {
        Self::Conversion {
            field,
            value: value.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
