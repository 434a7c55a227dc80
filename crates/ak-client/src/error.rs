// error.rs: error types for the action client.

use std::path::PathBuf;

use ak_protocol::ProtocolError;
use thiserror::Error;

/// Errors surfaced by the action client.
///
/// Calling a query with no goal tracked, or receiving a notification that
/// does not fit the goal's lifecycle, is not an error: those are logged and
/// answered with a safe default.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The protocol engine did not accept the goal.
    #[error("failed to send goal on {namespace}: {source}")]
    SendFailed {
        namespace: String,
        source: ProtocolError,
    },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize a lifecycle event.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The configuration file could not be parsed.
    #[error("invalid config {path}: {source}")]
    ConfigError {
        path: PathBuf,
        source: toml::de::Error,
    },
}
