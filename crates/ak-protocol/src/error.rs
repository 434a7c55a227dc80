// error.rs: errors an engine reports when it cannot accept a goal.

use thiserror::Error;

/// Errors raised by a protocol engine while submitting a goal.
///
/// Everything after submission (lost goals, rejections by the server,
/// transport hiccups) is reported asynchronously through the goal's
/// communication state, not through this type.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// No action server is connected on the namespace.
    #[error("no action server available on {namespace}")]
    ServerUnavailable { namespace: String },

    /// The engine refused the goal before it reached the server.
    #[error("goal rejected by engine: {0}")]
    Rejected(String),

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),
}
