//! The `error` module defines the error type used across `topicrelay`.
//!
//! Registry operations never fail; errors only come from sockets, from
//! configuration loading and from handshake parsing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The listening socket could not be created. Fatal at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid role '{0}', expected PUBLISHER or SUBSCRIBER")]
    InvalidRole(String),

    /// The server answered the handshake with something other than an
    /// acknowledgment, or closed the connection before answering.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),
}
