use std::path::PathBuf;

use mxbridge_wire::{ErrorReply, FrameError};

/// Errors that can occur on either end of an engine connection.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the socket.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Handshake failed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The engine answered with an error reply.
    #[error("engine error: {}", .0.message)]
    Engine(ErrorReply),

    /// The engine answered with a message that does not fit the request.
    #[error("unexpected {got} response to {request}")]
    UnexpectedResponse {
        request: &'static str,
        got: &'static str,
    },

    /// The connection has been shut down.
    #[error("connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, RemoteError>;
