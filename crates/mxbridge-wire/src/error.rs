/// Errors that can occur while framing or parsing protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x4D58 \"MX\")")]
    InvalidMagic,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// The opcode is not part of the protocol, or not valid in this direction.
    #[error("unexpected opcode 0x{0:04x}")]
    UnexpectedOpcode(u16),

    /// A message body did not have the layout its opcode requires.
    #[error("malformed {opcode} body: {reason}")]
    Malformed {
        opcode: &'static str,
        reason: String,
    },

    /// A JSON message body could not be encoded or decoded.
    #[error("json body error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
