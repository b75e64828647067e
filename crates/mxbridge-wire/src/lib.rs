//! Framing and messages for the mxbridge matrix protocol.
//!
//! Every frame carries:
//! - a 2-byte magic number ("MX") for stream synchronization
//! - a 4-byte little-endian payload length
//! - a 2-byte little-endian opcode naming the message
//!
//! Matrix payloads travel as raw bytes; handshake and error bodies are JSON.

pub mod codec;
pub mod error;
pub mod message;
pub mod opcode;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, encode_header, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use message::{
    ErrorCode, ErrorReply, Hello, Request, Response, Welcome, WireMessage, PROTOCOL_NAME,
    PROTOCOL_VERSION,
};
pub use reader::FrameReader;
pub use writer::FrameWriter;
