//! Request and response bodies.
//!
//! Binary bodies use little-endian fixed-width fields:
//!
//! | opcode | body |
//! |---|---|
//! | `SUBMIT` | rows u64, cols u64, value-type code u8, element bytes |
//! | `FETCH` / `SHAPE` / `RELEASE` | handle u64 |
//! | `ORDER` | handle u64, by u64 (1-based column), decreasing u8, index_return u8 |
//! | `HANDLE` | handle u64 |
//! | `MATRIX_BYTES` | FP64 row-major element bytes |
//! | `SHAPE_INFO` | rows u64, cols u64 |
//! | `ACK` | empty |
//!
//! `HELLO`, `WELCOME` and `ERROR` carry JSON.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::codec::Frame;
use crate::error::{FrameError, Result};
use crate::opcode::{self, opcode_name};

/// Protocol name exchanged during the handshake.
pub const PROTOCOL_NAME: &str = "mxbridge";
/// Protocol version exchanged during the handshake.
pub const PROTOCOL_VERSION: &str = "1";

/// Client handshake body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hello {
    pub protocol: String,
    pub version: String,
}

impl Default for Hello {
    fn default() -> Self {
        Self {
            protocol: PROTOCOL_NAME.to_string(),
            version: PROTOCOL_VERSION.to_string(),
        }
    }
}

/// Server handshake body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Welcome {
    pub protocol: String,
    pub version: String,
    /// Server-assigned session identifier.
    pub session_id: String,
}

/// Category of a remote failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Conversion arguments rejected (bad tag, shape/length mismatch).
    Conversion,
    /// Row or column selector outside the matrix.
    OutOfBounds,
    /// No matrix under the given handle.
    UnknownHandle,
    /// Malformed or unexpected message.
    Protocol,
    /// Handshake refused.
    Handshake,
}

/// Body of an `ERROR` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorReply {
    pub kind: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<u64>,
}

impl ErrorReply {
    pub fn new(kind: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            axis: None,
            index: None,
            len: None,
            handle: None,
        }
    }
}

/// Messages sent by a client.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Hello(Hello),
    Submit {
        rows: u64,
        cols: u64,
        value_type: u8,
        data: Bytes,
    },
    Fetch {
        handle: u64,
    },
    Shape {
        handle: u64,
    },
    Release {
        handle: u64,
    },
    Order {
        handle: u64,
        by: u64,
        decreasing: bool,
        index_return: bool,
    },
}

/// Messages sent by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Welcome(Welcome),
    Handle(u64),
    MatrixBytes(Bytes),
    ShapeInfo { rows: u64, cols: u64 },
    Ack,
    Error(ErrorReply),
}

impl Request {
    /// Opcode this request travels under.
    pub fn opcode(&self) -> u16 {
        match self {
            Request::Hello(_) => opcode::HELLO,
            Request::Submit { .. } => opcode::SUBMIT,
            Request::Fetch { .. } => opcode::FETCH,
            Request::Shape { .. } => opcode::SHAPE,
            Request::Release { .. } => opcode::RELEASE,
            Request::Order { .. } => opcode::ORDER,
        }
    }

    pub fn name(&self) -> &'static str {
        opcode_name(self.opcode())
    }
}

impl Response {
    /// Opcode this response travels under.
    pub fn opcode(&self) -> u16 {
        match self {
            Response::Welcome(_) => opcode::WELCOME,
            Response::Handle(_) => opcode::HANDLE,
            Response::MatrixBytes(_) => opcode::MATRIX_BYTES,
            Response::ShapeInfo { .. } => opcode::SHAPE_INFO,
            Response::Ack => opcode::ACK,
            Response::Error(_) => opcode::ERROR,
        }
    }

    pub fn name(&self) -> &'static str {
        opcode_name(self.opcode())
    }
}

/// A message that maps onto exactly one frame.
pub trait WireMessage: Sized {
    fn to_frame(&self) -> Result<Frame>;
    fn from_frame(frame: Frame) -> Result<Self>;
}

impl WireMessage for Request {
    fn to_frame(&self) -> Result<Frame> {
        let frame = match self {
            Request::Hello(hello) => Frame::new(opcode::HELLO, serde_json::to_vec(hello)?),
            Request::Submit {
                rows,
                cols,
                value_type,
                data,
            } => {
                let mut body = BytesMut::with_capacity(17 + data.len());
                body.put_u64_le(*rows);
                body.put_u64_le(*cols);
                body.put_u8(*value_type);
                body.put_slice(data);
                Frame::new(opcode::SUBMIT, body.freeze())
            }
            Request::Fetch { handle } => handle_frame(opcode::FETCH, *handle),
            Request::Shape { handle } => handle_frame(opcode::SHAPE, *handle),
            Request::Release { handle } => handle_frame(opcode::RELEASE, *handle),
            Request::Order {
                handle,
                by,
                decreasing,
                index_return,
            } => {
                let mut body = BytesMut::with_capacity(18);
                body.put_u64_le(*handle);
                body.put_u64_le(*by);
                body.put_u8(u8::from(*decreasing));
                body.put_u8(u8::from(*index_return));
                Frame::new(opcode::ORDER, body.freeze())
            }
        };
        Ok(frame)
    }

    fn from_frame(frame: Frame) -> Result<Self> {
        let op = frame.opcode;
        let mut body = Body::new(op, frame.payload);
        let request = match op {
            opcode::HELLO => Request::Hello(serde_json::from_slice(body.rest().as_ref())?),
            opcode::SUBMIT => Request::Submit {
                rows: body.u64()?,
                cols: body.u64()?,
                value_type: body.u8()?,
                data: body.rest(),
            },
            opcode::FETCH => Request::Fetch {
                handle: body.u64()?,
            },
            opcode::SHAPE => Request::Shape {
                handle: body.u64()?,
            },
            opcode::RELEASE => Request::Release {
                handle: body.u64()?,
            },
            opcode::ORDER => Request::Order {
                handle: body.u64()?,
                by: body.u64()?,
                decreasing: body.flag()?,
                index_return: body.flag()?,
            },
            other => return Err(FrameError::UnexpectedOpcode(other)),
        };
        body.finish()?;
        Ok(request)
    }
}

impl WireMessage for Response {
    fn to_frame(&self) -> Result<Frame> {
        let frame = match self {
            Response::Welcome(welcome) => {
                Frame::new(opcode::WELCOME, serde_json::to_vec(welcome)?)
            }
            Response::Handle(handle) => handle_frame(opcode::HANDLE, *handle),
            Response::MatrixBytes(data) => Frame::new(opcode::MATRIX_BYTES, data.clone()),
            Response::ShapeInfo { rows, cols } => {
                let mut body = BytesMut::with_capacity(16);
                body.put_u64_le(*rows);
                body.put_u64_le(*cols);
                Frame::new(opcode::SHAPE_INFO, body.freeze())
            }
            Response::Ack => Frame::new(opcode::ACK, Bytes::new()),
            Response::Error(reply) => Frame::new(opcode::ERROR, serde_json::to_vec(reply)?),
        };
        Ok(frame)
    }

    fn from_frame(frame: Frame) -> Result<Self> {
        let op = frame.opcode;
        let mut body = Body::new(op, frame.payload);
        let response = match op {
            opcode::WELCOME => Response::Welcome(serde_json::from_slice(body.rest().as_ref())?),
            opcode::HANDLE => Response::Handle(body.u64()?),
            opcode::MATRIX_BYTES => Response::MatrixBytes(body.rest()),
            opcode::SHAPE_INFO => Response::ShapeInfo {
                rows: body.u64()?,
                cols: body.u64()?,
            },
            opcode::ACK => Response::Ack,
            opcode::ERROR => Response::Error(serde_json::from_slice(body.rest().as_ref())?),
            other => return Err(FrameError::UnexpectedOpcode(other)),
        };
        body.finish()?;
        Ok(response)
    }
}

fn handle_frame(op: u16, handle: u64) -> Frame {
    Frame::new(op, Bytes::copy_from_slice(&handle.to_le_bytes()))
}

/// Cursor over a message body with length-checked reads.
struct Body {
    opcode: &'static str,
    buf: Bytes,
}

impl Body {
    fn new(op: u16, buf: Bytes) -> Self {
        Self {
            opcode: opcode_name(op),
            buf,
        }
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(FrameError::Malformed {
                opcode: self.opcode,
                reason: format!("need {n} more bytes, have {}", self.buf.remaining()),
            });
        }
        Ok(())
    }

    fn u64(&mut self) -> Result<u64> {
        self.need(8)?;
        Ok(self.buf.get_u64_le())
    }

    fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn flag(&mut self) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(FrameError::Malformed {
                opcode: self.opcode,
                reason: format!("flag byte must be 0 or 1, got {other}"),
            }),
        }
    }

    fn rest(&mut self) -> Bytes {
        self.buf.split_to(self.buf.len())
    }

    fn finish(self) -> Result<()> {
        if self.buf.has_remaining() {
            return Err(FrameError::Malformed {
                opcode: self.opcode,
                reason: format!("{} trailing bytes", self.buf.remaining()),
            });
        }
        Ok(())
    }
}
