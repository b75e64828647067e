use std::io::{ErrorKind, Write};

use tracing::trace;

use crate::codec::{encode_header, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::message::WireMessage;

/// Writes complete frames to any `Write` stream.
///
/// The header and the payload are written separately, so matrix payloads
/// are never copied into an intermediate buffer.
pub struct FrameWriter<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.opcode, frame.payload.as_ref())
    }

    /// Encode and write a protocol message.
    pub fn write_message<M: WireMessage>(&mut self, message: &M) -> Result<()> {
        self.write_frame(&message.to_frame()?)
    }

    /// Send a payload under an opcode.
    pub fn send(&mut self, opcode: u16, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        let header = encode_header(opcode, payload.len())?;
        self.write_all(&header)?;
        self.write_all(payload)?;
        trace!(opcode, len = payload.len(), "frame written");

        self.flush()
    }

    fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            match self.inner.write(data) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => data = &data[n..],
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }
}
