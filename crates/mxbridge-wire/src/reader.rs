use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::message::WireMessage;

const MIN_READ: usize = 8 * 1024;
const MAX_READ: usize = 1024 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// Once a header has been seen, payload bytes are read straight into a
/// buffer sized for the whole frame.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(MIN_READ),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                trace!(opcode = frame.name(), len = frame.payload.len(), "frame read");
                return Ok(frame);
            }

            // decode_frame reserves room for the rest of a frame whose header it saw.
            let spare = self.buf.capacity() - self.buf.len();
            let want = spare.clamp(MIN_READ, MAX_READ);
            if self.fill(want)? == 0 {
                return Err(FrameError::ConnectionClosed);
            }
        }
    }

    /// Append up to `want` bytes from the stream to the buffer.
    fn fill(&mut self, want: usize) -> Result<usize> {
        let start = self.buf.len();
        self.buf.resize(start + want, 0);
        loop {
            match self.inner.read(&mut self.buf[start..]) {
                Ok(n) => {
                    self.buf.truncate(start + n);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buf.truncate(start);
                    return Err(FrameError::Io(err));
                }
            }
        }
    }

    /// Read the next frame and parse it as `M`.
    pub fn read_message<M: WireMessage>(&mut self) -> Result<M> {
        M::from_frame(self.read_frame()?)
    }

    /// Change the payload limit, e.g. once a handshake has completed.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{BufMut, Bytes, BytesMut};

    use super::*;
    use crate::codec::{encode_frame, MAGIC};
    use crate::message::{Request, Response};
    use crate::opcode::{FETCH, MATRIX_BYTES, SHAPE};

    #[test]
    fn read_single_frame() {
        let mut wire = BytesMut::new();
        encode_frame(FETCH, &3u64.to_le_bytes(), &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.opcode, FETCH);
        assert_eq!(frame.payload.as_ref(), &3u64.to_le_bytes());
    }

    #[test]
    fn read_typed_messages() {
        let mut wire = BytesMut::new();
        encode_frame(SHAPE, &11u64.to_le_bytes(), &mut wire).unwrap();
        encode_frame(FETCH, &11u64.to_le_bytes(), &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        assert_eq!(
            reader.read_message::<Request>().unwrap(),
            Request::Shape { handle: 11 }
        );
        assert_eq!(
            reader.read_message::<Request>().unwrap(),
            Request::Fetch { handle: 11 }
        );
    }

    #[test]
    fn read_large_matrix_payload() {
        let payload = vec![0xAB; 256 * 1024];
        let mut wire = BytesMut::new();
        encode_frame(MATRIX_BYTES, &payload, &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let response = reader.read_message::<Response>().unwrap();
        assert_eq!(response, Response::MatrixBytes(Bytes::from(payload)));
    }

    #[test]
    fn partial_read_handling() {
        let mut wire = BytesMut::new();
        encode_frame(FETCH, &5u64.to_le_bytes(), &mut wire).unwrap();

        let mut reader = FrameReader::new(ByteByByteReader {
            bytes: wire.to_vec(),
            pos: 0,
        });

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.opcode, FETCH);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        partial.put_slice(&MAGIC);
        partial.put_u32_le(16);
        partial.put_u16_le(MATRIX_BYTES);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn payload_limit_enforced() {
        let mut wire = BytesMut::new();
        encode_frame(MATRIX_BYTES, &[0u8; 64], &mut wire).unwrap();

        let config = FrameConfig {
            max_payload_size: 32,
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire.to_vec()), config);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 64, max: 32 }));
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let mut wire = BytesMut::new();
        encode_frame(FETCH, &1u64.to_le_bytes(), &mut wire).unwrap();

        let mut reader = FrameReader::new(InterruptOnce {
            inner: Cursor::new(wire.to_vec()),
            interrupted: false,
        });
        assert_eq!(reader.read_frame().unwrap().opcode, FETCH);
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptOnce {
        inner: Cursor<Vec<u8>>,
        interrupted: bool,
    }

    impl Read for InterruptOnce {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
