use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::opcode::opcode_name;

/// Frame header: magic (2) + length (4) + opcode (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "MX" (0x4D 0x58).
pub const MAGIC: [u8; 2] = *b"MX";

/// Default maximum payload size: 256 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 256 * 1024 * 1024;

/// One protocol message on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Message opcode (see [`crate::opcode`]).
    pub opcode: u16,
    /// Message body.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(opcode: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Opcode name for diagnostics.
    pub fn name(&self) -> &'static str {
        opcode_name(self.opcode)
    }
}

/// Encode a frame into the wire format.
///
/// ```text
/// ┌──────────────┬───────────┬──────────┬──────────────────┐
/// │ Magic (2B)   │ Length    │ Opcode   │ Payload          │
/// │ 0x4D 0x58    │ (4B LE)   │ (2B LE)  │ (Length bytes)   │
/// │ "MX"         │           │          │                  │
/// └──────────────┴───────────┴──────────┴──────────────────┘
/// ```
pub fn encode_frame(opcode: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let header = encode_header(opcode, payload.len())?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&header);
    dst.put_slice(payload);
    Ok(())
}

/// The 8 header bytes announcing a payload of `payload_len` bytes.
pub fn encode_header(opcode: u16, payload_len: usize) -> Result<[u8; HEADER_SIZE]> {
    let len = u32::try_from(payload_len).map_err(|_| FrameError::PayloadTooLarge {
        size: payload_len,
        max: u32::MAX as usize,
    })?;
    let mut header = [0u8; HEADER_SIZE];
    header[..2].copy_from_slice(&MAGIC);
    header[2..6].copy_from_slice(&len.to_le_bytes());
    header[6..].copy_from_slice(&opcode.to_le_bytes());
    Ok(header)
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let mut header = &src[2..HEADER_SIZE];
    let payload_len = header.get_u32_le() as usize;
    let opcode = header.get_u16_le();

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { opcode, payload }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 256 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{FETCH, MATRIX_BYTES, SUBMIT};

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = 1.0f64.to_le_bytes();

        encode_frame(MATRIX_BYTES, &payload, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + payload.len());
        assert_eq!(&buf[..2], b"MX");

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.opcode, MATRIX_BYTES);
        assert_eq!(frame.payload.as_ref(), &payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&b"MX\x00"[..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(SUBMIT, b"partial-matrix", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 3);

        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_decode_invalid_magic() {
        let mut buf = BytesMut::from(&[0x49, 0x50, 0, 0, 0, 0, 0, 0][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidMagic)));
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(4096);
        buf.put_u16_le(SUBMIT);

        let result = decode_frame(&mut buf, 1024);
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge {
                size: 4096,
                max: 1024
            })
        ));
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut buf = BytesMut::new();
        encode_frame(FETCH, &7u64.to_le_bytes(), &mut buf).unwrap();
        encode_frame(MATRIX_BYTES, b"", &mut buf).unwrap();

        let first = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        let second = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(first.name(), "FETCH");
        assert_eq!(second.opcode, MATRIX_BYTES);
        assert!(second.payload.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_header_layout() {
        let header = encode_header(SUBMIT, 0x0102_0304).unwrap();
        assert_eq!(header, [b'M', b'X', 0x04, 0x03, 0x02, 0x01, 0x10, 0x00]);
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = Frame::new(FETCH, Bytes::from_static(&[0; 8]));
        assert_eq!(frame.wire_size(), HEADER_SIZE + 8);
    }
}
