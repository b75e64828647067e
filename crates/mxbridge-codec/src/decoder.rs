use tracing::debug;

use crate::array::{ArrayData, LocalArray};
use crate::config::CodecConfig;
use crate::dtype::ValueType;
use crate::error::Result;
use crate::gateway::{MatrixGateway, MatrixHandle};
use crate::wire::{checked_byte_len, WireBuffer};

/// Rebuild a `rows x cols` `f64` array from row-major wire bytes.
///
/// The byte count must match the shape exactly; nothing is truncated or
/// padded.
pub fn from_wire(bytes: impl Into<bytes::Bytes>, rows: usize, cols: usize) -> Result<LocalArray> {
    let wire = WireBuffer::new(bytes, rows, cols, ValueType::Fp64)?;
    Ok(LocalArray::from_parts(
        vec![rows, cols],
        ArrayData::F64(wire.to_f64_values()),
    ))
}

/// Fetch a remote matrix into a local `f64` array of shape `(rows, cols)`.
pub fn decode<G>(gateway: &G, handle: MatrixHandle) -> Result<LocalArray>
where
    G: MatrixGateway + ?Sized,
{
    decode_with_config(gateway, handle, &CodecConfig::default())
}

/// Like [`decode`], with explicit limits.
pub fn decode_with_config<G>(
    gateway: &G,
    handle: MatrixHandle,
    config: &CodecConfig,
) -> Result<LocalArray>
where
    G: MatrixGateway + ?Sized,
{
    let (rows, cols) = gateway.shape(handle)?;
    let limit = config.max_buffer_len.min(gateway.max_buffer_len());
    checked_byte_len(rows, cols, ValueType::Fp64, limit)?;

    let bytes = gateway.fetch(handle)?;
    debug!(%handle, rows, cols, len = bytes.len(), "decoding matrix");
    from_wire(bytes, rows, cols)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::encoder::encode;
    use crate::error::{CodecError, ErrorKind, GatewayError};
    use crate::memory::{InMemoryGateway, MatrixBlock};
    use crate::wire::WireBuffer;

    #[test]
    fn fp64_round_trip_is_exact() {
        let gateway = InMemoryGateway::new();
        let values = vec![1.0, -0.0, f64::MIN_POSITIVE, 1e308, std::f64::consts::PI, -2.5];
        let arr = LocalArray::from_shape_vec(3, 2, values.clone()).unwrap();

        let handle = encode(&gateway, &arr).unwrap();
        let back = decode(&gateway, handle).unwrap();

        assert_eq!(back.shape(), &[3, 2]);
        let got = back.as_f64_slice().unwrap();
        for (a, b) in got.iter().zip(&values) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn narrow_types_come_back_as_f64() {
        let gateway = InMemoryGateway::new();
        let cases = [
            LocalArray::from_shape_vec(2, 2, vec![0u8, 1, 254, 255]).unwrap(),
            LocalArray::from_shape_vec(2, 2, vec![i32::MIN, -1, 0, i32::MAX]).unwrap(),
            LocalArray::from_shape_vec(2, 2, vec![0.1f32, -3.5, f32::MAX, 1e-7]).unwrap(),
        ];
        for arr in cases {
            let handle = encode(&gateway, &arr).unwrap();
            let back = decode(&gateway, handle).unwrap();
            assert_eq!(back.shape(), &[2, 2]);
            assert_eq!(back.as_f64_slice().unwrap(), arr.to_f64_vec().as_slice());
        }
    }

    #[test]
    fn one_dimensional_comes_back_as_column() {
        let gateway = InMemoryGateway::new();
        let arr = LocalArray::from_vec(vec![1.0f64, 2.0, 3.0]);
        let handle = encode(&gateway, &arr).unwrap();
        let back = decode(&gateway, handle).unwrap();
        assert_eq!(back.shape(), &[3, 1]);
        assert_eq!(back.get(2, 0), Some(3.0));
    }

    #[test]
    fn empty_shapes_decode() {
        let gateway = InMemoryGateway::new();
        for (rows, cols) in [(0, 0), (0, 5), (5, 0)] {
            let handle = gateway
                .insert(MatrixBlock::new(rows, cols, vec![]).unwrap())
                .unwrap();
            let back = decode(&gateway, handle).unwrap();
            assert_eq!(back.shape(), &[rows, cols]);
            assert!(back.is_empty());
        }
    }

    #[test]
    fn short_buffer_is_a_mismatch() {
        let gateway = LyingGateway {
            shape: (2, 2),
            bytes: Bytes::from(vec![0u8; 24]),
        };
        let err = decode(&gateway, MatrixHandle::from_raw(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert!(matches!(
            err,
            CodecError::ElementCountMismatch {
                rows: 2,
                cols: 2,
                expected: 32,
                actual: 24,
                ..
            }
        ));
    }

    #[test]
    fn long_buffer_is_a_mismatch() {
        let gateway = LyingGateway {
            shape: (1, 1),
            bytes: Bytes::from(vec![0u8; 9]),
        };
        let err = decode(&gateway, MatrixHandle::from_raw(1)).unwrap_err();
        assert!(matches!(err, CodecError::ElementCountMismatch { .. }));
    }

    #[test]
    fn overflowing_shape_fails_before_fetch() {
        let gateway = LyingGateway {
            shape: (usize::MAX, 3),
            bytes: Bytes::new(),
        };
        let err = decode(&gateway, MatrixHandle::from_raw(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedRange);
    }

    #[test]
    fn unknown_handle_is_remote_error() {
        let gateway = InMemoryGateway::new();
        let err = decode(&gateway, MatrixHandle::from_raw(42)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Remote);
    }

    struct LyingGateway {
        shape: (usize, usize),
        bytes: Bytes,
    }

    impl MatrixGateway for LyingGateway {
        fn submit(&self, _buffer: WireBuffer) -> std::result::Result<MatrixHandle, GatewayError> {
            Err(GatewayError::Conversion("read-only".into()))
        }

        fn fetch(&self, _handle: MatrixHandle) -> std::result::Result<Bytes, GatewayError> {
            Ok(self.bytes.clone())
        }

        fn shape(&self, _handle: MatrixHandle) -> std::result::Result<(usize, usize), GatewayError> {
            Ok(self.shape)
        }
    }
}
