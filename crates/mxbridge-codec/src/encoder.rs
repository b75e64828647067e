use bytes::BytesMut;
use tracing::{debug, warn};

use crate::array::LocalArray;
use crate::config::CodecConfig;
use crate::dtype::dispatch;
use crate::error::Result;
use crate::gateway::{MatrixGateway, MatrixHandle};
use crate::wire::{checked_byte_len, WireBuffer};

/// Flatten `array` into a wire buffer without contacting any gateway.
///
/// `limit` caps the resulting byte length.
pub fn to_wire(array: &LocalArray, limit: usize) -> Result<WireBuffer> {
    let (rows, cols) = array.matrix_dims()?;
    let resolved = dispatch(array.element_type());
    let len = checked_byte_len(rows, cols, resolved.value_type, limit)?;

    let mut buf = BytesMut::with_capacity(len);
    array.data().put_wire(resolved.cast, &mut buf);

    WireBuffer::new(buf.freeze(), rows, cols, resolved.value_type)
}

/// Send a local array to the remote engine and return its handle.
pub fn encode<G>(gateway: &G, array: &LocalArray) -> Result<MatrixHandle>
where
    G: MatrixGateway + ?Sized,
{
    encode_with_config(gateway, array, &CodecConfig::default())
}

/// Like [`encode`], with explicit limits.
///
/// Any gateway failure triggers [`MatrixGateway::abort`] before it is
/// returned. The call is never retried.
pub fn encode_with_config<G>(
    gateway: &G,
    array: &LocalArray,
    config: &CodecConfig,
) -> Result<MatrixHandle>
where
    G: MatrixGateway + ?Sized,
{
    let limit = config.max_buffer_len.min(gateway.max_buffer_len());
    let wire = to_wire(array, limit)?;
    let (rows, cols, value_type, len) = (wire.rows(), wire.cols(), wire.value_type(), wire.len());

    match gateway.submit(wire) {
        Ok(handle) => {
            debug!(%handle, rows, cols, %value_type, len, "encoded matrix");
            Ok(handle)
        }
        Err(err) => {
            warn!(rows, cols, %value_type, len, error = %err, "matrix submit failed");
            gateway.abort();
            Err(err.into())
        }
    }
}
