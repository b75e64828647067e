use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::GatewayError;
use crate::wire::{WireBuffer, MAX_BUFFER_LEN};

/// Opaque reference to a matrix held by the remote engine.
///
/// The local side never owns the matrix; dropping a handle does not free it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatrixHandle(u64);

impl MatrixHandle {
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MatrixHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The remote conversion entry point, as seen by the codec.
///
/// Implementations own connection ordering and mutual exclusion; the codec
/// calls each method once per conversion and holds no state between calls.
pub trait MatrixGateway {
    /// Create a remote matrix from a wire buffer.
    ///
    /// The buffer is handed over for the duration of the call.
    fn submit(&self, buffer: WireBuffer) -> Result<MatrixHandle, GatewayError>;

    /// Dense row-major `f64` little-endian bytes of a remote matrix.
    fn fetch(&self, handle: MatrixHandle) -> Result<Bytes, GatewayError>;

    /// `(rows, cols)` of a remote matrix. Metadata only, no copy.
    fn shape(&self, handle: MatrixHandle) -> Result<(usize, usize), GatewayError>;

    /// Largest buffer this gateway can carry in a single call.
    fn max_buffer_len(&self) -> usize {
        MAX_BUFFER_LEN
    }

    /// Release the remote environment after a failed conversion.
    fn abort(&self) {}
}

impl<G: MatrixGateway + ?Sized> MatrixGateway for &G {
    fn submit(&self, buffer: WireBuffer) -> Result<MatrixHandle, GatewayError> {
        (**self).submit(buffer)
    }

    fn fetch(&self, handle: MatrixHandle) -> Result<Bytes, GatewayError> {
        (**self).fetch(handle)
    }

    fn shape(&self, handle: MatrixHandle) -> Result<(usize, usize), GatewayError> {
        (**self).shape(handle)
    }

    fn max_buffer_len(&self) -> usize {
        (**self).max_buffer_len()
    }

    fn abort(&self) {
        (**self).abort()
    }
}

impl<G: MatrixGateway + ?Sized> MatrixGateway for Arc<G> {
    fn submit(&self, buffer: WireBuffer) -> Result<MatrixHandle, GatewayError> {
        (**self).submit(buffer)
    }

    fn fetch(&self, handle: MatrixHandle) -> Result<Bytes, GatewayError> {
        (**self).fetch(handle)
    }

    fn shape(&self, handle: MatrixHandle) -> Result<(usize, usize), GatewayError> {
        (**self).shape(handle)
    }

    fn max_buffer_len(&self) -> usize {
        (**self).max_buffer_len()
    }

    fn abort(&self) {
        (**self).abort()
    }
}
