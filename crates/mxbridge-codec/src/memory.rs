//! In-process matrix store implementing [`MatrixGateway`].
//!
//! Behaves like the remote engine's conversion routines: every submitted
//! buffer is converted to a dense `f64` block, and fetches always return
//! row-major `f64` bytes. Used as the test double for the codec and as the
//! storage behind the socket server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::error::GatewayError;
use crate::gateway::{MatrixGateway, MatrixHandle};
use crate::wire::{WireBuffer, MAX_BUFFER_LEN};

/// A dense `f64` matrix as the engine stores it.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixBlock {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl MatrixBlock {
    /// Build a block from row-major values.
    pub fn new(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self, GatewayError> {
        if rows.checked_mul(cols) != Some(values.len()) {
            return Err(GatewayError::Conversion(format!(
                "{rows}x{cols} block cannot hold {} values",
                values.len()
            )));
        }
        Ok(Self { rows, cols, values })
    }

    /// Convert a wire buffer of any value type.
    pub fn from_wire(buffer: &WireBuffer) -> Self {
        Self {
            rows: buffer.rows(),
            cols: buffer.cols(),
            values: buffer.to_f64_values(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Row `idx` as a slice.
    pub fn row(&self, idx: usize) -> Option<&[f64]> {
        if idx >= self.rows {
            return None;
        }
        let start = idx * self.cols;
        self.values.get(start..start + self.cols)
    }

    /// Dense row-major `f64` little-endian bytes.
    pub fn to_fp64_bytes(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.values.len() * 8);
        for v in &self.values {
            dst.put_f64_le(*v);
        }
        dst.freeze()
    }
}

/// Matrix store living in the current process.
#[derive(Debug)]
pub struct InMemoryGateway {
    blocks: Mutex<HashMap<MatrixHandle, MatrixBlock>>,
    next_handle: AtomicU64,
    closed: AtomicBool,
    max_buffer_len: usize,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            blocks: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            max_buffer_len: MAX_BUFFER_LEN,
        }
    }

    /// Cap the buffer size accepted per call.
    pub fn with_max_buffer_len(mut self, max_buffer_len: usize) -> Self {
        self.max_buffer_len = max_buffer_len;
        self
    }

    /// Store a block and return its new handle.
    pub fn insert(&self, block: MatrixBlock) -> Result<MatrixHandle, GatewayError> {
        self.ensure_open()?;
        let handle = MatrixHandle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed));
        debug!(%handle, rows = block.rows, cols = block.cols, "stored matrix block");
        self.lock().insert(handle, block);
        Ok(handle)
    }

    /// Copy of the block stored under `handle`.
    pub fn block(&self, handle: MatrixHandle) -> Result<MatrixBlock, GatewayError> {
        self.with_block(handle, MatrixBlock::clone)
    }

    /// Run `f` against the block stored under `handle`.
    pub fn with_block<R>(
        &self,
        handle: MatrixHandle,
        f: impl FnOnce(&MatrixBlock) -> R,
    ) -> Result<R, GatewayError> {
        self.ensure_open()?;
        let blocks = self.lock();
        let block = blocks
            .get(&handle)
            .ok_or(GatewayError::UnknownHandle(handle))?;
        Ok(f(block))
    }

    /// Drop the block stored under `handle`.
    pub fn release(&self, handle: MatrixHandle) -> Result<(), GatewayError> {
        self.ensure_open()?;
        match self.lock().remove(&handle) {
            Some(_) => {
                debug!(%handle, "released matrix block");
                Ok(())
            }
            None => Err(GatewayError::UnknownHandle(handle)),
        }
    }

    /// Number of live blocks.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`MatrixGateway::abort`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), GatewayError> {
        if self.is_closed() {
            return Err(GatewayError::Closed);
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<MatrixHandle, MatrixBlock>> {
        self.blocks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MatrixGateway for InMemoryGateway {
    fn submit(&self, buffer: WireBuffer) -> Result<MatrixHandle, GatewayError> {
        if buffer.len() > self.max_buffer_len {
            return Err(GatewayError::Conversion(format!(
                "buffer of {} bytes exceeds limit of {} bytes",
                buffer.len(),
                self.max_buffer_len
            )));
        }
        self.insert(MatrixBlock::from_wire(&buffer))
    }

    fn fetch(&self, handle: MatrixHandle) -> Result<Bytes, GatewayError> {
        self.with_block(handle, MatrixBlock::to_fp64_bytes)
    }

    fn shape(&self, handle: MatrixHandle) -> Result<(usize, usize), GatewayError> {
        self.with_block(handle, |block| (block.rows, block.cols))
    }

    fn max_buffer_len(&self) -> usize {
        self.max_buffer_len
    }

    fn abort(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("in-memory gateway closed");
            self.lock().clear();
        }
    }
}
