//! Reference matrix engine served over the socket.
//!
//! Stores dense `f64` blocks, converting incoming buffers of any value type,
//! and answers protocol requests against them.

use std::collections::HashSet;

use bytes::Bytes;
use mxbridge_codec::{
    GatewayError, InMemoryGateway, MatrixBlock, MatrixGateway, MatrixHandle, ValueType,
    WireBuffer,
};
use mxbridge_wire::{ErrorCode, ErrorReply, Request, Response};
use tracing::debug;

/// Matrix store plus the operations the protocol exposes.
#[derive(Debug, Default)]
pub struct Engine {
    store: InMemoryGateway,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the size of a single submitted buffer.
    pub fn with_max_buffer_len(mut self, max_buffer_len: usize) -> Self {
        self.store = self.store.with_max_buffer_len(max_buffer_len);
        self
    }

    /// The underlying block store.
    pub fn store(&self) -> &InMemoryGateway {
        &self.store
    }

    /// Start tracking the blocks one client session creates.
    pub fn session(&self) -> EngineSession<'_> {
        EngineSession {
            engine: self,
            owned: HashSet::new(),
        }
    }

    /// Answer one request. Failures become `ERROR` responses.
    pub fn handle(&self, request: Request) -> Response {
        match self.dispatch(request) {
            Ok(response) => response,
            Err(reply) => {
                debug!(kind = ?reply.kind, message = %reply.message, "request failed");
                Response::Error(reply)
            }
        }
    }

    fn dispatch(&self, request: Request) -> Result<Response, ErrorReply> {
        let reply = |err: GatewayError| error_reply(&err);
        match request {
            Request::Hello(_) => Err(ErrorReply::new(
                ErrorCode::Protocol,
                "session already established",
            )),
            Request::Submit {
                rows,
                cols,
                value_type,
                data,
            } => {
                let handle = self.submit(rows, cols, value_type, data).map_err(reply)?;
                Ok(Response::Handle(handle.raw()))
            }
            Request::Fetch { handle } => {
                let bytes = self
                    .store
                    .fetch(MatrixHandle::from_raw(handle))
                    .map_err(reply)?;
                Ok(Response::MatrixBytes(bytes))
            }
            Request::Shape { handle } => {
                let (rows, cols) = self
                    .store
                    .shape(MatrixHandle::from_raw(handle))
                    .map_err(reply)?;
                Ok(Response::ShapeInfo {
                    rows: rows as u64,
                    cols: cols as u64,
                })
            }
            Request::Release { handle } => {
                self.store
                    .release(MatrixHandle::from_raw(handle))
                    .map_err(reply)?;
                Ok(Response::Ack)
            }
            Request::Order {
                handle,
                by,
                decreasing,
                index_return,
            } => {
                let ordered = self
                    .order(MatrixHandle::from_raw(handle), by, decreasing, index_return)
                    .map_err(reply)?;
                Ok(Response::Handle(ordered.raw()))
            }
        }
    }

    /// Validate a raw submit body and store it as a new block.
    pub fn submit(
        &self,
        rows: u64,
        cols: u64,
        value_type: u8,
        data: Bytes,
    ) -> Result<MatrixHandle, GatewayError> {
        let value_type = ValueType::from_code(value_type).ok_or_else(|| {
            GatewayError::Conversion(format!("unknown value type code {value_type}"))
        })?;
        let rows = dim(rows, "rows")?;
        let cols = dim(cols, "cols")?;
        let buffer = WireBuffer::new(data, rows, cols, value_type)
            .map_err(|err| GatewayError::Conversion(err.to_string()))?;
        self.store.submit(buffer)
    }

    /// Sort the rows of a stored matrix by one column and store the result.
    ///
    /// `by` is 1-based. With `index_return` the result is a `rows x 1`
    /// matrix of 1-based row positions instead of the reordered rows.
    pub fn order(
        &self,
        handle: MatrixHandle,
        by: u64,
        decreasing: bool,
        index_return: bool,
    ) -> Result<MatrixHandle, GatewayError> {
        let ordered = self
            .store
            .with_block(handle, |block| sort_rows(block, by, decreasing, index_return))??;
        self.store.insert(ordered)
    }
}

/// Requests of one client session.
///
/// Blocks the session submitted or ordered and did not release are dropped
/// from the store when the session is dropped.
#[derive(Debug)]
pub struct EngineSession<'a> {
    engine: &'a Engine,
    owned: HashSet<MatrixHandle>,
}

impl EngineSession<'_> {
    /// Answer one request, recording handles it creates or releases.
    pub fn handle(&mut self, request: Request) -> Response {
        let released = match &request {
            Request::Release { handle } => Some(MatrixHandle::from_raw(*handle)),
            _ => None,
        };
        let creates = matches!(request, Request::Submit { .. } | Request::Order { .. });

        let response = self.engine.handle(request);
        match (&response, released) {
            (Response::Handle(raw), _) if creates => {
                self.owned.insert(MatrixHandle::from_raw(*raw));
            }
            (Response::Ack, Some(handle)) => {
                self.owned.remove(&handle);
            }
            _ => {}
        }
        response
    }

    /// Handles created in this session and still live.
    pub fn owned(&self) -> usize {
        self.owned.len()
    }
}

impl Drop for EngineSession<'_> {
    fn drop(&mut self) {
        if self.owned.is_empty() {
            return;
        }
        let mut released = 0usize;
        for handle in self.owned.drain() {
            // Another session may already have released it.
            if self.engine.store.release(handle).is_ok() {
                released += 1;
            }
        }
        debug!(released, "released session blocks");
    }
}

/// Stable row sort of `block` on column `by` (1-based).
pub fn sort_rows(
    block: &MatrixBlock,
    by: u64,
    decreasing: bool,
    index_return: bool,
) -> Result<MatrixBlock, GatewayError> {
    let cols = block.cols();
    let col = match usize::try_from(by) {
        Ok(by) if (1..=cols).contains(&by) => by - 1,
        _ => {
            return Err(GatewayError::OutOfBounds {
                axis: "column",
                index: by,
                len: cols as u64,
            })
        }
    };

    let values = block.values();
    let key = |row: usize| values[row * cols + col];
    let mut rows: Vec<usize> = (0..block.rows()).collect();
    rows.sort_by(|&a, &b| {
        let ord = key(a).total_cmp(&key(b));
        if decreasing {
            ord.reverse()
        } else {
            ord
        }
    });

    if index_return {
        let positions = rows.iter().map(|&row| (row + 1) as f64).collect();
        return MatrixBlock::new(rows.len(), 1, positions);
    }

    let sorted = rows
        .iter()
        .filter_map(|&row| block.row(row))
        .flatten()
        .copied()
        .collect();
    MatrixBlock::new(block.rows(), cols, sorted)
}

/// Wire form of an engine-side failure.
pub fn error_reply(err: &GatewayError) -> ErrorReply {
    match err {
        GatewayError::Conversion(message) => {
            ErrorReply::new(ErrorCode::Conversion, message.clone())
        }
        GatewayError::OutOfBounds { axis, index, len } => ErrorReply {
            axis: Some((*axis).to_string()),
            index: Some(*index),
            len: Some(*len),
            ..ErrorReply::new(ErrorCode::OutOfBounds, err.to_string())
        },
        GatewayError::UnknownHandle(handle) => ErrorReply {
            handle: Some(handle.raw()),
            ..ErrorReply::new(ErrorCode::UnknownHandle, err.to_string())
        },
        GatewayError::Transport(_) | GatewayError::Closed => {
            ErrorReply::new(ErrorCode::Protocol, err.to_string())
        }
    }
}

fn dim(value: u64, name: &str) -> Result<usize, GatewayError> {
    usize::try_from(value).map_err(|_| {
        GatewayError::Conversion(format!("{name} {value} exceeds the address space"))
    })
}
