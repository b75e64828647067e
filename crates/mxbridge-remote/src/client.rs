use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use mxbridge_codec::{GatewayError, MatrixGateway, MatrixHandle, WireBuffer};
use mxbridge_wire::{
    ErrorCode, ErrorReply, FrameConfig, FrameError, FrameReader, FrameWriter, Request, Response,
    DEFAULT_MAX_PAYLOAD,
};
use tracing::{debug, warn};

use crate::error::{RemoteError, Result};
use crate::handshake::{handshake_client, HandshakeConfig, MAX_HANDSHAKE_PAYLOAD};
use crate::socket::EngineSocket;

/// Bytes a `SUBMIT` body spends on rows, cols and the value-type code.
pub(crate) const SUBMIT_HEADER_LEN: usize = 8 + 8 + 1;

/// Client-side connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Largest frame payload sent or accepted once the session is up.
    pub max_payload_size: usize,
    /// Read timeout for each response.
    pub read_timeout: Option<Duration>,
    /// Write timeout for each request.
    pub write_timeout: Option<Duration>,
    pub handshake: HandshakeConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
            handshake: HandshakeConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    pub fn with_timeouts(mut self, read: Option<Duration>, write: Option<Duration>) -> Self {
        self.read_timeout = read;
        self.write_timeout = write;
        self
    }

    pub fn with_handshake(mut self, handshake: HandshakeConfig) -> Self {
        self.handshake = handshake;
        self
    }
}

struct Connection {
    reader: FrameReader<UnixStream>,
    writer: FrameWriter<UnixStream>,
}

/// A session with a remote matrix engine.
///
/// Implements [`MatrixGateway`], so it can be handed straight to the
/// encoder and decoder. Requests are serialized on one connection; after a
/// transport failure or [`shutdown`](Self::shutdown) every call returns
/// [`GatewayError::Closed`].
pub struct EngineClient {
    conn: Mutex<Option<Connection>>,
    session_id: String,
    max_payload_size: usize,
}

impl std::fmt::Debug for EngineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineClient")
            .field("session_id", &self.session_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl EngineClient {
    /// Connect and handshake with default settings.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with_config(path, &ClientConfig::default())
    }

    /// Connect and handshake with explicit settings.
    pub fn connect_with_config(path: impl AsRef<Path>, config: &ClientConfig) -> Result<Self> {
        let stream = EngineSocket::connect(path)?;
        stream.set_read_timeout(Some(config.handshake.timeout))?;
        stream.set_write_timeout(Some(config.handshake.timeout))?;
        let reader_stream = stream.try_clone()?;

        let frame_config = FrameConfig {
            max_payload_size: MAX_HANDSHAKE_PAYLOAD,
        };
        let mut reader = FrameReader::with_config(reader_stream, frame_config.clone());
        let mut writer = FrameWriter::with_config(stream, frame_config);

        let welcome = handshake_client(&mut reader, &mut writer, &config.handshake)?;

        reader.set_max_payload_size(config.max_payload_size);
        writer.set_max_payload_size(config.max_payload_size);
        let stream = writer.get_ref();
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;

        debug!(session_id = %welcome.session_id, "engine session established");
        Ok(Self {
            conn: Mutex::new(Some(Connection { reader, writer })),
            session_id: welcome.session_id,
            max_payload_size: config.max_payload_size,
        })
    }

    /// Identifier the engine assigned to this session.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Close the connection. Later calls fail with `Closed`.
    pub fn shutdown(&self) {
        if let Some(conn) = self.lock().take() {
            debug!(session_id = %self.session_id, "closing engine session");
            let _ = conn.writer.get_ref().shutdown(Shutdown::Both);
        }
    }

    /// Sort the rows of a remote matrix by a 1-based column.
    pub fn order(
        &self,
        handle: MatrixHandle,
        by: u64,
        decreasing: bool,
        index_return: bool,
    ) -> std::result::Result<MatrixHandle, GatewayError> {
        self.expect_handle(Request::Order {
            handle: handle.raw(),
            by,
            decreasing,
            index_return,
        })
    }

    /// Drop a remote matrix.
    pub fn release(&self, handle: MatrixHandle) -> std::result::Result<(), GatewayError> {
        let request = Request::Release {
            handle: handle.raw(),
        };
        let name = request.name();
        match self.call(request)? {
            Response::Ack => Ok(()),
            other => Err(unexpected(name, &other).into()),
        }
    }

    fn expect_handle(&self, request: Request) -> std::result::Result<MatrixHandle, GatewayError> {
        let name = request.name();
        match self.call(request)? {
            Response::Handle(raw) => Ok(MatrixHandle::from_raw(raw)),
            other => Err(unexpected(name, &other).into()),
        }
    }

    /// One request/response exchange.
    fn call(&self, request: Request) -> Result<Response> {
        let mut guard = self.lock();
        let Some(conn) = guard.as_mut() else {
            return Err(RemoteError::Closed);
        };

        if let Err(err) = conn.writer.write_message(&request) {
            // An oversized payload is refused before anything reaches the socket.
            if !matches!(err, FrameError::PayloadTooLarge { .. }) {
                warn!(error = %err, request = request.name(), "engine connection lost");
                *guard = None;
            }
            return Err(err.into());
        }

        match conn.reader.read_message::<Response>() {
            Ok(Response::Error(reply)) => Err(RemoteError::Engine(reply)),
            Ok(response) => Ok(response),
            Err(err) => {
                warn!(error = %err, request = request.name(), "engine connection lost");
                *guard = None;
                Err(err.into())
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MatrixGateway for EngineClient {
    fn submit(&self, buffer: WireBuffer) -> std::result::Result<MatrixHandle, GatewayError> {
        self.expect_handle(Request::Submit {
            rows: buffer.rows() as u64,
            cols: buffer.cols() as u64,
            value_type: buffer.value_type().code(),
            data: buffer.into_bytes(),
        })
    }

    fn fetch(&self, handle: MatrixHandle) -> std::result::Result<Bytes, GatewayError> {
        let request = Request::Fetch {
            handle: handle.raw(),
        };
        let name = request.name();
        match self.call(request)? {
            Response::MatrixBytes(bytes) => Ok(bytes),
            other => Err(unexpected(name, &other).into()),
        }
    }

    fn shape(&self, handle: MatrixHandle) -> std::result::Result<(usize, usize), GatewayError> {
        let request = Request::Shape {
            handle: handle.raw(),
        };
        let name = request.name();
        match self.call(request)? {
            Response::ShapeInfo { rows, cols } => {
                let dim = |v: u64| {
                    usize::try_from(v).map_err(|_| {
                        GatewayError::Conversion(format!(
                            "remote shape {rows}x{cols} exceeds the address space"
                        ))
                    })
                };
                Ok((dim(rows)?, dim(cols)?))
            }
            other => Err(unexpected(name, &other).into()),
        }
    }

    fn max_buffer_len(&self) -> usize {
        self.max_payload_size.saturating_sub(SUBMIT_HEADER_LEN)
    }

    fn abort(&self) {
        self.shutdown();
    }
}

fn unexpected(request: &'static str, got: &Response) -> RemoteError {
    RemoteError::UnexpectedResponse {
        request,
        got: got.name(),
    }
}

impl From<RemoteError> for GatewayError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Engine(reply) => reply_to_gateway_error(reply),
            RemoteError::Closed => GatewayError::Closed,
            other => GatewayError::transport(other),
        }
    }
}

fn reply_to_gateway_error(reply: ErrorReply) -> GatewayError {
    match reply.kind {
        ErrorCode::Conversion => GatewayError::Conversion(reply.message),
        ErrorCode::OutOfBounds => GatewayError::OutOfBounds {
            axis: match reply.axis.as_deref() {
                Some("row") => "row",
                _ => "column",
            },
            index: reply.index.unwrap_or_default(),
            len: reply.len.unwrap_or_default(),
        },
        ErrorCode::UnknownHandle => match reply.handle {
            Some(raw) => GatewayError::UnknownHandle(MatrixHandle::from_raw(raw)),
            None => GatewayError::Conversion(reply.message),
        },
        ErrorCode::Protocol | ErrorCode::Handshake => {
            GatewayError::transport(RemoteError::Engine(reply))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_replies_map_to_gateway_errors() {
        let reply = ErrorReply {
            axis: Some("column".into()),
            index: Some(4),
            len: Some(3),
            ..ErrorReply::new(ErrorCode::OutOfBounds, "column index 4 out of bounds")
        };
        assert!(matches!(
            GatewayError::from(RemoteError::Engine(reply)),
            GatewayError::OutOfBounds {
                axis: "column",
                index: 4,
                len: 3
            }
        ));

        let reply = ErrorReply {
            handle: Some(12),
            ..ErrorReply::new(ErrorCode::UnknownHandle, "unknown matrix handle #12")
        };
        assert!(matches!(
            GatewayError::from(RemoteError::Engine(reply)),
            GatewayError::UnknownHandle(h) if h.raw() == 12
        ));

        let reply = ErrorReply::new(ErrorCode::Conversion, "bad tag");
        assert!(matches!(
            GatewayError::from(RemoteError::Engine(reply)),
            GatewayError::Conversion(ref msg) if msg == "bad tag"
        ));
    }

    #[test]
    fn connection_failures_are_transport_errors() {
        assert!(GatewayError::from(RemoteError::Closed).is_transport());
        let err = GatewayError::from(RemoteError::Frame(FrameError::ConnectionClosed));
        assert!(matches!(err, GatewayError::Transport(_)));

        let reply = ErrorReply::new(ErrorCode::Protocol, "session already established");
        assert!(GatewayError::from(RemoteError::Engine(reply)).is_transport());
    }

    #[test]
    fn buffer_limit_leaves_room_for_submit_header() {
        let client = EngineClient {
            conn: Mutex::new(None),
            session_id: "s".into(),
            max_payload_size: 1024,
        };
        assert_eq!(client.max_buffer_len(), 1024 - SUBMIT_HEADER_LEN);
        assert!(client.is_closed());
        assert!(matches!(
            client.fetch(MatrixHandle::from_raw(1)),
            Err(GatewayError::Closed)
        ));
    }
}
