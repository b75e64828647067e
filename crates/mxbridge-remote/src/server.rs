use std::io::ErrorKind;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mxbridge_wire::{
    ErrorCode, ErrorReply, FrameConfig, FrameError, FrameReader, FrameWriter, Request, Response,
    DEFAULT_MAX_PAYLOAD,
};
use tracing::{debug, info, warn};

use crate::client::SUBMIT_HEADER_LEN;
use crate::engine::Engine;
use crate::error::{RemoteError, Result};
use crate::handshake::{handshake_server, HandshakeConfig};
use crate::socket::EngineSocket;

/// Server-side settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Largest frame payload accepted or sent once a session is up.
    pub max_payload_size: usize,
    /// Permission mode of the socket file.
    pub socket_mode: u32,
    /// Sleep between accept polls while idle.
    pub poll_interval: Duration,
    pub handshake: HandshakeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            socket_mode: EngineSocket::DEFAULT_SOCKET_MODE,
            poll_interval: Duration::from_millis(50),
            handshake: HandshakeConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    pub fn with_socket_mode(mut self, mode: u32) -> Self {
        self.socket_mode = mode;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Serves a shared [`Engine`] on a Unix socket, one thread per session.
pub struct EngineServer {
    socket: EngineSocket,
    engine: Arc<Engine>,
    config: ServerConfig,
    sessions: AtomicU64,
}

impl EngineServer {
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_config(path, ServerConfig::default())
    }

    pub fn bind_with_config(path: impl AsRef<Path>, config: ServerConfig) -> Result<Self> {
        let socket = EngineSocket::bind_with_mode(path, config.socket_mode)?;
        let engine = Engine::new()
            .with_max_buffer_len(config.max_payload_size.saturating_sub(SUBMIT_HEADER_LEN));
        Ok(Self {
            socket,
            engine: Arc::new(engine),
            config,
            sessions: AtomicU64::new(0),
        })
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn path(&self) -> &Path {
        self.socket.path()
    }

    /// Accept sessions until `running` is cleared.
    ///
    /// Sessions still connected when the loop stops are left to finish on
    /// their own threads.
    pub fn serve(&self, running: &AtomicBool) -> Result<()> {
        self.socket.set_nonblocking(true)?;
        let mut workers: Vec<JoinHandle<()>> = Vec::new();

        while running.load(Ordering::SeqCst) {
            match self.socket.accept() {
                Ok(stream) => {
                    prune_finished(&mut workers);
                    workers.push(self.spawn_session(stream)?);
                }
                Err(RemoteError::Accept(err)) if err.kind() == ErrorKind::WouldBlock => {
                    prune_finished(&mut workers);
                    thread::sleep(self.config.poll_interval);
                }
                Err(RemoteError::Accept(err)) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }

        info!(
            path = ?self.path(),
            active = prune_finished(&mut workers),
            "engine stopping"
        );
        Ok(())
    }

    fn spawn_session(&self, stream: UnixStream) -> Result<JoinHandle<()>> {
        let n = self.sessions.fetch_add(1, Ordering::Relaxed) + 1;
        let session_id = format!("{}-{n}", std::process::id());
        let engine = Arc::clone(&self.engine);
        let config = self.config.clone();

        let worker = thread::Builder::new()
            .name(format!("mxbridge-session-{n}"))
            .spawn(move || {
                if let Err(err) = serve_connection(stream, &engine, &config, &session_id) {
                    warn!(%session_id, error = %err, "session failed");
                }
            })?;
        Ok(worker)
    }
}

/// Drop handles of session threads that have exited. Returns how many remain.
fn prune_finished(workers: &mut Vec<JoinHandle<()>>) -> usize {
    workers.retain(|worker| !worker.is_finished());
    workers.len()
}

/// Run one session to completion on the calling thread.
pub fn serve_connection(
    stream: UnixStream,
    engine: &Engine,
    config: &ServerConfig,
    session_id: &str,
) -> Result<()> {
    stream.set_read_timeout(Some(config.handshake.timeout))?;
    stream.set_write_timeout(Some(config.handshake.timeout))?;
    let reader_stream = stream.try_clone()?;

    let frame_config = FrameConfig {
        max_payload_size: config.max_payload_size,
    };
    let mut reader = FrameReader::with_config(reader_stream, frame_config.clone());
    let mut writer = FrameWriter::with_config(stream, frame_config);

    handshake_server(&mut reader, &mut writer, session_id, &config.handshake)?;
    writer.get_ref().set_read_timeout(None)?;
    writer.get_ref().set_write_timeout(None)?;
    info!(session_id, "session started");

    let mut session = engine.session();
    loop {
        let request = match reader.read_message::<Request>() {
            Ok(request) => request,
            Err(FrameError::ConnectionClosed) => break,
            // The frame was consumed whole; report and keep the session.
            Err(
                err @ (FrameError::Malformed { .. }
                | FrameError::UnexpectedOpcode(_)
                | FrameError::Json(_)),
            ) => {
                debug!(session_id, error = %err, "rejecting malformed request");
                let reply = ErrorReply::new(ErrorCode::Protocol, err.to_string());
                writer.write_message(&Response::Error(reply))?;
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let op = request.name();
        let response = session.handle(request);
        debug!(session_id, request = op, response = response.name(), "request served");

        match writer.write_message(&response) {
            Ok(()) => {}
            Err(FrameError::PayloadTooLarge { size, max }) => {
                let reply = ErrorReply::new(
                    ErrorCode::Conversion,
                    format!("{op} response of {size} bytes exceeds the frame limit of {max} bytes"),
                );
                writer.write_message(&Response::Error(reply))?;
            }
            Err(err) => return Err(err.into()),
        }
    }

    info!(session_id, "session ended");
    Ok(())
}
