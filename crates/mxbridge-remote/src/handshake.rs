use std::io::{Read, Write};
use std::time::Duration;

use mxbridge_wire::{
    ErrorCode, ErrorReply, FrameReader, FrameWriter, Hello, Request, Response, Welcome,
    PROTOCOL_NAME, PROTOCOL_VERSION,
};
use tracing::{debug, warn};

use crate::error::{RemoteError, Result};

/// Maximum handshake body accepted before the session is established.
pub const MAX_HANDSHAKE_PAYLOAD: usize = 16 * 1024;

/// Configuration for the HELLO/WELCOME exchange.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Timeout for each blocking handshake read or write.
    pub timeout: Duration,
    /// Expected protocol name.
    pub protocol_name: String,
    /// Local protocol version.
    pub protocol_version: String,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            protocol_name: PROTOCOL_NAME.to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
        }
    }
}

/// Client side: send HELLO, wait for WELCOME.
pub fn handshake_client<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    config: &HandshakeConfig,
) -> Result<Welcome> {
    let hello = Hello {
        protocol: config.protocol_name.clone(),
        version: config.protocol_version.clone(),
    };
    writer.write_message(&Request::Hello(hello))?;

    match reader.read_message::<Response>()? {
        Response::Welcome(welcome) => {
            if welcome.protocol != config.protocol_name
                || welcome.version != config.protocol_version
            {
                return Err(RemoteError::HandshakeFailed(format!(
                    "server speaks {} v{}, expected {} v{}",
                    welcome.protocol,
                    welcome.version,
                    config.protocol_name,
                    config.protocol_version
                )));
            }
            debug!(session_id = %welcome.session_id, "handshake complete");
            Ok(welcome)
        }
        Response::Error(reply) => Err(RemoteError::HandshakeFailed(reply.message)),
        other => Err(RemoteError::HandshakeFailed(format!(
            "expected WELCOME, got {other:?}"
        ))),
    }
}

/// Server side: wait for HELLO, answer WELCOME or an ERROR.
pub fn handshake_server<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    session_id: &str,
    config: &HandshakeConfig,
) -> Result<Hello> {
    let session_limit = reader.config().max_payload_size;
    reader.set_max_payload_size(MAX_HANDSHAKE_PAYLOAD.min(session_limit));
    let first = reader.read_message::<Request>();
    reader.set_max_payload_size(session_limit);

    let hello = match first? {
        Request::Hello(hello) => hello,
        other => {
            let reply = ErrorReply::new(ErrorCode::Handshake, "expected HELLO");
            let _ = writer.write_message(&Response::Error(reply));
            return Err(RemoteError::HandshakeFailed(format!(
                "expected HELLO, got {other:?}"
            )));
        }
    };

    if hello.protocol != config.protocol_name || hello.version != config.protocol_version {
        let message = format!(
            "unsupported protocol {} v{} (server speaks {} v{})",
            hello.protocol, hello.version, config.protocol_name, config.protocol_version
        );
        warn!(%message, "rejecting handshake");
        let _ = writer.write_message(&Response::Error(ErrorReply::new(
            ErrorCode::Handshake,
            message.clone(),
        )));
        return Err(RemoteError::HandshakeFailed(message));
    }

    writer.write_message(&Response::Welcome(Welcome {
        protocol: config.protocol_name.clone(),
        version: config.protocol_version.clone(),
        session_id: session_id.to_string(),
    }))?;
    Ok(hello)
}
