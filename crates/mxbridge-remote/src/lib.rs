//! Unix domain socket transport for the mxbridge matrix protocol.
//!
//! - [`EngineClient`]: a session with a remote engine; implements
//!   [`MatrixGateway`](mxbridge_codec::MatrixGateway) so the codec's encoder
//!   and decoder run over the socket.
//! - [`Engine`] / [`EngineServer`]: the reference engine and its accept loop.
//!
//! ```no_run
//! use mxbridge_codec::{decode, encode, LocalArray};
//! use mxbridge_remote::EngineClient;
//!
//! let client = EngineClient::connect("/tmp/mxbridge.sock")?;
//! let handle = encode(&client, &LocalArray::from_vec(vec![1.0f64, 2.0, 3.0]))?;
//! let back = decode(&client, handle)?;
//! assert_eq!(back.shape(), &[3, 1]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[cfg(unix)]
pub mod client;
pub mod engine;
pub mod error;
pub mod handshake;
#[cfg(unix)]
pub mod server;
#[cfg(unix)]
pub mod socket;

#[cfg(unix)]
pub use client::{ClientConfig, EngineClient};
pub use engine::{error_reply, sort_rows, Engine, EngineSession};
pub use error::{RemoteError, Result};
pub use handshake::{handshake_client, handshake_server, HandshakeConfig, MAX_HANDSHAKE_PAYLOAD};
#[cfg(unix)]
pub use server::{serve_connection, EngineServer, ServerConfig};
#[cfg(unix)]
pub use socket::{peer_pid, EngineSocket};
