//! Dense numeric matrix transfer between processes.
//!
//! mxbridge moves row-major numeric arrays to a matrix engine in another
//! process and back, with a fixed set of wire value types and `f64` results.
//!
//! # Crate Structure
//!
//! - [`codec`]: value-type dispatch, encoder and decoder, gateway trait
//! - [`wire`]: length-prefixed framing and protocol messages
//! - [`remote`]: Unix socket client, reference engine and server (behind `remote` feature)

/// Re-export codec types.
pub mod codec {
    pub use mxbridge_codec::*;
}

/// Re-export wire protocol types.
pub mod wire {
    pub use mxbridge_wire::*;
}

/// Re-export socket client and engine types (requires `remote` feature).
#[cfg(feature = "remote")]
pub mod remote {
    pub use mxbridge_remote::*;
}

pub use mxbridge_codec::{decode, encode, CodecError, LocalArray, MatrixGateway, MatrixHandle};
