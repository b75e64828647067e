//! Dense numeric matrix codec for cross-process transfer.
//!
//! Converts a local row-major array into a wire buffer
//! `(bytes, rows, cols, value type)` and back:
//! - `u8`, `i32` and `f32` elements travel natively as `UINT8`, `INT32`, `FP32`
//! - every other element type is widened to `FP64`
//! - decoded matrices are always `f64`, shape `(rows, cols)`
//!
//! The remote side is reached through the [`MatrixGateway`] trait.
//! [`InMemoryGateway`] implements it in-process.

pub mod array;
pub mod config;
pub mod decoder;
pub mod dtype;
pub mod encoder;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod wire;

pub use array::{ArrayData, Element, LocalArray};
pub use config::CodecConfig;
pub use decoder::{decode, decode_with_config, from_wire};
pub use dtype::{dispatch, CastRule, Dispatch, ElementType, ValueType};
pub use encoder::{encode, encode_with_config, to_wire};
pub use error::{CodecError, ErrorKind, GatewayError, Result};
pub use gateway::{MatrixGateway, MatrixHandle};
pub use memory::{InMemoryGateway, MatrixBlock};
pub use wire::{checked_byte_len, validate_buffer_len, WireBuffer, MAX_BUFFER_LEN};
