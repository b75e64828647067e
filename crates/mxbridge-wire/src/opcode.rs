//! Message opcodes.
//!
//! Requests live in 0x0001-0x00FF, responses in 0x0100-0x01FF.

/// Client handshake (JSON).
pub const HELLO: u16 = 0x0001;
/// Create a matrix from a wire buffer.
pub const SUBMIT: u16 = 0x0010;
/// Read a matrix back as FP64 bytes.
pub const FETCH: u16 = 0x0011;
/// Query a matrix's rows and columns.
pub const SHAPE: u16 = 0x0012;
/// Drop a matrix.
pub const RELEASE: u16 = 0x0013;
/// Sort a matrix's rows by one column.
pub const ORDER: u16 = 0x0014;

/// Server handshake reply (JSON).
pub const WELCOME: u16 = 0x0101;
/// A new matrix handle.
pub const HANDLE: u16 = 0x0110;
/// Dense FP64 row-major matrix bytes.
pub const MATRIX_BYTES: u16 = 0x0111;
/// Rows and columns of a matrix.
pub const SHAPE_INFO: u16 = 0x0112;
/// Empty success reply.
pub const ACK: u16 = 0x0113;
/// Error reply (JSON).
pub const ERROR: u16 = 0x01FF;

/// Human-readable name for an opcode.
pub fn opcode_name(op: u16) -> &'static str {
    match op {
        HELLO => "HELLO",
        SUBMIT => "SUBMIT",
        FETCH => "FETCH",
        SHAPE => "SHAPE",
        RELEASE => "RELEASE",
        ORDER => "ORDER",
        WELCOME => "WELCOME",
        HANDLE => "HANDLE",
        MATRIX_BYTES => "MATRIX_BYTES",
        SHAPE_INFO => "SHAPE_INFO",
        ACK => "ACK",
        ERROR => "ERROR",
        _ => "UNKNOWN",
    }
}

/// Returns true if the opcode is in the request range.
pub fn is_request(op: u16) -> bool {
    (0x0001..0x0100).contains(&op)
}

/// Returns true if the opcode is in the response range.
pub fn is_response(op: u16) -> bool {
    (0x0100..0x0200).contains(&op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_disjoint() {
        for op in [HELLO, SUBMIT, FETCH, SHAPE, RELEASE, ORDER] {
            assert!(is_request(op), "{}", opcode_name(op));
            assert!(!is_response(op));
        }
        for op in [WELCOME, HANDLE, MATRIX_BYTES, SHAPE_INFO, ACK, ERROR] {
            assert!(is_response(op), "{}", opcode_name(op));
            assert!(!is_request(op));
        }
        assert_eq!(opcode_name(0x7777), "UNKNOWN");
    }
}
