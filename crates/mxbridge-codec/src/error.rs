use crate::dtype::ValueType;
use crate::gateway::MatrixHandle;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by a [`MatrixGateway`](crate::MatrixGateway) implementation.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The cross-process call itself failed (connection lost, remote crash).
    #[error("transport failure: {0}")]
    Transport(#[source] BoxError),

    /// The remote engine refused the conversion arguments.
    #[error("remote conversion rejected: {0}")]
    Conversion(String),

    /// A row or column selector fell outside the matrix.
    #[error("{axis} index {index} out of bounds (valid range 1..={len})")]
    OutOfBounds {
        axis: &'static str,
        index: u64,
        len: u64,
    },

    /// The remote side holds no matrix under this handle.
    #[error("unknown matrix handle {0}")]
    UnknownHandle(MatrixHandle),

    /// The remote environment has been released.
    #[error("remote environment closed")]
    Closed,
}

impl GatewayError {
    /// Wrap any error as a transport failure.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    /// Whether this error means the remote environment is no longer reachable.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Closed)
    }
}

/// Coarse classification of a [`CodecError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad dimensionality or element count.
    Shape,
    /// Buffer arithmetic exceeds what either side can represent.
    UnsupportedRange,
    /// The call could not reach the remote engine.
    Transport,
    /// The remote engine answered with an error.
    Remote,
}

/// Errors that can occur while encoding or decoding a matrix.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The array has more than two dimensions.
    #[error("array has {ndim} dimensions (shape {shape:?}); at most 2 are supported")]
    TooManyDimensions { ndim: usize, shape: Vec<usize> },

    /// A declared shape does not match the number of supplied elements.
    #[error("shape {shape:?} does not match {len} elements")]
    ShapeMismatch { shape: Vec<usize>, len: usize },

    /// Nested rows of differing lengths.
    #[error("ragged input: row {row} has {len} columns, expected {expected}")]
    RaggedRows {
        row: usize,
        len: usize,
        expected: usize,
    },

    /// A wire buffer's length disagrees with its declared shape.
    #[error(
        "buffer of {actual} bytes does not match declared {rows}x{cols} {value_type} matrix \
         ({expected} bytes)"
    )]
    ElementCountMismatch {
        rows: usize,
        cols: usize,
        value_type: ValueType,
        expected: usize,
        actual: usize,
    },

    /// `rows * cols * width` overflows or exceeds the buffer limit.
    #[error("{rows}x{cols} {value_type} matrix exceeds the buffer limit of {limit} bytes")]
    UnsupportedRange {
        rows: usize,
        cols: usize,
        value_type: ValueType,
        limit: usize,
    },

    /// The gateway call failed.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl CodecError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::TooManyDimensions { .. }
            | CodecError::ShapeMismatch { .. }
            | CodecError::RaggedRows { .. }
            | CodecError::ElementCountMismatch { .. } => ErrorKind::Shape,
            CodecError::UnsupportedRange { .. } => ErrorKind::UnsupportedRange,
            CodecError::Gateway(err) if err.is_transport() => ErrorKind::Transport,
            CodecError::Gateway(_) => ErrorKind::Remote,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify_variants() {
        let shape = CodecError::TooManyDimensions {
            ndim: 3,
            shape: vec![2, 2, 2],
        };
        assert_eq!(shape.kind(), ErrorKind::Shape);

        let range = CodecError::UnsupportedRange {
            rows: usize::MAX,
            cols: 2,
            value_type: ValueType::Fp64,
            limit: 1024,
        };
        assert_eq!(range.kind(), ErrorKind::UnsupportedRange);

        let transport = CodecError::from(GatewayError::transport("socket reset"));
        assert_eq!(transport.kind(), ErrorKind::Transport);

        let closed = CodecError::from(GatewayError::Closed);
        assert_eq!(closed.kind(), ErrorKind::Transport);

        let remote = CodecError::from(GatewayError::Conversion("bad tag".into()));
        assert_eq!(remote.kind(), ErrorKind::Remote);
    }

    #[test]
    fn mismatch_message_carries_context() {
        let err = CodecError::ElementCountMismatch {
            rows: 3,
            cols: 2,
            value_type: ValueType::Fp64,
            expected: 48,
            actual: 40,
        };
        let text = err.to_string();
        assert!(text.contains("40 bytes"));
        assert!(text.contains("3x2 FP64"));
        assert!(text.contains("48 bytes"));
    }

    #[test]
    fn out_of_bounds_message() {
        let err = GatewayError::OutOfBounds {
            axis: "column",
            index: 7,
            len: 5,
        };
        assert_eq!(
            err.to_string(),
            "column index 7 out of bounds (valid range 1..=5)"
        );
    }
}
