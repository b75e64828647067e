use crate::wire::MAX_BUFFER_LEN;

/// Limits applied by the encoder and decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Maximum wire buffer size in bytes. The effective limit is the smaller
    /// of this and the gateway's own `max_buffer_len`.
    pub max_buffer_len: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_buffer_len: MAX_BUFFER_LEN,
        }
    }
}
