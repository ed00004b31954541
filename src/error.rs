// Codec error taxonomy.
//
// Size-limit failures are raised before any output allocation, malformed
// streams carry the offset of the opcode that broke a bound, and
// verification failures flag an encoder defect rather than bad data.

use thiserror::Error;

/// Why a mangled stream was rejected by the decoder.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    /// Fewer than 4 bytes, so there is no length prefix.
    #[error("stream too short for length prefix")]
    TruncatedHeader,
    /// A literal payload or opcode parameter runs past the end of the stream.
    #[error("opcode runs past end of stream")]
    Truncated,
    /// The opcode reads output history before position 0.
    #[error("reference before start of output")]
    BeforeStart,
    /// The opcode would write past the declared output length.
    #[error("write past declared output length")]
    Overflow,
}

/// Errors returned by mangle, unmangle and verified mangle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Declared or actual buffer size exceeds the configured ceiling.
    #[error("buffer of {len} bytes exceeds the {limit}-byte limit")]
    SizeLimit { len: u64, limit: usize },

    /// The compressed stream breaks a bound of the wire format.
    #[error("malformed stream at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: Malformed },

    /// Unmangling freshly mangled output did not reproduce the input.
    #[error("mangled output failed verification")]
    VerificationFailed,
}

impl CodecError {
    pub(crate) fn malformed(offset: usize, reason: Malformed) -> Self {
        Self::Malformed { offset, reason }
    }

    /// True for malformed-stream errors.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}
