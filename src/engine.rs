// Codec engine: ties candidate search, encoding and decoding together.
//
// Provides the high-level buffer API:
//   - mangle / unmangle with the default size ceiling
//   - verify, which decodes a stream and compares it to the original
//   - mangle_verified, which refuses to return output that does not decode
//     back to its input

use log::debug;

use crate::compress::encoder;
use crate::error::CodecError;
use crate::format::decoder;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Default ceiling on input and declared output sizes.
pub const DEFAULT_MAX_LEN: usize = 100_000_000;

/// Configuration for mangle and unmangle.
#[derive(Debug, Clone)]
pub struct Options {
    /// Largest buffer either direction will accept, in bytes.
    pub max_len: usize,
    /// One-step lookahead in the encoder. Disabling it gives a greedy
    /// encoding that still decodes with any unmangler.
    pub lookahead: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_LEN,
            lookahead: true,
        }
    }
}

fn check_len(len: usize, limit: usize) -> Result<(), CodecError> {
    if len > limit || u32::try_from(len).is_err() {
        return Err(CodecError::SizeLimit {
            len: len as u64,
            limit,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Mangle
// ---------------------------------------------------------------------------

/// Compress `input` into a self-describing mangled stream.
pub fn mangle(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    mangle_with_options(input, &Options::default())
}

/// Compress with custom options.
pub fn mangle_with_options(input: &[u8], opts: &Options) -> Result<Vec<u8>, CodecError> {
    check_len(input.len(), opts.max_len)?;
    let (out, stats) = encoder::mangle_all(input, opts);
    debug!(
        "mangled {} -> {} bytes ({} ops, {} literal bytes, {} deferrals)",
        input.len(),
        out.len(),
        stats.match_ops,
        stats.literal_bytes,
        stats.deferrals
    );
    Ok(out)
}

// ---------------------------------------------------------------------------
// Unmangle
// ---------------------------------------------------------------------------

/// Reconstruct the original bytes from a mangled stream.
pub fn unmangle(stream: &[u8]) -> Result<Vec<u8>, CodecError> {
    unmangle_with_options(stream, &Options::default())
}

/// Decode with custom options. Only `max_len` applies.
pub fn unmangle_with_options(stream: &[u8], opts: &Options) -> Result<Vec<u8>, CodecError> {
    let out = decoder::unmangle(stream, opts.max_len)?;
    debug!("unmangled {} -> {} bytes", stream.len(), out.len());
    Ok(out)
}

// ---------------------------------------------------------------------------
// Verify
// ---------------------------------------------------------------------------

/// True if `mangled` decodes to exactly `original`. Decode errors count as
/// a mismatch.
pub fn verify(original: &[u8], mangled: &[u8]) -> bool {
    verify_with_options(original, mangled, &Options::default())
}

pub fn verify_with_options(original: &[u8], mangled: &[u8], opts: &Options) -> bool {
    match unmangle_with_options(mangled, opts) {
        Ok(decoded) => decoded == original,
        Err(e) => {
            debug!("verify: {e}");
            false
        }
    }
}

/// Mangle, then check the result decodes back to `input`.
pub fn mangle_verified(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    mangle_verified_with_options(input, &Options::default())
}

pub fn mangle_verified_with_options(input: &[u8], opts: &Options) -> Result<Vec<u8>, CodecError> {
    let out = mangle_with_options(input, opts)?;
    if !verify_with_options(input, &out, opts) {
        return Err(CodecError::VerificationFailed);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
