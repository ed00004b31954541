//! Mangler: the mangle/unmangle LZ-style compressor in Rust.
//!
//! A mangled stream is a 4-byte little-endian length prefix followed by
//! single-byte opcodes (literal runs, byte/word diff runs, byte/word
//! repeats, short/medium/long back-reference copies) and a `0x00`
//! terminator.
//!
//! The crate provides:
//! - The buffer codec (`engine`, re-exported at the crate root)
//! - The wire format and decoder (`format`)
//! - Candidate search and the encoder (`matching`, `compress`)
//! - File-oriented helpers and batch processing (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! let data = b"abcabcabcabcabcabcabcabc".to_vec();
//!
//! let mangled = mangler::mangle(&data).unwrap();
//! assert!(mangled.len() < data.len());
//! assert!(mangler::verify(&data, &mangled));
//! assert_eq!(mangler::unmangle(&mangled).unwrap(), data);
//! ```

pub mod compress;
pub mod engine;
pub mod error;
pub mod format;
pub mod io;
pub mod matching;

#[cfg(feature = "cli")]
pub mod cli;

pub use engine::{
    DEFAULT_MAX_LEN, Options, mangle, mangle_verified, mangle_verified_with_options,
    mangle_with_options, unmangle, unmangle_with_options, verify, verify_with_options,
};
pub use error::{CodecError, Malformed};
