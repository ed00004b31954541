// Mangle encoder.
//
// - `literals` — LiteralRun: pending literal bytes, flushed in runs of at most 63
// - `encoder`  — the driving loop with one-step lookahead

pub mod encoder;
pub mod literals;

pub use encoder::{EncodeStats, mangle_all, mangle_into};
pub use literals::LiteralRun;
