// Candidate search for the mangle encoder.
//
// - `candidate` — Candidate/BlockTier types and the cost/cover ordering
// - `finders`   — per-position run, repeat and block-copy search

pub mod candidate;
pub mod finders;

pub use candidate::{BlockTier, Candidate, better, compare};
pub use finders::{BlockMatches, best_at};
