// Mangle encoder.
//
// Walks the input once, choosing at each position between a literal byte and
// the best candidate found there. One step of lookahead lets the encoder take
// a literal now when the candidate at the next position pays for it:
//
//   defer if (literal_cost + next.cost) * now.cover < now.cost * (1 + next.cover)
//
// where literal_cost is 2 for a fresh literal run (count byte plus payload)
// and 1 when a run is already open. Candidates depend only on the input and
// the position, so a deferred `next` becomes the following position's `now`
// without searching again.

use log::trace;

use super::literals::LiteralRun;
use crate::engine::Options;
use crate::format::decoder::write_header;
use crate::format::opcode::Op;
use crate::matching::{Candidate, best_at};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters collected while encoding one buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeStats {
    /// Input bytes emitted as literals.
    pub literal_bytes: usize,
    /// Non-literal opcodes emitted.
    pub match_ops: usize,
    /// Input bytes covered by non-literal opcodes.
    pub matched_bytes: usize,
    /// Positions where a candidate was passed over for the next one.
    pub deferrals: usize,
}

// ---------------------------------------------------------------------------
// Driving loop
// ---------------------------------------------------------------------------

fn defer(now: &Candidate, next: &Candidate, literal_cost: usize) -> bool {
    (literal_cost + next.cost()) * now.cover() < now.cost() * (1 + next.cover())
}

/// Append the mangled form of `input` (header, opcodes, terminator) to `out`.
///
/// The caller is responsible for the size ceiling; `input.len()` must fit
/// the 32-bit length prefix.
pub fn mangle_into(input: &[u8], out: &mut Vec<u8>, opts: &Options) -> EncodeStats {
    write_header(out, input.len());

    let mut stats = EncodeStats::default();
    let mut literals = LiteralRun::new();
    let mut ahead: Option<Candidate> = None;
    let mut pos = 0usize;

    while pos < input.len() {
        let Some(now) = ahead.take().or_else(|| best_at(input, pos)) else {
            literals.push(input[pos], out);
            stats.literal_bytes += 1;
            pos += 1;
            continue;
        };

        if opts.lookahead
            && let Some(next) = best_at(input, pos + 1)
            && defer(&now, &next, literals.next_byte_cost())
        {
            trace!("defer {now:?} at {pos} for {next:?}");
            literals.push(input[pos], out);
            stats.literal_bytes += 1;
            stats.deferrals += 1;
            ahead = Some(next);
            pos += 1;
            continue;
        }

        literals.flush(out);
        let op = now.to_op();
        trace!("{} at {pos}, cover {}", op.name(), now.cover());
        op.write(out);
        stats.match_ops += 1;
        stats.matched_bytes += now.cover();
        pos += now.cover();
    }

    literals.flush(out);
    Op::End.write(out);
    stats
}

/// Convenience wrapper returning a fresh buffer.
pub fn mangle_all(input: &[u8], opts: &Options) -> (Vec<u8>, EncodeStats) {
    let mut out = Vec::with_capacity(input.len() / 2 + 16);
    let stats = mangle_into(input, &mut out, opts);
    (out, stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
