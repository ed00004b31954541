// Literal run accumulator.
//
// Bytes with no worthwhile candidate collect here until a match is emitted
// or the input ends. A run never holds more than LITERAL_MAX bytes: reaching
// that size flushes it immediately.

use crate::format::opcode::{LITERAL_MAX, Op};

/// Pending literal bytes awaiting a count opcode.
#[derive(Debug, Default)]
pub struct LiteralRun {
    bytes: Vec<u8>,
}

impl LiteralRun {
    pub fn new() -> Self {
        Self {
            bytes: Vec::with_capacity(LITERAL_MAX),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Stream bytes added by taking one more literal: a fresh run also needs
    /// its count opcode.
    pub fn next_byte_cost(&self) -> usize {
        if self.bytes.is_empty() { 2 } else { 1 }
    }

    /// Append one byte, flushing to `out` once the run is full.
    pub fn push(&mut self, byte: u8, out: &mut Vec<u8>) {
        self.bytes.push(byte);
        if self.bytes.len() == LITERAL_MAX {
            self.flush(out);
        }
    }

    /// Emit the run as literal opcodes of at most LITERAL_MAX bytes each.
    pub fn flush(&mut self, out: &mut Vec<u8>) {
        for chunk in self.bytes.chunks(LITERAL_MAX) {
            Op::Literal(chunk).write(out);
        }
        self.bytes.clear();
    }
}
