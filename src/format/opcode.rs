// Mangled stream opcodes.
//
// Every opcode is identified by the high bits of its control byte:
//
//   0x00        end of stream
//   0x01..0x3F  literal copy, count = control
//   0x40..0x4F  byte-diff run, (control & 0x0F) + 3 bytes
//   0x50..0x5F  word-diff run, (control & 0x0F) + 2 words
//   0x60..0x6F  byte repeat, (control & 0x0F) + 3 bytes
//   0x70..0x7F  word repeat, (control & 0x0F) + 2 words
//   0x80..0xBF  short block, distance (control & 0x3F) + 3, length 3
//   0xC0..0xDF  medium block, one parameter byte
//   0xE0..0xFF  long block, two parameter bytes
//
// Block distances are stored biased by MIN_DISTANCE.

use crate::error::{CodecError, Malformed};

/// Length prefix size (little-endian u32 output length).
pub const HEADER_LEN: usize = 4;

pub const END: u8 = 0x00;
pub const BYTE_DIFF: u8 = 0x40;
pub const WORD_DIFF: u8 = 0x50;
pub const BYTE_REPEAT: u8 = 0x60;
pub const WORD_REPEAT: u8 = 0x70;
pub const SHORT_BLOCK: u8 = 0x80;
pub const MEDIUM_BLOCK: u8 = 0xC0;
pub const LONG_BLOCK: u8 = 0xE0;

/// Maximum bytes carried by one literal opcode.
pub const LITERAL_MAX: usize = 0x3F;

/// Byte run lengths (diff and repeat).
pub const BYTE_RUN_MIN: usize = 3;
pub const BYTE_RUN_MAX: usize = BYTE_RUN_MIN + 0x0F;
/// Word run lengths, in 16-bit words.
pub const WORD_RUN_MIN: usize = 2;
pub const WORD_RUN_MAX: usize = WORD_RUN_MIN + 0x0F;

/// Smallest encodable back-reference distance.
pub const MIN_DISTANCE: usize = 3;

pub const SHORT_LEN: usize = 3;
pub const SHORT_MAX_DISTANCE: usize = MIN_DISTANCE + 0x3F;

pub const MEDIUM_MIN_LEN: usize = 4;
pub const MEDIUM_MAX_LEN: usize = MEDIUM_MIN_LEN + 0x07;
pub const MEDIUM_MAX_DISTANCE: usize = MIN_DISTANCE + 0x3FF;

pub const LONG_MIN_LEN: usize = 5;
pub const LONG_MAX_LEN: usize = LONG_MIN_LEN + 0xFF;
pub const LONG_MAX_DISTANCE: usize = MIN_DISTANCE + 0x1FFF;

/// One opcode of a mangled stream, with its parameters decoded.
///
/// Run lengths and block lengths are in output bytes, except the word
/// variants which count 16-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op<'a> {
    End,
    Literal(&'a [u8]),
    ByteDiff { len: usize },
    WordDiff { words: usize },
    ByteRepeat { len: usize },
    WordRepeat { words: usize },
    ShortBlock { distance: usize },
    MediumBlock { distance: usize, len: usize },
    LongBlock { distance: usize, len: usize },
}

impl<'a> Op<'a> {
    /// Parse the opcode whose control byte sits at `stream[at]`.
    ///
    /// Fails if the literal payload or parameter bytes extend past the end
    /// of `stream`. The caller guarantees `at < stream.len()`.
    pub fn parse(stream: &'a [u8], at: usize) -> Result<Self, CodecError> {
        let ctrl = stream[at];
        let param = |i: usize| -> Result<usize, CodecError> {
            stream
                .get(at + i)
                .map(|&b| b as usize)
                .ok_or_else(|| CodecError::malformed(at, Malformed::Truncated))
        };
        let low4 = (ctrl & 0x0F) as usize;

        let op = match ctrl {
            END => Op::End,
            0x01..=0x3F => {
                let n = ctrl as usize;
                let payload = stream
                    .get(at + 1..at + 1 + n)
                    .ok_or_else(|| CodecError::malformed(at, Malformed::Truncated))?;
                Op::Literal(payload)
            }
            0x40..=0x4F => Op::ByteDiff {
                len: low4 + BYTE_RUN_MIN,
            },
            0x50..=0x5F => Op::WordDiff {
                words: low4 + WORD_RUN_MIN,
            },
            0x60..=0x6F => Op::ByteRepeat {
                len: low4 + BYTE_RUN_MIN,
            },
            0x70..=0x7F => Op::WordRepeat {
                words: low4 + WORD_RUN_MIN,
            },
            0x80..=0xBF => Op::ShortBlock {
                distance: (ctrl & 0x3F) as usize + MIN_DISTANCE,
            },
            0xC0..=0xDF => Op::MediumBlock {
                distance: (((ctrl & 0x03) as usize) << 8) + param(1)? + MIN_DISTANCE,
                len: ((ctrl >> 2) & 0x07) as usize + MEDIUM_MIN_LEN,
            },
            0xE0..=0xFF => Op::LongBlock {
                distance: (((ctrl & 0x1F) as usize) << 8) + param(1)? + MIN_DISTANCE,
                len: param(2)? + LONG_MIN_LEN,
            },
        };
        Ok(op)
    }

    /// Append the wire form of this opcode to `out`.
    ///
    /// Parameters must lie inside the ranges the opcode can express.
    pub fn write(&self, out: &mut Vec<u8>) {
        match *self {
            Op::End => out.push(END),
            Op::Literal(bytes) => {
                debug_assert!((1..=LITERAL_MAX).contains(&bytes.len()));
                out.push(bytes.len() as u8);
                out.extend_from_slice(bytes);
            }
            Op::ByteDiff { len } => out.push(BYTE_DIFF | byte_run_bits(len)),
            Op::WordDiff { words } => out.push(WORD_DIFF | word_run_bits(words)),
            Op::ByteRepeat { len } => out.push(BYTE_REPEAT | byte_run_bits(len)),
            Op::WordRepeat { words } => out.push(WORD_REPEAT | word_run_bits(words)),
            Op::ShortBlock { distance } => {
                debug_assert!((MIN_DISTANCE..=SHORT_MAX_DISTANCE).contains(&distance));
                out.push(SHORT_BLOCK | (distance - MIN_DISTANCE) as u8);
            }
            Op::MediumBlock { distance, len } => {
                debug_assert!((MIN_DISTANCE..=MEDIUM_MAX_DISTANCE).contains(&distance));
                debug_assert!((MEDIUM_MIN_LEN..=MEDIUM_MAX_LEN).contains(&len));
                let off = distance - MIN_DISTANCE;
                out.push(MEDIUM_BLOCK | (((len - MEDIUM_MIN_LEN) as u8) << 2) | (off >> 8) as u8);
                out.push(off as u8);
            }
            Op::LongBlock { distance, len } => {
                debug_assert!((MIN_DISTANCE..=LONG_MAX_DISTANCE).contains(&distance));
                debug_assert!((LONG_MIN_LEN..=LONG_MAX_LEN).contains(&len));
                let off = distance - MIN_DISTANCE;
                out.push(LONG_BLOCK | (off >> 8) as u8);
                out.push(off as u8);
                out.push((len - LONG_MIN_LEN) as u8);
            }
        }
    }

    /// Number of output bytes this opcode reconstructs.
    pub fn output_len(&self) -> usize {
        match *self {
            Op::End => 0,
            Op::Literal(bytes) => bytes.len(),
            Op::ByteDiff { len } | Op::ByteRepeat { len } => len,
            Op::WordDiff { words } | Op::WordRepeat { words } => 2 * words,
            Op::ShortBlock { .. } => SHORT_LEN,
            Op::MediumBlock { len, .. } | Op::LongBlock { len, .. } => len,
        }
    }

    /// Number of stream bytes this opcode occupies, control byte included.
    pub fn encoded_len(&self) -> usize {
        match *self {
            Op::Literal(bytes) => 1 + bytes.len(),
            Op::MediumBlock { .. } => 2,
            Op::LongBlock { .. } => 3,
            _ => 1,
        }
    }

    /// Short lowercase name, used by stream listings.
    pub fn name(&self) -> &'static str {
        match self {
            Op::End => "end",
            Op::Literal(_) => "literal",
            Op::ByteDiff { .. } => "byte-diff",
            Op::WordDiff { .. } => "word-diff",
            Op::ByteRepeat { .. } => "byte-repeat",
            Op::WordRepeat { .. } => "word-repeat",
            Op::ShortBlock { .. } => "short-block",
            Op::MediumBlock { .. } => "medium-block",
            Op::LongBlock { .. } => "long-block",
        }
    }
}

fn byte_run_bits(len: usize) -> u8 {
    debug_assert!((BYTE_RUN_MIN..=BYTE_RUN_MAX).contains(&len));
    (len - BYTE_RUN_MIN) as u8
}

fn word_run_bits(words: usize) -> u8 {
    debug_assert!((WORD_RUN_MIN..=WORD_RUN_MAX).contains(&words));
    (words - WORD_RUN_MIN) as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(bytes: &[u8]) -> Op<'_> {
        Op::parse(bytes, 0).unwrap()
    }

    #[test]
    fn range_boundaries() {
        assert_eq!(parse_one(&[0x00]), Op::End);
        assert_eq!(parse_one(&[0x01, 9]), Op::Literal(&[9]));
        assert_eq!(parse_one(&[0x40]), Op::ByteDiff { len: 3 });
        assert_eq!(parse_one(&[0x4F]), Op::ByteDiff { len: 18 });
        assert_eq!(parse_one(&[0x50]), Op::WordDiff { words: 2 });
        assert_eq!(parse_one(&[0x5F]), Op::WordDiff { words: 17 });
        assert_eq!(parse_one(&[0x60]), Op::ByteRepeat { len: 3 });
        assert_eq!(parse_one(&[0x7F]), Op::WordRepeat { words: 17 });
        assert_eq!(parse_one(&[0x80]), Op::ShortBlock { distance: 3 });
        assert_eq!(parse_one(&[0xBF]), Op::ShortBlock { distance: 66 });
        assert_eq!(
            parse_one(&[0xC0, 0x00]),
            Op::MediumBlock {
                distance: 3,
                len: 4
            }
        );
        assert_eq!(
            parse_one(&[0xDF, 0xFF]),
            Op::MediumBlock {
                distance: 1026,
                len: 11
            }
        );
        assert_eq!(
            parse_one(&[0xE0, 0x00, 0x00]),
            Op::LongBlock {
                distance: 3,
                len: 5
            }
        );
        assert_eq!(
            parse_one(&[0xFF, 0xFF, 0xFF]),
            Op::LongBlock {
                distance: 8194,
                len: 260
            }
        );
    }

    #[test]
    fn output_lengths_match_table() {
        assert_eq!(parse_one(&[0x4F]).output_len(), 18);
        assert_eq!(parse_one(&[0x5F]).output_len(), 34);
        assert_eq!(parse_one(&[0x70]).output_len(), 4);
        assert_eq!(parse_one(&[0x9A]).output_len(), 3);
        assert_eq!(parse_one(&[0xE5, 1, 255]).output_len(), 260);
    }

    #[test]
    fn write_matches_parse() {
        let payload = [1u8, 2, 3, 4];
        let ops = [
            Op::Literal(&payload),
            Op::ByteDiff { len: 7 },
            Op::WordDiff { words: 9 },
            Op::ByteRepeat { len: 18 },
            Op::WordRepeat { words: 2 },
            Op::ShortBlock { distance: 40 },
            Op::MediumBlock {
                distance: 700,
                len: 9,
            },
            Op::LongBlock {
                distance: 5000,
                len: 123,
            },
            Op::End,
        ];
        let mut stream = Vec::new();
        for op in &ops {
            op.write(&mut stream);
        }
        let mut at = 0;
        for expected in &ops {
            let op = Op::parse(&stream, at).unwrap();
            assert_eq!(&op, expected);
            at += op.encoded_len();
        }
        assert_eq!(at, stream.len());
    }

    #[test]
    fn medium_block_bit_layout() {
        let mut out = Vec::new();
        Op::MediumBlock {
            distance: 3 + 0x2AB,
            len: 6,
        }
        .write(&mut out);
        // length bits (6-4)<<2, high distance bits 0b10.
        assert_eq!(out, vec![0xC0 | 0x08 | 0x02, 0xAB]);
    }

    #[test]
    fn truncated_parameters_rejected() {
        let err = Op::parse(&[0xC1], 0).unwrap_err();
        assert_eq!(err, CodecError::malformed(0, Malformed::Truncated));
        let err = Op::parse(&[0x00, 0xE1, 0x05], 1).unwrap_err();
        assert_eq!(err, CodecError::malformed(1, Malformed::Truncated));
        let err = Op::parse(&[0x03, 1, 2], 0).unwrap_err();
        assert_eq!(err, CodecError::malformed(0, Malformed::Truncated));
    }
}
