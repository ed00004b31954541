// Mangled stream decoder.
//
// Walks the stream with two cursors, one into the compressed bytes and one
// into the output, executing each opcode against the output written so far.
// Every read of output history and every write is bounds-checked, so a
// corrupt stream yields a `Malformed` error rather than a panic.
//
// Running out of stream before the declared length is reached is not an
// error: the output keeps its declared size and the missing tail stays zero.

use log::{trace, warn};

use super::opcode::{HEADER_LEN, Op, SHORT_LEN};
use crate::error::{CodecError, Malformed};

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Read the declared output length from the 4-byte little-endian prefix.
pub fn read_header(stream: &[u8]) -> Result<usize, CodecError> {
    let prefix: [u8; HEADER_LEN] = stream
        .get(..HEADER_LEN)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| CodecError::malformed(0, Malformed::TruncatedHeader))?;
    Ok(u32::from_le_bytes(prefix) as usize)
}

/// Append the length prefix for an output of `len` bytes.
pub fn write_header(out: &mut Vec<u8>, len: usize) {
    debug_assert!(u32::try_from(len).is_ok());
    out.extend_from_slice(&(len as u32).to_le_bytes());
}

// ---------------------------------------------------------------------------
// Unmangler
// ---------------------------------------------------------------------------

/// Opcode-at-a-time decoder over an in-memory mangled stream.
///
/// ```
/// use mangler::format::decoder::Unmangler;
///
/// let stream = [4, 0, 0, 0, 0x01, 7, 0x60, 0x00];
/// let mut dec = Unmangler::new(&stream, 1 << 20).unwrap();
/// while dec.next_op().unwrap().is_some() {}
/// assert!(dec.is_complete());
/// assert_eq!(dec.finish(), vec![7, 7, 7, 7]);
/// ```
pub struct Unmangler<'a> {
    stream: &'a [u8],
    in_pos: usize,
    out: Vec<u8>,
    out_len: usize,
    ended: bool,
    ops_decoded: u64,
}

impl<'a> Unmangler<'a> {
    /// Validate the length prefix against `max_len` and prepare the output.
    pub fn new(stream: &'a [u8], max_len: usize) -> Result<Self, CodecError> {
        let out_len = read_header(stream)?;
        if out_len > max_len {
            return Err(CodecError::SizeLimit {
                len: out_len as u64,
                limit: max_len,
            });
        }
        Ok(Self {
            stream,
            in_pos: HEADER_LEN,
            out: Vec::with_capacity(out_len),
            out_len,
            ended: false,
            ops_decoded: 0,
        })
    }

    /// Decode and execute the next opcode.
    ///
    /// Returns `None` once the output is full, the terminator has been read,
    /// or the stream is exhausted.
    pub fn next_op(&mut self) -> Result<Option<Op<'a>>, CodecError> {
        if self.ended || self.in_pos >= self.stream.len() || self.out.len() >= self.out_len {
            return Ok(None);
        }

        let at = self.in_pos;
        let op = Op::parse(self.stream, at)?;
        self.in_pos += op.encoded_len();
        if op == Op::End {
            self.ended = true;
            return Ok(None);
        }

        self.execute(&op, at)?;
        self.ops_decoded += 1;
        trace!("unmangle: {} at {at}, {} bytes", op.name(), op.output_len());
        Ok(Some(op))
    }

    /// Whether the declared output length has been reached.
    pub fn is_complete(&self) -> bool {
        self.out.len() == self.out_len
    }

    /// Output bytes reconstructed so far.
    pub fn bytes_written(&self) -> usize {
        self.out.len()
    }

    /// Output length declared by the stream header.
    pub fn declared_len(&self) -> usize {
        self.out_len
    }

    /// Number of opcodes executed so far (terminator excluded).
    pub fn ops_decoded(&self) -> u64 {
        self.ops_decoded
    }

    /// Consume the decoder, returning an output of exactly the declared length.
    pub fn finish(mut self) -> Vec<u8> {
        self.out.resize(self.out_len, 0);
        self.out
    }

    fn execute(&mut self, op: &Op<'_>, at: usize) -> Result<(), CodecError> {
        if self.out.len() + op.output_len() > self.out_len {
            return Err(CodecError::malformed(at, Malformed::Overflow));
        }

        match *op {
            Op::End => {}
            Op::Literal(bytes) => self.out.extend_from_slice(bytes),
            Op::ByteDiff { len } => {
                let [prev, mut last] = self.history::<2>(at)?;
                let delta = last.wrapping_sub(prev);
                for _ in 0..len {
                    last = last.wrapping_add(delta);
                    self.out.push(last);
                }
            }
            Op::WordDiff { words } => {
                let h = self.history::<4>(at)?;
                let prev = i16::from_le_bytes([h[0], h[1]]);
                let mut last = i16::from_le_bytes([h[2], h[3]]);
                let delta = last.wrapping_sub(prev);
                for _ in 0..words {
                    last = last.wrapping_add(delta);
                    self.out.extend_from_slice(&last.to_le_bytes());
                }
            }
            Op::ByteRepeat { len } => {
                let [b] = self.history::<1>(at)?;
                self.out.resize(self.out.len() + len, b);
            }
            Op::WordRepeat { words } => {
                let pair = self.history::<2>(at)?;
                for _ in 0..words {
                    self.out.extend_from_slice(&pair);
                }
            }
            Op::ShortBlock { distance } => self.copy_back(distance, SHORT_LEN, at)?,
            Op::MediumBlock { distance, len } | Op::LongBlock { distance, len } => {
                self.copy_back(distance, len, at)?
            }
        }
        Ok(())
    }

    /// The last `N` output bytes.
    fn history<const N: usize>(&self, at: usize) -> Result<[u8; N], CodecError> {
        let len = self.out.len();
        if len < N {
            return Err(CodecError::malformed(at, Malformed::BeforeStart));
        }
        let mut h = [0u8; N];
        h.copy_from_slice(&self.out[len - N..]);
        Ok(h)
    }

    /// Byte-at-a-time back-reference copy; the source may overlap the bytes
    /// being written.
    fn copy_back(&mut self, distance: usize, len: usize, at: usize) -> Result<(), CodecError> {
        let start = self
            .out
            .len()
            .checked_sub(distance)
            .ok_or_else(|| CodecError::malformed(at, Malformed::BeforeStart))?;
        for i in start..start + len {
            let b = self.out[i];
            self.out.push(b);
        }
        Ok(())
    }
}

/// Decode a complete mangled stream.
///
/// Fails with `SizeLimit` if the declared length exceeds `max_len`, and with
/// `Malformed` on any out-of-bounds read or write. A stream that ends (or
/// terminates) early yields the declared length with a zero-filled tail.
pub fn unmangle(stream: &[u8], max_len: usize) -> Result<Vec<u8>, CodecError> {
    let mut dec = Unmangler::new(stream, max_len)?;
    while dec.next_op()?.is_some() {}
    if !dec.is_complete() {
        warn!(
            "unmangle: stream ended after {} of {} bytes",
            dec.bytes_written(),
            dec.declared_len()
        );
    }
    Ok(dec.finish())
}

// ---------------------------------------------------------------------------
// Opcode listing
// ---------------------------------------------------------------------------

/// Iterates over the opcodes of a mangled stream without executing them.
///
/// Yields `(stream offset, op)` pairs, including the terminator, and stops at
/// the terminator, at the end of the stream, or after the first error.
pub struct OpIterator<'a> {
    stream: &'a [u8],
    declared_len: usize,
    pos: usize,
    done: bool,
}

impl<'a> OpIterator<'a> {
    pub fn new(stream: &'a [u8]) -> Result<Self, CodecError> {
        let declared_len = read_header(stream)?;
        Ok(Self {
            stream,
            declared_len,
            pos: HEADER_LEN,
            done: false,
        })
    }

    /// Output length from the stream's length prefix.
    pub fn declared_len(&self) -> usize {
        self.declared_len
    }
}

impl<'a> Iterator for OpIterator<'a> {
    type Item = Result<(usize, Op<'a>), CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.stream.len() {
            return None;
        }
        let at = self.pos;
        match Op::parse(self.stream, at) {
            Ok(op) => {
                self.pos += op.encoded_len();
                self.done = op == Op::End;
                Some(Ok((at, op)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 1 << 20;

    fn stream(len: u32, body: &[u8]) -> Vec<u8> {
        let mut s = len.to_le_bytes().to_vec();
        s.extend_from_slice(body);
        s
    }

    fn decode(len: u32, body: &[u8]) -> Result<Vec<u8>, CodecError> {
        unmangle(&stream(len, body), LIMIT)
    }

    #[test]
    fn empty_stream() {
        assert_eq!(decode(0, &[0x00]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn literal_then_byte_diff() {
        let out = decode(5, &[0x02, 5, 10, 0x40, 0x00]).unwrap();
        assert_eq!(out, vec![5, 10, 15, 20, 25]);
    }

    #[test]
    fn byte_diff_wraps() {
        let out = decode(5, &[0x02, 250, 254, 0x40, 0x00]).unwrap();
        assert_eq!(out, vec![250, 254, 2, 6, 10]);
    }

    #[test]
    fn word_diff_little_endian_wrapping() {
        // words 0x7FFE, 0x7FFF then +1 twice: 0x8000, 0x8001
        let out = decode(8, &[0x04, 0xFE, 0x7F, 0xFF, 0x7F, 0x50, 0x00]).unwrap();
        assert_eq!(out, vec![0xFE, 0x7F, 0xFF, 0x7F, 0x00, 0x80, 0x01, 0x80]);
    }

    #[test]
    fn byte_and_word_repeat() {
        let out = decode(4, &[0x01, 9, 0x60, 0x00]).unwrap();
        assert_eq!(out, vec![9; 4]);

        let out = decode(6, &[0x02, 1, 2, 0x70, 0x00]).unwrap();
        assert_eq!(out, vec![1, 2, 1, 2, 1, 2]);
    }

    #[test]
    fn overlapping_block_copy_repeats_pattern() {
        // distance 3, length 9: ABC -> ABCABCABCABC
        let out = decode(12, &[0x03, b'A', b'B', b'C', 0xC0 | (5 << 2), 0x00, 0x00]).unwrap();
        assert_eq!(out, b"ABCABCABCABC");
    }

    #[test]
    fn long_block_distance_and_length() {
        let mut body = vec![0x3F];
        body.extend((0..63u8).collect::<Vec<_>>());
        // distance 63 (off 60), length 5 + 10
        body.extend_from_slice(&[0xE0, 60, 10, 0x00]);
        let out = decode(78, &body).unwrap();
        assert_eq!(&out[63..], &(0..15u8).collect::<Vec<_>>()[..]);
    }

    #[test]
    fn terminator_stops_early_with_zero_tail() {
        let out = decode(6, &[0x02, 7, 8, 0x00, 0x02, 1, 1]).unwrap();
        assert_eq!(out, vec![7, 8, 0, 0, 0, 0]);
    }

    #[test]
    fn exhausted_stream_returns_partial() {
        let out = decode(4, &[0x02, 7, 8]).unwrap();
        assert_eq!(out, vec![7, 8, 0, 0]);
    }

    #[test]
    fn stops_once_output_is_full() {
        // trailing garbage after the output is complete is never read
        let out = decode(2, &[0x02, 7, 8, 0xFF]).unwrap();
        assert_eq!(out, vec![7, 8]);
    }

    #[test]
    fn history_before_start_rejected() {
        let err = decode(3, &[0x40]).unwrap_err();
        assert_eq!(err, CodecError::malformed(4, Malformed::BeforeStart));

        let err = decode(8, &[0x02, 1, 2, 0x50]).unwrap_err();
        assert_eq!(err, CodecError::malformed(7, Malformed::BeforeStart));
    }

    #[test]
    fn block_distance_before_start_rejected() {
        let err = decode(10, &[0x02, 1, 2, 0x80]).unwrap_err();
        assert_eq!(err, CodecError::malformed(7, Malformed::BeforeStart));
    }

    #[test]
    fn write_past_declared_length_rejected() {
        let err = decode(2, &[0x03, 1, 2, 3]).unwrap_err();
        assert_eq!(err, CodecError::malformed(4, Malformed::Overflow));

        let err = decode(4, &[0x01, 1, 0x61]).unwrap_err();
        assert_eq!(err, CodecError::malformed(6, Malformed::Overflow));
    }

    #[test]
    fn truncated_literal_rejected() {
        let err = decode(5, &[0x05, 1, 2]).unwrap_err();
        assert_eq!(err, CodecError::malformed(4, Malformed::Truncated));
    }

    #[test]
    fn short_header_rejected() {
        let err = unmangle(&[1, 0, 0], LIMIT).unwrap_err();
        assert_eq!(err, CodecError::malformed(0, Malformed::TruncatedHeader));
    }

    #[test]
    fn declared_length_over_limit_rejected() {
        let s = stream(u32::MAX, &[0x00]);
        let err = unmangle(&s, 100_000_000).unwrap_err();
        assert_eq!(
            err,
            CodecError::SizeLimit {
                len: u32::MAX as u64,
                limit: 100_000_000
            }
        );
    }

    #[test]
    fn unmangler_tracks_progress() {
        let s = stream(5, &[0x02, 5, 10, 0x40, 0x00]);
        let mut dec = Unmangler::new(&s, LIMIT).unwrap();
        assert_eq!(dec.declared_len(), 5);
        assert_eq!(dec.next_op().unwrap(), Some(Op::Literal(&[5, 10])));
        assert_eq!(dec.bytes_written(), 2);
        assert_eq!(dec.next_op().unwrap(), Some(Op::ByteDiff { len: 3 }));
        assert_eq!(dec.next_op().unwrap(), None);
        assert_eq!(dec.ops_decoded(), 2);
        assert!(dec.is_complete());
    }

    #[test]
    fn op_iterator_lists_offsets() {
        let s = stream(5, &[0x02, 5, 10, 0x40, 0x00, 0x99]);
        let ops: Vec<_> = OpIterator::new(&s)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            ops,
            vec![
                (4, Op::Literal(&[5, 10])),
                (7, Op::ByteDiff { len: 3 }),
                (8, Op::End)
            ]
        );
    }

    #[test]
    fn op_iterator_exposes_declared_len() {
        let s = stream(300, &[0x01, 9, 0x00]);
        let it = OpIterator::new(&s).unwrap();
        assert_eq!(it.declared_len(), 300);
        assert_eq!(it.count(), 2);
        assert!(matches!(
            OpIterator::new(&[0x01, 0x00]),
            Err(CodecError::Malformed {
                reason: Malformed::TruncatedHeader,
                ..
            })
        ));
    }

    #[test]
    fn op_iterator_reports_truncation_once() {
        let s = stream(5, &[0xE0, 0x01]);
        let mut it = OpIterator::new(&s).unwrap();
        assert!(matches!(it.next(), Some(Err(_))));
        assert!(it.next().is_none());
    }
}
