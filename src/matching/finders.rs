// Match finders.
//
// Each finder looks at one input position and returns the best candidate of
// its kind, or `None`. Finders only read input bytes, so the candidates at a
// position do not depend on how earlier positions were encoded: the decoder
// always has the same history the finder looked at.
//
//   1. Byte repeat
//   2. Word repeat
//   3. Byte-diff run (arithmetic progression of bytes)
//   4. Word-diff run (arithmetic progression of LE 16-bit words)
//   5. Block copy, one best candidate per tier

use super::candidate::{BlockTier, Candidate, offer};
use crate::format::opcode::{
    BYTE_RUN_MAX, BYTE_RUN_MIN, LONG_MAX_DISTANCE, LONG_MAX_LEN, MIN_DISTANCE, SHORT_LEN,
    WORD_RUN_MAX, WORD_RUN_MIN,
};

/// Block search stops at the first match at least this long.
pub const EARLY_EXIT_LEN: usize = 18;

fn word_at(input: &[u8], i: usize) -> i16 {
    i16::from_le_bytes([input[i], input[i + 1]])
}

/// Byte-diff run continuing the delta of the two bytes before `pos`.
pub fn byte_diff(input: &[u8], pos: usize) -> Option<Candidate> {
    if pos < 2 || pos >= input.len() {
        return None;
    }
    let delta = input[pos - 1].wrapping_sub(input[pos - 2]);
    let mut prev = input[pos - 1];
    let mut len = 0;
    for &b in input[pos..].iter().take(BYTE_RUN_MAX) {
        if b != prev.wrapping_add(delta) {
            break;
        }
        prev = b;
        len += 1;
    }
    (len >= BYTE_RUN_MIN).then_some(Candidate::ByteDiff { len })
}

/// Word-diff run continuing the delta of the two words before `pos`.
pub fn word_diff(input: &[u8], pos: usize) -> Option<Candidate> {
    if pos < 4 || pos + 1 >= input.len() {
        return None;
    }
    let mut prev = word_at(input, pos - 2);
    let delta = prev.wrapping_sub(word_at(input, pos - 4));
    let mut words = 0;
    while words < WORD_RUN_MAX && pos + 2 * words + 1 < input.len() {
        let w = word_at(input, pos + 2 * words);
        if w != prev.wrapping_add(delta) {
            break;
        }
        prev = w;
        words += 1;
    }
    (words >= WORD_RUN_MIN).then_some(Candidate::WordDiff { words })
}

/// Repeat of the byte before `pos`.
pub fn byte_repeat(input: &[u8], pos: usize) -> Option<Candidate> {
    if pos == 0 || pos >= input.len() || input[pos] != input[pos - 1] {
        return None;
    }
    let v = input[pos];
    let len = input[pos..]
        .iter()
        .take(BYTE_RUN_MAX)
        .take_while(|&&b| b == v)
        .count();
    (len >= BYTE_RUN_MIN).then_some(Candidate::ByteRepeat { len })
}

/// Repeat of the 2-byte pair before `pos`.
pub fn word_repeat(input: &[u8], pos: usize) -> Option<Candidate> {
    if pos < 2 || pos + 1 >= input.len() {
        return None;
    }
    let pair = &input[pos - 2..pos];
    let words = input[pos..]
        .chunks_exact(2)
        .take(WORD_RUN_MAX)
        .take_while(|w| *w == pair)
        .count();
    (words >= WORD_RUN_MIN).then_some(Candidate::WordRepeat { words })
}

/// Best block-copy candidate of each tier at one position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockMatches {
    pub short: Option<Candidate>,
    pub medium: Option<Candidate>,
    pub long: Option<Candidate>,
}

impl BlockMatches {
    fn offer(&mut self, distance: usize, len: usize) {
        for tier in BlockTier::ALL {
            let slot = match tier {
                BlockTier::Short => &mut self.short,
                BlockTier::Medium => &mut self.medium,
                BlockTier::Long => &mut self.long,
            };
            offer(slot, tier.candidate(distance, len));
        }
    }

    /// Tier candidates in short, medium, long order.
    pub fn iter(&self) -> impl Iterator<Item = Candidate> + '_ {
        [self.short, self.medium, self.long].into_iter().flatten()
    }
}

/// Scan back-reference distances `MIN_DISTANCE..=min(pos, LONG_MAX_DISTANCE)`
/// for matches of at least 3 bytes.
///
/// The scan stops at the first match reaching `EARLY_EXIT_LEN` (or the
/// longest encodable length), even though a later distance might match
/// longer.
pub fn block(input: &[u8], pos: usize) -> BlockMatches {
    let mut found = BlockMatches::default();
    if pos >= input.len() {
        return found;
    }
    let max_len = (input.len() - pos).min(LONG_MAX_LEN);
    if max_len < SHORT_LEN {
        return found;
    }

    let target = &input[pos..pos + max_len];
    let max_distance = pos.min(LONG_MAX_DISTANCE);
    for distance in MIN_DISTANCE..=max_distance {
        let src = pos - distance;
        // quick reject on the first byte
        if input[src] != target[0] {
            continue;
        }
        let len = match_len(&input[src..], target);
        if len < SHORT_LEN {
            continue;
        }
        found.offer(distance, len);
        if len == LONG_MAX_LEN || len >= EARLY_EXIT_LEN {
            break;
        }
    }
    found
}

fn match_len(src: &[u8], target: &[u8]) -> usize {
    src.iter().zip(target).take_while(|(a, b)| a == b).count()
}

/// Best candidate of any kind at `pos`.
///
/// Kinds are offered in a fixed order (byte-repeat, word-repeat, byte-diff,
/// word-diff, then the block tiers) and a later one only displaces the
/// current best if strictly better. A constant run therefore encodes as a
/// repeat, never as a zero-delta diff.
pub fn best_at(input: &[u8], pos: usize) -> Option<Candidate> {
    let mut best = None;
    offer(&mut best, byte_repeat(input, pos));
    offer(&mut best, word_repeat(input, pos));
    offer(&mut best, byte_diff(input, pos));
    offer(&mut best, word_diff(input, pos));
    for c in block(input, pos).iter() {
        offer(&mut best, Some(c));
    }
    best
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Bytes with no runs, no repeats and no 3-byte match within 128 bytes.
    fn squares(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i * i) as u8).collect()
    }

    #[test]
    fn byte_diff_needs_history_and_three_bytes() {
        let input = [5u8, 10, 15, 20, 25];
        assert_eq!(byte_diff(&input, 1), None);
        assert_eq!(byte_diff(&input, 2), Some(Candidate::ByteDiff { len: 3 }));
        assert_eq!(byte_diff(&input, 3), None);
    }

    #[test]
    fn byte_diff_wraps_and_caps() {
        let input: Vec<u8> = (0..40u32).map(|i| (200 + i * 7) as u8).collect();
        assert_eq!(byte_diff(&input, 2), Some(Candidate::ByteDiff { len: 18 }));
    }

    #[test]
    fn word_diff_progression() {
        let input: Vec<u8> = (0..6i16)
            .flat_map(|i| (i * 300 - 700).to_le_bytes())
            .collect();
        assert_eq!(word_diff(&input, 4), Some(Candidate::WordDiff { words: 4 }));
        // only one word left
        assert_eq!(word_diff(&input, 10), None);
    }

    #[test]
    fn word_diff_ignores_trailing_odd_byte() {
        let mut input: Vec<u8> = (0..4i16).flat_map(|i| (i * 2).to_le_bytes()).collect();
        input.push(6);
        assert_eq!(word_diff(&input, 4), Some(Candidate::WordDiff { words: 2 }));
    }

    #[test]
    fn word_diff_caps_at_seventeen_words() {
        let input: Vec<u8> = (0..40i16).flat_map(|i| (i * 3).to_le_bytes()).collect();
        assert_eq!(
            word_diff(&input, 4),
            Some(Candidate::WordDiff { words: 17 })
        );
    }

    #[test]
    fn byte_repeat_run() {
        let input = [1u8, 9, 9, 9, 9, 2];
        assert_eq!(byte_repeat(&input, 1), None);
        assert_eq!(byte_repeat(&input, 2), Some(Candidate::ByteRepeat { len: 3 }));
        assert_eq!(byte_repeat(&input, 3), None);
        let long = vec![4u8; 50];
        assert_eq!(byte_repeat(&long, 1), Some(Candidate::ByteRepeat { len: 18 }));
    }

    #[test]
    fn word_repeat_run() {
        let input = [1u8, 2, 1, 2, 1, 2, 1];
        assert_eq!(word_repeat(&input, 2), Some(Candidate::WordRepeat { words: 2 }));
        assert_eq!(word_repeat(&input, 4), None);
    }

    #[test]
    fn no_candidates_in_squares() {
        let input = squares(128);
        for pos in 0..input.len() {
            assert_eq!(best_at(&input, pos), None, "pos {pos}");
        }
    }

    #[test]
    fn block_tiers_for_short_match() {
        let mut input = squares(30);
        let copy = input[10..13].to_vec();
        input.extend_from_slice(&copy);
        let m = block(&input, 30);
        assert_eq!(
            m.short,
            Some(Candidate::Block {
                tier: BlockTier::Short,
                distance: 20,
                len: 3
            })
        );
        assert_eq!(m.medium, None);
        assert_eq!(m.long, None);
    }

    #[test]
    fn block_tiers_respect_distance_limits() {
        // 12-byte match at distance 100: too far for short
        let mut input = squares(120);
        let copy = input[20..32].to_vec();
        input.extend_from_slice(&copy);
        let m = block(&input, 120);
        assert_eq!(m.short, None);
        assert_eq!(
            m.medium,
            Some(Candidate::Block {
                tier: BlockTier::Medium,
                distance: 100,
                len: 11
            })
        );
        assert_eq!(
            m.long,
            Some(Candidate::Block {
                tier: BlockTier::Long,
                distance: 100,
                len: 12
            })
        );
        // medium 2/11 beats long 3/12
        assert_eq!(best_at(&input, 120), m.medium);
    }

    #[test]
    fn block_search_stops_at_first_long_match() {
        // distance 20 matches 19 bytes; distance 120 would match 40
        let base = squares(100);
        let mut input = base.clone();
        input.extend_from_slice(&base[..19]);
        input.push(0xEE);
        let pos = input.len();
        input.extend_from_slice(&base[..40]);

        let long = block(&input, pos).long.unwrap();
        assert_eq!(long.distance(), Some(20));
        assert_eq!(long.cover(), 19);
    }

    #[test]
    fn overlapping_block_match() {
        let input = [1u8, 2, 3, 1, 2, 3, 1, 2, 3, 1, 2, 3, 1];
        let long = block(&input, 3).long.unwrap();
        assert_eq!(long.distance(), Some(3));
        assert_eq!(long.cover(), 10);
    }

    /// Big-endian u16 counter: every 3-byte window is unique.
    fn counter(words: u16) -> Vec<u8> {
        (0..words).flat_map(|i| i.to_be_bytes()).collect()
    }

    #[test]
    fn block_distance_ceiling() {
        let mut input = counter(4098);
        input.truncate(8194);
        let head = input[..5].to_vec();
        input.extend_from_slice(&head);
        let m = block(&input, 8194);
        assert_eq!(
            m.long,
            Some(Candidate::Block {
                tier: BlockTier::Long,
                distance: 8194,
                len: 5
            })
        );
        assert_eq!(m.medium, None);

        // one byte further back is out of reach
        let mut input = counter(4098);
        input.truncate(8195);
        input.extend_from_slice(&head);
        assert_eq!(block(&input, 8195), BlockMatches::default());
    }

    #[test]
    fn repeats_win_ties_with_zero_delta_diffs() {
        let input = [7u8; 40];
        assert_eq!(byte_diff(&input, 19), Some(Candidate::ByteDiff { len: 18 }));
        assert_eq!(word_diff(&input, 19), Some(Candidate::WordDiff { words: 10 }));
        assert_eq!(best_at(&input, 19), Some(Candidate::WordRepeat { words: 10 }));
        assert_eq!(best_at(&input, 1), Some(Candidate::ByteRepeat { len: 18 }));

        let pairs = [1u8, 2].repeat(40);
        assert_eq!(best_at(&pairs, 36), Some(Candidate::WordRepeat { words: 17 }));
    }

    #[test]
    fn best_prefers_block_over_run_on_tie() {
        // at pos 6: byte-diff 3,4,5 and a short block at distance 6, both 1/3
        let input = [3u8, 4, 5, 9, 1, 2, 3, 4, 5];
        assert_eq!(byte_diff(&input, 6), Some(Candidate::ByteDiff { len: 3 }));
        let best = best_at(&input, 6).unwrap();
        assert!(best.is_block());
        assert_eq!(best.distance(), Some(6));
    }
}
