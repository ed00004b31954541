// Match candidates and the cost/cover ordering used to choose between them.

use std::cmp::Ordering;

use crate::format::opcode::{
    LONG_MAX_DISTANCE, LONG_MAX_LEN, LONG_MIN_LEN, MEDIUM_MAX_DISTANCE, MEDIUM_MAX_LEN,
    MEDIUM_MIN_LEN, Op, SHORT_LEN, SHORT_MAX_DISTANCE,
};

/// Block-copy opcode tier, by reachable distance and expressible length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockTier {
    Short,
    Medium,
    Long,
}

impl BlockTier {
    pub const ALL: [BlockTier; 3] = [BlockTier::Short, BlockTier::Medium, BlockTier::Long];

    /// Encoded size of the opcode in bytes.
    pub fn cost(self) -> usize {
        match self {
            Self::Short => 1,
            Self::Medium => 2,
            Self::Long => 3,
        }
    }

    pub fn max_distance(self) -> usize {
        match self {
            Self::Short => SHORT_MAX_DISTANCE,
            Self::Medium => MEDIUM_MAX_DISTANCE,
            Self::Long => LONG_MAX_DISTANCE,
        }
    }

    pub fn min_len(self) -> usize {
        match self {
            Self::Short => SHORT_LEN,
            Self::Medium => MEDIUM_MIN_LEN,
            Self::Long => LONG_MIN_LEN,
        }
    }

    pub fn max_len(self) -> usize {
        match self {
            Self::Short => SHORT_LEN,
            Self::Medium => MEDIUM_MAX_LEN,
            Self::Long => LONG_MAX_LEN,
        }
    }

    /// Tier candidate for a match of `len` bytes at `distance`, if the tier
    /// can express it. Longer matches are clipped to the tier's maximum.
    pub fn candidate(self, distance: usize, len: usize) -> Option<Candidate> {
        if distance > self.max_distance() || len < self.min_len() {
            return None;
        }
        Some(Candidate::Block {
            tier: self,
            distance,
            len: len.min(self.max_len()),
        })
    }
}

/// A non-literal encoding option at one input position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    ByteDiff { len: usize },
    WordDiff { words: usize },
    ByteRepeat { len: usize },
    WordRepeat { words: usize },
    Block {
        tier: BlockTier,
        distance: usize,
        len: usize,
    },
}

impl Candidate {
    /// Input bytes consumed.
    pub fn cover(&self) -> usize {
        match *self {
            Self::ByteDiff { len } | Self::ByteRepeat { len } | Self::Block { len, .. } => len,
            Self::WordDiff { words } | Self::WordRepeat { words } => 2 * words,
        }
    }

    /// Output bytes produced.
    pub fn cost(&self) -> usize {
        match *self {
            Self::Block { tier, .. } => tier.cost(),
            _ => 1,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block { .. })
    }

    /// Back-reference distance for block candidates.
    pub fn distance(&self) -> Option<usize> {
        match *self {
            Self::Block { distance, .. } => Some(distance),
            _ => None,
        }
    }

    /// The opcode that emits this candidate.
    pub fn to_op(&self) -> Op<'static> {
        match *self {
            Self::ByteDiff { len } => Op::ByteDiff { len },
            Self::WordDiff { words } => Op::WordDiff { words },
            Self::ByteRepeat { len } => Op::ByteRepeat { len },
            Self::WordRepeat { words } => Op::WordRepeat { words },
            Self::Block {
                tier: BlockTier::Short,
                distance,
                ..
            } => Op::ShortBlock { distance },
            Self::Block {
                tier: BlockTier::Medium,
                distance,
                len,
            } => Op::MediumBlock { distance, len },
            Self::Block {
                tier: BlockTier::Long,
                distance,
                len,
            } => Op::LongBlock { distance, len },
        }
    }
}

/// Preference order between two candidates; `Greater` means `a` is preferred.
///
/// Lower cost per covered byte wins (compared by cross-multiplication), then
/// larger cover, then a block copy over a diff/repeat run, then the smaller
/// back-reference distance.
pub fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    (b.cost() * a.cover())
        .cmp(&(a.cost() * b.cover()))
        .then(a.cover().cmp(&b.cover()))
        .then(a.is_block().cmp(&b.is_block()))
        .then_with(|| match (a.distance(), b.distance()) {
            (Some(da), Some(db)) => db.cmp(&da),
            _ => Ordering::Equal,
        })
}

/// True if `a` is strictly preferred over `b`.
pub fn better(a: &Candidate, b: &Candidate) -> bool {
    compare(a, b) == Ordering::Greater
}

/// Replace `best` with `candidate` when there is no best yet or the
/// candidate is strictly better. Earlier offers win ties.
pub fn offer(best: &mut Option<Candidate>, candidate: Option<Candidate>) {
    let Some(c) = candidate else { return };
    if best.as_ref().is_none_or(|b| better(&c, b)) {
        *best = Some(c);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
