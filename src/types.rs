//! Core types shared by the retargeting and validation paths

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::compact::CompactTarget;

/// Hash type: 256-bit hash
pub type Hash = [u8; 32];

/// Block height, genesis = 0
pub type Height = u32;

/// Block timestamp in seconds
pub type Timestamp = i64;

/// Position of a record in the chain arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub usize);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Chain index entry as seen by the retargeting code.
///
/// The parent is stored as an arena index rather than a reference, so a
/// record can be copied out of the index and the index itself can be
/// rewound on reorganisation without dangling links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub height: Height,
    pub time: Timestamp,
    pub bits: CompactTarget,
    pub proof_of_stake: bool,
    pub parent: Option<BlockId>,
}

impl BlockRecord {
    pub fn is_proof_of_stake(&self) -> bool {
        self.proof_of_stake
    }

    pub fn is_proof_of_work(&self) -> bool {
        !self.proof_of_stake
    }
}

/// Outcome of checking a hash against a claimed compact target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofOutcome {
    Accepted,
    /// Sign bit set on a non-zero mantissa
    NegativeTarget,
    /// Magnitude does not fit in 256 bits
    OverflowTarget,
    ZeroTarget,
    /// Decoded target is easier than the network limit for the height
    AboveLimit,
    HashAboveTarget,
}

impl ProofOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ProofOutcome::Accepted)
    }
}

impl fmt::Display for ProofOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            ProofOutcome::Accepted => "accepted",
            ProofOutcome::NegativeTarget => "negative target",
            ProofOutcome::OverflowTarget => "target overflows 256 bits",
            ProofOutcome::ZeroTarget => "zero target",
            ProofOutcome::AboveLimit => "target above network limit",
            ProofOutcome::HashAboveTarget => "hash above target",
        };
        f.write_str(reason)
    }
}
