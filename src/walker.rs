//! Backward ancestor searches by block type
//!
//! Proof-of-work retargeting must only average proof-of-work blocks, and
//! proof-of-stake retargeting only stake blocks. Which blocks count as "real"
//! proof-of-work changed over the life of the chain, so the filter is a
//! selectable [`AncestorPolicy`]; every historical policy stays available so
//! old blocks can be re-validated.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::chain::ChainView;
use crate::params::ConsensusParams;
use crate::types::BlockRecord;

/// Which records a proof-of-work ancestor search steps over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AncestorPolicy {
    /// Take every record; used by the first-generation DarkGravityWave
    Parent,
    /// Step over proof-of-stake records only
    SkipStake,
    /// Step over proof-of-stake records and floor-difficulty filler blocks
    SkipStakeAndFiller,
}

impl AncestorPolicy {
    fn skips(self, record: &BlockRecord, params: &ConsensusParams) -> bool {
        match self {
            AncestorPolicy::Parent => false,
            AncestorPolicy::SkipStake => record.is_proof_of_stake(),
            AncestorPolicy::SkipStakeAndFiller => {
                record.is_proof_of_stake() || is_filler_block(record, params)
            }
        }
    }
}

/// A block mined at a floor target rather than a computed one: either the
/// current proof-of-work limit away from an epoch boundary, or the floor the
/// chain started out with.
pub fn is_filler_block(record: &BlockRecord, params: &ConsensusParams) -> bool {
    (!params.is_epoch_boundary(record.height) && record.bits == params.pow_limit_bits())
        || record.bits == params.initial_pow_floor_bits
}

/// Most recent proof-of-stake record at or below `start`.
///
/// Returns `None` once the search drops to the stake activation height
/// without finding one. A root record ends the search and is returned as is.
pub fn find_last_proof_of_stake<'a, C: ChainView + ?Sized>(
    chain: &'a C,
    start: Option<&'a BlockRecord>,
    params: &ConsensusParams,
) -> Option<&'a BlockRecord> {
    let mut current = start?;
    while !current.is_proof_of_stake() {
        let parent = match chain.parent(current) {
            Some(parent) => parent,
            None => break,
        };
        if current.height <= params.pos_activation_height {
            trace!(
                "stake search crossed activation height {} at {}",
                params.pos_activation_height,
                current.height
            );
            return None;
        }
        current = parent;
    }
    Some(current)
}

/// Most recent record at or below `start` that `policy` does not step over.
/// A root record ends the search and is returned as is.
pub fn find_last_proof_of_work<'a, C: ChainView + ?Sized>(
    chain: &'a C,
    start: Option<&'a BlockRecord>,
    params: &ConsensusParams,
    policy: AncestorPolicy,
) -> Option<&'a BlockRecord> {
    let mut current = start?;
    while policy.skips(current, params) {
        match chain.parent(current) {
            Some(parent) => {
                trace!("{:?} search skipping height {}", policy, current.height);
                current = parent;
            }
            None => break,
        }
    }
    Some(current)
}

/// Most recent record of the wanted type, proof-of-work searches using the
/// current filler-aware policy
pub fn find_last_of_type<'a, C: ChainView + ?Sized>(
    chain: &'a C,
    start: Option<&'a BlockRecord>,
    want_proof_of_stake: bool,
    params: &ConsensusParams,
) -> Option<&'a BlockRecord> {
    if want_proof_of_stake {
        find_last_proof_of_stake(chain, start, params)
    } else {
        find_last_proof_of_work(chain, start, params, AncestorPolicy::SkipStakeAndFiller)
    }
}
