//! Proof-of-stake retargeting
//!
//! Each stake block's target is the previous stake block's, nudged towards
//! the configured spacing by the gap between the last two stake blocks. The
//! nudge is damped over [`ConsensusParams::pos_adjustment_interval`] blocks.

use log::{debug, warn};

use crate::chain::ChainView;
use crate::compact::{div_scalar, mul_scalar, CompactTarget};
use crate::error::{ConsensusError, Result};
use crate::params::ConsensusParams;
use crate::pow::next_height;
use crate::types::BlockRecord;
use crate::walker::find_last_proof_of_stake;

/// Target for a proof-of-stake block built on `last`.
///
/// Must not be asked for before the stake grace period has passed; doing so
/// is a caller bug and yields [`ConsensusError::Precondition`].
pub fn next_pos_target<C: ChainView + ?Sized>(
    chain: &C,
    last: &BlockRecord,
    params: &ConsensusParams,
) -> Result<CompactTarget> {
    params.validate()?;
    let height = next_height(last)?;
    let first_retarget =
        u64::from(params.pos_activation_height) + u64::from(params.pos_grace_period);
    if u64::from(height) <= first_retarget {
        return Err(ConsensusError::Precondition(format!(
            "stake target requested at height {} within the grace period ending at {}",
            height, first_retarget
        )));
    }

    let initial = params.initial_pos_bits();
    let prev = match find_last_proof_of_stake(chain, Some(last), params) {
        Some(record) => record,
        None => return Ok(initial),
    };
    let prev_prev = match find_last_proof_of_stake(chain, chain.parent(prev), params) {
        Some(record) if chain.parent(record).is_some() => record,
        _ => return Ok(initial),
    };

    let actual_spacing = prev.time - prev_prev.time;
    let interval = params.pos_adjustment_interval();
    let spacing = params.pos_target_spacing;

    let numerator = (interval - 1) * spacing + actual_spacing + actual_spacing;
    if numerator <= 0 {
        warn!(
            "stake spacing {}s between heights {} and {} drives the retarget factor to {}",
            actual_spacing, prev_prev.height, prev.height, numerator
        );
    }

    let mut target = mul_scalar(prev.bits.decode().target, numerator);
    target = div_scalar(target, (interval + 1) * spacing)?;
    if target > params.pow_limit {
        target = params.pow_limit;
    }

    let bits = CompactTarget::from_target(&target);
    debug!(
        "next proof-of-stake target at height {}: {} (spacing {}s)",
        height, bits, actual_spacing
    );
    Ok(bits)
}
