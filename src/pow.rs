//! Proof-of-work retargeting and proof acceptance
//!
//! The target for the next proof-of-work block depends on which height band
//! it falls in (see [`crate::schedule`]):
//!
//! 1. below the hash switch: fixed-epoch retarget
//! 2. just after the hash switch: the proof-of-work limit, held
//! 3. up to the v2 switch: DarkGravityWave over 24 blocks
//! 4. just after the v2 switch: a fixed plateau target, held
//! 5. from then on: DarkGravityWave over the v2 window, filler blocks skipped
//!
//! All arithmetic is on 256-bit unsigned integers with wrapping products,
//! and every result goes through the lossy compact encoding.

use log::debug;
use primitive_types::U256;

use crate::chain::{ancestors, ChainView};
use crate::compact::{div_scalar, mul_scalar, CompactTarget};
use crate::error::{ConsensusError, Result};
use crate::params::ConsensusParams;
use crate::schedule::{RetargetAlgorithm, RetargetSchedule};
use crate::types::{BlockRecord, Hash, Height, ProofOutcome, Timestamp};
use crate::walker::{find_last_proof_of_work, AncestorPolicy};

/// Height of the block that will be built on `last`
pub(crate) fn next_height(last: &BlockRecord) -> Result<Height> {
    last.height.checked_add(1).ok_or_else(|| {
        ConsensusError::Precondition(format!("no height above {}", last.height))
    })
}

/// GetNextWorkRequired for a proof-of-work block built on `last`
pub fn next_pow_target<C: ChainView + ?Sized>(
    chain: &C,
    last: &BlockRecord,
    candidate_time: Timestamp,
    params: &ConsensusParams,
) -> Result<CompactTarget> {
    let schedule = RetargetSchedule::from_params(params)?;
    next_pow_target_with_schedule(chain, last, candidate_time, params, &schedule)
}

/// As [`next_pow_target`], with an explicit band table
pub fn next_pow_target_with_schedule<C: ChainView + ?Sized>(
    chain: &C,
    last: &BlockRecord,
    candidate_time: Timestamp,
    params: &ConsensusParams,
    schedule: &RetargetSchedule,
) -> Result<CompactTarget> {
    let height = next_height(last)?;
    let bits = match schedule.select(i64::from(height)) {
        RetargetAlgorithm::LegacyEpoch => legacy_epoch_target(chain, last, candidate_time, params)?,
        RetargetAlgorithm::PowLimitPlateau => params.pow_limit_bits(),
        RetargetAlgorithm::DarkGravityWave { window, policy } => {
            dark_gravity_wave(chain, last, params, window, policy)?
        }
        RetargetAlgorithm::FixedPlateau(bits) => bits,
    };
    debug!("next proof-of-work target at height {}: {}", height, bits);
    Ok(bits)
}

/// Fixed-epoch retarget of the scrypt era.
///
/// Off an epoch boundary the previous target carries over, except that a
/// network allowing min-difficulty blocks hands out the legacy limit when
/// the candidate is more than two spacings late.
pub fn legacy_epoch_target<C: ChainView + ?Sized>(
    chain: &C,
    last: &BlockRecord,
    candidate_time: Timestamp,
    params: &ConsensusParams,
) -> Result<CompactTarget> {
    let floor = params.pow_limit_legacy_bits();
    let height = next_height(last)?;
    let interval = params.epoch_length(height);
    let offset = i64::from(height).checked_rem(interval).ok_or_else(|| {
        ConsensusError::InvalidParams(format!("empty retarget epoch at height {}", height))
    })?;

    if offset != 0 {
        if params.pow_allow_min_difficulty_blocks {
            if candidate_time > last.time + params.pow_target_spacing_at(last.height) * 2 {
                return Ok(floor);
            }
            // Last block that was not mined under the min-difficulty rule
            let mut record = last;
            while let Some(parent) = chain.parent(record) {
                if params.is_epoch_boundary(record.height) || record.bits != floor {
                    break;
                }
                record = parent;
            }
            return Ok(record.bits);
        }
        return Ok(last.bits);
    }

    // Go back the full epoch, except on the first retarget after genesis
    let blocks_back = if i64::from(height) != interval {
        interval
    } else {
        interval - 1
    };
    let first = usize::try_from(blocks_back)
        .ok()
        .and_then(|back| ancestors(chain, last).nth(back))
        .ok_or_else(|| {
            ConsensusError::Precondition(format!(
                "epoch retarget at height {} needs {} ancestors",
                height, blocks_back
            ))
        })?;

    calculate_legacy_retarget(last.bits, first.time, last.time, params)
}

/// CalculateNextWorkRequired: scale the old target by the epoch's actual
/// timespan, clamped to a factor of four either way.
pub fn calculate_legacy_retarget(
    last_bits: CompactTarget,
    first_time: Timestamp,
    last_time: Timestamp,
    params: &ConsensusParams,
) -> Result<CompactTarget> {
    if params.pow_no_retargeting {
        return Ok(last_bits);
    }

    let target_timespan = params.pow_target_timespan;
    let mut actual_timespan = last_time - first_time;
    if actual_timespan < target_timespan / 4 {
        actual_timespan = target_timespan / 4;
    }
    if actual_timespan > target_timespan * 4 {
        actual_timespan = target_timespan * 4;
    }

    let limit = params.pow_limit_legacy;
    let mut target = last_bits.decode().target;
    // The product can overflow by one bit when the old target sits at the limit
    let shift = limit
        .bits()
        .checked_sub(1)
        .map_or(false, |limit_bits| target.bits() > limit_bits);
    if shift {
        target = target >> 1u32;
    }
    target = mul_scalar(target, actual_timespan);
    target = div_scalar(target, target_timespan)?;
    if shift {
        target = target << 1u32;
    }

    if target > limit {
        target = limit;
    }
    Ok(CompactTarget::from_target(&target))
}

/// DarkGravityWave: running average of the last `window` proof-of-work
/// targets, scaled by how long those blocks took against schedule (clamped
/// to a factor of three either way).
///
/// `policy` decides which ancestors count as proof-of-work samples.
pub fn dark_gravity_wave<C: ChainView + ?Sized>(
    chain: &C,
    last: &BlockRecord,
    params: &ConsensusParams,
    window: i64,
    policy: AncestorPolicy,
) -> Result<CompactTarget> {
    let limit = params.pow_limit;
    let last_solved = match find_last_proof_of_work(chain, Some(last), params, policy) {
        Some(record) if record.height != 0 && i64::from(record.height) >= window => record,
        _ => return Ok(CompactTarget::from_target(&limit)),
    };

    let mut count: i64 = 0;
    let mut average = U256::zero();
    let mut actual_timespan: i64 = 0;
    let mut last_block_time: Timestamp = 0;
    let mut reading = Some(last_solved);

    while let Some(record) = reading {
        if record.height == 0 || count >= window {
            break;
        }
        count += 1;

        let target = record.bits.decode().target;
        average = if count == 1 {
            target
        } else {
            let weighted = mul_scalar(average, count).overflowing_add(target).0;
            div_scalar(weighted, count + 1)?
        };

        if last_block_time > 0 {
            actual_timespan += last_block_time - record.time;
        }
        last_block_time = record.time;

        reading = find_last_proof_of_work(chain, chain.parent(record), params, policy);
    }

    let target_timespan = count * params.pow_target_spacing_at(last.height);
    if actual_timespan < target_timespan / 3 {
        actual_timespan = target_timespan / 3;
    }
    if actual_timespan > target_timespan * 3 {
        actual_timespan = target_timespan * 3;
    }

    let mut target = mul_scalar(average, actual_timespan);
    target = div_scalar(target, target_timespan)?;
    if target > limit {
        target = limit;
    }

    debug!(
        "DarkGravityWave over {} blocks: {}s actual, {}s expected",
        count, actual_timespan, target_timespan
    );
    Ok(CompactTarget::from_target(&target))
}

/// CheckProofOfWork with the reason for a rejection
pub fn evaluate_proof_of_work(
    hash: &Hash,
    height: Height,
    bits: CompactTarget,
    params: &ConsensusParams,
) -> ProofOutcome {
    let decoded = bits.decode();
    let limit = params.pow_limit_for_height(height);

    let outcome = if decoded.negative {
        ProofOutcome::NegativeTarget
    } else if decoded.overflow {
        ProofOutcome::OverflowTarget
    } else if decoded.target.is_zero() {
        ProofOutcome::ZeroTarget
    } else if decoded.target > limit {
        ProofOutcome::AboveLimit
    } else if U256::from_big_endian(hash) > decoded.target {
        ProofOutcome::HashAboveTarget
    } else {
        ProofOutcome::Accepted
    };

    if !outcome.is_accepted() {
        debug!(
            "proof of work rejected at height {} with bits {}: {}",
            height, bits, outcome
        );
    }
    outcome
}

/// CheckProofOfWork: `hash` (big-endian) must not exceed the target `bits`
/// decodes to, and that target must be a valid one for `height`.
pub fn check_proof_of_work(
    hash: &Hash,
    height: Height,
    bits: CompactTarget,
    params: &ConsensusParams,
) -> bool {
    evaluate_proof_of_work(hash, height, bits, params).is_accepted()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainIndex;
    use crate::params::Network;
    use crate::types::BlockId;

    fn hash_of(value: U256) -> Hash {
        let mut hash = [0u8; 32];
        value.to_big_endian(&mut hash);
        hash
    }

    fn work_chain(len: usize, bits: CompactTarget, spacing: i64) -> (ChainIndex, BlockId) {
        let mut chain = ChainIndex::new();
        let mut id = chain.push_root(0, 1_000_000, bits, false).unwrap();
        for i in 1..len {
            id = chain
                .push_child(id, 1_000_000 + spacing * i as i64, bits, false)
                .unwrap();
        }
        (chain, id)
    }

    #[test]
    fn test_legacy_retarget_on_schedule_keeps_target() {
        let params = ConsensusParams::new(Network::Main);
        let bits = CompactTarget::new(0x1c0f_ffff);
        let result =
            calculate_legacy_retarget(bits, 0, params.pow_target_timespan, &params).unwrap();
        assert_eq!(result, bits);
    }

    #[test]
    fn test_legacy_retarget_halves_and_doubles() {
        let params = ConsensusParams::new(Network::Main);
        let bits = CompactTarget::new(0x1c10_0000);
        let span = params.pow_target_timespan;

        let faster = calculate_legacy_retarget(bits, 0, span / 2, &params).unwrap();
        assert_eq!(faster, CompactTarget::new(0x1c08_0000));

        let slower = calculate_legacy_retarget(bits, 0, span * 2, &params).unwrap();
        assert_eq!(slower, CompactTarget::new(0x1c20_0000));
    }

    #[test]
    fn test_legacy_retarget_pre_shift_at_limit() {
        let params = ConsensusParams::new(Network::Main);
        let limit_bits = params.pow_limit_legacy_bits();
        // Faster than schedule: the shifted path must still land below the limit.
        let result = calculate_legacy_retarget(
            limit_bits,
            0,
            params.pow_target_timespan / 2,
            &params,
        )
        .unwrap();
        let expected = ((limit_bits.decode().target >> 1u32) * U256::from(params.pow_target_timespan as u64 / 2)
            / U256::from(params.pow_target_timespan as u64))
            << 1u32;
        assert_eq!(result, CompactTarget::from_target(&expected));
        assert!(result.decode().target < params.pow_limit_legacy);
    }

    #[test]
    fn test_legacy_no_retargeting_flag() {
        let mut params = ConsensusParams::new(Network::Main);
        params.pow_no_retargeting = true;
        let bits = CompactTarget::new(0x1c12_3456);
        assert_eq!(calculate_legacy_retarget(bits, 0, 1, &params).unwrap(), bits);
    }

    #[test]
    fn test_dgw_falls_back_to_limit_on_short_chain() {
        let params = ConsensusParams::new(Network::Main);
        let (chain, last) = work_chain(10, CompactTarget::new(0x1c12_3456), 300);
        let last = chain.get(last).unwrap();
        let bits = dark_gravity_wave(&chain, last, &params, 24, AncestorPolicy::Parent).unwrap();
        assert_eq!(bits, params.pow_limit_bits());
    }

    #[test]
    fn test_dgw_on_schedule_is_stable() {
        let params = ConsensusParams::new(Network::Main);
        let bits = CompactTarget::new(0x1c12_3456);
        let spacing = params.pow_target_spacing_at(0);
        let (chain, last) = work_chain(25, bits, spacing);
        let last = chain.get(last).unwrap();

        let result = dark_gravity_wave(&chain, last, &params, 24, AncestorPolicy::Parent).unwrap();

        // 24 samples span 23 intervals
        let target = bits.decode().target;
        let expected = target * U256::from(23 * spacing as u64) / U256::from(24 * spacing as u64);
        assert_eq!(result, CompactTarget::from_target(&expected));
        let got = result.decode().target;
        assert!(got <= target);
        assert!(got > target * U256::from(9u32) / U256::from(10u32));
    }

    #[test]
    fn test_proof_hash_equal_to_target_accepted() {
        let params = ConsensusParams::new(Network::Main);
        let bits = CompactTarget::new(0x1d00_ffff);
        let target = bits.decode().target;
        assert!(check_proof_of_work(&hash_of(target), 20_000, bits, &params));
        assert_eq!(
            evaluate_proof_of_work(&hash_of(target + U256::one()), 20_000, bits, &params),
            ProofOutcome::HashAboveTarget
        );
    }

    #[test]
    fn test_proof_rejects_malformed_bits() {
        let params = ConsensusParams::new(Network::Main);
        let zero_hash = [0u8; 32];
        assert_eq!(
            evaluate_proof_of_work(&zero_hash, 20_000, CompactTarget::new(0x0492_3456), &params),
            ProofOutcome::NegativeTarget
        );
        assert_eq!(
            evaluate_proof_of_work(&zero_hash, 20_000, CompactTarget::new(0xff12_3456), &params),
            ProofOutcome::OverflowTarget
        );
        assert_eq!(
            evaluate_proof_of_work(&zero_hash, 20_000, CompactTarget::new(0x1d00_0000), &params),
            ProofOutcome::ZeroTarget
        );
    }

    #[test]
    fn test_proof_limit_depends_on_height() {
        let params = ConsensusParams::new(Network::Main);
        // Valid under the new limit but easier than the legacy one
        let bits = params.pow_limit_bits();
        let zero_hash = [0u8; 32];
        assert!(check_proof_of_work(&zero_hash, params.hash_switch_height, bits, &params));
        assert_eq!(
            evaluate_proof_of_work(&zero_hash, params.hash_switch_height - 1, bits, &params),
            ProofOutcome::AboveLimit
        );
    }
}
