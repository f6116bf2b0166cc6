//! # Hybrid-Consensus
//!
//! Difficulty retargeting and proof-of-work acceptance for a hybrid
//! proof-of-work / proof-of-stake chain.
//!
//! This crate provides pure, side-effect-free functions that compute the
//! compact target ("bits") the next block must meet, and decide whether a
//! block hash satisfies the target it claims.
//!
//! ## Architecture
//!
//! The system follows a layered architecture:
//! - Compact target encoding and 256-bit arithmetic ([`compact`])
//! - Consensus parameters per network ([`params`])
//! - Read-only chain view and typed ancestor searches ([`chain`], [`walker`])
//! - Height-banded retarget schedule ([`schedule`])
//! - Proof-of-work and proof-of-stake retargeting ([`pow`], [`pos`])
//! - Header hashing and the proof-of-work hash seam ([`header`])
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every result depends only on the chain view and the parameters passed in
//! 2. **Bit-Exact Arithmetic**: 256-bit products wrap and every target passes through the compact encoding
//! 3. **Historical Rules Kept**: each retired retarget algorithm keeps its height band
//! 4. **No Global State**: parameters are threaded explicitly through every call
//!
//! ## Usage
//!
//! ```rust
//! use hybrid_consensus::{ChainIndex, CompactTarget, ConsensusParams, HybridConsensus, Network};
//!
//! let consensus = HybridConsensus::new(ConsensusParams::new(Network::Main)).unwrap();
//! let bits = CompactTarget::new(0x1e0f_ffff);
//!
//! let mut chain = ChainIndex::new();
//! let genesis = chain.push_root(0, 1_400_000_000, bits, false).unwrap();
//! let tip = chain.push_child(genesis, 1_400_000_150, bits, false).unwrap();
//!
//! let next = consensus.next_pow_target(&chain, tip, 1_400_000_300).unwrap();
//! assert_eq!(next, bits);
//! ```

pub mod chain;
pub mod compact;
pub mod error;
pub mod header;
pub mod params;
pub mod pos;
pub mod pow;
pub mod schedule;
pub mod types;
pub mod walker;

// Re-export commonly used types
pub use chain::{ChainIndex, ChainView};
pub use compact::{CompactTarget, DecodedTarget};
pub use error::{ConsensusError, Result};
pub use header::{BlockHeader, PowAlgorithm, PowHasher};
pub use params::{load_params, ConsensusParams, Network};
pub use schedule::{RetargetAlgorithm, RetargetBand, RetargetSchedule};
pub use types::*;
pub use walker::AncestorPolicy;

/// Target the block built on `last` must meet.
///
/// Proof-of-stake candidates go to the stake retarget, everything else to
/// the proof-of-work schedule. `last` must exist in `chain`.
pub fn next_work_required<C: ChainView + ?Sized>(
    chain: &C,
    last: BlockId,
    candidate: &BlockHeader,
    params: &ConsensusParams,
    want_proof_of_stake: bool,
) -> Result<CompactTarget> {
    let record = chain.record(last).ok_or(ConsensusError::UnknownBlock(last))?;
    if want_proof_of_stake {
        pos::next_pos_target(chain, record, params)
    } else {
        pow::next_pow_target(chain, record, candidate.timestamp(), params)
    }
}

/// Retargeting and proof checks bound to one network's parameters
///
/// # Examples
///
/// ```
/// use hybrid_consensus::{ConsensusParams, HybridConsensus, Network, RetargetAlgorithm};
///
/// let consensus = HybridConsensus::new(ConsensusParams::new(Network::Main)).unwrap();
///
/// // Heights below the hash switch retarget once per epoch
/// assert_eq!(consensus.algorithm_for(5_000), RetargetAlgorithm::LegacyEpoch);
/// ```
#[derive(Debug, Clone)]
pub struct HybridConsensus {
    params: ConsensusParams,
    schedule: RetargetSchedule,
}

impl HybridConsensus {
    /// Validate `params` and build the retarget schedule from them
    ///
    /// # Examples
    ///
    /// ```
    /// use hybrid_consensus::{ConsensusParams, HybridConsensus, Network};
    ///
    /// let mut params = ConsensusParams::new(Network::Main);
    /// params.pow_target_spacing = 0;
    /// assert!(HybridConsensus::new(params).is_err());
    /// ```
    pub fn new(params: ConsensusParams) -> Result<Self> {
        params.validate()?;
        let schedule = RetargetSchedule::from_params(&params)?;
        Ok(HybridConsensus { params, schedule })
    }

    /// Preset parameters for `network`
    pub fn for_network(network: Network) -> Result<Self> {
        Self::new(ConsensusParams::new(network))
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    pub fn schedule(&self) -> &RetargetSchedule {
        &self.schedule
    }

    /// Retarget algorithm in force for a block at `next_height`
    pub fn algorithm_for(&self, next_height: Height) -> RetargetAlgorithm {
        self.schedule.select(i64::from(next_height))
    }

    /// Target for a proof-of-work block built on `last` at `candidate_time`
    ///
    /// # Examples
    ///
    /// ```
    /// use hybrid_consensus::{ChainIndex, HybridConsensus, Network};
    ///
    /// let consensus = HybridConsensus::for_network(Network::Main).unwrap();
    /// let limit = consensus.params().pow_limit_bits();
    ///
    /// // The first blocks after the hash switch sit at the new limit
    /// let mut chain = ChainIndex::new();
    /// let switch = consensus.params().hash_switch_height;
    /// let tip = chain.push_root(switch - 1, 1_500_000_000, limit, false).unwrap();
    /// assert_eq!(consensus.next_pow_target(&chain, tip, 1_500_000_300).unwrap(), limit);
    /// ```
    pub fn next_pow_target<C: ChainView + ?Sized>(
        &self,
        chain: &C,
        last: BlockId,
        candidate_time: Timestamp,
    ) -> Result<CompactTarget> {
        let record = chain.record(last).ok_or(ConsensusError::UnknownBlock(last))?;
        pow::next_pow_target_with_schedule(chain, record, candidate_time, &self.params, &self.schedule)
    }

    /// Target for a proof-of-stake block built on `last`
    pub fn next_pos_target<C: ChainView + ?Sized>(
        &self,
        chain: &C,
        last: BlockId,
    ) -> Result<CompactTarget> {
        let record = chain.record(last).ok_or(ConsensusError::UnknownBlock(last))?;
        pos::next_pos_target(chain, record, &self.params)
    }

    /// Target for `candidate`, of the requested block type, built on `last`
    pub fn next_work_required<C: ChainView + ?Sized>(
        &self,
        chain: &C,
        last: BlockId,
        candidate: &BlockHeader,
        want_proof_of_stake: bool,
    ) -> Result<CompactTarget> {
        if want_proof_of_stake {
            self.next_pos_target(chain, last)
        } else {
            self.next_pow_target(chain, last, candidate.timestamp())
        }
    }

    /// Check a big-endian hash against claimed `bits` at `height`
    ///
    /// # Examples
    ///
    /// ```
    /// use hybrid_consensus::{CompactTarget, HybridConsensus, Network};
    ///
    /// let consensus = HybridConsensus::for_network(Network::Main).unwrap();
    /// let bits = CompactTarget::new(0x1d00_ffff);
    ///
    /// let mut hash = [0u8; 32];
    /// hash[4] = 0xff;
    /// hash[5] = 0xff;
    /// assert!(consensus.check_proof_of_work(&hash, 20_000, bits));
    ///
    /// hash[6] = 0x01;
    /// assert!(!consensus.check_proof_of_work(&hash, 20_000, bits));
    /// ```
    pub fn check_proof_of_work(&self, hash: &Hash, height: Height, bits: CompactTarget) -> bool {
        pow::check_proof_of_work(hash, height, bits, &self.params)
    }

    /// Check a header's proof of work with the node's hash implementation
    pub fn check_header<H: PowHasher + ?Sized>(
        &self,
        header: &BlockHeader,
        height: Height,
        hasher: &H,
    ) -> ProofOutcome {
        crate::header::check_header_proof_of_work(header, height, &self.params, hasher)
    }
}
