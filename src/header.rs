//! Block header serialization, hashing and the proof-of-work hash seam
//!
//! The memory-hard hashes (scrypt before the hash switch, Lyra2Z from it on)
//! are not implemented here; nodes plug them in through [`PowHasher`].
//! Hashes are kept in the internal little-endian byte order that the
//! serialization produces, and reversed to big-endian only for comparison
//! against a target.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::compact::CompactTarget;
use crate::params::ConsensusParams;
use crate::pow::evaluate_proof_of_work;
use crate::types::{Hash, Height, ProofOutcome, Timestamp};

/// Length of a serialized header
pub const HEADER_SIZE: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block_hash: Hash,
    pub merkle_root: Hash,
    pub time: u32,
    pub bits: CompactTarget,
    pub nonce: u32,
}

/// Hash function a header's proof of work is computed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowAlgorithm {
    Scrypt,
    Lyra2Z,
}

impl PowAlgorithm {
    pub fn for_height(height: Height, params: &ConsensusParams) -> Self {
        if height >= params.hash_switch_height {
            PowAlgorithm::Lyra2Z
        } else {
            PowAlgorithm::Scrypt
        }
    }
}

impl fmt::Display for PowAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowAlgorithm::Scrypt => write!(f, "scrypt"),
            PowAlgorithm::Lyra2Z => write!(f, "lyra2z"),
        }
    }
}

/// Proof-of-work hash implementation supplied by the node
pub trait PowHasher {
    /// Hash a serialized header, returning the digest in internal
    /// (little-endian) byte order
    fn pow_hash(&self, algorithm: PowAlgorithm, header: &[u8; HEADER_SIZE]) -> Hash;
}

impl BlockHeader {
    /// Consensus serialization: every integer little-endian
    pub fn serialize(&self) -> [u8; HEADER_SIZE] {
        let mut data = [0u8; HEADER_SIZE];
        data[0..4].copy_from_slice(&self.version.to_le_bytes());
        data[4..36].copy_from_slice(&self.prev_block_hash);
        data[36..68].copy_from_slice(&self.merkle_root);
        data[68..72].copy_from_slice(&self.time.to_le_bytes());
        data[72..76].copy_from_slice(&self.bits.to_consensus().to_le_bytes());
        data[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        data
    }

    /// Block identity hash: double SHA-256 of the serialization
    pub fn block_hash(&self) -> Hash {
        let first = Sha256::digest(self.serialize());
        let second = Sha256::digest(first);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&second);
        hash
    }

    /// Proof-of-work hash for the header mined at `height`
    pub fn pow_hash<H: PowHasher + ?Sized>(
        &self,
        height: Height,
        params: &ConsensusParams,
        hasher: &H,
    ) -> Hash {
        hasher.pow_hash(PowAlgorithm::for_height(height, params), &self.serialize())
    }

    /// Lowest bit of the block hash, mixed into the stake modifier
    pub fn stake_entropy_bit(&self) -> u8 {
        self.block_hash()[0] & 1
    }

    pub fn timestamp(&self) -> Timestamp {
        Timestamp::from(self.time)
    }
}

/// Check a header's proof of work at `height`.
pub fn check_header_proof_of_work<H: PowHasher + ?Sized>(
    header: &BlockHeader,
    height: Height,
    params: &ConsensusParams,
    hasher: &H,
) -> ProofOutcome {
    let mut hash = header.pow_hash(height, params, hasher);
    hash.reverse();
    evaluate_proof_of_work(&hash, height, header.bits, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Network;
    use std::cell::Cell;

    /// Stands in for the memory-hard hashes; records the algorithm asked for
    struct DoubleSha {
        last: Cell<Option<PowAlgorithm>>,
    }

    impl DoubleSha {
        fn new() -> Self {
            DoubleSha { last: Cell::new(None) }
        }
    }

    impl PowHasher for DoubleSha {
        fn pow_hash(&self, algorithm: PowAlgorithm, header: &[u8; HEADER_SIZE]) -> Hash {
            self.last.set(Some(algorithm));
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&Sha256::digest(Sha256::digest(header)));
            hash
        }
    }

    fn internal(display_hex: &str) -> Hash {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&hex::decode(display_hex).unwrap());
        hash.reverse();
        hash
    }

    fn genesis() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block_hash: [0u8; 32],
            merkle_root: internal(
                "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
            ),
            time: 1_231_006_505,
            bits: CompactTarget::new(0x1d00_ffff),
            nonce: 2_083_236_893,
        }
    }

    #[test]
    fn test_serialize_layout() {
        let header = genesis();
        let data = header.serialize();
        assert_eq!(data.len(), HEADER_SIZE);
        assert_eq!(&data[0..4], &[1, 0, 0, 0]);
        assert_eq!(&data[36..68], &header.merkle_root);
        assert_eq!(&data[72..76], &[0xff, 0xff, 0x00, 0x1d]);
    }

    #[test]
    fn test_block_hash_matches_known_header() {
        let hash = genesis().block_hash();
        assert_eq!(
            hash,
            internal("000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f")
        );
        assert_eq!(genesis().stake_entropy_bit(), 1);
    }

    #[test]
    fn test_algorithm_switches_at_hash_switch() {
        let params = ConsensusParams::new(Network::Main);
        let switch = params.hash_switch_height;
        assert_eq!(PowAlgorithm::for_height(switch - 1, &params), PowAlgorithm::Scrypt);
        assert_eq!(PowAlgorithm::for_height(switch, &params), PowAlgorithm::Lyra2Z);

        let hasher = DoubleSha::new();
        genesis().pow_hash(switch - 1, &params, &hasher);
        assert_eq!(hasher.last.get(), Some(PowAlgorithm::Scrypt));
        genesis().pow_hash(switch, &params, &hasher);
        assert_eq!(hasher.last.get(), Some(PowAlgorithm::Lyra2Z));
    }

    #[test]
    fn test_header_proof_checked_big_endian() {
        let params = ConsensusParams::new(Network::Main);
        let hasher = DoubleSha::new();
        let mut header = genesis();
        assert_eq!(
            check_header_proof_of_work(&header, 20_000, &params, &hasher),
            ProofOutcome::Accepted
        );

        header.nonce += 1;
        assert_eq!(
            check_header_proof_of_work(&header, 20_000, &params, &hasher),
            ProofOutcome::HashAboveTarget
        );
    }
}
