//! Consensus parameters
//!
//! One immutable table per network. It is threaded explicitly through every
//! retarget and validation call; nothing in this crate caches or mutates it.
//! Activation heights and the plateau constant are consensus-critical: once a
//! block has been mined under a value, changing it forks the chain.

use anyhow::Context;
use log::debug;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::compact::CompactTarget;
use crate::error::{ConsensusError, Result};
use crate::types::Height;

/// Target held for the whole DarkGravityWave v2 transition window on mainnet
pub const MAINNET_DGW_V2_PLATEAU_BITS: CompactTarget = CompactTarget::new(0x1c08_b5b1);

/// Window of the first-generation DarkGravityWave
pub const DGW_V1_WINDOW: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Main,
    Test,
    Regtest,
}

/// Parameters that influence retargeting and proof acceptance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    pub network: Network,
    /// Easiest target allowed below the hash switch (scrypt era)
    #[serde(with = "hex_u256")]
    pub pow_limit_legacy: U256,
    /// Easiest target allowed from the hash switch on
    #[serde(with = "hex_u256")]
    pub pow_limit: U256,
    /// Timespan of one legacy retarget epoch, seconds
    pub pow_target_timespan: i64,
    /// Expected block spacing below the hash switch, seconds
    pub pow_target_spacing_legacy: i64,
    /// Expected block spacing from the hash switch on, seconds
    pub pow_target_spacing: i64,
    /// First height hashed with Lyra2Z instead of scrypt
    pub hash_switch_height: Height,
    /// First height of the DarkGravityWave v2 era
    pub new_algorithm_height: Height,
    /// Length of the pow-limit plateau after the hash switch
    pub pow_averaging_window_v1: i64,
    /// Length of the fixed plateau after the v2 switch, and the v2 DGW window
    pub pow_averaging_window_v2: i64,
    pub dgw_v1_window: i64,
    pub dgw_v2_plateau_bits: CompactTarget,
    /// Floor value blocks were mined at before any retargeting happened.
    /// Proof-of-work ancestor searches skip blocks carrying it.
    pub initial_pow_floor_bits: CompactTarget,
    pub pos_activation_height: Height,
    /// Blocks after activation before stake retargeting may be requested
    pub pos_grace_period: Height,
    pub pos_target_spacing: i64,
    pub pos_target_timespan: i64,
    #[serde(with = "hex_u256")]
    pub initial_pos_target: U256,
    pub pow_allow_min_difficulty_blocks: bool,
    pub pow_no_retargeting: bool,
}

impl ConsensusParams {
    /// Creates the parameter set for the given network.
    pub fn new(network: Network) -> Self {
        match network {
            Network::Main => ConsensusParams {
                network,
                pow_limit_legacy: U256::MAX >> 20u32,
                pow_limit: U256::MAX >> 12u32,
                pow_target_timespan: 302_400, // 3.5 days
                pow_target_spacing_legacy: 150,
                pow_target_spacing: 300,
                hash_switch_height: 10_000,
                new_algorithm_height: 55_000,
                pow_averaging_window_v1: 24,
                pow_averaging_window_v2: 60,
                dgw_v1_window: DGW_V1_WINDOW,
                dgw_v2_plateau_bits: MAINNET_DGW_V2_PLATEAU_BITS,
                initial_pow_floor_bits: CompactTarget::new(0x1e0f_ffff),
                pos_activation_height: 100_000,
                pos_grace_period: 500,
                pos_target_spacing: 120,
                pos_target_timespan: 24 * 60 * 60,
                initial_pos_target: U256::MAX >> 24u32,
                pow_allow_min_difficulty_blocks: false,
                pow_no_retargeting: false,
            },
            Network::Test => ConsensusParams {
                network,
                pow_limit_legacy: U256::MAX >> 20u32,
                pow_limit: U256::MAX >> 12u32,
                pow_target_timespan: 302_400,
                pow_target_spacing_legacy: 150,
                pow_target_spacing: 300,
                hash_switch_height: 100,
                new_algorithm_height: 1_000,
                pow_averaging_window_v1: 24,
                pow_averaging_window_v2: 60,
                dgw_v1_window: DGW_V1_WINDOW,
                dgw_v2_plateau_bits: CompactTarget::new(0x1e0f_ffff),
                initial_pow_floor_bits: CompactTarget::new(0x1e0f_ffff),
                pos_activation_height: 2_000,
                pos_grace_period: 100,
                pos_target_spacing: 120,
                pos_target_timespan: 24 * 60 * 60,
                initial_pos_target: U256::MAX >> 24u32,
                pow_allow_min_difficulty_blocks: true,
                pow_no_retargeting: false,
            },
            Network::Regtest => ConsensusParams {
                network,
                pow_limit_legacy: U256::MAX >> 1u32,
                pow_limit: U256::MAX >> 1u32,
                pow_target_timespan: 302_400,
                pow_target_spacing_legacy: 150,
                pow_target_spacing: 300,
                hash_switch_height: 0,
                new_algorithm_height: 0,
                pow_averaging_window_v1: 0,
                pow_averaging_window_v2: 60,
                dgw_v1_window: DGW_V1_WINDOW,
                dgw_v2_plateau_bits: CompactTarget::new(0x207f_ffff),
                initial_pow_floor_bits: CompactTarget::new(0x207f_ffff),
                pos_activation_height: 200,
                pos_grace_period: 10,
                pos_target_spacing: 120,
                pos_target_timespan: 24 * 60 * 60,
                initial_pos_target: U256::MAX >> 1u32,
                pow_allow_min_difficulty_blocks: true,
                pow_no_retargeting: true,
            },
        }
    }

    /// Parse and validate a parameter table from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: ConsensusParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Expected proof-of-work block spacing for blocks built on `height`
    pub fn pow_target_spacing_at(&self, height: Height) -> i64 {
        if height < self.hash_switch_height {
            self.pow_target_spacing_legacy
        } else {
            self.pow_target_spacing
        }
    }

    /// Number of blocks in a legacy retarget epoch at `height`; 0 when the
    /// spacing is zero
    pub fn epoch_length(&self, height: Height) -> i64 {
        self.pow_target_timespan
            .checked_div(self.pow_target_spacing_at(height))
            .unwrap_or(0)
    }

    /// An empty epoch has no boundaries
    pub fn is_epoch_boundary(&self, height: Height) -> bool {
        i64::from(height).checked_rem(self.epoch_length(height)) == Some(0)
    }

    /// Number of stake blocks the stake retarget damps over; 0 when the
    /// spacing is zero
    pub fn pos_adjustment_interval(&self) -> i64 {
        self.pos_target_timespan
            .checked_div(self.pos_target_spacing)
            .unwrap_or(0)
    }

    /// Easiest target a block at `height` may claim
    pub fn pow_limit_for_height(&self, height: Height) -> U256 {
        if height < self.hash_switch_height {
            self.pow_limit_legacy
        } else {
            self.pow_limit
        }
    }

    pub fn pow_limit_bits(&self) -> CompactTarget {
        CompactTarget::from_target(&self.pow_limit)
    }

    pub fn pow_limit_legacy_bits(&self) -> CompactTarget {
        CompactTarget::from_target(&self.pow_limit_legacy)
    }

    pub fn initial_pos_bits(&self) -> CompactTarget {
        CompactTarget::from_target(&self.initial_pos_target)
    }

    /// Check the invariants every retarget path relies on
    pub fn validate(&self) -> Result<()> {
        if self.pow_limit_legacy.is_zero() || self.pow_limit.is_zero() {
            return Err(ConsensusError::InvalidParams(
                "proof-of-work limits must be non-zero".to_string(),
            ));
        }
        if self.pow_target_spacing_legacy <= 0
            || self.pow_target_spacing <= 0
            || self.pos_target_spacing <= 0
        {
            return Err(ConsensusError::InvalidParams(
                "target spacings must be positive".to_string(),
            ));
        }
        if self.pow_target_timespan < self.pow_target_spacing_legacy
            || self.pow_target_timespan < self.pow_target_spacing
        {
            return Err(ConsensusError::InvalidParams(format!(
                "pow target timespan {} shorter than one block",
                self.pow_target_timespan
            )));
        }
        if self.pos_adjustment_interval() < 1 {
            return Err(ConsensusError::InvalidParams(format!(
                "pos target timespan {} shorter than one block",
                self.pos_target_timespan
            )));
        }
        if self.pow_averaging_window_v1 < 0 {
            return Err(ConsensusError::InvalidParams(
                "averaging window v1 must not be negative".to_string(),
            ));
        }
        if self.pow_averaging_window_v2 <= 0 || self.dgw_v1_window <= 0 {
            return Err(ConsensusError::InvalidParams(
                "DarkGravityWave windows must be positive".to_string(),
            ));
        }
        let plateau_end = i64::from(self.hash_switch_height) + self.pow_averaging_window_v1;
        if i64::from(self.new_algorithm_height) < plateau_end {
            return Err(ConsensusError::InvalidParams(format!(
                "new algorithm height {} inside the hash switch plateau ending at {}",
                self.new_algorithm_height, plateau_end
            )));
        }
        let plateau = self.dgw_v2_plateau_bits.decode();
        if plateau.negative || plateau.overflow || plateau.target.is_zero() {
            return Err(ConsensusError::InvalidParams(format!(
                "plateau target {} does not decode to a usable target",
                self.dgw_v2_plateau_bits
            )));
        }
        Ok(())
    }
}

/// Load a parameter table from a JSON file
pub fn load_params(path: impl AsRef<Path>) -> anyhow::Result<ConsensusParams> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading consensus parameters from {}", path.display()))?;
    let params = ConsensusParams::from_json_str(&json)
        .with_context(|| format!("parsing consensus parameters from {}", path.display()))?;
    debug!(
        "loaded {:?} consensus parameters from {}",
        params.network,
        path.display()
    );
    Ok(params)
}

/// Serialize 256-bit limits as 64 big-endian hex digits
mod hex_u256 {
    use primitive_types::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<U256, D::Error> {
        let text = String::deserialize(deserializer)?;
        let digits = text.strip_prefix("0x").unwrap_or(&text);
        let bytes = hex::decode(digits).map_err(D::Error::custom)?;
        if bytes.len() > 32 {
            return Err(D::Error::custom(format!(
                "256-bit value has {} bytes",
                bytes.len()
            )));
        }
        Ok(U256::from_big_endian(&bytes))
    }
}
