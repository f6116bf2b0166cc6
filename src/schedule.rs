//! Height-banded selection of the proof-of-work retarget algorithm
//!
//! Each band starts at an activation height and runs until the next band's.
//! Bands are never removed: blocks mined under a retired algorithm must keep
//! validating under it forever.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::compact::CompactTarget;
use crate::error::{ConsensusError, Result};
use crate::params::ConsensusParams;
use crate::walker::AncestorPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetargetAlgorithm {
    /// Fixed-epoch retarget of the scrypt era
    LegacyEpoch,
    /// Hold the proof-of-work limit
    PowLimitPlateau,
    /// Moving-average retarget over `window` proof-of-work ancestors
    DarkGravityWave { window: i64, policy: AncestorPolicy },
    /// Hold a fixed target
    FixedPlateau(CompactTarget),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetargetBand {
    /// First next-block height the algorithm applies to
    pub activation_height: i64,
    pub algorithm: RetargetAlgorithm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetargetSchedule {
    bands: Vec<RetargetBand>,
}

impl RetargetSchedule {
    /// Build a schedule from bands ordered by activation height.
    ///
    /// Equal activation heights are allowed and leave the earlier band empty.
    pub fn new(bands: Vec<RetargetBand>) -> Result<Self> {
        let first = bands
            .first()
            .ok_or_else(|| ConsensusError::InvalidSchedule("no bands".to_string()))?;
        if first.activation_height != 0 {
            return Err(ConsensusError::InvalidSchedule(format!(
                "first band activates at {} instead of 0",
                first.activation_height
            )));
        }
        for pair in bands.windows(2) {
            if pair[1].activation_height < pair[0].activation_height {
                return Err(ConsensusError::InvalidSchedule(format!(
                    "band at {} follows band at {}",
                    pair[1].activation_height, pair[0].activation_height
                )));
            }
        }
        for band in &bands {
            if let RetargetAlgorithm::DarkGravityWave { window, .. } = band.algorithm {
                if window <= 0 {
                    return Err(ConsensusError::InvalidSchedule(format!(
                        "DarkGravityWave band at {} has window {}",
                        band.activation_height, window
                    )));
                }
            }
        }
        Ok(RetargetSchedule { bands })
    }

    /// The network's five historical bands. Fails on a parameter table
    /// that does not validate.
    pub fn from_params(params: &ConsensusParams) -> Result<Self> {
        params.validate()?;
        let hash_switch = i64::from(params.hash_switch_height);
        let new_algorithm = i64::from(params.new_algorithm_height);
        Self::new(vec![
            RetargetBand {
                activation_height: 0,
                algorithm: RetargetAlgorithm::LegacyEpoch,
            },
            RetargetBand {
                activation_height: hash_switch,
                algorithm: RetargetAlgorithm::PowLimitPlateau,
            },
            RetargetBand {
                activation_height: hash_switch + params.pow_averaging_window_v1,
                algorithm: RetargetAlgorithm::DarkGravityWave {
                    window: params.dgw_v1_window,
                    policy: AncestorPolicy::Parent,
                },
            },
            RetargetBand {
                activation_height: new_algorithm,
                algorithm: RetargetAlgorithm::FixedPlateau(params.dgw_v2_plateau_bits),
            },
            RetargetBand {
                activation_height: new_algorithm + params.pow_averaging_window_v2,
                algorithm: RetargetAlgorithm::DarkGravityWave {
                    window: params.pow_averaging_window_v2,
                    policy: AncestorPolicy::SkipStakeAndFiller,
                },
            },
        ])
    }

    pub fn bands(&self) -> &[RetargetBand] {
        &self.bands
    }

    /// Algorithm for the block at `next_height`
    pub fn select(&self, next_height: i64) -> RetargetAlgorithm {
        let idx = self
            .bands
            .partition_point(|band| band.activation_height <= next_height);
        let algorithm = self.bands[idx.saturating_sub(1)].algorithm;
        debug!("height {} retargets with {:?}", next_height, algorithm);
        algorithm
    }
}
