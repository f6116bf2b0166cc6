//! Error types for retargeting and proof validation
//!
//! None of these variants is a consensus verdict. A candidate failing its
//! proof-of-work check is reported through [`crate::types::ProofOutcome`];
//! the errors below mean the caller or the parameter table is broken.

use thiserror::Error;

use crate::types::{BlockId, Height};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("Block {0} is not present in the chain index")]
    UnknownBlock(BlockId),

    #[error("Parent {parent} of block at height {height} is not present in the chain index")]
    UnknownParent { parent: BlockId, height: Height },

    #[error("Block height {height} does not extend parent height {parent_height}")]
    NonContiguousHeight { height: Height, parent_height: Height },

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Invalid consensus parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid retarget schedule: {0}")]
    InvalidSchedule(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ConsensusError {
    fn from(err: serde_json::Error) -> Self {
        ConsensusError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
