//! Read-only view of the block index
//!
//! The retargeting code only ever walks backwards from a tip. It sees the
//! index through [`ChainView`], so the node can keep whatever storage it
//! likes; [`ChainIndex`] is the append-only arena used by tests and by
//! callers that do not have their own.

use crate::compact::CompactTarget;
use crate::error::{ConsensusError, Result};
use crate::types::{BlockId, BlockRecord, Height, Timestamp};

pub trait ChainView {
    fn record(&self, id: BlockId) -> Option<&BlockRecord>;

    fn parent(&self, record: &BlockRecord) -> Option<&BlockRecord> {
        record.parent.and_then(|id| self.record(id))
    }
}

/// Iterator over a record and its ancestors, newest first
pub struct Ancestors<'a, C: ChainView + ?Sized> {
    chain: &'a C,
    next: Option<&'a BlockRecord>,
}

impl<'a, C: ChainView + ?Sized> Iterator for Ancestors<'a, C> {
    type Item = &'a BlockRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.chain.parent(current);
        Some(current)
    }
}

/// Walk `record` and then each of its parents in turn
pub fn ancestors<'a, C: ChainView + ?Sized>(chain: &'a C, record: &'a BlockRecord) -> Ancestors<'a, C> {
    Ancestors {
        chain,
        next: Some(record),
    }
}

/// Append-only arena of block records addressed by [`BlockId`].
///
/// Reorganisation is modelled as [`ChainIndex::truncate`] followed by new
/// pushes; ids handed out before the truncation point stay valid.
#[derive(Debug, Clone, Default)]
pub struct ChainIndex {
    records: Vec<BlockRecord>,
}

impl ChainIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: BlockId) -> Option<&BlockRecord> {
        self.records.get(id.0)
    }

    /// Id of the most recently appended record
    pub fn last_id(&self) -> Option<BlockId> {
        self.records.len().checked_sub(1).map(BlockId)
    }

    /// Append a record. A record with a parent must sit exactly one height
    /// above it; a record without one starts a new root, at any height.
    pub fn push(&mut self, record: BlockRecord) -> Result<BlockId> {
        if let Some(parent_id) = record.parent {
            let parent = self.get(parent_id).ok_or(ConsensusError::UnknownParent {
                parent: parent_id,
                height: record.height,
            })?;
            if parent.height.checked_add(1) != Some(record.height) {
                return Err(ConsensusError::NonContiguousHeight {
                    height: record.height,
                    parent_height: parent.height,
                });
            }
        }
        let id = BlockId(self.records.len());
        self.records.push(record);
        Ok(id)
    }

    /// Append a root record
    pub fn push_root(
        &mut self,
        height: Height,
        time: Timestamp,
        bits: CompactTarget,
        proof_of_stake: bool,
    ) -> Result<BlockId> {
        self.push(BlockRecord {
            height,
            time,
            bits,
            proof_of_stake,
            parent: None,
        })
    }

    /// Append a child of `parent`
    pub fn push_child(
        &mut self,
        parent: BlockId,
        time: Timestamp,
        bits: CompactTarget,
        proof_of_stake: bool,
    ) -> Result<BlockId> {
        let height = self
            .get(parent)
            .ok_or(ConsensusError::UnknownBlock(parent))?
            .height
            .saturating_add(1);
        self.push(BlockRecord {
            height,
            time,
            bits,
            proof_of_stake,
            parent: Some(parent),
        })
    }

    /// Drop every record from `len` on
    pub fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }
}

impl ChainView for ChainIndex {
    fn record(&self, id: BlockId) -> Option<&BlockRecord> {
        self.get(id)
    }
}
