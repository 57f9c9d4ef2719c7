//! Fixed-layout anchor storage for one boundary.
//!
//! Each slot holds up to `MAX_ANCHORS_PER_SLOT` unit-norm anchor vectors plus
//! an explicit count; a count of zero is the wildcard. Only the first `count`
//! rows of a block are meaningful.

use log::warn;
use semantic_sandbox::AnchorBlock;

use crate::types::{Slot, SlotVector, MAX_ANCHORS_PER_SLOT, SLOT_WIDTH};

#[derive(Clone, Debug, PartialEq)]
pub struct RuleVector {
    pub action_anchors: AnchorBlock,
    pub action_count: usize,
    pub resource_anchors: AnchorBlock,
    pub resource_count: usize,
    pub data_anchors: AnchorBlock,
    pub data_count: usize,
    pub risk_anchors: AnchorBlock,
    pub risk_count: usize,
}

impl Default for RuleVector {
    fn default() -> Self {
        Self::empty()
    }
}

impl RuleVector {
    /// All four slots wildcard.
    pub fn empty() -> Self {
        Self {
            action_anchors: [[0.0; SLOT_WIDTH]; MAX_ANCHORS_PER_SLOT],
            action_count: 0,
            resource_anchors: [[0.0; SLOT_WIDTH]; MAX_ANCHORS_PER_SLOT],
            resource_count: 0,
            data_anchors: [[0.0; SLOT_WIDTH]; MAX_ANCHORS_PER_SLOT],
            data_count: 0,
            risk_anchors: [[0.0; SLOT_WIDTH]; MAX_ANCHORS_PER_SLOT],
            risk_count: 0,
        }
    }

    fn block(&self, slot: Slot) -> (&AnchorBlock, usize) {
        match slot {
            Slot::Action => (&self.action_anchors, self.action_count),
            Slot::Resource => (&self.resource_anchors, self.resource_count),
            Slot::Data => (&self.data_anchors, self.data_count),
            Slot::Risk => (&self.risk_anchors, self.risk_count),
        }
    }

    fn block_mut(&mut self, slot: Slot) -> (&mut AnchorBlock, &mut usize) {
        match slot {
            Slot::Action => (&mut self.action_anchors, &mut self.action_count),
            Slot::Resource => (&mut self.resource_anchors, &mut self.resource_count),
            Slot::Data => (&mut self.data_anchors, &mut self.data_count),
            Slot::Risk => (&mut self.risk_anchors, &mut self.risk_count),
        }
    }

    /// Populated anchors of a slot (empty for a wildcard).
    pub fn anchors(&self, slot: Slot) -> &[SlotVector] {
        let (block, count) = self.block(slot);
        &block[..count.min(MAX_ANCHORS_PER_SLOT)]
    }

    pub fn count(&self, slot: Slot) -> usize {
        self.block(slot).1.min(MAX_ANCHORS_PER_SLOT)
    }

    pub fn anchor_counts(&self) -> [usize; 4] {
        Slot::ALL.map(|slot| self.count(slot))
    }

    pub fn is_wildcard(&self, slot: Slot) -> bool {
        self.count(slot) == 0
    }

    /// Replace a slot's anchors. Anything past the cap is dropped with a warning.
    pub fn set_slot(&mut self, slot: Slot, vectors: &[SlotVector]) {
        if vectors.len() > MAX_ANCHORS_PER_SLOT {
            warn!(
                "{} anchor set has {} vectors, keeping the first {}",
                slot,
                vectors.len(),
                MAX_ANCHORS_PER_SLOT
            );
        }

        let kept = vectors.len().min(MAX_ANCHORS_PER_SLOT);
        let (block, count) = self.block_mut(slot);
        *block = [[0.0; SLOT_WIDTH]; MAX_ANCHORS_PER_SLOT];
        block[..kept].copy_from_slice(&vectors[..kept]);
        *count = kept;
    }
}
