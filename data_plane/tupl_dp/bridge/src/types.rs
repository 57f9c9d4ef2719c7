//! # Bridge Types Module
//!
//! Core type definitions shared by the encoder, comparator and aggregator.
//!
//! This module provides:
//! - Semantic slot identification
//! - Slot and intent vector aliases
//! - Final decision and evidence tags

use std::fmt;

use serde::{Deserialize, Serialize};

pub use semantic_sandbox::{INTENT_WIDTH, MAX_ANCHORS_PER_SLOT, NUM_SLOTS, SLOT_WIDTH};

/// One unit-norm (or exactly zero) slot vector.
pub type SlotVector = [f32; SLOT_WIDTH];

/// Four slot vectors concatenated in slot order. Each slice is unit-norm on
/// its own; the whole is never re-normalized.
pub type IntentVector = [f32; INTENT_WIDTH];

/// Overwrite one slot's slice of an intent vector.
pub fn set_slice(vector: &mut IntentVector, slot: Slot, slice: &SlotVector) {
    let start = slot.index() * SLOT_WIDTH;
    vector[start..start + SLOT_WIDTH].copy_from_slice(slice);
}

// ================================================================================================
// SLOTS
// ================================================================================================

/// The four semantic dimensions compared independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Action,
    Resource,
    Data,
    Risk,
}

impl Slot {
    pub const ALL: [Slot; NUM_SLOTS] = [Slot::Action, Slot::Resource, Slot::Data, Slot::Risk];

    /// Position of this slot in intent vectors and per-slot arrays.
    pub fn index(self) -> usize {
        match self {
            Slot::Action => 0,
            Slot::Resource => 1,
            Slot::Data => 2,
            Slot::Risk => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Slot::Action => "action",
            Slot::Resource => "resource",
            Slot::Data => "data",
            Slot::Risk => "risk",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ================================================================================================
// DECISIONS & EVIDENCE TAGS
// ================================================================================================

/// Final verdict for one intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Allow,
    Block,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => f.write_str("ALLOW"),
            Decision::Block => f.write_str("BLOCK"),
        }
    }
}

/// Role a boundary played in the final decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceTag {
    /// Deny boundary whose slots all met their thresholds.
    MatchedDeny,
    /// Deny boundary that was compared but did not match.
    UnmatchedDeny,
    /// Allow boundary that was compared and failed.
    FailedAllow,
    /// Allow boundary that was compared and passed.
    PassedAllow,
    /// Filtered out by the structural applicability check; never compared.
    NotApplicable,
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
