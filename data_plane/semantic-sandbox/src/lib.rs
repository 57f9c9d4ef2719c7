// Semantic Sandbox - per-slot vector comparison with a flat FFI record
//
// The envelope layout is fixed: no pointers, no variable-length fields.
// Anchor groups carry an explicit count; counts above the cap are clamped here
// and must already have been truncated (and logged) by the producer.

mod compare;

pub use compare::{
    compare, compare_slots, cosine_similarity, max_anchor_similarity, DecisionMode,
    DecisionParams,
};

/// Width of one semantic slot vector.
pub const SLOT_WIDTH: usize = 32;
/// Slots in order: action, resource, data, risk.
pub const NUM_SLOTS: usize = 4;
/// Width of a full intent vector (four concatenated slot vectors).
pub const INTENT_WIDTH: usize = SLOT_WIDTH * NUM_SLOTS;
/// Maximum anchors carried per slot across the boundary.
pub const MAX_ANCHORS_PER_SLOT: usize = 16;

/// Fixed-size anchor storage for one slot.
pub type AnchorBlock = [[f32; SLOT_WIDTH]; MAX_ANCHORS_PER_SLOT];

/// FFI-compatible structure for passing intent and boundary vectors
/// along with comparison parameters
#[repr(C)]
#[derive(Clone)]
pub struct VectorEnvelope {
    // Four unit-norm slot vectors, concatenated (never re-normalized as a whole)
    pub intent: [f32; INTENT_WIDTH],

    // Boundary anchors (per-slot anchor arrays)
    pub action_anchors: AnchorBlock,
    pub action_anchor_count: usize,
    pub resource_anchors: AnchorBlock,
    pub resource_anchor_count: usize,
    pub data_anchors: AnchorBlock,
    pub data_anchor_count: usize,
    pub risk_anchors: AnchorBlock,
    pub risk_anchor_count: usize,

    // Decision parameters
    pub thresholds: [f32; NUM_SLOTS], // action, resource, data, risk
    pub weights: [f32; NUM_SLOTS],    // for weighted-avg mode
    pub decision_mode: u8,            // 0 = min, 1 = weighted-avg, 2 = unanimous
    pub global_threshold: f32,        // for weighted-avg mode
}

impl VectorEnvelope {
    /// All-zero envelope: every slot is a wildcard, min mode, zero thresholds.
    pub fn zeroed() -> Self {
        Self {
            intent: [0.0; INTENT_WIDTH],
            action_anchors: [[0.0; SLOT_WIDTH]; MAX_ANCHORS_PER_SLOT],
            action_anchor_count: 0,
            resource_anchors: [[0.0; SLOT_WIDTH]; MAX_ANCHORS_PER_SLOT],
            resource_anchor_count: 0,
            data_anchors: [[0.0; SLOT_WIDTH]; MAX_ANCHORS_PER_SLOT],
            data_anchor_count: 0,
            risk_anchors: [[0.0; SLOT_WIDTH]; MAX_ANCHORS_PER_SLOT],
            risk_anchor_count: 0,
            thresholds: [0.0; NUM_SLOTS],
            weights: [1.0; NUM_SLOTS],
            decision_mode: DecisionMode::Min as u8,
            global_threshold: 0.0,
        }
    }
}

/// FFI-compatible structure for returning comparison results
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonResult {
    pub decision: u8,                        // 0 = block, 1 = allow
    pub slice_similarities: [f32; NUM_SLOTS], // action, resource, data, risk
    pub slice_passed: [u8; NUM_SLOTS],       // 1 = slot met its threshold
}

impl ComparisonResult {
    pub fn passed(&self) -> bool {
        self.decision == 1
    }

    pub fn slot_passed(&self, idx: usize) -> bool {
        self.slice_passed.get(idx).copied() == Some(1)
    }
}

/// Main FFI entry point for comparing vectors
///
/// A null pointer yields a block decision with zero similarities.
///
/// # Safety
/// `envelope` must be null or point to a properly initialized `VectorEnvelope`.
#[no_mangle]
pub unsafe extern "C" fn compare_vectors(envelope: *const VectorEnvelope) -> ComparisonResult {
    match envelope.as_ref() {
        Some(envelope) => compare::compare(envelope),
        None => ComparisonResult {
            decision: 0,
            slice_similarities: [0.0; NUM_SLOTS],
            slice_passed: [0; NUM_SLOTS],
        },
    }
}

/// Health check function for testing FFI bridge
#[no_mangle]
pub extern "C" fn health_check() -> u8 {
    1 // Returns 1 if library loaded successfully
}

/// Get version information
#[no_mangle]
pub extern "C" fn get_version() -> u32 {
    2 // Envelope layout revision (2 = unanimous mode + per-slot pass flags)
}
