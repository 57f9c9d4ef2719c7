// Comparison logic for semantic slot vectors
//
// Per-slot cosine similarity, max-of-anchors containment, and the three
// decision modes shared by the FFI entry point and in-process callers.

use crate::{
    ComparisonResult, VectorEnvelope, INTENT_WIDTH, MAX_ANCHORS_PER_SLOT, NUM_SLOTS, SLOT_WIDTH,
};

/// Norms below this are treated as "no valid signal".
const NORM_EPSILON: f32 = 1e-8;

/// Decision mode for one boundary comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DecisionMode {
    /// Every slot similarity must meet its threshold
    Min = 0,
    /// Weighted average of slot similarities compared to the global threshold
    WeightedAvg = 1,
    /// Min, and additionally no slot may be an unconstrained wildcard
    Unanimous = 2,
}

impl DecisionMode {
    /// Decode the envelope tag. Unknown tags return `None`.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(DecisionMode::Min),
            1 => Some(DecisionMode::WeightedAvg),
            2 => Some(DecisionMode::Unanimous),
            _ => None,
        }
    }
}

/// Thresholds, weights and mode for one comparison
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionParams {
    pub thresholds: [f32; NUM_SLOTS],
    pub weights: [f32; NUM_SLOTS],
    pub mode: DecisionMode,
    pub global_threshold: f32,
}

/// Compute dot product of two slices
#[inline]
fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
fn norm(a: &[f32]) -> f32 {
    a.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Compute cosine similarity between two vectors
///
/// Returns exactly 0.0 when either side has (near) zero norm, and clamps to
/// [-1, 1] to absorb floating-point drift. Never NaN.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = norm(a);
    let norm_b = norm(b);

    if !(norm_a >= NORM_EPSILON) || !(norm_b >= NORM_EPSILON) {
        return 0.0;
    }

    let sim = dot_product(a, b) / (norm_a * norm_b);
    if sim.is_nan() {
        0.0
    } else {
        sim.clamp(-1.0, 1.0)
    }
}

/// Compute maximum cosine similarity between intent slice and anchor set
///
/// `anchors` holds only the populated anchors. An empty set is a wildcard.
#[inline]
pub fn max_anchor_similarity(intent_slice: &[f32], anchors: &[[f32; SLOT_WIDTH]]) -> f32 {
    if anchors.is_empty() {
        // No anchors = wildcard (always pass)
        return 1.0;
    }

    anchors
        .iter()
        .map(|anchor| cosine_similarity(intent_slice, anchor))
        .fold(-1.0f32, f32::max)
}

/// Compare a full intent vector against four anchor sets.
pub fn compare_slots(
    intent: &[f32; INTENT_WIDTH],
    anchors: [&[[f32; SLOT_WIDTH]]; NUM_SLOTS],
    params: &DecisionParams,
) -> ComparisonResult {
    let mut slice_similarities = [0.0f32; NUM_SLOTS];
    let mut slice_passed = [0u8; NUM_SLOTS];

    for (slot, slot_anchors) in anchors.iter().enumerate() {
        let intent_slice = &intent[slot * SLOT_WIDTH..(slot + 1) * SLOT_WIDTH];
        let sim = max_anchor_similarity(intent_slice, slot_anchors);
        slice_similarities[slot] = sim;

        let meets = sim >= params.thresholds[slot];
        let constrained = !slot_anchors.is_empty();
        let passed = match params.mode {
            DecisionMode::Unanimous => meets && constrained,
            _ => meets,
        };
        slice_passed[slot] = passed as u8;
    }

    let allowed = match params.mode {
        DecisionMode::Min | DecisionMode::Unanimous => slice_passed.iter().all(|p| *p == 1),
        DecisionMode::WeightedAvg => {
            let total_weight: f32 = params.weights.iter().sum();
            if total_weight > 0.0 {
                let weighted_sum: f32 = slice_similarities
                    .iter()
                    .zip(params.weights.iter())
                    .map(|(sim, weight)| sim * weight)
                    .sum();
                weighted_sum / total_weight >= params.global_threshold
            } else {
                false
            }
        }
    };

    ComparisonResult {
        decision: allowed as u8,
        slice_similarities,
        slice_passed,
    }
}

/// Compare the contents of an FFI envelope.
///
/// Counts above the cap are clamped; an unknown decision mode blocks.
pub fn compare(envelope: &VectorEnvelope) -> ComparisonResult {
    let clamp = |count: usize| count.min(MAX_ANCHORS_PER_SLOT);

    let anchors = [
        &envelope.action_anchors[..clamp(envelope.action_anchor_count)],
        &envelope.resource_anchors[..clamp(envelope.resource_anchor_count)],
        &envelope.data_anchors[..clamp(envelope.data_anchor_count)],
        &envelope.risk_anchors[..clamp(envelope.risk_anchor_count)],
    ];

    let mode = DecisionMode::from_tag(envelope.decision_mode);
    let params = DecisionParams {
        thresholds: envelope.thresholds,
        weights: envelope.weights,
        mode: mode.unwrap_or(DecisionMode::Min),
        global_threshold: envelope.global_threshold,
    };

    let mut result = compare_slots(&envelope.intent, anchors, &params);
    if mode.is_none() {
        result.decision = 0;
    }
    result
}
