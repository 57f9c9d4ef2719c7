//! Intent-vs-boundary comparison.
//!
//! In-process calls go straight to `semantic_sandbox::compare_slots` over the
//! populated anchor rows. `build_envelope` packs the same inputs into the
//! fixed-layout FFI record for out-of-process comparators.

use semantic_sandbox::{DecisionParams, VectorEnvelope};

pub use semantic_sandbox::{ComparisonResult, DecisionMode};

use crate::boundary::BoundaryRules;
use crate::rule_vector::RuleVector;
use crate::types::{IntentVector, Slot};

/// Comparison parameters declared by a boundary.
pub fn decision_params(rules: &BoundaryRules) -> DecisionParams {
    DecisionParams {
        thresholds: rules.thresholds.as_array(),
        weights: rules.weights.as_array(),
        mode: rules.decision_mode.to_sandbox(),
        global_threshold: rules.global_threshold,
    }
}

/// Same thresholds, but every slot must meet its threshold. Used for deny
/// boundaries whatever their declared mode.
pub fn min_rule_params(rules: &BoundaryRules) -> DecisionParams {
    DecisionParams {
        mode: DecisionMode::Min,
        ..decision_params(rules)
    }
}

/// Compare an intent vector against a boundary's anchors.
pub fn compare_intent_vs_rule(
    intent: &IntentVector,
    rule_vector: &RuleVector,
    params: &DecisionParams,
) -> ComparisonResult {
    let anchors = Slot::ALL.map(|slot| rule_vector.anchors(slot));
    semantic_sandbox::compare_slots(intent, anchors, params)
}

/// Pack an intent, a boundary's anchors and its parameters into the FFI record.
/// `RuleVector` never holds more rows than an envelope block, so nothing is
/// dropped here; over-long anchor sets are truncated and reported upstream.
pub fn build_envelope(
    intent: &IntentVector,
    rule_vector: &RuleVector,
    params: &DecisionParams,
) -> Box<VectorEnvelope> {
    let mut envelope = Box::new(VectorEnvelope::zeroed());
    envelope.intent = *intent;

    for slot in Slot::ALL {
        let anchors = rule_vector.anchors(slot);
        let count = anchors.len();
        let (block, block_count) = match slot {
            Slot::Action => (&mut envelope.action_anchors, &mut envelope.action_anchor_count),
            Slot::Resource => (&mut envelope.resource_anchors, &mut envelope.resource_anchor_count),
            Slot::Data => (&mut envelope.data_anchors, &mut envelope.data_anchor_count),
            Slot::Risk => (&mut envelope.risk_anchors, &mut envelope.risk_anchor_count),
        };
        block[..count].copy_from_slice(&anchors[..count]);
        *block_count = count;
    }

    envelope.thresholds = params.thresholds;
    envelope.weights = params.weights;
    envelope.decision_mode = params.mode as u8;
    envelope.global_threshold = params.global_threshold;
    envelope
}
