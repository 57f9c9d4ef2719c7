//! # Anchor Generation
//!
//! Expands a boundary's structural constraints into canonical anchor texts,
//! one set per slot, using the same templates as intent encoding.
//!
//! - Closed vocabularies (actions, actor types, pii, volume) that are left
//!   unconstrained range over their full domain.
//! - Open vocabularies (resource types, names, locations, sensitivity labels)
//!   cannot be enumerated, so an unconstrained one is left out of the text.
//!   `subfield_mask` reports which ones a boundary kept, and intents are
//!   rendered with the same mask before comparison.
//! - A slot with nothing constrained gets no anchors and acts as a wildcard.
//!
//! Every slot is sorted and de-duplicated before truncation, so the kept
//! anchors are the same on every run.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::api_types::{Action, ActorType, Volume};
use crate::boundary::Boundary;
use crate::encoding::canonical::{self, SubfieldMask};
use crate::types::{Slot, MAX_ANCHORS_PER_SLOT, NUM_SLOTS};

/// A slot whose anchor set exceeded the cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorTruncation {
    pub boundary_id: String,
    pub slot: Slot,
    pub original_count: usize,
    pub kept: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorTexts {
    pub slots: [Vec<String>; NUM_SLOTS],
    pub truncated: Vec<AnchorTruncation>,
}

impl AnchorTexts {
    pub fn slot(&self, slot: Slot) -> &[String] {
        &self.slots[slot.index()]
    }

    pub fn counts(&self) -> [usize; NUM_SLOTS] {
        std::array::from_fn(|i| self.slots[i].len())
    }
}

pub fn build_anchors(boundary: &Boundary) -> AnchorTexts {
    let raw = [
        action_anchors(boundary),
        resource_anchors(boundary),
        data_anchors(boundary),
        risk_anchors(boundary),
    ];

    let mut texts = AnchorTexts::default();
    for (slot, mut anchors) in Slot::ALL.into_iter().zip(raw) {
        anchors.sort();
        anchors.dedup();

        if anchors.len() > MAX_ANCHORS_PER_SLOT {
            warn!(
                "Boundary '{}': {} slot expands to {} anchors, keeping the first {}",
                boundary.id,
                slot,
                anchors.len(),
                MAX_ANCHORS_PER_SLOT
            );
            texts.truncated.push(AnchorTruncation {
                boundary_id: boundary.id.clone(),
                slot,
                original_count: anchors.len(),
                kept: MAX_ANCHORS_PER_SLOT,
            });
            anchors.truncate(MAX_ANCHORS_PER_SLOT);
        }

        texts.slots[slot.index()] = anchors;
    }
    texts
}

/// Open sub-fields that appear in this boundary's anchors.
pub fn subfield_mask(boundary: &Boundary) -> SubfieldMask {
    let resource = &boundary.constraints.resource;
    SubfieldMask {
        resource_type: !resource.types.is_empty(),
        resource_name: !resource.names.is_empty(),
        resource_location: !resource.locations.is_empty(),
        sensitivity: !boundary.constraints.data.sensitivity.is_empty(),
    }
}

fn action_anchors(boundary: &Boundary) -> Vec<String> {
    let constraint = &boundary.constraints.action;
    if constraint.actions.is_empty() && constraint.actor_types.is_empty() {
        return Vec::new();
    }

    let actions: &[Action] = if constraint.actions.is_empty() {
        &Action::ALL
    } else {
        &constraint.actions
    };
    let actor_types: &[ActorType] = if constraint.actor_types.is_empty() {
        &ActorType::ALL
    } else {
        &constraint.actor_types
    };

    actions
        .iter()
        .flat_map(|action| {
            actor_types
                .iter()
                .map(move |actor_type| canonical::action_text(*action, *actor_type))
        })
        .collect()
}

/// `None` in a dimension means "leave this sub-field out".
fn options(values: &[String]) -> Vec<Option<&str>> {
    if values.is_empty() {
        vec![None]
    } else {
        values.iter().map(|v| Some(v.as_str())).collect()
    }
}

fn resource_anchors(boundary: &Boundary) -> Vec<String> {
    let constraint = &boundary.constraints.resource;
    if constraint.types.is_empty() && constraint.names.is_empty() && constraint.locations.is_empty()
    {
        return Vec::new();
    }

    let mut anchors = Vec::new();
    for resource_type in options(&constraint.types) {
        for name in options(&constraint.names) {
            for location in options(&constraint.locations) {
                anchors.push(canonical::resource_text(resource_type, name, location));
            }
        }
    }
    anchors
}

fn data_anchors(boundary: &Boundary) -> Vec<String> {
    let constraint = &boundary.constraints.data;
    if constraint.sensitivity.is_empty() && constraint.pii.is_none() && constraint.volume.is_none()
    {
        return Vec::new();
    }

    let pii_values: Vec<bool> = match constraint.pii {
        Some(pii) => vec![pii],
        None => vec![false, true],
    };
    let volumes: Vec<Volume> = match constraint.volume {
        Some(volume) => vec![volume],
        None => Volume::ALL.to_vec(),
    };

    let mut anchors = Vec::new();
    for label in options(&constraint.sensitivity) {
        for pii in &pii_values {
            for volume in &volumes {
                anchors.push(canonical::data_text(label, Some(*pii), Some(*volume)));
            }
        }
    }
    anchors
}

fn risk_anchors(boundary: &Boundary) -> Vec<String> {
    boundary
        .constraints
        .risk
        .authn
        .map(|authn| vec![canonical::risk_text(authn)])
        .unwrap_or_default()
}
