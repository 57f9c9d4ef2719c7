//! Canonical slot text.
//!
//! One template per slot, shared by intents and anchors. Sub-fields appear in
//! a fixed order joined by `" | "`; the result is trimmed and lowercased.

use std::fmt::Display;

use crate::api_types::{Action, ActorType, Authn, Intent, Volume};
use crate::types::NUM_SLOTS;

pub const FIELD_SEPARATOR: &str = " | ";

/// Label used for an intent that carries no sensitivity labels.
pub const NO_SENSITIVITY: &str = "none";

#[derive(Default)]
struct CanonicalText {
    parts: Vec<String>,
}

impl CanonicalText {
    fn field(mut self, key: &str, value: impl Display) -> Self {
        self.parts.push(format!("{} {}", key, value));
        self
    }

    fn optional(self, key: &str, value: Option<impl Display>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    fn finish(self) -> String {
        normalize(&self.parts.join(FIELD_SEPARATOR))
    }
}

pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

pub fn action_text(action: Action, actor_type: ActorType) -> String {
    CanonicalText::default()
        .field("action is", action.as_str())
        .field("actor_type equals", actor_type.as_str())
        .finish()
}

/// Absent sub-fields are left out of the text.
pub fn resource_text(
    resource_type: Option<&str>,
    name: Option<&str>,
    location: Option<&str>,
) -> String {
    CanonicalText::default()
        .optional("resource_type is", resource_type)
        .optional("resource_name is", name)
        .optional("resource_location is", location)
        .finish()
}

pub fn data_text(sensitivity: Option<&str>, pii: Option<bool>, volume: Option<Volume>) -> String {
    CanonicalText::default()
        .optional("sensitivity is", sensitivity)
        .optional("pii is", pii)
        .optional("volume is", volume.map(Volume::as_str))
        .finish()
}

pub fn risk_text(authn: Authn) -> String {
    CanonicalText::default()
        .field("authn is", authn.as_str())
        .finish()
}

/// Sorted, comma-joined labels, or `none`.
pub fn sensitivity_label(labels: &[String]) -> String {
    if labels.is_empty() {
        return NO_SENSITIVITY.to_string();
    }
    let mut sorted: Vec<String> = labels.iter().map(|l| normalize(l)).collect();
    sorted.sort();
    sorted.dedup();
    sorted.join(",")
}

/// Sub-fields a boundary's anchors carry in the open-vocabulary slots.
///
/// An unconstrained open sub-field is left out of the anchors, so the intent
/// must leave it out too: rendered under the same mask, an intent whose value
/// is a member of the allowed set produces exactly one anchor's text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SubfieldMask {
    pub resource_type: bool,
    pub resource_name: bool,
    pub resource_location: bool,
    pub sensitivity: bool,
}

impl SubfieldMask {
    /// Every sub-field present, the rendering used by `intent_texts`.
    pub const FULL: SubfieldMask = SubfieldMask {
        resource_type: true,
        resource_name: true,
        resource_location: true,
        sensitivity: true,
    };
}

/// Resource text of an intent restricted to the masked sub-fields.
pub fn masked_resource_text(intent: &Intent, mask: SubfieldMask) -> String {
    let resource = &intent.resource;
    resource_text(
        Some(resource.resource_type.as_str()).filter(|_| mask.resource_type),
        resource.name.as_deref().filter(|_| mask.resource_name),
        resource.location.as_deref().filter(|_| mask.resource_location),
    )
}

/// Data texts of an intent under a mask. With sensitivity masked in, there is
/// one text per distinct label (`none` when the intent has no labels), since
/// every anchor carries a single label.
pub fn masked_data_texts(intent: &Intent, mask: SubfieldMask) -> Vec<String> {
    let data = &intent.data;
    if !mask.sensitivity {
        return vec![data_text(None, Some(data.pii), Some(data.volume))];
    }

    let mut labels: Vec<String> = data.sensitivity.iter().map(|l| normalize(l)).collect();
    labels.sort();
    labels.dedup();
    if labels.is_empty() {
        labels.push(NO_SENSITIVITY.to_string());
    }
    labels
        .iter()
        .map(|label| data_text(Some(label), Some(data.pii), Some(data.volume)))
        .collect()
}

/// Canonical text of every slot of an intent, in slot order.
pub fn intent_texts(intent: &Intent) -> [String; NUM_SLOTS] {
    let sensitivity = sensitivity_label(&intent.data.sensitivity);
    [
        action_text(intent.action, intent.actor.actor_type),
        resource_text(
            Some(&intent.resource.resource_type),
            intent.resource.name.as_deref(),
            intent.resource.location.as_deref(),
        ),
        data_text(
            Some(&sensitivity),
            Some(intent.data.pii),
            Some(intent.data.volume),
        ),
        risk_text(intent.risk.authn),
    ]
}
