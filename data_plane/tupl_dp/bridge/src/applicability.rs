//! Structural pre-filter deciding whether a boundary governs an intent at all.
//!
//! Exact equality and membership over intent fields only; nothing here is
//! semantic. A boundary that fails the filter is never encoded or compared.

use std::fmt;

use crate::api_types::Intent;
use crate::boundary::Boundary;

/// First constraint the intent did not satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotApplicable {
    Action,
    ActorType,
    ResourceType,
    ResourceLocation,
    Pii,
    Volume,
}

impl NotApplicable {
    pub fn field(self) -> &'static str {
        match self {
            NotApplicable::Action => "action",
            NotApplicable::ActorType => "actor.type",
            NotApplicable::ResourceType => "resource.type",
            NotApplicable::ResourceLocation => "resource.location",
            NotApplicable::Pii => "data.pii",
            NotApplicable::Volume => "data.volume",
        }
    }
}

impl fmt::Display for NotApplicable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} outside boundary scope", self.field())
    }
}

/// Check the boundary's structural constraints against the intent in a fixed
/// order, reporting the first mismatch.
pub fn check_applicability(intent: &Intent, boundary: &Boundary) -> Result<(), NotApplicable> {
    let constraints = &boundary.constraints;

    let actions = &constraints.action.actions;
    if !actions.is_empty() && !actions.contains(&intent.action) {
        return Err(NotApplicable::Action);
    }

    let actor_types = &constraints.action.actor_types;
    if !actor_types.is_empty() && !actor_types.contains(&intent.actor.actor_type) {
        return Err(NotApplicable::ActorType);
    }

    let types = &constraints.resource.types;
    if !types.is_empty() && !types.iter().any(|t| *t == intent.resource.resource_type) {
        return Err(NotApplicable::ResourceType);
    }

    let locations = &constraints.resource.locations;
    if !locations.is_empty() {
        // An intent without a location cannot satisfy a location constraint.
        match intent.resource.location.as_deref() {
            Some(location) if locations.iter().any(|l| l == location) => {}
            _ => return Err(NotApplicable::ResourceLocation),
        }
    }

    if let Some(pii) = constraints.data.pii {
        if pii != intent.data.pii {
            return Err(NotApplicable::Pii);
        }
    }

    if let Some(volume) = constraints.data.volume {
        if volume != intent.data.volume {
            return Err(NotApplicable::Volume);
        }
    }

    Ok(())
}

pub fn is_applicable(intent: &Intent, boundary: &Boundary) -> bool {
    check_applicability(intent, boundary).is_ok()
}
