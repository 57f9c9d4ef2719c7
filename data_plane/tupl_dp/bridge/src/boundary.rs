//! # Design Boundaries
//!
//! A boundary is authored as a loosely-typed JSON document and converted once,
//! at the store boundary, into the typed form the evaluation core works on.
//! Enum membership and numeric ranges are checked in that conversion;
//! `Boundary::validate` re-checks the invariants for boundaries built in code
//! or handed over from a cache.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::api_types::{Action, ActorType, Authn, Volume};
use crate::error::{EnforcementError, Result};
use crate::types::{Slot, NUM_SLOTS};

const DEFAULT_SLICE_WEIGHTS: [f32; NUM_SLOTS] = [0.25; NUM_SLOTS];

// ================================================================================================
// RULE VOCABULARIES
// ================================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
}

/// How per-slot similarities combine into pass/fail for one boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMode {
    #[default]
    Min,
    #[serde(alias = "weighted-avg", alias = "weighted_avg")]
    Weighted,
    Unanimous,
}

impl DecisionMode {
    pub fn to_sandbox(self) -> semantic_sandbox::DecisionMode {
        match self {
            DecisionMode::Min => semantic_sandbox::DecisionMode::Min,
            DecisionMode::Weighted => semantic_sandbox::DecisionMode::WeightedAvg,
            DecisionMode::Unanimous => semantic_sandbox::DecisionMode::Unanimous,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryType {
    #[default]
    Mandatory,
    Optional,
}

/// One value per slot, serialized as `{action, resource, data, risk}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotValues {
    pub action: f32,
    pub resource: f32,
    pub data: f32,
    pub risk: f32,
}

impl SlotValues {
    pub fn uniform(value: f32) -> Self {
        Self::from_array([value; NUM_SLOTS])
    }

    pub fn from_array(values: [f32; NUM_SLOTS]) -> Self {
        Self {
            action: values[0],
            resource: values[1],
            data: values[2],
            risk: values[3],
        }
    }

    pub fn as_array(&self) -> [f32; NUM_SLOTS] {
        [self.action, self.resource, self.data, self.risk]
    }

    pub fn get(&self, slot: Slot) -> f32 {
        self.as_array()[slot.index()]
    }
}

// ================================================================================================
// CONSTRAINTS
// ================================================================================================
//
// Empty lists and absent optionals are wildcards. Unknown keys are rejected so a
// misspelled constraint never turns into a wildcard.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionConstraint {
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub actor_types: Vec<ActorType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConstraint {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConstraint {
    #[serde(default)]
    pub sensitivity: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pii: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Volume>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskConstraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authn: Option<Authn>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundaryConstraints {
    #[serde(default)]
    pub action: ActionConstraint,
    #[serde(default)]
    pub resource: ResourceConstraint,
    #[serde(default)]
    pub data: DataConstraint,
    #[serde(default)]
    pub risk: RiskConstraint,
}

// ================================================================================================
// RULES
// ================================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryRules {
    pub effect: Effect,
    pub decision_mode: DecisionMode,
    #[serde(rename = "type")]
    pub boundary_type: BoundaryType,
    pub thresholds: SlotValues,
    pub weights: SlotValues,
    pub global_threshold: f32,
}

impl BoundaryRules {
    pub fn new(effect: Effect, thresholds: SlotValues) -> Self {
        Self {
            effect,
            decision_mode: DecisionMode::Min,
            boundary_type: BoundaryType::Mandatory,
            thresholds,
            weights: SlotValues::from_array(DEFAULT_SLICE_WEIGHTS),
            global_threshold: 0.0,
        }
    }

    pub fn with_mode(mut self, mode: DecisionMode) -> Self {
        self.decision_mode = mode;
        self
    }

    pub fn with_type(mut self, boundary_type: BoundaryType) -> Self {
        self.boundary_type = boundary_type;
        self
    }

    pub fn with_weights(mut self, weights: SlotValues) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_global_threshold(mut self, threshold: f32) -> Self {
        self.global_threshold = threshold;
        self
    }
}

// ================================================================================================
// BOUNDARY
// ================================================================================================

/// Authoring form of a boundary, exactly as stored or received.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub constraints: Value,
    #[serde(default)]
    pub rules: Value,
}

/// Validated boundary snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Boundary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub constraints: BoundaryConstraints,
    pub rules: BoundaryRules,
}

impl Boundary {
    pub fn new(id: impl Into<String>, name: impl Into<String>, rules: BoundaryRules) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tenant_id: None,
            constraints: BoundaryConstraints::default(),
            rules,
        }
    }

    pub fn with_actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.constraints.action.actions = actions.into_iter().collect();
        self
    }

    pub fn with_actor_types(mut self, actor_types: impl IntoIterator<Item = ActorType>) -> Self {
        self.constraints.action.actor_types = actor_types.into_iter().collect();
        self
    }

    pub fn with_resource_types<S: Into<String>>(mut self, types: impl IntoIterator<Item = S>) -> Self {
        self.constraints.resource.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_locations<S: Into<String>>(mut self, locations: impl IntoIterator<Item = S>) -> Self {
        self.constraints.resource.locations = locations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.constraints.resource.names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sensitivity<S: Into<String>>(mut self, labels: impl IntoIterator<Item = S>) -> Self {
        self.constraints.data.sensitivity = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pii(mut self, pii: bool) -> Self {
        self.constraints.data.pii = Some(pii);
        self
    }

    pub fn with_volume(mut self, volume: Volume) -> Self {
        self.constraints.data.volume = Some(volume);
        self
    }

    pub fn with_authn(mut self, authn: Authn) -> Self {
        self.constraints.risk.authn = Some(authn);
        self
    }

    pub fn for_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn is_deny(&self) -> bool {
        self.rules.effect == Effect::Deny
    }

    pub fn is_mandatory(&self) -> bool {
        self.rules.boundary_type == BoundaryType::Mandatory
    }

    /// Parse and validate an authoring JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: BoundaryDocument = serde_json::from_str(json)
            .map_err(|e| EnforcementError::invalid_boundary("<unparsed>", e.to_string()))?;
        Self::from_document(document)
    }

    /// Convert an authoring document into a validated boundary.
    pub fn from_document(document: BoundaryDocument) -> Result<Self> {
        let id = document.id.trim().to_string();
        if id.is_empty() {
            return Err(EnforcementError::invalid_boundary("", "boundary id must not be empty"));
        }

        let constraints = match document.constraints {
            Value::Null => BoundaryConstraints::default(),
            value => serde_json::from_value(value).map_err(|e| {
                EnforcementError::invalid_boundary(&id, format!("constraints: {}", e))
            })?,
        };

        let rules = match &document.rules {
            Value::Object(map) => parse_rules(&id, map)?,
            Value::Null => return Err(EnforcementError::invalid_boundary(&id, "missing rules")),
            _ => return Err(EnforcementError::invalid_boundary(&id, "rules must be an object")),
        };

        let boundary = Boundary {
            name: if document.name.is_empty() {
                id.clone()
            } else {
                document.name
            },
            id,
            tenant_id: document.tenant_id,
            constraints,
            rules,
        };

        boundary.validate()?;
        Ok(boundary)
    }

    /// Authoring form of this boundary.
    pub fn to_document(&self) -> BoundaryDocument {
        BoundaryDocument {
            id: self.id.clone(),
            name: self.name.clone(),
            tenant_id: self.tenant_id.clone(),
            status: None,
            constraints: serde_json::to_value(&self.constraints).unwrap_or(Value::Null),
            rules: serde_json::to_value(&self.rules).unwrap_or(Value::Null),
        }
    }

    /// Check every invariant the evaluation core relies on.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(EnforcementError::invalid_boundary(&self.id, reason));

        if self.id.trim().is_empty() {
            return fail("boundary id must not be empty".to_string());
        }

        for slot in Slot::ALL {
            let threshold = self.rules.thresholds.get(slot);
            if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
                return fail(format!("{} threshold {} outside [-1, 1]", slot, threshold));
            }
            let weight = self.rules.weights.get(slot);
            if !weight.is_finite() || weight < 0.0 {
                return fail(format!("{} weight {} must be finite and >= 0", slot, weight));
            }
        }

        let global = self.rules.global_threshold;
        if !global.is_finite() || !(-1.0..=1.0).contains(&global) {
            return fail(format!("global_threshold {} outside [-1, 1]", global));
        }

        if self.rules.decision_mode == DecisionMode::Weighted {
            let total: f32 = self.rules.weights.as_array().iter().sum();
            if total <= 0.0 {
                return fail("weighted decision mode requires a positive weight sum".to_string());
            }
        }

        let resource = &self.constraints.resource;
        let data = &self.constraints.data;
        let open_lists = [
            ("resource.types", &resource.types),
            ("resource.locations", &resource.locations),
            ("resource.names", &resource.names),
            ("data.sensitivity", &data.sensitivity),
        ];
        for (field, values) in open_lists {
            if values.iter().any(|v| v.trim().is_empty()) {
                return fail(format!("{} contains an empty value", field));
            }
        }

        Ok(())
    }

    /// Lowercase hex SHA-256 over the canonical JSON of this boundary.
    ///
    /// Any edit to constraints or rules changes the hash, which invalidates
    /// cached anchors.
    pub fn content_hash(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        hex::encode(hasher.finalize())
    }
}

// ================================================================================================
// RULE CONVERSION
// ================================================================================================

fn parse_rules(id: &str, map: &Map<String, Value>) -> Result<BoundaryRules> {
    let effect: Effect = match map.get("effect") {
        Some(value) => parse_enum(id, "effect", value)?,
        None => return Err(EnforcementError::invalid_boundary(id, "missing rules.effect")),
    };

    let decision_mode: DecisionMode = match map.get("decision_mode") {
        Some(Value::Null) | None => DecisionMode::default(),
        Some(value) => parse_enum(id, "decision_mode", value)?,
    };

    let boundary_type: BoundaryType = match map.get("type") {
        Some(Value::Null) | None => BoundaryType::default(),
        Some(value) => parse_enum(id, "type", value)?,
    };

    let thresholds = match map.get("thresholds") {
        Some(Value::Null) | None => {
            return Err(EnforcementError::invalid_boundary(id, "missing rules.thresholds"))
        }
        Some(value) => parse_slot_values(id, "thresholds", value)?,
    };

    let weights = match map.get("weights") {
        Some(Value::Null) | None => SlotValues::from_array(DEFAULT_SLICE_WEIGHTS),
        Some(value) => parse_slot_values(id, "weights", value)?,
    };

    let global_threshold = match map.get("global_threshold") {
        Some(Value::Null) | None if decision_mode == DecisionMode::Weighted => {
            return Err(EnforcementError::invalid_boundary(
                id,
                "weighted decision mode requires rules.global_threshold",
            ))
        }
        Some(Value::Null) | None => 0.0,
        Some(value) => parse_number(id, "global_threshold", value)?,
    };

    Ok(BoundaryRules {
        effect,
        decision_mode,
        boundary_type,
        thresholds,
        weights,
        global_threshold,
    })
}

fn parse_enum<T: serde::de::DeserializeOwned>(id: &str, field: &str, value: &Value) -> Result<T> {
    serde_json::from_value(value.clone())
        .map_err(|_| EnforcementError::invalid_boundary(id, format!("unknown rules.{} {}", field, value)))
}

fn parse_number(id: &str, field: &str, value: &Value) -> Result<f32> {
    value
        .as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| EnforcementError::invalid_boundary(id, format!("rules.{} must be a number", field)))
}

/// Accepts `{action, resource, data, risk}` or a 4-element array.
fn parse_slot_values(id: &str, field: &str, value: &Value) -> Result<SlotValues> {
    match value {
        Value::Object(map) => {
            let mut values = [0.0f32; NUM_SLOTS];
            for slot in Slot::ALL {
                let entry = map.get(slot.name()).ok_or_else(|| {
                    EnforcementError::invalid_boundary(id, format!("rules.{} missing {}", field, slot))
                })?;
                values[slot.index()] = parse_number(id, &format!("{}.{}", field, slot), entry)?;
            }
            Ok(SlotValues::from_array(values))
        }
        Value::Array(items) if items.len() == NUM_SLOTS => {
            let mut values = [0.0f32; NUM_SLOTS];
            for (i, item) in items.iter().enumerate() {
                values[i] = parse_number(id, &format!("{}[{}]", field, i), item)?;
            }
            Ok(SlotValues::from_array(values))
        }
        _ => Err(EnforcementError::invalid_boundary(
            id,
            format!("rules.{} must have exactly {} slot values", field, NUM_SLOTS),
        )),
    }
}
