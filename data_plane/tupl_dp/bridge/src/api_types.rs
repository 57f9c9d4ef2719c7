//! # API-Facing Data Contracts
//!
//! Rust representations of the data exchanged with callers: the Intent
//! (v1.3 schema) going in, per-boundary evidence and the evaluation outcome
//! coming out. Closed vocabularies are enums so unknown values are rejected
//! when the intent is parsed, not during evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::anchors::AnchorTruncation;
use crate::boundary::{Boundary, Effect};
use crate::error::{EnforcementError, Result};
use crate::types::{Decision, EvidenceTag, NUM_SLOTS};

// ================================================================================================
// VOCABULARIES
// ================================================================================================

/// Operation the actor wants to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Write,
    Delete,
    Export,
    Execute,
    Update,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Read,
        Action::Write,
        Action::Delete,
        Action::Export,
        Action::Execute,
        Action::Update,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Delete => "delete",
            Action::Export => "export",
            Action::Execute => "execute",
            Action::Update => "update",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of principal initiating the intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    User,
    Service,
    Llm,
    Agent,
}

impl ActorType {
    pub const ALL: [ActorType; 4] = [
        ActorType::User,
        ActorType::Service,
        ActorType::Llm,
        ActorType::Agent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActorType::User => "user",
            ActorType::Service => "service",
            ActorType::Llm => "llm",
            ActorType::Agent => "agent",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volume {
    #[default]
    Single,
    Bulk,
}

impl Volume {
    pub const ALL: [Volume; 2] = [Volume::Single, Volume::Bulk];

    pub fn as_str(self) -> &'static str {
        match self {
            Volume::Single => "single",
            Volume::Bulk => "bulk",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authn {
    Required,
    NotRequired,
}

impl Authn {
    pub fn as_str(self) -> &'static str {
        match self {
            Authn::Required => "required",
            Authn::NotRequired => "not_required",
        }
    }
}

// ================================================================================================
// INTENT
// ================================================================================================

/// Actor initiating the intent (user/service/llm/agent).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Actor {
    pub id: String,
    #[serde(rename = "type")]
    pub actor_type: ActorType,
}

/// Resource descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Data descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Data {
    #[serde(default)]
    pub sensitivity: Vec<String>,
    #[serde(default)]
    pub pii: bool,
    #[serde(default)]
    pub volume: Volume,
}

/// Risk context descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Risk {
    pub authn: Authn,
}

/// A single proposed action (IntentEvent v1.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Intent {
    pub id: String,
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    #[serde(rename = "tenantId", default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub timestamp: f64,
    pub actor: Actor,
    pub action: Action,
    pub resource: Resource,
    #[serde(default)]
    pub data: Data,
    pub risk: Risk,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl Intent {
    /// Parse an intent document, rejecting unknown vocabulary values.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EnforcementError::InvalidIntent(e.to_string()))
    }
}

// ================================================================================================
// EVIDENCE & OUTCOME
// ================================================================================================

/// Per-boundary audit record for one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoundaryEvidence {
    pub boundary_id: String,
    pub boundary_name: String,
    pub effect: Effect,
    /// [action, resource, data, risk]; zeros when the boundary was not compared.
    pub similarities: [f32; NUM_SLOTS],
    pub thresholds: [f32; NUM_SLOTS],
    /// The boundary's comparison succeeded (a deny matched, an allow passed).
    pub passed: bool,
    pub tag: EvidenceTag,
}

impl BoundaryEvidence {
    pub fn compared(
        boundary: &Boundary,
        similarities: [f32; NUM_SLOTS],
        passed: bool,
        tag: EvidenceTag,
    ) -> Self {
        Self {
            boundary_id: boundary.id.clone(),
            boundary_name: boundary.name.clone(),
            effect: boundary.rules.effect,
            similarities,
            thresholds: boundary.rules.thresholds.as_array(),
            passed,
            tag,
        }
    }

    pub fn not_applicable(boundary: &Boundary) -> Self {
        Self::compared(boundary, [0.0; NUM_SLOTS], false, EvidenceTag::NotApplicable)
    }
}

/// Complete answer for one evaluation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationOutcome {
    pub evaluation_id: String,
    pub decision: Decision,
    pub evidence: Vec<BoundaryEvidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_deny_boundary_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_allow_boundary_id: Option<String>,
    /// Boundaries actually run through the comparator.
    pub boundaries_evaluated: usize,
    /// No applicable allow boundary: the configured default decided.
    pub default_applied: bool,
    /// Set when an upstream failure was mapped to a decision by the fail mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub truncations: Vec<AnchorTruncation>,
    pub duration_us: u64,
}

impl EvaluationOutcome {
    pub fn is_allowed(&self) -> bool {
        self.decision.is_allowed()
    }

    pub fn evidence_for(&self, boundary_id: &str) -> Option<&BoundaryEvidence> {
        self.evidence.iter().find(|e| e.boundary_id == boundary_id)
    }
}
