//! # Boundary Bridge Library
//!
//! Semantic boundary enforcement for agent intents: canonical slot encoding,
//! anchor generation, structural applicability filtering, per-slot vector
//! comparison and allow/deny decision aggregation with full evidence.

// Core modules
pub mod anchor_cache;
pub mod anchors;
pub mod api_types;
pub mod applicability;
pub mod boundary;
pub mod boundary_store;
pub mod config;
pub mod encoding;
pub mod enforcement_engine;
pub mod error;
pub mod refresh;
pub mod rule_vector;
pub mod types;
pub mod vector_comparison;

// Re-export commonly used types
pub use api_types::{BoundaryEvidence, EvaluationOutcome, Intent};
pub use boundary::{Boundary, BoundaryDocument, BoundaryRules, Effect, SlotValues};
pub use boundary_store::{BoundaryStore, InMemoryBoundaryStore, SqliteBoundaryStore, StorageConfig};
pub use config::{EngineConfig, FailMode};
pub use encoding::{Embedder, EmbedderError, HashingEmbedder, HttpEmbedder, SlotEncoder};
pub use enforcement_engine::EnforcementEngine;
pub use error::{EnforcementError, Result, Upstream};
pub use rule_vector::RuleVector;
pub use types::{Decision, EvidenceTag, Slot};
