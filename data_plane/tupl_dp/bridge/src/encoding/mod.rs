//! # Slot Encoding
//!
//! Turns canonical text into unit-norm 32-dimensional slot vectors:
//! text -> raw embedding (`Embedder`) -> seeded per-slot projection -> L2 norm.
//! Intents and boundary anchors go through the same path so their vectors live
//! in the same per-slot subspaces.

pub mod canonical;
pub mod embedder;
pub mod encoder;
pub mod projection;

pub use embedder::{Embedder, EmbedderError, HashingEmbedder, HttpEmbedder};
pub use encoder::{EncoderConfig, LabelMatch, SlotEncoder};
pub use projection::{l2_norm, normalize, ProjectionSet, SlotProjection};
