//! Slot encoder: canonical text to unit-norm slot vectors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use log::{debug, info};
use parking_lot::RwLock;
use semantic_sandbox::max_anchor_similarity;

use super::canonical::{self, SubfieldMask};
use super::embedder::{Embedder, EmbedderError};
use super::projection::{normalize, ProjectionSet};
use crate::anchors::AnchorTexts;
use crate::api_types::{Action, ActorType, Intent};
use crate::error::{EnforcementError, Result, Upstream};
use crate::rule_vector::RuleVector;
use crate::types::{set_slice, IntentVector, Slot, SlotVector, INTENT_WIDTH, NUM_SLOTS, SLOT_WIDTH};

#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Base seed of the per-slot projections (slot `i` uses `seed + i`).
    pub projection_seed: u64,
    /// Embedder timeout until `warmup()` has succeeded.
    pub cold_timeout: Duration,
    /// Embedder timeout once warm.
    pub warm_timeout: Duration,
    /// Memoized vectors per slot; the slot's map is cleared when full.
    pub cache_capacity: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            projection_seed: 42,
            cold_timeout: Duration::from_secs(30),
            warm_timeout: Duration::from_millis(1_500),
            cache_capacity: 10_000,
        }
    }
}

/// How an intent with several sensitivity labels is scored against a data
/// slot: allow boundaries must cover every label, deny boundaries match on
/// any one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMatch {
    Every,
    Any,
}

pub struct SlotEncoder {
    embedder: Arc<dyn Embedder>,
    config: EncoderConfig,
    projections: OnceLock<ProjectionSet>,
    memo: [RwLock<HashMap<String, SlotVector>>; NUM_SLOTS],
    warmed: AtomicBool,
}

impl SlotEncoder {
    pub fn new(embedder: Arc<dyn Embedder>, config: EncoderConfig) -> Self {
        Self {
            embedder,
            config,
            projections: OnceLock::new(),
            memo: std::array::from_fn(|_| RwLock::new(HashMap::new())),
            warmed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    /// Build the projections and run one sample embedding under the cold
    /// timeout. Until this succeeds the encoder is not ready.
    pub async fn warmup(&self) -> Result<()> {
        let started = Instant::now();
        self.projections();

        let sample = canonical::action_text(Action::Read, ActorType::Agent);
        self.embed_raw(&sample).await?;

        self.warmed.store(true, Ordering::Release);
        info!(
            "Encoder warm: embedder '{}' ({} dims) in {} ms",
            self.embedder.name(),
            self.embedder.dimension(),
            started.elapsed().as_millis()
        );
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.warmed.load(Ordering::Acquire)
    }

    /// Encode one canonical text for one slot.
    pub async fn encode_slot(&self, slot: Slot, text: &str) -> Result<SlotVector> {
        let text = canonical::normalize(text);
        if let Some(vector) = self.memo[slot.index()].read().get(&text) {
            return Ok(*vector);
        }

        let raw = self.embed_raw(&text).await?;
        let vector = normalize(self.projections().for_slot(slot).project(&raw));
        self.remember(slot, text, vector);
        Ok(vector)
    }

    /// Encode the four slots of an intent and concatenate them. Slices are
    /// normalized individually, never as a whole.
    pub async fn encode_intent(&self, intent: &Intent) -> Result<IntentVector> {
        let [action, resource, data, risk] = canonical::intent_texts(intent);
        let slices = tokio::try_join!(
            self.encode_slot(Slot::Action, &action),
            self.encode_slot(Slot::Resource, &resource),
            self.encode_slot(Slot::Data, &data),
            self.encode_slot(Slot::Risk, &risk),
        )?;

        let mut vector = [0.0f32; INTENT_WIDTH];
        for (slot, slice) in Slot::ALL.iter().zip([slices.0, slices.1, slices.2, slices.3]) {
            set_slice(&mut vector, *slot, &slice);
        }
        Ok(vector)
    }

    /// Action and risk slices of an intent. Resource and data stay zero: their
    /// text depends on the boundary, see `encode_for_boundary`.
    pub async fn encode_closed_slots(&self, intent: &Intent) -> Result<IntentVector> {
        let action = canonical::action_text(intent.action, intent.actor.actor_type);
        let risk = canonical::risk_text(intent.risk.authn);
        let (action, risk) = tokio::try_join!(
            self.encode_slot(Slot::Action, &action),
            self.encode_slot(Slot::Risk, &risk),
        )?;

        let mut vector = [0.0f32; INTENT_WIDTH];
        set_slice(&mut vector, Slot::Action, &action);
        set_slice(&mut vector, Slot::Risk, &risk);
        Ok(vector)
    }

    /// The intent as one boundary sees it: `base` plus resource and data
    /// slices rendered under the boundary's sub-field mask. Wildcard slots
    /// are left as they are in `base`.
    pub async fn encode_for_boundary(
        &self,
        base: &IntentVector,
        intent: &Intent,
        mask: SubfieldMask,
        rule_vector: &RuleVector,
        labels: LabelMatch,
    ) -> Result<IntentVector> {
        let mut vector = *base;

        if !rule_vector.is_wildcard(Slot::Resource) {
            let text = canonical::masked_resource_text(intent, mask);
            let slice = self.encode_slot(Slot::Resource, &text).await?;
            set_slice(&mut vector, Slot::Resource, &slice);
        }

        let data_anchors = rule_vector.anchors(Slot::Data);
        if !data_anchors.is_empty() {
            let mut chosen: Option<(f32, SlotVector)> = None;
            for text in canonical::masked_data_texts(intent, mask) {
                let slice = self.encode_slot(Slot::Data, &text).await?;
                let score = max_anchor_similarity(&slice, data_anchors);
                let replace = match (chosen, labels) {
                    (None, _) => true,
                    (Some((best, _)), LabelMatch::Every) => score < best,
                    (Some((best, _)), LabelMatch::Any) => score > best,
                };
                if replace {
                    chosen = Some((score, slice));
                }
            }
            if let Some((_, slice)) = chosen {
                set_slice(&mut vector, Slot::Data, &slice);
            }
        }

        Ok(vector)
    }

    /// Encode every anchor text of a boundary into a fixed-layout rule vector.
    pub async fn encode_anchors(&self, anchors: &AnchorTexts) -> Result<RuleVector> {
        let mut rule_vector = RuleVector::default();
        for slot in Slot::ALL {
            let mut vectors = Vec::with_capacity(anchors.slot(slot).len());
            for text in anchors.slot(slot) {
                vectors.push(self.encode_slot(slot, text).await?);
            }
            rule_vector.set_slot(slot, &vectors);
        }
        Ok(rule_vector)
    }

    pub fn cached_entries(&self) -> usize {
        self.memo.iter().map(|m| m.read().len()).sum()
    }

    pub fn clear_cache(&self) {
        for memo in &self.memo {
            memo.write().clear();
        }
    }

    fn projections(&self) -> &ProjectionSet {
        self.projections.get_or_init(|| {
            debug!(
                "Building slot projections {}->{} (seed {})",
                self.embedder.dimension(),
                SLOT_WIDTH,
                self.config.projection_seed
            );
            ProjectionSet::new(self.embedder.dimension(), self.config.projection_seed)
        })
    }

    async fn embed_raw(&self, text: &str) -> Result<Vec<f32>> {
        let limit = if self.is_ready() {
            self.config.warm_timeout
        } else {
            self.config.cold_timeout
        };

        let started = Instant::now();
        let raw = match tokio::time::timeout(limit, self.embedder.embed(text)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(EnforcementError::Timeout {
                    service: Upstream::Embedder,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
        };

        let expected = self.embedder.dimension();
        if raw.len() != expected {
            return Err(EmbedderError::Dimension {
                expected,
                actual: raw.len(),
            }
            .into());
        }
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(EmbedderError::NonFinite.into());
        }
        Ok(raw)
    }

    fn remember(&self, slot: Slot, text: String, vector: SlotVector) {
        if self.config.cache_capacity == 0 {
            return;
        }
        let mut memo = self.memo[slot.index()].write();
        if memo.len() >= self.config.cache_capacity {
            debug!("Encoder {} memo full ({} entries), clearing", slot, memo.len());
            memo.clear();
        }
        memo.insert(text, vector);
    }
}
