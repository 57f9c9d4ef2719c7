//! # Enforcement Engine
//!
//! Evaluates one intent against a set of boundaries:
//! 1. Validates every boundary (an invalid one fails the whole request)
//! 2. Filters boundaries structurally; filtered ones are recorded as `not_applicable`
//! 3. Encodes the intent's action and risk slots once, only if something applies;
//!    resource and data are rendered per boundary under its sub-field mask
//! 4. Compares every applicable deny boundary with the min rule; any match blocks
//! 5. Otherwise compares allow boundaries: every mandatory one must pass
//! 6. Falls back to the configured default decision when no mandatory allow
//!    boundary applies; optional allows are recorded as evidence only
//!
//! The caller gets either a complete outcome with evidence or a typed error.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::anchor_cache::{AnchorCache, CachedAnchors};
use crate::anchors::{subfield_mask, AnchorTruncation};
use crate::api_types::{BoundaryEvidence, EvaluationOutcome, Intent};
use crate::applicability::check_applicability;
use crate::boundary::Boundary;
use crate::boundary_store::{BoundaryStore, SqliteBoundaryStore};
use crate::config::EngineConfig;
use crate::encoding::{Embedder, LabelMatch, SlotEncoder};
use crate::error::{EnforcementError, Result, Upstream};
use crate::refresh::RefreshService;
use crate::types::{Decision, EvidenceTag, IntentVector};
use crate::vector_comparison::{
    compare_intent_vs_rule, decision_params, min_rule_params, ComparisonResult,
};
use semantic_sandbox::DecisionParams;

pub struct EnforcementEngine {
    encoder: Arc<SlotEncoder>,
    anchor_cache: Arc<AnchorCache>,
    store: Option<Arc<dyn BoundaryStore>>,
    config: EngineConfig,
}

/// How an evaluation was decided.
struct Verdict {
    decision: Decision,
    matched_deny: Option<usize>,
    failed_allow: Option<usize>,
    default_applied: bool,
}

impl Verdict {
    fn default_policy(decision: Decision) -> Self {
        Self {
            decision,
            matched_deny: None,
            failed_allow: None,
            default_applied: true,
        }
    }
}

/// Running state of one evaluation.
struct Evaluation<'a> {
    boundaries: &'a [Boundary],
    records: Vec<Option<BoundaryEvidence>>,
    truncations: Vec<AnchorTruncation>,
    evaluated: usize,
}

impl<'a> Evaluation<'a> {
    fn new(boundaries: &'a [Boundary]) -> Self {
        Self {
            boundaries,
            records: vec![None; boundaries.len()],
            truncations: Vec::new(),
            evaluated: 0,
        }
    }

    fn record(&mut self, idx: usize, result: &ComparisonResult, tag: EvidenceTag) {
        self.records[idx] = Some(BoundaryEvidence::compared(
            &self.boundaries[idx],
            result.slice_similarities,
            result.passed(),
            tag,
        ));
    }

    fn first_id(&self, idx: Option<usize>) -> Option<String> {
        idx.map(|i| self.boundaries[i].id.clone())
    }
}

impl EnforcementEngine {
    pub fn new(embedder: Arc<dyn Embedder>, config: EngineConfig) -> Self {
        Self {
            encoder: Arc::new(SlotEncoder::new(embedder, config.encoder.clone())),
            anchor_cache: Arc::new(AnchorCache::new()),
            store: None,
            config,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn BoundaryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Engine with the configured embedder and the SQLite boundary store.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let embedder = config.build_embedder()?;
        let store = SqliteBoundaryStore::new(config.storage.clone())?;
        Ok(Self::new(embedder, config).with_store(Arc::new(store)))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn encoder(&self) -> &SlotEncoder {
        &self.encoder
    }

    pub fn anchor_cache(&self) -> &AnchorCache {
        &self.anchor_cache
    }

    /// Load the embedding model and projections. Must complete before the
    /// engine reports ready.
    pub async fn warmup(&self) -> Result<()> {
        self.encoder.warmup().await
    }

    pub fn is_ready(&self) -> bool {
        self.encoder.is_ready()
    }

    /// Refresh service over this engine's store and anchor cache.
    pub fn refresh_service(&self) -> Option<RefreshService> {
        self.store.as_ref().map(|store| {
            RefreshService::new(
                Arc::clone(store),
                Arc::clone(&self.encoder),
                Arc::clone(&self.anchor_cache),
            )
        })
    }

    // ============================================================================================
    // EVALUATION
    // ============================================================================================

    pub async fn evaluate(&self, intent: &Intent, boundaries: &[Boundary]) -> Result<EvaluationOutcome> {
        let started = Instant::now();
        let evaluation_id = Uuid::new_v4().to_string();

        for boundary in boundaries {
            boundary.validate()?;
        }

        let mut eval = Evaluation::new(boundaries);
        let mut denies = Vec::new();
        let mut allows = Vec::new();

        for (idx, boundary) in boundaries.iter().enumerate() {
            match check_applicability(intent, boundary) {
                Ok(()) if boundary.is_deny() => denies.push(idx),
                Ok(()) => allows.push(idx),
                Err(reason) => {
                    debug!("Boundary '{}' skipped: {}", boundary.id, reason);
                    eval.records[idx] = Some(BoundaryEvidence::not_applicable(boundary));
                }
            }
        }

        debug!(
            "Evaluation {}: {} boundaries, {} deny and {} allow applicable",
            evaluation_id,
            boundaries.len(),
            denies.len(),
            allows.len()
        );

        if denies.is_empty() && allows.is_empty() {
            let verdict = Verdict::default_policy(self.config.default_decision);
            return Ok(self.finish(evaluation_id, eval, verdict, started));
        }

        let base = self.encoder.encode_closed_slots(intent).await?;

        // Deny pass: any-match over every applicable deny boundary.
        let mut matched_deny = None;
        for &idx in &denies {
            let boundary = &boundaries[idx];
            let params = min_rule_params(&boundary.rules);
            let result = self
                .compare_boundary(&base, intent, boundary, params, LabelMatch::Any, &mut eval)
                .await?;
            let tag = if result.passed() {
                EvidenceTag::MatchedDeny
            } else {
                EvidenceTag::UnmatchedDeny
            };
            eval.record(idx, &result, tag);
            if result.passed() && matched_deny.is_none() {
                matched_deny = Some(idx);
            }
        }

        if let Some(idx) = matched_deny {
            info!(
                "BLOCK (deny): intent '{}' matched boundary '{}'",
                intent.id, boundaries[idx].id
            );
            let verdict = Verdict {
                decision: Decision::Block,
                matched_deny,
                failed_allow: None,
                default_applied: false,
            };
            return Ok(self.finish(evaluation_id, eval, verdict, started));
        }

        // Allow pass. Optional allows are compared for evidence but never decide.
        let mut any_mandatory = false;
        let mut failed_mandatory = None;

        for &idx in &allows {
            let boundary = &boundaries[idx];
            let params = decision_params(&boundary.rules);
            let result = self
                .compare_boundary(&base, intent, boundary, params, LabelMatch::Every, &mut eval)
                .await?;
            let passed = result.passed();
            let tag = if passed {
                EvidenceTag::PassedAllow
            } else {
                EvidenceTag::FailedAllow
            };
            eval.record(idx, &result, tag);

            if boundary.is_mandatory() {
                any_mandatory = true;
                if !passed && failed_mandatory.is_none() {
                    failed_mandatory = Some(idx);
                }
            }
        }

        let verdict = if !any_mandatory {
            Verdict::default_policy(self.config.default_decision)
        } else if let Some(idx) = failed_mandatory {
            info!(
                "BLOCK (allow): intent '{}' failed boundary '{}'",
                intent.id, boundaries[idx].id
            );
            Verdict {
                decision: Decision::Block,
                matched_deny: None,
                failed_allow: failed_mandatory,
                default_applied: false,
            }
        } else {
            info!("ALLOW: intent '{}' passed every mandatory allow boundary", intent.id);
            Verdict {
                decision: Decision::Allow,
                matched_deny: None,
                failed_allow: None,
                default_applied: false,
            }
        };

        Ok(self.finish(evaluation_id, eval, verdict, started))
    }

    /// Load the tenant's active boundaries (bounded by the store timeout) and
    /// evaluate against them.
    pub async fn evaluate_for_tenant(&self, intent: &Intent, tenant_id: &str) -> Result<EvaluationOutcome> {
        let boundaries = self.load_boundaries(tenant_id).await?;
        self.evaluate(intent, &boundaries).await
    }

    /// Like `evaluate`, but an upstream failure becomes a degraded outcome
    /// decided by the configured fail mode. Other errors pass through.
    pub async fn evaluate_with_fallback(
        &self,
        intent: &Intent,
        boundaries: &[Boundary],
    ) -> Result<EvaluationOutcome> {
        let started = Instant::now();
        match self.evaluate(intent, boundaries).await {
            Err(err) if err.is_upstream() => Ok(self.degraded(intent, err, started)),
            other => other,
        }
    }

    pub async fn evaluate_for_tenant_with_fallback(
        &self,
        intent: &Intent,
        tenant_id: &str,
    ) -> Result<EvaluationOutcome> {
        let started = Instant::now();
        match self.evaluate_for_tenant(intent, tenant_id).await {
            Err(err) if err.is_upstream() => Ok(self.degraded(intent, err, started)),
            other => other,
        }
    }

    // ============================================================================================
    // HELPERS
    // ============================================================================================

    async fn load_boundaries(&self, tenant_id: &str) -> Result<Vec<Boundary>> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| EnforcementError::Config("no boundary store configured".to_string()))?;

        let started = Instant::now();
        match tokio::time::timeout(self.config.store_timeout, store.list_active(tenant_id)).await {
            Ok(result) => result,
            Err(_) => Err(EnforcementError::Timeout {
                service: Upstream::BoundaryStore,
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
        }
    }

    async fn compare_boundary(
        &self,
        base: &IntentVector,
        intent: &Intent,
        boundary: &Boundary,
        params: DecisionParams,
        labels: LabelMatch,
        eval: &mut Evaluation<'_>,
    ) -> Result<ComparisonResult> {
        let cached: Arc<CachedAnchors> = self.anchor_cache.get_or_encode(boundary, &self.encoder).await?;
        let intent_vector = self
            .encoder
            .encode_for_boundary(base, intent, subfield_mask(boundary), &cached.rule_vector, labels)
            .await?;
        let result = compare_intent_vs_rule(&intent_vector, &cached.rule_vector, &params);

        debug!(
            "Boundary '{}' ({:?}): similarities {:?} -> {}",
            boundary.id,
            boundary.rules.effect,
            result.slice_similarities,
            if result.passed() { "pass" } else { "fail" }
        );

        eval.evaluated += 1;
        eval.truncations.extend(cached.truncations.iter().cloned());
        Ok(result)
    }

    fn finish(
        &self,
        evaluation_id: String,
        eval: Evaluation<'_>,
        verdict: Verdict,
        started: Instant,
    ) -> EvaluationOutcome {
        if verdict.default_applied {
            info!(
                "No applicable mandatory allow boundary: default decision {} applied",
                verdict.decision
            );
        }

        EvaluationOutcome {
            evaluation_id,
            decision: verdict.decision,
            matched_deny_boundary_id: eval.first_id(verdict.matched_deny),
            failed_allow_boundary_id: eval.first_id(verdict.failed_allow),
            evidence: eval.records.into_iter().flatten().collect(),
            boundaries_evaluated: eval.evaluated,
            default_applied: verdict.default_applied,
            degraded: None,
            truncations: eval.truncations,
            duration_us: started.elapsed().as_micros() as u64,
        }
    }

    fn degraded(&self, intent: &Intent, err: EnforcementError, started: Instant) -> EvaluationOutcome {
        let decision = self.config.on_upstream_failure.decision();
        warn!(
            "Upstream failure for intent '{}': {}. Fail-{:?} decision {}",
            intent.id, err, self.config.on_upstream_failure, decision
        );

        EvaluationOutcome {
            evaluation_id: Uuid::new_v4().to_string(),
            decision,
            evidence: Vec::new(),
            matched_deny_boundary_id: None,
            failed_allow_boundary_id: None,
            boundaries_evaluated: 0,
            default_applied: false,
            degraded: Some(err.to_string()),
            truncations: Vec::new(),
            duration_us: started.elapsed().as_micros() as u64,
        }
    }
}
