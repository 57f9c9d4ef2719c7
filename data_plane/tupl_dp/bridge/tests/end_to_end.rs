//! End-to-end evaluation through the public engine API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde_json::json;
use sha2::{Digest, Sha256};

use bridge::api_types::{Action, ActorType, Authn};
use bridge::boundary::{BoundaryType, DecisionMode};
use bridge::boundary_store::BoundaryStore;
use bridge::{
    Boundary, BoundaryRules, Decision, Effect, Embedder, EmbedderError, EnforcementEngine,
    EnforcementError, EngineConfig, EvidenceTag, FailMode, Intent, SlotValues,
    SqliteBoundaryStore, Upstream,
};

// ================================================================================================
// TEST DOUBLES
// ================================================================================================

/// Each distinct text gets its own pseudo-random Gaussian embedding, so
/// different texts are nearly orthogonal and identical texts are identical.
struct KeyedEmbedder;

#[async_trait]
impl Embedder for KeyedEmbedder {
    fn name(&self) -> &str {
        "keyed"
    }

    fn dimension(&self) -> usize {
        64
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let digest = Sha256::digest(text.as_bytes());
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&digest);
        let mut rng = ChaCha8Rng::from_seed(seed);
        Ok((0..64).map(|_| rng.sample::<f32, _>(StandardNormal)).collect())
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn name(&self) -> &str {
        "failing"
    }

    fn dimension(&self) -> usize {
        64
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedderError> {
        Err(EmbedderError::Transport("connection refused".to_string()))
    }
}

struct SlowEmbedder;

#[async_trait]
impl Embedder for SlowEmbedder {
    fn name(&self) -> &str {
        "slow"
    }

    fn dimension(&self) -> usize {
        64
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedderError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(vec![1.0; 64])
    }
}

struct SlowStore;

#[async_trait]
impl BoundaryStore for SlowStore {
    async fn list_active(&self, _tenant_id: &str) -> bridge::Result<Vec<Boundary>> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(Vec::new())
    }
}

// ================================================================================================
// FIXTURES
// ================================================================================================

fn engine() -> EnforcementEngine {
    EnforcementEngine::new(Arc::new(KeyedEmbedder), EngineConfig::default())
}

fn engine_with(config: EngineConfig) -> EnforcementEngine {
    EnforcementEngine::new(Arc::new(KeyedEmbedder), config)
}

fn intent(action: &str, actor_type: &str, resource_type: &str) -> Intent {
    let value = json!({
        "id": format!("evt-{}-{}", action, actor_type),
        "schemaVersion": "v1.3",
        "tenantId": "tenant-1",
        "timestamp": 1699564800.0,
        "actor": {"id": "actor-1", "type": actor_type},
        "action": action,
        "resource": {"type": resource_type, "name": "users", "location": "cloud"},
        "data": {"sensitivity": ["internal"], "pii": false, "volume": "single"},
        "risk": {"authn": "required"}
    });
    Intent::from_json(&value.to_string()).unwrap()
}

fn labelled_intent(labels: &[&str]) -> Intent {
    let mut intent = intent("read", "agent", "database");
    intent.data.sensitivity = labels.iter().map(|l| l.to_string()).collect();
    intent
}

fn rules(effect: Effect) -> BoundaryRules {
    BoundaryRules::new(effect, SlotValues::uniform(0.8))
}

fn allow(id: &str) -> Boundary {
    Boundary::new(id, id, rules(Effect::Allow))
}

fn deny(id: &str) -> Boundary {
    Boundary::new(id, id, rules(Effect::Deny))
}

// ================================================================================================
// SCENARIOS
// ================================================================================================

#[tokio::test]
async fn scenario_a_matching_allow_boundary_allows() {
    let boundary = allow("allow-agent-reads")
        .with_actions([Action::Read])
        .with_actor_types([ActorType::Agent]);

    let outcome = engine()
        .evaluate(&intent("read", "agent", "api"), &[boundary])
        .await
        .unwrap();

    assert_eq!(outcome.decision, Decision::Allow);
    assert!(!outcome.default_applied);
    let evidence = outcome.evidence_for("allow-agent-reads").unwrap();
    assert_eq!(evidence.tag, EvidenceTag::PassedAllow);
    assert!(evidence.similarities[0] >= 0.90);
    assert!(evidence.passed);
}

#[tokio::test]
async fn scenario_b_matching_deny_boundary_blocks() {
    let boundary = deny("deny-destructive").with_actions([Action::Delete, Action::Export]);

    let outcome = engine()
        .evaluate(&intent("delete", "agent", "database"), &[boundary])
        .await
        .unwrap();

    assert_eq!(outcome.decision, Decision::Block);
    assert_eq!(outcome.matched_deny_boundary_id.as_deref(), Some("deny-destructive"));
    assert_eq!(
        outcome.evidence_for("deny-destructive").unwrap().tag,
        EvidenceTag::MatchedDeny
    );
}

#[tokio::test]
async fn scenario_c_filtered_allow_falls_back_to_block_by_default() {
    let boundary = allow("users-only").with_actor_types([ActorType::User]);

    let outcome = engine()
        .evaluate(&intent("write", "agent", "api"), &[boundary])
        .await
        .unwrap();

    assert_eq!(outcome.decision, Decision::Block);
    assert!(outcome.default_applied);
    assert_eq!(outcome.boundaries_evaluated, 0);
    assert_eq!(outcome.evidence_for("users-only").unwrap().tag, EvidenceTag::NotApplicable);
    assert!(outcome.failed_allow_boundary_id.is_none());
}

#[tokio::test]
async fn scenario_c_filtered_allow_falls_back_to_configured_allow() {
    let config = EngineConfig {
        default_decision: Decision::Allow,
        ..EngineConfig::default()
    };
    let boundary = allow("users-only").with_actor_types([ActorType::User]);

    let outcome = engine_with(config)
        .evaluate(&intent("write", "agent", "api"), &[boundary])
        .await
        .unwrap();

    assert_eq!(outcome.decision, Decision::Allow);
    assert!(outcome.default_applied);
}

// ================================================================================================
// AGGREGATION RULES
// ================================================================================================

#[tokio::test]
async fn deny_takes_precedence_over_passing_allows() {
    let boundaries = vec![
        allow("allow-reads").with_actions([Action::Read]),
        allow("allow-everything"),
        deny("deny-agent-reads")
            .with_actions([Action::Read])
            .with_actor_types([ActorType::Agent]),
    ];

    let outcome = engine()
        .evaluate(&intent("read", "agent", "api"), &boundaries)
        .await
        .unwrap();

    assert_eq!(outcome.decision, Decision::Block);
    assert_eq!(outcome.matched_deny_boundary_id.as_deref(), Some("deny-agent-reads"));
    assert_eq!(outcome.boundaries_evaluated, 1);
    assert_eq!(outcome.evidence.len(), 1);
}

#[tokio::test]
async fn first_matching_deny_in_input_order_is_reported() {
    let boundaries = vec![
        deny("deny-a").with_actions([Action::Read]),
        deny("deny-b").with_actor_types([ActorType::Agent]),
    ];

    let outcome = engine()
        .evaluate(&intent("read", "agent", "api"), &boundaries)
        .await
        .unwrap();

    assert_eq!(outcome.matched_deny_boundary_id.as_deref(), Some("deny-a"));
    // every deny boundary is compared
    assert_eq!(outcome.boundaries_evaluated, 2);
    assert!(outcome
        .evidence
        .iter()
        .all(|e| e.tag == EvidenceTag::MatchedDeny));
}

#[tokio::test]
async fn unmatched_deny_is_recorded_and_allow_decides() {
    let boundaries = vec![
        deny("deny-unauthenticated").with_authn(Authn::NotRequired),
        allow("allow-reads").with_actions([Action::Read]),
    ];

    let outcome = engine()
        .evaluate(&intent("read", "agent", "api"), &boundaries)
        .await
        .unwrap();

    assert_eq!(outcome.decision, Decision::Allow);
    let deny_evidence = outcome.evidence_for("deny-unauthenticated").unwrap();
    assert_eq!(deny_evidence.tag, EvidenceTag::UnmatchedDeny);
    assert!(!deny_evidence.passed);
    assert!(deny_evidence.similarities[3] < 0.8);
}

#[tokio::test]
async fn filtered_boundary_is_never_encoded_or_compared() {
    let engine = engine();
    let boundaries = vec![
        deny("deny-deletes").with_actions([Action::Delete]),
        allow("allow-reads").with_actions([Action::Read]),
    ];

    let outcome = engine
        .evaluate(&intent("read", "agent", "api"), &boundaries)
        .await
        .unwrap();

    assert_eq!(outcome.decision, Decision::Allow);
    assert_eq!(outcome.evidence_for("deny-deletes").unwrap().tag, EvidenceTag::NotApplicable);
    assert_eq!(outcome.evidence_for("deny-deletes").unwrap().similarities, [0.0; 4]);
    assert_eq!(outcome.boundaries_evaluated, 1);
    assert!(!engine.anchor_cache().contains(None, "deny-deletes"));
    assert!(engine.anchor_cache().contains(None, "allow-reads"));
}

#[tokio::test]
async fn failing_mandatory_allow_blocks_with_its_id() {
    let boundaries = vec![
        allow("allow-reads").with_actions([Action::Read]),
        allow("require-no-authn").with_authn(Authn::NotRequired),
    ];

    let outcome = engine()
        .evaluate(&intent("read", "agent", "api"), &boundaries)
        .await
        .unwrap();

    assert_eq!(outcome.decision, Decision::Block);
    assert_eq!(outcome.failed_allow_boundary_id.as_deref(), Some("require-no-authn"));
    // all mandatory allows are still compared
    assert_eq!(outcome.evidence_for("allow-reads").unwrap().tag, EvidenceTag::PassedAllow);
    assert_eq!(
        outcome.evidence_for("require-no-authn").unwrap().tag,
        EvidenceTag::FailedAllow
    );
}

#[tokio::test]
async fn optional_allows_are_evidence_and_the_default_decides() {
    let optional = |b: Boundary| {
        let mut b = b;
        b.rules.boundary_type = BoundaryType::Optional;
        b
    };

    let passing = optional(allow("opt-reads").with_actions([Action::Read]));
    let failing = optional(allow("opt-no-authn").with_authn(Authn::NotRequired));

    for default_decision in [Decision::Block, Decision::Allow] {
        let config = EngineConfig {
            default_decision,
            ..EngineConfig::default()
        };
        let engine = engine_with(config);

        for boundaries in [vec![failing.clone(), passing.clone()], vec![passing.clone()], vec![failing.clone()]] {
            let outcome = engine
                .evaluate(&intent("read", "agent", "api"), &boundaries)
                .await
                .unwrap();

            assert_eq!(outcome.decision, default_decision);
            assert!(outcome.default_applied);
            assert!(outcome.failed_allow_boundary_id.is_none());
            assert_eq!(outcome.boundaries_evaluated, boundaries.len());
        }

        let outcome = engine
            .evaluate(&intent("read", "agent", "api"), &[failing.clone(), passing.clone()])
            .await
            .unwrap();
        assert_eq!(outcome.evidence_for("opt-reads").unwrap().tag, EvidenceTag::PassedAllow);
        assert_eq!(outcome.evidence_for("opt-no-authn").unwrap().tag, EvidenceTag::FailedAllow);
    }

    // a passing mandatory allow decides; the failing optional is recorded only
    let outcome = engine()
        .evaluate(
            &intent("read", "agent", "api"),
            &[failing, allow("allow-reads").with_actions([Action::Read])],
        )
        .await
        .unwrap();
    assert_eq!(outcome.decision, Decision::Allow);
    assert!(!outcome.default_applied);
    assert_eq!(outcome.evidence_for("opt-no-authn").unwrap().tag, EvidenceTag::FailedAllow);
}

// ================================================================================================
// CONSTRAINED RESOURCE & DATA SLOTS
// ================================================================================================

#[tokio::test]
async fn allow_on_resource_sub_fields_admits_member_values() {
    let engine = engine();
    let member = intent("read", "agent", "database");

    let cases = [
        allow("by-type").with_resource_types(["database", "api"]),
        allow("by-type-and-name")
            .with_resource_types(["database"])
            .with_names(["orders", "users"]),
        allow("by-location").with_locations(["cloud", "on_prem"]),
        allow("by-everything")
            .with_actions([Action::Read])
            .with_actor_types([ActorType::Agent])
            .with_resource_types(["database"])
            .with_names(["users"])
            .with_locations(["cloud"]),
    ];
    for boundary in cases {
        let id = boundary.id.clone();
        let outcome = engine.evaluate(&member, &[boundary]).await.unwrap();

        assert_eq!(outcome.decision, Decision::Allow, "{}", id);
        let similarities = outcome.evidence_for(&id).unwrap().similarities;
        assert!(similarities[1] >= 0.99, "{}: resource similarity {}", id, similarities[1]);
    }

    let outsider = allow("other-name")
        .with_resource_types(["database"])
        .with_names(["payroll"]);
    let outcome = engine.evaluate(&member, &[outsider]).await.unwrap();
    assert_eq!(outcome.decision, Decision::Block);
    assert_eq!(outcome.failed_allow_boundary_id.as_deref(), Some("other-name"));
}

#[tokio::test]
async fn allow_on_data_sub_fields_admits_member_values() {
    let engine = engine();
    let member = intent("read", "agent", "database");

    let cases = [
        allow("non-pii").with_pii(false),
        allow("single-rows").with_volume(bridge::api_types::Volume::Single),
        allow("internal-or-public").with_sensitivity(["public", "internal"]),
        allow("internal-non-pii").with_sensitivity(["internal"]).with_pii(false),
    ];
    for boundary in cases {
        let id = boundary.id.clone();
        let outcome = engine.evaluate(&member, &[boundary]).await.unwrap();

        assert_eq!(outcome.decision, Decision::Allow, "{}", id);
        let similarities = outcome.evidence_for(&id).unwrap().similarities;
        assert!(similarities[2] >= 0.99, "{}: data similarity {}", id, similarities[2]);
    }

    let outcome = engine
        .evaluate(&member, &[allow("secret-only").with_sensitivity(["secret"])])
        .await
        .unwrap();
    assert_eq!(outcome.decision, Decision::Block);
}

#[tokio::test]
async fn deny_on_resource_and_sensitivity_matches_member_values() {
    let boundaries = vec![
        deny("deny-payroll").with_names(["payroll"]),
        deny("deny-internal-db")
            .with_resource_types(["database"])
            .with_sensitivity(["secret", "internal"]),
        allow("allow-reads").with_actions([Action::Read]),
    ];

    let outcome = engine()
        .evaluate(&intent("read", "agent", "database"), &boundaries)
        .await
        .unwrap();

    assert_eq!(outcome.decision, Decision::Block);
    assert_eq!(outcome.matched_deny_boundary_id.as_deref(), Some("deny-internal-db"));
    assert_eq!(outcome.evidence_for("deny-payroll").unwrap().tag, EvidenceTag::UnmatchedDeny);
    let similarities = outcome.evidence_for("deny-internal-db").unwrap().similarities;
    assert!(similarities[1] >= 0.99 && similarities[2] >= 0.99);
}

#[tokio::test]
async fn multi_label_sensitivity_needs_every_label_allowed() {
    let engine = engine();
    let intent = labelled_intent(&["internal", "pii"]);

    let covered = allow("covered").with_sensitivity(["public", "pii", "internal"]);
    let outcome = engine.evaluate(&intent, &[covered]).await.unwrap();
    assert_eq!(outcome.decision, Decision::Allow);
    assert!(outcome.evidence_for("covered").unwrap().similarities[2] >= 0.99);

    let partial = allow("internal-only").with_sensitivity(["internal"]);
    let outcome = engine.evaluate(&intent, &[partial]).await.unwrap();
    assert_eq!(outcome.decision, Decision::Block);
    assert_eq!(outcome.failed_allow_boundary_id.as_deref(), Some("internal-only"));

    // a deny needs only one of the labels
    let outcome = engine
        .evaluate(
            &intent,
            &[
                deny("deny-pii").with_sensitivity(["pii"]),
                allow("covered").with_sensitivity(["pii", "internal"]),
            ],
        )
        .await
        .unwrap();
    assert_eq!(outcome.decision, Decision::Block);
    assert_eq!(outcome.matched_deny_boundary_id.as_deref(), Some("deny-pii"));

    // no labels at all renders as `none`
    let unlabelled = labelled_intent(&[]);
    let outcome = engine
        .evaluate(&unlabelled, &[allow("none-ok").with_sensitivity(["none", "public"])])
        .await
        .unwrap();
    assert_eq!(outcome.decision, Decision::Allow);
}

#[tokio::test]
async fn weighted_and_unanimous_modes() {
    let base = allow("weighted")
        .with_actions([Action::Read])
        .with_authn(Authn::NotRequired);

    let mut weighted = base.clone();
    weighted.rules = rules(Effect::Allow)
        .with_mode(DecisionMode::Weighted)
        .with_global_threshold(0.5);
    let outcome = engine()
        .evaluate(&intent("read", "agent", "api"), &[weighted])
        .await
        .unwrap();
    assert_eq!(outcome.decision, Decision::Allow);

    let mut min = base.clone();
    min.id = "min".to_string();
    let outcome = engine()
        .evaluate(&intent("read", "agent", "api"), &[min])
        .await
        .unwrap();
    assert_eq!(outcome.decision, Decision::Block);

    let mut unanimous = allow("unanimous").with_actions([Action::Read]);
    unanimous.rules = rules(Effect::Allow).with_mode(DecisionMode::Unanimous);
    let outcome = engine()
        .evaluate(&intent("read", "agent", "api"), &[unanimous])
        .await
        .unwrap();
    assert_eq!(outcome.decision, Decision::Block);
}

#[tokio::test]
async fn anchor_truncation_is_surfaced_in_outcome() {
    let boundary = allow("all-actors").with_actor_types(ActorType::ALL);

    let outcome = engine()
        .evaluate(&intent("read", "agent", "api"), &[boundary])
        .await
        .unwrap();

    assert_eq!(outcome.truncations.len(), 1);
    assert_eq!(outcome.truncations[0].original_count, 24);
    assert_eq!(outcome.truncations[0].kept, 16);
}

#[tokio::test]
async fn invalid_boundary_aborts_request() {
    let mut broken = allow("broken");
    broken.rules.thresholds.data = f32::INFINITY;

    let err = engine()
        .evaluate(&intent("read", "agent", "api"), &[allow("fine"), broken])
        .await
        .unwrap_err();

    assert!(matches!(err, EnforcementError::InvalidBoundary { .. }));
}

#[tokio::test]
async fn outcome_serializes_for_audit() {
    let outcome = engine()
        .evaluate(
            &intent("delete", "agent", "api"),
            &[deny("deny-deletes").with_actions([Action::Delete])],
        )
        .await
        .unwrap();

    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["decision"], "BLOCK");
    assert_eq!(value["evidence"][0]["tag"], "matched_deny");
    assert_eq!(value["evidence"][0]["effect"], "deny");
    assert_eq!(value["evaluation_id"].as_str().unwrap().len(), 36);
}

// ================================================================================================
// UPSTREAM FAILURES
// ================================================================================================

#[tokio::test]
async fn embedder_failure_is_a_typed_error() {
    let engine = EnforcementEngine::new(Arc::new(FailingEmbedder), EngineConfig::default());

    let err = engine
        .evaluate(&intent("read", "agent", "api"), &[allow("any")])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EnforcementError::UpstreamUnavailable {
            service: Upstream::Embedder,
            ..
        }
    ));
}

#[tokio::test]
async fn embedder_is_not_called_when_nothing_applies() {
    let engine = EnforcementEngine::new(Arc::new(FailingEmbedder), EngineConfig::default());

    let outcome = engine
        .evaluate(
            &intent("read", "agent", "api"),
            &[allow("deletes").with_actions([Action::Delete])],
        )
        .await
        .unwrap();

    assert_eq!(outcome.decision, Decision::Block);
    assert!(outcome.default_applied);
}

#[tokio::test]
async fn embedder_timeout_is_a_typed_error() {
    let mut config = EngineConfig::default();
    config.encoder.cold_timeout = Duration::from_millis(20);
    let engine = EnforcementEngine::new(Arc::new(SlowEmbedder), config);

    let err = engine
        .evaluate(&intent("read", "agent", "api"), &[allow("any")])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EnforcementError::Timeout {
            service: Upstream::Embedder,
            ..
        }
    ));
    assert!(!engine.is_ready());
}

#[tokio::test]
async fn fallback_maps_upstream_failure_by_fail_mode() {
    for (mode, expected) in [(FailMode::Closed, Decision::Block), (FailMode::Open, Decision::Allow)] {
        let config = EngineConfig {
            on_upstream_failure: mode,
            ..EngineConfig::default()
        };
        let engine = EnforcementEngine::new(Arc::new(FailingEmbedder), config);

        let outcome = engine
            .evaluate_with_fallback(&intent("read", "agent", "api"), &[allow("any")])
            .await
            .unwrap();

        assert_eq!(outcome.decision, expected);
        assert!(outcome.degraded.as_deref().unwrap().contains("embedder"));
        assert!(outcome.evidence.is_empty());
    }
}

#[tokio::test]
async fn fallback_does_not_hide_invalid_boundaries() {
    let config = EngineConfig {
        on_upstream_failure: FailMode::Open,
        ..EngineConfig::default()
    };
    let mut broken = allow("broken");
    broken.rules.weights.risk = -1.0;

    let err = engine_with(config)
        .evaluate_with_fallback(&intent("read", "agent", "api"), &[broken])
        .await
        .unwrap_err();

    assert!(matches!(err, EnforcementError::InvalidBoundary { .. }));
}

#[tokio::test]
async fn store_timeout_is_a_typed_error() {
    let config = EngineConfig {
        store_timeout: Duration::from_millis(20),
        ..EngineConfig::default()
    };
    let engine = engine_with(config).with_store(Arc::new(SlowStore));

    let err = engine
        .evaluate_for_tenant(&intent("read", "agent", "api"), "tenant-1")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EnforcementError::Timeout {
            service: Upstream::BoundaryStore,
            ..
        }
    ));

    let outcome = engine
        .evaluate_for_tenant_with_fallback(&intent("read", "agent", "api"), "tenant-1")
        .await
        .unwrap();
    assert_eq!(outcome.decision, Decision::Block);
    assert!(outcome.degraded.is_some());
}

// ================================================================================================
// STORE-BACKED EVALUATION
// ================================================================================================

#[tokio::test]
async fn tenant_boundaries_from_sqlite_store() {
    let store = Arc::new(SqliteBoundaryStore::in_memory().unwrap());
    store
        .upsert_json(
            "tenant-1",
            &json!({
                "id": "allow-agent-reads",
                "name": "Agents may read",
                "constraints": {"action": {"actions": ["read"], "actor_types": ["agent"]}},
                "rules": {
                    "effect": "allow",
                    "thresholds": {"action": 0.8, "resource": 0.8, "data": 0.8, "risk": 0.8}
                }
            })
            .to_string(),
        )
        .unwrap();
    store
        .upsert_json(
            "tenant-1",
            &json!({
                "id": "deny-exports",
                "name": "No exports",
                "constraints": {"action": {"actions": ["export"]}},
                "rules": {"effect": "deny", "thresholds": [0.8, 0.8, 0.8, 0.8]}
            })
            .to_string(),
        )
        .unwrap();

    let engine = engine().with_store(store.clone());
    engine.warmup().await.unwrap();
    assert!(engine.is_ready());

    let read = engine
        .evaluate_for_tenant(&intent("read", "agent", "api"), "tenant-1")
        .await
        .unwrap();
    assert_eq!(read.decision, Decision::Allow);

    let export = engine
        .evaluate_for_tenant(&intent("export", "agent", "api"), "tenant-1")
        .await
        .unwrap();
    assert_eq!(export.decision, Decision::Block);
    assert_eq!(export.matched_deny_boundary_id.as_deref(), Some("deny-exports"));

    let other_tenant = engine
        .evaluate_for_tenant(&intent("read", "agent", "api"), "tenant-2")
        .await
        .unwrap();
    assert!(other_tenant.default_applied);

    // refresh evicts anchors of deactivated boundaries
    store.deactivate("tenant-1", "deny-exports").unwrap();
    let stats = engine
        .refresh_service()
        .unwrap()
        .refresh_tenant("tenant-1")
        .await
        .unwrap();
    assert_eq!(stats.boundaries_reused, 1);
    assert_eq!(stats.boundaries_evicted, 1);
    assert!(!engine.anchor_cache().contains(Some("tenant-1"), "deny-exports"));
    assert!(engine.anchor_cache().contains(Some("tenant-1"), "allow-agent-reads"));
}
