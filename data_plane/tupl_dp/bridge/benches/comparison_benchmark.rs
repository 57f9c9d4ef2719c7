use bridge::rule_vector::RuleVector;
use bridge::types::{IntentVector, Slot, SlotVector, INTENT_WIDTH, MAX_ANCHORS_PER_SLOT, SLOT_WIDTH};
use bridge::vector_comparison::{build_envelope, compare_intent_vs_rule, decision_params};
use bridge::{BoundaryRules, Effect, SlotValues};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn slot_vector(seed: usize) -> SlotVector {
    let mut v = [0.0f32; SLOT_WIDTH];
    for (i, x) in v.iter_mut().enumerate() {
        *x = ((seed * 31 + i * 7) as f32).sin();
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter_mut().for_each(|x| *x /= norm);
    v
}

fn intent_vector() -> IntentVector {
    let mut intent = [0.0f32; INTENT_WIDTH];
    for slot in Slot::ALL {
        let i = slot.index();
        intent[i * SLOT_WIDTH..(i + 1) * SLOT_WIDTH].copy_from_slice(&slot_vector(1000 + i));
    }
    intent
}

fn full_rule_vector() -> RuleVector {
    let mut rv = RuleVector::empty();
    for slot in Slot::ALL {
        let anchors: Vec<SlotVector> = (0..MAX_ANCHORS_PER_SLOT)
            .map(|a| slot_vector(slot.index() * 100 + a))
            .collect();
        rv.set_slot(slot, &anchors);
    }
    rv
}

pub fn comparison_bench(c: &mut Criterion) {
    let intent = intent_vector();
    let rule_vector = full_rule_vector();
    let params = decision_params(&BoundaryRules::new(Effect::Allow, SlotValues::uniform(0.8)));

    c.bench_function("compare_full_anchor_sets", |b| {
        b.iter(|| compare_intent_vs_rule(black_box(&intent), black_box(&rule_vector), &params))
    });

    c.bench_function("compare_wildcard", |b| {
        let empty = RuleVector::empty();
        b.iter(|| compare_intent_vs_rule(black_box(&intent), black_box(&empty), &params))
    });

    c.bench_function("compare_via_envelope", |b| {
        b.iter(|| {
            let envelope = build_envelope(black_box(&intent), &rule_vector, &params);
            unsafe { semantic_sandbox::compare_vectors(&*envelope) }
        })
    });
}

criterion_group!(benches, comparison_bench);
criterion_main!(benches);
