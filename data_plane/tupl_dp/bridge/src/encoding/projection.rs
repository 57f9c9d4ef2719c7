//! Seeded Gaussian random projections, one per slot.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::types::{Slot, SlotVector, NUM_SLOTS, SLOT_WIDTH};

/// Norms below this are treated as the zero vector.
pub const NORM_EPSILON: f32 = 1e-8;

/// Row-major `SLOT_WIDTH x input_dim` matrix with N(0, 1/SLOT_WIDTH) entries.
#[derive(Debug, Clone)]
pub struct SlotProjection {
    input_dim: usize,
    matrix: Vec<f32>,
}

impl SlotProjection {
    pub fn new(input_dim: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let scale = 1.0 / (SLOT_WIDTH as f32).sqrt();
        let matrix = (0..SLOT_WIDTH * input_dim)
            .map(|_| {
                let value: f32 = rng.sample(StandardNormal);
                value * scale
            })
            .collect();

        Self { input_dim, matrix }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Project an embedding; extra trailing components are ignored and
    /// missing ones count as zero.
    pub fn project(&self, embedding: &[f32]) -> SlotVector {
        let mut out = [0.0f32; SLOT_WIDTH];
        let width = embedding.len().min(self.input_dim);
        for (row, value) in out.iter_mut().enumerate() {
            let weights = &self.matrix[row * self.input_dim..row * self.input_dim + width];
            *value = weights
                .iter()
                .zip(&embedding[..width])
                .map(|(w, e)| w * e)
                .sum();
        }
        out
    }
}

/// The four slot projections. Slot `i` is seeded with `base_seed + i`.
#[derive(Debug, Clone)]
pub struct ProjectionSet {
    slots: [SlotProjection; NUM_SLOTS],
}

impl ProjectionSet {
    pub fn new(input_dim: usize, base_seed: u64) -> Self {
        Self {
            slots: std::array::from_fn(|i| {
                SlotProjection::new(input_dim, base_seed.wrapping_add(i as u64))
            }),
        }
    }

    pub fn for_slot(&self, slot: Slot) -> &SlotProjection {
        &self.slots[slot.index()]
    }
}

pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// `v / ‖v‖`; a (near-)zero vector comes back as exactly zero.
pub fn normalize(vector: SlotVector) -> SlotVector {
    let norm = l2_norm(&vector);
    if !norm.is_finite() || norm < NORM_EPSILON {
        return [0.0; SLOT_WIDTH];
    }
    let mut out = vector;
    out.iter_mut().for_each(|v| *v /= norm);
    out
}
