//! Feed-forward behaviour weights carried by organisms and archived in the hall of fame.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::MutationConfig;

/// Dense two-layer perceptron weights (`inputs -> hidden (tanh) -> outputs (tanh)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainWeights {
    pub inputs: usize,
    pub hidden: usize,
    pub outputs: usize,
    /// Row-major `hidden x inputs`.
    pub w1: Vec<f32>,
    pub b1: Vec<f32>,
    /// Row-major `outputs x hidden`.
    pub w2: Vec<f32>,
    pub b2: Vec<f32>,
}

impl BrainWeights {
    /// Zero-initialised network with the given shape.
    #[must_use]
    pub fn zeros(inputs: usize, hidden: usize, outputs: usize) -> Self {
        Self {
            inputs,
            hidden,
            outputs,
            w1: vec![0.0; hidden * inputs],
            b1: vec![0.0; hidden],
            w2: vec![0.0; outputs * hidden],
            b2: vec![0.0; outputs],
        }
    }

    /// Sample weights uniformly in `[-1, 1)` scaled by fan-in.
    pub fn random<R: Rng + ?Sized>(
        rng: &mut R,
        inputs: usize,
        hidden: usize,
        outputs: usize,
    ) -> Self {
        let mut brain = Self::zeros(inputs, hidden, outputs);
        let scale1 = 1.0 / (inputs.max(1) as f32).sqrt();
        let scale2 = 1.0 / (hidden.max(1) as f32).sqrt();
        for w in &mut brain.w1 {
            *w = rng.random_range(-1.0..1.0) * scale1;
        }
        for w in &mut brain.w2 {
            *w = rng.random_range(-1.0..1.0) * scale2;
        }
        for b in brain.b1.iter_mut().chain(brain.b2.iter_mut()) {
            *b = rng.random_range(-0.1..0.1);
        }
        brain
    }

    /// Returns whether the stored vectors match the declared shape.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.w1.len() == self.hidden * self.inputs
            && self.b1.len() == self.hidden
            && self.w2.len() == self.outputs * self.hidden
            && self.b2.len() == self.outputs
    }

    /// Returns whether the network accepts this shape.
    #[must_use]
    pub fn has_shape(&self, inputs: usize, hidden: usize, outputs: usize) -> bool {
        self.inputs == inputs
            && self.hidden == hidden
            && self.outputs == outputs
            && self.is_well_formed()
    }

    /// Evaluate the network. Missing inputs are read as zero and extra outputs are left untouched.
    pub fn forward(&self, inputs: &[f32], outputs: &mut [f32]) {
        let mut hidden = [0.0f32; 32];
        let mut spill = Vec::new();
        let hidden_buf: &mut [f32] = if self.hidden <= hidden.len() {
            &mut hidden[..self.hidden]
        } else {
            spill.resize(self.hidden, 0.0);
            spill.as_mut_slice()
        };

        for (h, slot) in hidden_buf.iter_mut().enumerate() {
            let row = &self.w1[h * self.inputs..(h + 1) * self.inputs];
            let mut acc = self.b1[h];
            for (w, x) in row.iter().zip(inputs) {
                acc += w * x;
            }
            *slot = acc.tanh();
        }

        for (o, slot) in outputs.iter_mut().take(self.outputs).enumerate() {
            let row = &self.w2[o * self.hidden..(o + 1) * self.hidden];
            let mut acc = self.b2[o];
            for (w, h) in row.iter().zip(hidden_buf.iter()) {
                acc += w * h;
            }
            *slot = acc.tanh();
        }
    }

    /// Sparse mutation: each parameter is perturbed with probability `rate` by up to `sigma`,
    /// and occasionally by the larger `big_sigma`.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R, config: &MutationConfig) {
        let params = self
            .w1
            .iter_mut()
            .chain(self.b1.iter_mut())
            .chain(self.w2.iter_mut())
            .chain(self.b2.iter_mut());
        for value in params {
            let roll: f32 = rng.random();
            if roll < config.big_rate && config.big_sigma > 0.0 {
                *value += rng.random_range(-config.big_sigma..config.big_sigma);
            } else if roll < config.big_rate + config.rate && config.sigma > 0.0 {
                *value += rng.random_range(-config.sigma..config.sigma);
            }
            *value = value.clamp(-config.weight_limit, config.weight_limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};

    #[test]
    fn forward_is_bounded_and_deterministic() {
        let mut rng = SmallRng::seed_from_u64(7);
        let brain = BrainWeights::random(&mut rng, 6, 8, 3);
        assert!(brain.has_shape(6, 8, 3));
        let inputs = [0.5, -0.25, 1.0, 0.0, 0.75, -1.0];
        let mut a = [0.0; 3];
        let mut b = [0.0; 3];
        brain.forward(&inputs, &mut a);
        brain.forward(&inputs, &mut b);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn mutation_changes_some_weights_within_limit() {
        let mut rng = SmallRng::seed_from_u64(11);
        let original = BrainWeights::random(&mut rng, 4, 4, 2);
        let mut mutated = original.clone();
        let config = MutationConfig {
            rate: 0.5,
            ..MutationConfig::default()
        };
        mutated.mutate(&mut rng, &config);
        assert_ne!(original, mutated);
        assert!(
            mutated
                .w1
                .iter()
                .all(|w| w.abs() <= config.weight_limit)
        );
    }
}
