use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Temperature sampling with an inverse-CDF draw.
///
/// Given a raw logits row and a temperature, produces one sampled token id
/// per call: scale by `1/τ`, stabilize with max-subtraction, exponentiate
/// and normalize into a distribution, then walk its cumulative sum against
/// a single draw from the internal PRNG. The draw is the only source of
/// randomness; everything else is pure arithmetic on a scratch buffer, so
/// the input logits are never mutated.
pub struct TemperatureSampler {
    temperature: f32,
    rng: StdRng,
}

impl TemperatureSampler {
    /// `temperature` is normalized at draw time, not here: a non-positive
    /// value is substituted with `1.0` on every call rather than rejected
    /// up front, matching callers that pass a knob straight through from
    /// the command line.
    pub fn new(temperature: f32, seed: u64) -> Self {
        TemperatureSampler { temperature, rng: StdRng::seed_from_u64(seed) }
    }

    /// Draws one token id in `0..logits.len()`. Panics if `logits` is empty
    /// (a zero-vocabulary model cannot sample).
    pub fn sample(&mut self, logits: &[f32]) -> usize {
        assert!(!logits.is_empty(), "cannot sample from an empty logits row");

        let temp = if self.temperature <= 0.0 { 1.0 } else { self.temperature };

        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut probs: Vec<f32> = logits.iter().map(|&l| ((l - max) / temp).exp()).collect();
        let sum: f32 = probs.iter().sum();
        for p in probs.iter_mut() {
            *p /= sum;
        }

        let draw: f32 = self.rng.gen_range(0.0..1.0);
        let mut cumulative = 0.0f32;
        for (id, &p) in probs.iter().enumerate() {
            cumulative += p;
            if cumulative > draw {
                return id;
            }
        }
        probs.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let logits = vec![1.0, 2.0, 0.5, -1.0, 3.0];
        let mut a = TemperatureSampler::new(1.0, 42);
        let mut b = TemperatureSampler::new(1.0, 42);
        let seq_a: Vec<usize> = (0..10).map(|_| a.sample(&logits)).collect();
        let seq_b: Vec<usize> = (0..10).map(|_| b.sample(&logits)).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn test_different_seeds_can_diverge() {
        let logits = vec![0.0; 20];
        let mut a = TemperatureSampler::new(1.0, 1);
        let mut b = TemperatureSampler::new(1.0, 2);
        let seq_a: Vec<usize> = (0..20).map(|_| a.sample(&logits)).collect();
        let seq_b: Vec<usize> = (0..20).map(|_| b.sample(&logits)).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn test_non_positive_temperature_is_normalized_not_rejected() {
        let logits = vec![1.0, 5.0, 2.0];
        let mut s = TemperatureSampler::new(0.0, 7);
        // Should not panic and should return a valid index.
        let id = s.sample(&logits);
        assert!(id < logits.len());

        let mut neg = TemperatureSampler::new(-3.0, 7);
        let id_neg = neg.sample(&logits);
        assert!(id_neg < logits.len());
    }

    #[test]
    fn test_does_not_mutate_input() {
        let logits = vec![1.0, 2.0, 3.0];
        let original = logits.clone();
        let mut s = TemperatureSampler::new(0.8, 3);
        for _ in 0..5 {
            s.sample(&logits);
        }
        assert_eq!(logits, original);
    }

    #[test]
    fn test_low_temperature_concentrates_on_dominant_logit() {
        let logits = vec![0.0, 0.0, 50.0, 0.0];
        let mut s = TemperatureSampler::new(0.05, 99);
        for _ in 0..20 {
            assert_eq!(s.sample(&logits), 2);
        }
    }
}
