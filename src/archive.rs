//! Bounded top-K store of the fittest dead goopies and fitness-weighted ancestor sampling.

use bevy::log::debug;
use rand::distributions::WeightedIndex;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::brain::{Brain, BrainError, BrainSnapshot, ConvBrain};
use crate::config::SimulationConfig;

/// A retained brain and the fitness its owner reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub fitness: f32,
    pub brain: BrainSnapshot,
}

/// Entries are kept sorted by descending fitness and never exceed `capacity`.
#[derive(Debug, Clone)]
pub struct Archive {
    entries: Vec<ArchiveEntry>,
    capacity: usize,
    fitness_threshold: f32,
}

impl Archive {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity + 1),
            capacity,
            fitness_threshold: 0.0,
        }
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Minimum fitness a newcomer must beat: the lowest retained fitness once full, else 0.
    pub fn fitness_threshold(&self) -> f32 {
        self.fitness_threshold
    }

    pub fn best_fitness(&self) -> Option<f32> {
        self.entries.first().map(|entry| entry.fitness)
    }

    pub fn mean_fitness(&self) -> Option<f32> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.entries.iter().map(|e| e.fitness).sum::<f32>() / self.entries.len() as f32)
    }

    /// Offer a dying goopie's brain. Returns whether it was retained.
    pub fn submit(&mut self, brain: BrainSnapshot, fitness: f32) -> bool {
        if !(fitness > self.fitness_threshold) {
            return false;
        }
        self.entries.push(ArchiveEntry { fitness, brain });
        self.entries.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        self.entries.truncate(self.capacity);
        if self.entries.len() >= self.capacity {
            self.fitness_threshold = self.entries.last().map_or(0.0, |e| e.fitness);
        }
        debug!(
            "archived brain with fitness {fitness:.3}, threshold now {:.3}",
            self.fitness_threshold
        );
        true
    }

    /// Softmax of `fitness / temperature` over the entries, in entry order.
    pub fn softmax_weights(&self, temperature: f32) -> Vec<f32> {
        let Some(max) = self.best_fitness() else {
            return Vec::new();
        };
        // Shift by the maximum so the exponentials cannot overflow.
        let raw: Vec<f32> = self
            .entries
            .iter()
            .map(|e| ((e.fitness - max) / temperature).exp())
            .collect();
        let total: f32 = raw.iter().sum();
        raw.into_iter().map(|w| w / total).collect()
    }

    /// Pick an entry with probability given by [`Archive::softmax_weights`].
    pub fn sample(&self, rng: &mut dyn RngCore, temperature: f32) -> Option<&ArchiveEntry> {
        let weights = self.softmax_weights(temperature);
        let index = match WeightedIndex::new(&weights) {
            Ok(distribution) => rng.sample(distribution),
            Err(_) => 0,
        };
        self.entries.get(index)
    }

    /// Brain for a goopie spawned to keep the population up: a fresh random brain with
    /// probability `random_respawn_rate` (or when nothing is archived yet), otherwise a
    /// mutated copy of a sampled ancestor.
    pub fn spawn_brain(
        &self,
        rng: &mut dyn RngCore,
        width: usize,
        config: &SimulationConfig,
    ) -> Result<Box<dyn Brain>, BrainError> {
        let fresh = rng.gen_bool(f64::from(config.random_respawn_rate));
        let ancestor = if fresh {
            None
        } else {
            self.sample(rng, config.sampling_temperature)
        };
        let Some(ancestor) = ancestor else {
            return Ok(Box::new(ConvBrain::random(width, rng)));
        };

        if ancestor.brain.width != width {
            return Err(BrainError::WidthMismatch {
                expected: width,
                found: ancestor.brain.width,
            });
        }
        let mut brain = ConvBrain::from_snapshot(&ancestor.brain)?;
        brain.mutate(rng, config.mutation_probability, config.mutation_amount);
        Ok(Box::new(brain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn snapshot(tag: f32) -> BrainSnapshot {
        BrainSnapshot {
            width: 2,
            parameters: vec![tag; ConvBrain::parameter_count(2)],
        }
    }

    fn fitnesses(archive: &Archive) -> Vec<f32> {
        archive.entries().iter().map(|e| e.fitness).collect()
    }

    fn assert_invariants(archive: &Archive) {
        let values = fitnesses(archive);
        assert!(values.windows(2).all(|w| w[0] >= w[1]));
        assert!(archive.len() <= archive.capacity());
        if archive.len() < archive.capacity() {
            assert_eq!(archive.fitness_threshold(), 0.0);
        } else {
            assert_eq!(Some(archive.fitness_threshold()), values.last().copied());
        }
    }

    #[test]
    fn insertion_keeps_descending_order() {
        let mut archive = Archive::new(10);
        for f in [5.0, 3.0, 1.0] {
            assert!(archive.submit(snapshot(f), f));
        }
        assert!(archive.submit(snapshot(2.0), 2.0));
        assert_eq!(fitnesses(&archive), vec![5.0, 3.0, 2.0, 1.0]);
        assert_eq!(archive.fitness_threshold(), 0.0);
        assert_invariants(&archive);
    }

    #[test]
    fn full_archive_tracks_the_minimum() {
        let mut archive = Archive::new(3);
        for f in [1.0, 4.0, 2.0] {
            archive.submit(snapshot(f), f);
        }
        assert_eq!(archive.fitness_threshold(), 1.0);

        assert!(!archive.submit(snapshot(0.5), 0.5));
        assert!(!archive.submit(snapshot(1.0), 1.0));
        assert!(archive.submit(snapshot(3.0), 3.0));
        assert_eq!(fitnesses(&archive), vec![4.0, 3.0, 2.0]);
        assert_eq!(archive.fitness_threshold(), 2.0);
        assert_invariants(&archive);
    }

    #[test]
    fn zero_fitness_is_never_retained() {
        let mut archive = Archive::new(3);
        assert!(!archive.submit(snapshot(0.0), 0.0));
        assert!(archive.is_empty());
    }

    #[test]
    fn invariants_hold_under_random_submissions() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut archive = Archive::new(10);
        for _ in 0..500 {
            let f = rng.gen_range(0.0f32..5.0);
            archive.submit(snapshot(f), f);
            assert_invariants(&archive);
        }
        assert_eq!(archive.len(), 10);
    }

    #[test]
    fn softmax_weights_favour_the_fittest() {
        let mut archive = Archive::new(10);
        for f in [6.0, 3.0, 0.5] {
            archive.submit(snapshot(f), f);
        }
        let weights = archive.softmax_weights(3.0);
        assert!((weights.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(weights[0] > weights[1] && weights[1] > weights[2]);
        // exp(3/3) = e between the first two.
        assert!((weights[0] / weights[1] - std::f32::consts::E).abs() < 1e-3);
    }

    #[test]
    fn sampling_follows_the_weights() {
        let mut archive = Archive::new(10);
        archive.submit(snapshot(6.0), 6.0);
        archive.submit(snapshot(0.1), 0.1);
        let mut rng = StdRng::seed_from_u64(22);
        let top = (0..2_000)
            .filter(|_| archive.sample(&mut rng, 3.0).map(|e| e.fitness) == Some(6.0))
            .count();
        // Expected share is about 0.88.
        assert!((1_600..=1_900).contains(&top), "top sampled {top} times");
    }

    #[test]
    fn empty_archive_spawns_random_brains() {
        let archive = Archive::new(10);
        let mut rng = StdRng::seed_from_u64(23);
        let config = SimulationConfig {
            random_respawn_rate: 0.0,
            ..SimulationConfig::default()
        };
        let brain = archive.spawn_brain(&mut rng, 10, &config).expect("random brain");
        assert_eq!(brain.snapshot().width, 10);
    }

    #[test]
    fn ancestors_are_cloned_then_mutated() {
        let mut archive = Archive::new(10);
        archive.submit(snapshot(0.25), 1.0);
        let mut rng = StdRng::seed_from_u64(24);

        let exact = SimulationConfig {
            random_respawn_rate: 0.0,
            mutation_probability: 0.0,
            ..SimulationConfig::default()
        };
        let clone = archive.spawn_brain(&mut rng, 2, &exact).expect("clone");
        assert_eq!(clone.snapshot(), snapshot(0.25));

        let mutated = SimulationConfig {
            mutation_probability: 1.0,
            ..exact
        };
        let child = archive.spawn_brain(&mut rng, 2, &mutated).expect("mutated clone");
        assert!(child.snapshot().parameters.iter().all(|p| *p != 0.25));
    }

    #[test]
    fn ancestor_of_another_width_is_an_error() {
        let mut archive = Archive::new(10);
        archive.submit(snapshot(0.25), 1.0);
        let mut rng = StdRng::seed_from_u64(25);
        let config = SimulationConfig {
            random_respawn_rate: 0.0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            archive.spawn_brain(&mut rng, 10, &config),
            Err(BrainError::WidthMismatch { expected: 10, found: 2 })
        ));
    }
}
