//! A seeded, deterministic source of randomness used solely to shuffle
//! counter-example processing order in the bisimulation engine. Nothing
//! else in this crate consults randomness.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub struct DeterministicRng(StdRng);

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        DeterministicRng(StdRng::seed_from_u64(seed))
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.0);
    }
}
