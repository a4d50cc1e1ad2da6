//! Deterministic payload provider for scenario streams.

use crate::fixtures::User;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

const FIRST_NAMES: &[&str] = &["Skyler", "Jesse", "Walter", "Saul", "Hank", "Marie", "Gus", "Mike"];
const LAST_NAMES: &[&str] = &["White", "Pinkman", "Goodman", "Schrader", "Fring", "Ehrmantraut"];

/// Provides deterministic stream payloads derived from seeds.
///
/// Scenario streams must replay identically on every subscription and on
/// every run with the same seed. Payload lists are:
/// - Deterministic: Same seed and stream id always produce the same list
/// - Unique: Each stream id gets its own sequence
/// - Isolated: Asking for a longer list keeps the shorter list as a prefix
pub struct DeterministicPayloads {
    /// Master seed
    master_seed: u64,

    /// Cache of generated value lists by stream id
    value_cache: HashMap<u64, Vec<i64>>,
}

impl DeterministicPayloads {
    /// Creates a new provider with the given master seed.
    pub fn new(master_seed: u64) -> Self {
        Self {
            master_seed,
            value_cache: HashMap::new(),
        }
    }

    /// Returns the master seed.
    pub fn seed(&self) -> u64 {
        self.master_seed
    }

    fn rng_for(&self, stream_id: u64, salt: u64) -> ChaCha8Rng {
        // Derive a unique seed per stream: master_seed * golden-ratio prime + id * prime
        let seed = self
            .master_seed
            .wrapping_mul(0x9e3779b97f4a7c15)
            .wrapping_add(stream_id.wrapping_mul(0x517cc1b727220a95))
            ^ salt;
        ChaCha8Rng::seed_from_u64(seed)
    }

    /// Returns `len` values for stream `stream_id`.
    pub fn values(&mut self, stream_id: u64, len: usize) -> Vec<i64> {
        if let Some(cached) = self.value_cache.get(&stream_id) {
            if cached.len() >= len {
                return cached[..len].to_vec();
            }
        }

        let mut rng = self.rng_for(stream_id, 0);
        let values: Vec<i64> = (0..len).map(|_| rng.gen_range(-1_000_000..=1_000_000)).collect();

        self.value_cache.insert(stream_id, values.clone());
        values
    }

    /// Returns `count` users for stream `stream_id`.
    ///
    /// Usernames follow the first-initial-plus-last-name convention and are
    /// suffixed with their position so they stay distinct.
    pub fn users(&self, stream_id: u64, count: usize) -> Vec<User> {
        let mut rng = self.rng_for(stream_id, 0x3c6ef372fe94f82b);
        (0..count)
            .map(|i| {
                let first = FIRST_NAMES.choose(&mut rng).copied().unwrap_or("Skyler");
                let last = LAST_NAMES.choose(&mut rng).copied().unwrap_or("White");
                let initial = first.chars().next().unwrap_or('x').to_ascii_lowercase();
                User::new(format!("{}{}{}", initial, last.to_lowercase(), i), first, last)
            })
            .collect()
    }
}
