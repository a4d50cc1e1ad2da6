//! Scenario run configuration.

/// Configuration for a scenario run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Length of seeded random value lists
    pub random_values: usize,

    /// Largest acceptable real/virtual time ratio for clock-driven scenarios
    pub max_real_ratio: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            random_values: 32,
            max_real_ratio: 0.1,
        }
    }
}

impl SimConfig {
    /// Sets the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the random value list length.
    pub fn with_random_values(mut self, len: usize) -> Self {
        self.random_values = len;
        self
    }

    /// Sets the real/virtual time ratio limit.
    pub fn with_max_real_ratio(mut self, ratio: f64) -> Self {
        self.max_real_ratio = ratio;
        self
    }
}
