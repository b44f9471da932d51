use std::collections::HashMap;

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Uniform random provider consumed by the resolver and the scheduler.
pub trait RandomSource {
    /// Integer drawn uniformly from `[low, high]`.
    fn uniform_int(&mut self, low: i64, high: i64) -> i64;
    /// Float drawn uniformly from `[0, 1)`.
    fn uniform_float01(&mut self) -> f64;
}

impl<R: Rng> RandomSource for R {
    fn uniform_int(&mut self, low: i64, high: i64) -> i64 {
        if high <= low {
            return low;
        }
        self.gen_range(low..=high)
    }

    fn uniform_float01(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Named deterministic streams derived from one master seed.
pub struct RngManager {
    master: ChaCha8Rng,
    streams: HashMap<String, ChaCha8Rng>,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self {
            master: ChaCha8Rng::seed_from_u64(seed),
            streams: HashMap::new(),
        }
    }

    /// The stream called `name`, seeded from the master on first use.
    pub fn stream(&mut self, name: &str) -> &mut ChaCha8Rng {
        let master = &mut self.master;
        self.streams
            .entry(name.to_string())
            .or_insert_with(|| ChaCha8Rng::seed_from_u64(master.next_u64()))
    }
}
