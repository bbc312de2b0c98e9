//! Simulated environment with a manual clock and seeded RNG.
//!
//! Time only moves when a test calls [`SimEnv::advance`] (or awaits
//! [`Environment::sleep`]), and every identifier comes from a seeded ChaCha
//! stream, so a run is fully reproducible from its seed.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use parley_core::env::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Deterministic environment for simulation.
///
/// Clones share the same clock and RNG.
#[derive(Clone)]
pub struct SimEnv {
    base: Instant,
    elapsed: Arc<Mutex<Duration>>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Create an environment whose RNG is seeded with `seed`.
    #[allow(clippy::disallowed_methods)]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            base: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
        *elapsed += by;
    }

    /// Virtual time since creation.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Environment for SimEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
