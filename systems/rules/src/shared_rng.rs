//! Random source shared by every command and by game setup.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Thread-safe handle onto a single random generator.
///
/// Clones share the same generator state.
#[derive(Clone, Debug)]
pub struct SharedRng {
    inner: Arc<Mutex<ChaCha8Rng>>,
}

impl SharedRng {
    /// Creates a reproducible generator from `seed`.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Creates a generator seeded from the operating system.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::from_rng(ChaCha8Rng::from_entropy())
    }

    fn from_rng(rng: ChaCha8Rng) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rng)),
        }
    }

    /// Runs `f` with exclusive access to the generator.
    pub fn with<T>(&self, f: impl FnOnce(&mut ChaCha8Rng) -> T) -> T {
        f(&mut self.inner.lock())
    }
}
