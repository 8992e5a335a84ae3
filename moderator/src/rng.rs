//! The one seeded random source a match draws from.
//!
//! The scheduler and any rule-based agents share a single [`MatchRng`]
//! handle, so a whole match replays identically from the same seed and the
//! same agent decisions.

use std::sync::{Arc, Mutex, MutexGuard};

use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Saved generator position, taken before a phase so it can be rewound.
#[derive(Debug, Clone)]
pub struct RngCheckpoint(ChaCha8Rng);

/// Shared, cloneable handle to a seeded ChaCha8 stream.
#[derive(Debug, Clone)]
pub struct MatchRng {
    seed: u64,
    inner: Arc<Mutex<ChaCha8Rng>>,
}

impl MatchRng {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed,
            inner: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn lock(&self) -> MutexGuard<'_, ChaCha8Rng> {
        // A poisoned lock still holds a valid generator.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Uniform pick from `items`, `None` when empty.
    pub fn choose<T: Copy>(&self, items: &[T]) -> Option<T> {
        items.choose(&mut *self.lock()).copied()
    }

    pub fn gen_range<T, R>(&self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.lock().gen_range(range)
    }

    pub fn gen_bool(&self, p: f64) -> bool {
        self.lock().gen_bool(p)
    }

    pub fn checkpoint(&self) -> RngCheckpoint {
        RngCheckpoint(self.lock().clone())
    }

    /// Rewind to `checkpoint`. Every clone of this handle observes the rewind.
    pub fn restore(&self, checkpoint: RngCheckpoint) {
        *self.lock() = checkpoint.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_choices() {
        let items = [3, 5, 7, 9];
        let a = MatchRng::seeded(42);
        let b = MatchRng::seeded(42);
        let picks_a: Vec<_> = (0..16).map(|_| a.choose(&items)).collect();
        let picks_b: Vec<_> = (0..16).map(|_| b.choose(&items)).collect();
        assert_eq!(picks_a, picks_b);
    }

    #[test]
    fn clones_share_one_stream() {
        let a = MatchRng::seeded(7);
        let b = a.clone();
        let reference = MatchRng::seeded(7);
        let x: u32 = a.gen_range(0..1_000_000);
        let y: u32 = b.gen_range(0..1_000_000);
        assert_eq!(x, reference.gen_range(0..1_000_000));
        assert_eq!(y, reference.gen_range(0..1_000_000));
    }

    #[test]
    fn restore_rewinds_every_handle() {
        let rng = MatchRng::seeded(1);
        let other = rng.clone();
        let checkpoint = rng.checkpoint();
        let first: u64 = rng.gen_range(0..u64::MAX);
        other.restore(checkpoint);
        assert_eq!(rng.gen_range(0..u64::MAX), first);
    }

    #[test]
    fn choose_on_empty_is_none() {
        let rng = MatchRng::seeded(0);
        let empty: [u32; 0] = [];
        assert_eq!(rng.choose(&empty), None);
        assert_eq!(rng.seed(), 0);
    }
}
