//! Victim selection for a full handle pool.

use crate::config::EvictionPolicy;
use log::trace;
use lru::LruCache;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::num::NonZeroUsize;

/// Tracks whatever the configured policy needs to pick a slot to reclaim
#[derive(Debug)]
pub(crate) enum Evictor {
    Random { rng: StdRng, capacity: usize },
    /// Recency of slot indices; the least recent is the victim
    Lru(LruCache<usize, ()>),
}

impl Evictor {
    pub(crate) fn new(policy: EvictionPolicy, capacity: NonZeroUsize, seed: Option<u64>) -> Self {
        match policy {
            EvictionPolicy::Random => Self::Random {
                rng: match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                },
                capacity: capacity.get(),
            },
            EvictionPolicy::Lru => Self::Lru(LruCache::new(capacity)),
        }
    }

    /// Record that a slot was just used
    pub(crate) fn touch(&mut self, slot: usize) {
        if let Self::Lru(recency) = self {
            recency.put(slot, ());
        }
    }

    /// Record that a slot was closed
    pub(crate) fn forget(&mut self, slot: usize) {
        if let Self::Lru(recency) = self {
            recency.pop(&slot);
        }
    }

    /// Pick the slot to reclaim. Only called when every slot is open.
    pub(crate) fn victim(&mut self) -> usize {
        let slot = match self {
            Self::Random { rng, capacity } => rng.gen_range(0..*capacity),
            Self::Lru(recency) => recency.peek_lru().map(|(slot, _)| *slot).unwrap_or(0),
        };
        trace!("Eviction picked slot {slot}");
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_lru_picks_least_recent() {
        let mut evictor = Evictor::new(EvictionPolicy::Lru, cap(3), None);
        evictor.touch(0);
        evictor.touch(1);
        evictor.touch(2);
        evictor.touch(0);
        assert_eq!(evictor.victim(), 1);

        evictor.forget(1);
        assert_eq!(evictor.victim(), 2);
    }

    #[test]
    fn test_random_stays_in_range_and_is_seedable() {
        let mut a = Evictor::new(EvictionPolicy::Random, cap(4), Some(7));
        let mut b = Evictor::new(EvictionPolicy::Random, cap(4), Some(7));
        for _ in 0..100 {
            let slot = a.victim();
            assert!(slot < 4);
            assert_eq!(slot, b.victim());
        }
    }
}
