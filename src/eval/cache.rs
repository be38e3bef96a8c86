//! Process-lifetime memoization of evaluations.
//!
//! An explicit cache service constructed once at startup and handed into
//! the request path, with no hidden global state. Entries are keyed by the
//! exact (question, answer) pair and expire logically after the TTL:
//! expired entries are not served and are overwritten on the next write
//! for the same key. LRU capacity bounds memory under high key
//! cardinality. The clock is injected so tests can drive expiry
//! deterministically.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::EvaluationResult;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CacheEntry {
    result: EvaluationResult,
    created: Instant,
}

pub struct EvaluationCache {
    entries: Mutex<LruCache<(String, String), CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl EvaluationCache {
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to >= 1");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            clock,
        }
    }

    /// Fresh hit or nothing: an entry older than the TTL is dropped and
    /// reported as a miss.
    pub fn get(&self, question: &str, answer: &str) -> Option<EvaluationResult> {
        let key = (question.to_string(), answer.to_string());
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(entry) if self.clock.now().duration_since(entry.created) < self.ttl => {
                Some(entry.result.clone())
            }
            Some(_) => {
                entries.pop(&key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, question: &str, answer: &str, result: EvaluationResult) {
        let key = (question.to_string(), answer.to_string());
        let entry = CacheEntry {
            result,
            created: self.clock.now(),
        };
        self.entries.lock().put(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    /// Manually-advanced clock for expiry tests.
    pub struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }
        }

        pub fn advance(&self, by: Duration) {
            *self.offset.lock() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock()
        }
    }
}
