//! Result caching for the pipeline.
//!
//! Accepted results are cached forever under a key derived from the
//! paragraph, its language, article reference and topic tags. There is no
//! TTL and no capacity bound: a cached result is never recomputed.

use async_trait::async_trait;
use moka::future::Cache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

use quizforge_core::{CacheKey, QuestionResult};

/// Storage for accepted results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<QuestionResult>;

    async fn set(&self, key: CacheKey, result: QuestionResult);

    async fn has(&self, key: &CacheKey) -> bool;
}

/// In-memory store backed by an unbounded moka cache.
#[derive(Clone)]
pub struct ResultCache {
    cache: Cache<CacheKey, QuestionResult>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().build(),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for ResultCache {
    async fn get(&self, key: &CacheKey) -> Option<QuestionResult> {
        self.cache.get(key).await
    }

    async fn set(&self, key: CacheKey, result: QuestionResult) {
        self.cache.insert(key, result).await;
    }

    async fn has(&self, key: &CacheKey) -> bool {
        self.cache.contains_key(key)
    }
}

/// A store that keeps nothing, for callers that cache elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStore;

#[async_trait]
impl ResultStore for NoStore {
    async fn get(&self, _key: &CacheKey) -> Option<QuestionResult> {
        None
    }

    async fn set(&self, _key: CacheKey, _result: QuestionResult) {}

    async fn has(&self, _key: &CacheKey) -> bool {
        false
    }
}

type FlightLock = Arc<tokio::sync::Mutex<()>>;

/// At most one in-flight computation per key.
///
/// Later callers for the same key wait for the first one to finish, then
/// re-check the store before doing any work themselves.
#[derive(Default)]
pub struct SingleFlight {
    in_flight: Mutex<HashMap<CacheKey, FlightLock>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no one else holds `key`, then hold it.
    pub async fn acquire(&self, key: &CacheKey) -> FlightGuard<'_> {
        let lock = {
            let mut map = self.in_flight.lock();
            map.entry(key.clone()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        FlightGuard {
            owner: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Keys with a holder or waiters.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}

/// Held for the duration of one computation.
pub struct FlightGuard<'a> {
    owner: &'a SingleFlight,
    key: CacheKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut map = self.owner.in_flight.lock();
        if let Some(guard) = self.guard.take() {
            // The map and this guard are the only owners: nobody is waiting
            let idle = map
                .get(&self.key)
                .map(|lock| {
                    Arc::ptr_eq(lock, OwnedMutexGuard::mutex(&guard)) && Arc::strong_count(lock) == 2
                })
                .unwrap_or(false);
            if idle {
                map.remove(&self.key);
            }
            drop(guard);
        }
    }
}
