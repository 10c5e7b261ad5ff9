//! In-memory cache of fitted models, shared across requests of one session.

use std::sync::Arc;

use dashmap::DashMap;

use super::order::OrderSelection;
use super::sarima::FittedSarima;

/// Identifies one fit: the series content, the seasonal period and how the
/// order was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub series_hash: u64,
    pub seasonal_period: usize,
    pub selection: OrderSelection,
}

/// Concurrent map from [`CacheKey`] to fitted model. Fitting happens outside
/// the map; when two threads race on one key the first insert wins.
#[derive(Debug, Default)]
pub struct ModelCache {
    models: DashMap<CacheKey, Arc<FittedSarima>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<FittedSarima>> {
        self.models.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Store `model` unless the key is already present, returning the cached
    /// entry either way.
    pub fn insert(&self, key: CacheKey, model: FittedSarima) -> Arc<FittedSarima> {
        Arc::clone(self.models.entry(key).or_insert_with(|| Arc::new(model)).value())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
