//! A thread-safe in-memory cache of feature definitions. [`FeatureStore`] provides concurrent
//! access for readers (feature evaluation) and writers (the polling or streaming thread).
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
};

use crate::Feature;

type Snapshot = HashMap<String, Arc<Feature>>;

/// `FeatureStore` keeps an immutable snapshot of all known features and replaces it on every
/// update, so a reader always sees a consistent set of features.
#[derive(Default)]
pub(crate) struct FeatureStore {
    features: RwLock<Arc<Snapshot>>,
    /// Set by the first update, even an empty one.
    initialized: AtomicBool,
}

impl FeatureStore {
    pub fn new() -> Self {
        FeatureStore::default()
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        // self.features.read() should always return Ok(). Err() is possible only if the lock is
        // poisoned (writer panicked while holding the lock), which should never happen.
        self.features
            .read()
            .expect("thread holding feature store lock should not panic")
            .clone()
    }

    /// Get the feature stored under `key`.
    pub fn get(&self, key: &str) -> Option<Arc<Feature>> {
        self.snapshot().get(key).cloned()
    }

    /// Merge `features` into the store by key. Features missing from the batch keep their
    /// last-known definition.
    pub fn update(&self, features: impl IntoIterator<Item = Feature>) {
        // Wrapping features before requesting the lock to minimize lock span.
        let features: Vec<Arc<Feature>> = features.into_iter().map(Arc::new).collect();
        let updated = features.len();

        let mut slot = self
            .features
            .write()
            .expect("thread holding feature store lock should not panic");
        let mut next = Snapshot::clone(&slot);
        for feature in features {
            next.insert(feature.key.clone(), feature);
        }
        let total = next.len();
        *slot = Arc::new(next);
        self.initialized.store(true, Ordering::Release);
        drop(slot);

        log::debug!(target: "molasses", updated, total; "updated features");
    }

    /// Whether features have been received from the server at least once.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }
}
