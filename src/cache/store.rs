//! The in-memory cache holding one provider's snapshot

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use super::detect::{self, Decision};
use super::refresh;
use super::{CacheData, CacheStorage, Fetcher};

/// A consistent copy of a cache's state
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    /// The cached payload
    pub data: T,
    /// When the payload last changed
    pub updated: DateTime<Utc>,
    /// Whether the cache has ever held fetched or persisted data
    pub populated: bool,
}

/// Body served to HTTP clients for a cache
#[derive(Debug, Clone, Serialize)]
pub struct CacheResponse<T> {
    pub data: T,
    pub updated: DateTime<Utc>,
}

/// Borrowed view of the cache state, valid while the read lock is held
#[derive(Debug)]
pub struct CacheView<'a, T> {
    pub data: &'a T,
    pub updated: DateTime<Utc>,
    pub populated: bool,
}

#[derive(Debug)]
struct CacheState<T> {
    data: T,
    /// Canonical rendering of `data`, kept so comparisons never reserialize it
    canonical: Vec<u8>,
    updated: DateTime<Utc>,
    populated: bool,
}

impl<T: CacheData> CacheState<T> {
    fn unpopulated() -> Self {
        let data = T::default();
        let canonical = detect::canonical_bytes(&data).unwrap_or_default();
        Self {
            data,
            canonical,
            updated: Utc::now(),
            populated: false,
        }
    }
}

/// A named, refreshable snapshot of one data source
///
/// All three parts of the state (payload, timestamp, populated flag) change
/// together under one write lock, so readers always see a consistent triple.
/// The write lock is held only for the in-memory swap; comparison and file
/// writes happen outside it.
#[derive(Debug)]
pub struct Cache<T> {
    name: String,
    state: RwLock<CacheState<T>>,
    storage: CacheStorage,
}

impl<T: CacheData> Cache<T> {
    /// Creates a cache, seeding it from disk and then from `initial`
    ///
    /// The persisted file for `name` is loaded first. If `should_commit` is
    /// true, `initial` is then offered as an update and committed if it
    /// differs from what was loaded. Pass `false` when the initial fetch
    /// failed so the cache relies on the persisted file alone.
    pub fn new(
        name: impl Into<String>,
        initial: T,
        should_commit: bool,
        storage: CacheStorage,
    ) -> Self {
        let name = name.into();
        let mut state = CacheState::unpopulated();

        if let Some(stored) = storage.load::<T>(&name) {
            match detect::canonical_bytes(&stored.data) {
                Ok(canonical) => {
                    tracing::info!(cache = %name, "loaded persisted snapshot");
                    state = CacheState {
                        data: stored.data,
                        canonical,
                        updated: stored.modified.unwrap_or_else(Utc::now),
                        populated: true,
                    };
                }
                Err(e) => {
                    tracing::error!(
                        cache = %name,
                        error = %e,
                        "failed to serialize persisted snapshot"
                    );
                }
            }
        }

        let cache = Self {
            name,
            state: RwLock::new(state),
            storage,
        };

        if should_commit {
            if let Err(e) = cache.update(initial) {
                tracing::error!(
                    cache = %cache.name,
                    error = %e,
                    "failed to serialize initial data"
                );
            }
        }

        cache
    }

    /// Creates a cache after one synchronous fetch attempt
    ///
    /// A failed fetch is logged and the cache falls back to its persisted
    /// file, if any.
    pub async fn bootstrap<F>(
        name: impl Into<String>,
        storage: CacheStorage,
        fetcher: &F,
        fetch_timeout: Duration,
    ) -> Arc<Self>
    where
        F: Fetcher<Data = T>,
    {
        let name = name.into();
        match refresh::fetch_with_timeout(fetcher, fetch_timeout).await {
            Ok(data) => Arc::new(Self::new(name, data, true, storage)),
            Err(e) => {
                refresh::report(&name, &e, "initial fetch failed");
                Arc::new(Self::new(name, T::default(), false, storage))
            }
        }
    }

    /// The cache's name, used for logs and the storage file
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a copy of the current state
    pub fn read(&self) -> Snapshot<T> {
        let state = self.read_state();
        Snapshot {
            data: state.data.clone(),
            updated: state.updated,
            populated: state.populated,
        }
    }

    /// The `{ data, updated }` body for HTTP responses
    pub fn response(&self) -> CacheResponse<T> {
        let snapshot = self.read();
        CacheResponse {
            data: snapshot.data,
            updated: snapshot.updated,
        }
    }

    /// Runs `f` against the current state without cloning the payload
    pub fn view<R>(&self, f: impl FnOnce(CacheView<'_, T>) -> R) -> R {
        let state = self.read_state();
        f(CacheView {
            data: &state.data,
            updated: state.updated,
            populated: state.populated,
        })
    }

    /// Whether the cache has ever held fetched or persisted data
    pub fn is_populated(&self) -> bool {
        self.read_state().populated
    }

    /// Offers a freshly fetched snapshot to the cache
    ///
    /// The candidate replaces the current payload only if the change detector
    /// accepts it. A committed update is then written to disk; a failed write
    /// is logged and the in-memory update stands.
    pub fn update(&self, candidate: T) -> Result<Decision, serde_json::Error> {
        let canonical = detect::canonical_bytes(&candidate)?;

        let decision = {
            let state = self.read_state();
            detect::decide(&state.canonical, &canonical, state.populated)
        };

        if !decision.should_commit() {
            if decision == Decision::RejectedEmpty {
                tracing::warn!(cache = %self.name, "ignoring empty response over populated cache");
            } else {
                tracing::debug!(cache = %self.name, "no change");
            }
            return Ok(decision);
        }

        {
            let mut state = self.write_state();
            state.data = candidate;
            state.canonical = canonical;
            state.updated = Utc::now();
            state.populated = true;
        }

        self.persist();
        tracing::info!(cache = %self.name, "cache updated");
        Ok(decision)
    }

    fn persist(&self) {
        let state = self.read_state();
        if let Err(e) = self.storage.save(&self.name, &state.data) {
            tracing::error!(
                cache = %self.name,
                path = %self.storage.path_for(&self.name).display(),
                error = %e,
                "failed to persist cache"
            );
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CacheState<T>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState<T>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
