//! Background refresh loop
//!
//! Each cache gets one tokio task that sleeps for a fixed interval, fetches,
//! and offers the result to the cache. Cycles never overlap, so commits for a
//! cache happen in the order their fetches finished.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::detect::Decision;
use super::{Cache, ErrorClass, FetchError, Fetcher};

/// Default upper bound on a single fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Timing for one cache's refresh loop
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Sleep between the end of one cycle and the start of the next
    pub interval: Duration,
    /// Upper bound on a single fetch
    pub fetch_timeout: Duration,
}

impl RefreshConfig {
    /// Refreshes every `interval` with the default fetch timeout
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Overrides the fetch timeout
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self::every(Duration::from_secs(60))
    }
}

/// What a single refresh cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new snapshot was committed and persisted
    Committed,
    /// The fetched snapshot matched the cached one
    Unchanged,
    /// The fetched snapshot was empty and the cache kept its data
    RejectedEmpty,
    /// The fetch failed; the cache was left untouched
    Skipped(ErrorClass),
}

impl From<Decision> for CycleOutcome {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Commit => CycleOutcome::Committed,
            Decision::Unchanged => CycleOutcome::Unchanged,
            Decision::RejectedEmpty => CycleOutcome::RejectedEmpty,
        }
    }
}

/// Runs a fetch, turning an elapsed deadline into [`FetchError::Timeout`]
pub async fn fetch_with_timeout<F: Fetcher>(
    fetcher: &F,
    timeout: Duration,
) -> Result<F::Data, FetchError> {
    match tokio::time::timeout(timeout, fetcher.fetch()).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout)),
    }
}

/// Logs a fetch failure at the severity its class calls for
pub(crate) fn report(name: &str, err: &FetchError, context: &str) {
    if err.is_ignorable() {
        tracing::warn!(cache = %name, error = %err, "{context}");
    } else {
        tracing::error!(cache = %name, error = %err, "{context}");
    }
}

/// Runs one fetch-and-update cycle
pub async fn run_cycle<F: Fetcher>(
    cache: &Cache<F::Data>,
    fetcher: &F,
    fetch_timeout: Duration,
) -> CycleOutcome {
    let data = match fetch_with_timeout(fetcher, fetch_timeout).await {
        Ok(data) => data,
        Err(e) => {
            report(cache.name(), &e, "refresh failed");
            return CycleOutcome::Skipped(e.class());
        }
    };

    match cache.update(data) {
        Ok(decision) => decision.into(),
        Err(e) => {
            tracing::error!(cache = %cache.name(), error = %e, "failed to serialize fetched data");
            CycleOutcome::Skipped(ErrorClass::Fatal)
        }
    }
}

/// Spawns the refresh loop for `cache`
///
/// The loop runs until the runtime shuts down. Dropping the returned handle
/// detaches the task without stopping it.
pub fn spawn<F: Fetcher>(
    cache: Arc<Cache<F::Data>>,
    fetcher: F,
    config: RefreshConfig,
) -> JoinHandle<()> {
    tracing::debug!(
        cache = %cache.name(),
        interval = ?config.interval,
        fetch_timeout = ?config.fetch_timeout,
        "starting refresh loop"
    );
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(config.interval).await;
            run_cycle(&cache, &fetcher, config.fetch_timeout).await;
        }
    })
}
