//! Refreshable cache engine
//!
//! This module holds the typed snapshot for each data source, refreshes it in
//! the background, commits only meaningful changes, and persists committed
//! snapshots to disk so a restart can serve the last known data. Fetch
//! failures are classified and logged; none of them ever reach the cached
//! data or stop the refresh loop.

pub mod detect;
mod error;
mod fetcher;
pub mod refresh;
mod storage;
mod store;

pub use detect::Decision;
pub use error::{ErrorClass, FetchError};
pub use fetcher::{CacheData, Fetcher};
pub use refresh::{CycleOutcome, RefreshConfig};
pub use storage::{CacheStorage, StoredSnapshot};
pub use store::{Cache, CacheResponse, CacheView, Snapshot};
