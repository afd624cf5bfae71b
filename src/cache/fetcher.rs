//! The seam between a cache and the provider that fills it

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use super::FetchError;

/// Payload types a cache can hold
///
/// `Default` is the value an unpopulated cache serves.
pub trait CacheData:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
}

impl<T> CacheData for T where
    T: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
}

/// A source of fresh snapshots for one cache
///
/// The implementing value is the provider's handle (HTTP client, tokens,
/// settings) and is reused unchanged for every refresh cycle.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// The snapshot type this fetcher produces
    type Data: CacheData;

    /// Fetches a complete snapshot from upstream
    async fn fetch(&self) -> Result<Self::Data, FetchError>;
}
