//! Service assembly
//!
//! Wires each enabled provider to a cache, starts its refresh loop, and mounts
//! its routes. The `App` owns the refresh tasks; dropping it stops them.

use axum::Router;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::cache::{refresh, Cache, CacheStorage, Fetcher, RefreshConfig};
use crate::cli::Config;
use crate::data::{AppleMusicClient, GitHubClient, SteamClient, StravaClient};
use crate::server;

/// Refresh interval for pinned GitHub repositories
pub const GITHUB_INTERVAL: Duration = Duration::from_secs(60);
/// Refresh interval for Apple Music listening data
pub const APPLE_MUSIC_INTERVAL: Duration = Duration::from_secs(30);
/// Refresh interval for Steam games
pub const STEAM_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Refresh interval for Strava activities
pub const STRAVA_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// The running set of caches and their routes
pub struct App {
    storage: CacheStorage,
    fetch_timeout: Duration,
    routes: Router,
    refreshers: Vec<JoinHandle<()>>,
    caches: Vec<String>,
}

impl App {
    /// Creates an App with no caches
    pub fn new(storage: CacheStorage, fetch_timeout: Duration) -> Self {
        Self {
            storage,
            fetch_timeout,
            routes: Router::new(),
            refreshers: Vec::new(),
            caches: Vec::new(),
        }
    }

    /// Starts every provider that `config` enables
    ///
    /// Each cache is bootstrapped with one fetch before the next provider is
    /// set up, so a slow upstream delays startup by at most the fetch timeout.
    pub async fn from_config(config: &Config, client: Client) -> Self {
        let mut app = Self::new(config.storage(), config.fetch_timeout);

        if let Some(credentials) = &config.github {
            let fetcher = GitHubClient::new(client.clone(), credentials.clone());
            app = app.with_cache("github", fetcher, GITHUB_INTERVAL).await;
        }
        if let Some(credentials) = &config.apple_music {
            let fetcher = AppleMusicClient::new(client.clone(), credentials.clone());
            app = app.with_apple_music(fetcher).await;
        }
        if let Some(credentials) = &config.steam {
            let fetcher = SteamClient::new(client.clone(), credentials.clone());
            app = app.with_cache("steam", fetcher, STEAM_INTERVAL).await;
        }
        if let Some(credentials) = &config.strava {
            let fetcher = StravaClient::new(client.clone(), credentials.clone());
            app = app.with_cache("strava", fetcher, STRAVA_INTERVAL).await;
        }

        if app.caches.is_empty() {
            tracing::warn!("no providers configured; only /health will be served");
        }
        app
    }

    /// Adds a cache named `name`, served at `/<name>`
    pub async fn with_cache<F: Fetcher>(
        mut self,
        name: &str,
        fetcher: F,
        interval: Duration,
    ) -> Self {
        let cache = self.start(name, fetcher, interval).await;
        let routes = std::mem::take(&mut self.routes);
        self.routes = routes.merge(server::cache_routes(&format!("/{name}"), cache));
        self
    }

    /// Adds the Apple Music cache with its overview and playlist routes
    pub async fn with_apple_music(mut self, fetcher: AppleMusicClient) -> Self {
        let cache = self.start("applemusic", fetcher, APPLE_MUSIC_INTERVAL).await;
        let routes = std::mem::take(&mut self.routes);
        self.routes = routes.merge(server::apple_music_routes(cache));
        self
    }

    async fn start<F: Fetcher>(
        &mut self,
        name: &str,
        fetcher: F,
        interval: Duration,
    ) -> Arc<Cache<F::Data>> {
        let storage = self.storage.clone();
        let cache = Cache::bootstrap(name, storage, &fetcher, self.fetch_timeout).await;
        let config = RefreshConfig::every(interval).with_fetch_timeout(self.fetch_timeout);
        self.refreshers.push(refresh::spawn(Arc::clone(&cache), fetcher, config));
        self.caches.push(name.to_string());
        tracing::info!(cache = %name, populated = cache.is_populated(), "setup cache");
        cache
    }

    /// Names of the caches this App is running
    pub fn caches(&self) -> &[String] {
        &self.caches
    }

    /// The complete router, with bearer auth when `access_token` is set
    pub fn router(&self, access_token: Option<String>) -> Router {
        server::router(self.routes.clone(), access_token)
    }

    /// Serves HTTP on `listener` until the process exits
    pub async fn serve(
        self,
        listener: TcpListener,
        access_token: Option<String>,
    ) -> std::io::Result<()> {
        let router = self.router(access_token);
        axum::serve(listener, router).await
    }
}

impl Drop for App {
    fn drop(&mut self) {
        for handle in &self.refreshers {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FetchError;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct Fixed(Vec<String>);

    #[async_trait]
    impl Fetcher for Fixed {
        type Data = Vec<String>;

        async fn fetch(&self) -> Result<Self::Data, FetchError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl Fetcher for Broken {
        type Data = Vec<String>;

        async fn fetch(&self) -> Result<Self::Data, FetchError> {
            Err(FetchError::Upstream("down".to_string()))
        }
    }

    async fn status_of(router: Router, uri: &str) -> StatusCode {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_with_cache_mounts_route() {
        let dir = TempDir::new().unwrap();
        let app = App::new(CacheStorage::with_dir(dir.path().to_path_buf()), Duration::from_secs(1))
            .with_cache("words", Fixed(vec!["hello".to_string()]), Duration::from_secs(3600))
            .await;

        assert_eq!(app.caches().to_vec(), vec!["words".to_string()]);
        assert_eq!(status_of(app.router(None), "/words").await, StatusCode::OK);
        assert!(dir.path().join("words.json").exists());
    }

    #[tokio::test]
    async fn test_failed_bootstrap_serves_unavailable() {
        let dir = TempDir::new().unwrap();
        let app = App::new(CacheStorage::with_dir(dir.path().to_path_buf()), Duration::from_secs(1))
            .with_cache("broken", Broken, Duration::from_secs(3600))
            .await;

        assert_eq!(status_of(app.router(None), "/broken").await, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_failed_bootstrap_uses_persisted_snapshot() {
        let dir = TempDir::new().unwrap();
        let storage = CacheStorage::with_dir(dir.path().to_path_buf());
        storage.save("broken", &vec!["from disk".to_string()]).unwrap();

        let app = App::new(storage, Duration::from_secs(1))
            .with_cache("broken", Broken, Duration::from_secs(3600))
            .await;

        assert_eq!(status_of(app.router(None), "/broken").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_from_config_without_providers() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            cache_dir: dir.path().to_path_buf(),
            bind: "127.0.0.1:0".parse().unwrap(),
            access_token: None,
            fetch_timeout: Duration::from_secs(1),
            github: None,
            apple_music: None,
            steam: None,
            strava: None,
        };

        let app = App::from_config(&config, Client::new()).await;

        assert!(app.caches().is_empty());
        assert_eq!(status_of(app.router(None), "/health").await, StatusCode::OK);
        assert_eq!(status_of(app.router(None), "/github").await, StatusCode::NOT_FOUND);
    }
}
