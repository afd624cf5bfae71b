//! Command-line and environment configuration
//!
//! Every flag can also be set through an `LCP_`-prefixed environment variable,
//! which is how the service is normally deployed. A provider is enabled only
//! when all of its credentials are present.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::cache::CacheStorage;
use crate::data::{AppleMusicCredentials, GitHubCredentials, SteamCredentials, StravaCredentials};

/// Error types for configuration validation
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The bind address could not be parsed
    #[error("Invalid bind address '{0}': expected HOST:PORT")]
    InvalidBind(String),

    /// Some but not all of a provider's credentials were given
    #[error("Incomplete {provider} configuration: missing {missing}")]
    IncompleteProvider {
        provider: &'static str,
        missing: &'static str,
    },

    /// The fetch timeout must be positive
    #[error("Fetch timeout must be at least one second")]
    ZeroTimeout,
}

/// Personal activity cache - serves GitHub, Apple Music, Steam and Strava data
#[derive(Parser, Debug, Default)]
#[command(name = "lcp")]
#[command(about = "Caches personal activity data and serves it over HTTP")]
#[command(version)]
pub struct Cli {
    /// Directory for persisted cache snapshots [default: platform cache dir]
    #[arg(long, env = "LCP_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "LCP_BIND", default_value = "0.0.0.0:8000", value_name = "HOST:PORT")]
    pub bind: String,

    /// Bearer token required on every route except /health
    #[arg(long, env = "LCP_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Seconds before an upstream fetch is abandoned
    #[arg(long, env = "LCP_FETCH_TIMEOUT_SECS", default_value_t = 60, value_name = "SECS")]
    pub fetch_timeout_secs: u64,

    /// GitHub personal access token
    #[arg(long, env = "LCP_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Apple Music developer token
    #[arg(long, env = "LCP_APPLE_MUSIC_APP_TOKEN", hide_env_values = true)]
    pub apple_music_app_token: Option<String>,

    /// Apple Music user token
    #[arg(long, env = "LCP_APPLE_MUSIC_USER_TOKEN", hide_env_values = true)]
    pub apple_music_user_token: Option<String>,

    /// Library playlist IDs to cache, comma separated
    #[arg(long, env = "LCP_APPLE_MUSIC_PLAYLISTS", value_delimiter = ',', value_name = "IDS")]
    pub apple_music_playlists: Vec<String>,

    /// Steam Web API key
    #[arg(long, env = "LCP_STEAM_KEY", hide_env_values = true)]
    pub steam_key: Option<String>,

    /// 64-bit Steam ID
    #[arg(long, env = "LCP_STEAM_ID")]
    pub steam_id: Option<String>,

    /// Strava OAuth client ID
    #[arg(long, env = "LCP_STRAVA_CLIENT_ID")]
    pub strava_client_id: Option<String>,

    /// Strava OAuth client secret
    #[arg(long, env = "LCP_STRAVA_CLIENT_SECRET", hide_env_values = true)]
    pub strava_client_secret: Option<String>,

    /// Strava OAuth refresh token
    #[arg(long, env = "LCP_STRAVA_REFRESH_TOKEN", hide_env_values = true)]
    pub strava_refresh_token: Option<String>,
}

/// Validated service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub bind: SocketAddr,
    pub access_token: Option<String>,
    pub fetch_timeout: Duration,
    pub github: Option<GitHubCredentials>,
    pub apple_music: Option<AppleMusicCredentials>,
    pub steam: Option<SteamCredentials>,
    pub strava: Option<StravaCredentials>,
}

impl Config {
    /// Validates parsed CLI arguments into a Config.
    ///
    /// # Arguments
    /// * `cli` - The parsed CLI struct
    ///
    /// # Returns
    /// * `Ok(Config)` with each provider enabled only if fully configured
    /// * `Err(ConfigError)` if the bind address is invalid or a provider is
    ///   partially configured
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let bind = cli
            .bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(cli.bind.clone()))?;

        if cli.fetch_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let cache_dir = cli
            .cache_dir
            .clone()
            .or_else(CacheStorage::default_dir)
            .unwrap_or_else(|| PathBuf::from("cache"));

        let github = non_blank(&cli.github_token).map(|token| GitHubCredentials { token });

        let playlist_ids: Vec<String> = cli
            .apple_music_playlists
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        let apple_music = match (
            non_blank(&cli.apple_music_app_token),
            non_blank(&cli.apple_music_user_token),
        ) {
            (Some(app_token), Some(user_token)) => Some(AppleMusicCredentials {
                app_token,
                user_token,
                playlist_ids,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(incomplete("apple music", "user token")),
            (None, Some(_)) => return Err(incomplete("apple music", "app token")),
        };

        let steam = match (non_blank(&cli.steam_key), non_blank(&cli.steam_id)) {
            (Some(key), Some(steam_id)) => Some(SteamCredentials { key, steam_id }),
            (None, None) => None,
            (Some(_), None) => return Err(incomplete("steam", "steam id")),
            (None, Some(_)) => return Err(incomplete("steam", "api key")),
        };

        let strava = match (
            non_blank(&cli.strava_client_id),
            non_blank(&cli.strava_client_secret),
            non_blank(&cli.strava_refresh_token),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Some(StravaCredentials {
                client_id,
                client_secret,
                refresh_token,
            }),
            (None, None, None) => None,
            (None, _, _) => return Err(incomplete("strava", "client id")),
            (_, None, _) => return Err(incomplete("strava", "client secret")),
            (_, _, None) => return Err(incomplete("strava", "refresh token")),
        };

        Ok(Config {
            cache_dir,
            bind,
            access_token: non_blank(&cli.access_token),
            fetch_timeout: Duration::from_secs(cli.fetch_timeout_secs),
            github,
            apple_music,
            steam,
            strava,
        })
    }

    /// Storage rooted at the configured cache directory
    pub fn storage(&self) -> CacheStorage {
        CacheStorage::with_dir(self.cache_dir.clone())
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn incomplete(provider: &'static str, missing: &'static str) -> ConfigError {
    ConfigError::IncompleteProvider { provider, missing }
}
