//! Data models and provider clients
//!
//! Each provider module contains a client that implements
//! [`Fetcher`](crate::cache::Fetcher) for its cache. The types in this module
//! are the snapshots those caches hold and serve.

pub mod applemusic;
pub mod github;
pub mod request;
pub mod steam;
pub mod strava;

pub use applemusic::{AppleMusicClient, AppleMusicCredentials};
pub use github::{GitHubClient, GitHubCredentials};
pub use steam::{SteamClient, SteamCredentials};
pub use strava::{StravaClient, StravaCredentials};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pinned GitHub repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitHubRepository {
    pub name: String,
    pub owner: String,
    /// Primary language, empty if GitHub detected none
    pub language: String,
    /// Hex color GitHub uses for the language
    pub language_color: String,
    pub description: String,
    pub updated_at: DateTime<Utc>,
    pub stargazers: u32,
    pub id: String,
    pub url: String,
}

/// A song as shown in recently played lists and playlists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppleMusicSong {
    pub track: String,
    pub artist: String,
    pub duration_in_millis: u64,
    /// Album art URL sized to at most 600x600
    pub album_art_url: String,
    pub url: String,
    /// Catalog ID when known, library ID otherwise
    pub id: String,
}

/// A library playlist with every track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppleMusicPlaylist {
    pub name: String,
    pub tracks: Vec<AppleMusicSong>,
    pub last_modified: DateTime<Utc>,
    pub url: String,
    pub id: String,
}

/// Snapshot held by the Apple Music cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppleMusicCache {
    pub recently_played: Vec<AppleMusicSong>,
    pub playlists: Vec<AppleMusicPlaylist>,
}

/// Short form of a playlist for the overview endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppleMusicPlaylistSummary {
    pub name: String,
    pub id: String,
    pub track_count: usize,
    pub first_four_tracks: Vec<AppleMusicSong>,
}

/// Overview body served for the Apple Music cache
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppleMusicOverview {
    pub playlist_summaries: Vec<AppleMusicPlaylistSummary>,
    pub recently_played: Vec<AppleMusicSong>,
}

impl AppleMusicCache {
    /// Builds the overview with each playlist cut down to its first tracks
    pub fn overview(&self) -> AppleMusicOverview {
        let playlist_summaries = self
            .playlists
            .iter()
            .map(|playlist| AppleMusicPlaylistSummary {
                name: playlist.name.clone(),
                id: playlist.id.clone(),
                track_count: playlist.tracks.len(),
                first_four_tracks: playlist.tracks.iter().take(4).cloned().collect(),
            })
            .collect();

        AppleMusicOverview {
            playlist_summaries,
            recently_played: self.recently_played.clone(),
        }
    }

    /// Finds a playlist by its library ID
    pub fn playlist(&self, id: &str) -> Option<&AppleMusicPlaylist> {
        self.playlists.iter().find(|playlist| playlist.id == id)
    }
}

/// A recently played Steam game
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SteamGame {
    pub name: String,
    pub app_id: u32,
    pub icon_url: String,
    pub header_url: String,
    pub url: String,
    /// Total playtime in minutes
    pub playtime_forever: u32,
    pub last_played: DateTime<Utc>,
    /// Percentage of achievements unlocked, if the game has any
    pub achievement_progress: Option<f32>,
    /// Most recently unlocked achievements first
    pub achievements: Option<Vec<SteamAchievement>>,
}

/// A single Steam achievement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SteamAchievement {
    pub api_name: String,
    pub achieved: bool,
    pub icon: String,
    pub display_name: String,
    pub description: Option<String>,
    pub unlock_time: Option<DateTime<Utc>>,
}

/// A Strava activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StravaActivity {
    pub name: String,
    pub sport_type: String,
    pub start_date: DateTime<Utc>,
    pub timezone: String,
    pub has_map: bool,
    /// Meters
    pub total_elevation_gain: f64,
    /// Seconds
    pub moving_time: u32,
    /// Meters
    pub distance: f64,
    pub id: u64,
    pub average_heartrate: f64,
    /// Low resolution heart rate stream in beats per minute
    pub heartrate_data: Vec<u32>,
    pub calories: f64,
}
