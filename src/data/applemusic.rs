//! Apple Music API client
//!
//! Fetches recently played tracks and a configured set of library playlists.
//! Requests carry both the developer token and the user's music token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;

use super::request::send_json;
use super::{AppleMusicCache, AppleMusicPlaylist, AppleMusicSong};
use crate::cache::{FetchError, Fetcher};

/// Base URL for the Apple Music API
const APPLE_MUSIC_BASE_URL: &str = "https://api.music.apple.com";

/// Largest album art edge requested, in pixels
const MAX_ALBUM_ART_SIZE: u32 = 600;

/// Number of recently played songs kept after de-duplication
const RECENTLY_PLAYED_LIMIT: usize = 10;

/// Upper bound on track pages followed for one playlist
const MAX_TRACK_PAGES: usize = 100;

/// Credentials and settings for the Apple Music API
#[derive(Debug, Clone)]
pub struct AppleMusicCredentials {
    /// Developer token (JWT signed with the MusicKit key)
    pub app_token: String,
    /// Music user token for the library being read
    pub user_token: String,
    /// Library playlist IDs to cache, in display order
    pub playlist_ids: Vec<String>,
}

/// Client for the Apple Music library endpoints
#[derive(Debug, Clone)]
pub struct AppleMusicClient {
    client: Client,
    credentials: AppleMusicCredentials,
    base_url: String,
}

impl AppleMusicClient {
    /// Creates a client against the public Apple Music API
    pub fn new(client: Client, credentials: AppleMusicCredentials) -> Self {
        Self {
            client,
            credentials,
            base_url: APPLE_MUSIC_BASE_URL.to_string(),
        }
    }

    /// Points the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let request = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.credentials.app_token)
            .header("Music-User-Token", &self.credentials.user_token);
        send_json(request).await
    }

    /// Fetches the most recently played songs, without repeats
    pub async fn fetch_recently_played(&self) -> Result<Vec<AppleMusicSong>, FetchError> {
        let response: DataResponse<SongResponse> =
            self.get("/v1/me/recent/played/tracks").await?;

        let mut seen = HashSet::new();
        Ok(response
            .data
            .into_iter()
            .map(SongResponse::into_song)
            .filter(|song| seen.insert(song.id.clone()))
            .take(RECENTLY_PLAYED_LIMIT)
            .collect())
    }

    /// Fetches a library playlist and all of its tracks
    pub async fn fetch_playlist(&self, id: &str) -> Result<AppleMusicPlaylist, FetchError> {
        let response: DataResponse<PlaylistResponse> =
            self.get(&format!("/v1/me/library/playlists/{id}")).await?;
        let playlist = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::MissingField(format!("playlist data for {id}")))?;

        let mut tracks = Vec::new();
        let mut next = Some(format!("/v1/me/library/playlists/{id}/tracks"));
        let mut pages = 0;
        while let Some(path) = next.take() {
            if pages == MAX_TRACK_PAGES {
                tracing::warn!(playlist = %id, "stopped paginating after {MAX_TRACK_PAGES} pages");
                break;
            }
            let page: TracksResponse = self.get(&path).await?;
            tracks.extend(page.data.into_iter().map(SongResponse::into_song));
            next = page.next;
            pages += 1;
        }

        let attributes = playlist.attributes;
        let url = match attributes.play_params.and_then(|p| p.global_id) {
            Some(global_id) => format!(
                "https://music.apple.com/us/playlist/{}/{}",
                slugify(&attributes.name),
                global_id
            ),
            None => String::new(),
        };

        Ok(AppleMusicPlaylist {
            name: attributes.name,
            tracks,
            last_modified: attributes.last_modified_date.unwrap_or_default(),
            url,
            id: playlist.id,
        })
    }

    /// Fetches everything the Apple Music cache holds
    pub async fn fetch_cache(&self) -> Result<AppleMusicCache, FetchError> {
        let recently_played = self.fetch_recently_played().await?;

        let playlist_futures = self
            .credentials
            .playlist_ids
            .iter()
            .map(|id| self.fetch_playlist(id));
        let playlists = futures::future::try_join_all(playlist_futures).await?;

        Ok(AppleMusicCache {
            recently_played,
            playlists,
        })
    }
}

#[async_trait]
impl Fetcher for AppleMusicClient {
    type Data = AppleMusicCache;

    async fn fetch(&self) -> Result<Self::Data, FetchError> {
        self.fetch_cache().await
    }
}

/// Lowercase, hyphen-separated form of a title as used in Apple Music URLs
fn slugify(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_' || *c == '-')
        .collect();
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

/// Fills the `{w}` and `{h}` placeholders of an artwork URL template
fn album_art_url(artwork: &Artwork) -> String {
    artwork
        .url
        .replace("{w}", &artwork.width.min(MAX_ALBUM_ART_SIZE).to_string())
        .replace("{h}", &artwork.height.min(MAX_ALBUM_ART_SIZE).to_string())
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TracksResponse {
    next: Option<String>,
    #[serde(default)]
    data: Vec<SongResponse>,
}

#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    id: String,
    attributes: PlaylistAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistAttributes {
    name: String,
    last_modified_date: Option<DateTime<Utc>>,
    play_params: Option<PlaylistPlayParams>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistPlayParams {
    global_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SongResponse {
    id: String,
    attributes: SongAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SongAttributes {
    name: String,
    artist_name: String,
    #[serde(default)]
    duration_in_millis: u64,
    #[serde(default)]
    artwork: Artwork,
    url: Option<String>,
    play_params: Option<SongPlayParams>,
}

#[derive(Debug, Default, Deserialize)]
struct Artwork {
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SongPlayParams {
    catalog_id: Option<String>,
}

impl SongResponse {
    fn into_song(self) -> AppleMusicSong {
        let attributes = self.attributes;
        let catalog_id = attributes
            .play_params
            .and_then(|p| p.catalog_id)
            .filter(|id| !id.is_empty());

        let url = match (attributes.url.filter(|u| !u.is_empty()), &catalog_id) {
            (Some(url), _) => url,
            (None, Some(catalog_id)) => format!(
                "https://music.apple.com/us/song/{}/{}",
                slugify(&attributes.name),
                catalog_id
            ),
            (None, None) => String::new(),
        };

        AppleMusicSong {
            album_art_url: album_art_url(&attributes.artwork),
            track: attributes.name,
            artist: attributes.artist_name,
            duration_in_millis: attributes.duration_in_millis,
            url,
            id: catalog_id.unwrap_or(self.id),
        }
    }
}
