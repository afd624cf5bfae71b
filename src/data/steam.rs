//! Steam Web API client for recently played games and achievements

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::request::{parse_body, redacted_url, send_json};
use super::{SteamAchievement, SteamGame};
use crate::cache::{refresh, FetchError, Fetcher};

/// Base URL for the Steam Web API
const STEAM_API_BASE_URL: &str = "https://api.steampowered.com";

/// Number of most recently played games kept
const GAMES_LIMIT: usize = 10;

/// Number of achievements kept per game
const ACHIEVEMENTS_LIMIT: usize = 5;

/// Credentials for the Steam Web API
#[derive(Debug, Clone)]
pub struct SteamCredentials {
    /// Web API key
    pub key: String,
    /// 64-bit Steam ID of the profile
    pub steam_id: String,
}

/// Client for a Steam profile's games
#[derive(Debug, Clone)]
pub struct SteamClient {
    client: Client,
    credentials: SteamCredentials,
    base_url: String,
}

impl SteamClient {
    /// Creates a client against the public Steam Web API
    pub fn new(client: Client, credentials: SteamCredentials) -> Self {
        Self {
            client,
            credentials,
            base_url: STEAM_API_BASE_URL.to_string(),
        }
    }

    /// Points the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetches the most recently played games with their achievements
    pub async fn fetch_games(&self) -> Result<Vec<SteamGame>, FetchError> {
        let request = self
            .client
            .get(format!("{}/IPlayerService/GetOwnedGames/v1/", self.base_url))
            .query(&[
                ("key", self.credentials.key.as_str()),
                ("steamid", self.credentials.steam_id.as_str()),
                ("include_appinfo", "true"),
                ("format", "json"),
            ]);
        let owned: OwnedGamesResponse = send_json(request).await?;

        let mut games = owned.response.games;
        games.sort_by(|a, b| b.rtime_last_played.cmp(&a.rtime_last_played));
        games.truncate(GAMES_LIMIT);

        let game_futures = games.into_iter().map(|game| self.game_details(game));
        Ok(futures::future::join_all(game_futures).await)
    }

    /// Builds a game entry; achievements are left out if they can't be fetched
    async fn game_details(&self, game: OwnedGame) -> SteamGame {
        let achievements = match self.fetch_achievements(game.appid).await {
            Ok(achievements) => achievements,
            Err(e) => {
                let context = format!("no achievements for app {}", game.appid);
                refresh::report("steam", &e, &context);
                None
            }
        };
        let achievement_progress = achievements.as_deref().map(achievement_progress);
        let achievements = achievements.map(most_recent_unlocks);

        SteamGame {
            icon_url: format!(
                "https://media.steampowered.com/steamcommunity/public/images/apps/{}/{}.jpg",
                game.appid, game.img_icon_url
            ),
            header_url: format!(
                "https://shared.cloudflare.steamstatic.com/store_item_assets/steam/apps/{}/header.jpg",
                game.appid
            ),
            url: format!("https://store.steampowered.com/app/{}/", game.appid),
            name: game.name,
            app_id: game.appid,
            playtime_forever: game.playtime_forever,
            last_played: unix_time(game.rtime_last_played).unwrap_or_default(),
            achievement_progress,
            achievements,
        }
    }

    /// Fetches a game's achievements joined with their display metadata
    ///
    /// Returns `None` for games without achievement stats.
    pub async fn fetch_achievements(
        &self,
        app_id: u32,
    ) -> Result<Option<Vec<SteamAchievement>>, FetchError> {
        let app_id = app_id.to_string();
        let response = self
            .client
            .get(format!(
                "{}/ISteamUserStats/GetPlayerAchievements/v0001/",
                self.base_url
            ))
            .query(&[
                ("key", self.credentials.key.as_str()),
                ("steamid", self.credentials.steam_id.as_str()),
                ("appid", app_id.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?;

        let status = response.status();
        let url = redacted_url(&response);
        let body = response.text().await?;

        // Games without stats answer 400 with `success: false`
        if let Ok(stats) = serde_json::from_str::<PlayerStatsResponse>(&body) {
            if !stats.playerstats.success {
                return Ok(None);
            }
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let stats: PlayerStatsResponse = parse_body(&body)?;
        let Some(player_achievements) = stats.playerstats.achievements else {
            return Ok(None);
        };

        let request = self
            .client
            .get(format!("{}/ISteamUserStats/GetSchemaForGame/v2/", self.base_url))
            .query(&[
                ("key", self.credentials.key.as_str()),
                ("appid", app_id.as_str()),
                ("format", "json"),
            ]);
        let schema: SchemaResponse = send_json(request).await?;
        let schema_achievements = schema
            .game
            .available_game_stats
            .map(|stats| stats.achievements)
            .unwrap_or_default();

        let achievements: Vec<SteamAchievement> = player_achievements
            .into_iter()
            .filter_map(|player| {
                let schema = schema_achievements.iter().find(|s| s.name == player.apiname)?;
                Some(SteamAchievement {
                    achieved: player.achieved == 1,
                    unlock_time: player.unlocktime.and_then(unix_time),
                    icon: schema.icon.clone(),
                    display_name: schema.display_name.clone(),
                    description: schema.description.clone(),
                    api_name: player.apiname,
                })
            })
            .collect();

        if achievements.is_empty() {
            Ok(None)
        } else {
            Ok(Some(achievements))
        }
    }
}

#[async_trait]
impl Fetcher for SteamClient {
    type Data = Vec<SteamGame>;

    async fn fetch(&self) -> Result<Self::Data, FetchError> {
        self.fetch_games().await
    }
}

/// Converts a Steam unix timestamp, treating zero as "never"
fn unix_time(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

/// Percentage of achievements unlocked
fn achievement_progress(achievements: &[SteamAchievement]) -> f32 {
    if achievements.is_empty() {
        return 0.0;
    }
    let achieved = achievements.iter().filter(|a| a.achieved).count();
    achieved as f32 / achievements.len() as f32 * 100.0
}

/// Sorts by unlock time, newest first with locked achievements last, and keeps the top few
fn most_recent_unlocks(mut achievements: Vec<SteamAchievement>) -> Vec<SteamAchievement> {
    achievements.sort_by(|a, b| match (a.unlock_time, b.unlock_time) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    achievements.truncate(ACHIEVEMENTS_LIMIT);
    achievements
}

#[derive(Debug, Deserialize)]
struct OwnedGamesResponse {
    response: OwnedGames,
}

#[derive(Debug, Deserialize)]
struct OwnedGames {
    #[serde(default)]
    games: Vec<OwnedGame>,
}

#[derive(Debug, Deserialize)]
struct OwnedGame {
    appid: u32,
    #[serde(default)]
    name: String,
    #[serde(default)]
    playtime_forever: u32,
    #[serde(default)]
    img_icon_url: String,
    #[serde(default)]
    rtime_last_played: i64,
}

#[derive(Debug, Deserialize)]
struct PlayerStatsResponse {
    playerstats: PlayerStats,
}

#[derive(Debug, Deserialize)]
struct PlayerStats {
    #[serde(default = "default_success")]
    success: bool,
    achievements: Option<Vec<PlayerAchievement>>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct PlayerAchievement {
    apiname: String,
    achieved: u8,
    unlocktime: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SchemaResponse {
    game: SchemaGame,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaGame {
    available_game_stats: Option<SchemaStats>,
}

#[derive(Debug, Deserialize)]
struct SchemaStats {
    #[serde(default)]
    achievements: Vec<SchemaAchievement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaAchievement {
    name: String,
    display_name: String,
    #[serde(default)]
    icon: String,
    description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ErrorClass;
    use crate::data::request::http_client;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SteamClient {
        SteamClient::new(
            http_client().unwrap(),
            SteamCredentials {
                key: "key".to_string(),
                steam_id: "76561198000000000".to_string(),
            },
        )
        .with_base_url(server.uri())
    }

    fn achievement(name: &str, unlock: Option<i64>) -> SteamAchievement {
        SteamAchievement {
            api_name: name.to_string(),
            achieved: unlock.is_some(),
            unlock_time: unlock.and_then(unix_time),
            ..Default::default()
        }
    }

    async fn mount_no_stats(server: &MockServer, app_id: &str) {
        Mock::given(method("GET"))
            .and(path("/ISteamUserStats/GetPlayerAchievements/v0001/"))
            .and(query_param("appid", app_id))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"playerstats":{"error":"Requested app has no stats","success":false}}"#,
            ))
            .mount(server)
            .await;
    }

    #[test]
    fn test_unix_time_zero_is_none() {
        assert!(unix_time(0).is_none());
        assert_eq!(unix_time(1_700_000_000).map(|t| t.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn test_achievement_progress() {
        let achievements = vec![
            achievement("a", Some(1_700_000_000)),
            achievement("b", None),
            achievement("c", None),
            achievement("d", Some(1_700_000_100)),
        ];
        assert!((achievement_progress(&achievements) - 50.0).abs() < 0.001);
        assert_eq!(achievement_progress(&[]), 0.0);
    }

    #[test]
    fn test_most_recent_unlocks_orders_and_clamps() {
        let achievements = vec![
            achievement("locked", None),
            achievement("old", Some(1_600_000_000)),
            achievement("new", Some(1_700_000_000)),
            achievement("mid", Some(1_650_000_000)),
            achievement("locked2", None),
            achievement("oldest", Some(1_500_000_000)),
        ];

        let recent = most_recent_unlocks(achievements);

        let names: Vec<&str> = recent.iter().map(|a| a.api_name.as_str()).collect();
        assert_eq!(names.len(), ACHIEVEMENTS_LIMIT);
        assert_eq!(&names[..4], &["new", "mid", "old", "oldest"]);
        assert!(names[4].starts_with("locked"));
    }

    #[test]
    fn test_most_recent_unlocks_with_few_achievements() {
        let recent = most_recent_unlocks(vec![achievement("only", Some(1_700_000_000))]);
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn test_game_without_stats_has_no_achievements() {
        let server = MockServer::start().await;
        mount_no_stats(&server, "220").await;

        let achievements = client_for(&server).fetch_achievements(220).await.unwrap();

        assert!(achievements.is_none());
    }

    #[tokio::test]
    async fn test_achievements_server_error_is_ignorable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ISteamUserStats/GetPlayerAchievements/v0001/"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_achievements(620).await.unwrap_err();

        assert_eq!(err.class(), ErrorClass::Ignorable);
    }

    #[tokio::test]
    async fn test_fetch_games_joins_achievements() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/IPlayerService/GetOwnedGames/v1/"))
            .and(query_param("steamid", "76561198000000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {
                    "game_count": 2,
                    "games": [
                        { "appid": 220, "name": "Half-Life 2", "playtime_forever": 600,
                          "img_icon_url": "hl2", "rtime_last_played": 1600000000 },
                        { "appid": 620, "name": "Portal 2", "playtime_forever": 1200,
                          "img_icon_url": "p2", "rtime_last_played": 1700000000 }
                    ]
                }
            })))
            .mount(&server)
            .await;
        mount_no_stats(&server, "220").await;
        Mock::given(method("GET"))
            .and(path("/ISteamUserStats/GetPlayerAchievements/v0001/"))
            .and(query_param("appid", "620"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "playerstats": {
                    "steamID": "76561198000000000",
                    "gameName": "Portal 2",
                    "success": true,
                    "achievements": [
                        { "apiname": "ACH_WAKE_UP", "achieved": 1, "unlocktime": 1700000000 },
                        { "apiname": "ACH_LASER", "achieved": 0, "unlocktime": 0 }
                    ]
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ISteamUserStats/GetSchemaForGame/v2/"))
            .and(query_param("appid", "620"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "game": {
                    "gameName": "Portal 2",
                    "availableGameStats": {
                        "achievements": [
                            { "name": "ACH_WAKE_UP", "displayName": "Wake Up Call",
                              "icon": "https://cdn/wake.jpg", "description": "Survive the manual" },
                            { "name": "ACH_LASER", "displayName": "Laser Focus",
                              "icon": "https://cdn/laser.jpg" }
                        ]
                    }
                }
            })))
            .mount(&server)
            .await;

        let games = client_for(&server).fetch().await.unwrap();

        assert_eq!(games.len(), 2);
        assert_eq!(games[0].name, "Portal 2", "most recently played first");
        assert_eq!(games[0].url, "https://store.steampowered.com/app/620/");
        assert!((games[0].achievement_progress.unwrap() - 50.0).abs() < 0.001);
        let achievements = games[0].achievements.as_ref().unwrap();
        assert_eq!(achievements[0].display_name, "Wake Up Call");
        assert!(achievements[0].unlock_time.is_some());
        assert!(achievements[1].unlock_time.is_none());
        assert_eq!(games[1].name, "Half-Life 2");
        assert!(games[1].achievements.is_none());
        assert!(games[1].achievement_progress.is_none());
    }

    #[tokio::test]
    async fn test_failed_schema_keeps_game_without_achievements() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/IPlayerService/GetOwnedGames/v1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {
                    "games": [
                        { "appid": 220, "name": "Half-Life 2", "rtime_last_played": 1600000000 },
                        { "appid": 620, "name": "Portal 2", "rtime_last_played": 1700000000 }
                    ]
                }
            })))
            .mount(&server)
            .await;
        mount_no_stats(&server, "220").await;
        Mock::given(method("GET"))
            .and(path("/ISteamUserStats/GetPlayerAchievements/v0001/"))
            .and(query_param("appid", "620"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "playerstats": {
                    "success": true,
                    "achievements": [
                        { "apiname": "ACH_WAKE_UP", "achieved": 1, "unlocktime": 1700000000 }
                    ]
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ISteamUserStats/GetSchemaForGame/v2/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let games = client_for(&server).fetch().await.unwrap();

        let names: Vec<&str> = games.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Portal 2", "Half-Life 2"]);
        assert!(games[0].achievements.is_none());
        assert!(games[0].achievement_progress.is_none());
    }
}
