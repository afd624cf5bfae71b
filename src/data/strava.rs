//! Strava API client for recent activities
//!
//! Access tokens are short lived. The client holds the current token pair and
//! refreshes it through the OAuth endpoint shortly before it expires.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use super::request::{ensure_success, parse_body, send_json};
use super::StravaActivity;
use crate::cache::{refresh, FetchError, Fetcher};

/// Base URL for the Strava API and OAuth endpoints
const STRAVA_BASE_URL: &str = "https://www.strava.com";

/// Number of activities kept
const ACTIVITIES_LIMIT: usize = 5;

/// Refresh when the access token expires within this many seconds
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// OAuth application credentials and a long-lived refresh token
#[derive(Debug, Clone)]
pub struct StravaCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Default)]
struct Tokens {
    access: String,
    refresh: String,
    /// Unix seconds; zero forces a refresh before the first request
    expires_at: i64,
}

/// Client for the authenticated athlete's activities
#[derive(Debug)]
pub struct StravaClient {
    client: Client,
    credentials: StravaCredentials,
    base_url: String,
    tokens: Mutex<Tokens>,
}

impl StravaClient {
    /// Creates a client against the public Strava API
    pub fn new(client: Client, credentials: StravaCredentials) -> Self {
        let tokens = Tokens {
            refresh: credentials.refresh_token.clone(),
            ..Default::default()
        };
        Self {
            client,
            credentials,
            base_url: STRAVA_BASE_URL.to_string(),
            tokens: Mutex::new(tokens),
        }
    }

    /// Points the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Returns a valid access token, refreshing it if it is about to expire
    async fn access_token(&self) -> Result<String, FetchError> {
        let mut tokens = self.tokens.lock().await;
        if tokens.expires_at - Utc::now().timestamp() > TOKEN_EXPIRY_MARGIN_SECS {
            return Ok(tokens.access.clone());
        }

        let response = self
            .client
            .post(format!("{}/oauth/token", self.base_url))
            .json(&json!({
                "client_id": self.credentials.client_id,
                "client_secret": self.credentials.client_secret,
                "grant_type": "refresh_token",
                "refresh_token": tokens.refresh,
            }))
            .send()
            .await?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(FetchError::Auth(format!(
                "strava token refresh rejected with {status}"
            )));
        }
        let response = ensure_success(response)?;
        let refreshed: TokenResponse = parse_body(&response.text().await?)?;

        tracing::info!(expires_at = refreshed.expires_at, "refreshed strava access token");
        tokens.access = refreshed.access_token;
        tokens.refresh = refreshed.refresh_token;
        tokens.expires_at = refreshed.expires_at;
        Ok(tokens.access.clone())
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let token = self.access_token().await?;
        let request = self
            .client
            .get(format!("{}/api/v3/{path}", self.base_url))
            .bearer_auth(token)
            .query(query);
        send_json(request).await
    }

    /// Fetches the most recent public activities that recorded heart rate
    ///
    /// An activity whose details can't be fetched is skipped and the next
    /// eligible one takes its place. A failed heart rate stream fails the
    /// whole fetch.
    pub async fn fetch_activities(&self) -> Result<Vec<StravaActivity>, FetchError> {
        let summaries: Vec<ActivitySummary> = self.get("athlete/activities", &[]).await?;

        let mut activities = Vec::new();
        let eligible = summaries
            .into_iter()
            .filter(|summary| !summary.private && summary.has_heartrate);
        for summary in eligible {
            if activities.len() == ACTIVITIES_LIMIT {
                break;
            }

            let details: DetailedActivity =
                match self.get(&format!("activities/{}", summary.id), &[]).await {
                    Ok(details) => details,
                    Err(e) => {
                        let context = format!("skipping activity {}", summary.id);
                        refresh::report("strava", &e, &context);
                        continue;
                    }
                };
            let streams: HeartrateStreams = self
                .get(
                    &format!("activities/{}/streams", summary.id),
                    &[
                        ("keys", "heartrate"),
                        ("key_by_type", "true"),
                        ("resolution", "low"),
                    ],
                )
                .await?;

            activities.push(summary.into_activity(details, streams));
        }
        Ok(activities)
    }
}

impl ActivitySummary {
    fn into_activity(self, details: DetailedActivity, streams: HeartrateStreams) -> StravaActivity {
        StravaActivity {
            has_map: self
                .map
                .is_some_and(|map| !map.summary_polyline.unwrap_or_default().is_empty()),
            name: self.name,
            sport_type: self.sport_type,
            start_date: self.start_date,
            timezone: self.timezone,
            total_elevation_gain: self.total_elevation_gain,
            moving_time: self.moving_time,
            distance: self.distance,
            id: self.id,
            average_heartrate: self.average_heartrate.unwrap_or_default(),
            heartrate_data: streams.heartrate.map(|s| s.data).unwrap_or_default(),
            calories: details.calories.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Fetcher for StravaClient {
    type Data = Vec<StravaActivity>;

    async fn fetch(&self) -> Result<Self::Data, FetchError> {
        self.fetch_activities().await
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
}

#[derive(Debug, Deserialize)]
struct ActivitySummary {
    name: String,
    sport_type: String,
    start_date: DateTime<Utc>,
    #[serde(default)]
    timezone: String,
    map: Option<ActivityMap>,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    has_heartrate: bool,
    average_heartrate: Option<f64>,
    #[serde(default)]
    total_elevation_gain: f64,
    #[serde(default)]
    moving_time: u32,
    #[serde(default)]
    distance: f64,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ActivityMap {
    summary_polyline: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailedActivity {
    calories: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HeartrateStreams {
    heartrate: Option<Stream>,
}

#[derive(Debug, Deserialize)]
struct Stream {
    data: Vec<u32>,
}
