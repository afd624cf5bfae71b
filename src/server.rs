//! HTTP surface for the caches
//!
//! Each cache is mounted on its own route and served as
//! `{"data": ..., "updated": ...}`; a single Apple Music playlist is served
//! bare. A cache that has never held data answers 503 so clients can tell
//! "nothing yet" apart from "nothing there".

use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use std::sync::Arc;

use crate::cache::{Cache, CacheData, CacheResponse};
use crate::data::AppleMusicCache;

/// Routes serving one cache's snapshot at `path`
pub fn cache_routes<T: CacheData>(path: &str, cache: Arc<Cache<T>>) -> Router {
    Router::new()
        .route(path, get(serve_cache::<T>))
        .with_state(cache)
}

/// Routes for the Apple Music overview and individual playlists
pub fn apple_music_routes(cache: Arc<Cache<AppleMusicCache>>) -> Router {
    Router::new()
        .route("/applemusic", get(apple_music_overview))
        .route("/applemusic/playlists/{id}", get(apple_music_playlist))
        .with_state(cache)
}

/// Wraps the cache routes with bearer auth and adds the health check
///
/// When `access_token` is `None` every route is public. `/health` is always
/// public.
pub fn router(routes: Router, access_token: Option<String>) -> Router {
    let routes = match access_token {
        Some(token) => routes.route_layer(middleware::from_fn_with_state(
            Arc::<str>::from(token),
            require_bearer,
        )),
        None => routes,
    };
    Router::new().route("/health", get(health)).merge(routes)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn serve_cache<T: CacheData>(State(cache): State<Arc<Cache<T>>>) -> Response {
    if !cache.is_populated() {
        return unavailable(cache.name());
    }
    Json(cache.response()).into_response()
}

async fn apple_music_overview(State(cache): State<Arc<Cache<AppleMusicCache>>>) -> Response {
    cache.view(|view| {
        if !view.populated {
            return unavailable(cache.name());
        }
        Json(CacheResponse {
            data: view.data.overview(),
            updated: view.updated,
        })
        .into_response()
    })
}

async fn apple_music_playlist(
    State(cache): State<Arc<Cache<AppleMusicCache>>>,
    Path(id): Path<String>,
) -> Response {
    cache.view(|view| {
        if !view.populated {
            return unavailable(cache.name());
        }
        match view.data.playlist(&id) {
            Some(playlist) => Json(playlist).into_response(),
            None => error_response(StatusCode::NOT_FOUND, format!("no playlist with id {id}")),
        }
    })
}

async fn require_bearer(State(token): State<Arc<str>>, request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if provided == Some(&*token) {
        next.run(request).await
    } else {
        tracing::debug!(path = %request.uri().path(), "rejected unauthorized request");
        error_response(StatusCode::UNAUTHORIZED, "missing or invalid access token".to_string())
    }
}

fn unavailable(name: &str) -> Response {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        format!("{name} cache has not been populated yet"),
    )
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
