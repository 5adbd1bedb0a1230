//! HTTP endpoints for clip bytes.
//!
//! The real-time protocol never carries video data; clips move over these
//! routes and the room only learns about them through the registered
//! `Clip` entry (plus the client's `video_uploaded` notification).

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::room::machine::RoomError;
use crate::state::AppState;
use crate::types::ClipId;

/// Generous cap for multi-clip phone uploads.
const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/clip/{code}", post(upload_clip))
        .route(
            "/api/clip/{code}/{clip_id}",
            get(serve_clip).delete(delete_clip),
        )
        .route("/api/clips/{code}/{player_id}", get(list_clips))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn extension_of(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "mp4".to_string())
}

/// POST /api/clip/{code} — multipart form with `player_id` and `clip`.
///
/// Bytes are stored first, then the clip is registered under the room
/// lock; if registration is rejected (unknown player, quota, phase) the
/// stored bytes are removed again so no orphan survives.
async fn upload_clip(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let code = code.trim().to_uppercase();
    let Some(room) = state.rooms.get(&code) else {
        return (StatusCode::NOT_FOUND, "Room not found").into_response();
    };

    let mut player_id: Option<String> = None;
    let mut file: Option<(String, Bytes)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => match field.name() {
                Some("player_id") => match field.text().await {
                    Ok(text) => player_id = Some(text),
                    Err(e) => {
                        return (StatusCode::BAD_REQUEST, format!("bad player_id field: {e}"))
                            .into_response()
                    }
                },
                Some("clip") => {
                    let ext = field
                        .file_name()
                        .map(extension_of)
                        .unwrap_or_else(|| "mp4".to_string());
                    match field.bytes().await {
                        Ok(bytes) => file = Some((ext, bytes)),
                        Err(e) => {
                            return (StatusCode::BAD_REQUEST, format!("upload failed: {e}"))
                                .into_response()
                        }
                    }
                }
                _ => {}
            },
            Ok(None) => break,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, format!("bad multipart body: {e}"))
                    .into_response()
            }
        }
    }
    let (Some(player_id), Some((ext, bytes))) = (player_id, file) else {
        return (StatusCode::BAD_REQUEST, "Missing player_id or clip file").into_response();
    };

    let clip_id = ulid::Ulid::new().to_string();
    let handle = match state.store.put(&code, &clip_id, &ext, &bytes).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(code, "failed to store clip: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store clip").into_response();
        }
    };

    let registered = {
        let mut inner = room.inner.lock().await;
        inner
            .add_clip(player_id.clone(), clip_id.clone(), handle.clone())
            .map(|_| inner.clip_count_for(&player_id))
    };
    match registered {
        Ok(count) => {
            tracing::info!(code, clip_id, "clip uploaded by {player_id}");
            Json(json!({ "clip_id": clip_id, "count": count })).into_response()
        }
        Err(err) => {
            if let Err(e) = state.store.delete(&handle).await {
                tracing::warn!(code, "failed to clean up rejected clip: {e}");
            }
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
    }
}

/// GET /api/clip/{code}/{clip_id} — range-capable video serving.
async fn serve_clip(
    State(state): State<Arc<AppState>>,
    Path((code, clip_id)): Path<(String, ClipId)>,
    request: Request,
) -> Response {
    let code = code.trim().to_uppercase();
    let handle = match state.rooms.get(&code) {
        Some(room) => {
            let inner = room.inner.lock().await;
            inner
                .clips
                .iter()
                .find(|c| c.id == clip_id)
                .map(|c| c.storage_handle.clone())
        }
        None => None,
    };
    let Some(handle) = handle else {
        return (StatusCode::NOT_FOUND, "Clip not found").into_response();
    };

    match ServeFile::new(state.store.path(&handle)).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to read clip: {e}"))
                .into_response()
        }
    }
}

/// DELETE /api/clip/{code}/{clip_id}
async fn delete_clip(
    State(state): State<Arc<AppState>>,
    Path((code, clip_id)): Path<(String, ClipId)>,
) -> Response {
    let code = code.trim().to_uppercase();
    let Some(room) = state.rooms.get(&code) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let removed = {
        let mut inner = room.inner.lock().await;
        inner.remove_clip(&clip_id)
    };
    match removed {
        Ok(clip) => {
            if let Err(e) = state.store.delete(&clip.storage_handle).await {
                tracing::warn!(code, clip_id, "failed to delete stored clip: {e}");
            }
            StatusCode::OK.into_response()
        }
        Err(RoomError::UnknownClip) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    }
}

#[derive(Debug, Clone, Serialize)]
struct ClipRef {
    id: ClipId,
    url: String,
}

/// GET /api/clips/{code}/{player_id} — the player's own uploads.
async fn list_clips(
    State(state): State<Arc<AppState>>,
    Path((code, player_id)): Path<(String, String)>,
) -> Response {
    let code = code.trim().to_uppercase();
    let Some(room) = state.rooms.get(&code) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let clips: Vec<ClipRef> = {
        let inner = room.inner.lock().await;
        inner
            .clips
            .iter()
            .filter(|c| c.owner_id == player_id)
            .map(|c| ClipRef {
                id: c.id.clone(),
                url: format!("/api/clip/{}/{}", code, c.id),
            })
            .collect()
    };
    Json(clips).into_response()
}
