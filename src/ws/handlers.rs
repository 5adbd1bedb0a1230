//! Session gateway: per-action validation, state mutation and broadcast
//! decisions.
//!
//! Every handler follows the same shape: resolve the room, check guards,
//! mutate under the room lock while building the outbound payloads, then
//! send strictly after the lock is released. A guard failure leaves room
//! state untouched and yields at most a caller-only `error`; host-only
//! actions from non-hosts (and actions from connections that never joined
//! a room) are dropped silently so outsiders learn nothing about the room.

use std::sync::Arc;

use crate::protocol::{ClientMessage, RoomSnapshot, ServerMessage};
use crate::room::machine::{Advance, RoomError, VoteOutcome};
use crate::room::{Room, RoomInner};
use crate::state::AppState;
use crate::types::*;

/// Handle one client action. `Some` is an immediate caller-only reply;
/// everything else is pushed through the transport.
pub async fn handle_message(
    connection_id: &ConnectionId,
    msg: ClientMessage,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::CreateRoom { name, avatar } => {
            create_room(state, connection_id, name, avatar).await
        }
        ClientMessage::JoinRoom { code, name, avatar } => {
            join_room(state, connection_id, code, name, avatar).await
        }
        ClientMessage::StartGame => start_game(state, connection_id).await,
        ClientMessage::VideoUploaded { clip_id } => {
            video_uploaded(state, connection_id, clip_id).await
        }
        ClientMessage::StartPlaying => start_playing(state, connection_id).await,
        ClientMessage::CastVote { accused } => cast_vote(state, connection_id, accused).await,
        ClientMessage::ForceReveal => force_reveal(state, connection_id).await,
        ClientMessage::NextVideo => next_video(state, connection_id).await,
    }
}

fn guard_error(err: &RoomError) -> ServerMessage {
    ServerMessage::Error {
        code: err.code().to_string(),
        msg: err.to_string(),
    }
}

fn roster(inner: &RoomInner) -> Vec<PlayerId> {
    inner.players.iter().map(|p| p.id.clone()).collect()
}

fn snapshots(inner: &RoomInner, code: &RoomCode) -> Vec<(PlayerId, RoomSnapshot)> {
    inner
        .players
        .iter()
        .map(|p| (p.id.clone(), inner.snapshot_for(code, &p.id)))
        .collect()
}

fn send_snapshots(state: &AppState, pairs: Vec<(PlayerId, RoomSnapshot)>) {
    for (player_id, snapshot) in pairs {
        state
            .transport
            .send(&player_id, ServerMessage::RoomState(snapshot));
    }
}

/// Snapshot every member and deliver. Snapshots are built under the lock,
/// sent after it drops.
pub async fn push_room_state(state: &AppState, room: &Room) {
    let pairs = {
        let inner = room.inner.lock().await;
        snapshots(&inner, &room.code)
    };
    send_snapshots(state, pairs);
}

async fn create_room(
    state: &Arc<AppState>,
    connection_id: &ConnectionId,
    name: String,
    avatar: Option<String>,
) -> Option<ServerMessage> {
    let code = state.rooms.generate_code();
    let host = Player::new(connection_id.clone(), name.clone(), avatar);
    let room = state.rooms.create(code.clone(), host);
    tracing::info!(code = %room.code, "room created by {}", name);

    state
        .transport
        .send(connection_id, ServerMessage::RoomCreated { code });
    push_room_state(state, &room).await;
    None
}

async fn join_room(
    state: &Arc<AppState>,
    connection_id: &ConnectionId,
    code: String,
    name: String,
    avatar: Option<String>,
) -> Option<ServerMessage> {
    let code = code.trim().to_uppercase();
    let Some(room) = state.rooms.get(&code) else {
        return Some(ServerMessage::Error {
            code: "ROOM_NOT_FOUND".to_string(),
            msg: "Room not found!".to_string(),
        });
    };

    let player = Player::new(connection_id.clone(), name.clone(), avatar);
    {
        let mut inner = room.inner.lock().await;
        if let Err(err) = inner.join(player) {
            return Some(guard_error(&err));
        }
    }

    tracing::info!(code = %room.code, "{} joined", name);
    push_room_state(state, &room).await;
    None
}

async fn start_game(state: &Arc<AppState>, connection_id: &ConnectionId) -> Option<ServerMessage> {
    let room = state.rooms.find_by_connection(connection_id).await?;
    {
        let mut inner = room.inner.lock().await;
        if inner.host_id != *connection_id {
            return None;
        }
        if let Err(err) = inner.start_game() {
            return Some(guard_error(&err));
        }
    }

    tracing::info!(code = %room.code, "game started");
    push_room_state(state, &room).await;
    None
}

async fn video_uploaded(
    state: &Arc<AppState>,
    connection_id: &ConnectionId,
    clip_id: ClipId,
) -> Option<ServerMessage> {
    let room = state.rooms.find_by_connection(connection_id).await?;
    tracing::debug!(code = %room.code, clip_id, "upload notified");

    let (recipients, entries, pairs) = {
        let inner = room.inner.lock().await;
        (
            roster(&inner),
            inner.upload_counts(),
            snapshots(&inner, &room.code),
        )
    };
    send_snapshots(state, pairs);
    state
        .transport
        .broadcast(recipients.iter(), &ServerMessage::UploadProgress { entries });
    None
}

async fn start_playing(
    state: &Arc<AppState>,
    connection_id: &ConnectionId,
) -> Option<ServerMessage> {
    let room = state.rooms.find_by_connection(connection_id).await?;
    let (recipients, cue, pairs) = {
        let mut inner = room.inner.lock().await;
        if inner.host_id != *connection_id {
            return None;
        }
        if let Err(err) = inner.start_playing() {
            return Some(guard_error(&err));
        }
        (
            roster(&inner),
            inner.play_cue(&room.code),
            snapshots(&inner, &room.code),
        )
    };

    tracing::info!(code = %room.code, "playing started");
    if let Some(cue) = cue {
        state
            .transport
            .broadcast(recipients.iter(), &ServerMessage::PlayClip(cue));
    }
    send_snapshots(state, pairs);
    None
}

async fn cast_vote(
    state: &Arc<AppState>,
    connection_id: &ConnectionId,
    accused: PlayerId,
) -> Option<ServerMessage> {
    let room = state.rooms.find_by_connection(connection_id).await?;
    let (recipients, count, total, reveal, pairs) = {
        let mut inner = room.inner.lock().await;
        match inner.cast_vote(connection_id, accused) {
            // Votes outside the playing phase (or from non-members) are a
            // silent no-op: no state change, no broadcast.
            Err(_) => return None,
            Ok(VoteOutcome::Recorded { count, total }) => {
                (roster(&inner), count, total, None, Vec::new())
            }
            Ok(VoteOutcome::Quorum {
                count,
                total,
                reveal,
            }) => (
                roster(&inner),
                count,
                total,
                Some(reveal),
                snapshots(&inner, &room.code),
            ),
        }
    };

    state
        .transport
        .broadcast(recipients.iter(), &ServerMessage::VoteUpdate { count, total });
    if let Some(reveal) = reveal {
        tracing::info!(code = %room.code, clip_id = %reveal.clip_id, "reveal (quorum)");
        state
            .transport
            .broadcast(recipients.iter(), &ServerMessage::Reveal(reveal));
        send_snapshots(state, pairs);
    }
    None
}

async fn force_reveal(
    state: &Arc<AppState>,
    connection_id: &ConnectionId,
) -> Option<ServerMessage> {
    let room = state.rooms.find_by_connection(connection_id).await?;
    let (recipients, reveal, pairs) = {
        let mut inner = room.inner.lock().await;
        if inner.host_id != *connection_id {
            return None;
        }
        match inner.reveal() {
            // Ignored outside the playing phase. This is also what a
            // force/quorum race resolves to for the loser.
            Err(_) => return None,
            Ok(reveal) => (roster(&inner), reveal, snapshots(&inner, &room.code)),
        }
    };

    tracing::info!(code = %room.code, clip_id = %reveal.clip_id, "reveal (forced)");
    state
        .transport
        .broadcast(recipients.iter(), &ServerMessage::Reveal(reveal));
    send_snapshots(state, pairs);
    None
}

async fn next_video(state: &Arc<AppState>, connection_id: &ConnectionId) -> Option<ServerMessage> {
    let room = state.rooms.find_by_connection(connection_id).await?;
    let (recipients, advance, cue, pairs) = {
        let mut inner = room.inner.lock().await;
        if inner.host_id != *connection_id {
            return None;
        }
        match inner.next_video() {
            Err(err) => return Some(guard_error(&err)),
            Ok(advance) => (
                roster(&inner),
                advance,
                inner.play_cue(&room.code),
                snapshots(&inner, &room.code),
            ),
        }
    };

    match advance {
        Advance::Play => {
            if let Some(cue) = cue {
                state
                    .transport
                    .broadcast(recipients.iter(), &ServerMessage::PlayClip(cue));
            }
        }
        Advance::Leaderboard(entries) => {
            tracing::info!(code = %room.code, "game over");
            state
                .transport
                .broadcast(recipients.iter(), &ServerMessage::Leaderboard { entries });
        }
    }
    send_snapshots(state, pairs);
    None
}
