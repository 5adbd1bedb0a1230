use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        name: String,
        avatar: Option<String>,
    },
    JoinRoom {
        code: String,
        name: String,
        avatar: Option<String>,
    },
    StartGame,
    /// Notification only; the bytes moved over the HTTP upload endpoint.
    VideoUploaded {
        clip_id: ClipId,
    },
    StartPlaying,
    CastVote {
        accused: PlayerId,
    },
    ForceReveal,
    NextVideo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent to the creator only, before the first snapshot.
    RoomCreated {
        code: RoomCode,
    },
    /// Per-member snapshot; carries a personalized clip count, so it is
    /// never sent as a group broadcast.
    RoomState(RoomSnapshot),
    PlayClip(PlayCue),
    /// Running tally for the current clip. Counts only, never choices.
    VoteUpdate {
        count: usize,
        total: usize,
    },
    Reveal(RevealInfo),
    Leaderboard {
        entries: Vec<LeaderboardEntry>,
    },
    UploadProgress {
        entries: Vec<UploadCount>,
    },
    Error {
        code: String,
        msg: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub avatar: Option<String>,
    pub score: u32,
}

impl From<&Player> for PlayerInfo {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            avatar: p.avatar.clone(),
            score: p.score,
        }
    }
}

/// Per-recipient view of a room. Scores are public; the in-progress vote
/// ledger is not part of any snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub host_id: PlayerId,
    pub phase: Phase,
    pub players: Vec<PlayerInfo>,
    pub total_clips: usize,
    pub current_index: usize,
    pub vote_secs_left: i64,
    /// Clips uploaded by the recipient specifically.
    pub my_clip_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayCue {
    pub clip_id: ClipId,
    pub url: String,
    /// 0-based position in the play order.
    pub index: usize,
    pub total: usize,
}

/// Disclosed to the whole room once a clip's reveal fires. The full ledger
/// for the clip is public from this point on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealInfo {
    pub clip_id: ClipId,
    pub owner_id: PlayerId,
    pub owner_name: String,
    /// voter id -> accused id
    pub votes: HashMap<PlayerId, PlayerId>,
    pub scores: HashMap<PlayerId, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: PlayerId,
    pub name: String,
    pub avatar: Option<String>,
    pub score: u32,
    /// 1-based; ties share score but not rank (join order breaks them).
    pub rank: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadCount {
    pub id: PlayerId,
    pub name: String,
    pub count: usize,
}
