use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type RoomCode = String;
pub type PlayerId = String;
pub type ConnectionId = String;
pub type ClipId = String;

/// Room code alphabet. Excludes glyphs that read ambiguously when typed
/// from a phone screen (0/O, 1/I).
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LEN: usize = 4;

/// Voting budget per clip, in seconds. Advisory only: the host's client
/// runs the countdown and sends `force_reveal` when it expires. The server
/// never fires a reveal on its own.
pub const VOTE_BUDGET_SECS: i64 = 300;

/// Per-player clip quota, enforced at upload time.
pub const MAX_CLIPS_PER_PLAYER: usize = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Upload,
    Playing,
    Reveal,
    Leaderboard,
}

/// A participant in one room. `id` equals the owning connection's id; the
/// connection itself is only ever used for message delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Opaque data-URI selfie, passed through untouched.
    pub avatar: Option<String>,
    pub score: u32,
}

impl Player {
    pub fn new(id: PlayerId, name: String, avatar: Option<String>) -> Self {
        Self {
            id,
            name,
            avatar,
            score: 0,
        }
    }
}

/// An uploaded video clip. Immutable after creation; the handle is only
/// meaningful to the blob store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clip {
    pub id: ClipId,
    pub owner_id: PlayerId,
    pub storage_handle: String,
}
