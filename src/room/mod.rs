pub mod machine;
pub mod projection;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::types::*;

/// One game session. All mutable state sits behind a single per-room lock;
/// critical sections are in-memory only. Outbound payloads are built while
/// the lock is held and sent after it is released.
pub struct Room {
    pub code: RoomCode,
    pub inner: Mutex<RoomInner>,
}

impl Room {
    pub fn new(code: RoomCode, host: Player) -> Self {
        let host_id = host.id.clone();
        Self {
            code,
            inner: Mutex::new(RoomInner {
                host_id,
                phase: Phase::Lobby,
                players: vec![host],
                clips: Vec::new(),
                play_order: Vec::new(),
                current_index: 0,
                vote_started_at: None,
                votes: HashMap::new(),
            }),
        }
    }
}

pub struct RoomInner {
    /// The creating player's id. Never changes.
    pub host_id: PlayerId,
    pub phase: Phase,
    /// Insertion order is display order. Players are only ever appended.
    pub players: Vec<Player>,
    pub clips: Vec<Clip>,
    /// A permutation of clip ids, fixed once per Upload -> Playing
    /// transition. `next_video` never reshuffles.
    pub play_order: Vec<ClipId>,
    pub current_index: usize,
    /// Stamped whenever a clip starts playing.
    pub vote_started_at: Option<DateTime<Utc>>,
    /// clip id -> (voter id -> accused id). A voter's entry may be
    /// overwritten until the reveal fires; the last vote wins.
    pub votes: HashMap<ClipId, HashMap<PlayerId, PlayerId>>,
}

impl RoomInner {
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn is_member(&self, id: &str) -> bool {
        self.players.iter().any(|p| p.id == id)
    }

    pub fn clip_count_for(&self, player_id: &str) -> usize {
        self.clips.iter().filter(|c| c.owner_id == player_id).count()
    }

    pub fn current_clip_id(&self) -> Option<&ClipId> {
        self.play_order.get(self.current_index)
    }

    /// Remaining voting time for the current clip, floored at zero.
    pub fn remaining_vote_secs(&self) -> i64 {
        match self.vote_started_at {
            None => VOTE_BUDGET_SECS,
            Some(started) => {
                let elapsed = (Utc::now() - started).num_seconds();
                (VOTE_BUDGET_SECS - elapsed).max(0)
            }
        }
    }
}
