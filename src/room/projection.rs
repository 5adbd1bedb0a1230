//! Per-recipient view models built from internal room state.
//!
//! Snapshots are personalized (own clip count) and therefore always sent
//! per member, never as a group broadcast. Nothing here ever exposes the
//! in-progress vote ledger; running tallies travel as counts and the full
//! ledger for a clip only appears in its reveal broadcast.

use super::RoomInner;
use crate::protocol::{PlayCue, PlayerInfo, RoomSnapshot, UploadCount};
use crate::types::RoomCode;

impl RoomInner {
    pub fn snapshot_for(&self, code: &RoomCode, player_id: &str) -> RoomSnapshot {
        RoomSnapshot {
            code: code.clone(),
            host_id: self.host_id.clone(),
            phase: self.phase,
            players: self.players.iter().map(PlayerInfo::from).collect(),
            total_clips: self.clips.len(),
            current_index: self.current_index,
            vote_secs_left: self.remaining_vote_secs(),
            my_clip_count: self.clip_count_for(player_id),
        }
    }

    /// "Play this clip" cue for the current position, or None once the
    /// play order is exhausted.
    pub fn play_cue(&self, code: &RoomCode) -> Option<PlayCue> {
        let clip_id = self.current_clip_id()?.clone();
        Some(PlayCue {
            url: format!("/api/clip/{}/{}", code, clip_id),
            clip_id,
            index: self.current_index,
            total: self.play_order.len(),
        })
    }

    pub fn upload_counts(&self) -> Vec<UploadCount> {
        self.players
            .iter()
            .map(|p| UploadCount {
                id: p.id.clone(),
                name: p.name.clone(),
                count: self.clip_count_for(&p.id),
            })
            .collect()
    }
}
