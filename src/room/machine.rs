//! Room phase transitions, vote tallying and scoring.
//!
//! Every method here mutates `RoomInner` and is meant to be called with the
//! room lock held. A guard failure returns an error and leaves the state
//! untouched; there are no partial applications.

use chrono::Utc;
use rand::seq::SliceRandom;
use thiserror::Error;

use super::RoomInner;
use crate::protocol::{LeaderboardEntry, RevealInfo};
use crate::types::*;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("Game already in progress!")]
    NotJoinable,
    #[error("Already in this room.")]
    AlreadyJoined,
    #[error("Need at least 2 players!")]
    NotEnoughPlayers,
    #[error("No clips uploaded yet!")]
    NoClips,
    #[error("Player not in room")]
    UnknownPlayer,
    #[error("Clip not found")]
    UnknownClip,
    #[error("Maximum 30 clips per player")]
    QuotaExceeded,
    #[error("Not available in this phase")]
    WrongPhase,
}

impl RoomError {
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::NotJoinable => "NOT_JOINABLE",
            RoomError::AlreadyJoined => "ALREADY_JOINED",
            RoomError::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            RoomError::NoClips => "NO_CLIPS",
            RoomError::UnknownPlayer => "UNKNOWN_PLAYER",
            RoomError::UnknownClip => "UNKNOWN_CLIP",
            RoomError::QuotaExceeded => "QUOTA_EXCEEDED",
            RoomError::WrongPhase => "WRONG_PHASE",
        }
    }
}

/// Result of recording a vote for the current clip.
#[derive(Debug)]
pub enum VoteOutcome {
    Recorded {
        count: usize,
        total: usize,
    },
    /// Every player has voted; the reveal already executed.
    Quorum {
        count: usize,
        total: usize,
        reveal: RevealInfo,
    },
}

/// Result of advancing past a revealed clip.
#[derive(Debug)]
pub enum Advance {
    /// Another clip started playing.
    Play,
    /// The play order is exhausted; final ranking.
    Leaderboard(Vec<LeaderboardEntry>),
}

impl RoomInner {
    /// Lobby + Join: append a player.
    pub fn join(&mut self, player: Player) -> Result<(), RoomError> {
        if self.phase != Phase::Lobby {
            return Err(RoomError::NotJoinable);
        }
        if self.is_member(&player.id) {
            return Err(RoomError::AlreadyJoined);
        }
        self.players.push(player);
        Ok(())
    }

    /// Lobby -> Upload.
    pub fn start_game(&mut self) -> Result<(), RoomError> {
        if self.phase != Phase::Lobby {
            return Err(RoomError::WrongPhase);
        }
        if self.players.len() < 2 {
            return Err(RoomError::NotEnoughPlayers);
        }
        self.phase = Phase::Upload;
        Ok(())
    }

    /// Register an uploaded clip. The owner must already be a member and
    /// under quota. Clips cannot be added once the play order is fixed.
    pub fn add_clip(
        &mut self,
        owner_id: PlayerId,
        clip_id: ClipId,
        storage_handle: String,
    ) -> Result<Clip, RoomError> {
        if !self.is_member(&owner_id) {
            return Err(RoomError::UnknownPlayer);
        }
        if matches!(self.phase, Phase::Playing | Phase::Reveal) {
            return Err(RoomError::WrongPhase);
        }
        if self.clip_count_for(&owner_id) >= MAX_CLIPS_PER_PLAYER {
            return Err(RoomError::QuotaExceeded);
        }
        let clip = Clip {
            id: clip_id,
            owner_id,
            storage_handle,
        };
        self.clips.push(clip.clone());
        Ok(clip)
    }

    /// Remove a clip before the game reaches the playing phase. Removal
    /// later would punch a hole in the fixed play order.
    pub fn remove_clip(&mut self, clip_id: &str) -> Result<Clip, RoomError> {
        if matches!(self.phase, Phase::Playing | Phase::Reveal) {
            return Err(RoomError::WrongPhase);
        }
        let pos = self
            .clips
            .iter()
            .position(|c| c.id == clip_id)
            .ok_or(RoomError::UnknownClip)?;
        Ok(self.clips.remove(pos))
    }

    /// Upload -> Playing: fix the play order and start the first round.
    ///
    /// The order is an in-place Fisher-Yates shuffle of all clip ids using
    /// the process RNG. No seed is kept; runs are not reproducible.
    pub fn start_playing(&mut self) -> Result<(), RoomError> {
        if self.phase != Phase::Upload {
            return Err(RoomError::WrongPhase);
        }
        if self.clips.is_empty() {
            return Err(RoomError::NoClips);
        }
        let mut order: Vec<ClipId> = self.clips.iter().map(|c| c.id.clone()).collect();
        order.shuffle(&mut rand::rng());
        self.play_order = order;
        self.current_index = 0;
        self.vote_started_at = Some(Utc::now());
        self.phase = Phase::Playing;
        Ok(())
    }

    /// Record a vote for the current clip. Overwrites the voter's previous
    /// vote for this clip if any. Reaching quorum (all players voted)
    /// executes the reveal in the same critical section.
    pub fn cast_vote(&mut self, voter: &str, accused: PlayerId) -> Result<VoteOutcome, RoomError> {
        if self.phase != Phase::Playing {
            return Err(RoomError::WrongPhase);
        }
        if !self.is_member(voter) {
            return Err(RoomError::UnknownPlayer);
        }
        let clip_id = self
            .current_clip_id()
            .cloned()
            .ok_or(RoomError::UnknownClip)?;
        self.votes
            .entry(clip_id.clone())
            .or_default()
            .insert(voter.to_string(), accused);

        let count = self.votes.get(&clip_id).map(|v| v.len()).unwrap_or(0);
        let total = self.players.len();
        if count >= total {
            let reveal = self.reveal()?;
            Ok(VoteOutcome::Quorum {
                count,
                total,
                reveal,
            })
        } else {
            Ok(VoteOutcome::Recorded { count, total })
        }
    }

    /// Disclose the current clip's owner and award points: one point per
    /// voter whose accusation matches the owner. No penalties.
    ///
    /// The `phase == Playing` check doubles as the at-most-once guard:
    /// a quorum trigger and a racing `force_reveal` both run under the
    /// room lock, and whichever loses the race sees phase Reveal.
    pub fn reveal(&mut self) -> Result<RevealInfo, RoomError> {
        if self.phase != Phase::Playing {
            return Err(RoomError::WrongPhase);
        }
        let clip_id = self
            .current_clip_id()
            .cloned()
            .ok_or(RoomError::UnknownClip)?;
        let owner_id = self
            .clips
            .iter()
            .find(|c| c.id == clip_id)
            .map(|c| c.owner_id.clone())
            .ok_or(RoomError::UnknownClip)?;
        let votes = self.votes.get(&clip_id).cloned().unwrap_or_default();

        for (voter_id, accused_id) in &votes {
            if *accused_id == owner_id {
                if let Some(voter) = self.players.iter_mut().find(|p| p.id == *voter_id) {
                    voter.score += 1;
                }
            }
        }
        self.phase = Phase::Reveal;

        let owner_name = self
            .player(&owner_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        Ok(RevealInfo {
            clip_id,
            owner_id,
            owner_name,
            votes,
            scores: self.players.iter().map(|p| (p.id.clone(), p.score)).collect(),
        })
    }

    /// Reveal -> Playing (more clips) or Reveal -> Leaderboard (done).
    pub fn next_video(&mut self) -> Result<Advance, RoomError> {
        if self.phase != Phase::Reveal {
            return Err(RoomError::WrongPhase);
        }
        self.current_index += 1;
        if self.current_index >= self.play_order.len() {
            self.phase = Phase::Leaderboard;
            Ok(Advance::Leaderboard(self.ranking()))
        } else {
            self.phase = Phase::Playing;
            self.vote_started_at = Some(Utc::now());
            Ok(Advance::Play)
        }
    }

    /// Players by descending score; the stable sort keeps join order as
    /// the tie-break. Ranks are 1-based.
    pub fn ranking(&self) -> Vec<LeaderboardEntry> {
        let mut ordered: Vec<&Player> = self.players.iter().collect();
        ordered.sort_by(|a, b| b.score.cmp(&a.score));
        ordered
            .into_iter()
            .enumerate()
            .map(|(i, p)| LeaderboardEntry {
                id: p.id.clone(),
                name: p.name.clone(),
                avatar: p.avatar.clone(),
                score: p.score,
                rank: i + 1,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::Room;
    use std::collections::BTreeSet;

    fn player(id: &str) -> Player {
        Player::new(id.to_string(), id.to_string(), None)
    }

    fn room_with_players(ids: &[&str]) -> RoomInner {
        let room = Room::new("ABCD".to_string(), player(ids[0]));
        let mut inner = room.inner.into_inner();
        for id in &ids[1..] {
            inner.join(player(id)).unwrap();
        }
        inner
    }

    /// Room in Playing phase with one clip per player, owner == player id.
    fn playing_room(ids: &[&str]) -> RoomInner {
        let mut inner = room_with_players(ids);
        inner.start_game().unwrap();
        for id in ids {
            inner
                .add_clip(id.to_string(), format!("clip-{id}"), format!("{id}.mp4"))
                .unwrap();
        }
        inner.start_playing().unwrap();
        inner
    }

    #[test]
    fn join_outside_lobby_leaves_roster_unchanged() {
        let mut inner = room_with_players(&["p1", "p2"]);
        inner.start_game().unwrap();
        let err = inner.join(player("p3")).unwrap_err();
        assert_eq!(err, RoomError::NotJoinable);
        assert_eq!(inner.players.len(), 2);
    }

    #[test]
    fn duplicate_join_is_rejected() {
        let mut inner = room_with_players(&["p1"]);
        let err = inner.join(player("p1")).unwrap_err();
        assert_eq!(err, RoomError::AlreadyJoined);
        assert_eq!(inner.players.len(), 1);
    }

    #[test]
    fn start_game_needs_two_players() {
        let mut inner = room_with_players(&["p1"]);
        assert_eq!(inner.start_game().unwrap_err(), RoomError::NotEnoughPlayers);
        assert_eq!(inner.phase, Phase::Lobby);
    }

    #[test]
    fn start_game_only_from_lobby() {
        let mut inner = room_with_players(&["p1", "p2"]);
        inner.start_game().unwrap();
        assert_eq!(inner.start_game().unwrap_err(), RoomError::WrongPhase);
    }

    #[test]
    fn start_playing_needs_a_clip() {
        let mut inner = room_with_players(&["p1", "p2"]);
        inner.start_game().unwrap();
        assert_eq!(inner.start_playing().unwrap_err(), RoomError::NoClips);
        assert_eq!(inner.phase, Phase::Upload);
    }

    #[test]
    fn clip_quota_is_enforced() {
        let mut inner = room_with_players(&["p1", "p2"]);
        inner.start_game().unwrap();
        for i in 0..MAX_CLIPS_PER_PLAYER {
            inner
                .add_clip("p1".to_string(), format!("c{i}"), format!("c{i}.mp4"))
                .unwrap();
        }
        let err = inner
            .add_clip("p1".to_string(), "c-over".to_string(), "x.mp4".to_string())
            .unwrap_err();
        assert_eq!(err, RoomError::QuotaExceeded);
        // other players are unaffected
        inner
            .add_clip("p2".to_string(), "c-p2".to_string(), "y.mp4".to_string())
            .unwrap();
    }

    #[test]
    fn clip_owner_must_be_a_member() {
        let mut inner = room_with_players(&["p1", "p2"]);
        let err = inner
            .add_clip("ghost".to_string(), "c1".to_string(), "c1.mp4".to_string())
            .unwrap_err();
        assert_eq!(err, RoomError::UnknownPlayer);
    }

    #[test]
    fn play_order_is_a_permutation_of_the_clip_set() {
        for _ in 0..20 {
            let inner = playing_room(&["p1", "p2", "p3"]);
            let expected: BTreeSet<_> = inner.clips.iter().map(|c| c.id.clone()).collect();
            let got: BTreeSet<_> = inner.play_order.iter().cloned().collect();
            assert_eq!(got, expected);
            assert_eq!(inner.play_order.len(), inner.clips.len());
            assert_eq!(inner.current_index, 0);
        }
    }

    #[test]
    fn reveal_awards_one_point_per_correct_voter() {
        let mut inner = playing_room(&["p1", "p2", "p3"]);
        // make the current clip belong to p1
        let clip_id = inner.current_clip_id().unwrap().clone();
        let owner = inner
            .clips
            .iter()
            .find(|c| c.id == clip_id)
            .unwrap()
            .owner_id
            .clone();
        let others: Vec<String> = inner
            .players
            .iter()
            .map(|p| p.id.clone())
            .filter(|id| *id != owner)
            .collect();

        // one correct accusation, one wrong one
        inner.cast_vote(&others[0], owner.clone()).unwrap();
        inner.cast_vote(&others[1], others[0].clone()).unwrap();

        let reveal = inner.reveal().unwrap();
        assert_eq!(reveal.owner_id, owner);
        assert_eq!(inner.player(&others[0]).unwrap().score, 1);
        assert_eq!(inner.player(&others[1]).unwrap().score, 0);
        assert_eq!(inner.player(&owner).unwrap().score, 0);
        assert_eq!(inner.phase, Phase::Reveal);
    }

    #[test]
    fn last_vote_before_reveal_wins() {
        let mut inner = playing_room(&["p1", "p2", "p3"]);
        let clip_id = inner.current_clip_id().unwrap().clone();
        let owner = inner
            .clips
            .iter()
            .find(|c| c.id == clip_id)
            .unwrap()
            .owner_id
            .clone();
        let voter = inner
            .players
            .iter()
            .map(|p| p.id.clone())
            .find(|id| *id != owner)
            .unwrap();

        inner.cast_vote(&voter, "wrong-guess".to_string()).unwrap();
        inner.cast_vote(&voter, owner.clone()).unwrap();
        assert_eq!(inner.votes[&clip_id].len(), 1);

        inner.reveal().unwrap();
        assert_eq!(inner.player(&voter).unwrap().score, 1);
    }

    #[test]
    fn quorum_triggers_reveal() {
        let mut inner = playing_room(&["p1", "p2"]);
        let clip_id = inner.current_clip_id().unwrap().clone();
        let owner = inner
            .clips
            .iter()
            .find(|c| c.id == clip_id)
            .unwrap()
            .owner_id
            .clone();

        match inner.cast_vote("p1", owner.clone()).unwrap() {
            VoteOutcome::Recorded { count, total } => {
                assert_eq!((count, total), (1, 2));
            }
            VoteOutcome::Quorum { .. } => panic!("quorum too early"),
        }
        match inner.cast_vote("p2", owner.clone()).unwrap() {
            VoteOutcome::Quorum { count, total, .. } => {
                assert_eq!((count, total), (2, 2));
            }
            VoteOutcome::Recorded { .. } => panic!("expected quorum"),
        }
        assert_eq!(inner.phase, Phase::Reveal);
    }

    #[test]
    fn reveal_executes_at_most_once_per_clip() {
        let mut inner = playing_room(&["p1", "p2"]);
        let clip_id = inner.current_clip_id().unwrap().clone();
        let owner = inner
            .clips
            .iter()
            .find(|c| c.id == clip_id)
            .unwrap()
            .owner_id
            .clone();
        let voter = inner
            .players
            .iter()
            .map(|p| p.id.clone())
            .find(|id| *id != owner)
            .unwrap();
        inner.cast_vote(&voter, owner.clone()).unwrap();

        inner.reveal().unwrap();
        let score_after_first = inner.player(&voter).unwrap().score;
        assert_eq!(inner.reveal().unwrap_err(), RoomError::WrongPhase);
        assert_eq!(inner.player(&voter).unwrap().score, score_after_first);
    }

    #[test]
    fn cast_vote_outside_playing_is_rejected_without_side_effects() {
        let mut inner = room_with_players(&["p1", "p2"]);
        let err = inner.cast_vote("p1", "p2".to_string()).unwrap_err();
        assert_eq!(err, RoomError::WrongPhase);
        assert!(inner.votes.is_empty());
    }

    #[test]
    fn next_video_advances_and_restamps_the_clock() {
        let mut inner = playing_room(&["p1", "p2"]);
        assert_eq!(inner.play_order.len(), 2);
        inner.reveal().unwrap();

        let before = inner.vote_started_at.unwrap();
        match inner.next_video().unwrap() {
            Advance::Play => {}
            Advance::Leaderboard(_) => panic!("one clip should remain"),
        }
        assert_eq!(inner.phase, Phase::Playing);
        assert_eq!(inner.current_index, 1);
        assert!(inner.vote_started_at.unwrap() >= before);
    }

    #[test]
    fn next_video_outside_reveal_is_a_guard_failure() {
        let mut inner = playing_room(&["p1", "p2"]);
        assert_eq!(inner.next_video().unwrap_err(), RoomError::WrongPhase);
        assert_eq!(inner.current_index, 0);
    }

    #[test]
    fn final_next_video_produces_tiebroken_leaderboard() {
        let mut inner = playing_room(&["p1", "p2", "p3"]);
        inner.players[0].score = 2;
        inner.players[1].score = 2;
        inner.players[2].score = 1;
        // jump to the last clip's reveal
        inner.current_index = inner.play_order.len() - 1;
        inner.phase = Phase::Reveal;

        let entries = match inner.next_video().unwrap() {
            Advance::Leaderboard(entries) => entries,
            Advance::Play => panic!("play order should be exhausted"),
        };
        assert_eq!(inner.phase, Phase::Leaderboard);
        let ranked: Vec<(&str, usize)> =
            entries.iter().map(|e| (e.id.as_str(), e.rank)).collect();
        assert_eq!(ranked, vec![("p1", 1), ("p2", 2), ("p3", 3)]);
    }

    #[test]
    fn clip_removal_is_blocked_mid_game() {
        let mut inner = playing_room(&["p1", "p2"]);
        let clip_id = inner.clips[0].id.clone();
        assert_eq!(
            inner.remove_clip(&clip_id).unwrap_err(),
            RoomError::WrongPhase
        );
        assert_eq!(inner.clips.len(), 2);
    }
}
