//! The room aggregate.
//!
//! `Room` is plain data with read-only accessors. Everything that changes a
//! room goes through [`RoomStore`](crate::RoomStore), which keeps the turn
//! timer in step with the current caller.

use std::collections::BTreeSet;

use bingo_relay_protocol::{Player, PlayerId, RoomCode, RoomInfo};

use crate::{RoomPhase, RoomSettings};

/// A recorded bingo claim. The server does not verify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Winner {
    pub player_id: PlayerId,
    /// Display text supplied by the claimant, e.g. `"Alice (Row 2)"`.
    pub description: String,
    pub pattern: String,
    pub completed_lines: u32,
    pub won_at: u64,
}

/// One game room.
///
/// # Invariants
///
/// - `players` has no duplicate ids and no duplicate names; its order is
///   join order and defines the calling rotation.
/// - Exactly one player has `is_host` whenever `players` is non-empty, and
///   it is the player named by `host`.
/// - While in progress, `called_numbers` and `available_numbers` partition
///   1..=N².
/// - `current_caller`, when set, is a member.
#[derive(Debug, Clone)]
pub struct Room {
    pub(crate) code: RoomCode,
    pub(crate) players: Vec<Player>,
    pub(crate) host: PlayerId,
    pub(crate) settings: RoomSettings,
    pub(crate) phase: RoomPhase,
    pub(crate) called_numbers: Vec<u32>,
    pub(crate) available_numbers: BTreeSet<u32>,
    pub(crate) current_caller: Option<PlayerId>,
    pub(crate) winner: Option<Winner>,
    pub(crate) created_at: u64,
}

impl Room {
    pub(crate) fn new(code: RoomCode, host: Player, settings: RoomSettings, created_at: u64) -> Self {
        Self {
            code,
            host: host.id.clone(),
            players: vec![host],
            available_numbers: settings.number_range().collect(),
            settings,
            phase: RoomPhase::Lobby,
            called_numbers: Vec::new(),
            current_caller: None,
            winner: None,
            created_at,
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Members in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn has_player(&self, id: &PlayerId) -> bool {
        self.player(id).is_some()
    }

    pub fn host(&self) -> &PlayerId {
        &self.host
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// `true` between `start_game` and a recorded win.
    pub fn is_started(&self) -> bool {
        self.phase.is_active()
    }

    /// Numbers called so far, in call order.
    pub fn called_numbers(&self) -> &[u32] {
        &self.called_numbers
    }

    /// Numbers not yet called, ascending.
    pub fn available_numbers(&self) -> Vec<u32> {
        self.available_numbers.iter().copied().collect()
    }

    pub fn is_available(&self, number: u32) -> bool {
        self.available_numbers.contains(&number)
    }

    pub fn current_caller(&self) -> Option<&PlayerId> {
        self.current_caller.as_ref()
    }

    pub fn winner(&self) -> Option<&Winner> {
        self.winner.as_ref()
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Settings as sent to a joining client.
    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            matrix_size: self.settings.matrix_size,
            winning_criteria: self.settings.winning_criteria,
            turn_time_limit: self.settings.turn_limit.as_secs(),
            created_at: self.created_at,
        }
    }

    /// The player after `id` in the rotation, wrapping at the end.
    ///
    /// Computed over the current member list, so joins extend the rotation
    /// and departures shrink it. Falls back to the first player if `id` is
    /// not a member.
    pub fn next_after(&self, id: &PlayerId) -> Option<&PlayerId> {
        if self.players.is_empty() {
            return None;
        }
        let next = match self.players.iter().position(|p| &p.id == id) {
            Some(idx) => (idx + 1) % self.players.len(),
            None => 0,
        };
        Some(&self.players[next].id)
    }

    /// Hands the turn to the next player. Returns `(previous, next)`.
    pub(crate) fn rotate_caller(&mut self) -> Option<(PlayerId, PlayerId)> {
        let previous = self.current_caller.clone()?;
        let next = self.next_after(&previous)?.clone();
        self.current_caller = Some(next.clone());
        Some((previous, next))
    }

    /// Resets both number sets to a fresh game.
    pub(crate) fn reset_numbers(&mut self) {
        self.called_numbers.clear();
        self.available_numbers = self.settings.number_range().collect();
    }

    /// Moves the host flag to `players[0]`. Returns the new host.
    pub(crate) fn promote_first(&mut self) -> Option<PlayerId> {
        let first = self.players.first_mut()?;
        first.is_host = true;
        self.host = first.id.clone();
        Some(self.host.clone())
    }
}
