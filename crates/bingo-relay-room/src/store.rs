//! Room store: every room in the process, and their turn timers.

use std::collections::HashMap;

use bingo_relay_protocol::{Player, PlayerId, RoomCode, now_millis};
use bingo_relay_timer::{Expired, TurnTimers};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::card::{generate_card, validate_card};
use crate::{Room, RoomError, RoomPhase, RoomSettings, Winner};

/// What happened when a player was removed from a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    /// The departed player, as they were in the room.
    pub left: Player,
    /// Remaining members in turn order. Empty if the room was deleted.
    pub players: Vec<Player>,
    /// Host after the removal. `None` once the room is gone.
    pub host: Option<PlayerId>,
    /// Whether the departed player was host and someone was promoted.
    pub host_changed: bool,
    /// Set when the departed player held the turn in a running game.
    pub caller_change: Option<CallerChange>,
    pub room_deleted: bool,
}

/// The turn moved to someone else because the caller left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerChange {
    pub previous: PlayerId,
    pub current: PlayerId,
}

/// The turn moved on without a number being called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnAdvance {
    pub skipped: PlayerId,
    pub next_caller: PlayerId,
}

/// Result of a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub number: u32,
    pub called_by: PlayerId,
    pub called_numbers: Vec<u32>,
    pub available_numbers: Vec<u32>,
    pub next_caller: PlayerId,
}

/// Owns every room and the timer table keyed by room code.
///
/// This is the only place rooms are mutated. Any operation that
/// establishes a new current caller in a running game arms that room's
/// timer; any operation that ends or deletes a game cancels it.
pub struct RoomStore {
    rooms: HashMap<RoomCode, Room>,
    timers: TurnTimers<RoomCode>,
}

impl RoomStore {
    /// Creates an empty store and the receiver its turn timers report on.
    ///
    /// Feed everything that arrives on the receiver back into
    /// [`expire_turn`](Self::expire_turn).
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Expired<RoomCode>>) {
        let (timers, expiries) = TurnTimers::channel();
        let store = Self {
            rooms: HashMap::new(),
            timers,
        };
        (store, expiries)
    }

    // =====================================================================
    // Membership
    // =====================================================================

    /// Creates a room with `host_id` as its only member and host.
    ///
    /// # Errors
    /// - [`RoomError::DuplicateRoom`]: the code is taken
    /// - [`RoomError::InvalidCard`]: `card` is not a permutation of 1..=N²
    pub fn create_room(
        &mut self,
        code: RoomCode,
        host_id: PlayerId,
        host_name: String,
        card: Vec<u32>,
        settings: RoomSettings,
    ) -> Result<&Room, RoomError> {
        if self.rooms.contains_key(&code) {
            return Err(RoomError::DuplicateRoom(code));
        }
        validate_card(&card, settings.matrix_size).map_err(RoomError::InvalidCard)?;

        let now = now_millis();
        let host = Player {
            id: host_id,
            name: host_name,
            is_host: true,
            joined_at: now,
            bingo_card: card,
        };

        info!(
            room_code = %code,
            host = %host.id,
            matrix_size = settings.matrix_size,
            turn_limit_secs = settings.turn_limit.as_secs(),
            "room created"
        );
        let room = Room::new(code.clone(), host, settings, now);
        Ok(&*self.rooms.entry(code).or_insert(room))
    }

    /// Appends a player to the end of the rotation.
    ///
    /// When `card` is `None` a shuffled one is dealt.
    ///
    /// # Errors
    /// - [`RoomError::RoomNotFound`]
    /// - [`RoomError::AlreadyInRoom`]: same id is already a member
    /// - [`RoomError::DuplicateName`]: exact, case-sensitive name match
    /// - [`RoomError::InvalidCard`]
    pub fn join_room(
        &mut self,
        code: &RoomCode,
        player_id: PlayerId,
        name: String,
        card: Option<Vec<u32>>,
    ) -> Result<&Room, RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;

        if room.has_player(&player_id) {
            return Err(RoomError::AlreadyInRoom(player_id));
        }
        if room.players.iter().any(|p| p.name == name) {
            return Err(RoomError::DuplicateName(name));
        }

        let n = room.settings.matrix_size;
        let card = match card {
            Some(card) => {
                validate_card(&card, n).map_err(RoomError::InvalidCard)?;
                card
            }
            None => generate_card(n),
        };

        info!(room_code = %code, player_id = %player_id, players = room.players.len() + 1, "player joined");
        room.players.push(Player {
            id: player_id,
            name,
            is_host: false,
            joined_at: now_millis(),
            bingo_card: card,
        });
        Ok(&*room)
    }

    /// Removes a player. The same path serves a graceful leave and a
    /// dropped connection.
    ///
    /// - If the host left, `players[0]` becomes host.
    /// - If the room is now empty it is deleted and its timer cancelled.
    /// - If the current caller left a running game, the turn goes to
    ///   `players[0]` and the timer restarts for them. Outside a running
    ///   game the caller is simply cleared.
    ///
    /// # Errors
    /// - [`RoomError::RoomNotFound`]
    /// - [`RoomError::NotInRoom`]
    pub fn remove_player(&mut self, code: &RoomCode, player_id: &PlayerId) -> Result<Removal, RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
        let idx = room
            .players
            .iter()
            .position(|p| &p.id == player_id)
            .ok_or_else(|| RoomError::NotInRoom(player_id.clone()))?;

        let left = room.players.remove(idx);
        info!(room_code = %code, player_id = %player_id, remaining = room.players.len(), "player left");

        if room.players.is_empty() {
            self.rooms.remove(code);
            self.timers.cancel(code);
            info!(room_code = %code, "room deleted");
            return Ok(Removal {
                left,
                players: Vec::new(),
                host: None,
                host_changed: false,
                caller_change: None,
                room_deleted: true,
            });
        }

        let host_changed = left.is_host;
        if host_changed {
            if let Some(new_host) = room.promote_first() {
                info!(room_code = %code, new_host = %new_host, "host reassigned");
            }
        }

        let mut caller_change = None;
        if room.current_caller.as_ref() == Some(&left.id) {
            if room.phase.is_active() {
                let current = room.players[0].id.clone();
                room.current_caller = Some(current.clone());
                caller_change = Some(CallerChange {
                    previous: left.id.clone(),
                    current,
                });
                sync_timer(&mut self.timers, room);
            } else {
                room.current_caller = None;
            }
        }

        Ok(Removal {
            left,
            players: room.players.clone(),
            host: Some(room.host.clone()),
            host_changed,
            caller_change,
            room_deleted: false,
        })
    }

    // =====================================================================
    // Game flow
    // =====================================================================

    /// Starts (or restarts) a game with `caller` holding the first turn.
    ///
    /// Resets both number sets and clears any previous winner.
    ///
    /// # Errors
    /// - [`RoomError::RoomNotFound`]
    /// - [`RoomError::NotInRoom`]: `caller` is not a member
    pub fn start_game(&mut self, code: &RoomCode, caller: &PlayerId) -> Result<&Room, RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
        if !room.has_player(caller) {
            return Err(RoomError::NotInRoom(caller.clone()));
        }

        room.phase = RoomPhase::InProgress;
        room.reset_numbers();
        room.winner = None;
        room.current_caller = Some(caller.clone());
        sync_timer(&mut self.timers, room);

        info!(room_code = %code, caller = %caller, players = room.players.len(), "game started");
        Ok(&*room)
    }

    /// Records a call by the current caller and passes the turn on.
    ///
    /// The next caller is the player after the current one in the member
    /// list as it stands now.
    ///
    /// # Errors
    /// - [`RoomError::RoomNotFound`]
    /// - [`RoomError::InvalidState`]: no game running
    /// - [`RoomError::NumberOutOfRange`]
    /// - [`RoomError::NumberAlreadyCalled`]
    pub fn record_call(&mut self, code: &RoomCode, number: u32) -> Result<CallOutcome, RoomError> {
        let room = active_room(&mut self.rooms, code)?;

        let max = room.settings.max_number();
        if !(1..=max).contains(&number) {
            return Err(RoomError::NumberOutOfRange(number, max));
        }
        if !room.available_numbers.remove(&number) {
            return Err(RoomError::NumberAlreadyCalled(number));
        }
        room.called_numbers.push(number);

        let Some((called_by, next_caller)) = room.rotate_caller() else {
            return Err(RoomError::InvalidState("nobody holds the turn".into()));
        };
        debug!(
            room_code = %code,
            number,
            called_by = %called_by,
            next_caller = %next_caller,
            remaining = room.available_numbers.len(),
            "number called"
        );

        let outcome = CallOutcome {
            number,
            called_by,
            called_numbers: room.called_numbers.clone(),
            available_numbers: room.available_numbers(),
            next_caller,
        };
        sync_timer(&mut self.timers, room);
        Ok(outcome)
    }

    /// Passes the turn without calling a number.
    ///
    /// # Errors
    /// - [`RoomError::RoomNotFound`]
    /// - [`RoomError::InvalidState`]: no game running
    pub fn skip_turn(&mut self, code: &RoomCode) -> Result<TurnAdvance, RoomError> {
        let room = active_room(&mut self.rooms, code)?;
        let (skipped, next_caller) = room
            .rotate_caller()
            .ok_or_else(|| RoomError::InvalidState("nobody holds the turn".into()))?;
        debug!(room_code = %code, skipped = %skipped, next_caller = %next_caller, "turn skipped");
        sync_timer(&mut self.timers, room);
        Ok(TurnAdvance { skipped, next_caller })
    }

    /// Records the first claim of a running game and ends it.
    ///
    /// Returns `Ok(None)` if a winner is already recorded, so a second
    /// claim changes nothing.
    ///
    /// # Errors
    /// - [`RoomError::RoomNotFound`]
    /// - [`RoomError::InvalidState`]: the game was never started
    pub fn record_win(&mut self, code: &RoomCode, winner: Winner) -> Result<Option<&Winner>, RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;

        if room.winner.is_some() {
            debug!(room_code = %code, claimant = %winner.player_id, "late bingo claim ignored");
            return Ok(None);
        }
        if !room.phase.is_active() {
            return Err(not_in_progress(room.phase));
        }

        info!(
            room_code = %code,
            winner = %winner.player_id,
            pattern = %winner.pattern,
            lines = winner.completed_lines,
            "game won"
        );
        room.phase = RoomPhase::Finished;
        self.timers.cancel(code);
        let winner = room.winner.insert(winner);
        Ok(Some(&*winner))
    }

    /// Handles a turn timer expiry.
    ///
    /// Returns `None` when the expiry is stale: the timer was cancelled or
    /// re-armed after it started, the room is gone, or the game ended.
    /// Otherwise the turn rotates exactly like a manual skip and the timer
    /// restarts for the new caller.
    pub fn expire_turn(&mut self, expired: &Expired<RoomCode>) -> Option<TurnAdvance> {
        let code = &expired.key;
        if !self.timers.claim(expired) {
            debug!(
                room_code = %code,
                generation = expired.generation,
                armed = ?self.timers.generation(code),
                "stale turn expiry dropped"
            );
            return None;
        }
        let Some(room) = self.rooms.get_mut(code) else {
            debug!(room_code = %code, "turn expired for deleted room");
            return None;
        };
        if !room.phase.is_active() {
            return None;
        }

        let (skipped, next_caller) = room.rotate_caller()?;
        info!(room_code = %code, skipped = %skipped, next_caller = %next_caller, "turn timed out");
        sync_timer(&mut self.timers, room);
        Some(TurnAdvance { skipped, next_caller })
    }

    // =====================================================================
    // Queries
    // =====================================================================

    pub fn get(&self, code: &RoomCode) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn contains(&self, code: &RoomCode) -> bool {
        self.rooms.contains_key(code)
    }

    /// Number of live rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Players across all rooms.
    pub fn player_count(&self) -> usize {
        self.rooms.values().map(|r| r.players.len()).sum()
    }

    /// Whether a turn timer is pending for the room.
    pub fn is_timer_armed(&self, code: &RoomCode) -> bool {
        self.timers.is_armed(code)
    }

    /// Rooms with a pending turn timer.
    pub fn armed_timers(&self) -> usize {
        self.timers.armed_count()
    }
}

fn active_room<'a>(rooms: &'a mut HashMap<RoomCode, Room>, code: &RoomCode) -> Result<&'a mut Room, RoomError> {
    let room = rooms
        .get_mut(code)
        .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
    if !room.phase.is_active() {
        return Err(not_in_progress(room.phase));
    }
    Ok(room)
}

fn not_in_progress(phase: RoomPhase) -> RoomError {
    RoomError::InvalidState(format!("no game in progress (room is {phase})"))
}

/// Arms the room's timer if someone can still take a turn, cancels it
/// otherwise. A game whose numbers are exhausted keeps its caller but
/// stops counting down.
fn sync_timer(timers: &mut TurnTimers<RoomCode>, room: &Room) {
    let open = room.phase.is_active()
        && room.winner.is_none()
        && room.current_caller.is_some()
        && !room.available_numbers.is_empty();
    if open {
        timers.arm(room.code.clone(), room.settings.turn_limit);
    } else {
        timers.cancel(&room.code);
    }
}
