//! Message router: one handler per client message type.
//!
//! Handlers take the coordinator's state, apply a single Room Store
//! operation, and return the events to fan out. They never deliver
//! anything themselves, so a failed request leaves no half-sent trail.
//!
//! | inbound        | outbound                                          |
//! |----------------|---------------------------------------------------|
//! | `create_room`  | `room_joined` → sender                            |
//! | `join_room`    | `room_joined` → sender, `player_joined` → others  |
//! | `start_game`   | `game_started` → room                             |
//! | `call_number`  | `number_called` → room                            |
//! | `skip_turn`    | `turn_skipped` → room                             |
//! | `claim_bingo`  | `game_won` → room (first claim only)              |
//! | `leave_room`   | `player_left` (+ `caller_changed`) → remaining    |
//! | `ping`         | `pong` → sender                                   |

use bingo_relay_protocol::{
    CallerChangeReason, ClientMessage, PlayerId, Recipient, RoomCode, ServerMessage, SkipReason,
    now_millis,
};
use bingo_relay_room::{Room, RoomSettings, Winner};
use bingo_relay_session::Binding;
use bingo_relay_transport::ConnectionId;
use tracing::debug;

use crate::RequestError;
use crate::coordinator::SessionCoordinator;

/// An event and where it goes.
pub type Outbound = (Recipient, ServerMessage);

/// Routes one decoded client message.
///
/// # Errors
/// Any [`RequestError`]; the caller reports it to `conn_id` only.
pub(crate) fn route(
    coord: &mut SessionCoordinator,
    conn_id: ConnectionId,
    msg: ClientMessage,
) -> Result<Vec<Outbound>, RequestError> {
    match msg {
        ClientMessage::CreateRoom {
            room_code,
            player_name,
            player_id,
            matrix_size,
            bingo_card,
            winning_criteria,
            turn_time_limit,
        } => {
            require_text("roomCode", room_code.as_str())?;
            require_text("playerName", &player_name)?;
            require_text("playerId", player_id.as_str())?;
            if !coord.limits.allows_matrix_size(matrix_size) {
                return Err(RequestError::BadRequest(format!(
                    "matrixSize must be within {}..={}",
                    coord.limits.matrix_sizes.start(),
                    coord.limits.matrix_sizes.end()
                )));
            }
            coord.registry.check_available(conn_id, &player_id)?;

            let settings = RoomSettings {
                matrix_size,
                winning_criteria,
                turn_limit: coord.limits.turn.limit_for(turn_time_limit),
            };
            let room = coord.rooms.create_room(
                room_code.clone(),
                player_id.clone(),
                player_name,
                bingo_card,
                settings,
            )?;
            let joined = room_joined(room, &player_id);
            coord.registry.register(conn_id, player_id, room_code)?;

            Ok(vec![(Recipient::Connection(conn_id), joined)])
        }

        ClientMessage::JoinRoom {
            room_code,
            player_name,
            player_id,
            bingo_card,
        } => {
            require_text("playerName", &player_name)?;
            require_text("playerId", player_id.as_str())?;
            coord.registry.check_available(conn_id, &player_id)?;

            let room = coord
                .rooms
                .join_room(&room_code, player_id.clone(), player_name, bingo_card)?;
            let joined = room_joined(room, &player_id);
            let players = room.players().to_vec();
            let new_player = players
                .last()
                .cloned()
                .ok_or_else(|| RequestError::BadRequest("room has no players".into()))?;
            coord
                .registry
                .register(conn_id, player_id.clone(), room_code.clone())?;

            Ok(vec![
                (Recipient::Connection(conn_id), joined),
                (
                    Recipient::RoomExcept(room_code, player_id),
                    ServerMessage::PlayerJoined { players, new_player },
                ),
            ])
        }

        ClientMessage::StartGame {
            room_code,
            current_caller,
            ..
        } => {
            member(coord, conn_id, &room_code)?;
            let room = coord.rooms.start_game(&room_code, &current_caller)?;

            Ok(vec![(
                Recipient::Room(room_code),
                ServerMessage::GameStarted {
                    current_caller,
                    available_numbers: room.available_numbers(),
                    game_started_at: now_millis(),
                },
            )])
        }

        ClientMessage::CallNumber {
            room_code, number, ..
        } => {
            let sender = member(coord, conn_id, &room_code)?;
            if !holds_turn(coord, &room_code, &sender) {
                debug!(%conn_id, room_code = %room_code, number, "call from non-caller discarded");
                return Ok(Vec::new());
            }
            let call = coord.rooms.record_call(&room_code, number)?;

            Ok(vec![(
                Recipient::Room(room_code),
                ServerMessage::NumberCalled {
                    number: call.number,
                    called_by: call.called_by,
                    called_numbers: call.called_numbers,
                    available_numbers: call.available_numbers,
                    next_caller: call.next_caller,
                    called_at: now_millis(),
                },
            )])
        }

        ClientMessage::SkipTurn { room_code, .. } => {
            let sender = member(coord, conn_id, &room_code)?;
            if !holds_turn(coord, &room_code, &sender) {
                debug!(%conn_id, room_code = %room_code, "skip from non-caller discarded");
                return Ok(Vec::new());
            }
            let advance = coord.rooms.skip_turn(&room_code)?;

            Ok(vec![(
                Recipient::Room(room_code),
                ServerMessage::TurnSkipped {
                    skipped: advance.skipped,
                    next_caller: advance.next_caller,
                    reason: SkipReason::Manual,
                    skipped_at: now_millis(),
                },
            )])
        }

        ClientMessage::ClaimBingo {
            room_code,
            winner,
            player_id,
            winning_pattern,
            completed_lines,
        } => {
            member(coord, conn_id, &room_code)?;
            let claim = Winner {
                player_id,
                description: winner,
                pattern: winning_pattern,
                completed_lines,
                won_at: now_millis(),
            };
            let Some(won) = coord.rooms.record_win(&room_code, claim)? else {
                return Ok(Vec::new());
            };

            Ok(vec![(
                Recipient::Room(room_code),
                ServerMessage::GameWon {
                    winner: won.description.clone(),
                    player_id: won.player_id.clone(),
                    winning_pattern: won.pattern.clone(),
                    completed_lines: won.completed_lines,
                    won_at: won.won_at,
                },
            )])
        }

        ClientMessage::LeaveRoom {
            room_code,
            player_id,
        } => {
            let Some(binding) = coord.registry.binding(conn_id).cloned() else {
                if coord.registry.resolve(&player_id).is_some() {
                    return Err(RequestError::BadRequest(
                        "You can only leave as yourself.".into(),
                    ));
                }
                debug!(%conn_id, player_id = %player_id, "leave for unregistered player ignored");
                return Ok(Vec::new());
            };
            if binding.player_id != player_id {
                return Err(RequestError::BadRequest("You can only leave as yourself.".into()));
            }
            if binding.room_code != room_code {
                return Err(RequestError::BadRequest(format!(
                    "You are not in room {room_code}."
                )));
            }
            let Some(binding) = coord.registry.unregister(&player_id) else {
                return Ok(Vec::new());
            };

            Ok(depart(coord, binding))
        }

        ClientMessage::Ping => Ok(vec![(Recipient::Connection(conn_id), ServerMessage::Pong)]),
    }
}

/// Removes a departed player from their room and describes the fallout.
///
/// Shared by `leave_room` and dropped connections, so both end in the same
/// room state. The binding has already been taken out of the registry; a
/// player that is already gone from the room yields nothing.
pub(crate) fn depart(coord: &mut SessionCoordinator, binding: Binding) -> Vec<Outbound> {
    let Binding {
        player_id,
        room_code,
    } = binding;

    let removal = match coord.rooms.remove_player(&room_code, &player_id) {
        Ok(removal) => removal,
        Err(e) => {
            debug!(room_code = %room_code, player_id = %player_id, error = %e, "departure already handled");
            return Vec::new();
        }
    };
    if removal.room_deleted {
        return Vec::new();
    }

    let mut out = vec![(
        Recipient::Room(room_code.clone()),
        ServerMessage::PlayerLeft {
            players: removal.players,
            new_host: removal.host,
            left_player: removal.left,
        },
    )];
    if let Some(change) = removal.caller_change {
        out.push((
            Recipient::Room(room_code),
            ServerMessage::CallerChanged {
                previous_caller: change.previous,
                current_caller: change.current,
                reason: CallerChangeReason::PlayerLeft,
            },
        ));
    }
    out
}

/// The full snapshot a creator or joiner receives.
fn room_joined(room: &Room, player_id: &PlayerId) -> ServerMessage {
    ServerMessage::RoomJoined {
        room_code: room.code().clone(),
        players: room.players().to_vec(),
        game_started: room.is_started(),
        current_caller: room.current_caller().cloned(),
        called_numbers: room.called_numbers().to_vec(),
        available_numbers: room.available_numbers(),
        bingo_card: room
            .player(player_id)
            .map(|p| p.bingo_card.clone())
            .unwrap_or_default(),
        room_info: room.info(),
    }
}

/// The player this connection speaks for, provided it is in `room_code`.
fn member(
    coord: &SessionCoordinator,
    conn_id: ConnectionId,
    room_code: &RoomCode,
) -> Result<PlayerId, RequestError> {
    if !coord.rooms.contains(room_code) {
        return Err(bingo_relay_room::RoomError::RoomNotFound(room_code.clone()).into());
    }
    match coord.registry.binding(conn_id) {
        Some(b) if &b.room_code == room_code => Ok(b.player_id.clone()),
        _ => Err(RequestError::BadRequest(format!(
            "You are not in room {room_code}."
        ))),
    }
}

/// Whether `player` may take a turn right now. Anything else is a stale
/// request that lost a race against a call, a skip, a timeout or a win.
fn holds_turn(coord: &SessionCoordinator, room_code: &RoomCode, player: &PlayerId) -> bool {
    coord
        .rooms
        .get(room_code)
        .is_some_and(|r| r.is_started() && r.current_caller() == Some(player))
}

fn require_text(field: &str, value: &str) -> Result<(), RequestError> {
    if value.trim().is_empty() {
        return Err(RequestError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(())
}
