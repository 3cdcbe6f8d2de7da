//! Room settings and lifecycle phase.

use std::fmt;
use std::time::Duration;

use bingo_relay_protocol::WinningCriteria;

// ---------------------------------------------------------------------------
// RoomSettings
// ---------------------------------------------------------------------------

/// Settings fixed when the room is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomSettings {
    /// N, for an N×N card numbered 1..=N².
    pub matrix_size: usize,
    pub winning_criteria: WinningCriteria,
    /// How long a caller has before the turn is skipped for them.
    pub turn_limit: Duration,
}

impl RoomSettings {
    /// Highest number on a card, N².
    pub fn max_number(&self) -> u32 {
        (self.matrix_size * self.matrix_size) as u32
    }

    /// Every number on a card, ascending.
    pub fn number_range(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.max_number()
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            matrix_size: 5,
            winning_criteria: WinningCriteria::Standard,
            turn_limit: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// Where a room is in its lifecycle.
///
/// ```text
/// Lobby ──start──→ InProgress ──win──→ Finished
///                      ▲                   │
///                      └──────start────────┘
/// ```
///
/// A room leaves every phase the same way: its last player departs and
/// the store deletes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomPhase {
    /// Created, waiting for the host to start.
    #[default]
    Lobby,
    /// Numbers are being called; a turn timer is normally armed.
    InProgress,
    /// A winner was recorded. The room stays open for another game.
    Finished,
}

impl RoomPhase {
    /// `true` while numbers may be called.
    pub fn is_active(self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => f.write_str("in the lobby"),
            Self::InProgress => f.write_str("playing"),
            Self::Finished => f.write_str("finished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_range_covers_whole_card() {
        let settings = RoomSettings {
            matrix_size: 3,
            ..Default::default()
        };
        assert_eq!(settings.max_number(), 9);
        assert_eq!(settings.number_range().collect::<Vec<_>>(), (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn test_only_in_progress_is_active() {
        assert!(!RoomPhase::Lobby.is_active());
        assert!(RoomPhase::InProgress.is_active());
        assert!(!RoomPhase::Finished.is_active());
    }

    #[test]
    fn test_phase_display_reads_as_a_sentence_tail() {
        assert_eq!(RoomPhase::Lobby.to_string(), "in the lobby");
        assert_eq!(RoomPhase::Finished.to_string(), "finished");
    }
}
