//! Per-room turn timers for the bingo relay.
//!
//! Each active room has at most one armed countdown. When it runs out, the
//! timer does not touch any game state itself: it posts an [`Expired`]
//! event to a channel, and whoever owns the rooms decides what that means.
//!
//! # Integration
//!
//! The expiry receiver is meant to sit next to the inbound message channel
//! inside the coordinator's `tokio::select!` loop:
//!
//! ```ignore
//! let (mut timers, mut expiries) = TurnTimers::channel();
//! loop {
//!     tokio::select! {
//!         Some(event) = events.recv() => { /* may call timers.arm / cancel */ }
//!         Some(expired) = expiries.recv() => {
//!             if timers.claim(&expired) {
//!                 // rotate the caller, broadcast, re-arm
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! # Stale expiries
//!
//! A countdown can finish and queue its event just before the owner cancels
//! or re-arms it. Every arm therefore gets a fresh generation number, and
//! [`TurnTimers::claim`] only accepts an expiry whose generation is still
//! the armed one. Anything else is dropped.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Bounds on the per-turn time limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTimerConfig {
    /// Used when a room does not ask for a specific limit.
    pub default_limit: Duration,
    /// Shortest limit a room may request.
    pub min_limit: Duration,
    /// Longest limit a room may request.
    pub max_limit: Duration,
}

impl Default for TurnTimerConfig {
    fn default() -> Self {
        Self {
            default_limit: Duration::from_secs(30),
            min_limit: Duration::from_secs(5),
            max_limit: Duration::from_secs(300),
        }
    }
}

impl TurnTimerConfig {
    /// Fix any out-of-range values so the config is safe to use.
    ///
    /// - `min_limit` is at least one second.
    /// - `max_limit` is forced ≥ `min_limit`.
    /// - `default_limit` is clamped into `min_limit..=max_limit`.
    pub fn validated(mut self) -> Self {
        if self.min_limit < Duration::from_secs(1) {
            warn!(min = ?self.min_limit, "min turn limit below 1s, raising");
            self.min_limit = Duration::from_secs(1);
        }
        if self.max_limit < self.min_limit {
            warn!(
                min = ?self.min_limit,
                max = ?self.max_limit,
                "max turn limit below min, raising to min"
            );
            self.max_limit = self.min_limit;
        }
        let clamped = self.default_limit.clamp(self.min_limit, self.max_limit);
        if clamped != self.default_limit {
            warn!(
                requested = ?self.default_limit,
                clamped = ?clamped,
                "default turn limit out of range, clamping"
            );
            self.default_limit = clamped;
        }
        self
    }

    /// The limit to use for a room that asked for `requested` seconds.
    ///
    /// `None` means the default. Out-of-range requests are clamped rather
    /// than rejected.
    pub fn limit_for(&self, requested: Option<u64>) -> Duration {
        match requested {
            None => self.default_limit,
            Some(secs) => {
                let wanted = Duration::from_secs(secs);
                let limit = wanted.clamp(self.min_limit, self.max_limit);
                if limit != wanted {
                    debug!(requested = secs, clamped = limit.as_secs(), "turn limit clamped");
                }
                limit
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Expiry events
// ---------------------------------------------------------------------------

/// Posted when an armed countdown runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expired<K> {
    pub key: K,
    /// The generation handed out by the [`TurnTimers::arm`] call that
    /// started this countdown.
    pub generation: u64,
}

// ---------------------------------------------------------------------------
// Timer table
// ---------------------------------------------------------------------------

struct Slot {
    generation: u64,
    task: JoinHandle<()>,
}

/// At most one pending countdown per key.
///
/// Arming a key that already has a countdown replaces it. Cancelling a key
/// with nothing armed is a no-op. Dropping the table aborts everything
/// still pending.
pub struct TurnTimers<K> {
    slots: HashMap<K, Slot>,
    next_generation: u64,
    expiry_tx: mpsc::UnboundedSender<Expired<K>>,
}

impl<K> TurnTimers<K>
where
    K: Clone + Eq + Hash + Debug + Send + 'static,
{
    /// Creates an empty table and the receiver its expiries arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Expired<K>>) {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let timers = Self {
            slots: HashMap::new(),
            next_generation: 0,
            expiry_tx,
        };
        (timers, expiry_rx)
    }

    /// Starts a countdown for `key`, replacing any countdown already armed
    /// for it. Returns the new generation.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm(&mut self, key: K, after: Duration) -> u64 {
        self.cancel(&key);

        self.next_generation += 1;
        let generation = self.next_generation;

        let tx = self.expiry_tx.clone();
        let fired = key.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // The receiver only goes away when the owner is shutting down.
            let _ = tx.send(Expired {
                key: fired,
                generation,
            });
        });

        trace!(key = ?key, generation, after_ms = after.as_millis() as u64, "turn timer armed");
        self.slots.insert(key, Slot { generation, task });
        generation
    }

    /// Cancels the countdown for `key`. Returns whether one was armed.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.slots.remove(key) {
            Some(slot) => {
                slot.task.abort();
                trace!(key = ?key, generation = slot.generation, "turn timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Accepts an expiry if it belongs to the countdown currently armed for
    /// its key, and disarms that key.
    ///
    /// Returns `false` for stale expiries: the key was cancelled or re-armed
    /// after this countdown started.
    pub fn claim(&mut self, expired: &Expired<K>) -> bool {
        match self.slots.get(&expired.key) {
            Some(slot) if slot.generation == expired.generation => {
                self.slots.remove(&expired.key);
                true
            }
            _ => {
                debug!(
                    key = ?expired.key,
                    generation = expired.generation,
                    "stale turn timer expiry ignored"
                );
                false
            }
        }
    }

    /// Whether a countdown is pending for `key`.
    pub fn is_armed(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Generation of the countdown pending for `key`, if any.
    pub fn generation(&self, key: &K) -> Option<u64> {
        self.slots.get(key).map(|s| s.generation)
    }

    /// Number of keys with a pending countdown.
    pub fn armed_count(&self) -> usize {
        self.slots.len()
    }
}

impl<K> Drop for TurnTimers<K> {
    fn drop(&mut self) {
        for slot in self.slots.values() {
            slot.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_clamps_default_into_range() {
        let cfg = TurnTimerConfig {
            default_limit: Duration::from_secs(1_000),
            ..Default::default()
        }
        .validated();

        assert_eq!(cfg.default_limit, Duration::from_secs(300));
    }

    #[test]
    fn test_validated_raises_max_below_min() {
        let cfg = TurnTimerConfig {
            default_limit: Duration::from_secs(20),
            min_limit: Duration::from_secs(10),
            max_limit: Duration::from_secs(2),
        }
        .validated();

        assert_eq!(cfg.max_limit, Duration::from_secs(10));
        assert_eq!(cfg.default_limit, Duration::from_secs(10));
    }

    #[test]
    fn test_validated_raises_zero_min() {
        let cfg = TurnTimerConfig {
            min_limit: Duration::ZERO,
            ..Default::default()
        }
        .validated();

        assert_eq!(cfg.min_limit, Duration::from_secs(1));
    }

    #[test]
    fn test_limit_for_none_uses_default() {
        let cfg = TurnTimerConfig::default();
        assert_eq!(cfg.limit_for(None), Duration::from_secs(30));
    }

    #[test]
    fn test_limit_for_clamps_both_ends() {
        let cfg = TurnTimerConfig::default();
        assert_eq!(cfg.limit_for(Some(1)), Duration::from_secs(5));
        assert_eq!(cfg.limit_for(Some(10)), Duration::from_secs(10));
        assert_eq!(cfg.limit_for(Some(9_999)), Duration::from_secs(300));
    }
}
