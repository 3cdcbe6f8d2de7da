//! Integration tests for the turn timer table.
//!
//! Every test runs with paused time. Awaiting the expiry receiver lets
//! Tokio auto-advance the clock to the next pending sleep, so a 30-second
//! countdown resolves instantly while still being ordered correctly
//! against other timers.

use std::time::Duration;

use bingo_relay_timer::{Expired, TurnTimers};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, timeout};

// =========================================================================
// Helpers
// =========================================================================

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// Asserts nothing arrives within `window`.
async fn assert_quiet(rx: &mut UnboundedReceiver<Expired<&'static str>>, window: Duration) {
    let result = timeout(window, rx.recv()).await;
    assert!(result.is_err(), "expected no expiry, got {result:?}");
}

// =========================================================================
// arm()
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_arm_fires_after_duration() {
    let (mut timers, mut rx) = TurnTimers::channel();
    let start = Instant::now();

    let generation = timers.arm("ABCD", secs(10));

    assert_quiet(&mut rx, secs(9)).await;
    let expired = rx.recv().await.expect("timer should fire");
    assert_eq!(expired, Expired { key: "ABCD", generation });
    assert!(start.elapsed() >= secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_arm_twice_replaces_previous_countdown() {
    let (mut timers, mut rx) = TurnTimers::channel();
    let start = Instant::now();

    let first = timers.arm("ABCD", secs(10));
    tokio::time::sleep(secs(5)).await;
    let second = timers.arm("ABCD", secs(10));

    assert_ne!(first, second);
    assert_eq!(timers.armed_count(), 1);

    // Only the second countdown ever reports, at t = 15s.
    let expired = rx.recv().await.unwrap();
    assert_eq!(expired.generation, second);
    assert!(start.elapsed() >= secs(15));
    assert_quiet(&mut rx, secs(60)).await;
}

#[tokio::test(start_paused = true)]
async fn test_arm_independent_keys_fire_independently() {
    let (mut timers, mut rx) = TurnTimers::channel();

    timers.arm("LONG", secs(20));
    timers.arm("SHORT", secs(5));

    assert_eq!(rx.recv().await.unwrap().key, "SHORT");
    assert_eq!(rx.recv().await.unwrap().key, "LONG");
}

// =========================================================================
// cancel()
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_armed_timer_never_fires() {
    let (mut timers, mut rx) = TurnTimers::channel();
    timers.arm("ABCD", secs(10));

    assert!(timers.cancel(&"ABCD"));

    assert!(!timers.is_armed(&"ABCD"));
    assert_quiet(&mut rx, secs(60)).await;
}

#[tokio::test(start_paused = true)]
async fn test_cancel_without_timer_is_noop() {
    let (mut timers, _rx) = TurnTimers::<&'static str>::channel();

    assert!(!timers.cancel(&"ABCD"));
    assert!(!timers.cancel(&"ABCD"));
}

// =========================================================================
// claim()
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_claim_current_expiry_disarms() {
    let (mut timers, mut rx) = TurnTimers::channel();
    timers.arm("ABCD", secs(10));

    let expired = rx.recv().await.unwrap();

    assert!(timers.claim(&expired));
    assert!(!timers.is_armed(&"ABCD"));
    // A second claim of the same expiry is rejected.
    assert!(!timers.claim(&expired));
}

#[tokio::test(start_paused = true)]
async fn test_claim_after_cancel_is_stale() {
    // The countdown finishes and queues its event, then the owner cancels
    // before draining the channel.
    let (mut timers, mut rx) = TurnTimers::channel();
    timers.arm("ABCD", secs(1));
    tokio::time::sleep(secs(2)).await;

    assert!(timers.cancel(&"ABCD"));

    let expired = rx.recv().await.expect("event was already queued");
    assert!(!timers.claim(&expired));
}

#[tokio::test(start_paused = true)]
async fn test_claim_after_rearm_is_stale() {
    let (mut timers, mut rx) = TurnTimers::channel();
    timers.arm("ABCD", secs(1));
    tokio::time::sleep(secs(2)).await;

    // Re-armed for the next caller before the old expiry was processed.
    let current = timers.arm("ABCD", secs(30));

    let stale = rx.recv().await.unwrap();
    assert!(!timers.claim(&stale));
    assert_eq!(timers.generation(&"ABCD"), Some(current));

    let fresh = rx.recv().await.unwrap();
    assert_eq!(fresh.generation, current);
    assert!(timers.claim(&fresh));
}

// =========================================================================
// Drop
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_drop_aborts_pending_countdowns() {
    let (mut timers, mut rx) = TurnTimers::channel();
    timers.arm("ABCD", secs(10));
    timers.arm("WXYZ", secs(10));

    drop(timers);

    // With every sender gone the channel closes instead of delivering.
    let next = timeout(secs(60), rx.recv()).await;
    assert!(matches!(next, Ok(None)), "got {next:?}");
}
