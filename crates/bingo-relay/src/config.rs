//! Server configuration and the command line that builds it.

use std::ops::RangeInclusive;
use std::time::Duration;

use bingo_relay_timer::TurnTimerConfig;
use clap::Parser;
use tracing::warn;

// ---------------------------------------------------------------------------
// GameLimits
// ---------------------------------------------------------------------------

/// What clients may ask for when they create a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLimits {
    /// Allowed card sizes N (for N×N cards).
    pub matrix_sizes: RangeInclusive<usize>,
    /// Default and bounds for the per-turn time limit.
    pub turn: TurnTimerConfig,
}

impl Default for GameLimits {
    fn default() -> Self {
        Self {
            matrix_sizes: 3..=10,
            turn: TurnTimerConfig::default(),
        }
    }
}

impl GameLimits {
    /// Largest card the relay will ever host. Keeps N² within `u32` and
    /// frames within a sane size.
    pub const MAX_MATRIX_SIZE: usize = 32;

    /// Clamp and fix any out-of-range values so the limits are safe to use.
    pub fn validated(mut self) -> Self {
        let (lo, hi) = (*self.matrix_sizes.start(), *self.matrix_sizes.end());
        let fixed_lo = lo.max(1);
        let fixed_hi = hi.clamp(fixed_lo, Self::MAX_MATRIX_SIZE.max(fixed_lo));
        if (fixed_lo, fixed_hi) != (lo, hi) {
            warn!(lo, hi, fixed_lo, fixed_hi, "matrix size range out of bounds, clamping");
            self.matrix_sizes = fixed_lo..=fixed_hi;
        }
        self.turn = self.turn.validated();
        self
    }

    pub fn allows_matrix_size(&self, n: usize) -> bool {
        self.matrix_sizes.contains(&n)
    }
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

/// How the relay tells a dead socket from a quiet player.
///
/// The server pings every client each `interval`. Browsers answer pings on
/// their own, so a player who is connected but not doing anything keeps
/// the channel alive. Only a connection that sends no frame at all (text,
/// ping or pong) for `timeout` is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// How long a client may take to finish the WebSocket upgrade.
    pub handshake_timeout: Duration,
    /// Time between server pings.
    pub interval: Duration,
    /// Silence after which the socket is considered dead.
    pub timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            interval: Duration::from_secs(20),
            timeout: Duration::from_secs(60),
        }
    }
}

impl Heartbeat {
    const MIN_INTERVAL: Duration = Duration::from_millis(10);

    /// Keeps every period positive and leaves a live client at least two
    /// pings to answer before it is dropped.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(interval = ?self.interval, "heartbeat interval too small, raising");
            self.interval = Self::MIN_INTERVAL;
        }
        let min_timeout = self.interval * 2;
        if self.timeout < min_timeout {
            warn!(
                timeout = ?self.timeout,
                min = ?min_timeout,
                "liveness timeout shorter than two heartbeats, raising"
            );
            self.timeout = min_timeout;
        }
        if self.handshake_timeout.is_zero() {
            warn!("handshake timeout is zero, using the default");
            self.handshake_timeout = Self::default().handshake_timeout;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    pub heartbeat: Heartbeat,
    /// How often the coordinator logs room and player counts.
    pub stats_interval: Duration,
    /// Capacity of the connection → coordinator event queue.
    pub event_capacity: usize,
    pub limits: GameLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            heartbeat: Heartbeat::default(),
            stats_interval: Duration::from_secs(60),
            event_capacity: 1024,
            limits: GameLimits::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Cli
// ---------------------------------------------------------------------------

/// Real-time multiplayer bingo relay
#[derive(Parser, Clone, Debug)]
#[command(name = "bingo-relay", version, about = "Real-time multiplayer bingo relay")]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "BINGO_BIND", default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// Default seconds per turn when a room does not choose one
    #[arg(long, env = "BINGO_TURN_SECONDS", default_value_t = 30)]
    pub turn_seconds: u64,

    /// Shortest per-turn limit a room may ask for, in seconds
    #[arg(long, env = "BINGO_MIN_TURN_SECONDS", default_value_t = 5)]
    pub min_turn_seconds: u64,

    /// Longest per-turn limit a room may ask for, in seconds
    #[arg(long, env = "BINGO_MAX_TURN_SECONDS", default_value_t = 300)]
    pub max_turn_seconds: u64,

    /// Seconds between WebSocket pings to each client
    #[arg(long, env = "BINGO_HEARTBEAT_INTERVAL", default_value_t = 20)]
    pub heartbeat_interval: u64,

    /// Drop a connection after this many seconds without any frame, pongs included
    #[arg(long, env = "BINGO_LIVENESS_TIMEOUT", default_value_t = 60)]
    pub liveness_timeout: u64,

    /// Seconds a client may take to finish the WebSocket upgrade
    #[arg(long, env = "BINGO_HANDSHAKE_TIMEOUT", default_value_t = 10)]
    pub handshake_timeout: u64,

    /// Seconds between stats log lines
    #[arg(long, env = "BINGO_STATS_INTERVAL", default_value_t = 60)]
    pub stats_interval: u64,

    /// Enable structured JSON logging
    #[arg(long, env = "BINGO_JSON_LOGS")]
    pub json_logs: bool,
}

impl Cli {
    /// Builds a validated [`ServerConfig`] from the parsed flags.
    pub fn server_config(&self) -> ServerConfig {
        let limits = GameLimits {
            turn: TurnTimerConfig {
                default_limit: Duration::from_secs(self.turn_seconds),
                min_limit: Duration::from_secs(self.min_turn_seconds),
                max_limit: Duration::from_secs(self.max_turn_seconds),
            },
            ..GameLimits::default()
        }
        .validated();

        ServerConfig {
            bind_addr: self.bind.clone(),
            heartbeat: Heartbeat {
                handshake_timeout: Duration::from_secs(self.handshake_timeout),
                interval: Duration::from_secs(self.heartbeat_interval),
                timeout: Duration::from_secs(self.liveness_timeout),
            }
            .validated(),
            stats_interval: Duration::from_secs(self.stats_interval.max(1)),
            limits,
            ..ServerConfig::default()
        }
    }
}
