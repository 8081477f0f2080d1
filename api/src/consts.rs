use std::time::Duration;

/// Number of squares on the board (5x5).
pub const GRID_SIZE: usize = 25;

/// Length of a round's betting window, in seconds.
pub const ROUND_DURATION_SECS: u64 = 60;

/// Delay between two faded cells while a draw is revealed.
pub const REVEAL_CADENCE: Duration = Duration::from_millis(150);

/// How long the winning square stays highlighted before the board resets.
pub const WINNER_HOLD: Duration = Duration::from_secs(5);

/// Decimal exponent of the native asset (BNB).
pub const NATIVE_DECIMALS: u32 = 18;

// Poll intervals
pub const LATEST_EVENTS_POLL_MS: u64 = 3_000;
pub const BET_STATS_POLL_MS: u64 = 3_000;
pub const OUTCOME_POLL_MS: u64 = 2_000;
pub const CONTRACT_POLL_MS: u64 = 5_000;
pub const WINNERS_POLL_MS: u64 = 10_000;
pub const COUNTDOWN_TICK_MS: u64 = 1_000;
pub const PUSH_RECONNECT_MS: u64 = 3_000;

// REST endpoints
pub const ROUND_PATH: &str = "/ori/round";
pub const LATEST_EVENTS_PATH: &str = "/ori/latest/events";
pub const ROUND_WINNERS_PATH: &str = "/ori/round_winners/round";

/// A (channel, event) pair on the push channel.
///
/// Event names starting with a dot are not namespaced; the name on the wire
/// is the same string without the leading dot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subscription {
    pub channel: &'static str,
    pub event: &'static str,
}

impl Subscription {
    pub fn wire_event(&self) -> &'static str {
        self.event.strip_prefix('.').unwrap_or(self.event)
    }
}

pub const ROUND_STARTED: Subscription = Subscription {
    channel: "round.new_round",
    event: ".round.data.started",
};

pub const ROUND_RESET: Subscription = Subscription {
    channel: "round.reset",
    event: ".round.data.reset",
};

pub const SUBSCRIPTIONS: [Subscription; 2] = [ROUND_STARTED, ROUND_RESET];
