use serde::{Deserialize, Serialize};

use crate::consts::ROUND_DURATION_SECS;

use super::de;

/// Payload of `POST /ori/latest/events`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestEvents {
    /// The last round the backend has recorded bets for.
    #[serde(deserialize_with = "de::u64_flexible")]
    pub round_id: u64,

    /// The last round the backend has finalized (reset).
    #[serde(deserialize_with = "de::u64_flexible")]
    pub reset_event_round_id: u64,

    /// Unix seconds at which the live round opened, if known.
    #[serde(default, deserialize_with = "de::u64_nonzero")]
    pub timestamp: Option<u64>,
}

impl LatestEvents {
    /// The round that is currently open according to the backend.
    pub fn effective_round_id(&self) -> u64 {
        reconcile(self.round_id, self.reset_event_round_id)
    }
}

/// Resolve the live round from the backend's two round counters.
///
/// When both counters agree the backend has closed round `reset` and no bet
/// has landed in its successor yet, so the live round is `reset + 1`.
/// Otherwise one stream is ahead of the other and the larger id wins.
pub fn reconcile(round_id: u64, reset_event_round_id: u64) -> u64 {
    if round_id == reset_event_round_id {
        reset_event_round_id.saturating_add(1)
    } else {
        round_id.max(reset_event_round_id)
    }
}

/// The reconciled view of one betting period. Never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Round {
    /// The round number, assigned by the backend or the contract.
    pub round_id: u64,

    /// Unix seconds at which betting opened, once learned.
    pub start_timestamp: Option<u64>,

    /// The most recently finalized round.
    pub reset_round_id: u64,
}

impl Round {
    pub fn from_events(events: &LatestEvents) -> Self {
        Self {
            round_id: events.effective_round_id(),
            start_timestamp: events.timestamp,
            reset_round_id: events.reset_event_round_id,
        }
    }

    /// Unix seconds at which betting closes.
    pub fn ends_at(&self) -> Option<u64> {
        self.start_timestamp
            .map(|start| start.saturating_add(ROUND_DURATION_SECS))
    }

    /// Whether the round's outcome has already been finalized by the backend.
    pub fn is_reset(&self) -> bool {
        self.reset_round_id >= self.round_id
    }
}
