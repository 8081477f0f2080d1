use serde::{Deserialize, Serialize};

use crate::{
    consts::{GRID_SIZE, ROUND_RESET, ROUND_STARTED},
    error::OriError,
    state::de,
};

/// Payload of `.round.data.started`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStarted {
    /// Unix seconds at which the new round opened.
    #[serde(default, deserialize_with = "de::u64_nonzero")]
    pub timestamp: Option<u64>,
}

/// Payload of `.round.data.reset`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundReset {
    /// The round that was finalized, when the backend includes it.
    #[serde(default, deserialize_with = "de::u64_nonzero")]
    pub round_id: Option<u64>,

    #[serde(default, deserialize_with = "de::u64_optional")]
    pub winning_square: Option<u64>,
}

impl RoundReset {
    /// The winning square if it is present and on the board.
    pub fn winner(&self) -> Option<u8> {
        self.winning_square
            .and_then(|square| u8::try_from(square).ok())
            .filter(|square| usize::from(*square) < GRID_SIZE)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushEvent {
    Started(RoundStarted),
    Reset(RoundReset),
}

impl PushEvent {
    /// Decode a push message. `event` is the name as sent on the wire and
    /// `data` the JSON document carried by the message.
    pub fn parse(channel: &str, event: &str, data: &str) -> Result<Self, OriError> {
        if channel == ROUND_STARTED.channel && event == ROUND_STARTED.wire_event() {
            return Ok(PushEvent::Started(serde_json::from_str(data)?));
        }
        if channel == ROUND_RESET.channel && event == ROUND_RESET.wire_event() {
            return Ok(PushEvent::Reset(serde_json::from_str(data)?));
        }
        Err(OriError::UnknownEvent {
            channel: channel.to_string(),
            event: event.to_string(),
        })
    }
}
