use thiserror::Error;

#[derive(Debug, Error)]
pub enum OriError {
    #[error("square {0} is outside the 5x5 board")]
    InvalidSquare(u64),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("no subscription for event {event} on channel {channel}")]
    UnknownEvent { channel: String, event: String },
}
