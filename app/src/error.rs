use ori_api::error::OriError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("rpc serves chain {actual}, expected {expected}")]
    WrongChain { expected: u64, actual: u64 },

    #[error("api error {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("abi error: {0}")]
    Abi(#[from] web3::ethabi::Error),

    #[error("could not decode {0}")]
    Decode(String),

    #[error(transparent)]
    Ori(#[from] OriError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("push channel: {0}")]
    Push(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
