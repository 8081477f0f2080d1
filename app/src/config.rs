use std::{path::Path, time::Duration};

use ori_api::consts::*;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the ORI REST API.
    pub api_base_url: String,
    pub rpc_url: String,
    pub chain_id: u64,
    /// Read-only protocol contract.
    pub read_contract: String,
    pub multicall_address: String,
    pub push: PushConfig,
    /// Wallet address of the signed-in miner, if any.
    pub miner_address: Option<String>,
    /// Decimal exponent of the native asset.
    pub decimals: u32,
    pub timing: TimingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        // BNB Smart Chain testnet
        Self {
            api_base_url: "https://ori-api-dev.being.com".to_string(),
            rpc_url: "https://data-seed-prebsc-1-s1.bnbchain.org:8545".to_string(),
            chain_id: 97,
            read_contract: "0x08280ae8d23016f907ECAdAC9CB154b232dE2Ff2".to_string(),
            multicall_address: "0xcA11bde05977b3631167028862bE2a173976CA11".to_string(),
            push: PushConfig::default(),
            miner_address: None,
            decimals: NATIVE_DECIMALS,
            timing: TimingConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PushConfig {
    pub host: String,
    pub port: u16,
    /// Pusher application key.
    pub key: String,
    pub tls: bool,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            host: "ori-ws-dev.being.com".to_string(),
            port: 443,
            key: "q3m7v9p5t1h6z4k8d2fj".to_string(),
            tls: true,
        }
    }
}

/// Poll intervals and animation timings, in milliseconds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    pub latest_events_ms: u64,
    pub bet_stats_ms: u64,
    pub outcome_ms: u64,
    pub contract_ms: u64,
    pub winners_ms: u64,
    pub tick_ms: u64,
    pub push_reconnect_ms: u64,
    pub reveal_cadence_ms: u64,
    pub winner_hold_ms: u64,
    pub round_duration_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            latest_events_ms: LATEST_EVENTS_POLL_MS,
            bet_stats_ms: BET_STATS_POLL_MS,
            outcome_ms: OUTCOME_POLL_MS,
            contract_ms: CONTRACT_POLL_MS,
            winners_ms: WINNERS_POLL_MS,
            tick_ms: COUNTDOWN_TICK_MS,
            push_reconnect_ms: PUSH_RECONNECT_MS,
            reveal_cadence_ms: REVEAL_CADENCE.as_millis() as u64,
            winner_hold_ms: WINNER_HOLD.as_millis() as u64,
            round_duration_secs: ROUND_DURATION_SECS,
        }
    }
}

impl TimingConfig {
    pub fn latest_events(&self) -> Duration {
        Duration::from_millis(self.latest_events_ms)
    }

    pub fn bet_stats(&self) -> Duration {
        Duration::from_millis(self.bet_stats_ms)
    }

    pub fn outcome(&self) -> Duration {
        Duration::from_millis(self.outcome_ms)
    }

    pub fn contract(&self) -> Duration {
        Duration::from_millis(self.contract_ms)
    }

    pub fn winners(&self) -> Duration {
        Duration::from_millis(self.winners_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn push_reconnect(&self) -> Duration {
        Duration::from_millis(self.push_reconnect_ms)
    }

    pub fn reveal_cadence(&self) -> Duration {
        Duration::from_millis(self.reveal_cadence_ms)
    }

    pub fn winner_hold(&self) -> Duration {
        Duration::from_millis(self.winner_hold_ms)
    }
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Defaults (or the file named by `ORI_CONFIG`) with `ORI_*` overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("ORI_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = var("ORI_API_URL") {
            self.api_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = var("ORI_RPC_URL") {
            self.rpc_url = v;
        }
        if let Some(v) = var("ORI_CHAIN_ID") {
            self.chain_id = parse_var("ORI_CHAIN_ID", &v)?;
        }
        if let Some(v) = var("ORI_READ_CONTRACT") {
            self.read_contract = v;
        }
        if let Some(v) = var("ORI_MULTICALL") {
            self.multicall_address = v;
        }
        if let Some(v) = var("ORI_WS_HOST") {
            self.push.host = v;
        }
        if let Some(v) = var("ORI_WS_PORT") {
            self.push.port = parse_var("ORI_WS_PORT", &v)?;
        }
        if let Some(v) = var("ORI_WS_KEY") {
            self.push.key = v;
        }
        if let Some(v) = var("ORI_MINER") {
            self.miner_address = Some(v).filter(|s| !s.is_empty());
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid {key}: {value}")))
}
