use std::{future::Future, time::Duration};

use ori_api::prelude::*;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use crate::{Error, Result};

/// The ORI REST API.
pub trait Backend: Send + Sync + 'static {
    fn latest_events(&self) -> impl Future<Output = Result<LatestEvents>> + Send;

    /// Per-square statistics for a round. With `miner` set the user columns
    /// are filled for that wallet.
    fn round_stats(
        &self,
        round_id: u64,
        miner: Option<&str>,
    ) -> impl Future<Output = Result<BetStatistics>> + Send;

    fn round_winners(&self, round_id: u64) -> impl Future<Output = Result<RoundWinners>> + Send;
}

/// Response wrapper used by every endpoint.
#[derive(Deserialize, Debug)]
struct ApiEnvelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    fn into_data(self, path: &str) -> Result<T> {
        if self.code != 0 && self.code != 200 {
            return Err(Error::Api {
                code: self.code,
                msg: self.msg,
            });
        }
        self.data
            .ok_or_else(|| Error::Decode(format!("{path}: response has no data")))
    }
}

#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, form: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "api request");

        let envelope: ApiEnvelope<T> = self
            .client
            .post(&url)
            .form(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        envelope.into_data(path)
    }
}

impl Backend for HttpBackend {
    async fn latest_events(&self) -> Result<LatestEvents> {
        self.post(LATEST_EVENTS_PATH, &[]).await
    }

    async fn round_stats(&self, round_id: u64, miner: Option<&str>) -> Result<BetStatistics> {
        let mut form = vec![("round_id", round_id.to_string())];
        if let Some(miner) = miner {
            form.push(("address", miner.to_string()));
        }
        let stats: RoundStats = self.post(ROUND_PATH, &form).await?;
        Ok(BetStatistics::try_from(stats)?)
    }

    async fn round_winners(&self, round_id: u64) -> Result<RoundWinners> {
        let mut winners: RoundWinners = self
            .post(ROUND_WINNERS_PATH, &[("round_id", round_id.to_string())])
            .await?;
        if winners.round_id == 0 {
            winners.round_id = round_id;
        }
        Ok(winners)
    }
}
