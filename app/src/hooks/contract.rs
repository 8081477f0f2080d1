use std::{future::Future, sync::Arc, time::Duration};

use ori_api::prelude::*;
use tracing::{debug, error};
use web3::ethabi::{Contract, Token};
use web3::types::{Address, U256};

use crate::{AppConfig, Error, Input, Result};

use super::poller::{PollContext, Query};
use super::rpc::{self, Call3, CallResult, Multicall};

const CURRENT_ROUND_ID: &str = "currentRoundId";
const GET_TREASURY: &str = "getTreasury";
const GET_GAME_STATE: &str = "getGameState";
const GET_ROUND_OUTCOME: &str = "getRoundOutcome";
const GET_ROUND_DEPLOYED: &str = "getRoundDeployed";

const READER_ABI: &str = r#"[
  { "type": "function", "name": "currentRoundId", "stateMutability": "view",
    "inputs": [], "outputs": [{ "name": "", "type": "uint256" }] },
  { "type": "function", "name": "getTreasury", "stateMutability": "view",
    "inputs": [],
    "outputs": [
      { "name": "balance", "type": "uint256" },
      { "name": "motherlode", "type": "uint256" },
      { "name": "totalStaked", "type": "uint256" }
    ] },
  { "type": "function", "name": "getGameState", "stateMutability": "view",
    "inputs": [],
    "outputs": [
      { "name": "paused", "type": "bool" },
      { "name": "roundDuration", "type": "uint256" },
      { "name": "minDeploy", "type": "uint256" }
    ] },
  { "type": "function", "name": "getRoundOutcome", "stateMutability": "view",
    "inputs": [{ "name": "roundId", "type": "uint256" }],
    "outputs": [
      { "name": "randomnessFulfilled", "type": "bool" },
      { "name": "winningSquare", "type": "uint8" }
    ] },
  { "type": "function", "name": "getRoundDeployed", "stateMutability": "view",
    "inputs": [{ "name": "roundId", "type": "uint256" }],
    "outputs": [{ "name": "", "type": "uint256[25]" }] }
]"#;

/// Read access to the protocol contract.
pub trait ContractReader: Send + Sync + 'static {
    /// Treasury, game parameters and the current round id in one batch.
    fn snapshot(&self) -> impl Future<Output = Result<ContractSnapshot>> + Send;

    fn round_outcome(&self, round_id: u64) -> impl Future<Output = Result<RoundOutcome>> + Send;

    /// Amount deployed on each square of a round.
    fn round_deployed(
        &self,
        round_id: u64,
    ) -> impl Future<Output = Result<[Amount; GRID_SIZE]>> + Send;
}

#[derive(Clone, Debug)]
pub struct EvmContractReader {
    client: reqwest::Client,
    rpc_url: String,
    chain_id: u64,
    address: Address,
    abi: Contract,
    multicall: Multicall,
}

impl EvmContractReader {
    pub fn new(
        rpc_url: impl Into<String>,
        chain_id: u64,
        contract: &str,
        multicall: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            chain_id,
            address: rpc::parse_address(contract)?,
            abi: rpc::load_abi(READER_ABI)?,
            multicall: Multicall::new(rpc::parse_address(multicall)?)?,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.rpc_url.as_str(),
            config.chain_id,
            &config.read_contract,
            &config.multicall_address,
        )
    }

    /// Fail unless the RPC endpoint serves the configured chain.
    pub async fn verify_chain(&self) -> Result<u64> {
        let actual = rpc::chain_id(&self.client, &self.rpc_url).await?;
        if actual != self.chain_id {
            return Err(Error::WrongChain {
                expected: self.chain_id,
                actual,
            });
        }
        Ok(actual)
    }

    fn encode(&self, name: &str, args: &[Token]) -> Result<Vec<u8>> {
        Ok(self.abi.function(name)?.encode_input(args)?)
    }

    fn decode(&self, name: &str, data: &[u8]) -> Result<Vec<Token>> {
        Ok(self.abi.function(name)?.decode_output(data)?)
    }

    async fn call(&self, name: &str, args: &[Token]) -> Result<Vec<Token>> {
        let data = self.encode(name, args)?;
        let raw = rpc::eth_call(&self.client, &self.rpc_url, self.address, &data).await?;
        self.decode(name, &raw)
    }

    /// Decode one `aggregate3` entry as the return value of `name`.
    fn decode_result(&self, result: &CallResult, name: &str) -> Result<Vec<Token>> {
        self.decode(name, succeeded(result, name)?)
    }
}

impl ContractReader for EvmContractReader {
    async fn snapshot(&self) -> Result<ContractSnapshot> {
        let calls = [GET_TREASURY, GET_GAME_STATE, CURRENT_ROUND_ID]
            .into_iter()
            .map(|name| Ok(Call3::new(self.address, self.encode(name, &[])?)))
            .collect::<Result<Vec<_>>>()?;
        let data = self.multicall.encode(&calls)?;
        let raw = rpc::eth_call(&self.client, &self.rpc_url, self.multicall.address, &data).await?;

        let results = self.multicall.decode(&raw)?;
        let [treasury, game, round_id] = results.as_slice() else {
            return Err(Error::Decode(format!(
                "aggregate3 returned {} results, expected 3",
                results.len()
            )));
        };
        Ok(ContractSnapshot {
            treasury: decode_treasury(self.decode_result(treasury, GET_TREASURY)?)?,
            game: decode_game_state(self.decode_result(game, GET_GAME_STATE)?)?,
            current_round_id: decode_round_id(self.decode_result(round_id, CURRENT_ROUND_ID)?)?,
        })
    }

    async fn round_outcome(&self, round_id: u64) -> Result<RoundOutcome> {
        let tokens = self
            .call(GET_ROUND_OUTCOME, &[Token::Uint(U256::from(round_id))])
            .await?;
        decode_outcome(tokens)
    }

    async fn round_deployed(&self, round_id: u64) -> Result<[Amount; GRID_SIZE]> {
        let tokens = self
            .call(GET_ROUND_DEPLOYED, &[Token::Uint(U256::from(round_id))])
            .await?;
        decode_deployed(tokens)
    }
}

fn succeeded<'a>(result: &'a CallResult, name: &str) -> Result<&'a [u8]> {
    if result.success {
        Ok(&result.return_data)
    } else {
        Err(Error::Decode(format!("{name} reverted")))
    }
}

fn fields<const N: usize>(tokens: Vec<Token>, name: &str) -> Result<[Token; N]> {
    let len = tokens.len();
    tokens
        .try_into()
        .map_err(|_| Error::Decode(format!("{name} returned {len} values, expected {N}")))
}

fn decode_round_id(tokens: Vec<Token>) -> Result<u64> {
    let [id] = fields(tokens, CURRENT_ROUND_ID)?;
    rpc::to_u64(rpc::into_uint(id, "round id")?, "round id")
}

fn decode_treasury(tokens: Vec<Token>) -> Result<TreasuryState> {
    let [balance, motherlode, total_staked] = fields(tokens, GET_TREASURY)?;
    Ok(TreasuryState {
        balance: rpc::to_amount(rpc::into_uint(balance, "balance")?),
        motherlode: rpc::to_amount(rpc::into_uint(motherlode, "motherlode")?),
        total_staked: rpc::to_amount(rpc::into_uint(total_staked, "total staked")?),
    })
}

fn decode_game_state(tokens: Vec<Token>) -> Result<GameState> {
    let [paused, round_duration, min_deploy] = fields(tokens, GET_GAME_STATE)?;
    let round_duration = rpc::into_uint(round_duration, "round duration")?;
    Ok(GameState {
        paused: rpc::into_bool(paused, "paused")?,
        round_duration: rpc::to_u64(round_duration, "round duration")?,
        min_deploy: rpc::to_amount(rpc::into_uint(min_deploy, "min deploy")?),
    })
}

fn decode_outcome(tokens: Vec<Token>) -> Result<RoundOutcome> {
    let [fulfilled, square] = fields(tokens, GET_ROUND_OUTCOME)?;
    let square = rpc::to_u64(rpc::into_uint(square, "winning square")?, "winning square")?;
    let winning_square = u8::try_from(square)
        .map_err(|_| Error::Decode("winning square exceeds uint8".to_string()))?;
    Ok(RoundOutcome {
        randomness_fulfilled: rpc::into_bool(fulfilled, "randomness fulfilled")?,
        winning_square,
    })
}

// uint256[25]
fn decode_deployed(tokens: Vec<Token>) -> Result<[Amount; GRID_SIZE]> {
    let [board] = fields(tokens, GET_ROUND_DEPLOYED)?;
    let values = board
        .into_fixed_array()
        .ok_or_else(|| Error::Decode("deployed board: expected uint256[25]".to_string()))?;
    let values: [Token; GRID_SIZE] = fields(values, GET_ROUND_DEPLOYED)?;
    let mut deployed = [Amount::ZERO; GRID_SIZE];
    for (amount, value) in deployed.iter_mut().zip(values) {
        *amount = rpc::to_amount(rpc::into_uint(value, "deployed")?);
    }
    Ok(deployed)
}

pub async fn poll_contract<C: ContractReader>(contract: Arc<C>, ctx: PollContext, interval: Duration) {
    let mut schedule = ctx.schedule(Query::Contract, interval);
    loop {
        match schedule.guard(contract.snapshot()).await {
            None => break,
            Some(Ok(snapshot)) => {
                if ctx.send(Input::Contract(snapshot)).is_break() {
                    break;
                }
            }
            Some(Err(err)) => error!(%err, "contract snapshot read failed"),
        }
        if !schedule.wait().await {
            break;
        }
    }
    debug!("contract poller stopped");
}
