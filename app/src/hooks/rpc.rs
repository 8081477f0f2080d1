//! Ethereum JSON-RPC plumbing and the Multicall3 batch the reader uses.

use serde::{Deserialize, Serialize};
use web3::ethabi::{Contract, Function, Token};
use web3::types::{Address, U256};

use ori_api::prelude::Amount;

use crate::{Error, Result};

const MULTICALL3_ABI: &str = r#"[
  {
    "type": "function",
    "name": "aggregate3",
    "stateMutability": "payable",
    "inputs": [
      {
        "name": "calls",
        "type": "tuple[]",
        "components": [
          { "name": "target", "type": "address" },
          { "name": "allowFailure", "type": "bool" },
          { "name": "callData", "type": "bytes" }
        ]
      }
    ],
    "outputs": [
      {
        "name": "returnData",
        "type": "tuple[]",
        "components": [
          { "name": "success", "type": "bool" },
          { "name": "returnData", "type": "bytes" }
        ]
      }
    ]
  }
]"#;

#[derive(Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: Vec<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcError>,
}

#[derive(Deserialize, Debug)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

async fn request(
    client: &reqwest::Client,
    rpc_url: &str,
    method: &'static str,
    params: Vec<serde_json::Value>,
) -> Result<String> {
    let request = RpcRequest {
        jsonrpc: "2.0",
        id: 1,
        method,
        params,
    };

    let response: RpcResponse<String> = client
        .post(rpc_url)
        .json(&request)
        .send()
        .await?
        .json()
        .await?;

    if let Some(error) = response.error {
        return Err(Error::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    response
        .result
        .ok_or_else(|| Error::Decode(format!("{method} returned no result")))
}

/// Read-only call against the latest block.
pub async fn eth_call(
    client: &reqwest::Client,
    rpc_url: &str,
    to: Address,
    data: &[u8],
) -> Result<Vec<u8>> {
    let params = vec![
        serde_json::json!({
            "to": format!("{to:?}"),
            "data": format!("0x{}", hex::encode(data)),
        }),
        serde_json::json!("latest"),
    ];
    decode_hex(&request(client, rpc_url, "eth_call", params).await?)
}

pub async fn chain_id(client: &reqwest::Client, rpc_url: &str) -> Result<u64> {
    let result = request(client, rpc_url, "eth_chainId", vec![]).await?;
    parse_quantity(&result)
}

/// A hex `QUANTITY` such as `0x61`.
pub fn parse_quantity(value: &str) -> Result<u64> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(digits, 16).map_err(|e| Error::Decode(format!("quantity {value}: {e}")))
}

pub fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let value = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(value).map_err(|e| Error::Decode(format!("hex: {e}")))
}

pub fn parse_address(value: &str) -> Result<Address> {
    let bytes = decode_hex(value)?;
    if bytes.len() != Address::len_bytes() {
        return Err(Error::Decode(format!("address {value}")));
    }
    Ok(Address::from_slice(&bytes))
}

pub fn load_abi(json: &str) -> Result<Contract> {
    Ok(Contract::load(json.as_bytes())?)
}

pub fn into_uint(token: Token, what: &str) -> Result<U256> {
    token
        .into_uint()
        .ok_or_else(|| Error::Decode(format!("{what}: expected uint")))
}

pub fn into_bool(token: Token, what: &str) -> Result<bool> {
    token
        .into_bool()
        .ok_or_else(|| Error::Decode(format!("{what}: expected bool")))
}

pub fn to_u64(value: U256, what: &str) -> Result<u64> {
    if value.bits() > 64 {
        return Err(Error::Decode(format!("{what} = {value} exceeds u64")));
    }
    Ok(value.low_u64())
}

/// Token amounts above `u128::MAX` clamp to it.
pub fn to_amount(value: U256) -> Amount {
    if value.bits() > 128 {
        Amount(u128::MAX)
    } else {
        Amount(value.low_u128())
    }
}

/// One entry of an `aggregate3` batch.
#[derive(Clone, Debug)]
pub struct Call3 {
    pub target: Address,
    pub allow_failure: bool,
    pub call_data: Vec<u8>,
}

impl Call3 {
    pub fn new(target: Address, call_data: Vec<u8>) -> Self {
        Self {
            target,
            allow_failure: true,
            call_data,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallResult {
    pub success: bool,
    pub return_data: Vec<u8>,
}

/// Multicall3 deployment, batching calls into one `eth_call`.
#[derive(Clone, Debug)]
pub struct Multicall {
    pub address: Address,
    abi: Contract,
}

impl Multicall {
    pub fn new(address: Address) -> Result<Self> {
        Ok(Self {
            address,
            abi: load_abi(MULTICALL3_ABI)?,
        })
    }

    fn aggregate3(&self) -> Result<&Function> {
        Ok(self.abi.function("aggregate3")?)
    }

    pub fn encode(&self, calls: &[Call3]) -> Result<Vec<u8>> {
        let calls = calls
            .iter()
            .map(|call| {
                Token::Tuple(vec![
                    Token::Address(call.target),
                    Token::Bool(call.allow_failure),
                    Token::Bytes(call.call_data.clone()),
                ])
            })
            .collect();
        Ok(self.aggregate3()?.encode_input(&[Token::Array(calls)])?)
    }

    /// Decode `(bool success, bytes returnData)[]`.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<CallResult>> {
        let mut outputs = self.aggregate3()?.decode_output(data)?;
        let results = match outputs.pop() {
            Some(Token::Array(results)) if outputs.is_empty() => results,
            other => {
                return Err(Error::Decode(format!("aggregate3 output {other:?}")));
            }
        };
        results
            .into_iter()
            .enumerate()
            .map(|(i, result)| match result.into_tuple().as_deref() {
                Some([Token::Bool(success), Token::Bytes(return_data)]) => Ok(CallResult {
                    success: *success,
                    return_data: return_data.clone(),
                }),
                _ => Err(Error::Decode(format!("aggregate3 result {i}"))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use web3::ethabi::{self, ParamType};

    use super::*;

    const TARGET: &str = "0x08280ae8d23016f907ECAdAC9CB154b232dE2Ff2";

    fn multicall() -> Multicall {
        Multicall::new(parse_address("0xcA11bde05977b3631167028862bE2a173976CA11").unwrap()).unwrap()
    }

    #[test]
    fn encodes_batch() {
        let target = parse_address(TARGET).unwrap();
        let call_data = vec![0xde, 0xad, 0xbe, 0xef];
        let data = multicall().encode(&[Call3::new(target, call_data.clone())]).unwrap();

        assert_eq!(&data[..4], &[0x82, 0xad, 0x56, 0xcb]);
        let call = ParamType::Tuple(vec![ParamType::Address, ParamType::Bool, ParamType::Bytes]);
        let decoded = ethabi::decode(&[ParamType::Array(Box::new(call))], &data[4..]).unwrap();
        assert_eq!(
            decoded,
            vec![Token::Array(vec![Token::Tuple(vec![
                Token::Address(target),
                Token::Bool(true),
                Token::Bytes(call_data),
            ])])]
        );
    }

    #[test]
    fn decodes_results() {
        let data = ethabi::encode(&[Token::Array(vec![
            Token::Tuple(vec![
                Token::Bool(true),
                Token::Bytes(ethabi::encode(&[Token::Uint(U256::from(5u64))])),
            ]),
            Token::Tuple(vec![Token::Bool(false), Token::Bytes(vec![])]),
        ])]);

        let results = multicall().decode(&data).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert_eq!(U256::from_big_endian(&results[0].return_data), U256::from(5));
        assert!(!results[1].success);
        assert!(results[1].return_data.is_empty());

        assert!(multicall().decode(&data[..100]).is_err());
    }

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("0x61").unwrap(), 97);
        assert_eq!(parse_quantity("0x38").unwrap(), 56);
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("latest").is_err());
    }

    #[test]
    fn full_width_uints() {
        assert_eq!(to_amount(U256::MAX), Amount(u128::MAX));
        assert_eq!(to_amount(U256::from(u128::MAX)), Amount(u128::MAX));
        assert_eq!(to_amount(U256::from(42)), Amount(42));

        assert_eq!(to_u64(U256::from(u64::MAX), "id").unwrap(), u64::MAX);
        assert!(to_u64(U256::from(u64::MAX) + 1, "id").is_err());
        assert!(parse_address("0x1234").is_err());
    }
}
