//! JSON-RPC implementation of [`ChainClient`] over the shared HTTP client.

use {
    crate::{ChainClient, Error, FeeHistory},
    alloy_primitives::{Address, U256},
    alloy_sol_types::{SolCall, sol},
    serde::Deserialize,
    serde_json::{Value, json},
    std::time::Duration,
    url::Url,
};

sol! {
    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

pub struct RpcChainClient {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl RpcChainClient {
    pub fn new(client: reqwest::Client, url: Url, timeout: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, Error> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        tracing::debug!(%method, url = %self.url, "node request");
        let response = self
            .client
            .post(self.url.clone())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(classify)?;
        let body: RpcResponse<T> = response.json().await.map_err(classify)?;
        match body {
            RpcResponse {
                result: Some(result),
                ..
            } => Ok(result),
            RpcResponse {
                error: Some(error), ..
            } => Err(Error::Rpc(format!("{} (code {})", error.message, error.code))),
            _ => Err(Error::Decode("response had neither result nor error".to_owned())),
        }
    }
}

fn classify(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::Rpc(err.to_string())
    }
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

fn quantity(hex: &str) -> Result<U256, Error> {
    let digits = hex.trim_start_matches("0x");
    U256::from_str_radix(digits, 16)
        .map_err(|err| Error::Decode(format!("bad quantity {hex:?}: {err}")))
}

fn calldata(call: &impl SolCall) -> String {
    format!("0x{}", hex::encode(call.abi_encode()))
}

#[async_trait::async_trait]
impl ChainClient for RpcChainClient {
    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, Error> {
        let call = IERC20::allowanceCall { owner, spender };
        let result: String = self
            .call(
                "eth_call",
                json!([{ "to": format!("{token:#x}"), "data": calldata(&call) }, "latest"]),
            )
            .await?;
        quantity(&result)
    }

    async fn estimate_approve(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<u64, Error> {
        let call = IERC20::approveCall {
            spender,
            amount: U256::MAX,
        };
        let result: String = self
            .call(
                "eth_estimateGas",
                json!([{
                    "from": format!("{owner:#x}"),
                    "to": format!("{token:#x}"),
                    "data": calldata(&call),
                }]),
            )
            .await?;
        let gas = quantity(&result)?;
        u64::try_from(gas).map_err(|_| Error::Decode(format!("approve estimate {gas} exceeds u64")))
    }

    async fn gas_price(&self) -> Result<U256, Error> {
        let result: String = self.call("eth_gasPrice", json!([])).await?;
        quantity(&result)
    }

    async fn fee_history(
        &self,
        block_count: u64,
        reward_percentiles: Vec<f64>,
    ) -> Result<FeeHistory, Error> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Raw {
            #[serde(default)]
            base_fee_per_gas: Vec<String>,
            #[serde(default)]
            reward: Option<Vec<Vec<String>>>,
        }
        let raw: Raw = self
            .call(
                "eth_feeHistory",
                json!([format!("0x{block_count:x}"), "latest", reward_percentiles]),
            )
            .await?;
        Ok(FeeHistory {
            base_fee_per_gas: raw
                .base_fee_per_gas
                .iter()
                .map(|fee| quantity(fee))
                .collect::<Result<_, _>>()?,
            reward: raw
                .reward
                .unwrap_or_default()
                .iter()
                .map(|row| row.iter().map(|tip| quantity(tip)).collect())
                .collect::<Result<_, _>>()?,
        })
    }
}
