//! Genesis contract binding over Ethereum JSON-RPC.
//!
//! Reads go out as `eth_call` and are retried on transport failure. Writes
//! go out as `eth_sendTransaction` exactly once; the node's wallet signs
//! them for the `from` account.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::abi::{self, Token};
use crate::errors::{ClientError, Result};
use crate::models::{Address, RawBacker, RawProject, RawStats};
use crate::provider::{
    CreateProjectCall, LedgerContract, TxHash, TxOptions, TxReceipt, UpdateProjectCall,
};
use crate::rpc::RpcClient;
use crate::units;

const CREATE_PROJECT: &str = "createProject(string,string,string,uint256,uint256)";
const UPDATE_PROJECT: &str = "updateProject(uint256,string,string,string,uint256)";
const DELETE_PROJECT: &str = "deleteProject(uint256)";
const BACK_PROJECT: &str = "backProject(uint256)";
const PAY_OUT_PROJECT: &str = "payOutProject(uint256)";
const GET_PROJECT: &str = "getProject(uint256)";
const GET_PROJECTS: &str = "getProjects()";
const GET_BACKERS: &str = "getBackers(uint256)";
const STATS: &str = "stats()";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptResponse {
    status: Option<String>,
    block_number: Option<String>,
}

pub struct GenesisContract {
    rpc: Arc<RpcClient>,
    address: Address,
    signer: Option<Address>,
    confirmation_poll: Duration,
}

impl GenesisContract {
    pub fn new(
        rpc: Arc<RpcClient>,
        address: Address,
        signer: Option<Address>,
        confirmation_poll: Duration,
    ) -> Self {
        Self {
            rpc,
            address,
            signer,
            confirmation_poll,
        }
    }

    async fn call(&self, signature: &str, args: &[Token]) -> Result<Vec<u8>> {
        let data = abi::encode_call(signature, args)?;
        let result: String = self
            .rpc
            .request_with_backoff(
                "eth_call",
                json!([{ "to": self.address, "data": to_hex(&data) }, "latest"]),
            )
            .await?;
        from_hex(&result)
    }

    async fn send(&self, opts: &TxOptions, signature: &str, args: &[Token]) -> Result<TxHash> {
        let from = opts
            .from
            .as_ref()
            .or(self.signer.as_ref())
            .ok_or(ClientError::NotConnected)?;
        let data = abi::encode_call(signature, args)?;

        let mut tx = json!({
            "from": from,
            "to": self.address,
            "data": to_hex(&data),
        });
        if let Some(value) = &opts.value {
            tx["value"] = Value::String(units::to_quantity(value));
        }

        let hash: String = self.rpc.request("eth_sendTransaction", json!([tx])).await?;
        info!("Sent {signature} from {from}: {hash}");
        Ok(TxHash(hash))
    }
}

#[async_trait]
impl LedgerContract for GenesisContract {
    async fn create_project(&self, opts: &TxOptions, call: &CreateProjectCall) -> Result<TxHash> {
        let args = [
            Token::String(call.title.clone()),
            Token::String(call.description.clone()),
            Token::String(call.image_url.clone()),
            Token::Uint(call.cost.clone()),
            Token::from(call.expires_at),
        ];
        self.send(opts, CREATE_PROJECT, &args).await
    }

    async fn update_project(&self, opts: &TxOptions, call: &UpdateProjectCall) -> Result<TxHash> {
        let args = [
            Token::from(call.id),
            Token::String(call.title.clone()),
            Token::String(call.description.clone()),
            Token::String(call.image_url.clone()),
            Token::from(call.expires_at),
        ];
        self.send(opts, UPDATE_PROJECT, &args).await
    }

    async fn delete_project(&self, opts: &TxOptions, id: u64) -> Result<TxHash> {
        self.send(opts, DELETE_PROJECT, &[Token::from(id)]).await
    }

    async fn back_project(&self, opts: &TxOptions, id: u64) -> Result<TxHash> {
        self.send(opts, BACK_PROJECT, &[Token::from(id)]).await
    }

    async fn pay_out_project(&self, opts: &TxOptions, id: u64) -> Result<TxHash> {
        self.send(opts, PAY_OUT_PROJECT, &[Token::from(id)]).await
    }

    async fn wait_for_confirmation(&self, tx_hash: &TxHash) -> Result<TxReceipt> {
        loop {
            let receipt: Option<ReceiptResponse> = self
                .rpc
                .request_with_backoff("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;

            let Some(receipt) = receipt else {
                debug!("{tx_hash} still pending");
                tokio::time::sleep(self.confirmation_poll).await;
                continue;
            };

            if receipt.status.as_deref() == Some("0x0") {
                return Err(ClientError::TransactionFailed(format!(
                    "transaction {tx_hash} reverted"
                )));
            }

            let block_number = receipt
                .block_number
                .as_deref()
                .map(units::parse_quantity)
                .transpose()?
                .and_then(|n| u64::try_from(&n).ok());
            return Ok(TxReceipt {
                tx_hash: tx_hash.clone(),
                block_number,
            });
        }
    }

    async fn get_projects(&self) -> Result<Vec<RawProject>> {
        abi::decode_projects(&self.call(GET_PROJECTS, &[]).await?)
    }

    async fn get_project(&self, id: u64) -> Result<RawProject> {
        abi::decode_project(&self.call(GET_PROJECT, &[Token::from(id)]).await?)
    }

    async fn get_backers(&self, id: u64) -> Result<Vec<RawBacker>> {
        abi::decode_backers(&self.call(GET_BACKERS, &[Token::from(id)]).await?)
    }

    async fn stats(&self) -> Result<RawStats> {
        abi::decode_stats(&self.call(STATS, &[]).await?)
    }
}

fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

fn from_hex(value: &str) -> Result<Vec<u8>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|e| ClientError::Decode(format!("bad hex {value:?}: {e}")))
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
