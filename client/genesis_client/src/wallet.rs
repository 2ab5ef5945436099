//! Wallet provider backed by a JSON-RPC endpoint that manages accounts
//! (a local node, a signer proxy or a browser-wallet bridge).
//!
//! The endpoint cannot push notifications, so account and network changes
//! are detected by polling and diffing snapshots.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::contract::GenesisContract;
use crate::errors::{ClientError, Result};
use crate::models::Address;
use crate::provider::{LedgerContract, ProviderEvent, Subscription, WalletProvider};
use crate::rpc::{RpcClient, METHOD_NOT_FOUND};

const EVENT_CAPACITY: usize = 16;

/// What the wallet reported on one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSnapshot {
    pub accounts: Vec<String>,
    pub chain_id: String,
}

pub struct JsonRpcWallet {
    rpc: Option<Arc<RpcClient>>,
    events: broadcast::Sender<ProviderEvent>,
    confirmation_poll: Duration,
}

impl JsonRpcWallet {
    /// `rpc: None` models an environment without any wallet provider.
    pub fn new(rpc: Option<Arc<RpcClient>>, confirmation_poll: Duration) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            rpc,
            events,
            confirmation_poll,
        }
    }

    pub fn from_config(config: &Config, client: Client) -> Self {
        let rpc = config
            .rpc_url
            .as_ref()
            .map(|url| Arc::new(RpcClient::new(client, url.clone(), config.rpc_max_retries)));
        Self::new(rpc, Duration::from_millis(config.confirmation_poll_ms))
    }

    fn rpc(&self) -> Result<&Arc<RpcClient>> {
        self.rpc.as_ref().ok_or(ClientError::WalletUnavailable)
    }

    pub async fn chain_id(&self) -> Result<String> {
        self.rpc()?
            .request_with_backoff("eth_chainId", json!([]))
            .await
    }

    /// Poll the wallet every `interval` and publish a [`ProviderEvent`] for
    /// every difference from the previous poll. The first poll only records
    /// a baseline.
    pub fn spawn_watcher(&self, interval: Duration) -> Subscription {
        let Some(rpc) = self.rpc.clone() else {
            return Subscription::inactive();
        };
        let events = self.events.clone();
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            info!("Watching wallet at {} every {interval:?}", rpc.url());
            let mut last: Option<WalletSnapshot> = None;

            loop {
                match snapshot(&rpc).await {
                    Ok(next) => {
                        if let Some(prev) = &last {
                            for event in diff_snapshot(prev, &next) {
                                debug!("Wallet event: {event:?}");
                                // No subscribers is not an error.
                                let _ = events.send(event);
                            }
                        }
                        last = Some(next);
                    }
                    Err(e) => error!("Wallet poll error: {e}"),
                }

                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });

        Subscription::new(token)
    }
}

async fn snapshot(rpc: &RpcClient) -> Result<WalletSnapshot> {
    let chain_id = rpc.request_with_backoff("eth_chainId", json!([])).await?;
    let accounts = rpc.request_with_backoff("eth_accounts", json!([])).await?;
    Ok(WalletSnapshot { accounts, chain_id })
}

/// Events implied by moving from `prev` to `next`. A network change comes
/// first since it invalidates everything else.
pub fn diff_snapshot(prev: &WalletSnapshot, next: &WalletSnapshot) -> Vec<ProviderEvent> {
    let mut events = Vec::new();
    if !prev.chain_id.eq_ignore_ascii_case(&next.chain_id) {
        events.push(ProviderEvent::ChainChanged(next.chain_id.clone()));
    }
    if !same_accounts(&prev.accounts, &next.accounts) {
        events.push(ProviderEvent::AccountsChanged(next.accounts.clone()));
    }
    events
}

fn same_accounts(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

#[async_trait]
impl WalletProvider for JsonRpcWallet {
    fn is_present(&self) -> bool {
        self.rpc.is_some()
    }

    async fn request_accounts(&self) -> Result<Vec<String>> {
        let rpc = self.rpc()?;
        match rpc.request("eth_requestAccounts", json!([])).await {
            Err(ClientError::Rpc {
                code: METHOD_NOT_FOUND,
                ..
            }) => {
                debug!("eth_requestAccounts unsupported; using eth_accounts");
                rpc.request("eth_accounts", json!([])).await
            }
            other => other,
        }
    }

    async fn authorized_accounts(&self) -> Result<Vec<String>> {
        self.rpc()?
            .request_with_backoff("eth_accounts", json!([]))
            .await
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn contract(
        &self,
        address: &Address,
        signer: Option<&Address>,
    ) -> Result<Arc<dyn LedgerContract>> {
        let rpc = self.rpc()?;
        Ok(Arc::new(GenesisContract::new(
            Arc::clone(rpc),
            address.clone(),
            signer.cloned(),
            self.confirmation_poll,
        )))
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
