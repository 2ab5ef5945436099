//! Ethereum JSON-RPC client.
//!
//! ## Resilience
//!
//! * [`RpcClient::request_with_backoff`] retries transport failures and
//!   rate-limit responses with exponential back-off, up to the configured
//!   retry count. It is meant for idempotent reads only.
//! * [`RpcClient::request`] never retries. Transaction submission goes through
//!   it so a write is sent at most once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::{ClientError, Result};

const INITIAL_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF_MS: u64 = 4_000;

/// Returned by nodes and wallets that do not implement a method.
pub const METHOD_NOT_FOUND: i64 = -32601;

// ─────────────────────────────────────────────────────────
// JSON-RPC response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn into_result<T: DeserializeOwned>(self) -> Result<T> {
        if let Some(err) = self.error {
            return Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(serde_json::from_value(self.result)?)
    }
}

// ─────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────

pub struct RpcClient {
    client: Client,
    url: String,
    max_retries: u32,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(client: Client, url: impl Into<String>, max_retries: u32) -> Self {
        Self {
            client,
            url: url.into(),
            max_retries,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one request. Transport and RPC errors are returned as-is.
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let response = self.send(method, &params).await?;
        let body: RpcResponse = response.error_for_status()?.json().await?;
        body.into_result()
    }

    /// Send an idempotent request, retrying transport failures and HTTP 429.
    ///
    /// Errors reported by the node itself are not retried.
    pub async fn request_with_backoff<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T> {
        let mut backoff = INITIAL_BACKOFF_MS;
        let mut attempt = 0;

        loop {
            let failure = match self.send(method, &params).await {
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    "rate-limited".to_string()
                }
                Ok(resp) => {
                    let body: RpcResponse = resp.error_for_status()?.json().await?;
                    return body.into_result();
                }
                Err(e) if attempt < self.max_retries => e.to_string(),
                Err(e) => return Err(e),
            };

            if attempt >= self.max_retries {
                return Err(ClientError::Rpc {
                    code: i64::from(StatusCode::TOO_MANY_REQUESTS.as_u16()),
                    message: format!("{method}: {failure}"),
                });
            }
            attempt += 1;
            warn!("{method} {failure} (retry {attempt}/{} in {backoff}ms)", self.max_retries);
            tokio::time::sleep(Duration::from_millis(backoff)).await;
            backoff = (backoff * 2).min(MAX_BACKOFF_MS);
        }
    }

    async fn send(&self, method: &str, params: &Value) -> Result<reqwest::Response> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("RPC {method} (id={id})");

        let response = self
            .client
            .post(&self.url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await?;
        Ok(response)
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
