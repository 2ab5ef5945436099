//! Application configuration loaded from environment variables.

use crate::errors::{ClientError, Result};
use crate::models::Address;

#[derive(Debug, Clone)]
pub struct Config {
    /// Wallet / node JSON-RPC endpoint. `None` means no wallet provider is present.
    pub rpc_url: Option<String>,
    /// Address of the deployed Genesis contract
    pub contract_address: Address,
    /// Port for the REST API server
    pub api_port: u16,
    /// How often (in seconds) the wallet is polled for account / chain changes
    pub account_poll_secs: u64,
    /// Delay (in milliseconds) between receipt polls while awaiting confirmation
    pub confirmation_poll_ms: u64,
    /// Retries for idempotent read requests on transport failures
    pub rpc_max_retries: u32,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let contract_address = env_var("CONTRACT_ADDRESS").map_err(|_| {
            ClientError::Config("CONTRACT_ADDRESS environment variable is required".to_string())
        })?;

        Ok(Config {
            rpc_url: env_var("RPC_URL").ok().filter(|url| !url.trim().is_empty()),
            contract_address: Address::parse(&contract_address)
                .map_err(|_| ClientError::Config("Invalid CONTRACT_ADDRESS".to_string()))?,
            api_port: parse_or("API_PORT", "3001")?,
            account_poll_secs: parse_or("ACCOUNT_POLL_SECS", "2")?,
            confirmation_poll_ms: parse_or("CONFIRMATION_POLL_MS", "1000")?,
            rpc_max_retries: parse_or("RPC_MAX_RETRIES", "3")?,
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", "30")?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: &str) -> Result<T> {
    env_var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ClientError::Config(format!("Invalid {key}")))
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ClientError::Config(format!("Missing env var: {key}")))
}
