//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("No wallet provider detected. Please install a wallet provider")]
    WalletUnavailable,

    #[error("No account connected. Please connect wallet")]
    NotConnected,

    #[error("Wallet connection rejected: {0}")]
    ConnectionRejected(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl ClientError {
    /// Malformed user input. These abort an operation before anything is
    /// sent to the ledger.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidDate(_)
                | Self::InvalidAmount(_)
                | Self::InvalidAddress(_)
                | Self::InvalidInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
