//! Capabilities supplied by the wallet environment.
//!
//! [`WalletProvider`] is the account/network side (authorization, change
//! notifications, contract binding); [`LedgerContract`] is the Genesis
//! contract's call interface. Both are traits so the session manager and
//! the gateway run against a JSON-RPC node in production and against
//! in-memory doubles in tests.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use num_bigint::BigUint;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::errors::Result;
use crate::models::{Address, RawBacker, RawProject, RawStats};

/// Change notifications pushed by the wallet provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The set of authorized accounts changed. Raw strings as reported.
    AccountsChanged(Vec<String>),
    /// The wallet switched networks.
    ChainChanged(String),
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Whether a wallet provider is available at all.
    fn is_present(&self) -> bool;

    /// Ask the user to authorize accounts. May prompt.
    async fn request_accounts(&self) -> Result<Vec<String>>;

    /// Accounts already authorized for this client. Never prompts.
    async fn authorized_accounts(&self) -> Result<Vec<String>>;

    /// Receive every subsequent [`ProviderEvent`].
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;

    /// Bind the contract at `address`. With a `signer` the binding can submit
    /// transactions signed by that account; without one it is read-only.
    fn contract(
        &self,
        address: &Address,
        signer: Option<&Address>,
    ) -> Result<Arc<dyn LedgerContract>>;
}

// ─────────────────────────────────────────────────────────
// Contract capability
// ─────────────────────────────────────────────────────────

/// Per-transaction overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// Sending account. Falls back to the binding's signer.
    pub from: Option<Address>,
    /// Value attached to the transaction, in wei.
    pub value: Option<BigUint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProjectCall {
    pub title: String,
    pub description: String,
    pub image_url: String,
    /// Wei.
    pub cost: BigUint,
    /// Seconds since the epoch.
    pub expires_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateProjectCall {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub image_url: String,
    /// Seconds since the epoch.
    pub expires_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A mined, successful transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

#[async_trait]
pub trait LedgerContract: Send + Sync {
    async fn create_project(&self, opts: &TxOptions, call: &CreateProjectCall) -> Result<TxHash>;
    async fn update_project(&self, opts: &TxOptions, call: &UpdateProjectCall) -> Result<TxHash>;
    async fn delete_project(&self, opts: &TxOptions, id: u64) -> Result<TxHash>;
    async fn back_project(&self, opts: &TxOptions, id: u64) -> Result<TxHash>;
    async fn pay_out_project(&self, opts: &TxOptions, id: u64) -> Result<TxHash>;

    /// Resolve once the transaction is mined. Fails if it reverted.
    async fn wait_for_confirmation(&self, tx_hash: &TxHash) -> Result<TxReceipt>;

    async fn get_projects(&self) -> Result<Vec<RawProject>>;
    async fn get_project(&self, id: u64) -> Result<RawProject>;
    async fn get_backers(&self, id: u64) -> Result<Vec<RawBacker>>;
    async fn stats(&self) -> Result<RawStats>;
}

/// A contract binding plus the account it signs for, if any.
#[derive(Clone)]
pub struct ContractHandle {
    contract: Arc<dyn LedgerContract>,
    signer: Option<Address>,
}

impl ContractHandle {
    pub fn new(contract: Arc<dyn LedgerContract>, signer: Option<Address>) -> Self {
        Self { contract, signer }
    }

    pub fn contract(&self) -> &dyn LedgerContract {
        self.contract.as_ref()
    }

    pub fn signer(&self) -> Option<&Address> {
        self.signer.as_ref()
    }

    pub fn is_read_only(&self) -> bool {
        self.signer.is_none()
    }
}

impl fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractHandle")
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────
// Subscriptions
// ─────────────────────────────────────────────────────────

/// Keeps a background listener alive. Dropping it, or calling
/// [`Subscription::unsubscribe`], stops the listener.
pub struct Subscription {
    token: CancellationToken,
    _guard: DropGuard,
}

impl Subscription {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            _guard: token.clone().drop_guard(),
            token,
        }
    }

    /// A subscription that was never attached to anything.
    pub fn inactive() -> Self {
        let token = CancellationToken::new();
        token.cancel();
        Self::new(token)
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn unsubscribe(self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_subscription_cancels() {
        let token = CancellationToken::new();
        let sub = Subscription::new(token.clone());
        assert!(sub.is_active());
        drop(sub);
        assert!(token.is_cancelled());
    }

    #[test]
    fn unsubscribe_cancels() {
        let token = CancellationToken::new();
        Subscription::new(token.clone()).unsubscribe();
        assert!(token.is_cancelled());
        assert!(!Subscription::inactive().is_active());
    }
}
