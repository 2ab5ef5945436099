//! Wallet session lifecycle: provider detection, account authorization and
//! reaction to account / network changes.
//!
//! The session manager is the only writer of
//! [`SessionState::connected_account`].

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{ClientError, Result};
use crate::models::Address;
use crate::provider::{ProviderEvent, Subscription, WalletProvider};
use crate::state::{Notice, SessionState};

const INSTALL_WALLET: &str = "Please install a wallet provider.";
const CONNECT_WALLET: &str = "Please connect wallet.";

/// Provider error code for "user rejected the request".
const USER_REJECTED: i64 = 4001;

pub struct SessionManager {
    wallet: Arc<dyn WalletProvider>,
    state: Arc<SessionState>,
}

impl SessionManager {
    pub fn new(wallet: Arc<dyn WalletProvider>, state: Arc<SessionState>) -> Self {
        Self { wallet, state }
    }

    pub fn wallet_present(&self) -> bool {
        self.wallet.is_present()
    }

    /// Fails only when no wallet provider is present.
    pub fn probe_wallet(&self) -> Result<()> {
        if self.wallet.is_present() {
            return Ok(());
        }
        warn!("No wallet provider detected");
        self.state.notify(Notice::error(INSTALL_WALLET));
        Err(ClientError::WalletUnavailable)
    }

    /// Ask the wallet to authorize an account and make the first one current.
    pub async fn connect(&self) -> Result<Address> {
        self.probe_wallet()?;

        let accounts = self.wallet.request_accounts().await.map_err(|e| {
            let err = match e {
                ClientError::Rpc {
                    code: USER_REJECTED,
                    message,
                } => ClientError::ConnectionRejected(message),
                other => other,
            };
            self.report(&err);
            err
        })?;

        let account = match first_account(&accounts) {
            Ok(Some(account)) => account,
            Ok(None) => {
                let err = ClientError::ConnectionRejected("no account was authorized".into());
                self.report(&err);
                return Err(err);
            }
            Err(e) => {
                self.report(&e);
                return Err(e);
            }
        };

        info!("Wallet connected: {account}");
        self.state.connected_account.set(account.clone());
        Ok(account)
    }

    /// Pick up an existing authorization without prompting.
    ///
    /// With no authorized accounts the session is left disconnected and a
    /// "please connect" notice is raised; that is not an error.
    pub async fn check_existing_connection(&self) -> Result<Option<Address>> {
        self.probe_wallet()?;

        let accounts = self
            .wallet
            .authorized_accounts()
            .await
            .and_then(|accounts| first_account(&accounts))
            .map_err(|e| {
                self.report(&e);
                e
            })?;

        match accounts {
            Some(account) => {
                debug!("Existing wallet authorization for {account}");
                self.state.connected_account.set(account.clone());
                Ok(Some(account))
            }
            None => {
                info!("No accounts found");
                self.state.connected_account.clear();
                self.state.notify(Notice::info(CONNECT_WALLET));
                Ok(None)
            }
        }
    }

    /// Invoke `handler` with the raw account list on every account change.
    pub fn on_accounts_changed<F>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(Vec<String>) + Send + 'static,
    {
        self.listen(move |event| {
            if let ProviderEvent::AccountsChanged(accounts) = event {
                handler(accounts);
            }
            std::future::ready(())
        })
    }

    /// Invoke `handler` with the new chain id on every network change.
    pub fn on_chain_changed<F>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(String) + Send + 'static,
    {
        self.listen(move |event| {
            if let ProviderEvent::ChainChanged(chain_id) = event {
                handler(chain_id);
            }
            std::future::ready(())
        })
    }

    /// Keep the session consistent with the wallet for as long as the
    /// returned subscription lives.
    pub fn watch(self: &Arc<Self>) -> Subscription {
        let this = Arc::clone(self);
        self.listen(move |event| {
            let this = Arc::clone(&this);
            async move { this.handle_event(event).await }
        })
    }

    /// Apply one provider event to the session.
    ///
    /// A chain change is a hard reset: every state entry is discarded and the
    /// session re-initialized. An account change replaces the current account
    /// and re-checks the authorization.
    pub async fn handle_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::ChainChanged(chain_id) => {
                info!("Network changed to {chain_id}; resetting session");
                self.state.reset();
            }
            ProviderEvent::AccountsChanged(accounts) => match first_account(&accounts) {
                Ok(Some(account)) => {
                    info!("Active account changed to {account}");
                    self.state.connected_account.set(account);
                }
                Ok(None) => {
                    info!("Wallet disconnected all accounts");
                    self.state.connected_account.clear();
                }
                Err(e) => warn!("Ignoring malformed account change: {e}"),
            },
        }

        if let Err(e) = self.check_existing_connection().await {
            debug!("Session re-check after wallet event failed: {e}");
        }
    }

    fn listen<F, Fut>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(ProviderEvent) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut events = self.wallet.subscribe();
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    received = events.recv() => match received {
                        Ok(event) => handler(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Missed {skipped} wallet events");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });

        Subscription::new(token)
    }

    fn report(&self, err: &ClientError) {
        error!("Wallet session error: {err}");
        self.state.notify(Notice::error(err.to_string()));
    }
}

fn first_account(accounts: &[String]) -> Result<Option<Address>> {
    accounts.first().map(|a| Address::parse(a)).transpose()
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
