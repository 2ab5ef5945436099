//! Contract gateway: resolves a contract handle and runs every read and
//! write operation against the Genesis contract.
//!
//! Writes follow one lifecycle: validate and convert input, resolve a
//! handle, submit, wait for confirmation, then reload the affected slice of
//! session state. Nothing is retried. If the reload fails the write still
//! counts as committed and the local state stays stale until the next read.

use std::sync::Arc;

use num_bigint::BigUint;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::errors::{ClientError, Result};
use crate::models::{Address, Backer, Project, Stats};
use crate::normalize;
use crate::provider::{
    ContractHandle, CreateProjectCall, TxHash, TxOptions, TxReceipt, UpdateProjectCall,
    WalletProvider,
};
use crate::state::{Notice, SessionState};
use crate::units::{self, ETHER_DECIMALS};

/// User input for a new project, as entered in the create form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub title: String,
    pub description: String,
    #[serde(rename = "imageURL")]
    pub image_url: String,
    /// Decimal ether amount, e.g. `"2.5"`.
    pub cost: String,
    /// Calendar date, e.g. `"2025-01-01"`.
    pub expires_at: String,
}

/// User input for editing a project. The cost cannot be changed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEdit {
    pub title: String,
    pub description: String,
    #[serde(rename = "imageURL")]
    pub image_url: String,
    pub expires_at: String,
}

impl NewProject {
    fn to_call(&self) -> Result<CreateProjectCall> {
        let cost = units::decimal_to_fixed_point(&self.cost, ETHER_DECIMALS)?;
        if cost.bits() == 0 {
            return Err(ClientError::InvalidAmount(
                "cost must be greater than zero".to_string(),
            ));
        }

        Ok(CreateProjectCall {
            title: required("title", &self.title)?,
            description: required("description", &self.description)?,
            image_url: image_url(&self.image_url)?,
            cost,
            expires_at: expiry_seconds(&self.expires_at)?,
        })
    }
}

impl ProjectEdit {
    fn to_call(&self, id: u64) -> Result<UpdateProjectCall> {
        Ok(UpdateProjectCall {
            id,
            title: required("title", &self.title)?,
            description: required("description", &self.description)?,
            image_url: image_url(&self.image_url)?,
            expires_at: expiry_seconds(&self.expires_at)?,
        })
    }
}

pub struct ContractGateway {
    wallet: Arc<dyn WalletProvider>,
    state: Arc<SessionState>,
    contract_address: Address,
}

impl ContractGateway {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        state: Arc<SessionState>,
        contract_address: Address,
    ) -> Self {
        Self {
            wallet,
            state,
            contract_address,
        }
    }

    /// Signer-bound handle for the connected account, else the cached
    /// read-only handle, else a fresh read-only handle if a wallet is present.
    pub fn resolve_handle(&self) -> Result<ContractHandle> {
        let cached = self.state.contract.get();

        if let Some(account) = self.state.connected_account.get() {
            if let Some(handle) = cached.filter(|h| h.signer() == Some(&account)) {
                return Ok(handle);
            }
            if !self.wallet.is_present() {
                return Err(ClientError::WalletUnavailable);
            }
            let contract = self.wallet.contract(&self.contract_address, Some(&account))?;
            debug!("Bound contract {} to signer {account}", self.contract_address);
            return Ok(self.cache(ContractHandle::new(contract, Some(account))));
        }

        if let Some(handle) = cached.filter(ContractHandle::is_read_only) {
            return Ok(handle);
        }
        if !self.wallet.is_present() {
            return Err(ClientError::WalletUnavailable);
        }
        let contract = self.wallet.contract(&self.contract_address, None)?;
        debug!("Bound contract {} read-only", self.contract_address);
        Ok(self.cache(ContractHandle::new(contract, None)))
    }

    // ─────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────

    /// Submit a new project, then reload the project list.
    pub async fn create_project(&self, input: &NewProject) -> Result<TxReceipt> {
        let receipt = self.report("create project", self.try_create_project(input).await)?;
        self.state
            .notify(Notice::success("Project created successfully, will reflect shortly."));
        if let Err(e) = self.load_projects().await {
            warn!("Project list reload after create failed: {e}");
        }
        Ok(receipt)
    }

    async fn try_create_project(&self, input: &NewProject) -> Result<TxReceipt> {
        self.ensure_provider()?;
        let call = input.to_call()?;
        let handle = self.resolve_handle()?;

        let pending = handle.contract().create_project(&TxOptions::default(), &call).await;
        self.confirm(&handle, pending).await
    }

    /// Submit edits to project `id`, then reload that project.
    pub async fn update_project(&self, id: u64, edit: &ProjectEdit) -> Result<TxReceipt> {
        let receipt = self.report("update project", self.try_update_project(id, edit).await)?;
        self.state.notify(Notice::success("Project updated successfully."));
        self.reload_project(id).await;
        Ok(receipt)
    }

    async fn try_update_project(&self, id: u64, edit: &ProjectEdit) -> Result<TxReceipt> {
        self.ensure_provider()?;
        let call = edit.to_call(id)?;
        let handle = self.resolve_handle()?;

        let pending = handle.contract().update_project(&TxOptions::default(), &call).await;
        self.confirm(&handle, pending).await
    }

    /// Delete project `id`, then reload it to pick up its new status.
    pub async fn delete_project(&self, id: u64) -> Result<TxReceipt> {
        let receipt = self.report("delete project", self.try_delete_project(id).await)?;
        self.state.notify(Notice::success("Project deleted successfully."));
        self.reload_project(id).await;
        Ok(receipt)
    }

    async fn try_delete_project(&self, id: u64) -> Result<TxReceipt> {
        self.ensure_provider()?;
        let handle = self.resolve_handle()?;

        let pending = handle.contract().delete_project(&TxOptions::default(), id).await;
        self.confirm(&handle, pending).await
    }

    /// Back project `id` with `amount` ether from the connected account.
    pub async fn back_project(&self, id: u64, amount: &str) -> Result<TxReceipt> {
        let receipt = self.report("back project", self.try_back_project(id, amount).await)?;
        self.state
            .notify(Notice::success("Thanks for backing this project!"));
        self.reload_backers(id).await;
        Ok(receipt)
    }

    async fn try_back_project(&self, id: u64, amount: &str) -> Result<TxReceipt> {
        self.ensure_provider()?;
        let value = units::decimal_to_fixed_point(amount, ETHER_DECIMALS)?;
        if value.bits() == 0 {
            return Err(ClientError::InvalidAmount(
                "backing amount must be greater than zero".to_string(),
            ));
        }
        let opts = self.sender_options(Some(value))?;
        let handle = self.resolve_handle()?;

        debug!("Backing project {id} with {amount} ether");
        let pending = handle.contract().back_project(&opts, id).await;
        self.confirm(&handle, pending).await
    }

    /// Pay out project `id` to its owner.
    pub async fn payout_project(&self, id: u64) -> Result<TxReceipt> {
        let receipt = self.report("pay out project", self.try_payout_project(id).await)?;
        self.state
            .notify(Notice::success("Project paid out successfully."));
        self.reload_backers(id).await;
        Ok(receipt)
    }

    async fn try_payout_project(&self, id: u64) -> Result<TxReceipt> {
        self.ensure_provider()?;
        let opts = self.sender_options(None)?;
        let handle = self.resolve_handle()?;

        let pending = handle.contract().pay_out_project(&opts, id).await;
        self.confirm(&handle, pending).await
    }

    // ─────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────

    /// Replace the project list and the stats snapshot. Returns both as read
    /// in this pass.
    pub async fn load_projects(&self) -> Result<(Vec<Project>, Stats)> {
        self.report("load projects", self.try_load_projects().await)
    }

    async fn try_load_projects(&self) -> Result<(Vec<Project>, Stats)> {
        let handle = self.resolve_handle()?;
        let raw_projects = handle.contract().get_projects().await?;
        let raw_stats = handle.contract().stats().await?;

        let projects = normalize::projects(&raw_projects)?;
        let stats = normalize::stats(&raw_stats)?;
        debug!(
            "Loaded {} projects ({} backings in total)",
            projects.len(),
            stats.total_backing
        );

        self.state.stats.set(stats.clone());
        self.state.projects.set(projects.clone());
        Ok((projects, stats))
    }

    /// Replace the current project snapshot with project `id`.
    pub async fn load_project(&self, id: u64) -> Result<Project> {
        self.report("load project", self.try_load_project(id).await)
    }

    async fn try_load_project(&self, id: u64) -> Result<Project> {
        let handle = self.resolve_handle()?;
        let raw = handle.contract().get_project(id).await?;
        let project = normalize::project(&raw)?;

        self.state.project.set(project.clone());
        Ok(project)
    }

    /// Replace the backers snapshot with those of project `id`.
    pub async fn get_backers(&self, id: u64) -> Result<Vec<Backer>> {
        self.report("load backers", self.try_get_backers(id).await)
    }

    async fn try_get_backers(&self, id: u64) -> Result<Vec<Backer>> {
        let handle = self.resolve_handle()?;
        let raw = handle.contract().get_backers(id).await?;
        let backers = normalize::backers(&raw)?;

        self.state.backers.set(backers.clone());
        Ok(backers)
    }

    // ─────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────

    fn cache(&self, handle: ContractHandle) -> ContractHandle {
        self.state.contract.set(handle.clone());
        handle
    }

    fn ensure_provider(&self) -> Result<()> {
        if self.wallet.is_present() {
            Ok(())
        } else {
            Err(ClientError::WalletUnavailable)
        }
    }

    /// Options whose `from` is bound to the connected account.
    fn sender_options(&self, value: Option<BigUint>) -> Result<TxOptions> {
        let from = self
            .state
            .connected_account
            .get()
            .ok_or(ClientError::NotConnected)?;
        Ok(TxOptions {
            from: Some(from),
            value,
        })
    }

    async fn confirm(
        &self,
        handle: &ContractHandle,
        pending: Result<TxHash>,
    ) -> Result<TxReceipt> {
        let tx_hash = pending.map_err(into_tx_failure)?;
        debug!("Submitted transaction {tx_hash}; awaiting confirmation");

        let receipt = handle
            .contract()
            .wait_for_confirmation(&tx_hash)
            .await
            .map_err(into_tx_failure)?;
        info!(
            "Transaction {tx_hash} confirmed in block {}",
            receipt
                .block_number
                .map_or_else(|| "?".to_string(), |n| n.to_string())
        );
        Ok(receipt)
    }

    async fn reload_project(&self, id: u64) {
        if let Err(e) = self.load_project(id).await {
            warn!("Reload of project {id} after write failed: {e}");
        }
    }

    async fn reload_backers(&self, id: u64) {
        if let Err(e) = self.get_backers(id).await {
            warn!("Reload of backers for project {id} after write failed: {e}");
        }
    }

    /// Log and surface a failed operation; pass the result through.
    fn report<T>(&self, action: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            error!("Failed to {action}: {e}");
            self.state.notify(Notice::error(e.to_string()));
        }
        result
    }
}

fn into_tx_failure(err: ClientError) -> ClientError {
    match err {
        ClientError::WalletUnavailable
        | ClientError::NotConnected
        | ClientError::TransactionFailed(_) => err,
        other => ClientError::TransactionFailed(other.to_string()),
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ClientError::InvalidInput(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn image_url(value: &str) -> Result<String> {
    let value = required("imageURL", value)?;
    reqwest::Url::parse(&value)
        .map_err(|e| ClientError::InvalidInput(format!("imageURL {value:?}: {e}")))?;
    Ok(value)
}

fn expiry_seconds(date: &str) -> Result<u64> {
    let seconds = units::date_to_epoch_seconds(date)?;
    u64::try_from(seconds)
        .map_err(|_| ClientError::InvalidDate(format!("{date} is before the epoch")))
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
