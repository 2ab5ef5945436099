//! In-memory wallet and contract doubles for unit tests, plus a local
//! JSON-RPC node stub for the HTTP-facing layers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{routing::post, Json, Router};
use num_bigint::BigUint;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::errors::{ClientError, Result};
use crate::models::{Address, LedgerUint, RawBacker, RawProject, RawStats};
use crate::provider::{
    CreateProjectCall, LedgerContract, ProviderEvent, TxHash, TxOptions, TxReceipt,
    UpdateProjectCall, WalletProvider,
};

pub const ALICE: &str = "0xA11CE00000000000000000000000000000000001";
pub const BOB: &str = "0xB0B0000000000000000000000000000000000002";
pub const CONTRACT: &str = "0xC0C0000000000000000000000000000000000003";

const NOW_SECS: u64 = 1_700_000_000;

// ─────────────────────────────────────────────────────────
// Wallet
// ─────────────────────────────────────────────────────────

pub struct MockWallet {
    present: bool,
    reject_requests: bool,
    accounts: Mutex<Vec<String>>,
    events: broadcast::Sender<ProviderEvent>,
    ledger: Arc<MockLedger>,
    pub contracts_built: AtomicUsize,
}

impl MockWallet {
    /// A present wallet with no authorized accounts.
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(16);
        Self {
            present: true,
            reject_requests: false,
            accounts: Mutex::new(Vec::new()),
            events,
            ledger: Arc::new(MockLedger::default()),
            contracts_built: AtomicUsize::new(0),
        }
    }

    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new()
        }
    }

    pub fn with_accounts(self, accounts: &[&str]) -> Self {
        self.set_accounts(accounts);
        self
    }

    pub fn rejecting(mut self) -> Self {
        self.reject_requests = true;
        self
    }

    pub fn set_accounts(&self, accounts: &[&str]) {
        *self.accounts.lock().unwrap() = accounts.iter().map(|a| a.to_string()).collect();
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    pub fn ledger(&self) -> &Arc<MockLedger> {
        &self.ledger
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn is_present(&self) -> bool {
        self.present
    }

    async fn request_accounts(&self) -> Result<Vec<String>> {
        if self.reject_requests {
            return Err(ClientError::Rpc {
                code: 4001,
                message: "User rejected the request.".to_string(),
            });
        }
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn authorized_accounts(&self) -> Result<Vec<String>> {
        Ok(self.accounts.lock().unwrap().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn contract(
        &self,
        _address: &Address,
        signer: Option<&Address>,
    ) -> Result<Arc<dyn LedgerContract>> {
        if !self.present {
            return Err(ClientError::WalletUnavailable);
        }
        self.contracts_built.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockBinding {
            ledger: Arc::clone(&self.ledger),
            signer: signer.cloned(),
        }))
    }
}

// ─────────────────────────────────────────────────────────
// Ledger
// ─────────────────────────────────────────────────────────

#[derive(Default)]
struct LedgerData {
    projects: Vec<RawProject>,
    backers: HashMap<u64, Vec<RawBacker>>,
    total_backing: u64,
    total_donations: BigUint,
    tx_count: u64,
}

/// Stand-in for the deployed contract. Applies write effects at submission.
#[derive(Default)]
pub struct MockLedger {
    data: Mutex<LedgerData>,
    fail_submissions: Mutex<Option<String>>,
    fail_reads: Mutex<bool>,
    pub calls: AtomicUsize,
}

impl MockLedger {
    pub fn fail_submissions(&self, reason: &str) {
        *self.fail_submissions.lock().unwrap() = Some(reason.to_string());
    }

    pub fn fail_reads(&self) {
        *self.fail_reads.lock().unwrap() = true;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seed_project(&self, owner: &str, title: &str, cost_wei: u64) -> u64 {
        let mut data = self.data.lock().unwrap();
        let id = data.projects.len() as u64;
        data.projects.push(RawProject {
            id: LedgerUint::from(id),
            owner: owner.to_string(),
            title: title.to_string(),
            description: format!("{title} description"),
            image_url: "https://example.org/project.png".to_string(),
            cost: LedgerUint::from(cost_wei),
            raised: LedgerUint::default(),
            timestamp: LedgerUint::from(NOW_SECS),
            expires_at: LedgerUint::from(NOW_SECS + 86_400),
            backers: LedgerUint::default(),
            status: 0,
        });
        id
    }

    pub fn raw_backers(&self, id: u64) -> Vec<RawBacker> {
        self.data
            .lock()
            .unwrap()
            .backers
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn raw_project(&self, id: u64) -> Option<RawProject> {
        self.data.lock().unwrap().projects.get(id as usize).cloned()
    }

    fn read(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_reads.lock().unwrap() {
            return Err(ClientError::Rpc {
                code: -32000,
                message: "header not found".to_string(),
            });
        }
        Ok(())
    }

    fn submit(
        &self,
        from: Option<&Address>,
        apply: impl FnOnce(&mut LedgerData, &Address) -> Result<()>,
    ) -> Result<TxHash> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let from = from.ok_or(ClientError::NotConnected)?;
        if let Some(reason) = self.fail_submissions.lock().unwrap().clone() {
            return Err(ClientError::Rpc {
                code: -32000,
                message: reason,
            });
        }

        let mut data = self.data.lock().unwrap();
        apply(&mut data, from)?;
        data.tx_count += 1;
        Ok(TxHash(format!("0x{:064x}", data.tx_count)))
    }
}

fn project_mut(data: &mut LedgerData, id: u64) -> Result<&mut RawProject> {
    data.projects
        .get_mut(id as usize)
        .ok_or_else(|| ClientError::TransactionFailed("execution reverted: Project not found".into()))
}

struct MockBinding {
    ledger: Arc<MockLedger>,
    signer: Option<Address>,
}

impl MockBinding {
    fn sender<'a>(&'a self, opts: &'a TxOptions) -> Option<&'a Address> {
        opts.from.as_ref().or(self.signer.as_ref())
    }
}

#[async_trait]
impl LedgerContract for MockBinding {
    async fn create_project(&self, opts: &TxOptions, call: &CreateProjectCall) -> Result<TxHash> {
        let call = call.clone();
        self.ledger.submit(self.sender(opts), move |data, from| {
            let id = data.projects.len() as u64;
            data.projects.push(RawProject {
                id: LedgerUint::from(id),
                owner: from.to_string(),
                title: call.title,
                description: call.description,
                image_url: call.image_url,
                cost: LedgerUint(call.cost),
                raised: LedgerUint::default(),
                timestamp: LedgerUint::from(NOW_SECS),
                expires_at: LedgerUint::from(call.expires_at),
                backers: LedgerUint::default(),
                status: 0,
            });
            Ok(())
        })
    }

    async fn update_project(&self, opts: &TxOptions, call: &UpdateProjectCall) -> Result<TxHash> {
        let call = call.clone();
        self.ledger.submit(self.sender(opts), move |data, _| {
            let project = project_mut(data, call.id)?;
            project.title = call.title;
            project.description = call.description;
            project.image_url = call.image_url;
            project.expires_at = LedgerUint::from(call.expires_at);
            Ok(())
        })
    }

    async fn delete_project(&self, opts: &TxOptions, id: u64) -> Result<TxHash> {
        self.ledger.submit(self.sender(opts), move |data, _| {
            project_mut(data, id)?.status = 3;
            Ok(())
        })
    }

    async fn back_project(&self, opts: &TxOptions, id: u64) -> Result<TxHash> {
        let value = opts.value.clone().unwrap_or_default();
        self.ledger.submit(self.sender(opts), move |data, from| {
            let project = project_mut(data, id)?;
            project.raised = LedgerUint(&project.raised.0 + &value);
            project.backers = LedgerUint(&project.backers.0 + 1u32);
            data.total_backing += 1;
            data.total_donations += &value;
            let seq = data.backers.get(&id).map_or(0, Vec::len) as u64;
            data.backers.entry(id).or_default().push(RawBacker {
                owner: from.to_string(),
                contribution: LedgerUint(value),
                timestamp: LedgerUint::from(NOW_SECS + seq),
                refunded: false,
            });
            Ok(())
        })
    }

    async fn pay_out_project(&self, opts: &TxOptions, id: u64) -> Result<TxHash> {
        self.ledger.submit(self.sender(opts), move |data, _| {
            project_mut(data, id)?.status = 4;
            Ok(())
        })
    }

    async fn wait_for_confirmation(&self, tx_hash: &TxHash) -> Result<TxReceipt> {
        Ok(TxReceipt {
            tx_hash: tx_hash.clone(),
            block_number: Some(1),
        })
    }

    async fn get_projects(&self) -> Result<Vec<RawProject>> {
        self.ledger.read()?;
        Ok(self.ledger.data.lock().unwrap().projects.clone())
    }

    async fn get_project(&self, id: u64) -> Result<RawProject> {
        self.ledger.read()?;
        self.ledger.raw_project(id).ok_or_else(|| ClientError::Rpc {
            code: 3,
            message: "execution reverted: Project not found".to_string(),
        })
    }

    async fn get_backers(&self, id: u64) -> Result<Vec<RawBacker>> {
        self.ledger.read()?;
        Ok(self.ledger.raw_backers(id))
    }

    async fn stats(&self) -> Result<RawStats> {
        self.ledger.read()?;
        let data = self.ledger.data.lock().unwrap();
        Ok(RawStats {
            total_projects: LedgerUint::from(data.projects.len() as u64),
            total_backing: LedgerUint::from(data.total_backing),
            total_donations: LedgerUint(data.total_donations.clone()),
        })
    }
}

// ─────────────────────────────────────────────────────────
// JSON-RPC node stub
// ─────────────────────────────────────────────────────────

/// `Ok(result)` or `Err((code, message))` for one JSON-RPC call.
pub type StubReply = std::result::Result<Value, (i64, String)>;

/// Serve `handler` as a JSON-RPC endpoint on a random loopback port and
/// return its URL. The server lives until the test runtime shuts down.
pub async fn spawn_rpc_stub<F>(handler: F) -> String
where
    F: Fn(&str, Value) -> StubReply + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    let app = Router::new().route(
        "/",
        post(move |Json(request): Json<Value>| {
            let handler = Arc::clone(&handler);
            async move {
                let method = request["method"].as_str().unwrap_or_default().to_string();
                let params = request.get("params").cloned().unwrap_or(Value::Null);
                let id = request["id"].clone();
                Json(match (*handler)(&method, params) {
                    Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
                    Err((code, message)) => json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": { "code": code, "message": message }
                    }),
                })
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
