//! Genesis client entry point.
//!
//! Restores any existing wallet authorization, keeps the session in step
//! with the wallet's accounts and network, and exposes the contract gateway
//! as a small Axum REST API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use genesis_client::api::{self, ApiState};
use genesis_client::config::Config;
use genesis_client::{ContractGateway, JsonRpcWallet, NoticeLevel, SessionManager, SessionState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    let client = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;

    let state = SessionState::new();
    let wallet = Arc::new(JsonRpcWallet::from_config(&config, client));
    let session = Arc::new(SessionManager::new(wallet.clone(), state.clone()));
    let gateway = Arc::new(ContractGateway::new(
        wallet.clone(),
        state.clone(),
        config.contract_address.clone(),
    ));

    // ─── Notices ──────────────────────────────────────────
    let mut notices = state.notices();
    tokio::spawn(async move {
        loop {
            let notice = match notices.recv().await {
                Ok(notice) => notice,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Dropped {skipped} notices");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match notice.level {
                NoticeLevel::Error => error!("{}", notice.message),
                NoticeLevel::Warning => warn!("{}", notice.message),
                NoticeLevel::Info | NoticeLevel::Success => info!("{}", notice.message),
            }
        }
    });

    // ─── Wallet session ───────────────────────────────────
    match wallet.chain_id().await {
        Ok(chain_id) => info!("Wallet provider on chain {chain_id}"),
        Err(e) => warn!("Wallet provider unavailable: {e}"),
    }
    if let Err(e) = session.check_existing_connection().await {
        warn!("Starting without a wallet session: {e}");
    }
    let _watcher = wallet.spawn_watcher(Duration::from_secs(config.account_poll_secs));
    let _session_watch = session.watch();

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(ApiState {
        session,
        gateway,
        state,
    });

    let app = api::router(api_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
