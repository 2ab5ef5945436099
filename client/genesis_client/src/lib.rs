//! Genesis crowdfunding client.
//!
//! Connects to a wallet provider, keeps a shared session state in step with
//! the wallet's accounts and network, and reads and writes projects on the
//! Genesis contract. Ledger data is normalized into display-ready values on
//! the way in; user input is validated and converted on the way out.

pub mod abi;
pub mod api;
pub mod config;
pub mod contract;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod normalize;
pub mod provider;
pub mod rpc;
pub mod session;
pub mod state;
pub mod units;
pub mod wallet;

#[cfg(test)]
mod mock;

pub use errors::{ClientError, Result};
pub use gateway::{ContractGateway, NewProject, ProjectEdit};
pub use models::{Address, Backer, Project, ProjectStatus, Stats};
pub use session::SessionManager;
pub use state::{Notice, NoticeLevel, SessionState};
pub use units::Amount;
pub use wallet::JsonRpcWallet;
