//! Process-wide session state shared with presentation collaborators.
//!
//! Each key is a typed [`Slot`] backed by a `tokio::sync::watch` channel:
//! readers get a cloned snapshot or subscribe for change notification, and
//! every write replaces the whole value so no observer ever sees a partially
//! updated entity or collection. Overlapping writers are last-write-wins.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::models::{Address, Backer, Project, Stats};
use crate::provider::ContractHandle;

const NOTICE_CAPACITY: usize = 64;

/// A single observable value. Empty until first set.
pub struct Slot<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone> Slot<T> {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn get(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    pub fn is_set(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Receive a notification on every replacement of this slot.
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.tx.subscribe()
    }

    pub(crate) fn set(&self, value: T) {
        self.tx.send_replace(Some(value));
    }

    pub(crate) fn clear(&self) {
        self.tx.send_replace(None);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-visible message raised by an operation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// The session store. One instance is created at startup and shared by
/// `Arc` for the lifetime of the process.
///
/// Only the session manager writes `connected_account`; only the gateway
/// writes the contract handle and the ledger snapshots.
pub struct SessionState {
    pub connected_account: Slot<Address>,
    pub contract: Slot<ContractHandle>,
    pub projects: Slot<Vec<Project>>,
    pub project: Slot<Project>,
    pub backers: Slot<Vec<Backer>>,
    pub stats: Slot<Stats>,
    notices: broadcast::Sender<Notice>,
}

impl SessionState {
    pub fn new() -> Arc<Self> {
        let (notices, _rx) = broadcast::channel(NOTICE_CAPACITY);
        Arc::new(Self {
            connected_account: Slot::new(),
            contract: Slot::new(),
            projects: Slot::new(),
            project: Slot::new(),
            backers: Slot::new(),
            stats: Slot::new(),
            notices,
        })
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub(crate) fn notify(&self, notice: Notice) {
        // No subscribers is not an error.
        let _ = self.notices.send(notice);
    }

    /// Discard every entry, as after a network switch.
    pub(crate) fn reset(&self) {
        self.connected_account.clear();
        self.contract.clear();
        self.projects.clear();
        self.project.clear();
        self.backers.clear();
        self.stats.clear();
    }
}
