//! Ledger record schemas and the application shapes they normalize into.
//!
//! `Raw*` types are the input contract of the normalizer: they mirror what
//! the Genesis contract returns, with integer fields in whatever loose
//! encoding the transport produced. The remaining types are the stable
//! application-level values held in session state.

use std::fmt;

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::errors::{ClientError, Result};
use crate::units::{self, Amount};

// ─────────────────────────────────────────────────────────
// Address
// ─────────────────────────────────────────────────────────

/// A 20-byte account or contract address, stored lowercase with `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Address(String);

impl Address {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let hex = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .filter(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| ClientError::InvalidAddress(value.to_string()))?;

        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_bytes(&self) -> [u8; 20] {
        let mut bytes = [0u8; 20];
        // Validated in `parse`.
        if let Ok(decoded) = hex::decode(&self.0[2..]) {
            bytes.copy_from_slice(&decoded);
        }
        bytes
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────
// Raw ledger records
// ─────────────────────────────────────────────────────────

/// An unsigned ledger integer of arbitrary width.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "LedgerUintRepr")]
pub struct LedgerUint(pub BigUint);

#[derive(Deserialize)]
#[serde(untagged)]
enum LedgerUintRepr {
    Number(u64),
    Text(String),
    BigNumber {
        #[serde(alias = "_hex")]
        hex: String,
    },
}

impl TryFrom<LedgerUintRepr> for LedgerUint {
    type Error = ClientError;

    fn try_from(repr: LedgerUintRepr) -> Result<Self> {
        match repr {
            LedgerUintRepr::Number(n) => Ok(Self(BigUint::from(n))),
            LedgerUintRepr::Text(s) | LedgerUintRepr::BigNumber { hex: s } => {
                units::parse_quantity(&s).map(Self)
            }
        }
    }
}

impl From<u64> for LedgerUint {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<BigUint> for LedgerUint {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

/// A project record as returned by `getProject` / `getProjects`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProject {
    pub id: LedgerUint,
    pub owner: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "imageURL")]
    pub image_url: String,
    pub cost: LedgerUint,
    pub raised: LedgerUint,
    /// Creation time, seconds since the epoch.
    #[serde(default)]
    pub timestamp: LedgerUint,
    /// Expiry time, seconds since the epoch.
    pub expires_at: LedgerUint,
    pub backers: LedgerUint,
    pub status: u8,
}

/// A backing record as returned by `getBackers`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawBacker {
    pub owner: String,
    pub contribution: LedgerUint,
    /// Seconds since the epoch.
    pub timestamp: LedgerUint,
    pub refunded: bool,
}

/// The aggregate returned by `stats()`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStats {
    pub total_projects: LedgerUint,
    pub total_backing: LedgerUint,
    pub total_donations: LedgerUint,
}

// ─────────────────────────────────────────────────────────
// Application shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProjectStatus {
    Open,
    Accepted,
    Reverted,
    Deleted,
    Paid,
}

impl ProjectStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Accepted => "Accepted",
            Self::Reverted => "Reverted",
            Self::Deleted => "Deleted",
            Self::Paid => "Paid",
        }
    }
}

impl TryFrom<u8> for ProjectStatus {
    type Error = ClientError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Open),
            1 => Ok(Self::Accepted),
            2 => Ok(Self::Reverted),
            3 => Ok(Self::Deleted),
            4 => Ok(Self::Paid),
            other => Err(ClientError::Decode(format!("unknown project status {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: u64,
    pub owner: Address,
    pub title: String,
    pub description: String,
    #[serde(rename = "imageURL")]
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub cost: Amount,
    pub raised: Amount,
    pub backer_count: u64,
    pub status: ProjectStatus,
}

impl Project {
    /// Expiry is derived at render time and never stored.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_days().max(0)
    }

    /// Expiry date as `YYYY-MM-DD` in the host's local calendar.
    pub fn expiry_label(&self) -> Result<String> {
        units::epoch_millis_to_date_label(self.expires_at.timestamp_millis())
    }

    /// Whole percent of the cost raised so far.
    pub fn percent_funded(&self) -> u64 {
        let cost = self.cost.to_fixed_point(units::ETHER_DECIMALS);
        if cost.bits() == 0 {
            return 0;
        }
        let raised = self.raised.to_fixed_point(units::ETHER_DECIMALS);
        u64::try_from(&(raised * 100u32 / cost)).unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backer {
    pub owner: Address,
    pub contribution: Amount,
    pub refunded: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_projects: u64,
    pub total_backing: u64,
    pub total_donations: Amount,
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
