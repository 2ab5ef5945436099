//! Data normalization: raw ledger records into application shapes.
//!
//! Every function here is pure. Addresses are lowercased, fixed-point
//! money becomes [`Amount`](crate::units::Amount), integer fields become
//! native integers, timestamps (seconds) become UTC instants, and
//! collections are reversed so the most recent entry comes first.

use chrono::{DateTime, Utc};

use crate::errors::{ClientError, Result};
use crate::models::{
    Address, Backer, LedgerUint, Project, ProjectStatus, RawBacker, RawProject, RawStats, Stats,
};
use crate::units::{fixed_point_to_decimal, ETHER_DECIMALS};

pub fn project(raw: &RawProject) -> Result<Project> {
    Ok(Project {
        id: to_u64(&raw.id, "id")?,
        owner: Address::parse(&raw.owner)?,
        title: raw.title.clone(),
        description: raw.description.clone(),
        image_url: raw.image_url.clone(),
        created_at: to_instant(&raw.timestamp, "timestamp")?,
        expires_at: to_instant(&raw.expires_at, "expiresAt")?,
        cost: fixed_point_to_decimal(&raw.cost.0, ETHER_DECIMALS),
        raised: fixed_point_to_decimal(&raw.raised.0, ETHER_DECIMALS),
        backer_count: to_u64(&raw.backers, "backers")?,
        status: ProjectStatus::try_from(raw.status)?,
    })
}

/// Most recently created project first.
pub fn projects(raw: &[RawProject]) -> Result<Vec<Project>> {
    raw.iter().rev().map(project).collect()
}

pub fn backer(raw: &RawBacker) -> Result<Backer> {
    Ok(Backer {
        owner: Address::parse(&raw.owner)?,
        contribution: fixed_point_to_decimal(&raw.contribution.0, ETHER_DECIMALS),
        refunded: raw.refunded,
        timestamp: to_instant(&raw.timestamp, "timestamp")?,
    })
}

/// Most recent backing first.
pub fn backers(raw: &[RawBacker]) -> Result<Vec<Backer>> {
    raw.iter().rev().map(backer).collect()
}

pub fn stats(raw: &RawStats) -> Result<Stats> {
    Ok(Stats {
        total_projects: to_u64(&raw.total_projects, "totalProjects")?,
        total_backing: to_u64(&raw.total_backing, "totalBacking")?,
        total_donations: fixed_point_to_decimal(&raw.total_donations.0, ETHER_DECIMALS),
    })
}

fn to_u64(value: &LedgerUint, field: &str) -> Result<u64> {
    u64::try_from(&value.0)
        .map_err(|_| ClientError::Decode(format!("{field} {} does not fit in u64", value.0)))
}

fn to_instant(value: &LedgerUint, field: &str) -> Result<DateTime<Utc>> {
    let secs = to_u64(value, field)?;
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| ClientError::Decode(format!("{field} {secs}s is out of range")))
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
