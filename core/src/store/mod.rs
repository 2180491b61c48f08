//! SQLite persistence layer for the rollup tables.
//!
//! RULE: Only the store talks to the database.
//! Pipeline components call store methods — they never execute SQL directly.
//! The reporting layer reads the same three tables, read-only.

mod account;
mod daily;
mod monthly;

use crate::error::PipelineResult;
use crate::risk::RiskLevel;
use crate::types::{AccountId, AccountStatus, MonthKey};
use chrono::NaiveDate;
use rusqlite::Connection;

pub struct MetricsStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl MetricsStore {
    pub fn open(path: &str) -> PipelineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> PipelineResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases this returns a fresh isolated database;
    /// for file-based databases it opens the same file.
    pub fn reopen(&self) -> PipelineResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> PipelineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }
}

// ── Record types ─────────────────────────────────────────────────────────────

/// One row of the account registry, denormalized lifecycle included.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub account_id: AccountId,
    pub name: String,
    pub status: AccountStatus,
    pub launched_at: Option<NaiveDate>,
    pub archived_at: Option<NaiveDate>,
    pub earliest_unit_archived_at: Option<NaiveDate>,
    pub owner: Option<String>,
}

impl AccountRecord {
    /// The authoritative archive date for alive-during-month checks:
    /// the *earlier* of the two archive signals.
    pub fn archive_cutoff(&self) -> Option<NaiveDate> {
        match (self.archived_at, self.earliest_unit_archived_at) {
            (Some(a), Some(e)) => Some(a.min(e)),
            (Some(a), None) => Some(a),
            (None, Some(e)) => Some(e),
            (None, None) => None,
        }
    }

    /// Archive date preferred for operator-facing display.
    pub fn display_archived_at(&self) -> Option<NaiveDate> {
        self.archived_at.or(self.earliest_unit_archived_at)
    }

    /// Month-level eligibility: launched on/before the month's last day,
    /// and not archived before the month began. Archived accounts stay
    /// visible for every month up to and including their archive month.
    pub fn eligible_for_month(&self, month: MonthKey) -> bool {
        let Some(launched) = self.launched_at else {
            return false;
        };
        if launched > month.last_day() {
            return false;
        }
        match self.archive_cutoff() {
            Some(cutoff) => cutoff >= month.first_day(),
            None => true,
        }
    }

    /// Day-level extraction eligibility: launched on/before `date` and alive
    /// for the entirety of the date's containing month.
    pub fn eligible_for_day(&self, date: NaiveDate) -> bool {
        let Some(launched) = self.launched_at else {
            return false;
        };
        if launched > date {
            return false;
        }
        match self.archive_cutoff() {
            Some(cutoff) => cutoff > MonthKey::from_date(date).last_day(),
            None => true,
        }
    }
}

/// One row of the daily ledger. Each metric carries its own last-updated
/// stamp because each is populated by an independent extraction job.
#[derive(Debug, Clone)]
pub struct DailyMetricRow {
    pub account_id: AccountId,
    pub date: NaiveDate,
    pub spend: f64,
    pub spend_updated_at: Option<String>,
    pub messages_delivered: i64,
    pub messages_updated_at: Option<String>,
    pub redemptions: i64,
    pub redemptions_updated_at: Option<String>,
    pub active_subscribers: i64,
    pub subscribers_updated_at: Option<String>,
}

/// Aggregated totals for one account over (part of) a month.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MonthlyTotals {
    pub total_spend: f64,
    pub total_messages: i64,
    pub total_redemptions: i64,
    pub avg_active_subscribers: f64,
}

/// One row of the monthly rollup table, both classification slots included.
#[derive(Debug, Clone)]
pub struct MonthlyMetricRow {
    pub account_id: AccountId,
    pub month: MonthKey,
    pub totals: MonthlyTotals,
    pub trending_risk_level: Option<RiskLevel>,
    pub trending_risk_reasons: Option<Vec<String>>,
    pub historical_risk_level: Option<RiskLevel>,
    pub risk_reasons: Option<Vec<String>>,
}
