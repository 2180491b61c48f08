//! Upstream fact source.
//!
//! RULE: pipeline components depend only on the `FactSource` trait, never on
//! a backend's query dialect. `SqliteFactSource` reads a warehouse-export
//! SQLite file; a warehouse-native backend implements the same trait.

use crate::error::{PipelineError, PipelineResult};
use crate::types::AccountId;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OpenFlags};

/// The four independently-extracted daily metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Spend,
    MessagesDelivered,
    Redemptions,
    ActiveSubscribers,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Spend,
        Metric::MessagesDelivered,
        Metric::Redemptions,
        Metric::ActiveSubscribers,
    ];

    /// Stable name used in run summaries and upstream queries.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Spend => "spend",
            Metric::MessagesDelivered => "messages_delivered",
            Metric::Redemptions => "redemptions",
            Metric::ActiveSubscribers => "active_subscribers",
        }
    }
}

/// One account row from the upstream registry feed.
#[derive(Debug, Clone)]
pub struct AccountFeed {
    pub account_id: AccountId,
    pub name: String,
    pub status: String,
    pub launched_at: Option<NaiveDate>,
    pub archived_at: Option<NaiveDate>,
    pub earliest_unit_archived_at: Option<NaiveDate>,
    pub owner: Option<String>,
}

/// One account's total for a single metric on a single date.
/// Zero-activity rows are omitted upstream by construction.
#[derive(Debug, Clone)]
pub struct AccountTotal {
    pub account_id: AccountId,
    pub total: f64,
}

/// Contract with the upstream analytical warehouse.
///
/// Implementations must be `Send + Sync`: the four daily metric queries run
/// concurrently on scoped threads against one shared source.
pub trait FactSource: Send + Sync {
    /// Accounts launched on/before `end`, and — if archived — archived on or
    /// after `window_start`.
    fn fetch_accounts(
        &self,
        window_start: NaiveDate,
        end: NaiveDate,
    ) -> PipelineResult<Vec<AccountFeed>>;

    /// Per-account totals for one metric, strictly within one date.
    fn fetch_daily_totals(
        &self,
        metric: Metric,
        date: NaiveDate,
    ) -> PipelineResult<Vec<AccountTotal>>;
}

/// Fact source backed by a warehouse-export SQLite file.
///
/// Opens a fresh read-only connection per call; `rusqlite::Connection` is
/// not `Sync`, and per-call connections let the four metric jobs query in
/// parallel without a shared lock.
pub struct SqliteFactSource {
    path: String,
}

impl SqliteFactSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    fn connect(&self) -> PipelineResult<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
        )?;
        Ok(conn)
    }
}

impl FactSource for SqliteFactSource {
    fn fetch_accounts(
        &self,
        window_start: NaiveDate,
        end: NaiveDate,
    ) -> PipelineResult<Vec<AccountFeed>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT account_id, name, status, launched_at,
                    archived_at, earliest_unit_archived_at, owner
             FROM accounts_feed
             WHERE launched_at IS NOT NULL
               AND launched_at <= ?1
               AND (
                    (archived_at IS NULL AND earliest_unit_archived_at IS NULL)
                    OR MIN(COALESCE(archived_at, earliest_unit_archived_at),
                           COALESCE(earliest_unit_archived_at, archived_at)) >= ?2
               )
             ORDER BY account_id",
        )?;

        let feeds = stmt
            .query_map(params![end.to_string(), window_start.to_string()], |row| {
                Ok(AccountFeed {
                    account_id: row.get(0)?,
                    name: row.get(1)?,
                    status: row.get(2)?,
                    launched_at: parse_date(row.get::<_, Option<String>>(3)?),
                    archived_at: parse_date(row.get::<_, Option<String>>(4)?),
                    earliest_unit_archived_at: parse_date(row.get::<_, Option<String>>(5)?),
                    owner: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(feeds)
    }

    fn fetch_daily_totals(
        &self,
        metric: Metric,
        date: NaiveDate,
    ) -> PipelineResult<Vec<AccountTotal>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT account_id, SUM(total)
                 FROM fact_events
                 WHERE metric = ?1 AND date = ?2
                 GROUP BY account_id
                 HAVING SUM(total) > 0
                 ORDER BY account_id",
            )
            .map_err(|e| PipelineError::source(metric.name(), e.to_string()))?;

        let totals = stmt
            .query_map(params![metric.name(), date.to_string()], |row| {
                Ok(AccountTotal {
                    account_id: row.get(0)?,
                    total: row.get(1)?,
                })
            })
            .map_err(|e| PipelineError::source(metric.name(), e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PipelineError::source(metric.name(), e.to_string()))?;

        Ok(totals)
    }
}

fn parse_date(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|v| v.parse().ok())
}
