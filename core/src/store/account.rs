use super::{AccountRecord, MetricsStore};
use crate::error::PipelineResult;
use crate::types::AccountStatus;
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

impl MetricsStore {
    /// Upsert one registry row keyed on `account_id`.
    /// Accounts are never hard-deleted; a soft refresh leaves rows that
    /// aged out of the rolling window untouched.
    pub fn upsert_account(&self, record: &AccountRecord) -> PipelineResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO accounts (
                account_id, name, status, launched_at,
                archived_at, earliest_unit_archived_at, owner, updated_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
            ON CONFLICT(account_id) DO UPDATE SET
                name                      = excluded.name,
                status                    = excluded.status,
                launched_at               = excluded.launched_at,
                archived_at               = excluded.archived_at,
                earliest_unit_archived_at = excluded.earliest_unit_archived_at,
                owner                     = excluded.owner,
                updated_at                = excluded.updated_at",
            params![
                record.account_id,
                record.name,
                record.status.as_str(),
                record.launched_at.map(|d| d.to_string()),
                record.archived_at.map(|d| d.to_string()),
                record.earliest_unit_archived_at.map(|d| d.to_string()),
                record.owner,
                now,
            ],
        )?;
        Ok(())
    }

    pub fn get_account(&self, account_id: &str) -> PipelineResult<Option<AccountRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT account_id, name, status, launched_at,
                        archived_at, earliest_unit_archived_at, owner
                 FROM accounts WHERE account_id = ?1",
                params![account_id],
                account_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn all_accounts(&self) -> PipelineResult<Vec<AccountRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT account_id, name, status, launched_at,
                    archived_at, earliest_unit_archived_at, owner
             FROM accounts
             ORDER BY account_id",
        )?;
        let accounts = stmt
            .query_map([], account_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    pub fn account_count(&self) -> PipelineResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
            .map_err(Into::into)
    }
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<AccountRecord> {
    Ok(AccountRecord {
        account_id: row.get(0)?,
        name: row.get(1)?,
        status: AccountStatus::parse(&row.get::<_, String>(2)?),
        launched_at: opt_date(row.get::<_, Option<String>>(3)?),
        archived_at: opt_date(row.get::<_, Option<String>>(4)?),
        earliest_unit_archived_at: opt_date(row.get::<_, Option<String>>(5)?),
        owner: row.get(6)?,
    })
}

fn opt_date(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|v| v.parse().ok())
}
