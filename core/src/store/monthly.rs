use super::{MetricsStore, MonthlyMetricRow, MonthlyTotals};
use crate::error::PipelineResult;
use crate::risk::RiskLevel;
use crate::types::MonthKey;
use rusqlite::{params, OptionalExtension, Row};

impl MetricsStore {
    /// Replace every rollup row for `month` in one transaction.
    ///
    /// DELETE + INSERT, never row-by-row patching: re-running with updated
    /// daily data always converges, and observers never see a half-empty
    /// month. Classification slots start out cleared; the risk pass fills
    /// them afterwards.
    pub fn replace_month(
        &mut self,
        month: MonthKey,
        rows: &[(String, MonthlyTotals)],
    ) -> PipelineResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM monthly_metrics WHERE month = ?1",
            params![month.to_string()],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO monthly_metrics (
                    account_id, month,
                    total_spend, total_messages, total_redemptions,
                    avg_active_subscribers
                ) VALUES (?1,?2,?3,?4,?5,?6)",
            )?;
            for (account_id, totals) in rows {
                stmt.execute(params![
                    account_id,
                    month.to_string(),
                    totals.total_spend,
                    totals.total_messages,
                    totals.total_redemptions,
                    totals.avg_active_subscribers,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn month_rows(&self, month: MonthKey) -> PipelineResult<Vec<MonthlyMetricRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT account_id, month,
                    total_spend, total_messages, total_redemptions,
                    avg_active_subscribers,
                    trending_risk_level, trending_risk_reasons,
                    historical_risk_level, risk_reasons
             FROM monthly_metrics
             WHERE month = ?1
             ORDER BY account_id",
        )?;
        let rows = stmt
            .query_map(params![month.to_string()], monthly_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn monthly_row(
        &self,
        account_id: &str,
        month: MonthKey,
    ) -> PipelineResult<Option<MonthlyMetricRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT account_id, month,
                        total_spend, total_messages, total_redemptions,
                        avg_active_subscribers,
                        trending_risk_level, trending_risk_reasons,
                        historical_risk_level, risk_reasons
                 FROM monthly_metrics
                 WHERE account_id = ?1 AND month = ?2",
                params![account_id, month.to_string()],
                monthly_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Set the in-progress classification slot for one (account, month).
    pub fn set_trending_risk(
        &self,
        account_id: &str,
        month: MonthKey,
        level: RiskLevel,
        reasons: &[String],
    ) -> PipelineResult<()> {
        self.conn.execute(
            "UPDATE monthly_metrics
             SET trending_risk_level = ?1, trending_risk_reasons = ?2
             WHERE account_id = ?3 AND month = ?4",
            params![
                level.as_str(),
                serde_json::to_string(reasons)?,
                account_id,
                month.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Close a month for one account: write the historical slot and clear
    /// the trending slot in the same statement, so exactly one slot is
    /// authoritative at any time.
    pub fn set_historical_risk(
        &self,
        account_id: &str,
        month: MonthKey,
        level: RiskLevel,
        reasons: &[String],
    ) -> PipelineResult<()> {
        self.conn.execute(
            "UPDATE monthly_metrics
             SET historical_risk_level = ?1, risk_reasons = ?2,
                 trending_risk_level = NULL, trending_risk_reasons = NULL
             WHERE account_id = ?3 AND month = ?4",
            params![
                level.as_str(),
                serde_json::to_string(reasons)?,
                account_id,
                month.to_string(),
            ],
        )?;
        Ok(())
    }

    /// True if any historical classification already exists for `month`.
    /// Guards the non-idempotent Open→Closed transition.
    pub fn month_has_historical(&self, month: MonthKey) -> PipelineResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM monthly_metrics
             WHERE month = ?1 AND historical_risk_level IS NOT NULL",
            params![month.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn month_row_count(&self, month: MonthKey) -> PipelineResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM monthly_metrics WHERE month = ?1",
                params![month.to_string()],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }
}

fn monthly_from_row(row: &Row<'_>) -> rusqlite::Result<MonthlyMetricRow> {
    Ok(MonthlyMetricRow {
        account_id: row.get(0)?,
        month: row
            .get::<_, String>(1)?
            .parse()
            .unwrap_or(MonthKey { year: 0, month: 1 }),
        totals: MonthlyTotals {
            total_spend: row.get(2)?,
            total_messages: row.get(3)?,
            total_redemptions: row.get(4)?,
            avg_active_subscribers: row.get(5)?,
        },
        trending_risk_level: row
            .get::<_, Option<String>>(6)?
            .map(|s| RiskLevel::parse(&s)),
        trending_risk_reasons: parse_reasons(row.get::<_, Option<String>>(7)?),
        historical_risk_level: row
            .get::<_, Option<String>>(8)?
            .map(|s| RiskLevel::parse(&s)),
        risk_reasons: parse_reasons(row.get::<_, Option<String>>(9)?),
    })
}

fn parse_reasons(raw: Option<String>) -> Option<Vec<String>> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}
