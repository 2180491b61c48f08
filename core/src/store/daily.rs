use super::{DailyMetricRow, MetricsStore, MonthlyTotals};
use crate::error::PipelineResult;
use crate::source::Metric;
use crate::types::{AccountId, MonthKey};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;

/// Value/timestamp column pair for one metric in `daily_metrics`.
fn metric_columns(metric: Metric) -> (&'static str, &'static str) {
    match metric {
        Metric::Spend => ("spend", "spend_updated_at"),
        Metric::MessagesDelivered => ("messages_delivered", "messages_updated_at"),
        Metric::Redemptions => ("redemptions", "redemptions_updated_at"),
        Metric::ActiveSubscribers => ("active_subscribers", "subscribers_updated_at"),
    }
}

impl MetricsStore {
    /// Upsert one metric's value for (account, date).
    ///
    /// Tries an UPDATE of the specific field first; if no row exists yet,
    /// INSERTs a new row with only that field populated and the siblings
    /// defaulted to zero. Sibling values and timestamps are never touched.
    ///
    /// Returns `true` if an existing row was updated, `false` on insert.
    pub fn upsert_metric_value(
        &self,
        account_id: &str,
        date: NaiveDate,
        metric: Metric,
        total: f64,
    ) -> PipelineResult<bool> {
        let (value_col, stamp_col) = metric_columns(metric);
        let now = chrono::Utc::now().to_rfc3339();

        // Spend is the only REAL column; counts are stored as integers.
        let value: rusqlite::types::Value = match metric {
            Metric::Spend => total.into(),
            _ => (total.round() as i64).into(),
        };

        let changed = self.conn.execute(
            &format!(
                "UPDATE daily_metrics SET {value_col} = ?1, {stamp_col} = ?2
                 WHERE account_id = ?3 AND date = ?4"
            ),
            params![value, now, account_id, date.to_string()],
        )?;
        if changed > 0 {
            return Ok(true);
        }

        self.conn.execute(
            &format!(
                "INSERT INTO daily_metrics (account_id, date, {value_col}, {stamp_col})
                 VALUES (?1, ?2, ?3, ?4)"
            ),
            params![account_id, date.to_string(), value, now],
        )?;
        Ok(false)
    }

    pub fn daily_row(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> PipelineResult<Option<DailyMetricRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT account_id, date,
                        spend, spend_updated_at,
                        messages_delivered, messages_updated_at,
                        redemptions, redemptions_updated_at,
                        active_subscribers, subscribers_updated_at
                 FROM daily_metrics
                 WHERE account_id = ?1 AND date = ?2",
                params![account_id, date.to_string()],
                |row| {
                    Ok(DailyMetricRow {
                        account_id: row.get(0)?,
                        date: row
                            .get::<_, String>(1)?
                            .parse()
                            .unwrap_or(NaiveDate::MIN),
                        spend: row.get(2)?,
                        spend_updated_at: row.get(3)?,
                        messages_delivered: row.get(4)?,
                        messages_updated_at: row.get(5)?,
                        redemptions: row.get(6)?,
                        redemptions_updated_at: row.get(7)?,
                        active_subscribers: row.get(8)?,
                        subscribers_updated_at: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Most recent date present anywhere in the daily ledger.
    /// Used by catch-up runs to resume from the day after.
    pub fn latest_daily_date(&self) -> PipelineResult<Option<NaiveDate>> {
        let max: Option<String> = self
            .conn
            .query_row("SELECT MAX(date) FROM daily_metrics", [], |row| row.get(0))?;
        Ok(max.and_then(|s| s.parse().ok()))
    }

    /// Full-month aggregates per account, over the days with daily data.
    /// Subscribers are averaged (point-in-time gauge), never summed.
    pub fn month_totals(
        &self,
        month: MonthKey,
    ) -> PipelineResult<HashMap<AccountId, MonthlyTotals>> {
        self.totals_between(month.first_day(), month.last_day())
    }

    /// Partial-month aggregates up to and including `day_cutoff` of `month`.
    /// Used for the apples-to-apples prior-month drop comparison.
    pub fn partial_month_totals(
        &self,
        month: MonthKey,
        day_cutoff: u32,
    ) -> PipelineResult<HashMap<AccountId, MonthlyTotals>> {
        let day = day_cutoff.clamp(1, month.days_in_month());
        let end = NaiveDate::from_ymd_opt(month.year, month.month, day)
            .unwrap_or_else(|| month.last_day());
        self.totals_between(month.first_day(), end)
    }

    fn totals_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PipelineResult<HashMap<AccountId, MonthlyTotals>> {
        let mut stmt = self.conn.prepare(
            "SELECT account_id,
                    COALESCE(SUM(spend), 0.0),
                    COALESCE(SUM(messages_delivered), 0),
                    COALESCE(SUM(redemptions), 0),
                    COALESCE(AVG(active_subscribers), 0.0)
             FROM daily_metrics
             WHERE date >= ?1 AND date <= ?2
             GROUP BY account_id",
        )?;

        let mut totals = HashMap::new();
        let rows = stmt.query_map(params![start.to_string(), end.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                MonthlyTotals {
                    total_spend: row.get(1)?,
                    total_messages: row.get(2)?,
                    total_redemptions: row.get(3)?,
                    avg_active_subscribers: row.get(4)?,
                },
            ))
        })?;
        for row in rows {
            let (account_id, t) = row?;
            totals.insert(account_id, t);
        }
        Ok(totals)
    }
}
