//! Pipeline orchestrator.
//!
//! SEQUENCE (fixed, documented, never reordered):
//!   1. Account registry sync          (best-effort, degrades)
//!   2. Daily fact extraction          (four jobs, failures isolated)
//!   3. Monthly rollup (MTD recompute) (fatal on failure)
//!   4. Trending risk classification   (recomputed every run)
//!   5. Month-end check                (historical close, once per month)
//!
//! One orchestrator run is active system-wide at a time; the Open→Closed
//! historical transition is the only non-idempotent step and is guarded by
//! an existence check.

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::extractor::{self, DaySummary};
use crate::registry;
use crate::risk;
use crate::rollup;
use crate::source::FactSource;
use crate::store::MetricsStore;
use crate::types::MonthKey;
use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

/// Outcome of the month-end historical pass, when attempted.
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalOutcome {
    pub month: String,
    pub classified: usize,
    /// True when historical values already existed and the pass was a no-op.
    pub skipped: bool,
}

/// Operator-facing report for one `run_daily` invocation. Per-step counts
/// are always present so a degraded run is distinguishable from no run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub process_date: NaiveDate,
    pub accounts_upserted: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_error: Option<String>,
    pub extraction: DaySummary,
    pub month: String,
    pub accounts_rolled_up: usize,
    pub trending_classified: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical: Option<HistoricalOutcome>,
}

pub struct Pipeline<'a, S: FactSource> {
    store: &'a mut MetricsStore,
    source: &'a S,
    config: PipelineConfig,
}

impl<'a, S: FactSource> Pipeline<'a, S> {
    pub fn new(store: &'a mut MetricsStore, source: &'a S, config: PipelineConfig) -> Self {
        Self { store, source, config }
    }

    /// Run the full pipeline for one processing date.
    pub fn run_daily(&mut self, process_date: NaiveDate) -> PipelineResult<RunSummary> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let month = MonthKey::from_date(process_date);
        log::info!("run {run_id}: starting for {process_date} (month {month})");

        // 1. Registry sync. A wholesale fetch failure degrades: the run
        // continues against the registry from the last successful sync.
        let (accounts_upserted, registry_error) = match registry::refresh_accounts(
            self.store,
            self.source,
            self.config.window_start,
            process_date,
        ) {
            Ok(summary) => (Some(summary.accounts_upserted), None),
            Err(e) => {
                log::warn!("run {run_id}: registry sync failed, using stale registry ({e})");
                (None, Some(e.to_string()))
            }
        };

        // 2. Daily extraction, per-metric failures isolated.
        let extraction = extractor::extract_day(self.store, self.source, process_date)?;

        // 3. Month-to-date rollup. A failure here rolls the transaction
        // back and fails the run.
        let rollup = rollup::rollup_month(self.store, month)?;

        // 4. Trending classification over the in-progress month.
        let trending_classified =
            risk::classify_trending(self.store, &self.config.thresholds, process_date)?;

        // 5. Month-end: close the previous month exactly once.
        let historical = if self.config.in_month_end_window(process_date.day()) {
            Some(self.close_previous_month(month)?)
        } else {
            None
        };

        let summary = RunSummary {
            run_id,
            process_date,
            accounts_upserted,
            registry_error,
            extraction,
            month: month.to_string(),
            accounts_rolled_up: rollup.accounts_processed,
            trending_classified,
            historical,
        };
        log::info!(
            "run {}: done (rolled_up={}, trending={})",
            summary.run_id,
            summary.accounts_rolled_up,
            summary.trending_classified
        );
        Ok(summary)
    }

    /// Gap-aware replay: resume from the day after the most recent ledger
    /// date and run every missed day up to (and including) `up_to`.
    /// Safe after an outage — already-extracted days are not repeated.
    pub fn run_catch_up(&mut self, up_to: NaiveDate) -> PipelineResult<Vec<RunSummary>> {
        let start = match self.store.latest_daily_date()? {
            Some(latest) => latest.checked_add_days(Days::new(1)).unwrap_or(up_to),
            None => {
                log::info!("catch-up: empty ledger, starting from window start");
                self.config.window_start
            }
        };

        if start > up_to {
            log::info!("catch-up: ledger already current through {up_to}");
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        let mut date = start;
        while date <= up_to {
            if summaries.len() as u32 >= self.config.max_catch_up_days {
                log::warn!(
                    "catch-up: stopping at {date} after {} days (cap reached)",
                    summaries.len()
                );
                break;
            }
            summaries.push(self.run_daily(date)?);
            date = match date.checked_add_days(Days::new(1)) {
                Some(d) => d,
                None => break,
            };
        }

        log::info!("catch-up: replayed {} day(s) ending {up_to}", summaries.len());
        Ok(summaries)
    }

    fn close_previous_month(&mut self, current: MonthKey) -> PipelineResult<HistoricalOutcome> {
        let prev = current.prev();
        if self.store.month_has_historical(prev)? {
            log::info!("month-end: {prev} already closed, skipping");
            return Ok(HistoricalOutcome {
                month: prev.to_string(),
                classified: 0,
                skipped: true,
            });
        }

        let classified = risk::classify_historical(self.store, &self.config.thresholds, prev)?;
        Ok(HistoricalOutcome {
            month: prev.to_string(),
            classified,
            skipped: false,
        })
    }
}
