//! Risk classification — per (account, month) churn-risk levels.
//!
//! Flag evaluation order (identical for trending and historical, differing
//! only in whether thresholds are literal or pro-rated by month progress):
//!   1. Archived this month        → high, overrides everything
//!   2. Frozen status              → high (no messages) or medium
//!   3. Numeric flag system        → weighted flag count → level
//!
//! A classification failure for one account is caught, logged, and that
//! account defaults to low — it never blocks the rest of the batch.

use crate::config::RiskThresholds;
use crate::error::{PipelineError, PipelineResult};
use crate::store::{AccountRecord, MetricsStore, MonthlyTotals};
use crate::types::{AccountStatus, MonthKey};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "high" => RiskLevel::High,
            "medium" => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

/// Sentinel reason when no flags fired, so consumers always render
/// a non-empty reason list.
pub const NO_FLAGS: &str = "No flags";

pub const REASON_RECENTLY_ARCHIVED: &str = "Recently Archived";
pub const REASON_FROZEN_INACTIVE: &str = "Frozen & Inactive";
pub const REASON_FROZEN_STATUS: &str = "Frozen Account Status";
pub const REASON_LOW_REDEMPTIONS: &str = "Low Monthly Redemptions";
pub const REASON_LOW_ENGAGEMENT_COMBO: &str = "Low Engagement Combo";
pub const REASON_LOW_ACTIVITY: &str = "Low Activity";
pub const REASON_SPEND_DROP: &str = "Spend Drop";
pub const REASON_REDEMPTIONS_DROP: &str = "Redemptions Drop";

/// Month completeness for threshold scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthProgress {
    /// Historical pass: the month is closed, thresholds apply literally.
    Complete,
    /// Trending pass: classification as of this day of the month.
    AsOfDay(u32),
}

impl MonthProgress {
    /// Fraction of the month covered by the data being judged.
    /// Day `d` means days `1..=d-1` of extracted data exist, so the
    /// proportional bar is `(d - 1) / days_in_month`.
    fn fraction(&self, month: MonthKey) -> f64 {
        match self {
            MonthProgress::Complete => 1.0,
            MonthProgress::AsOfDay(day) => {
                (day.saturating_sub(1)) as f64 / month.days_in_month() as f64
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub level: RiskLevel,
    pub reasons: Vec<String>,
}

impl Classification {
    fn new(level: RiskLevel, reasons: Vec<&str>) -> Self {
        Self {
            level,
            reasons: reasons.into_iter().map(String::from).collect(),
        }
    }

    fn default_low() -> Self {
        Self::new(RiskLevel::Low, vec![NO_FLAGS])
    }
}

// ── Flag evaluation (pure) ───────────────────────────────────────────────────

/// Classify one account for one month.
///
/// `prev_totals` is the comparison window for the drop flags: the full
/// previous month for a historical pass, or the same-day-cutoff partial
/// previous month for a trending pass.
pub fn evaluate(
    account: &AccountRecord,
    month: MonthKey,
    totals: &MonthlyTotals,
    prev_totals: Option<&MonthlyTotals>,
    progress: MonthProgress,
    thresholds: &RiskThresholds,
) -> PipelineResult<Classification> {
    // 1. Archived this month — always checked first, overrides all flags.
    if let Some(cutoff) = account.archive_cutoff() {
        if month.contains(cutoff) {
            return Ok(Classification::new(
                RiskLevel::High,
                vec![REASON_RECENTLY_ARCHIVED],
            ));
        }
    }

    // 2. Frozen accounts never reach the numeric flag system.
    if account.status == AccountStatus::Frozen {
        return Ok(if totals.total_messages == 0 {
            Classification::new(RiskLevel::High, vec![REASON_FROZEN_INACTIVE])
        } else {
            Classification::new(RiskLevel::Medium, vec![REASON_FROZEN_STATUS])
        });
    }

    let launched = account
        .launched_at
        .ok_or_else(|| PipelineError::MissingLaunchDate {
            account_id: account.account_id.clone(),
        })?;

    // 3. Numeric flag system. On day 1 of a trending month there is no
    // elapsed data to judge, so the whole proportional system is skipped.
    let fraction = progress.fraction(month);
    if fraction <= 0.0 {
        return Ok(Classification::default_low());
    }

    let months_since_launch = month.months_since(launched);
    let mut score = 0u32;
    let mut reasons: Vec<String> = Vec::new();

    // Low monthly redemptions (weight 1, pro-rated bar).
    if (totals.total_redemptions as f64) < thresholds.redemptions * fraction {
        score += 1;
        reasons.push(REASON_LOW_REDEMPTIONS.to_string());
    }

    // Low engagement combo (weight 2, only past the launch ramp).
    if months_since_launch >= 3
        && totals.avg_active_subscribers < thresholds.combo_subscribers
        && (totals.total_redemptions as f64) < thresholds.combo_redemptions * fraction
    {
        score += 2;
        reasons.push(REASON_LOW_ENGAGEMENT_COMBO.to_string());
    }

    // Low activity (weight 1). A gauge metric, never pro-rated.
    if totals.avg_active_subscribers < thresholds.low_activity_subscribers {
        score += 1;
        reasons.push(REASON_LOW_ACTIVITY.to_string());
    }

    // Month-over-month drops (weight 1 each), once a same-position prior
    // month exists to compare against.
    if months_since_launch >= 3 {
        if let Some(prev) = prev_totals {
            if drop_fraction(prev.total_spend, totals.total_spend) >= thresholds.spend_drop {
                score += 1;
                reasons.push(REASON_SPEND_DROP.to_string());
            }
            if drop_fraction(
                prev.total_redemptions as f64,
                totals.total_redemptions as f64,
            ) >= thresholds.redemptions_drop
            {
                score += 1;
                reasons.push(REASON_REDEMPTIONS_DROP.to_string());
            }
        }
    }

    let level = match score {
        0 => RiskLevel::Low,
        1 | 2 => RiskLevel::Medium,
        _ => RiskLevel::High,
    };
    if reasons.is_empty() {
        reasons.push(NO_FLAGS.to_string());
    }

    Ok(Classification { level, reasons })
}

/// Relative decline from `previous` to `current`, floored at 0.
/// No comparison is possible against a zero baseline.
fn drop_fraction(previous: f64, current: f64) -> f64 {
    if previous <= 0.0 {
        return 0.0;
    }
    ((previous - current) / previous).max(0.0)
}

// ── Store-driven passes ──────────────────────────────────────────────────────

/// Trending pass: classify every rollup row of the in-progress month as of
/// `process_date`, writing the trending slot. Recomputed on every run.
pub fn classify_trending(
    store: &MetricsStore,
    thresholds: &RiskThresholds,
    process_date: NaiveDate,
) -> PipelineResult<usize> {
    let month = MonthKey::from_date(process_date);
    let day = process_date.day();

    // Apples-to-apples: the prior month truncated at the same day-of-month.
    let prev_partial = store.partial_month_totals(month.prev(), day)?;

    let classified = classify_rows(
        store,
        thresholds,
        month,
        &prev_partial,
        MonthProgress::AsOfDay(day),
        |store, account_id, c| store.set_trending_risk(account_id, month, c.level, &c.reasons),
    )?;

    log::info!("risk {month}: trending pass classified {classified} accounts (as of day {day})");
    Ok(classified)
}

/// Historical pass: classify every rollup row of a completed month with
/// literal thresholds, writing the historical slot and clearing trending.
///
/// The caller guards the once-only Open→Closed transition with
/// `month_has_historical`; calling this directly is the administrative
/// re-run path and recomputes unconditionally.
pub fn classify_historical(
    store: &MetricsStore,
    thresholds: &RiskThresholds,
    month: MonthKey,
) -> PipelineResult<usize> {
    // Historical drops compare against the full previous month.
    let prev_full: HashMap<String, MonthlyTotals> = store
        .month_rows(month.prev())?
        .into_iter()
        .map(|r| (r.account_id, r.totals))
        .collect();

    let classified = classify_rows(
        store,
        thresholds,
        month,
        &prev_full,
        MonthProgress::Complete,
        |store, account_id, c| store.set_historical_risk(account_id, month, c.level, &c.reasons),
    )?;

    log::info!("risk {month}: historical pass classified {classified} accounts");
    Ok(classified)
}

fn classify_rows(
    store: &MetricsStore,
    thresholds: &RiskThresholds,
    month: MonthKey,
    prev_totals: &HashMap<String, MonthlyTotals>,
    progress: MonthProgress,
    write: impl Fn(&MetricsStore, &str, &Classification) -> PipelineResult<()>,
) -> PipelineResult<usize> {
    let accounts: HashMap<String, AccountRecord> = store
        .all_accounts()?
        .into_iter()
        .map(|a| (a.account_id.clone(), a))
        .collect();

    let mut classified = 0;
    for row in store.month_rows(month)? {
        let classification = match accounts.get(&row.account_id) {
            Some(account) => evaluate(
                account,
                month,
                &row.totals,
                prev_totals.get(&row.account_id),
                progress,
                thresholds,
            )
            .unwrap_or_else(|e| {
                log::warn!("risk {month}: {} defaulted to low ({e})", row.account_id);
                Classification::default_low()
            }),
            None => {
                log::warn!(
                    "risk {month}: {} missing from registry, defaulted to low",
                    row.account_id
                );
                Classification::default_low()
            }
        };

        write(store, &row.account_id, &classification)?;
        classified += 1;
    }

    Ok(classified)
}
