//! Pipeline configuration.
//!
//! The six risk thresholds are policy, not code: both the trending and the
//! historical classification paths read the same `RiskThresholds` value so
//! the two passes can never disagree on where the bars sit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Full-month redemption count below which the low-redemptions flag fires.
pub const REDEMPTIONS_THRESHOLD: f64 = 10.0;

/// Redemption bar used by the low-engagement combo flag.
pub const COMBO_REDEMPTIONS_THRESHOLD: f64 = 35.0;

/// Subscriber bar used by the low-engagement combo flag.
pub const COMBO_SUBSCRIBERS_THRESHOLD: f64 = 300.0;

/// Subscriber bar for the standalone low-activity flag.
pub const LOW_ACTIVITY_SUBSCRIBERS_THRESHOLD: f64 = 300.0;

/// Month-over-month spend decline fraction that fires the spend-drop flag.
pub const SPEND_DROP_THRESHOLD: f64 = 0.40;

/// Month-over-month redemptions decline fraction that fires the drop flag.
pub const REDEMPTIONS_DROP_THRESHOLD: f64 = 0.50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub redemptions: f64,
    pub combo_redemptions: f64,
    pub combo_subscribers: f64,
    pub low_activity_subscribers: f64,
    pub spend_drop: f64,
    pub redemptions_drop: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            redemptions: REDEMPTIONS_THRESHOLD,
            combo_redemptions: COMBO_REDEMPTIONS_THRESHOLD,
            combo_subscribers: COMBO_SUBSCRIBERS_THRESHOLD,
            low_activity_subscribers: LOW_ACTIVITY_SUBSCRIBERS_THRESHOLD,
            spend_drop: SPEND_DROP_THRESHOLD,
            redemptions_drop: REDEMPTIONS_DROP_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Archived accounts are only synced if archived on/after this date.
    pub window_start: NaiveDate,

    /// Days 1..=N of a new month during which the month-end historical
    /// pass for the previous month is still attempted. Wider than one day
    /// to tolerate timezone skew or a missed scheduled run.
    pub month_end_grace_days: u32,

    /// Cap on days replayed by a single catch-up invocation.
    pub max_catch_up_days: u32,

    pub thresholds: RiskThresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            // Rolling two-year window for registry eligibility.
            window_start: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap_or(NaiveDate::MIN),
            month_end_grace_days: 3,
            max_catch_up_days: 90,
            thresholds: RiskThresholds::default(),
        }
    }
}

impl PipelineConfig {
    /// True if `day_of_month` falls inside the month-end grace window,
    /// i.e. the previous month should be considered for historical close.
    pub fn in_month_end_window(&self, day_of_month: u32) -> bool {
        day_of_month >= 1 && day_of_month <= self.month_end_grace_days
    }
}
