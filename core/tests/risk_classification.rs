mod common;

use chrono::Datelike;
use common::{account, archived_account, date, store};
use retain_core::config::RiskThresholds;
use retain_core::risk::{
    classify_historical, classify_trending, evaluate, MonthProgress, RiskLevel,
    NO_FLAGS, REASON_FROZEN_INACTIVE, REASON_FROZEN_STATUS, REASON_LOW_ACTIVITY,
    REASON_LOW_ENGAGEMENT_COMBO, REASON_LOW_REDEMPTIONS, REASON_RECENTLY_ARCHIVED,
    REASON_REDEMPTIONS_DROP, REASON_SPEND_DROP,
};
use retain_core::rollup::rollup_month;
use retain_core::source::Metric;
use retain_core::store::MonthlyTotals;
use retain_core::types::{AccountStatus, MonthKey};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn totals(spend: f64, messages: i64, redemptions: i64, subs: f64) -> MonthlyTotals {
    MonthlyTotals {
        total_spend: spend,
        total_messages: messages,
        total_redemptions: redemptions,
        avg_active_subscribers: subs,
    }
}

fn thresholds() -> RiskThresholds {
    RiskThresholds::default()
}

// ── Pure flag evaluation ─────────────────────────────────────────────────────

/// A LAUNCHED account 10 months past launch with redemptions=5,
/// subscribers=250, spend down 45% vs. the same-day cutoff of the prior
/// month → four flags, 5 points, high.
#[test]
fn low_engagement_with_spend_drop_scores_high() {
    let a1 = account("a1", AccountStatus::Launched, "2024-10-15");
    let month = MonthKey::new(2025, 8);
    let current = totals(550.0, 4_000, 5, 250.0);
    let prev_partial = totals(1_000.0, 4_200, 8, 260.0);

    let c = evaluate(
        &a1,
        month,
        &current,
        Some(&prev_partial),
        MonthProgress::AsOfDay(20),
        &thresholds(),
    )
    .unwrap();

    assert_eq!(c.level, RiskLevel::High);
    assert_eq!(
        c.reasons,
        vec![
            REASON_LOW_REDEMPTIONS,
            REASON_LOW_ENGAGEMENT_COMBO,
            REASON_LOW_ACTIVITY,
            REASON_SPEND_DROP,
        ]
    );
}

/// FROZEN with zero messages in the month → high, "Frozen & Inactive";
/// the same account with deliveries → medium, "Frozen Account Status".
/// Frozen accounts never reach the numeric flag system.
#[test]
fn frozen_accounts_short_circuit() {
    let frozen = account("f1", AccountStatus::Frozen, "2024-01-01");
    let month = MonthKey::new(2025, 8);

    let silent = evaluate(
        &frozen,
        month,
        &totals(0.0, 0, 0, 10.0),
        None,
        MonthProgress::Complete,
        &thresholds(),
    )
    .unwrap();
    assert_eq!(silent.level, RiskLevel::High);
    assert_eq!(silent.reasons, vec![REASON_FROZEN_INACTIVE]);

    let active = evaluate(
        &frozen,
        month,
        &totals(0.0, 120, 0, 10.0),
        None,
        MonthProgress::Complete,
        &thresholds(),
    )
    .unwrap();
    assert_eq!(active.level, RiskLevel::Medium);
    assert_eq!(active.reasons, vec![REASON_FROZEN_STATUS]);
}

/// An archive signal inside the target month overrides everything,
/// regardless of how healthy the numeric metrics look.
#[test]
fn archived_this_month_overrides_all_flags() {
    let gone = archived_account("g1", "2024-01-01", "2025-08-03");
    let month = MonthKey::new(2025, 8);

    let c = evaluate(
        &gone,
        month,
        &totals(9_999.0, 50_000, 500, 5_000.0),
        None,
        MonthProgress::Complete,
        &thresholds(),
    )
    .unwrap();

    assert_eq!(c.level, RiskLevel::High);
    assert_eq!(c.reasons, vec![REASON_RECENTLY_ARCHIVED]);
}

/// Flag count 0 → low, 1–2 → medium, 3+ → high; zero flags always renders
/// the "No flags" sentinel instead of an empty reason list.
#[test]
fn flag_count_maps_to_level() {
    let seasoned = account("a1", AccountStatus::Launched, "2024-01-01");
    let young = account("a2", AccountStatus::Launched, "2025-07-02");
    let month = MonthKey::new(2025, 8);
    let t = thresholds();

    // Healthy: no flags.
    let none = evaluate(
        &seasoned,
        month,
        &totals(2_000.0, 10_000, 80, 900.0),
        None,
        MonthProgress::Complete,
        &t,
    )
    .unwrap();
    assert_eq!(none.level, RiskLevel::Low);
    assert_eq!(none.reasons, vec![NO_FLAGS]);

    // Low activity alone: 1 point → medium.
    let one = evaluate(
        &seasoned,
        month,
        &totals(2_000.0, 10_000, 80, 250.0),
        None,
        MonthProgress::Complete,
        &t,
    )
    .unwrap();
    assert_eq!(one.level, RiskLevel::Medium);
    assert_eq!(one.reasons, vec![REASON_LOW_ACTIVITY]);

    // Young account: combo and drops gated off, 2 points → medium.
    let two = evaluate(
        &young,
        month,
        &totals(100.0, 500, 2, 250.0),
        None,
        MonthProgress::Complete,
        &t,
    )
    .unwrap();
    assert_eq!(two.level, RiskLevel::Medium);
    assert_eq!(two.reasons, vec![REASON_LOW_REDEMPTIONS, REASON_LOW_ACTIVITY]);

    // Seasoned account, same numbers: combo joins in, 4 points → high.
    let four = evaluate(
        &seasoned,
        month,
        &totals(100.0, 500, 2, 250.0),
        None,
        MonthProgress::Complete,
        &t,
    )
    .unwrap();
    assert_eq!(four.level, RiskLevel::High);
}

/// A redemptions collapse against the prior month fires its own drop flag.
#[test]
fn redemptions_drop_fires_at_half() {
    let a1 = account("a1", AccountStatus::Launched, "2024-01-01");
    let month = MonthKey::new(2025, 8);

    let c = evaluate(
        &a1,
        month,
        &totals(2_000.0, 10_000, 40, 900.0),
        Some(&totals(2_000.0, 10_000, 100, 900.0)),
        MonthProgress::Complete,
        &thresholds(),
    )
    .unwrap();

    assert_eq!(c.reasons, vec![REASON_REDEMPTIONS_DROP]);
    assert_eq!(c.level, RiskLevel::Medium);
}

/// On day 1 of a trending month there is no elapsed data to judge, so the
/// whole proportional flag system is skipped and the account is low.
#[test]
fn trending_day_one_defaults_low() {
    let a1 = account("a1", AccountStatus::Launched, "2024-01-01");
    let month = MonthKey::new(2025, 8);

    let c = evaluate(
        &a1,
        month,
        &totals(0.0, 0, 0, 0.0),
        None,
        MonthProgress::AsOfDay(1),
        &thresholds(),
    )
    .unwrap();

    assert_eq!(c.level, RiskLevel::Low);
    assert_eq!(c.reasons, vec![NO_FLAGS]);
}

/// A missing launch date is a per-account classification error.
#[test]
fn missing_launch_date_is_an_error() {
    let mut broken = account("a1", AccountStatus::Launched, "2024-01-01");
    broken.launched_at = None;

    let result = evaluate(
        &broken,
        MonthKey::new(2025, 8),
        &totals(100.0, 100, 10, 100.0),
        None,
        MonthProgress::Complete,
        &thresholds(),
    );

    assert!(result.is_err());
}

// ── Store-driven passes ──────────────────────────────────────────────────────

/// The trending pass fills the trending slot; the month-close pass writes
/// the historical slot and clears trending in the same statement, so
/// exactly one slot is ever authoritative.
#[test]
fn trending_slot_clears_on_historical_close() {
    let mut s = store();
    s.upsert_account(&account("a1", AccountStatus::Launched, "2024-01-01")).unwrap();
    s.upsert_metric_value("a1", date("2025-07-05"), Metric::Redemptions, 2.0).unwrap();

    let july = MonthKey::new(2025, 7);
    rollup_month(&mut s, july).unwrap();

    classify_trending(&s, &thresholds(), date("2025-07-20")).unwrap();
    let open = s.monthly_row("a1", july).unwrap().unwrap();
    assert!(open.trending_risk_level.is_some());
    assert!(open.historical_risk_level.is_none());

    classify_historical(&s, &thresholds(), july).unwrap();
    let closed = s.monthly_row("a1", july).unwrap().unwrap();
    assert!(closed.trending_risk_level.is_none());
    assert!(closed.trending_risk_reasons.is_none());
    assert!(closed.historical_risk_level.is_some());
    assert!(!closed.risk_reasons.as_ref().unwrap().is_empty());
}

/// Trending drop comparisons use the prior month truncated at the same
/// day-of-month, not the full prior month. Here the partial-vs-partial
/// decline is only 10%, so no drop flag may fire even though the decline
/// against the full prior month would be far past the bar.
#[test]
fn trending_compares_same_day_cutoff() {
    let mut s = store();
    s.upsert_account(&account("a1", AccountStatus::Launched, "2024-01-01")).unwrap();

    // July: 10.0 spend every day (310 for the full month, 100 through day 10).
    let july = MonthKey::new(2025, 7);
    for day in 1..=31 {
        let d = july.first_day().with_day(day).unwrap();
        s.upsert_metric_value("a1", d, Metric::Spend, 10.0).unwrap();
    }
    // August days 1..=10: 9.0 spend per day (90 through day 10).
    for day in 1..=10 {
        let d = date("2025-08-01").with_day(day).unwrap();
        s.upsert_metric_value("a1", d, Metric::Spend, 9.0).unwrap();
    }

    let august = MonthKey::new(2025, 8);
    rollup_month(&mut s, august).unwrap();
    classify_trending(&s, &thresholds(), date("2025-08-10")).unwrap();

    let row = s.monthly_row("a1", august).unwrap().unwrap();
    let reasons = row.trending_risk_reasons.unwrap();
    assert!(!reasons.iter().any(|r| r == REASON_SPEND_DROP), "got {reasons:?}");
    assert!(!reasons.iter().any(|r| r == REASON_REDEMPTIONS_DROP), "got {reasons:?}");
}

/// The historical pass compares against the full previous month's totals.
#[test]
fn historical_compares_full_previous_month() {
    let mut s = store();
    s.upsert_account(&account("a1", AccountStatus::Launched, "2024-01-01")).unwrap();

    s.upsert_metric_value("a1", date("2025-06-10"), Metric::Spend, 1_000.0).unwrap();
    s.upsert_metric_value("a1", date("2025-07-10"), Metric::Spend, 500.0).unwrap();

    let june = MonthKey::new(2025, 6);
    let july = MonthKey::new(2025, 7);
    rollup_month(&mut s, june).unwrap();
    rollup_month(&mut s, july).unwrap();

    classify_historical(&s, &thresholds(), july).unwrap();

    let row = s.monthly_row("a1", july).unwrap().unwrap();
    let reasons = row.risk_reasons.unwrap();
    assert!(reasons.iter().any(|r| r == REASON_SPEND_DROP), "got {reasons:?}");
}

/// A rollup row whose account vanished from the registry defaults to low
/// instead of aborting the classification batch.
#[test]
fn unknown_account_defaults_low() {
    let mut s = store();
    s.upsert_account(&account("a1", AccountStatus::Launched, "2024-01-01")).unwrap();

    let august = MonthKey::new(2025, 8);
    s.replace_month(
        august,
        &[
            ("a1".to_string(), totals(2_000.0, 10_000, 80, 900.0)),
            ("ghost".to_string(), totals(0.0, 0, 0, 0.0)),
        ],
    )
    .unwrap();

    let classified = classify_trending(&s, &thresholds(), date("2025-08-20")).unwrap();
    assert_eq!(classified, 2);

    let ghost = s.monthly_row("ghost", august).unwrap().unwrap();
    assert_eq!(ghost.trending_risk_level, Some(RiskLevel::Low));
    assert_eq!(ghost.trending_risk_reasons.unwrap(), vec![NO_FLAGS.to_string()]);
}
