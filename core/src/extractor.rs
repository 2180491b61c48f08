//! Daily fact extraction — four independent metric jobs for one date.
//!
//! The four upstream queries run concurrently on scoped threads; upserts
//! are applied after the join, on the single store connection. A failure in
//! one metric (query or write) becomes that metric's `error` outcome and
//! never blocks the other three.

use crate::error::{PipelineError, PipelineResult};
use crate::source::{AccountTotal, FactSource, Metric};
use crate::store::{AccountRecord, MetricsStore};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

/// Per-metric result of one day's extraction.
#[derive(Debug, Clone, Serialize)]
pub struct MetricOutcome {
    pub metric: &'static str,
    pub updated: usize,
    pub created: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetricOutcome {
    fn failed(metric: Metric, error: String) -> Self {
        Self {
            metric: metric.name(),
            updated: 0,
            created: 0,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub metrics: Vec<MetricOutcome>,
}

impl DaySummary {
    pub fn outcome(&self, metric: Metric) -> Option<&MetricOutcome> {
        self.metrics.iter().find(|m| m.metric == metric.name())
    }
}

/// Extract all four metrics for `date`.
///
/// Only fails outright when the registry itself cannot be read; everything
/// downstream of that degrades per metric.
pub fn extract_day<S: FactSource>(
    store: &MetricsStore,
    source: &S,
    date: NaiveDate,
) -> PipelineResult<DaySummary> {
    let accounts: HashMap<String, AccountRecord> = store
        .all_accounts()?
        .into_iter()
        .map(|a| (a.account_id.clone(), a))
        .collect();

    // Independent network queries, joined before any write begins.
    let mut fetched: Vec<(Metric, PipelineResult<Vec<AccountTotal>>)> = Vec::new();
    std::thread::scope(|scope| {
        let handles: Vec<_> = Metric::ALL
            .iter()
            .map(|&metric| {
                (
                    metric,
                    scope.spawn(move || source.fetch_daily_totals(metric, date)),
                )
            })
            .collect();
        for (metric, handle) in handles {
            let result = handle.join().unwrap_or_else(|_| {
                Err(PipelineError::source(metric.name(), "extraction thread panicked"))
            });
            fetched.push((metric, result));
        }
    });

    let mut metrics = Vec::with_capacity(Metric::ALL.len());
    for (metric, result) in fetched {
        let outcome = match result {
            Ok(totals) => apply_metric(store, &accounts, date, metric, &totals)
                .unwrap_or_else(|e| {
                    log::warn!("extract {date}: {} write failed ({e})", metric.name());
                    MetricOutcome::failed(metric, e.to_string())
                }),
            Err(e) => {
                log::warn!("extract {date}: {} fetch failed ({e})", metric.name());
                MetricOutcome::failed(metric, e.to_string())
            }
        };
        metrics.push(outcome);
    }

    log::info!(
        "extract {date}: {}",
        metrics
            .iter()
            .map(|m| match &m.error {
                Some(_) => format!("{}=error", m.metric),
                None => format!("{}={}+{}", m.metric, m.updated, m.created),
            })
            .collect::<Vec<_>>()
            .join(" ")
    );

    Ok(DaySummary { date, metrics })
}

fn apply_metric(
    store: &MetricsStore,
    accounts: &HashMap<String, AccountRecord>,
    date: NaiveDate,
    metric: Metric,
    totals: &[AccountTotal],
) -> PipelineResult<MetricOutcome> {
    let mut updated = 0;
    let mut created = 0;

    for total in totals {
        // Only accounts alive for the entirety of the date's month are
        // extracted; the rest of the feed is noise for this ledger.
        let eligible = accounts
            .get(&total.account_id)
            .is_some_and(|a| a.eligible_for_day(date));
        if !eligible {
            log::debug!(
                "extract {date}: {} skipping ineligible account {}",
                metric.name(),
                total.account_id
            );
            continue;
        }

        if store.upsert_metric_value(&total.account_id, date, metric, total.total)? {
            updated += 1;
        } else {
            created += 1;
        }
    }

    Ok(MetricOutcome {
        metric: metric.name(),
        updated,
        created,
        error: None,
    })
}
