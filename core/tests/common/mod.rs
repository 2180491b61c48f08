//! Shared test fixtures: an in-memory store and a canned fact source.
#![allow(dead_code)]

use chrono::NaiveDate;
use retain_core::error::{PipelineError, PipelineResult};
use retain_core::source::{AccountFeed, AccountTotal, FactSource, Metric};
use retain_core::store::{AccountRecord, MetricsStore};
use retain_core::types::AccountStatus;
use std::collections::{HashMap, HashSet};

pub fn store() -> MetricsStore {
    let store = MetricsStore::in_memory().unwrap();
    store.migrate().unwrap();
    store
}

pub fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

pub fn account(id: &str, status: AccountStatus, launched: &str) -> AccountRecord {
    AccountRecord {
        account_id: id.to_string(),
        name: format!("Account {id}"),
        status,
        launched_at: Some(date(launched)),
        archived_at: None,
        earliest_unit_archived_at: None,
        owner: Some("agent-1".to_string()),
    }
}

pub fn archived_account(id: &str, launched: &str, archived: &str) -> AccountRecord {
    AccountRecord {
        status: AccountStatus::Archived,
        archived_at: Some(date(archived)),
        ..account(id, AccountStatus::Launched, launched)
    }
}

pub fn feed(id: &str, status: &str, launched: &str) -> AccountFeed {
    AccountFeed {
        account_id: id.to_string(),
        name: format!("Account {id}"),
        status: status.to_string(),
        launched_at: Some(date(launched)),
        archived_at: None,
        earliest_unit_archived_at: None,
        owner: Some("agent-1".to_string()),
    }
}

/// Canned fact source. Totals are keyed by (metric, date); metrics listed
/// in `failing` return a synthetic upstream error instead.
#[derive(Default)]
pub struct FixtureSource {
    pub accounts: Vec<AccountFeed>,
    pub totals: HashMap<(Metric, NaiveDate), Vec<AccountTotal>>,
    pub failing: HashSet<Metric>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, feed: AccountFeed) -> Self {
        self.accounts.push(feed);
        self
    }

    pub fn with_total(mut self, metric: Metric, day: &str, id: &str, total: f64) -> Self {
        self.totals
            .entry((metric, date(day)))
            .or_default()
            .push(AccountTotal {
                account_id: id.to_string(),
                total,
            });
        self
    }

    pub fn with_failing(mut self, metric: Metric) -> Self {
        self.failing.insert(metric);
        self
    }
}

impl FactSource for FixtureSource {
    fn fetch_accounts(
        &self,
        _window_start: NaiveDate,
        _end: NaiveDate,
    ) -> PipelineResult<Vec<AccountFeed>> {
        Ok(self.accounts.clone())
    }

    fn fetch_daily_totals(
        &self,
        metric: Metric,
        date: NaiveDate,
    ) -> PipelineResult<Vec<AccountTotal>> {
        if self.failing.contains(&metric) {
            return Err(PipelineError::source(metric.name(), "synthetic upstream failure"));
        }
        Ok(self
            .totals
            .get(&(metric, date))
            .cloned()
            .unwrap_or_default())
    }
}
