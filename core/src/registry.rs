//! Account registry sync — best-effort refresh from the upstream feed.
//!
//! Soft refresh: accounts missing from the fetched set are left as-is,
//! never purged. One bad row is logged and skipped, not a batch abort.

use crate::error::PipelineResult;
use crate::source::{AccountFeed, FactSource};
use crate::store::{AccountRecord, MetricsStore};
use crate::types::AccountStatus;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RegistrySummary {
    pub accounts_upserted: usize,
    pub accounts_skipped: usize,
}

pub fn refresh_accounts<S: FactSource>(
    store: &MetricsStore,
    source: &S,
    window_start: NaiveDate,
    end: NaiveDate,
) -> PipelineResult<RegistrySummary> {
    let feeds = source.fetch_accounts(window_start, end)?;
    let fetched = feeds.len();

    let mut upserted = 0;
    let mut skipped = 0;
    for feed in feeds {
        let record = record_from_feed(feed);
        match store.upsert_account(&record) {
            Ok(()) => upserted += 1,
            Err(e) => {
                skipped += 1;
                log::warn!(
                    "registry: skipping upsert for {} ({e})",
                    record.account_id
                );
            }
        }
    }

    log::info!("registry: refreshed {upserted}/{fetched} accounts (skipped={skipped})");
    Ok(RegistrySummary {
        accounts_upserted: upserted,
        accounts_skipped: skipped,
    })
}

fn record_from_feed(feed: AccountFeed) -> AccountRecord {
    AccountRecord {
        account_id: feed.account_id,
        name: feed.name,
        status: AccountStatus::parse(&feed.status),
        launched_at: feed.launched_at,
        archived_at: feed.archived_at,
        earliest_unit_archived_at: feed.earliest_unit_archived_at,
        owner: feed.owner,
    }
}
