//! Monthly rollup — full delete-and-recreate of one month's aggregates.
//!
//! The monthly table is a materialized view over the daily ledger:
//! replacement rows are computed in memory, then swapped in transactionally.
//! Re-running for the same month always converges; there is no incremental
//! patching and no double-counting from a previous partial run.

use crate::error::PipelineResult;
use crate::store::MetricsStore;
use crate::types::MonthKey;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RollupSummary {
    pub month: String,
    pub accounts_processed: usize,
}

pub fn rollup_month(store: &mut MetricsStore, month: MonthKey) -> PipelineResult<RollupSummary> {
    let accounts = store.all_accounts()?;
    let daily = store.month_totals(month)?;

    // LEFT-JOIN semantics: every eligible account gets a row, zeros when
    // no daily data exists for it in the month. Eligibility is evaluated
    // against this month, not the account's current status — an account
    // archived later must still show data for the months it was alive.
    let mut rows = Vec::new();
    for account in &accounts {
        if !account.eligible_for_month(month) {
            continue;
        }
        let totals = daily.get(&account.account_id).copied().unwrap_or_default();
        rows.push((account.account_id.clone(), totals));
    }

    store.replace_month(month, &rows)?;

    log::info!("rollup {month}: replaced {} account rows", rows.len());
    Ok(RollupSummary {
        month: month.to_string(),
        accounts_processed: rows.len(),
    })
}
