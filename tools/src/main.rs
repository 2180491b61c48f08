//! etl-runner: headless pipeline runner.
//!
//! Usage:
//!   etl-runner --db metrics.db --warehouse export.db
//!   etl-runner --db metrics.db --warehouse export.db --date 2025-08-25
//!   etl-runner --db metrics.db --warehouse export.db --catch-up
//!   etl-runner --db metrics.db --warehouse export.db --historical 2025-07

use anyhow::{anyhow, Result};
use chrono::{Days, NaiveDate, Utc};
use retain_core::{
    config::PipelineConfig,
    pipeline::Pipeline,
    risk,
    source::SqliteFactSource,
    store::MetricsStore,
    types::MonthKey,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = arg_value(&args, "--db").unwrap_or_else(|| "metrics.db".to_string());
    let warehouse = arg_value(&args, "--warehouse")
        .ok_or_else(|| anyhow!("--warehouse <path> is required"))?;
    let catch_up = args.iter().any(|a| a == "--catch-up");

    let mut config = PipelineConfig::default();
    if let Some(start) = arg_value(&args, "--window-start") {
        config.window_start = start.parse::<NaiveDate>()?;
    }

    let mut store = MetricsStore::open(&db)?;
    store.migrate()?;
    let source = SqliteFactSource::new(warehouse);

    // Administrative re-run: recompute a closed month's historical pass.
    if let Some(month_arg) = arg_value(&args, "--historical") {
        let month: MonthKey = month_arg
            .parse()
            .map_err(|e: String| anyhow!(e))?;
        let classified = risk::classify_historical(&store, &config.thresholds, month)?;
        println!("historical {month}: reclassified {classified} accounts");
        return Ok(());
    }

    let yesterday = Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| anyhow!("cannot compute yesterday"))?;
    let process_date = match arg_value(&args, "--date") {
        Some(d) => d.parse::<NaiveDate>()?,
        None => yesterday,
    };

    let mut pipeline = Pipeline::new(&mut store, &source, config);

    if catch_up {
        let summaries = pipeline.run_catch_up(process_date)?;
        println!("catch-up: {} day(s) replayed", summaries.len());
        for summary in &summaries {
            println!("{}", serde_json::to_string(summary)?);
        }
    } else {
        let summary = pipeline.run_daily(process_date)?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}

fn arg_value(args: &[String], name: &str) -> Option<String> {
    args.windows(2)
        .find(|w| w[0] == name)
        .map(|w| w[1].clone())
}
