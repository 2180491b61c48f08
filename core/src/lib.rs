//! retain-core: account activity rollup and churn-risk pipeline.
//!
//! Ingests per-account activity facts (spend, messages, coupon redemptions,
//! active subscribers) from an upstream warehouse, rolls them into daily and
//! monthly aggregates, and derives a churn-risk level for every account for
//! every calendar month. The reporting layer reads the rollup tables this
//! crate maintains; it never writes them.

pub mod config;
pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod registry;
pub mod risk;
pub mod rollup;
pub mod source;
pub mod store;
pub mod types;
