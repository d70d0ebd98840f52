//! Data ingestion for the trade-flow pipeline.
//!
//! This crate handles:
//! - Static mappings (HS sections, country codes, country groups)
//! - Raw BACI record aggregation by HS section
//! - The wide parquet cache and its melt back to long form

pub mod mappings;
pub mod aggregator;
pub mod cache;

pub use mappings::Mappings;
pub use aggregator::{AggregationStats, PairKey, RawAggregator, WideTrade};
pub use cache::TradeCache;
