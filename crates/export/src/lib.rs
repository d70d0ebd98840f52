//! Output artifacts for the trade-flow pipeline.
//!
//! This crate handles:
//! - Unit scaling and column narrowing
//! - The country-partitioned parquet dataset
//! - The frontend `inputValues.js` file
//! - The country coverage summary

pub mod units;
pub mod dataset;
pub mod frontend;
pub mod coverage;

pub use units::{optimize, IntWidth, OptimizedTable, UnitColumn};
pub use dataset::{PartitionedWriter, WriteSummary};
pub use frontend::InputValues;
pub use coverage::CoverageSummary;
