//! Core types and configuration for the trade-flow pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Trade rows and tables (exporter/importer and country/partner/flow oriented)
//! - Value-column naming (`value_<currency>_<basis>`)
//! - Country groups and GDP records
//! - Configuration structures and paths
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, ExportConfig, Paths, PipelineConfig};
pub use error::{Error, Result};
pub use types::*;
