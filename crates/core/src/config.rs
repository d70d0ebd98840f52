//! Configuration structures for the trade-flow pipeline.

use crate::error::{Error, Result};
use crate::types::Year;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Year range, currencies and source versioning.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Output dataset layout.
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    /// Load a configuration override from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.export.validate()
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Base year for constant prices.
    pub base_year: Year,
    /// First year of the range (inclusive).
    pub start_year: Year,
    /// Last year of the range (inclusive).
    pub end_year: Year,
    /// Target currencies (ISO 4217, upper case).
    pub currencies: Vec<String>,
    /// BACI release tag, e.g. "202501".
    pub baci_version: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_year: 2023,
            start_year: 2002,
            end_year: 2023,
            currencies: vec![
                "USD".to_string(),
                "EUR".to_string(),
                "GBP".to_string(),
                "CAD".to_string(),
            ],
            baci_version: "202501".to_string(),
        }
    }
}

impl PipelineConfig {
    /// All years in the configured range.
    pub fn years(&self) -> impl Iterator<Item = Year> {
        self.start_year..=self.end_year
    }

    /// File name of the aggregated trade cache for this year range.
    pub fn cache_file_name(&self) -> String {
        format!("trade_{}_{}.parquet", self.start_year, self.end_year)
    }

    fn validate(&self) -> Result<()> {
        if self.start_year > self.end_year {
            return Err(Error::config(format!(
                "start_year {} is after end_year {}",
                self.start_year, self.end_year
            )));
        }
        if !(1900..=2100).contains(&self.base_year) {
            return Err(Error::config(format!("base_year {} out of range", self.base_year)));
        }
        if self.currencies.is_empty() {
            return Err(Error::config("at least one currency is required"));
        }
        if self.baci_version.is_empty() {
            return Err(Error::config("baci_version must not be empty"));
        }
        Ok(())
    }
}

/// Output dataset configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Zstd compression level.
    pub zstd_level: i32,
    /// Target rows per row group.
    pub row_group_size: usize,
    /// Maximum rows per parquet file.
    pub max_rows_per_file: usize,
    /// Data page size limit in bytes.
    pub data_page_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            zstd_level: 15,
            row_group_size: 100_000,
            max_rows_per_file: 1_000_000,
            data_page_size: 1_048_576,
        }
    }
}

impl ExportConfig {
    fn validate(&self) -> Result<()> {
        if self.row_group_size == 0 || self.max_rows_per_file == 0 {
            return Err(Error::config("row_group_size and max_rows_per_file must be positive"));
        }
        if !(1..=22).contains(&self.zstd_level) {
            return Err(Error::config(format!("zstd_level {} out of range", self.zstd_level)));
        }
        Ok(())
    }
}

/// File locations, all derived from one project root.
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// Create paths rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn settings(&self) -> PathBuf {
        self.root.join("data").join("settings")
    }

    fn raw_data(&self) -> PathBuf {
        self.root.join("data").join("raw_data")
    }

    /// HS section to product code mapping.
    pub fn hs_sections(&self) -> PathBuf {
        self.settings().join("hs_sections.json")
    }

    /// Group name to ISO3 member mapping.
    pub fn country_groups(&self) -> PathBuf {
        self.settings().join("country_groups.json")
    }

    /// Directory holding one BACI release.
    pub fn baci_dir(&self, version: &str) -> PathBuf {
        self.raw_data().join(format!("BACI_HS02_V{version}"))
    }

    /// BACI numeric country code table.
    pub fn country_codes(&self, version: &str) -> PathBuf {
        self.baci_dir(version).join(format!("country_codes_V{version}.csv"))
    }

    /// Raw BACI trade file for one year.
    pub fn raw_trade_file(&self, version: &str, year: Year) -> PathBuf {
        self.baci_dir(version).join(format!("BACI_HS02_Y{year}_V{version}.csv"))
    }

    /// Aggregated trade cache for the configured year range.
    pub fn trade_cache(&self, pipeline: &PipelineConfig) -> PathBuf {
        self.raw_data().join(pipeline.cache_file_name())
    }

    /// Exchange rates table (currency units per USD).
    pub fn exchange_rates(&self) -> PathBuf {
        self.raw_data().join("prices").join("exchange_rates.csv")
    }

    /// GDP deflator table.
    pub fn deflators(&self) -> PathBuf {
        self.raw_data().join("prices").join("deflators.csv")
    }

    /// IMF WEO extract (GDP, population).
    pub fn weo(&self) -> PathBuf {
        self.raw_data().join("weo.csv")
    }

    /// Partitioned output dataset directory.
    pub fn trade_dataset(&self) -> PathBuf {
        self.root.join("cdn_files").join("trade")
    }

    /// Generated frontend options module.
    pub fn input_values(&self) -> PathBuf {
        self.root.join("components").join("inputValues.js")
    }
}
