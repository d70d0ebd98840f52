//! Raw BACI aggregation.
//!
//! Collapses product-level bilateral records into one value per
//! `(year, exporter, importer, HS section)` and memoizes the result as a
//! wide parquet table keyed by the configured year range.

use crate::cache::TradeCache;
use crate::mappings::Mappings;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};
use tradeflow_core::{AggregatedTrade, Error, Paths, PipelineConfig, RawTradeRecord, Result, Year, ALL_PRODUCTS};

/// Raw values are in thousands of USD; the pipeline works in millions.
const THOUSANDS_PER_MILLION: f64 = 1_000.0;

/// Columns every raw BACI file must carry.
const RAW_COLUMNS: [&str; 5] = ["t", "i", "j", "k", "v"];

/// Counters describing what the aggregation dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationStats {
    /// Records read.
    pub records: u64,
    /// Records without a value.
    pub missing_value: u64,
    /// Records whose product chapter has no HS section.
    pub unmapped_product: u64,
    /// Records whose exporter or importer code has no ISO3.
    pub unmapped_country: u64,
}

/// Pair-level key of the wide table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub year: Year,
    pub exporter_iso3: String,
    pub importer_iso3: String,
}

/// Wide aggregate: one row per pair, one nullable cell per category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideTrade {
    /// Category column names, sorted.
    pub categories: Vec<String>,
    /// Rows sorted by key.
    pub rows: Vec<(PairKey, Vec<Option<f64>>)>,
}

impl WideTrade {
    /// Pivot long aggregates into the wide layout.
    pub fn pivot(records: &[AggregatedTrade]) -> Self {
        let categories: Vec<String> = records
            .iter()
            .map(|r| r.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let position: BTreeMap<&str, usize> = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut rows: BTreeMap<PairKey, Vec<Option<f64>>> = BTreeMap::new();
        for record in records {
            let key = PairKey {
                year: record.year,
                exporter_iso3: record.exporter_iso3.clone(),
                importer_iso3: record.importer_iso3.clone(),
            };
            let cells = rows.entry(key).or_insert_with(|| vec![None; categories.len()]);
            let cell = &mut cells[position[record.category.as_str()]];
            *cell = Some(cell.unwrap_or(0.0) + record.value);
        }

        Self {
            categories,
            rows: rows.into_iter().collect(),
        }
    }

    /// Melt back to long form, dropping empty cells.
    pub fn melt(&self) -> Vec<AggregatedTrade> {
        let mut out = Vec::new();
        for (i, category) in self.categories.iter().enumerate() {
            for (key, cells) in &self.rows {
                if let Some(value) = cells[i] {
                    out.push(AggregatedTrade {
                        year: key.year,
                        exporter_iso3: key.exporter_iso3.clone(),
                        importer_iso3: key.importer_iso3.clone(),
                        category: category.clone(),
                        value,
                    });
                }
            }
        }
        out
    }

    /// Melt and append the synthetic "All products" total per pair.
    pub fn melt_with_totals(&self) -> Vec<AggregatedTrade> {
        let mut out = self.melt();
        for (key, cells) in &self.rows {
            let present: Vec<f64> = cells.iter().flatten().copied().collect();
            if present.is_empty() {
                continue;
            }
            out.push(AggregatedTrade {
                year: key.year,
                exporter_iso3: key.exporter_iso3.clone(),
                importer_iso3: key.importer_iso3.clone(),
                category: ALL_PRODUCTS.to_string(),
                value: present.iter().sum(),
            });
        }
        out
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read one raw BACI CSV.
///
/// Every column in `t,i,j,k,v` must be present in the header; an empty `v`
/// cell is read as a missing value.
pub fn read_raw_records<R: Read>(reader: R) -> Result<Vec<RawTradeRecord>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv.headers()?;
    let missing: Vec<&str> = RAW_COLUMNS
        .iter()
        .copied()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .collect();
    if !missing.is_empty() {
        return Err(Error::data(format!(
            "raw trade file lacks column(s): {}",
            missing.join(", ")
        )));
    }
    let mut records = Vec::new();
    for row in csv.deserialize::<RawTradeRecord>() {
        records.push(row?);
    }
    Ok(records)
}

/// Map codes, drop unusable records and sum by `(year, exporter, importer, category)`.
///
/// Output values are in millions.
pub fn aggregate_records(
    records: &[RawTradeRecord],
    mappings: &Mappings,
    stats: &mut AggregationStats,
) -> Vec<AggregatedTrade> {
    let mut sums: BTreeMap<(Year, &str, &str, &str), f64> = BTreeMap::new();

    for record in records {
        stats.records += 1;
        let Some(value) = record.value else {
            stats.missing_value += 1;
            continue;
        };
        let Some(category) = mappings.category_for_product(&record.product_code) else {
            stats.unmapped_product += 1;
            continue;
        };
        let (Some(exporter), Some(importer)) = (
            mappings.iso3_for_code(record.exporter_code),
            mappings.iso3_for_code(record.importer_code),
        ) else {
            stats.unmapped_country += 1;
            continue;
        };
        *sums.entry((record.year, exporter, importer, category)).or_insert(0.0) += value;
    }

    sums.into_iter()
        .map(|((year, exporter, importer, category), value)| AggregatedTrade {
            year,
            exporter_iso3: exporter.to_string(),
            importer_iso3: importer.to_string(),
            category: category.to_string(),
            value: value / THOUSANDS_PER_MILLION,
        })
        .collect()
}

/// Builds (or loads) the aggregated trade table for the configured year range.
pub struct RawAggregator<'a> {
    paths: &'a Paths,
    pipeline: &'a PipelineConfig,
}

impl<'a> RawAggregator<'a> {
    /// Create a new aggregator.
    pub fn new(paths: &'a Paths, pipeline: &'a PipelineConfig) -> Self {
        Self { paths, pipeline }
    }

    /// Return the cached wide table, building and caching it if absent.
    ///
    /// A read failure on any year aborts before the cache is written.
    pub fn load_or_build(&self, mappings: &Mappings) -> Result<WideTrade> {
        let cache = TradeCache::new(self.paths.trade_cache(self.pipeline));
        if cache.exists() {
            info!("Loading aggregated BACI data from {}", cache.path().display());
            return cache.read();
        }

        info!("Aggregating BACI data");
        let mut stats = AggregationStats::default();
        let mut aggregated = Vec::new();
        for year in self.pipeline.years() {
            let path = self.paths.raw_trade_file(&self.pipeline.baci_version, year);
            aggregated.extend(self.aggregate_file(&path, mappings, &mut stats)?);
        }
        info!(
            "Aggregated {} records: {} without value, {} unmapped products, {} unmapped countries",
            stats.records, stats.missing_value, stats.unmapped_product, stats.unmapped_country
        );

        let wide = WideTrade::pivot(&aggregated);
        info!("Saving aggregated BACI data to {}", cache.path().display());
        cache.write(&wide)?;
        Ok(wide)
    }

    fn aggregate_file(
        &self,
        path: &Path,
        mappings: &Mappings,
        stats: &mut AggregationStats,
    ) -> Result<Vec<AggregatedTrade>> {
        debug!("Reading {}", path.display());
        let records = read_raw_records(File::open(path)?)?;
        Ok(aggregate_records(&records, mappings, stats))
    }
}
