//! GDP totals and trade-as-share-of-GDP.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};
use tradeflow_core::{GdpRecord, PipelineConfig, Result, TradeRow, TradeTable, Year, USD_CURRENT};
use tradeflow_ingestion::Mappings;

/// WEO indicator code for nominal GDP.
pub const NOMINAL_GDP: &str = "NGDPD";
/// WEO indicator code for population.
pub const POPULATION: &str = "LP";
/// WEO unit label for values in (billions of) US dollars.
pub const USD_UNIT: &str = "U.S. dollars";

/// Source of nominal GDP in millions of current USD.
pub trait GdpSource {
    fn nominal_gdp(&self) -> Result<Vec<GdpRecord>>;
}

/// One WEO observation with its country code resolved where possible.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeoObservation {
    pub indicator_code: String,
    pub unit: String,
    pub year: Year,
    pub entity_name: String,
    #[serde(default)]
    pub iso3_code: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

/// A local extract of the IMF World Economic Outlook.
#[derive(Debug, Clone, Default)]
pub struct WeoTable {
    observations: Vec<WeoObservation>,
}

impl WeoTable {
    /// Load `weo.csv`, harmonizing entity names to ISO3 codes.
    pub fn load(path: &Path, mappings: &Mappings) -> Result<Self> {
        let table = Self::read(File::open(path)?, mappings)?;
        info!("Loaded {} WEO observations", table.observations.len());
        Ok(table)
    }

    /// Read `indicator_code,unit,year,entity_name,iso3_code,value` rows.
    pub fn read<R: Read>(reader: R, mappings: &Mappings) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut observations = Vec::new();
        for row in csv.deserialize::<WeoObservation>() {
            let mut obs = row?;
            obs.iso3_code = match obs.iso3_code.take().filter(|c| !c.is_empty()) {
                Some(code) => Some(code.to_uppercase()),
                None => mappings.iso3_for_name(&obs.entity_name).map(str::to_string),
            };
            observations.push(obs);
        }
        Ok(Self { observations })
    }

    pub fn from_observations(observations: Vec<WeoObservation>) -> Self {
        Self { observations }
    }

    /// Observations of `indicator` for `year`, optionally restricted to a unit.
    pub fn indicator_for_year<'s>(
        &'s self,
        indicator: &'s str,
        year: Year,
        unit: Option<&'s str>,
    ) -> impl Iterator<Item = &'s WeoObservation> + 's {
        self.observations.iter().filter(move |o| {
            o.indicator_code == indicator && o.year == year && unit.map_or(true, |u| o.unit == u)
        })
    }
}

impl GdpSource for WeoTable {
    fn nominal_gdp(&self) -> Result<Vec<GdpRecord>> {
        Ok(self
            .observations
            .iter()
            .filter(|o| o.indicator_code == NOMINAL_GDP && o.unit == USD_UNIT)
            .filter_map(|o| {
                Some(GdpRecord {
                    year: o.year,
                    iso3_code: o.iso3_code.clone()?,
                    gdp_current: o.value? * 1_000.0,
                })
            })
            .collect())
    }
}

/// GDP lookup keyed by display name and year.
///
/// A name may carry several entries when two entities share it.
#[derive(Debug, Clone, Default)]
pub struct GdpIndex {
    entries: HashMap<(String, Year), Vec<Option<f64>>>,
}

impl GdpIndex {
    /// Entries for `name` in `year`; empty when the name is unknown.
    pub fn lookup(&self, name: &str, year: Year) -> &[Option<f64>] {
        self.entries
            .get(&(name.to_string(), year))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn push(&mut self, name: String, year: Year, gdp: Option<f64>) {
        self.entries.entry((name, year)).or_default().push(gdp);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `value / gdp * 100`, missing when GDP is missing or exactly zero.
pub fn share_of_gdp(value: Option<f64>, gdp: Option<f64>) -> Option<f64> {
    match gdp {
        Some(g) if g != 0.0 => value.map(|v| v / g * 100.0),
        _ => None,
    }
}

/// Attaches exporter and importer GDP shares.
pub struct GdpShareCalculator<'a> {
    mappings: &'a Mappings,
    years: Vec<Year>,
}

impl<'a> GdpShareCalculator<'a> {
    /// Create a calculator over the configured year range.
    pub fn new(mappings: &'a Mappings, config: &PipelineConfig) -> Self {
        Self {
            mappings,
            years: config.years().collect(),
        }
    }

    /// Country and group GDP keyed by display name.
    ///
    /// The country grid covers every exporter ISO3 in `table` for every
    /// configured year; countries absent from `gdp` keep a missing entry.
    /// Group GDP is the sum of members present in the grid, emitted only for
    /// years where at least one member has a value.
    pub fn build_index(&self, table: &TradeTable, gdp: &[GdpRecord]) -> GdpIndex {
        let countries: BTreeSet<&str> = table
            .rows()
            .iter()
            .filter_map(|r| r.exporter_iso3.as_deref())
            .collect();

        let mut observed: HashMap<(&str, Year), Vec<f64>> = HashMap::new();
        for record in gdp {
            observed
                .entry((record.iso3_code.as_str(), record.year))
                .or_default()
                .push(record.gdp_current);
        }

        let mut index = GdpIndex::default();
        // (iso3, year) -> GDP values joined onto the grid.
        let mut grid: BTreeMap<(&str, Year), Vec<f64>> = BTreeMap::new();
        for &iso3 in &countries {
            let name = self.mappings.display_name(iso3);
            for &year in &self.years {
                match observed.get(&(iso3, year)) {
                    Some(values) => {
                        if values.len() > 1 {
                            warn!("{} GDP observations for {} {}", values.len(), iso3, year);
                        }
                        for &v in values {
                            index.push(name.clone(), year, Some(v));
                        }
                        grid.insert((iso3, year), values.clone());
                    }
                    None => index.push(name.clone(), year, None),
                }
            }
        }

        for group in self.mappings.groups() {
            let mut totals: BTreeMap<Year, f64> = BTreeMap::new();
            for ((iso3, year), values) in &grid {
                if group.contains(iso3) {
                    *totals.entry(*year).or_insert(0.0) += values.iter().sum::<f64>();
                }
            }
            for (year, total) in totals {
                index.push(group.name.clone(), year, Some(total));
            }
        }

        debug!("GDP index holds {} name/year keys", index.len());
        index
    }

    /// Join GDP on exporter and importer display names and compute shares.
    ///
    /// Joins follow left-join semantics: a row whose name matches several GDP
    /// entries appears once per match.
    pub fn add_share_of_gdp(&self, table: TradeTable, source: &dyn GdpSource) -> Result<TradeTable> {
        info!("Adding share of GDP columns (exporter & importer)");
        let usd = table.require_value_column(USD_CURRENT)?;
        let gdp = source.nominal_gdp()?;
        let index = self.build_index(&table, &gdp);

        let missing: &[Option<f64>] = &[None];
        let mut rows = Vec::with_capacity(table.len());
        for row in table.rows() {
            let value = row.values[usd];
            let exporter_gdp = non_empty(index.lookup(&row.exporter, row.year), missing);
            let importer_gdp = non_empty(index.lookup(&row.importer, row.year), missing);
            for &eg in exporter_gdp {
                for &ig in importer_gdp {
                    rows.push(TradeRow {
                        pct_of_gdp_exporter: share_of_gdp(value, eg),
                        pct_of_gdp_importer: share_of_gdp(value, ig),
                        ..row.clone()
                    });
                }
            }
        }

        if rows.len() != table.len() {
            debug!(
                "GDP join fanned out {} rows into {}",
                table.len(),
                rows.len()
            );
        }
        Ok(table.with_gdp_shares(rows))
    }
}

fn non_empty<'s>(found: &'s [Option<f64>], fallback: &'s [Option<f64>]) -> &'s [Option<f64>] {
    if found.is_empty() {
        fallback
    } else {
        found
    }
}
