//! Core data types for the trade-flow pipeline.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Calendar year.
pub type Year = i32;

/// Synthetic category holding the sum across all HS sections.
pub const ALL_PRODUCTS: &str = "All products";

/// Prefix shared by every monetary value column.
pub const VALUE_PREFIX: &str = "value_";

/// Prefix shared by every percentage column.
pub const PCT_PREFIX: &str = "pct_";

/// Column the GDP share stage divides by GDP.
pub const USD_CURRENT: &str = "value_usd_current";

/// Price basis of a value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceBasis {
    /// Nominal values for their own year.
    Current,
    /// Values deflated to the configured base year.
    Constant,
}

impl PriceBasis {
    pub fn as_str(self) -> &'static str {
        match self {
            PriceBasis::Current => "current",
            PriceBasis::Constant => "constant",
        }
    }
}

/// A `value_<currency>_<basis>` column descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueColumn {
    currency: String,
    basis: PriceBasis,
}

impl ValueColumn {
    /// Create a column descriptor; the currency code is normalised to upper case.
    pub fn new(currency: &str, basis: PriceBasis) -> Self {
        Self {
            currency: currency.to_uppercase(),
            basis,
        }
    }

    /// The as-reported USD column every table starts from.
    pub fn usd_current() -> Self {
        Self::new("USD", PriceBasis::Current)
    }

    /// Parse a column name such as `value_eur_constant`.
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(VALUE_PREFIX)?;
        let (currency, basis) = rest.rsplit_once('_')?;
        if currency.is_empty() {
            return None;
        }
        let basis = match basis {
            "current" => PriceBasis::Current,
            "constant" => PriceBasis::Constant,
            _ => return None,
        };
        Some(Self::new(currency, basis))
    }

    /// Upper-case currency code.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn basis(&self) -> PriceBasis {
        self.basis
    }

    /// Column name, e.g. `value_usd_current`.
    pub fn name(&self) -> String {
        format!(
            "{}{}_{}",
            VALUE_PREFIX,
            self.currency.to_lowercase(),
            self.basis.as_str()
        )
    }
}

impl fmt::Display for ValueColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// One line of a raw BACI file (`t,i,j,k,v`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTradeRecord {
    /// Year.
    #[serde(rename = "t")]
    pub year: Year,
    /// Exporter numeric country code.
    #[serde(rename = "i")]
    pub exporter_code: u32,
    /// Importer numeric country code.
    #[serde(rename = "j")]
    pub importer_code: u32,
    /// HS product code (six digits, leading zeros preserved).
    #[serde(rename = "k")]
    pub product_code: String,
    /// Trade value in thousands of current USD.
    #[serde(rename = "v")]
    pub value: Option<f64>,
}

/// Canonical long-form aggregate: one value per year, pair and category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedTrade {
    pub year: Year,
    pub exporter_iso3: String,
    pub importer_iso3: String,
    pub category: String,
    /// Millions of current USD.
    pub value: f64,
}

/// A trade row carrying parallel value columns.
///
/// `exporter_iso3`/`importer_iso3` are `None` when that side is a country group.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRow {
    pub year: Year,
    pub exporter_iso3: Option<String>,
    pub exporter: String,
    pub importer_iso3: Option<String>,
    pub importer: String,
    pub category: String,
    /// One cell per column of the owning table's `value_columns`.
    pub values: Vec<Option<f64>>,
    pub pct_of_gdp_exporter: Option<f64>,
    pub pct_of_gdp_importer: Option<f64>,
}

impl TradeRow {
    /// A country-to-country row; display names start out as the ISO3 codes.
    pub fn country_pair(
        year: Year,
        exporter_iso3: &str,
        importer_iso3: &str,
        category: &str,
        values: Vec<Option<f64>>,
    ) -> Self {
        Self {
            year,
            exporter_iso3: Some(exporter_iso3.to_string()),
            exporter: exporter_iso3.to_string(),
            importer_iso3: Some(importer_iso3.to_string()),
            importer: importer_iso3.to_string(),
            category: category.to_string(),
            values,
            pct_of_gdp_exporter: None,
            pct_of_gdp_importer: None,
        }
    }
}

/// Exporter/importer oriented trade table.
#[derive(Debug, Clone, Default)]
pub struct TradeTable {
    value_columns: Vec<ValueColumn>,
    has_gdp_shares: bool,
    rows: Vec<TradeRow>,
}

impl TradeTable {
    /// Create a table; every row must carry one cell per value column.
    pub fn new(value_columns: Vec<ValueColumn>, rows: Vec<TradeRow>) -> Result<Self> {
        let width = value_columns.len();
        if let Some(row) = rows.iter().find(|r| r.values.len() != width) {
            return Err(Error::data(format!(
                "row {} {}->{} has {} value cells, expected {}",
                row.year,
                row.exporter,
                row.importer,
                row.values.len(),
                width
            )));
        }
        Ok(Self {
            value_columns,
            has_gdp_shares: false,
            rows,
        })
    }

    pub fn value_columns(&self) -> &[ValueColumn] {
        &self.value_columns
    }

    pub fn value_column_names(&self) -> Vec<String> {
        self.value_columns.iter().map(ValueColumn::name).collect()
    }

    /// Index of a value column by name.
    pub fn value_index(&self, name: &str) -> Option<usize> {
        self.value_columns.iter().position(|c| c.name() == name)
    }

    /// Index of a value column, failing with `MissingColumn` when absent.
    pub fn require_value_column(&self, name: &str) -> Result<usize> {
        self.value_index(name)
            .ok_or_else(|| Error::missing_column(name))
    }

    /// Whether `pct_of_gdp_exporter`/`pct_of_gdp_importer` have been computed.
    pub fn has_gdp_shares(&self) -> bool {
        self.has_gdp_shares
    }

    /// Fail with `MissingColumn` unless the GDP share columns exist.
    pub fn require_gdp_shares(&self) -> Result<()> {
        if self.has_gdp_shares {
            Ok(())
        } else {
            Err(Error::missing_column("pct_of_gdp_exporter"))
        }
    }

    /// Replace the rows, marking the GDP share columns as present.
    pub fn with_gdp_shares(mut self, rows: Vec<TradeRow>) -> Self {
        self.rows = rows;
        self.has_gdp_shares = true;
        self
    }

    pub fn rows(&self) -> &[TradeRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [TradeRow] {
        &mut self.rows
    }

    pub fn into_rows(self) -> Vec<TradeRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Direction of a flow from the reporting country's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Exports,
    Imports,
}

impl Flow {
    pub fn as_str(self) -> &'static str {
        match self {
            Flow::Exports => "exports",
            Flow::Imports => "imports",
        }
    }
}

/// Country/partner/flow oriented row.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRow {
    pub year: Year,
    pub country: String,
    pub partner: String,
    pub flow: Flow,
    pub category: String,
    pub values: Vec<Option<f64>>,
    pub pct_of_gdp: Option<f64>,
}

/// Country/partner/flow oriented table.
#[derive(Debug, Clone, Default)]
pub struct FlowTable {
    pub value_columns: Vec<ValueColumn>,
    pub rows: Vec<FlowRow>,
}

impl FlowTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A named set of ISO3 codes reported as a single entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryGroup {
    pub name: String,
    pub members: BTreeSet<String>,
}

impl CountryGroup {
    /// Create a group; member codes are upper-cased and deduplicated.
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            members: members
                .into_iter()
                .map(|m| m.as_ref().trim().to_uppercase())
                .collect(),
        }
    }

    pub fn contains(&self, iso3: &str) -> bool {
        self.members.contains(iso3)
    }

    /// True when the two groups share no member.
    pub fn is_disjoint(&self, other: &CountryGroup) -> bool {
        self.members.is_disjoint(&other.members)
    }
}

/// One `iso3 -> group` edge of the membership relation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Membership {
    pub iso3: String,
    pub group: String,
}

/// Nominal GDP observation in millions of USD.
#[derive(Debug, Clone, PartialEq)]
pub struct GdpRecord {
    pub year: Year,
    pub iso3_code: String,
    pub gdp_current: f64,
}
