//! Currency and price-basis conversion.
//!
//! Expands the single current-USD value into one column per configured
//! currency and basis, then drops rows carrying an exact zero in any column.

use crate::prices::PriceConverter;
use std::collections::HashMap;
use tracing::info;
use tradeflow_core::{
    AggregatedTrade, Error, PipelineConfig, PriceBasis, Result, TradeRow, TradeTable, ValueColumn, Year,
};

/// Which party's price context a conversion uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdColumn {
    ExporterIso3,
    ImporterIso3,
}

impl IdColumn {
    /// Resolve a column name, failing fast on anything else.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "exporter_iso3" => Ok(IdColumn::ExporterIso3),
            "importer_iso3" => Ok(IdColumn::ImporterIso3),
            other => Err(Error::missing_column(other)),
        }
    }

    fn entity<'r>(&self, row: &'r AggregatedTrade) -> &'r str {
        match self {
            IdColumn::ExporterIso3 => &row.exporter_iso3,
            IdColumn::ImporterIso3 => &row.importer_iso3,
        }
    }
}

/// Currency/price converter.
pub struct CurrencyConverter {
    base_year: Year,
    currencies: Vec<String>,
}

impl CurrencyConverter {
    /// Create a converter from pipeline configuration.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            base_year: config.base_year,
            currencies: config.currencies.iter().map(|c| c.to_uppercase()).collect(),
        }
    }

    /// Output value columns, sorted by name.
    ///
    /// `value_usd_current` is always present; every currency gets a constant
    /// column and every non-USD currency a current column.
    pub fn value_columns(&self) -> Vec<ValueColumn> {
        let mut columns = vec![ValueColumn::usd_current()];
        for currency in &self.currencies {
            columns.push(ValueColumn::new(currency, PriceBasis::Constant));
            if currency != "USD" {
                columns.push(ValueColumn::new(currency, PriceBasis::Current));
            }
        }
        columns.sort_by_key(|c| c.name());
        columns.dedup();
        columns
    }

    /// Attach the converted value columns to long-form aggregates.
    ///
    /// Rows whose entity/year has no conversion factor get a missing cell.
    /// Rows with an exact zero in any value column are dropped.
    pub fn add_currencies_and_prices(
        &self,
        rows: &[AggregatedTrade],
        id_column: &str,
        service: &dyn PriceConverter,
    ) -> Result<TradeTable> {
        let id_column = IdColumn::from_name(id_column)?;
        let columns = self.value_columns();
        let usd_current = ValueColumn::usd_current();
        info!(
            "Adding currency and price columns ({} currencies, base {})",
            self.currencies.len(),
            self.base_year
        );

        let mut factors: HashMap<(&str, Year, usize), Option<f64>> = HashMap::new();
        let mut out = Vec::with_capacity(rows.len());
        let mut dropped = 0usize;

        for row in rows {
            let entity = id_column.entity(row);
            let values: Vec<Option<f64>> = columns
                .iter()
                .enumerate()
                .map(|(i, column)| {
                    if *column == usd_current {
                        return Some(row.value);
                    }
                    let factor = *factors.entry((entity, row.year, i)).or_insert_with(|| {
                        service.convert(entity, row.year, column.currency(), column.basis())
                    });
                    factor.map(|f| row.value * f)
                })
                .collect();

            if values.iter().any(|v| *v == Some(0.0)) {
                dropped += 1;
                continue;
            }
            out.push(TradeRow::country_pair(
                row.year,
                &row.exporter_iso3,
                &row.importer_iso3,
                &row.category,
                values,
            ));
        }

        if dropped > 0 {
            info!("Dropping {} rows with zero values across currency columns", dropped);
        }
        TradeTable::new(columns, out)
    }
}
