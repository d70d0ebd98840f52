//! Exchange-rate and deflator lookups.
//!
//! The converter only ever sees the narrow [`PriceConverter`] interface; the
//! table-backed implementation here reads local CSV extracts.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};
use tradeflow_core::{PriceBasis, Result, Year};

/// Conversion factors from current USD.
pub trait PriceConverter {
    /// Multiplier turning a current-USD value of `entity_id` in `year` into
    /// `target_currency` at the given price basis. `None` when any input
    /// needed for the factor is unavailable.
    fn convert(
        &self,
        entity_id: &str,
        year: Year,
        target_currency: &str,
        basis: PriceBasis,
    ) -> Option<f64>;
}

#[derive(Debug, Deserialize)]
struct ExchangeRateRow {
    currency: String,
    year: Year,
    rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DeflatorRow {
    iso3_code: String,
    year: Year,
    deflator: Option<f64>,
}

/// Exchange rates and USD-terms GDP deflators held in memory.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    base_year: Year,
    /// (currency, year) -> units of currency per USD.
    rates: HashMap<(String, Year), f64>,
    /// (iso3, year) -> deflator index.
    deflators: HashMap<(String, Year), f64>,
}

impl PriceTable {
    /// Create an empty table for the given base year.
    pub fn new(base_year: Year) -> Self {
        Self {
            base_year,
            ..Self::default()
        }
    }

    /// Load `exchange_rates.csv` and `deflators.csv`.
    pub fn load(base_year: Year, rates_path: &Path, deflators_path: &Path) -> Result<Self> {
        let mut table = Self::new(base_year);
        table.read_rates(File::open(rates_path)?)?;
        table.read_deflators(File::open(deflators_path)?)?;
        info!(
            "Loaded {} exchange rates and {} deflators (base year {})",
            table.rates.len(),
            table.deflators.len(),
            base_year
        );
        Ok(table)
    }

    /// Read `currency,year,rate` rows.
    pub fn read_rates<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        for row in csv.deserialize::<ExchangeRateRow>() {
            let row = row?;
            if let Some(rate) = row.rate {
                self.insert_rate(&row.currency, row.year, rate);
            }
        }
        Ok(())
    }

    /// Read `iso3_code,year,deflator` rows.
    pub fn read_deflators<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        for row in csv.deserialize::<DeflatorRow>() {
            let row = row?;
            if let Some(deflator) = row.deflator {
                self.insert_deflator(&row.iso3_code, row.year, deflator);
            }
        }
        Ok(())
    }

    pub fn insert_rate(&mut self, currency: &str, year: Year, rate: f64) {
        if self.rates.insert((currency.to_uppercase(), year), rate).is_some() {
            warn!("Duplicate exchange rate for {} {}", currency, year);
        }
    }

    pub fn insert_deflator(&mut self, iso3: &str, year: Year, deflator: f64) {
        if self.deflators.insert((iso3.to_uppercase(), year), deflator).is_some() {
            warn!("Duplicate deflator for {} {}", iso3, year);
        }
    }

    fn rate(&self, currency: &str, year: Year) -> Option<f64> {
        if currency.eq_ignore_ascii_case("USD") {
            return Some(1.0);
        }
        self.rates.get(&(currency.to_uppercase(), year)).copied()
    }

    fn deflator(&self, iso3: &str, year: Year) -> Option<f64> {
        self.deflators
            .get(&(iso3.to_string(), year))
            .copied()
            .filter(|d| *d != 0.0)
    }
}

impl PriceConverter for PriceTable {
    fn convert(
        &self,
        entity_id: &str,
        year: Year,
        target_currency: &str,
        basis: PriceBasis,
    ) -> Option<f64> {
        match basis {
            PriceBasis::Current => self.rate(target_currency, year),
            PriceBasis::Constant => {
                let base = self.deflator(entity_id, self.base_year)?;
                let current = self.deflator(entity_id, year)?;
                Some(base / current * self.rate(target_currency, self.base_year)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table() -> PriceTable {
        let mut table = PriceTable::new(2023);
        table
            .read_rates("currency,year,rate\nEUR,2020,0.8\nEUR,2023,0.9\nGBP,2020,\n".as_bytes())
            .unwrap();
        table
            .read_deflators("iso3_code,year,deflator\nUSA,2020,90\nUSA,2023,100\nFRA,2023,100\n".as_bytes())
            .unwrap();
        table
    }

    #[test]
    fn test_current_uses_year_rate() {
        let t = table();
        assert_relative_eq!(t.convert("USA", 2020, "EUR", PriceBasis::Current).unwrap(), 0.8);
        assert_relative_eq!(t.convert("USA", 2020, "USD", PriceBasis::Current).unwrap(), 1.0);
        assert!(t.convert("USA", 2020, "GBP", PriceBasis::Current).is_none());
    }

    #[test]
    fn test_constant_deflates_then_converts_at_base_rate() {
        let t = table();
        let factor = t.convert("USA", 2020, "EUR", PriceBasis::Constant).unwrap();
        assert_relative_eq!(factor, 100.0 / 90.0 * 0.9, epsilon = 1e-12);
        let usd = t.convert("USA", 2020, "USD", PriceBasis::Constant).unwrap();
        assert_relative_eq!(usd, 100.0 / 90.0, epsilon = 1e-12);
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let rates = dir.path().join("exchange_rates.csv");
        let deflators = dir.path().join("deflators.csv");
        std::fs::write(&rates, "currency,year,rate\ngbp,2023,0.8\n").unwrap();
        std::fs::write(&deflators, "iso3_code,year,deflator\nGBR,2023,100\nGBR,2022,0\n").unwrap();

        let t = PriceTable::load(2023, &rates, &deflators).unwrap();
        assert_relative_eq!(t.convert("GBR", 2023, "GBP", PriceBasis::Constant).unwrap(), 0.8);
        // A zero deflator counts as missing.
        assert!(t.convert("GBR", 2022, "GBP", PriceBasis::Constant).is_none());
        assert!(PriceTable::load(2023, &dir.path().join("absent.csv"), &deflators).is_err());
    }

    #[test]
    fn test_constant_missing_deflator() {
        let t = table();
        assert!(t.convert("FRA", 2020, "USD", PriceBasis::Constant).is_none());
        assert!(t.convert("CHN", 2023, "EUR", PriceBasis::Constant).is_none());
    }
}
