//! Coverage of the configured country set against world totals.

use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Write;
use tracing::info;
use tradeflow_core::{CountryGroup, Result, Year};
use tradeflow_transform::gdp::{WeoTable, NOMINAL_GDP, POPULATION, USD_UNIT};

/// WEO entity carrying the world aggregate.
pub const WORLD: &str = "World";

/// One-row summary: how much of the world the grouped countries cover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageSummary {
    pub n_countries: usize,
    /// Percent of world GDP; empty when the world total is zero or absent.
    pub gdp_share: Option<f64>,
    /// Percent of summed population; empty when the total is zero.
    pub pop_share: Option<f64>,
}

impl CoverageSummary {
    /// Compute coverage of every ISO3 code appearing in `groups` for `year`.
    pub fn compute(weo: &WeoTable, groups: &[CountryGroup], year: Year) -> Self {
        let members: BTreeSet<&str> = groups
            .iter()
            .flat_map(|g| g.members.iter().map(String::as_str))
            .collect();
        let covered = |iso3: Option<&String>| iso3.is_some_and(|c| members.contains(c.as_str()));

        let mut world_gdp = 0.0;
        let mut sample_gdp = 0.0;
        for obs in weo.indicator_for_year(NOMINAL_GDP, year, Some(USD_UNIT)) {
            let value = obs.value.unwrap_or(0.0);
            if obs.entity_name == WORLD {
                world_gdp += value;
            }
            if covered(obs.iso3_code.as_ref()) {
                sample_gdp += value;
            }
        }

        let mut world_pop = 0.0;
        let mut sample_pop = 0.0;
        for obs in weo.indicator_for_year(POPULATION, year, None) {
            let value = obs.value.unwrap_or(0.0);
            world_pop += value;
            if covered(obs.iso3_code.as_ref()) {
                sample_pop += value;
            }
        }

        let summary = Self {
            n_countries: members.len(),
            gdp_share: percent(sample_gdp, world_gdp),
            pop_share: percent(sample_pop, world_pop),
        };
        info!(
            "Coverage for {}: {} countries, GDP {:?}%, population {:?}%",
            year, summary.n_countries, summary.gdp_share, summary.pop_share
        );
        summary
    }

    /// Write the summary as a headed CSV.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.serialize(self)?;
        csv.flush()?;
        Ok(())
    }
}

fn percent(part: f64, total: f64) -> Option<f64> {
    (total != 0.0).then(|| part / total * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tradeflow_transform::gdp::WeoObservation;

    fn obs(indicator: &str, unit: &str, year: Year, name: &str, iso3: Option<&str>, value: f64) -> WeoObservation {
        WeoObservation {
            indicator_code: indicator.to_string(),
            unit: unit.to_string(),
            year,
            entity_name: name.to_string(),
            iso3_code: iso3.map(str::to_string),
            value: Some(value),
        }
    }

    fn weo() -> WeoTable {
        WeoTable::from_observations(vec![
            obs("NGDPD", "U.S. dollars", 2023, "World", None, 100.0),
            obs("NGDPD", "U.S. dollars", 2023, "France", Some("FRA"), 3.0),
            obs("NGDPD", "U.S. dollars", 2023, "Germany", Some("DEU"), 4.0),
            obs("NGDPD", "U.S. dollars", 2023, "Japan", Some("JPN"), 5.0),
            obs("NGDPD", "U.S. dollars", 2022, "France", Some("FRA"), 50.0),
            obs("LP", "Persons", 2023, "France", Some("FRA"), 60.0),
            obs("LP", "Persons", 2023, "Japan", Some("JPN"), 140.0),
        ])
    }

    fn groups() -> Vec<CountryGroup> {
        vec![
            CountryGroup::new("EU", ["FRA", "DEU"]),
            CountryGroup::new("Big", ["fra", "USA"]),
        ]
    }

    #[test]
    fn test_shares() {
        let summary = CoverageSummary::compute(&weo(), &groups(), 2023);
        assert_eq!(summary.n_countries, 3);
        assert_relative_eq!(summary.gdp_share.unwrap(), 7.0);
        assert_relative_eq!(summary.pop_share.unwrap(), 30.0);
    }

    #[test]
    fn test_missing_world_gives_empty_share() {
        let summary = CoverageSummary::compute(&weo(), &groups(), 2022);
        assert_eq!(summary.gdp_share, None);
        assert_eq!(summary.pop_share, None);
    }

    #[test]
    fn test_csv_output() {
        let summary = CoverageSummary {
            n_countries: 3,
            gdp_share: Some(7.5),
            pop_share: None,
        };
        let mut out = Vec::new();
        summary.write_csv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "n_countries,gdp_share,pop_share\n3,7.5,\n");
    }
}
