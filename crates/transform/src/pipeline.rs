//! Transformation pipeline.
//!
//! Chains every stage between the raw aggregate and the flow table.

use crate::{
    currency::CurrencyConverter,
    gdp::{GdpShareCalculator, GdpSource},
    groups::{GroupExpander, GroupIndex},
    names::attach_display_names,
    prices::PriceConverter,
    reshape::reshape_to_country_flow,
};
use tracing::info;
use tradeflow_core::{FlowTable, PipelineConfig, Result};
use tradeflow_ingestion::{Mappings, WideTrade};

/// Entity whose price context applies to a trade value.
pub const PRICE_CONTEXT: &str = "exporter_iso3";

/// Transformation pipeline.
pub struct TradePipeline<'a> {
    /// Static lookups.
    mappings: &'a Mappings,
    /// Currency/price converter.
    converter: CurrencyConverter,
    /// Group lookups with the overlap relation.
    groups: GroupIndex,
    /// GDP share calculator.
    gdp: GdpShareCalculator<'a>,
}

impl<'a> TradePipeline<'a> {
    /// Create a new pipeline from configuration.
    pub fn new(mappings: &'a Mappings, config: &PipelineConfig) -> Self {
        Self {
            mappings,
            converter: CurrencyConverter::new(config),
            groups: GroupIndex::new(mappings.groups(), &mappings.membership()),
            gdp: GdpShareCalculator::new(mappings, config),
        }
    }

    /// Run every stage on the wide aggregate.
    pub fn run(
        &self,
        wide: &WideTrade,
        prices: &dyn PriceConverter,
        gdp: &dyn GdpSource,
    ) -> Result<FlowTable> {
        let long = wide.melt_with_totals();
        info!("Transforming {} aggregated rows", long.len());

        let mut table = self
            .converter
            .add_currencies_and_prices(&long, PRICE_CONTEXT, prices)?;
        attach_display_names(&mut table, self.mappings);
        let table = GroupExpander::new(&self.groups).expand(table)?;
        let table = self.gdp.add_share_of_gdp(table, gdp)?;
        let flows = reshape_to_country_flow(table)?;

        info!(
            "Pipeline produced {} rows across {} value columns",
            flows.len(),
            flows.value_columns.len()
        );
        Ok(flows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::PriceTable;
    use std::collections::BTreeMap;
    use tradeflow_core::{AggregatedTrade, CountryGroup, Flow, GdpRecord, PriceBasis, Year};

    struct FixedGdp(Vec<GdpRecord>);

    impl GdpSource for FixedGdp {
        fn nominal_gdp(&self) -> Result<Vec<GdpRecord>> {
            Ok(self.0.clone())
        }
    }

    fn trade(exporter: &str, importer: &str, category: &str, value: f64) -> AggregatedTrade {
        AggregatedTrade {
            year: 2020,
            exporter_iso3: exporter.to_string(),
            importer_iso3: importer.to_string(),
            category: category.to_string(),
            value,
        }
    }

    #[test]
    fn test_end_to_end() {
        let mappings = Mappings::from_parts(
            BTreeMap::new(),
            vec![
                (842, "United States".to_string(), "USA".to_string()),
                (251, "France".to_string(), "FRA".to_string()),
                (276, "Germany".to_string(), "DEU".to_string()),
            ],
            vec![CountryGroup::new("EU", ["FRA", "DEU"])],
        );
        let config = PipelineConfig {
            base_year: 2020,
            start_year: 2020,
            end_year: 2020,
            currencies: vec!["USD".to_string()],
            ..PipelineConfig::default()
        };
        let mut prices = PriceTable::new(2020);
        for iso3 in ["USA", "FRA", "DEU"] {
            prices.insert_deflator(iso3, 2020, 100.0);
        }
        let gdp = FixedGdp(vec![
            GdpRecord { year: 2020, iso3_code: "USA".to_string(), gdp_current: 1000.0 },
            GdpRecord { year: 2020, iso3_code: "FRA".to_string(), gdp_current: 100.0 },
            GdpRecord { year: 2020, iso3_code: "DEU".to_string(), gdp_current: 100.0 },
        ]);
        let wide = WideTrade::pivot(&[
            trade("USA", "FRA", "Agriculture", 10.0),
            trade("USA", "DEU", "Agriculture", 20.0),
            trade("FRA", "DEU", "Minerals", 5.0),
            trade("DEU", "USA", "Minerals", 2.0),
        ]);

        let flows = TradePipeline::new(&mappings, &config).run(&wide, &prices, &gdp).unwrap();

        let names: Vec<String> = flows.value_columns.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["value_usd_constant", "value_usd_current"]);
        assert_eq!(flows.value_columns[0].basis(), PriceBasis::Constant);

        let find = |country: &str, partner: &str, flow: Flow, category: &str| {
            flows
                .rows
                .iter()
                .find(|r| r.country == country && r.partner == partner && r.flow == flow && r.category == category)
        };

        // USA exports to the EU: 30 of agriculture, 3% of USA GDP.
        let usa_eu = find("United States", "EU", Flow::Exports, "Agriculture").unwrap();
        assert_eq!(usa_eu.values[1], Some(30.0));
        assert!((usa_eu.pct_of_gdp.unwrap() - 3.0).abs() < 1e-9);

        // EU imports from USA mirror the same row, 15% of EU GDP.
        let eu_usa = find("EU", "United States", Flow::Imports, "Agriculture").unwrap();
        assert!((eu_usa.pct_of_gdp.unwrap() - 15.0).abs() < 1e-9);

        // Intra-EU trade never appears on the EU's own cell.
        assert!(flows.rows.iter().all(|r| !(r.country == "EU" && r.partner == "EU")));
        assert!(find("France", "EU", Flow::Exports, "Minerals").is_none());

        // Synthetic totals are carried through.
        let total = find("United States", "France", Flow::Exports, "All products").unwrap();
        assert_eq!(total.values[1], Some(10.0));

        let years: Vec<Year> = flows.rows.iter().map(|r| r.year).collect();
        assert!(years.iter().all(|&y| y == 2020));
    }
}
