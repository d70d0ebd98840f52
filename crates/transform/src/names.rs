//! Display names for country-to-country rows.

use tradeflow_core::TradeTable;
use tradeflow_ingestion::Mappings;

/// Replace the exporter/importer labels of country rows with display names.
///
/// Group rows (no ISO3 on that side) keep their group name.
pub fn attach_display_names(table: &mut TradeTable, mappings: &Mappings) {
    for row in table.rows_mut() {
        if let Some(iso3) = &row.exporter_iso3 {
            row.exporter = mappings.display_name(iso3);
        }
        if let Some(iso3) = &row.importer_iso3 {
            row.importer = mappings.display_name(iso3);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tradeflow_core::{TradeRow, ValueColumn};

    #[test]
    fn test_names_resolved_with_fallback() {
        let mappings = Mappings::from_parts(
            BTreeMap::new(),
            vec![(1, "United States".to_string(), "USA".to_string())],
            Vec::new(),
        );
        let mut table = TradeTable::new(
            vec![ValueColumn::usd_current()],
            vec![
                TradeRow::country_pair(2020, "USA", "ANT", "Agriculture", vec![Some(1.0)]),
                TradeRow::country_pair(2020, "USA", "QQQ", "Agriculture", vec![Some(1.0)]),
            ],
        )
        .unwrap();

        attach_display_names(&mut table, &mappings);

        assert_eq!(table.rows()[0].exporter, "United States");
        assert_eq!(table.rows()[0].importer, "Netherlands Antilles");
        assert_eq!(table.rows()[1].importer, "QQQ");
    }
}
