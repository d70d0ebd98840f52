//! Exporter/importer to country/partner/flow reshaping.

use tracing::info;
use tradeflow_core::{Flow, FlowRow, FlowTable, Result, TradeTable};

/// Emit every row twice: once as the exporter's exports and once as the
/// importer's imports, then sort by `(country, partner, flow, year, category)`.
///
/// Fails with `MissingColumn` when GDP shares have not been attached.
pub fn reshape_to_country_flow(table: TradeTable) -> Result<FlowTable> {
    table.require_gdp_shares()?;
    let value_columns = table.value_columns().to_vec();
    let source = table.into_rows();

    let mut rows = Vec::with_capacity(source.len() * 2);
    for row in &source {
        rows.push(FlowRow {
            year: row.year,
            country: row.exporter.clone(),
            partner: row.importer.clone(),
            flow: Flow::Exports,
            category: row.category.clone(),
            values: row.values.clone(),
            pct_of_gdp: row.pct_of_gdp_exporter,
        });
    }
    for row in source {
        rows.push(FlowRow {
            year: row.year,
            country: row.importer,
            partner: row.exporter,
            flow: Flow::Imports,
            category: row.category,
            values: row.values,
            pct_of_gdp: row.pct_of_gdp_importer,
        });
    }

    rows.sort_by(|a, b| {
        (&a.country, &a.partner, a.flow, a.year, &a.category).cmp(&(
            &b.country,
            &b.partner,
            b.flow,
            b.year,
            &b.category,
        ))
    });
    info!("Reshaped to {} country/partner/flow rows", rows.len());

    Ok(FlowTable {
        value_columns,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradeflow_core::{Error, TradeRow, ValueColumn};

    fn shared(rows: Vec<TradeRow>) -> TradeTable {
        let table = TradeTable::new(vec![ValueColumn::usd_current()], Vec::new()).unwrap();
        table.with_gdp_shares(rows)
    }

    fn row(year: i32, exporter: &str, importer: &str, value: f64) -> TradeRow {
        let mut row = TradeRow::country_pair(year, exporter, importer, "Agriculture", vec![Some(value)]);
        row.pct_of_gdp_exporter = Some(1.0);
        row.pct_of_gdp_importer = Some(2.0);
        row
    }

    #[test]
    fn test_one_pair_gives_two_rows() {
        let out = reshape_to_country_flow(shared(vec![row(2020, "USA", "FRA", 5.0)])).unwrap();
        assert_eq!(out.len(), 2);
        let (imports, exports) = (&out.rows[0], &out.rows[1]);

        assert_eq!(imports.country, "FRA");
        assert_eq!(imports.partner, "USA");
        assert_eq!(imports.flow, Flow::Imports);
        assert_eq!(imports.pct_of_gdp, Some(2.0));

        assert_eq!(exports.country, "USA");
        assert_eq!(exports.partner, "FRA");
        assert_eq!(exports.flow, Flow::Exports);
        assert_eq!(exports.pct_of_gdp, Some(1.0));

        assert_eq!(imports.values, exports.values);
        assert_eq!(out.value_columns, vec![ValueColumn::usd_current()]);
    }

    #[test]
    fn test_sorted_by_country_partner_flow_year() {
        let out = reshape_to_country_flow(shared(vec![
            row(2021, "USA", "FRA", 1.0),
            row(2020, "USA", "FRA", 2.0),
            row(2020, "FRA", "USA", 3.0),
        ]))
        .unwrap();
        let keys: Vec<_> = out
            .rows
            .iter()
            .map(|r| (r.country.as_str(), r.flow.as_str(), r.year))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("FRA", "exports", 2020),
                ("FRA", "imports", 2020),
                ("FRA", "imports", 2021),
                ("USA", "exports", 2020),
                ("USA", "exports", 2021),
                ("USA", "imports", 2020),
            ]
        );
    }

    #[test]
    fn test_requires_gdp_shares() {
        let table = TradeTable::new(vec![ValueColumn::usd_current()], Vec::new()).unwrap();
        let err = reshape_to_country_flow(table).unwrap_err();
        assert!(matches!(err, Error::MissingColumn(c) if c == "pct_of_gdp_exporter"));
    }
}
