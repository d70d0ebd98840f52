//! Unit and type optimization before persistence.
//!
//! Value columns are converted from millions to whole units and stored as the
//! narrowest integer that fits; GDP shares are narrowed to `f32`.

use ordered_float::OrderedFloat;
use tracing::{debug, info};
use tradeflow_core::{Error, Flow, FlowTable, Result};

/// Millions to units.
pub const UNIT_SCALE: f64 = 1_000_000.0;

/// Integer width chosen for a value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    Int32,
    Int64,
}

/// A value column in whole units.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitColumn {
    pub name: String,
    pub width: IntWidth,
    pub values: Vec<Option<i64>>,
}

/// Column-oriented flow table ready for writing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizedTable {
    pub year: Vec<i16>,
    pub country: Vec<String>,
    pub partner: Vec<String>,
    pub flow: Vec<Flow>,
    pub category: Vec<String>,
    pub value_columns: Vec<UnitColumn>,
    pub pct_of_gdp: Vec<Option<f32>>,
}

impl OptimizedTable {
    pub fn len(&self) -> usize {
        self.year.len()
    }

    pub fn is_empty(&self) -> bool {
        self.year.is_empty()
    }

    /// Gather the given row positions into a new table.
    pub fn take(&self, indices: &[usize]) -> Self {
        Self {
            year: indices.iter().map(|&i| self.year[i]).collect(),
            country: indices.iter().map(|&i| self.country[i].clone()).collect(),
            partner: indices.iter().map(|&i| self.partner[i].clone()).collect(),
            flow: indices.iter().map(|&i| self.flow[i]).collect(),
            category: indices.iter().map(|&i| self.category[i].clone()).collect(),
            value_columns: self
                .value_columns
                .iter()
                .map(|c| UnitColumn {
                    name: c.name.clone(),
                    width: c.width,
                    values: indices.iter().map(|&i| c.values[i]).collect(),
                })
                .collect(),
            pct_of_gdp: indices.iter().map(|&i| self.pct_of_gdp[i]).collect(),
        }
    }
}

/// Millions to rounded units (half to even).
pub fn to_units(millions: f64) -> f64 {
    (millions * UNIT_SCALE).round_ties_even()
}

/// Narrowest width holding every value; all-missing defaults to 32 bits.
pub fn choose_width(units: &[Option<f64>]) -> IntWidth {
    let max_abs = units
        .iter()
        .flatten()
        .map(|v| OrderedFloat(v.abs()))
        .max();
    match max_abs {
        Some(m) if m.0 > i32::MAX as f64 => IntWidth::Int64,
        _ => IntWidth::Int32,
    }
}

/// Scale value columns to units and narrow every column type.
pub fn optimize(table: FlowTable) -> Result<OptimizedTable> {
    let n = table.len();
    let mut out = OptimizedTable {
        year: Vec::with_capacity(n),
        country: Vec::with_capacity(n),
        partner: Vec::with_capacity(n),
        flow: Vec::with_capacity(n),
        category: Vec::with_capacity(n),
        value_columns: Vec::with_capacity(table.value_columns.len()),
        pct_of_gdp: Vec::with_capacity(n),
    };

    for (i, column) in table.value_columns.iter().enumerate() {
        let units: Vec<Option<f64>> = table
            .rows
            .iter()
            .map(|r| r.values[i].map(to_units))
            .collect();
        if let Some(bad) = units.iter().flatten().find(|v| !v.is_finite() || v.abs() > i64::MAX as f64) {
            return Err(Error::data(format!("{} holds out-of-range value {}", column, bad)));
        }
        let width = choose_width(&units);
        debug!("{} stored as {:?}", column, width);
        out.value_columns.push(UnitColumn {
            name: column.name(),
            width,
            values: units.into_iter().map(|v| v.map(|v| v as i64)).collect(),
        });
    }

    for row in table.rows {
        let year = i16::try_from(row.year)
            .map_err(|_| Error::data(format!("year {} does not fit in 16 bits", row.year)))?;
        out.year.push(year);
        out.country.push(row.country);
        out.partner.push(row.partner);
        out.flow.push(row.flow);
        out.category.push(row.category);
        out.pct_of_gdp.push(row.pct_of_gdp.map(|p| p as f32));
    }

    info!(
        "Optimized {} rows ({} value columns in units)",
        out.len(),
        out.value_columns.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tradeflow_core::{FlowRow, PriceBasis, ValueColumn};

    fn flow_row(values: Vec<Option<f64>>, pct: Option<f64>) -> FlowRow {
        FlowRow {
            year: 2020,
            country: "France".to_string(),
            partner: "EU".to_string(),
            flow: Flow::Exports,
            category: "Agriculture".to_string(),
            values,
            pct_of_gdp: pct,
        }
    }

    fn table(rows: Vec<FlowRow>) -> FlowTable {
        FlowTable {
            value_columns: vec![
                ValueColumn::new("EUR", PriceBasis::Current),
                ValueColumn::usd_current(),
            ],
            rows,
        }
    }

    #[test]
    fn test_scaling_within_half_unit() {
        let millions = [0.1, 1.2345678, 0.0000004, 123.4567891];
        let rows = millions
            .iter()
            .map(|&m| flow_row(vec![None, Some(m)], None))
            .collect();
        let out = optimize(table(rows)).unwrap();
        for (m, units) in millions.iter().zip(&out.value_columns[1].values) {
            let units = units.unwrap() as f64;
            assert!((units - m * UNIT_SCALE).abs() <= 0.5, "{m} -> {units}");
        }
        assert_eq!(out.value_columns[1].values[0], Some(100_000));
    }

    #[test]
    fn test_width_selection() {
        let out = optimize(table(vec![
            flow_row(vec![None, Some(2_000.0)], None),
            flow_row(vec![None, Some(-3_000.0)], None),
        ]))
        .unwrap();
        // All-missing column stays narrow.
        assert_eq!(out.value_columns[0].width, IntWidth::Int32);
        assert_eq!(out.value_columns[0].values, vec![None, None]);
        // 3e9 units exceeds the 32-bit range.
        assert_eq!(out.value_columns[1].width, IntWidth::Int64);
        assert_eq!(out.value_columns[1].values[1], Some(-3_000_000_000));

        assert_eq!(choose_width(&[Some(i32::MAX as f64)]), IntWidth::Int32);
        assert_eq!(choose_width(&[Some(-(i32::MAX as f64) - 2.0)]), IntWidth::Int64);
    }

    #[test]
    fn test_negative_values_round_toward_nearest() {
        assert_eq!(to_units(-0.0000014), -1.0);
        assert_eq!(to_units(-0.0000016), -2.0);
    }

    #[test]
    fn test_pct_and_year_narrowed() {
        let out = optimize(table(vec![flow_row(vec![Some(1.0), Some(1.0)], Some(12.5))])).unwrap();
        assert_eq!(out.year, vec![2020i16]);
        assert_relative_eq!(out.pct_of_gdp[0].unwrap(), 12.5f32);
        assert_eq!(out.value_columns[0].name, "value_eur_current");
    }

    #[test]
    fn test_take() {
        let out = optimize(table(vec![
            flow_row(vec![Some(1.0), Some(2.0)], None),
            flow_row(vec![Some(3.0), Some(4.0)], Some(1.0)),
        ]))
        .unwrap();
        let picked = out.take(&[1]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked.value_columns[1].values, vec![Some(4_000_000)]);
        assert_eq!(picked.pct_of_gdp, vec![Some(1.0)]);
    }
}
