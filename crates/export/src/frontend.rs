//! `inputValues.js` for the visualization frontend.

use crate::units::OptimizedTable;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::info;
use tradeflow_core::Result;

/// Selector values exposed to the frontend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputValues {
    /// `[min year, max year]`.
    pub time_range: Vec<String>,
    pub countries: Vec<String>,
    pub groups: Vec<String>,
    pub categories: Vec<String>,
}

impl InputValues {
    /// Collect values from the final table and the configured group names.
    pub fn from_table(table: &OptimizedTable, group_names: &[String]) -> Self {
        let time_range = match (table.year.iter().min(), table.year.iter().max()) {
            (Some(min), Some(max)) => vec![min.to_string(), max.to_string()],
            _ => Vec::new(),
        };
        let countries: BTreeSet<&String> = table.country.iter().collect();
        let categories: BTreeSet<&String> = table.category.iter().collect();
        let groups: BTreeSet<&String> = group_names.iter().collect();

        Self {
            time_range,
            countries: countries.into_iter().cloned().collect(),
            groups: groups.into_iter().cloned().collect(),
            categories: categories.into_iter().cloned().collect(),
        }
    }

    /// Render the four `export const` arrays.
    pub fn render(&self) -> String {
        [
            js_array("maxTimeRange", &self.time_range),
            js_array("countryOptions", &self.countries),
            js_array("countryGroups", &self.groups),
            js_array("productCategories", &self.categories),
        ]
        .join("\n")
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.render())?;
        info!("Saved input values file to {}", path.display());
        Ok(())
    }
}

fn js_array(name: &str, items: &[String]) -> String {
    let body = items
        .iter()
        .map(|item| format!("  \"{item}\""))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("export const {name} = [\n{body}\n];")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradeflow_core::Flow;

    fn table() -> OptimizedTable {
        OptimizedTable {
            year: vec![2021, 2019, 2020],
            country: vec!["France".to_string(), "EU".to_string(), "France".to_string()],
            partner: vec!["EU".to_string(), "France".to_string(), "EU".to_string()],
            flow: vec![Flow::Exports; 3],
            category: vec!["Minerals".to_string(), "Agriculture".to_string(), "All products".to_string()],
            value_columns: Vec::new(),
            pct_of_gdp: vec![None; 3],
        }
    }

    #[test]
    fn test_values_sorted_and_unique() {
        let values = InputValues::from_table(&table(), &["G7".to_string(), "EU".to_string()]);
        assert_eq!(values.time_range, vec!["2019", "2021"]);
        assert_eq!(values.countries, vec!["EU", "France"]);
        assert_eq!(values.groups, vec!["EU", "G7"]);
        assert_eq!(values.categories, vec!["Agriculture", "All products", "Minerals"]);
    }

    #[test]
    fn test_render() {
        let values = InputValues {
            time_range: vec!["2002".to_string(), "2023".to_string()],
            countries: vec!["France".to_string()],
            groups: vec!["EU".to_string(), "G7".to_string()],
            categories: Vec::new(),
        };
        let expected = "export const maxTimeRange = [\n  \"2002\",\n  \"2023\"\n];\n\
                        export const countryOptions = [\n  \"France\"\n];\n\
                        export const countryGroups = [\n  \"EU\",\n  \"G7\"\n];\n\
                        export const productCategories = [\n\n];";
        assert_eq!(values.render(), expected);
    }

    #[test]
    fn test_write_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("components").join("inputValues.js");
        InputValues::default().write(&path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("export const maxTimeRange = ["));
    }
}
