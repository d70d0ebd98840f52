//! Country-group expansion.
//!
//! Turns country-to-country rows into four row sets: country→group,
//! group→country, group→group and the original country→country rows.
//! A group never counts trade with its own members, and two groups that
//! share any member are never paired.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};
use tradeflow_core::{CountryGroup, Membership, Result, TradeRow, TradeTable, Year};

/// Add `values` into `acc`, skipping missing cells.
///
/// A cell stays missing until at least one contribution is present.
pub fn accumulate(acc: &mut [Option<f64>], values: &[Option<f64>]) {
    for (slot, value) in acc.iter_mut().zip(values) {
        if let Some(v) = value {
            *slot = Some(slot.unwrap_or(0.0) + v);
        }
    }
}

/// Group lookups with the pairwise overlap relation precomputed.
#[derive(Debug, Clone)]
pub struct GroupIndex {
    groups: Vec<CountryGroup>,
    /// ISO3 -> indices of the groups containing it, ascending.
    by_iso3: HashMap<String, Vec<usize>>,
    /// `overlap[a * n + b]` is true when groups `a` and `b` share a member.
    overlap: Vec<bool>,
}

impl GroupIndex {
    /// Build the index; groups are ordered by name.
    pub fn new(groups: &[CountryGroup], membership: &[Membership]) -> Self {
        let mut groups = groups.to_vec();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        let position: HashMap<&str, usize> = groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.name.as_str(), i))
            .collect();

        let mut by_iso3: HashMap<String, Vec<usize>> = HashMap::new();
        for edge in membership {
            if let Some(&g) = position.get(edge.group.as_str()) {
                by_iso3.entry(edge.iso3.clone()).or_default().push(g);
            }
        }
        for indices in by_iso3.values_mut() {
            indices.sort_unstable();
            indices.dedup();
        }

        let n = groups.len();
        let mut overlap = vec![false; n * n];
        for a in 0..n {
            for b in 0..n {
                overlap[a * n + b] = !groups[a].is_disjoint(&groups[b]);
            }
        }

        Self {
            groups,
            by_iso3,
            overlap,
        }
    }

    /// Build the index from groups alone, deriving the membership relation.
    pub fn from_groups(groups: &[CountryGroup]) -> Self {
        let membership: Vec<Membership> = groups
            .iter()
            .flat_map(|g| {
                g.members.iter().map(move |iso3| Membership {
                    iso3: iso3.clone(),
                    group: g.name.clone(),
                })
            })
            .collect();
        Self::new(groups, &membership)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn name(&self, group: usize) -> &str {
        &self.groups[group].name
    }

    /// Indices of the groups containing `iso3`.
    pub fn groups_of(&self, iso3: &str) -> &[usize] {
        self.by_iso3.get(iso3).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_member(&self, iso3: &str, group: usize) -> bool {
        self.groups[group].contains(iso3)
    }

    /// Whether groups `a` and `b` share at least one member.
    pub fn overlaps(&self, a: usize, b: usize) -> bool {
        self.overlap[a * self.groups.len() + b]
    }
}

type CountryToGroupKey = (Year, String, String, String, usize);
type GroupToCountryKey = (Year, String, usize, String, String);
type GroupToGroupKey = (Year, String, usize, usize);
type CountryToCountryKey = (Year, String, String, String, String, String);

/// Expands country rows into group aggregates.
pub struct GroupExpander<'a> {
    index: &'a GroupIndex,
}

impl<'a> GroupExpander<'a> {
    /// Create a new expander.
    pub fn new(index: &'a GroupIndex) -> Self {
        Self { index }
    }

    /// Produce the union of the four row sets, each summed by its key.
    ///
    /// Rows lacking an ISO3 code on either side are not country pairs and
    /// are skipped.
    pub fn expand(&self, table: TradeTable) -> Result<TradeTable> {
        info!("Adding country groups ({} groups)", self.index.len());
        let value_columns = table.value_columns().to_vec();
        let width = value_columns.len();

        let mut country_to_group: BTreeMap<CountryToGroupKey, Vec<Option<f64>>> = BTreeMap::new();
        let mut group_to_country: BTreeMap<GroupToCountryKey, Vec<Option<f64>>> = BTreeMap::new();
        let mut group_to_group: BTreeMap<GroupToGroupKey, Vec<Option<f64>>> = BTreeMap::new();
        let mut country_to_country: BTreeMap<CountryToCountryKey, Vec<Option<f64>>> = BTreeMap::new();
        let mut skipped = 0usize;

        for row in table.rows() {
            let (Some(exporter_iso3), Some(importer_iso3)) = (&row.exporter_iso3, &row.importer_iso3) else {
                skipped += 1;
                continue;
            };
            let exporter_groups = self.index.groups_of(exporter_iso3);
            let importer_groups = self.index.groups_of(importer_iso3);

            for &g in importer_groups {
                if self.index.is_member(exporter_iso3, g) {
                    continue;
                }
                let key = (
                    row.year,
                    row.category.clone(),
                    row.exporter.clone(),
                    exporter_iso3.clone(),
                    g,
                );
                accumulate(country_to_group.entry(key).or_insert_with(|| vec![None; width]), &row.values);
            }

            for &g in exporter_groups {
                if self.index.is_member(importer_iso3, g) {
                    continue;
                }
                let key = (
                    row.year,
                    row.category.clone(),
                    g,
                    row.importer.clone(),
                    importer_iso3.clone(),
                );
                accumulate(group_to_country.entry(key).or_insert_with(|| vec![None; width]), &row.values);
            }

            for &ge in exporter_groups {
                for &gi in importer_groups {
                    if self.index.overlaps(ge, gi) {
                        continue;
                    }
                    let key = (row.year, row.category.clone(), ge, gi);
                    accumulate(group_to_group.entry(key).or_insert_with(|| vec![None; width]), &row.values);
                }
            }

            let key = (
                row.year,
                row.category.clone(),
                exporter_iso3.clone(),
                row.exporter.clone(),
                importer_iso3.clone(),
                row.importer.clone(),
            );
            accumulate(country_to_country.entry(key).or_insert_with(|| vec![None; width]), &row.values);
        }

        if skipped > 0 {
            debug!("Skipped {} rows that are not country pairs", skipped);
        }
        info!(
            "Group expansion: {} country->group, {} group->country, {} group->group, {} country->country",
            country_to_group.len(),
            group_to_country.len(),
            group_to_group.len(),
            country_to_country.len()
        );

        let mut rows = Vec::with_capacity(
            country_to_group.len() + group_to_country.len() + group_to_group.len() + country_to_country.len(),
        );

        for ((year, category, exporter, exporter_iso3, g), values) in country_to_group {
            rows.push(TradeRow {
                year,
                exporter_iso3: Some(exporter_iso3),
                exporter,
                importer_iso3: None,
                importer: self.index.name(g).to_string(),
                category,
                values,
                pct_of_gdp_exporter: None,
                pct_of_gdp_importer: None,
            });
        }
        for ((year, category, g, importer, importer_iso3), values) in group_to_country {
            rows.push(TradeRow {
                year,
                exporter_iso3: None,
                exporter: self.index.name(g).to_string(),
                importer_iso3: Some(importer_iso3),
                importer,
                category,
                values,
                pct_of_gdp_exporter: None,
                pct_of_gdp_importer: None,
            });
        }
        for ((year, category, ge, gi), values) in group_to_group {
            rows.push(TradeRow {
                year,
                exporter_iso3: None,
                exporter: self.index.name(ge).to_string(),
                importer_iso3: None,
                importer: self.index.name(gi).to_string(),
                category,
                values,
                pct_of_gdp_exporter: None,
                pct_of_gdp_importer: None,
            });
        }
        for ((year, category, exporter_iso3, exporter, importer_iso3, importer), values) in country_to_country {
            rows.push(TradeRow {
                year,
                exporter_iso3: Some(exporter_iso3),
                exporter,
                importer_iso3: Some(importer_iso3),
                importer,
                category,
                values,
                pct_of_gdp_exporter: None,
                pct_of_gdp_importer: None,
            });
        }

        TradeTable::new(value_columns, rows)
    }
}
