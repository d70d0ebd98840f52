//! Static lookup tables: HS sections, BACI country codes and country groups.
//!
//! Loaded once per run and shared read-only by every later stage.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use tracing::{info, warn};
use tradeflow_core::{CountryGroup, Error, Membership, Paths, PipelineConfig, Result};

/// Names for codes that no longer exist in the country table.
const HISTORICAL_NAMES: &[(&str, &str)] = &[
    ("SCG", "Serbia and Montenegro"),
    ("ANT", "Netherlands Antilles"),
    ("S19", "Asia, not else specified"),
];

/// One line of the BACI country code table.
#[derive(Debug, Deserialize)]
struct CountryCodeRow {
    country_code: u32,
    country_name: String,
    #[serde(default)]
    country_iso3: Option<String>,
}

/// All lookups required by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Mappings {
    /// Two-digit HS chapter -> section (category) name.
    product_code_to_section: HashMap<String, String>,
    /// BACI numeric code -> ISO3.
    country_code_to_iso3: HashMap<u32, String>,
    /// ISO3 -> country name.
    iso3_to_name: HashMap<String, String>,
    /// Lowercased country name -> ISO3, first listed code wins.
    name_to_iso3: HashMap<String, String>,
    /// Groups sorted by name.
    groups: Vec<CountryGroup>,
}

impl Mappings {
    /// Load every mapping file from disk.
    pub fn load(paths: &Paths, pipeline: &PipelineConfig) -> Result<Self> {
        info!("Loading mappings");
        let sections = read_hs_sections(File::open(paths.hs_sections())?)?;
        let codes = read_country_codes(File::open(paths.country_codes(&pipeline.baci_version))?)?;
        let groups = read_country_groups(File::open(paths.country_groups())?)?;
        let mappings = Self::from_parts(sections, codes, groups);
        info!(
            "Loaded {} product codes, {} countries, {} groups",
            mappings.product_code_to_section.len(),
            mappings.country_code_to_iso3.len(),
            mappings.groups.len()
        );
        Ok(mappings)
    }

    /// Assemble mappings from already-parsed tables.
    ///
    /// `sections` maps category name to its two-digit product codes, `codes`
    /// holds `(numeric code, name, iso3)` triples.
    pub fn from_parts(
        sections: BTreeMap<String, Vec<String>>,
        codes: Vec<(u32, String, String)>,
        groups: Vec<CountryGroup>,
    ) -> Self {
        let mut product_code_to_section = HashMap::new();
        for (category, product_codes) in sections {
            for code in product_codes {
                if let Some(previous) = product_code_to_section.insert(code.clone(), category.clone()) {
                    warn!("Product code {} listed under both {} and {}", code, previous, category);
                }
            }
        }

        let mut country_code_to_iso3 = HashMap::new();
        let mut iso3_to_name = HashMap::new();
        let mut name_to_iso3: HashMap<String, String> = HashMap::new();
        for (code, name, iso3) in codes {
            let iso3 = iso3.trim().to_uppercase();
            if iso3.is_empty() {
                continue;
            }
            let name = name.trim().to_string();
            match name_to_iso3.get(&name.to_lowercase()) {
                Some(first) if *first != iso3 => {
                    warn!("Country name {} used by both {} and {}", name, first, iso3);
                }
                Some(_) => {}
                None => {
                    name_to_iso3.insert(name.to_lowercase(), iso3.clone());
                }
            }
            country_code_to_iso3.insert(code, iso3.clone());
            iso3_to_name.insert(iso3, name);
        }

        let mut groups = groups;
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        for group in groups.iter().filter(|g| g.members.is_empty()) {
            warn!("Country group {} has no members", group.name);
        }

        Self {
            product_code_to_section,
            country_code_to_iso3,
            iso3_to_name,
            name_to_iso3,
            groups,
        }
    }

    /// Category for a six-digit product code (by its first two digits).
    pub fn category_for_product(&self, product_code: &str) -> Option<&str> {
        let chapter = product_code.trim().get(..2)?;
        self.product_code_to_section.get(chapter).map(String::as_str)
    }

    /// ISO3 for a BACI numeric country code.
    pub fn iso3_for_code(&self, code: u32) -> Option<&str> {
        self.country_code_to_iso3.get(&code).map(String::as_str)
    }

    /// ISO3 for a country name as spelled in the country table, ignoring case.
    pub fn iso3_for_name(&self, name: &str) -> Option<&str> {
        self.name_to_iso3
            .get(&name.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Display name for an ISO3 code, falling back to the code itself.
    pub fn display_name(&self, iso3: &str) -> String {
        if let Some(name) = self.iso3_to_name.get(iso3) {
            return name.clone();
        }
        HISTORICAL_NAMES
            .iter()
            .find(|(code, _)| *code == iso3)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| iso3.to_string())
    }

    /// Groups sorted by name.
    pub fn groups(&self) -> &[CountryGroup] {
        &self.groups
    }

    /// Group names sorted alphabetically.
    pub fn group_names(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.name.clone()).collect()
    }

    /// Flat `iso3 -> group` relation.
    pub fn membership(&self) -> Vec<Membership> {
        self.groups
            .iter()
            .flat_map(|g| {
                g.members.iter().map(move |iso3| Membership {
                    iso3: iso3.clone(),
                    group: g.name.clone(),
                })
            })
            .collect()
    }
}

/// Parse `{category: [two-digit code, ...]}`.
pub fn read_hs_sections<R: Read>(reader: R) -> Result<BTreeMap<String, Vec<String>>> {
    let sections: BTreeMap<String, Vec<String>> = serde_json::from_reader(BufReader::new(reader))?;
    if sections.is_empty() {
        return Err(Error::mapping("HS section mapping is empty"));
    }
    Ok(sections)
}

/// Parse the BACI country code table into `(code, name, iso3)` triples.
pub fn read_country_codes<R: Read>(reader: R) -> Result<Vec<(u32, String, String)>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut codes = Vec::new();
    for row in csv.deserialize::<CountryCodeRow>() {
        let row = row?;
        if let Some(iso3) = row.country_iso3.filter(|s| !s.is_empty()) {
            codes.push((row.country_code, row.country_name, iso3));
        }
    }
    Ok(codes)
}

/// Parse `{group: [iso3, ...]}`.
pub fn read_country_groups<R: Read>(reader: R) -> Result<Vec<CountryGroup>> {
    let raw: BTreeMap<String, Vec<String>> = serde_json::from_reader(BufReader::new(reader))?;
    Ok(raw
        .into_iter()
        .map(|(name, members)| CountryGroup::new(name, members))
        .collect())
}
