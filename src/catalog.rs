use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::types::CatalogEntry;

/// One record of the on-disk catalog file.
#[derive(Debug, Deserialize)]
struct CatalogRecord {
    name: String,
    address: String,
    rarity_score: f64,
    rating_rank: u32,
}

/// Static rarity metadata keyed by item name, independent of live polling.
///
/// Loaded once at process start, read-only afterward.
pub struct Catalog {
    entries: HashMap<String, CatalogEntry>,
}

impl Catalog {
    /// Load the catalog from a JSON file (an array of name/address/
    /// rarity_score/rating_rank records).
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let records: Vec<CatalogRecord> = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse catalog {}", path.display()))?;

        let catalog = Self::from_records(records);
        info!("Loaded catalog with {} items", catalog.len());
        Ok(catalog)
    }

    fn from_records(records: Vec<CatalogRecord>) -> Self {
        let entries = records
            .into_iter()
            .map(|r| {
                (
                    r.name,
                    CatalogEntry {
                        address: r.address,
                        rarity_score: r.rarity_score,
                        rating_rank: r.rating_rank,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Build a catalog directly from (name, entry) pairs.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, CatalogEntry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_catalog_records() {
        let records: Vec<CatalogRecord> = serde_json::from_value(json!([
            {
                "name": "TON PUNK #1",
                "address": "EQpunk1",
                "rarity_score": 35.16,
                "rating_rank": 4202
            },
            {
                "name": "TON PUNK #2",
                "address": "EQpunk2",
                "rarity_score": 120.5,
                "rating_rank": 17
            }
        ]))
        .unwrap();
        let catalog = Catalog::from_records(records);
        assert_eq!(catalog.len(), 2);

        let entry = catalog.get("TON PUNK #2").unwrap();
        assert_eq!(entry.rating_rank, 17);
        assert_eq!(entry.address, "EQpunk2");
        assert!(catalog.get("TON PUNK #3").is_none());
    }
}
