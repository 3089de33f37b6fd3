use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::scoring::ingest::DuplicatePolicy;
use crate::scoring::score::WeightTable;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub scoring: ScoringConfig,
    pub database: DatabaseConfig,
    pub bands: BandConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScoringConfig {
    /// Category slug to weight. Categories missing here are scored but never
    /// contribute to the overall score.
    pub weights: BTreeMap<String, f64>,
    pub duplicate_policy: DuplicatePolicy,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub catalog_csv: Option<String>,
}

/// Overall-score thresholds for the health band label.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BandConfig {
    pub good: u8,
    pub needs_improvement: u8,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let weights = [
            ("seo", 0.25),
            ("performance", 0.25),
            ("accessibility", 0.2),
            ("security", 0.2),
            ("best_practices", 0.1),
        ]
        .into_iter()
        .map(|(slug, w)| (slug.to_string(), w))
        .collect();
        Self {
            weights,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/auditscore.db".into(),
            catalog_csv: None,
        }
    }
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            good: 90,
            needs_improvement: 50,
        }
    }
}

impl ScoringConfig {
    pub fn weight_table(&self) -> WeightTable {
        WeightTable::from_map(&self.weights)
    }
}

impl Config {
    /// Load config from a TOML file. Falls back to defaults if file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml(&contents) {
                Ok(config) => {
                    tracing::info!("Config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}
