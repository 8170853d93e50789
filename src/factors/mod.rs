use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

const DEFAULT_KEY: &str = "default";

/// Lookup table with a mandatory fallback for unknown keys.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorMap {
    entries: HashMap<String, f64>,
    default: f64,
}

impl FactorMap {
    pub fn new(default: f64) -> Self {
        Self {
            entries: HashMap::new(),
            default,
        }
    }

    pub fn with(mut self, key: impl Into<String>, factor: f64) -> Self {
        self.entries.insert(key.into(), factor);
        self
    }

    pub fn get(&self, key: &str) -> f64 {
        self.entries.get(key).copied().unwrap_or(self.default)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn from_raw(table: &str, raw: HashMap<String, f64>, lowercase_keys: bool) -> Result<Self> {
        let mut entries = HashMap::with_capacity(raw.len());
        let mut default = None;

        for (key, factor) in raw {
            if !factor.is_finite() || factor < 0.0 {
                return Err(Error::Config(format!(
                    "{} factor for {:?} must be a non-negative number, got {}",
                    table, key, factor
                )));
            }
            if key == DEFAULT_KEY {
                default = Some(factor);
                continue;
            }
            let key = if lowercase_keys { key.to_lowercase() } else { key };
            entries.insert(key, factor);
        }

        let default = default.ok_or_else(|| {
            Error::Config(format!("{} factor table has no \"default\" entry", table))
        })?;

        Ok(Self { entries, default })
    }
}

/// Service (kg CO2 per USD) and regional grid-intensity multipliers.
///
/// Region keys are stored lowercased; service keys match exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorTable {
    service: FactorMap,
    region: FactorMap,
}

#[derive(Deserialize)]
struct FactorFile {
    service: HashMap<String, f64>,
    region: HashMap<String, f64>,
}

impl FactorTable {
    pub fn new(service: FactorMap, region: FactorMap) -> Self {
        let region = FactorMap {
            entries: region
                .entries
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
            default: region.default,
        };
        Self { service, region }
    }

    pub fn builtin() -> Self {
        let service = FactorMap::new(0.30)
            .with("Microsoft.Compute/virtualMachines", 0.45)
            .with("Microsoft.Storage/storageAccounts", 0.15)
            .with("Microsoft.ContainerService/managedClusters", 0.55)
            .with("Microsoft.Sql/servers", 0.25)
            .with("Microsoft.Web/serverFarms", 0.35);

        let region = FactorMap::new(0.40)
            .with("eastus", 0.45)
            .with("westus", 0.35)
            .with("northeurope", 0.25)
            .with("westeurope", 0.30)
            .with("southeastasia", 0.55);

        Self::new(service, region)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FactorFile = toml::from_str(content)?;
        Ok(Self {
            service: FactorMap::from_raw("service", file.service, false)?,
            region: FactorMap::from_raw("region", file.region, true)?,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read factor file {}: {}", path.display(), e))
        })?;
        let table = Self::from_toml_str(&content)?;
        tracing::info!(
            "Loaded {} service and {} region factors from {}",
            table.service.len(),
            table.region.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn service_factor(&self, service_name: &str) -> f64 {
        self.service.get(service_name)
    }

    pub fn region_factor(&self, location: &str) -> f64 {
        self.region.get(&location.to_lowercase())
    }
}

impl Default for FactorTable {
    fn default() -> Self {
        Self::builtin()
    }
}
