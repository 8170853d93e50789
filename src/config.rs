use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_CONTAINER: &str = "carbon-emissions";
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub subscription_id: Option<String>,
    pub output_dir: PathBuf,
    pub container: String,
    pub storage_account: Option<String>,
    pub factors_file: Option<PathBuf>,
    pub lookback_days: u32,
    pub demo_seed: u64,
    pub management_endpoint: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let subscription_id = env::var("AZURE_SUBSCRIPTION_ID")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let output_dir = env::var("CARBON_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("output"));

        let container = env::var("CARBON_CONTAINER")
            .unwrap_or_else(|_| DEFAULT_CONTAINER.to_string());

        let storage_account = env::var("CARBON_STORAGE_ACCOUNT")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let factors_file = env::var("CARBON_FACTORS_FILE").ok().map(PathBuf::from);

        let lookback_days = match env::var("CARBON_LOOKBACK_DAYS") {
            Ok(v) => v.parse().map_err(|_| {
                Error::Config(format!("CARBON_LOOKBACK_DAYS must be a whole number, got {:?}", v))
            })?,
            Err(_) => 30,
        };

        let demo_seed = env::var("CARBON_DEMO_SEED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(42);

        let management_endpoint = env::var("AZURE_MANAGEMENT_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_MANAGEMENT_ENDPOINT.to_string());

        Ok(Self {
            subscription_id,
            output_dir,
            container,
            storage_account,
            factors_file,
            lookback_days,
            demo_seed,
            management_endpoint,
        })
    }

    pub fn json_path(&self) -> PathBuf {
        self.output_dir.join("carbon_data.json")
    }

    pub fn csv_path(&self) -> PathBuf {
        self.output_dir.join("carbon_data.csv")
    }
}

#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub json_path: PathBuf,
    pub csv_path: PathBuf,
}

impl From<&Config> for ExtractConfig {
    fn from(config: &Config) -> Self {
        Self {
            json_path: config.json_path(),
            csv_path: config.csv_path(),
        }
    }
}
