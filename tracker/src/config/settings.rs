// Tracker settings: built-in defaults, optionally overlaid by a JSON file and
// environment variables.
use crate::error::{Result, TrackerError};
use chrono::NaiveDate;
use serde::Deserialize;
use shared::models::GpuInstance;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "TRACKER_CONFIG";
pub const CSV_PATH_ENV: &str = "TRACKER_CSV_PATH";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrackerSettings {
    /// Region hosting the Price List API; also the region code being priced.
    pub pricing_region: String,
    /// Human-readable AWS location as it appears in product attributes.
    pub location: String,
    pub operating_system: String,
    pub currency: String,
    pub instances: Vec<GpuInstance>,
    /// Earliest month to back-fill.
    pub backfill_start: NaiveDate,
    pub csv_path: PathBuf,
    pub http_timeout_secs: u64,
    /// Overrides `https://api.pricing.<pricing_region>.amazonaws.com`.
    pub endpoint: Option<String>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        TrackerSettings {
            pricing_region: "us-east-1".to_string(),
            location: "US East (N. Virginia)".to_string(),
            operating_system: "Linux".to_string(),
            currency: "USD".to_string(),
            // add Blackwell when AWS announces it
            instances: vec![GpuInstance::new("p5.48xlarge", "H100")],
            backfill_start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            csv_path: PathBuf::from("gpu_prices.csv"),
            http_timeout_secs: 30,
            endpoint: None,
        }
    }
}

impl TrackerSettings {
    /// Defaults, then the JSON file named by `TRACKER_CONFIG`, then `TRACKER_CSV_PATH`.
    pub fn load() -> Result<Self> {
        Self::load_from(|name| std::env::var(name).ok())
    }

    fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = match lookup(CONFIG_PATH_ENV) {
            Some(path) => Self::from_json_file(Path::new(&path))?,
            None => Self::default(),
        };
        if let Some(csv_path) = lookup(CSV_PATH_ENV) {
            settings.csv_path = PathBuf::from(csv_path);
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TrackerError::ConfigError(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| TrackerError::ConfigError(format!("Invalid config JSON: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.instances.is_empty() {
            return Err(TrackerError::ConfigError("at least one instance type must be configured".to_string()));
        }
        if let Some(empty) = self.instances.iter().find(|i| i.instance_type.trim().is_empty()) {
            return Err(TrackerError::ConfigError(format!("instance with GPU '{}' has an empty instance_type", empty.gpu)));
        }
        if self.location.trim().is_empty() {
            return Err(TrackerError::ConfigError("location must not be empty".to_string()));
        }
        if self.http_timeout_secs == 0 {
            return Err(TrackerError::ConfigError("http_timeout_secs must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn api_endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://api.pricing.{}.amazonaws.com", self.pricing_region),
        }
    }
}
