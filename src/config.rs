//! Application settings, read from an optional JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::source::yahoo::DEFAULT_BASE_URL;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "RUSTY_FORECAST_CONFIG";

/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "rusty-forecast.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Yahoo,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub default_ticker: String,
    pub default_start: NaiveDate,
    pub source: SourceKind,
    /// Folder searched by the local-file source.
    pub data_dir: PathBuf,
    pub yahoo_base_url: String,
    pub request_timeout_secs: u64,
    /// Zero disables the price cache.
    pub cache_ttl_secs: u64,
    /// Zero runs the forecast inline with no timeout.
    pub forecast_timeout_secs: u64,
    pub tail_rows: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_ticker: "AAPL".to_string(),
            default_start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            source: SourceKind::Yahoo,
            data_dir: PathBuf::from("sample_data"),
            yahoo_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
            cache_ttl_secs: 3600,
            forecast_timeout_secs: 120,
            tail_rows: crate::present::TAIL_ROWS,
        }
    }
}

impl AppConfig {
    /// Load from `$RUSTY_FORECAST_CONFIG`, else `./rusty-forecast.json`,
    /// else defaults.
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::from_file(local);
        }
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn forecast_timeout(&self) -> Option<Duration> {
        (self.forecast_timeout_secs > 0).then(|| Duration::from_secs(self.forecast_timeout_secs))
    }
}
