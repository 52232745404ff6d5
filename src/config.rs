//! Layered configuration: defaults, then an optional JSON file, then environment.
//!
//! Environment variables:
//! - `ETL_MONITOR_BACKEND_URL` / `ETL_MONITOR_BACKEND_TOKEN` - ETL backend
//! - `ETL_MONITOR_SUMMARY_URL` / `ETL_MONITOR_SUMMARY_TOKEN` - summary analytics upstream
//! - `ETL_MONITOR_MOCK_FALLBACK` - serve mock summary data when the upstream fails
//! - `ETL_MONITOR_API_KEY` - key required by the proxy server (optional)
//! - `ETL_MONITOR_CORS_ORIGINS` - comma-separated allowed origins for the proxy server

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use etl_monitor_core::mock::DEFAULT_SEED;

const APP_NAME: &str = "etl-monitor";
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_SUMMARY_URL: &str = "http://localhost:8001/api/sas";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Base URL of the ETL backend, without trailing slash.
    pub backend_url: String,
    pub backend_token: Option<String>,
    /// Base URL of the summary analytics upstream.
    pub summary_url: String,
    pub summary_token: Option<String>,
    /// Serve deterministic mock data when the summary upstream fails.
    pub mock_fallback: bool,
    /// Seed of the mock data. Same seed, same rows.
    pub mock_seed: u32,
    pub api_key: Option<String>,
    pub cors_origins: Option<Vec<String>>,
    pub poll: PollSettings,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            backend_token: None,
            summary_url: DEFAULT_SUMMARY_URL.to_string(),
            summary_token: None,
            mock_fallback: true,
            mock_seed: DEFAULT_SEED,
            api_key: None,
            cors_origins: None,
            poll: PollSettings::default(),
        }
    }
}

/// Timing of the orchestration poller and the background auto-refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_secs: u64,
    /// Consecutive polls of one job before giving up with a timeout.
    pub max_attempts: u32,
    pub refresh_interval_secs: u64,
    /// Rows fetched from each job's log feed on refresh.
    pub log_limit: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            max_attempts: 180,
            refresh_interval_secs: 3,
            log_limit: 10,
        }
    }
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

impl MonitorConfig {
    /// Load from `path` (or the default location) and the process environment.
    ///
    /// A missing or unreadable file yields defaults; environment variables always win.
    pub fn load(path: Option<&Path>) -> Self {
        let mut config = match Self::try_load_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn try_load_file(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("ETL_MONITOR_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Some(token) = lookup("ETL_MONITOR_BACKEND_TOKEN") {
            self.backend_token = Some(token);
        }
        if let Some(url) = lookup("ETL_MONITOR_SUMMARY_URL") {
            self.summary_url = url;
        }
        if let Some(token) = lookup("ETL_MONITOR_SUMMARY_TOKEN") {
            self.summary_token = Some(token);
        }
        if let Some(flag) = lookup("ETL_MONITOR_MOCK_FALLBACK") {
            match parse_bool(&flag) {
                Some(enabled) => self.mock_fallback = enabled,
                None => tracing::warn!("Ignoring ETL_MONITOR_MOCK_FALLBACK={:?}", flag),
            }
        }
        if let Some(key) = lookup("ETL_MONITOR_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(origins) = lookup("ETL_MONITOR_CORS_ORIGINS") {
            self.cors_origins = Some(
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }

        self.backend_url = self.backend_url.trim_end_matches('/').to_string();
        self.summary_url = self.summary_url.trim_end_matches('/').to_string();
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let mut path =
        dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}
