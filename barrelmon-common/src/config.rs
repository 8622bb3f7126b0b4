use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{HarnessError, Result};

/// Public deployment of the Barrel Monitor API.
pub const DEFAULT_BASE_URL: &str = "https://to-barrel-monitor.azurewebsites.net";

/// Environment variable overriding `api.base_url`.
pub const ENV_BASE_URL: &str = "API_BASE_URL";
/// Environment variable overriding `api.timeout_secs`.
pub const ENV_TIMEOUT: &str = "API_TIMEOUT";

/// Everything a scenario reads before it starts. Built once and passed by reference.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub api: ApiConfig,
    pub performance: PerformanceConfig,
    pub load_testing: LoadTestingConfig,
    pub ddos_protection: DdosProtectionConfig,
    pub test_data: TestDataConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE_URL.to_string(), timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub batch_sizes: Vec<usize>,
    pub concurrent_users: Vec<usize>,
    pub thresholds: Thresholds,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            batch_sizes: vec![1, 5, 10],
            concurrent_users: vec![1, 3, 5],
            thresholds: Thresholds::default(),
        }
    }
}

/// Pass/fail policy applied to a finished report. Rates are percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub max_error_rate: f64,
    pub min_requests_per_second: f64,
    pub min_success_rate: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { max_error_rate: 5.0, min_requests_per_second: 0.0, min_success_rate: 70.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadTestingConfig {
    pub duration_secs: u64,
    pub workers: usize,
    /// Workload profile name: read-heavy | balanced | write-heavy | create-only
    pub workload: String,
    pub progress_interval_secs: u64,
}

impl Default for LoadTestingConfig {
    fn default() -> Self {
        Self {
            duration_secs: 10,
            workers: 4,
            workload: "balanced".to_string(),
            progress_interval_secs: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DdosProtectionConfig {
    pub enabled: bool,
    pub rate_limit_tests: Vec<RateLimitTest>,
}

/// One paced burst: a single producer issuing `requests_per_second` for `duration_secs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitTest {
    pub name: String,
    pub requests_per_second: u32,
    pub duration_secs: u64,
}

impl Default for RateLimitTest {
    fn default() -> Self {
        Self { name: "burst_test".to_string(), requests_per_second: 10, duration_secs: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestDataConfig {
    pub dirt_level_range: [f64; 2],
    pub weight_range: [f64; 2],
}

impl Default for TestDataConfig {
    fn default() -> Self {
        Self { dirt_level_range: [0.0, 100.0], weight_range: [10.0, 500.0] }
    }
}

impl HarnessConfig {
    /// Load a YAML configuration file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&contents)
            .map_err(|e| HarnessError::Config(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse a YAML document. An empty document yields the defaults.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents).map_err(|e| HarnessError::Config(e.to_string()))
    }

    /// Apply `API_BASE_URL` / `API_TIMEOUT` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup; values found take priority over the file.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.api.base_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT) {
            self.api.timeout_secs = raw.trim().parse().map_err(|_| {
                HarnessError::Config(format!("{ENV_TIMEOUT} must be a whole number of seconds, got {raw:?}"))
            })?;
        }
        Ok(())
    }
}
