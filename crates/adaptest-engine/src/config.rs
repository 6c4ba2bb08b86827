//! Engine configuration.
//!
//! One TOML file (`adaptest.toml`) carries every tunable: estimator bounds,
//! selector stopping rules, validity thresholds, and session cadence. Any
//! omitted section falls back to its default.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use adaptest_core::irt::EstimatorConfig;
use adaptest_core::selector::SelectorConfig;
use adaptest_core::thresholds::ValidityThresholds;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "adaptest.toml";

/// Top-level adaptest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum seconds between a completed session and the next start.
    /// Zero disables the cadence guard.
    #[serde(default = "default_cadence")]
    pub session_cadence_secs: i64,
    /// Width in days of each trend window in validity reports.
    #[serde(default = "default_trend_window")]
    pub trend_window_days: i64,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub thresholds: ValidityThresholds,
}

fn default_cadence() -> i64 {
    0
}

fn default_trend_window() -> i64 {
    7
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_cadence_secs: default_cadence(),
            trend_window_days: default_trend_window(),
            estimator: EstimatorConfig::default(),
            selector: SelectorConfig::default(),
            thresholds: ValidityThresholds::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from an explicit path, from `./adaptest.toml` if
    /// present, or fall back to defaults.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = Path::new(CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default.to_path_buf()
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("invalid config TOML: {}", path.display()))
    }
}
