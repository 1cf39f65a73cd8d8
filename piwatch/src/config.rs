//! Config
//!
//! Session configuration fetched once from the aggregator at startup.
//! The node list is materialized from it and stays fixed for the whole
//! session; its declaration order also fixes feed processing order.

use serde::Deserialize;
use serde_json::Value;

/// Fallback when the configured refresh interval is absent or nonpositive.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NodeConfig {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub link: bool,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub piholes: Vec<NodeConfig>,
    // Kept raw so a malformed value degrades to the default instead of
    // failing the whole config.
    #[serde(default)]
    refresh_interval: Option<Value>,
    #[serde(default, alias = "show_background_queries")]
    pub show_queries: bool,
}

impl Config {
    /// Summary poll cadence in milliseconds. Absent, non-numeric or
    /// nonpositive values fall back to [`DEFAULT_REFRESH_INTERVAL_MS`].
    pub fn refresh_interval_ms(&self) -> u64 {
        self.refresh_interval
            .as_ref()
            .and_then(Value::as_f64)
            .filter(|v| *v > 0.0)
            .map(|v| v as u64)
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_MS)
    }

    /// Nodes the dashboard shows, in declaration order.
    pub fn enabled_nodes(&self) -> Vec<&NodeConfig> {
        self.piholes.iter().filter(|p| p.enabled).collect()
    }
}
