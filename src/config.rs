use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ProbeError, Result};
use crate::report::ReportFormat;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProbeConfig {
    /// Ports or service names every host is probed on.
    #[serde(default = "default_ports")]
    pub ports: Vec<String>,
    /// Number of rounds.
    #[serde(default = "default_queries")]
    pub queries: u32,
    /// Per-attempt timeout in milliseconds; 0 disables it.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Minimum spacing between attempts in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub sort: bool,
    #[serde(default)]
    pub machine: bool,
    /// Hosts to probe, before any given on the command line.
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_ports() -> Vec<String> {
    vec!["80".to_string()]
}

fn default_queries() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_delay_ms() -> u64 {
    25
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ports: default_ports(),
            queries: default_queries(),
            timeout_ms: default_timeout_ms(),
            delay_ms: default_delay_ms(),
            sort: false,
            machine: false,
            targets: Vec::new(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl ProbeConfig {
    /// Load a JSON config file; absent keys take their defaults.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProbeError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: ProbeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(ProbeError::config(format!(
                "invalid log level: {}. Valid levels are: trace, debug, info, warn, error",
                self.log_level
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.queries == 0 {
            return Err(ProbeError::config("queries must be a positive integer"));
        }
        if self.ports.is_empty() {
            return Err(ProbeError::config("at least one port is required"));
        }
        self.get_tracing_level().map(|_| ())
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn report_format(&self) -> ReportFormat {
        if self.machine {
            ReportFormat::Machine
        } else {
            ReportFormat::Human
        }
    }
}
