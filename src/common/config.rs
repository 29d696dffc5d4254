//! Configuration file handling
//!
//! Settings come from an optional `casekit.toml` next to the crate under
//! test, then a handful of environment variables on top.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use super::{Error, Result};

/// Name of the configuration file looked up in the manifest directory
const CONFIG_FILE: &str = "casekit.toml";

/// Environment variable pointing at an explicit configuration file
const CONFIG_ENV: &str = "CASEKIT_CONFIG";

/// Environment variable overriding the per-test timeout, in seconds
const TIMEOUT_ENV: &str = "CASEKIT_TIMEOUT";

static GLOBAL: OnceLock<Config> = OnceLock::new();

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Benchmark settings
    #[serde(default)]
    pub bench: BenchConfig,
}

/// When pass/fail markers are colored
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColorChoice {
    /// Color when the terminal supports it
    #[default]
    Auto,
    /// Always emit color escape codes
    Always,
    /// Never emit color escape codes
    Never,
}

/// Output settings
#[derive(Debug, Deserialize, Default, Clone)]
pub struct OutputConfig {
    /// Marker coloring
    #[serde(default)]
    pub color: ColorChoice,
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Timeouts {
    /// Deadline for a whole test, reported by `deadline()`. No deadline when unset.
    #[serde(default)]
    pub test_secs: Option<u64>,
}

/// Benchmark settings
#[derive(Debug, Deserialize, Clone)]
pub struct BenchConfig {
    /// Target measuring time per benchmark
    #[serde(default = "default_bench_time")]
    pub time_ms: u64,

    /// Upper bound on iterations for a single run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            time_ms: default_bench_time(),
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_bench_time() -> u64 {
    1000
}
fn default_max_iterations() -> u64 {
    1_000_000_000
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if no file exists. Environment
    /// overrides are applied in both cases.
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, &e))?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Process-wide configuration, loaded on first use
    ///
    /// A broken config file is logged and replaced by defaults.
    pub fn global() -> &'static Config {
        GLOBAL.get_or_init(|| match Self::load() {
            Ok(config) => {
                tracing::debug!("Loaded casekit configuration: {:?}", config);
                config
            }
            Err(e) => {
                tracing::warn!("Ignoring casekit configuration: {}", e);
                let mut config = Self::default();
                config.apply_env(|key| std::env::var(key).ok());
                config
            }
        })
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if lookup("NO_COLOR").is_some() || lookup("TERM").as_deref() == Some("dumb") {
            self.output.color = ColorChoice::Never;
        }

        if let Some(secs) = lookup(TIMEOUT_ENV) {
            match secs.trim().parse::<u64>() {
                Ok(secs) => self.timeouts.test_secs = Some(secs),
                Err(e) => tracing::warn!("Invalid {} value '{}': {}", TIMEOUT_ENV, secs, e),
            }
        }
    }

    /// Test deadline duration, if configured
    pub fn test_timeout(&self) -> Option<Duration> {
        self.timeouts.test_secs.map(Duration::from_secs)
    }

    /// Target measuring time for benchmarks
    pub fn bench_time(&self) -> Duration {
        Duration::from_millis(self.bench.time_ms)
    }
}

/// Get the path to the configuration file
///
/// `$CASEKIT_CONFIG` wins, otherwise `casekit.toml` in the manifest
/// directory cargo runs tests from.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    std::env::var("CARGO_MANIFEST_DIR")
        .ok()
        .map(|dir| PathBuf::from(dir).join(CONFIG_FILE))
}
