//! Configuration management for the namespace query engine
//!
//! TOML file support, environment variable overrides and defaults. Every
//! section can be omitted from the file; missing fields take their defaults.
//!
//! ```toml
//! [parallel]
//! parallel_threshold = 10000
//! morsel_size = 4096
//!
//! [export]
//! default_dump_limit = 1000000
//!
//! [monitoring]
//! metrics_enabled = true
//! log_level = "info"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Parallel fan-out tuning
    #[serde(default)]
    pub parallel: ParallelConfig,

    /// Path export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Monitoring and observability
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Parallel execution configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ParallelConfig {
    /// Minimum records to enable parallelism (below this, run sequential)
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// Records per parallel work unit
    #[serde(default = "default_morsel_size")]
    pub morsel_size: usize,
}

/// Path export configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExportConfig {
    /// Limit applied by `dump_paths` when the caller passes none (0 = unlimited)
    #[serde(default = "default_dump_limit")]
    pub default_dump_limit: usize,
}

/// Monitoring configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Record Prometheus metrics for engine operations
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text
    #[serde(default)]
    pub json_logs: bool,
}

// Default value functions
fn default_parallel_threshold() -> usize { 10_000 }
fn default_morsel_size() -> usize { 4096 }
fn default_dump_limit() -> usize { 0 }
fn default_log_level() -> String { "info".to_string() }
fn default_true() -> bool { true }

/// Smallest accepted morsel
pub const MIN_MORSEL_SIZE: usize = 64;

/// Largest accepted morsel
pub const MAX_MORSEL_SIZE: usize = 1 << 24;

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: default_parallel_threshold(),
            morsel_size: default_morsel_size(),
        }
    }
}

impl ParallelConfig {
    /// Set threshold below which to run sequentially
    pub fn with_threshold(mut self, records: usize) -> Self {
        self.parallel_threshold = records;
        self
    }

    /// Set morsel size (records per parallel work unit)
    pub fn with_morsel_size(mut self, size: usize) -> Self {
        self.morsel_size = size.max(MIN_MORSEL_SIZE);
        self
    }

    /// Force sequential execution
    pub fn sequential() -> Self {
        Self::default().with_threshold(usize::MAX)
    }

    /// True if `len` records should be processed in parallel
    #[inline]
    pub fn should_parallelize(&self, len: usize) -> bool {
        len >= self.parallel_threshold && len > self.morsel_size
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_dump_limit: default_dump_limit(),
        }
    }
}

impl ExportConfig {
    /// Default dump limit as an option (`None` = unlimited)
    pub fn dump_limit(&self) -> Option<usize> {
        (self.default_dump_limit > 0).then_some(self.default_dump_limit)
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::File {
            path: path.display().to_string(),
            source,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load configuration with environment variable overrides, then validate
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    ///
    /// Unparsable numeric values are ignored and the previous value kept.
    pub fn apply_env_overrides(&mut self) {
        // Parallel
        if let Ok(threshold) = std::env::var("NSQ_PARALLEL_THRESHOLD") {
            if let Ok(t) = threshold.parse() {
                self.parallel.parallel_threshold = t;
            }
        }
        if let Ok(morsel) = std::env::var("NSQ_MORSEL_SIZE") {
            if let Ok(m) = morsel.parse() {
                self.parallel.morsel_size = m;
            }
        }

        // Export
        if let Ok(limit) = std::env::var("NSQ_DUMP_LIMIT") {
            if let Ok(l) = limit.parse() {
                self.export.default_dump_limit = l;
            }
        }

        // Monitoring
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.monitoring.log_level = log_level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let morsel = self.parallel.morsel_size;
        if !(MIN_MORSEL_SIZE..=MAX_MORSEL_SIZE).contains(&morsel) {
            return Err(ConfigError::OutOfRange {
                field: "parallel.morsel_size".to_string(),
                value: morsel.to_string(),
                min: MIN_MORSEL_SIZE.to_string(),
                max: MAX_MORSEL_SIZE.to_string(),
            });
        }

        // RUST_LOG may carry a full directive list; only bare levels are checked
        let level = self.monitoring.log_level.trim();
        if level.is_empty() {
            return Err(ConfigError::InvalidFormat {
                field: "monitoring.log_level".to_string(),
                message: "log level cannot be empty".to_string(),
            });
        }
        let is_directive = level.contains(|c| c == '=' || c == ',');
        if !is_directive && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidFormat {
                field: "monitoring.log_level".to_string(),
                message: format!("'{}' is not one of {}", level, LOG_LEVELS.join(", ")),
            });
        }

        Ok(())
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, contents).map_err(|source| ConfigError::File {
            path: path.display().to_string(),
            source,
        })
    }
}
