//! Configuration module for MirrorSync.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation, defaults, and a builder pattern for
//! programmatic use. The engine receives the configuration as an explicit
//! value at construction; nothing is read from module-level globals.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for MirrorSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub hashing: HashingConfig,
    pub copy: CopyConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

/// Content fingerprinting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashingConfig {
    /// Bytes read per digest step. Affects only performance; memory use of
    /// a fingerprint computation is bounded by this value regardless of
    /// file size.
    pub chunk_size_bytes: usize,
}

/// Batched copy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyConfig {
    /// Number of pending copy tasks accumulated before a flush.
    pub batch_size: usize,
    /// Upper bound on concurrent copy operations within a flush.
    pub max_workers: usize,
}

/// Pass scheduling settings (owned by the CLI, not the engine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between synchronization passes.
    pub interval_secs: u64,
}

/// Logging settings (owned by the CLI, not the engine).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Optional log file; when set, records are written there in addition
    /// to the console.
    pub file: Option<PathBuf>,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            // 64 KiB: a chunk comfortably fits in memory while keeping the
            // number of read syscalls low for typical file sizes.
            chunk_size_bytes: 64 * 1024,
        }
    }
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_workers: 8,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

// LoggingConfig derives Default; an empty level string means "use the
// caller's fallback" and is normalized during validation-free paths, but
// the stock default below is what ships in the sample config.
impl LoggingConfig {
    /// The level used when none is configured.
    pub const DEFAULT_LEVEL: &'static str = "info";

    /// Returns the configured level, or [`Self::DEFAULT_LEVEL`] when empty.
    pub fn level_or_default(&self) -> &str {
        if self.level.is_empty() {
            Self::DEFAULT_LEVEL
        } else {
            &self.level
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/mirrorsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("mirrorsync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"copy.batch_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.hashing.chunk_size_bytes == 0 {
            errors.push(ValidationError {
                field: "hashing.chunk_size_bytes".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.copy.batch_size == 0 {
            errors.push(ValidationError {
                field: "copy.batch_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.copy.max_workers == 0 {
            errors.push(ValidationError {
                field: "copy.max_workers".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.scheduler.interval_secs == 0 {
            errors.push(ValidationError {
                field: "scheduler.interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        if !self.logging.level.is_empty()
            && !VALID_LOG_LEVELS.contains(&self.logging.level.as_str())
        {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use mirrorsync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .hashing_chunk_size_bytes(128 * 1024)
///     .copy_batch_size(50)
///     .copy_max_workers(4)
///     .build();
/// assert_eq!(config.copy.batch_size, 50);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder starting from an existing configuration, so that
    /// command-line overrides can be layered over file values.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn hashing_chunk_size_bytes(mut self, bytes: usize) -> Self {
        self.config.hashing.chunk_size_bytes = bytes;
        self
    }

    pub fn copy_batch_size(mut self, n: usize) -> Self {
        self.config.copy.batch_size = n;
        self
    }

    pub fn copy_max_workers(mut self, n: usize) -> Self {
        self.config.copy.max_workers = n;
        self
    }

    pub fn scheduler_interval_secs(mut self, seconds: u64) -> Self {
        self.config.scheduler.interval_secs = seconds;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_file(mut self, file: PathBuf) -> Self {
        self.config.logging.file = Some(file);
        self
    }

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
