//! Configuration module for Zappy.
//!
//! Provides typed configuration structs that map to the TOML settings file,
//! flag overrides, validation, and resolution into a [`ResolvedConfig`]
//! whose paths are known to exist.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::errors::{ConfigError, PreconditionError, StartupError};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Zappy, as stored in `settings.toml`.
///
/// `directory` is a top-level key; everything else lives in a section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory to watch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    pub storage: StorageConfig,
    pub gcp: GcpConfig,
    pub watch: WatchConfig,
    pub logging: LoggingConfig,
}

/// Storage provider selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Provider name. Only `gcp` is supported.
    pub provider: String,
}

/// Google Cloud Storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    /// GCP project ID.
    pub project: String,
    /// Destination bucket name.
    pub bucket: String,
    /// Path to the credentials JSON. Relative paths are resolved against
    /// the directory holding the settings file.
    pub credentials: PathBuf,
}

/// Watcher and upload tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Number of files processed at once. `1` keeps uploads strictly sequential.
    pub max_concurrent_uploads: u32,
    /// Wait until a new file's size is stable for this long before uploading.
    /// `0` disables the check.
    pub settle_delay_ms: u64,
    /// Use the polling backend with this interval. `0` selects the native backend.
    pub poll_interval_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Gcp.to_string(),
        }
    }
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project: "your-gcp-project-id".to_string(),
            bucket: "zappy".to_string(),
            credentials: PathBuf::from("gcpkey.json"),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_uploads: 1,
            settle_delay_ms: 0,
            poll_interval_ms: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// StorageProvider
// ---------------------------------------------------------------------------

/// Supported storage providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageProvider {
    /// Google Cloud Storage
    Gcp,
}

impl fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageProvider::Gcp => write!(f, "gcp"),
        }
    }
}

impl FromStr for StorageProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gcp" => Ok(StorageProvider::Gcp),
            _ => Err(ConfigError::UnsupportedProvider(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path`, first writing the default settings there if the
    /// file does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save(path)?;
            info!(path = %path.display(), "Created default configuration file");
            return Ok(config);
        }
        debug!(path = %path.display(), "Loading configuration file");
        Self::load(path)
    }

    /// Write the configuration to `path` as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, self.to_toml_string()?).map_err(write_err)
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Platform-appropriate default path for the settings file.
    ///
    /// Typically `$XDG_CONFIG_HOME/zappy/settings.toml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("zappy")
            .join("settings.toml")
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"gcp.bucket"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for `watch.max_concurrent_uploads`.
const MAX_CONCURRENT_UPLOADS: u32 = 64;

/// Polling faster than this only burns CPU.
const MIN_POLL_INTERVAL_MS: u64 = 50;

impl Config {
    /// Validate the configuration values and return all errors found.
    ///
    /// Path existence is not checked here; see [`Config::resolve`].
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- storage ---
        if let Err(e) = self.storage.provider.parse::<StorageProvider>() {
            errors.push(ValidationError {
                field: "storage.provider".into(),
                message: e.to_string(),
            });
        }

        // --- gcp ---
        if self.gcp.bucket.trim().is_empty() {
            errors.push(ValidationError {
                field: "gcp.bucket".into(),
                message: "must not be empty".into(),
            });
        }
        if self.gcp.project.trim().is_empty() {
            errors.push(ValidationError {
                field: "gcp.project".into(),
                message: "must not be empty".into(),
            });
        }
        if self.gcp.credentials.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "gcp.credentials".into(),
                message: "must not be empty".into(),
            });
        }

        // --- watch ---
        if self.watch.max_concurrent_uploads == 0
            || self.watch.max_concurrent_uploads > MAX_CONCURRENT_UPLOADS
        {
            errors.push(ValidationError {
                field: "watch.max_concurrent_uploads".into(),
                message: format!("must be in range 1..={MAX_CONCURRENT_UPLOADS}"),
            });
        }
        if self.watch.poll_interval_ms != 0 && self.watch.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            errors.push(ValidationError {
                field: "watch.poll_interval_ms".into(),
                message: format!("must be 0 or at least {MIN_POLL_INTERVAL_MS}"),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
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
// Overrides and resolution
// ---------------------------------------------------------------------------

/// Values given on the command line. `Some` wins over the file value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub directory: Option<PathBuf>,
    pub provider: Option<String>,
    pub project: Option<String>,
    pub bucket: Option<String>,
    pub credentials: Option<PathBuf>,
    pub max_concurrent_uploads: Option<u32>,
    pub settle_delay_ms: Option<u64>,
    /// Report decisions without uploading.
    pub dry_run: bool,
    /// Run the startup reconciliation scan.
    pub upload_missing: bool,
}

/// Effective configuration after merging flags and checking paths.
///
/// Both paths are absolute and existed at resolution time.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub watch_directory: PathBuf,
    pub provider: StorageProvider,
    pub project_id: String,
    pub bucket: String,
    pub credentials_path: PathBuf,
    pub dry_run: bool,
    pub upload_missing: bool,
    pub max_concurrent_uploads: usize,
    pub settle_delay: Option<Duration>,
    pub poll_interval: Option<Duration>,
}

impl Config {
    /// Returns a copy of this configuration with the overrides applied.
    ///
    /// Flag values are taken verbatim; no path handling happens here.
    pub fn merged_with(&self, overrides: &ConfigOverrides) -> Config {
        let mut merged = self.clone();
        if let Some(directory) = &overrides.directory {
            merged.directory = Some(directory.clone());
        }
        if let Some(provider) = &overrides.provider {
            merged.storage.provider = provider.clone();
        }
        if let Some(project) = &overrides.project {
            merged.gcp.project = project.clone();
        }
        if let Some(bucket) = &overrides.bucket {
            merged.gcp.bucket = bucket.clone();
        }
        if let Some(credentials) = &overrides.credentials {
            merged.gcp.credentials = credentials.clone();
        }
        if let Some(n) = overrides.max_concurrent_uploads {
            merged.watch.max_concurrent_uploads = n;
        }
        if let Some(ms) = overrides.settle_delay_ms {
            merged.watch.settle_delay_ms = ms;
        }
        merged
    }

    /// Merge `overrides` into this configuration and check every startup
    /// precondition, in the order an operator would fix them: watch
    /// directory, provider, remaining values, credentials.
    ///
    /// `config_dir` is the directory of the settings file; a relative
    /// `gcp.credentials` from the file is resolved against it. Relative
    /// paths given as flags are resolved against the working directory.
    pub fn resolve(
        &self,
        overrides: &ConfigOverrides,
        config_dir: Option<&Path>,
    ) -> Result<ResolvedConfig, StartupError> {
        let merged = self.merged_with(overrides);

        // --- watch directory ---
        let directory = merged.directory.as_ref().ok_or(ConfigError::MissingDirectory)?;
        let directory = absolutize(expand_path(directory)?);
        if !directory.exists() {
            return Err(PreconditionError::DirectoryNotFound(directory).into());
        }
        if !directory.is_dir() {
            return Err(PreconditionError::NotADirectory(directory).into());
        }
        let watch_directory = directory
            .canonicalize()
            .map_err(|_| PreconditionError::DirectoryNotFound(directory.clone()))?;

        // --- provider ---
        let provider: StorageProvider = merged.storage.provider.parse()?;

        // --- remaining values ---
        let errors = merged.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors).into());
        }

        // --- credentials ---
        let mut credentials = expand_path(&merged.gcp.credentials)?;
        if overrides.credentials.is_none() && credentials.is_relative() {
            if let Some(dir) = config_dir {
                credentials = dir.join(credentials);
            }
        }
        let credentials = absolutize(credentials);
        if !credentials.exists() {
            return Err(PreconditionError::CredentialsNotFound(credentials).into());
        }
        let credentials_path = credentials
            .canonicalize()
            .map_err(|_| PreconditionError::CredentialsNotFound(credentials.clone()))?;

        let resolved = ResolvedConfig {
            watch_directory,
            provider,
            project_id: merged.gcp.project,
            bucket: merged.gcp.bucket,
            credentials_path,
            dry_run: overrides.dry_run,
            upload_missing: overrides.upload_missing,
            max_concurrent_uploads: merged.watch.max_concurrent_uploads as usize,
            settle_delay: non_zero_millis(merged.watch.settle_delay_ms),
            poll_interval: non_zero_millis(merged.watch.poll_interval_ms),
        };

        debug!(?resolved, "Resolved configuration");
        Ok(resolved)
    }
}

/// Expand `~` and `$VAR` in a path.
fn expand_path(path: &Path) -> Result<PathBuf, ConfigError> {
    let raw = path.to_string_lossy();
    shellexpand::full(&raw)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| ConfigError::PathExpansion {
            path: raw.to_string(),
            message: e.to_string(),
        })
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
