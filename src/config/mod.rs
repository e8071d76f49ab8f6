//! Configuration handling for the store.
//!
//! Everything has a sensible development default; environment variables
//! override them for deployments that need a different data path or
//! tighter storage timeouts. `Config::from_env` performs that loading.

use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable names. Keeping them public lets tests and embedding
/// code refer to them directly.
pub const ENV_DATA_PATH: &str = "DEALSTASH_DATA_PATH";
pub const ENV_STORAGE_TIMEOUT_MS: &str = "DEALSTASH_STORAGE_TIMEOUT_MS";
pub const ENV_INIT_MAX_ATTEMPTS: &str = "DEALSTASH_INIT_MAX_ATTEMPTS";
pub const ENV_INIT_BASE_BACKOFF_MS: &str = "DEALSTASH_INIT_BASE_BACKOFF_MS";

/// Default development values used when environment variables are absent.
const DEFAULT_DATA_PATH: &str = "dealstash.json";
const DEFAULT_STORAGE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_INIT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INIT_BASE_BACKOFF_MS: u64 = 500;

/// Runtime configuration for the offer store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    data_path: PathBuf,
    storage_timeout: Duration,
    init_max_attempts: u32,
    init_base_backoff_ms: u64,
}

impl Config {
    /// Create a config explicitly.
    pub fn new(
        data_path: impl Into<PathBuf>,
        storage_timeout: Duration,
        init_max_attempts: u32,
        init_base_backoff_ms: u64,
    ) -> Self {
        Self {
            data_path: data_path.into(),
            storage_timeout,
            init_max_attempts,
            init_base_backoff_ms,
        }
    }

    /// Load from environment variables, falling back to development
    /// defaults. Fails when a numeric variable is present but unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_path =
            env::var(ENV_DATA_PATH).unwrap_or_else(|_| DEFAULT_DATA_PATH.to_string());
        let storage_timeout_ms =
            parse_var(ENV_STORAGE_TIMEOUT_MS, DEFAULT_STORAGE_TIMEOUT_MS)?;
        let init_max_attempts = parse_var(ENV_INIT_MAX_ATTEMPTS, DEFAULT_INIT_MAX_ATTEMPTS)?;
        let init_base_backoff_ms =
            parse_var(ENV_INIT_BASE_BACKOFF_MS, DEFAULT_INIT_BASE_BACKOFF_MS)?;

        Ok(Self {
            data_path: PathBuf::from(data_path),
            storage_timeout: Duration::from_millis(storage_timeout_ms),
            init_max_attempts,
            init_base_backoff_ms,
        })
    }

    /// Where the file backend keeps its blobs.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }
    /// Upper bound on any single storage call.
    pub fn storage_timeout(&self) -> Duration {
        self.storage_timeout
    }
    /// Bounded retry count for initialization.
    pub fn init_max_attempts(&self) -> u32 {
        self.init_max_attempts
    }
    /// Base delay for initialization backoff.
    pub fn init_base_backoff_ms(&self) -> u64 {
        self.init_base_backoff_ms
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            DEFAULT_DATA_PATH,
            Duration::from_millis(DEFAULT_STORAGE_TIMEOUT_MS),
            DEFAULT_INIT_MAX_ATTEMPTS,
            DEFAULT_INIT_BASE_BACKOFF_MS,
        )
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            field: name,
            reason: format!("'{raw}' is not a valid number"),
        }),
        Err(_) => Ok(default),
    }
}

/// Errors that can occur while building a configuration.
#[derive(Debug)]
pub enum ConfigError {
    InvalidValue { field: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl Error for ConfigError {}
