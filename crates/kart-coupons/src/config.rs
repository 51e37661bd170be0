//! Configuration management
//!
//! Values come from named defaults, overridden by a `.env` file and then by the
//! process environment. The binary applies CLI flags last.

use kart_common::{KartError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

// ============================================================================
// Loader Configuration Constants
// ============================================================================

/// Directory holding the coupon source files.
pub const DEFAULT_DATA_DIR: &str = "./coupons";

/// Source files processed in order; each must end in its numeric source tag.
pub const DEFAULT_SOURCE_FILES: [&str; 3] = ["couponbase1", "couponbase2", "couponbase3"];

/// Records per bulk insert.
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Stored codes are truncated to this many characters.
pub const DEFAULT_MAX_CODE_LEN: usize = 10;

/// Longest raw line the scanner accepts; valid coupons are 8-10 characters.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024;

/// Batches allowed in flight at once.
pub const DEFAULT_MAX_WORKERS: usize = 12;

/// Deadline for a single bulk insert, in seconds.
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 300;

// ============================================================================
// Database Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/kart";

/// Pool connections reserved on top of the write workers.
pub const POOL_HEADROOM: u32 = 2;

/// Default pool acquisition timeout in seconds.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Startup connectivity check deadline in seconds.
pub const DEFAULT_PING_TIMEOUT_SECS: u64 = 5;

/// Default idle timeout in seconds (30 minutes).
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 1800;

/// Default connection lifetime in seconds (1 hour).
pub const DEFAULT_MAX_LIFETIME_SECS: u64 = 3600;

// ============================================================================
// Validity Configuration Constants
// ============================================================================

/// Source tags probed by the validity check are `1..=DEFAULT_SOURCE_TAGS`.
pub const DEFAULT_SOURCE_TAGS: u32 = 3;

/// A coupon is valid once it is found under this many source tags.
pub const DEFAULT_MIN_MATCHES: usize = 2;

/// Full configuration for the coupon tools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub loader: LoaderConfig,
    pub database: DatabaseConfig,
    pub validity: ValidityConfig,
}

/// Ingestion pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub data_dir: PathBuf,
    pub files: Vec<String>,
    pub batch_size: usize,
    pub max_code_len: usize,
    pub max_line_bytes: usize,
    pub max_workers: usize,
    pub write_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub ping_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
    pub max_lifetime_secs: Option<u64>,
}

/// Majority check settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidityConfig {
    pub source_tags: u32,
    pub min_matches: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            files: DEFAULT_SOURCE_FILES.iter().map(|f| f.to_string()).collect(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_code_len: DEFAULT_MAX_CODE_LEN,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            max_workers: DEFAULT_MAX_WORKERS,
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 0,
            min_connections: 0,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            ping_timeout_secs: DEFAULT_PING_TIMEOUT_SECS,
            idle_timeout_secs: Some(DEFAULT_IDLE_TIMEOUT_SECS),
            max_lifetime_secs: Some(DEFAULT_MAX_LIFETIME_SECS),
        }
        .sized_for_workers(DEFAULT_MAX_WORKERS)
    }
}

impl DatabaseConfig {
    /// Size the pool so every write worker gets a connection plus headroom
    pub fn sized_for_workers(mut self, workers: usize) -> Self {
        let workers = u32::try_from(workers).unwrap_or(u32::MAX - POOL_HEADROOM);
        self.min_connections = workers;
        self.max_connections = workers.saturating_add(POOL_HEADROOM);
        self
    }
}

impl Default for ValidityConfig {
    fn default() -> Self {
        Self {
            source_tags: DEFAULT_SOURCE_TAGS,
            min_matches: DEFAULT_MIN_MATCHES,
        }
    }
}

impl ValidityConfig {
    /// The threshold must be reachable and must require at least one match
    pub fn validate(&self) -> Result<()> {
        if self.min_matches == 0 || self.min_matches > self.source_tags as usize {
            return Err(KartError::config(format!(
                "min matches ({}) must be between 1 and the number of source tags ({})",
                self.min_matches, self.source_tags
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from `.env`, environment and defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Read configuration from the process environment without validating it
    pub fn from_env() -> Result<Self> {
        let loader = LoaderConfig {
            data_dir: std::env::var("COUPON_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR)),
            files: match std::env::var("COUPON_FILES") {
                Ok(raw) => split_list(&raw),
                Err(_) => LoaderConfig::default().files,
            },
            batch_size: env_or("COUPON_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            max_code_len: env_or("COUPON_MAX_CODE_LEN", DEFAULT_MAX_CODE_LEN)?,
            max_line_bytes: env_or("COUPON_MAX_LINE_BYTES", DEFAULT_MAX_LINE_BYTES)?,
            max_workers: env_or("COUPON_MAX_WORKERS", DEFAULT_MAX_WORKERS)?,
            write_timeout_secs: env_or("COUPON_WRITE_TIMEOUT", DEFAULT_WRITE_TIMEOUT_SECS)?,
        };

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            acquire_timeout_secs: env_or("DATABASE_ACQUIRE_TIMEOUT", DEFAULT_ACQUIRE_TIMEOUT_SECS)?,
            ping_timeout_secs: env_or("DATABASE_PING_TIMEOUT", DEFAULT_PING_TIMEOUT_SECS)?,
            idle_timeout_secs: Some(env_or("DATABASE_IDLE_TIMEOUT", DEFAULT_IDLE_TIMEOUT_SECS)?),
            max_lifetime_secs: Some(env_or("DATABASE_MAX_LIFETIME", DEFAULT_MAX_LIFETIME_SECS)?),
            ..DatabaseConfig::default()
        }
        .sized_for_workers(loader.max_workers);

        let validity = ValidityConfig {
            source_tags: env_or("COUPON_SOURCE_TAGS", DEFAULT_SOURCE_TAGS)?,
            min_matches: env_or("COUPON_MIN_MATCHES", DEFAULT_MIN_MATCHES)?,
        };

        Ok(Self {
            loader,
            database,
            validity,
        })
    }

    /// Change the write concurrency and resize the pool to match
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.loader.max_workers = workers;
        self.database = self.database.sized_for_workers(workers);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.loader.files.is_empty() {
            return Err(KartError::config("at least one coupon source file is required"));
        }

        if self.loader.batch_size == 0 {
            return Err(KartError::config("batch size must be greater than 0"));
        }

        if self.loader.max_code_len == 0 {
            return Err(KartError::config("maximum code length must be greater than 0"));
        }

        if self.loader.max_line_bytes < self.loader.max_code_len {
            return Err(KartError::config(format!(
                "line buffer ({} bytes) is shorter than the maximum code length ({})",
                self.loader.max_line_bytes, self.loader.max_code_len
            )));
        }

        if self.loader.max_workers == 0 {
            return Err(KartError::config("write workers must be greater than 0"));
        }

        if self.database.url.is_empty() {
            return Err(KartError::config("database URL cannot be empty"));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(KartError::config(format!(
                "database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }

        self.validity.validate()
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| KartError::invalid_value(key, &raw)),
        Err(_) => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
