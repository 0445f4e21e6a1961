use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::constants::{DEFAULT_CORPUS_KEY, DEFAULT_LISTING_URL, SCRAPER_USER_AGENT};
use crate::pairs::DEFAULT_CONTEXT_WINDOW;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Forum
    pub listing_url: String,
    pub listing_first_page: u32,
    pub listing_last_page: u32,

    // Dispatch
    pub listing_concurrency: usize,
    pub discussion_concurrency: usize,
    pub unit_timeout: Duration,

    // Pacing
    pub discussion_delay: Duration,
    pub comment_page_delay: Duration,

    // HTTP
    pub http_timeout: Duration,
    pub user_agent: String,

    // Storage
    pub storage_backend: StorageBackend,
    pub output_dir: PathBuf,
    pub corpus_key: String,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,

    // Instruction pairs
    pub context_window: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Write the corpus under `output_dir` on the local filesystem
    Local,
    /// Upload the corpus to an S3-compatible bucket
    S3,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Forum
            listing_url: env_or_default("FORUM_LISTING_URL", DEFAULT_LISTING_URL),
            listing_first_page: parse_env_u32("LISTING_FIRST_PAGE", 1)?,
            listing_last_page: parse_env_u32("LISTING_LAST_PAGE", 419)?,

            // Dispatch
            listing_concurrency: parse_env_usize("LISTING_CONCURRENCY", 20)?,
            discussion_concurrency: parse_env_usize("DISCUSSION_CONCURRENCY", 400)?,
            unit_timeout: Duration::from_secs(parse_env_u64("UNIT_TIMEOUT_SECS", 86_400)?),

            // Pacing
            discussion_delay: Duration::from_millis(parse_env_u64("DISCUSSION_DELAY_MS", 7_000)?),
            comment_page_delay: Duration::from_millis(parse_env_u64(
                "COMMENT_PAGE_DELAY_MS",
                5_000,
            )?),

            // HTTP
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 60)?),
            user_agent: env_or_default("USER_AGENT", SCRAPER_USER_AGENT),

            // Storage
            storage_backend: parse_storage_backend(&env_or_default("STORAGE_BACKEND", "local"))?,
            output_dir: PathBuf::from(env_or_default("OUTPUT_DIR", "./data")),
            corpus_key: env_or_default("CORPUS_KEY", DEFAULT_CORPUS_KEY),
            s3_bucket: optional_env("S3_BUCKET"),
            s3_region: env_or_default("S3_REGION", "us-east-1"),
            s3_endpoint: optional_env("S3_ENDPOINT"),

            // Instruction pairs
            context_window: parse_env_usize("CONTEXT_WINDOW", DEFAULT_CONTEXT_WINDOW)?,
        })
    }

    /// Configuration suitable for tests: no pacing, local storage, a single
    /// listing page.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            listing_url: "http://127.0.0.1/discussions/".to_string(),
            listing_first_page: 1,
            listing_last_page: 1,
            listing_concurrency: 4,
            discussion_concurrency: 4,
            unit_timeout: Duration::from_secs(30),
            discussion_delay: Duration::ZERO,
            comment_page_delay: Duration::ZERO,
            http_timeout: Duration::from_secs(10),
            user_agent: SCRAPER_USER_AGENT.to_string(),
            storage_backend: StorageBackend::Local,
            output_dir: PathBuf::from("./data"),
            corpus_key: DEFAULT_CORPUS_KEY.to_string(),
            s3_bucket: None,
            s3_region: "us-east-1".to_string(),
            s3_endpoint: None,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listing_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "LISTING_CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.discussion_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "DISCUSSION_CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if let Err(e) = Url::parse(&self.listing_url) {
            return Err(ConfigError::InvalidValue {
                name: "FORUM_LISTING_URL".to_string(),
                message: e.to_string(),
            });
        }
        if self.listing_first_page > self.listing_last_page {
            return Err(ConfigError::InvalidValue {
                name: "LISTING_LAST_PAGE".to_string(),
                message: format!(
                    "must not be below LISTING_FIRST_PAGE ({})",
                    self.listing_first_page
                ),
            });
        }
        if self.corpus_key.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "CORPUS_KEY".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.storage_backend == StorageBackend::S3 && self.s3_bucket.is_none() {
            return Err(ConfigError::MissingEnvVar("S3_BUCKET".to_string()));
        }
        Ok(())
    }

    /// Inclusive range of listing pages to crawl.
    #[must_use]
    pub fn listing_pages(&self) -> RangeInclusive<u32> {
        self.listing_first_page..=self.listing_last_page
    }

    /// URL of listing page `page`, e.g. `.../repairs-maintenance/p3`.
    #[must_use]
    pub fn listing_page_url(&self, page: u32) -> String {
        if self.listing_url.ends_with('/') {
            format!("{}p{page}", self.listing_url)
        } else {
            format!("{}/p{page}", self.listing_url)
        }
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_storage_backend(value: &str) -> Result<StorageBackend, ConfigError> {
    match value.to_lowercase().as_str() {
        "local" | "fs" => Ok(StorageBackend::Local),
        "s3" => Ok(StorageBackend::S3),
        _ => Err(ConfigError::InvalidValue {
            name: "STORAGE_BACKEND".to_string(),
            message: format!("must be 'local' or 's3', got '{value}'"),
        }),
    }
}
