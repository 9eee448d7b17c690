//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{BdError, Result};

/// Full client configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionConfig,
    pub polling: PollingConfig,
    pub paths: PathsConfig,
}

/// Service endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the Birddog service.
    pub base_url: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Archive landing page opened when the client starts.
    pub home_archive: String,
    /// Subarchive tag for the landing page, empty for the archive default.
    pub home_subarchive: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:2002".to_owned(),
            timeout_ms: 30_000,
            home_archive: "DAZHO".to_owned(),
            home_subarchive: String::new(),
        }
    }
}

/// Stored session credentials for automatic login.
///
/// The service uses a cookie session; the client logs in once at startup
/// when an email is configured and keeps the cookie for the process
/// lifetime. The password may instead come from `BIRDDOG_PASSWORD`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SessionConfig {
    pub email: String,
    pub password: String,
}

/// Translation-progress polling knobs.
///
/// The original client re-polled on a fixed delay forever; the poll here
/// is bounded and backs off, and is cancelled when the user navigates
/// away from the page being translated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollingConfig {
    /// Initial delay between translation-progress polls, milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound the exponential backoff may reach, milliseconds.
    pub max_delay_ms: u64,
    /// Give up after this many polls of one translation batch.
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 2_000,
            max_delay_ms: 30_000,
            max_attempts: 120,
        }
    }
}

impl PollingConfig {
    /// Delay before poll number `attempt` (0-based), doubling up to the cap.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.min(16));
        let ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Filesystem locations used by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub jsonl_log: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[BD-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("birddog").join("config.toml");
        let data = home_dir.join(".local").join("share").join("birddog");
        Self {
            config_file: cfg,
            jsonl_log: data.join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from the default
    /// path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| BdError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(BdError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(|key| env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("BIRDDOG_BASE_URL") {
            self.service.base_url = raw;
        }
        if let Some(raw) = lookup("BIRDDOG_TIMEOUT_MS") {
            self.service.timeout_ms = parse_env_u64("BIRDDOG_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("BIRDDOG_HOME_ARCHIVE") {
            self.service.home_archive = raw;
        }
        if let Some(raw) = lookup("BIRDDOG_EMAIL") {
            self.session.email = raw;
        }
        if let Some(raw) = lookup("BIRDDOG_PASSWORD") {
            self.session.password = raw;
        }
        if let Some(raw) = lookup("BIRDDOG_POLL_BASE_DELAY_MS") {
            self.polling.base_delay_ms = parse_env_u64("BIRDDOG_POLL_BASE_DELAY_MS", &raw)?;
        }
        if let Some(raw) = lookup("BIRDDOG_POLL_MAX_DELAY_MS") {
            self.polling.max_delay_ms = parse_env_u64("BIRDDOG_POLL_MAX_DELAY_MS", &raw)?;
        }
        if let Some(raw) = lookup("BIRDDOG_POLL_MAX_ATTEMPTS") {
            self.polling.max_attempts =
                u32::try_from(parse_env_u64("BIRDDOG_POLL_MAX_ATTEMPTS", &raw)?).map_err(|_| {
                    BdError::InvalidConfig {
                        details: "BIRDDOG_POLL_MAX_ATTEMPTS out of range".to_owned(),
                    }
                })?;
        }
        if let Some(raw) = lookup("BIRDDOG_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.service.base_url.is_empty() {
            return Err(BdError::InvalidConfig {
                details: "service.base_url must not be empty".to_owned(),
            });
        }
        if url::Url::parse(&self.service.base_url).is_err() {
            return Err(BdError::InvalidConfig {
                details: format!("service.base_url is not a valid URL: {}", self.service.base_url),
            });
        }
        if self.service.timeout_ms == 0 {
            return Err(BdError::InvalidConfig {
                details: "service.timeout_ms must be positive".to_owned(),
            });
        }
        if self.polling.base_delay_ms == 0 || self.polling.max_delay_ms < self.polling.base_delay_ms
        {
            return Err(BdError::InvalidConfig {
                details: "polling delays must satisfy 0 < base_delay_ms <= max_delay_ms".to_owned(),
            });
        }
        Ok(())
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.service.timeout_ms)
    }
}

fn parse_env_u64(key: &str, raw: &str) -> Result<u64> {
    raw.parse().map_err(|_| BdError::InvalidConfig {
        details: format!("{key} must be an unsigned integer, got {raw:?}"),
    })
}
