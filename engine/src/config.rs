use serde::Deserialize;
use std::{env, path::PathBuf, time::Duration};

use scribe_client::{DEFAULT_API_BASE_URL, DEFAULT_CONNECT_TIMEOUT_SECS};
use scribe_types::RateLimits;

use crate::history::{DEFAULT_MAX_MESSAGES, DEFAULT_RETAINED_ON_QUOTA, HistorySettings};
use crate::storage::DEFAULT_QUOTA_BYTES;

/// Environment override for `[api] base_url`.
pub const API_URL_ENV: &str = "SCRIBE_API_URL";

/// Top-level `~/.scribe/config.toml`.
///
/// ```toml
/// [api]
/// base_url = "http://localhost:5000"
/// connect_timeout_secs = 30
///
/// [limits]
/// section = 15
/// session = 50
///
/// [history]
/// max_messages = 50
/// retained_on_quota = 20
///
/// [storage]
/// path = "${HOME}/.scribe/storage.json"
/// quota_bytes = 5242880
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct ScribeConfig {
    pub api: Option<ApiConfig>,
    pub limits: Option<LimitsConfig>,
    pub history: Option<HistoryConfig>,
    pub storage: Option<StorageConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiConfig {
    /// Assistant server origin. Supports `${VAR}` expansion.
    pub base_url: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

/// Counter values restored on clear and after a successful limit reset.
#[derive(Debug, Default, Deserialize)]
pub struct LimitsConfig {
    pub section: Option<u32>,
    pub session: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryConfig {
    pub max_messages: Option<usize>,
    pub retained_on_quota: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    /// Location of the key-value store file. Supports `${VAR}` expansion.
    pub path: Option<String>,
    pub quota_bytes: Option<usize>,
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

impl ScribeConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        Self::load_from(path)
    }

    pub fn load_from(path: PathBuf) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse { path, source: err })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Resolved server origin: environment, then config, then the local default.
    #[must_use]
    pub fn api_base_url(&self) -> String {
        if let Ok(url) = env::var(API_URL_ENV)
            && !url.trim().is_empty()
        {
            return url.trim().to_string();
        }
        self.api
            .as_ref()
            .and_then(|api| api.base_url.as_deref())
            .map(expand_env_vars)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        let secs = self
            .api
            .as_ref()
            .and_then(|api| api.connect_timeout_secs)
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    #[must_use]
    pub fn rate_limit_defaults(&self) -> RateLimits {
        let limits = self.limits.as_ref();
        RateLimits::new(
            limits
                .and_then(|l| l.section)
                .unwrap_or(RateLimits::DEFAULT_SECTION),
            limits
                .and_then(|l| l.session)
                .unwrap_or(RateLimits::DEFAULT_SESSION),
        )
    }

    #[must_use]
    pub fn history_settings(&self) -> HistorySettings {
        let history = self.history.as_ref();
        let max_messages = history
            .and_then(|h| h.max_messages)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_MESSAGES);
        let retained_on_quota = history
            .and_then(|h| h.retained_on_quota)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_RETAINED_ON_QUOTA)
            .min(max_messages);
        HistorySettings {
            max_messages,
            retained_on_quota,
        }
    }

    /// Key-value store location; `None` when no home directory is available.
    #[must_use]
    pub fn storage_path(&self) -> Option<PathBuf> {
        if let Some(raw) = self.storage.as_ref().and_then(|s| s.path.as_deref()) {
            let expanded = expand_env_vars(raw);
            if let Some(rest) = expanded.strip_prefix("~/") {
                return dirs::home_dir().map(|home| home.join(rest));
            }
            return Some(PathBuf::from(expanded));
        }
        scribe_dir().map(|dir| dir.join("storage.json"))
    }

    #[must_use]
    pub fn storage_quota_bytes(&self) -> usize {
        self.storage
            .as_ref()
            .and_then(|s| s.quota_bytes)
            .unwrap_or(DEFAULT_QUOTA_BYTES)
    }
}

/// `~/.scribe`, home of config, storage, and logs.
pub fn scribe_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".scribe"))
}

pub fn config_path() -> Option<PathBuf> {
    scribe_dir().map(|dir| dir.join("config.toml"))
}
