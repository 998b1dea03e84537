use crate::error::ConfigError;
use clap::Parser;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_BLOCKS_URL: &str = "https://p2pool.io/mini/api/pool/blocks";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONFIG_FILE_NAME: &str = "config.toml";

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "p2pool-notifier")]
#[command(about = "Notifies Telegram subscribers about every block found by P2Pool mini")]
pub struct Cli {
    /// Path to the TOML config file (defaults to ./config.toml)
    #[arg(short, long, env = "P2POOL_NOTIFIER_CONFIG")]
    pub config: Option<PathBuf>,
}

/// config.toml as written on disk
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "APIKey")]
    api_key: String,
    #[serde(rename = "SubscribersFile")]
    subscribers_file: PathBuf,
    #[serde(rename = "NotifyDuration")]
    notify_duration: String,
    #[serde(rename = "BlocksURL", default)]
    blocks_url: Option<String>,
    #[serde(rename = "RequestTimeout", default)]
    request_timeout: Option<String>,
    #[serde(rename = "FanoutConcurrency", default)]
    fanout_concurrency: Option<usize>,
    #[serde(rename = "Debug", default)]
    debug: bool,
}

/// Validated runtime configuration
#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub subscribers_file: PathBuf,
    pub notify_interval: Duration,
    pub blocks_url: Url,
    pub request_timeout: Duration,
    pub fanout_concurrency: usize,
    pub debug: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("subscribers_file", &self.subscribers_file)
            .field("notify_interval", &self.notify_interval)
            .field("blocks_url", &self.blocks_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .field("fanout_concurrency", &self.fanout_concurrency)
            .field("debug", &self.debug)
            .finish()
    }
}

impl Config {
    /// Load from an explicit path, or from the first default location that exists.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load_from_file(path)?, path.to_path_buf()));
        }

        let candidates = Self::candidate_paths();
        match candidates.iter().find(|path| path.exists()) {
            Some(path) => Ok((Self::load_from_file(path)?, path.clone())),
            None => Err(ConfigError::NotFound(
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_from_str(&contents, &path.display().to_string())
    }

    pub fn parse_from_str(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let api_key = raw.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(ConfigError::Invalid {
                key: "APIKey",
                reason: "bot token must not be empty".into(),
            });
        }

        if raw.subscribers_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                key: "SubscribersFile",
                reason: "path must not be empty".into(),
            });
        }

        let notify_interval = parse_duration("NotifyDuration", &raw.notify_duration)?;

        let request_timeout = match raw.request_timeout.as_deref() {
            Some(value) => parse_duration("RequestTimeout", value)?,
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let blocks_url = raw.blocks_url.as_deref().unwrap_or(DEFAULT_BLOCKS_URL);
        let blocks_url = Url::parse(blocks_url).map_err(|e| ConfigError::Invalid {
            key: "BlocksURL",
            reason: e.to_string(),
        })?;
        if !matches!(blocks_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                key: "BlocksURL",
                reason: format!("unsupported scheme {}", blocks_url.scheme()),
            });
        }

        let fanout_concurrency = raw.fanout_concurrency.unwrap_or(1);
        if fanout_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "FanoutConcurrency",
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            api_key,
            subscribers_file: raw.subscribers_file,
            notify_interval,
            blocks_url,
            request_timeout,
            fanout_concurrency,
            debug: raw.debug,
        })
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("p2pool-notifier").join(CONFIG_FILE_NAME));
        }
        paths
    }
}

fn parse_duration(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let duration = humantime::parse_duration(value.trim()).map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("{value:?}: {e}"),
    })?;
    if duration.is_zero() {
        return Err(ConfigError::Invalid {
            key,
            reason: "duration must be greater than zero".into(),
        });
    }
    Ok(duration)
}
