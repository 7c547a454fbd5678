//! Tool configuration, loaded from TOML.

use crate::Result;
use crate::cache::CacheBackend;
use crate::retry::RetryConfig;
use crate::source::github::{DEFAULT_BASE_URL, GitHubOptions};
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use directories::BaseDirs;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use url::Url;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../default_config.toml");

/// File looked up in the working directory when no configuration path is given.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "contrib-ingest.toml";

const APP_DIR_NAME: &str = "contrib-ingest";
const CHECKPOINT_DIR_NAME: &str = "checkpoints";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub checkpoints: CheckpointConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GitHubConfig {
    /// REST API endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Organization used for repository discovery and affiliation checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    /// Access token; the `GITHUB_TOKEN` environment variable takes precedence
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Fetch each commit individually to learn its size
    #[serde(default = "default_true")]
    pub fetch_commit_stats: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub backend: CacheBackend,

    /// Defaults to a directory under the platform cache directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<Utf8PathBuf>,

    /// How long collected results stay fresh
    #[serde(default = "default_cache_ttl", with = "humantime_serde")]
    pub ttl: Duration,

    /// Used instead of `ttl` for periods that ended before today
    #[serde(default = "default_historical_ttl", with = "humantime_serde::option")]
    pub historical_ttl: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CheckpointConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Defaults to `checkpoints` inside the cache directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<Utf8PathBuf>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_true() -> bool {
    true
}

const fn default_cache_ttl() -> Duration {
    Duration::from_hours(1)
}

#[expect(clippy::unnecessary_wraps, reason = "serde default functions must match the field type")]
const fn default_historical_ttl() -> Option<Duration> {
    Some(Duration::from_hours(24))
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            organization: None,
            token: None,
            request_timeout: default_request_timeout(),
            fetch_commit_stats: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::default(),
            dir: None,
            ttl: default_cache_ttl(),
            historical_ttl: default_historical_ttl(),
        }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self { enabled: true, dir: None }
    }
}

impl GitHubConfig {
    /// Connection settings for the REST client, with an explicit token taking precedence.
    #[must_use]
    pub fn options(&self, token: Option<&str>) -> GitHubOptions {
        GitHubOptions {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            token: token.map(str::to_string).or_else(|| self.token.clone()),
            request_timeout: self.request_timeout,
            fetch_commit_stats: self.fetch_commit_stats,
        }
    }
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `contrib-ingest.toml` in `base_dir` is used when it exists.
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = base_dir.join(DEFAULT_CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.github.base_url)
            .map_err(|e| app_err!("github.base_url '{}' is not a valid URL: {e}", self.github.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(app_err!(
                "github.base_url must start with http:// or https://, got '{}'",
                self.github.base_url
            ));
        }

        if self.github.request_timeout.is_zero() {
            return Err(app_err!("github.request_timeout must be greater than zero"));
        }

        if self.cache.ttl.is_zero() {
            return Err(app_err!("cache.ttl must be greater than zero"));
        }

        if self.cache.historical_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(app_err!("cache.historical_ttl must be greater than zero"));
        }

        self.retry.validate()
    }

    /// The cache directory: configured, or `contrib-ingest` under the platform cache directory.
    pub fn cache_dir(&self) -> Result<Utf8PathBuf> {
        if let Some(dir) = &self.cache.dir {
            return Ok(dir.clone());
        }

        let base = BaseDirs::new().into_app_err("could not determine cache directory")?;
        Utf8PathBuf::from_path_buf(base.cache_dir().join(APP_DIR_NAME))
            .map_err(|path| app_err!("cache directory '{}' is not valid UTF-8", path.display()))
    }

    /// The checkpoint directory: configured, or `checkpoints` inside the cache directory.
    pub fn checkpoint_dir(&self) -> Result<Utf8PathBuf> {
        match &self.checkpoints.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.cache_dir()?.join(CHECKPOINT_DIR_NAME)),
        }
    }
}
