//! Argument handling and pipeline assembly shared by every command.

use crate::Result;
use crate::cache::Cache;
use crate::collector::Collector;
use crate::config::Config;
use crate::logging::RedactingLogger;
use crate::retry::{CheckpointStore, RetryEngine};
use crate::source::github::GitHubSource;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, ValueEnum};

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Arguments accepted by every command
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    pub github_token: Option<String>,

    /// Path to configuration file (default is `contrib-ingest.toml`)
    #[arg(long, short = 'c', value_name = "PATH", global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,
}

/// Loaded configuration plus the credentials needed to build the pipeline.
#[derive(Debug)]
pub struct Common {
    pub config: Config,
    token: Option<String>,
}

impl Common {
    /// Initialize logging and load the configuration.
    pub fn new(args: &CommonArgs) -> Result<Self> {
        Self::init_logging(args.log_level);

        let config = Config::load(Utf8Path::new("."), args.config.as_ref())?;

        Ok(Self {
            config,
            token: args.github_token.clone(),
        })
    }

    /// Initialize logger based on log level
    fn init_logging(log_level: LogLevel) {
        let level = match log_level {
            LogLevel::None => return,
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };

        let env = env_logger::Env::default().filter_or("RUST_LOG", level);

        let logger = env_logger::Builder::from_env(env)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
            .build();

        let max_level = logger.filter();
        if log::set_boxed_logger(Box::new(RedactingLogger::new(logger))).is_ok() {
            log::set_max_level(max_level);
        }
    }

    /// Whether any token is available, from the command line, the environment, or the file.
    #[must_use]
    pub const fn has_token(&self) -> bool {
        self.token.is_some() || self.config.github.token.is_some()
    }

    pub fn open_cache(&self) -> Result<Cache> {
        let dir = self.config.cache_dir()?;
        Cache::open(self.config.cache.backend, dir, self.config.cache.ttl)
    }

    pub fn checkpoint_store(&self) -> Result<CheckpointStore> {
        Ok(CheckpointStore::new(self.config.checkpoint_dir()?))
    }

    pub fn retry_engine(&self) -> Result<RetryEngine> {
        let engine = RetryEngine::new(self.config.retry);
        if !self.config.checkpoints.enabled {
            return Ok(engine);
        }

        Ok(engine.with_checkpoints(self.checkpoint_store()?))
    }

    /// Assemble a collector against the configured GitHub endpoint.
    pub fn collector(&self) -> Result<Collector<GitHubSource>> {
        let source = GitHubSource::new(&self.config.github.options(self.token.as_deref()))?;
        let mut collector = Collector::new(source, self.retry_engine()?);

        if self.config.cache.enabled {
            collector = collector.with_cache(self.open_cache()?);
            if let Some(ttl) = self.config.cache.historical_ttl {
                collector = collector.with_historical_ttl(ttl);
            }
        }

        Ok(collector)
    }
}
