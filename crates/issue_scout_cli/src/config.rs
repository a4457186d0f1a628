//! Configuration file support for issue-scout.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `ISSUE_SCOUT_`, e.g., `ISSUE_SCOUT_GITHUB_TOKEN`)
//! 3. Config file (./issue-scout.toml, then ~/.config/issue-scout/config.toml)
//! 4. Built-in defaults
//!
//! `GITHUB_TOKEN` is honoured as a last resort for the token.
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "ghp_..."  # or use ISSUE_SCOUT_GITHUB_TOKEN env var
//! api_url = "https://api.github.com"  # GitHub Enterprise: https://ghe.example.com/api/v3
//!
//! [request]
//! max_attempts = 3
//! retry_delay_secs = 5
//! exponential_backoff = false
//! throttle_threshold = 10
//! safety_margin_secs = 10
//! max_rate_limit_waits = 3
//! fallback_wait_secs = 60  # rate limit rejections that carry no reset time
//! timeout_secs = 30
//! deadline_secs = 600  # optional bound on a whole invocation
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use issue_scout::config::{
    DEFAULT_FALLBACK_RATE_LIMIT_WAIT, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_RATE_LIMIT_WAITS,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_SAFETY_MARGIN, DEFAULT_THROTTLE_THRESHOLD,
};
use issue_scout::github::DEFAULT_API_URL;
use issue_scout::retry::{DEFAULT_MAX_RETRY_DELAY, DEFAULT_RETRY_DELAY};
use issue_scout::{ConfigError, OrchestratorConfig, RetryDelay};
use serde::Deserialize;

const APP_NAME: &str = "issue-scout";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GitHub configuration.
    pub github: GitHubConfig,
    /// Request orchestration settings.
    pub request: RequestConfig,
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token.
    /// Can also be set via ISSUE_SCOUT_GITHUB_TOKEN environment variable.
    pub token: Option<String>,
    /// REST API base URL.
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

/// Request orchestration settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    /// Use exponential backoff instead of a fixed delay.
    pub exponential_backoff: bool,
    pub throttle_threshold: u64,
    pub safety_margin_secs: u64,
    pub max_rate_limit_waits: u32,
    /// Wait after a rate limit rejection that names no reset time.
    pub fallback_wait_secs: u64,
    /// Per-transmit timeout.
    pub timeout_secs: u64,
    /// Bound on a whole invocation, retries and waits included.
    pub deadline_secs: Option<u64>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
            exponential_backoff: false,
            throttle_threshold: DEFAULT_THROTTLE_THRESHOLD,
            safety_margin_secs: DEFAULT_SAFETY_MARGIN.as_secs(),
            max_rate_limit_waits: DEFAULT_MAX_RATE_LIMIT_WAITS,
            fallback_wait_secs: DEFAULT_FALLBACK_RATE_LIMIT_WAIT.as_secs(),
            timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            deadline_secs: None,
        }
    }
}

impl RequestConfig {
    fn retry_delay(&self) -> RetryDelay {
        let base = Duration::from_secs(self.retry_delay_secs);
        if self.exponential_backoff {
            RetryDelay::exponential(base, DEFAULT_MAX_RETRY_DELAY.max(base))
        } else {
            RetryDelay::Fixed(base)
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/issue-scout/config.toml)
    /// 3. Local config file (./issue-scout.toml)
    /// 4. Environment variables with ISSUE_SCOUT_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(config_path) = Self::default_config_path()
            && config_path.exists()
        {
            tracing::debug!("Loading config from {:?}", config_path);
            builder = builder.add_source(
                File::from(config_path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from(format!("{APP_NAME}.toml"));
        if local_config.exists() {
            tracing::debug!("Loading config from ./{APP_NAME}.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., ISSUE_SCOUT_GITHUB_TOKEN -> github.token
        builder = builder.add_source(
            Environment::with_prefix("ISSUE_SCOUT")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the GitHub token, falling back to the conventional `GITHUB_TOKEN`.
    pub fn github_token(&self) -> Option<String> {
        resolve_token(
            self.github.token.as_deref(),
            std::env::var("GITHUB_TOKEN").ok().as_deref(),
        )
    }

    /// Whole-invocation deadline, if configured.
    pub fn deadline(&self) -> Option<Duration> {
        self.request
            .deadline_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Build a validated orchestrator configuration.
    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig, ConfigError> {
        let token = self.github_token().ok_or(ConfigError::MissingToken)?;
        let request = &self.request;

        OrchestratorConfig::new(token)?
            .with_base_url(self.github.api_url.clone())
            .with_max_attempts(request.max_attempts)
            .with_retry_delay(request.retry_delay())
            .with_throttle_threshold(request.throttle_threshold)
            .with_safety_margin(Duration::from_secs(request.safety_margin_secs))
            .with_max_rate_limit_waits(request.max_rate_limit_waits)
            .with_fallback_rate_limit_wait(Duration::from_secs(request.fallback_wait_secs))
            .with_request_timeout(Duration::from_secs(request.timeout_secs))
            .validate()
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// First non-blank token among the configured one and the legacy variable.
fn resolve_token(configured: Option<&str>, legacy: Option<&str>) -> Option<String> {
    [configured, legacy]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|token| !token.is_empty())
        .map(str::to_string)
}
