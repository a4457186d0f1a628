//! Orchestrator configuration.
//!
//! Everything the orchestrator needs is carried in an explicit
//! [`OrchestratorConfig`] value handed over at construction. Nothing is read
//! from process-wide state, so independent instances can run side by side.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::github::DEFAULT_API_URL;
use crate::retry::RetryDelay;

/// Default bound on transmits that may fail transiently.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Below this many remaining requests the orchestrator waits for the reset.
pub const DEFAULT_THROTTLE_THRESHOLD: u64 = 10;

/// Padding added to every reset time before resuming.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(10);

/// Default bound on consecutive rate limit rejections waited out.
pub const DEFAULT_MAX_RATE_LIMIT_WAITS: u32 = 3;

/// Wait used when a rate limit rejection carries no reset time.
pub const DEFAULT_FALLBACK_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Per-transmit timeout for the reqwest transport.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_USER_AGENT: &str = concat!("issue-scout/", env!("CARGO_PKG_VERSION"));

/// Errors raised while building an orchestrator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no GitHub token configured")]
    MissingToken,

    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("failed to build HTTP transport: {0}")]
    Transport(String),
}

/// Bearer token for the API.
///
/// Cheap to clone. `Debug` and `Display` never reveal the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Arc<str>);

impl Credential {
    /// Wrap a token, rejecting empty or whitespace-only values.
    pub fn new(token: impl AsRef<str>) -> Result<Self, ConfigError> {
        let token = token.as_ref().trim();
        if token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(Self(Arc::from(token)))
    }

    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Settings for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// API base URL; endpoints are appended to it.
    pub base_url: String,
    credential: Credential,
    /// Maximum transmits that may fail transiently before giving up.
    pub max_attempts: u32,
    /// Pause between transient failures.
    pub retry_delay: RetryDelay,
    /// Throttle when fewer than this many requests remain.
    pub throttle_threshold: u64,
    /// Padding added to every reset time.
    pub safety_margin: Duration,
    /// Maximum rate limit rejections waited out in one invocation.
    pub max_rate_limit_waits: u32,
    /// Wait used when a rejection carries no reset time.
    pub fallback_rate_limit_wait: Duration,
    /// Per-transmit timeout for the default transport.
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl OrchestratorConfig {
    /// Configuration with defaults for everything but the token.
    pub fn new(token: impl AsRef<str>) -> Result<Self, ConfigError> {
        Ok(Self::with_credential(Credential::new(token)?))
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            credential,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: RetryDelay::default(),
            throttle_threshold: DEFAULT_THROTTLE_THRESHOLD,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            max_rate_limit_waits: DEFAULT_MAX_RATE_LIMIT_WAITS,
            fallback_rate_limit_wait: DEFAULT_FALLBACK_RATE_LIMIT_WAIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: RetryDelay) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    #[must_use]
    pub fn with_throttle_threshold(mut self, threshold: u64) -> Self {
        self.throttle_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    #[must_use]
    pub fn with_max_rate_limit_waits(mut self, waits: u32) -> Self {
        self.max_rate_limit_waits = waits;
        self
    }

    #[must_use]
    pub fn with_fallback_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.fallback_rate_limit_wait = wait;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Check invariants and normalise the base URL.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let base = self.base_url.trim().trim_end_matches('/');
        if !(base.starts_with("https://") || base.starts_with("http://"))
            || base.len() <= "https://".len()
        {
            return Err(ConfigError::InvalidBaseUrl(self.base_url));
        }
        self.base_url = base.to_string();

        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(self)
    }

    /// Absolute URL for an endpoint path.
    pub fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }
}
