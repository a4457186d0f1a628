//! GitHub rate limit status types and parsing.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::{HttpError, HttpHeaders, header_get};

/// Path of the rate limit status endpoint, relative to the API base.
pub const RATE_LIMIT_PATH: &str = "/rate_limit";

/// Errors from querying the rate limit status endpoint.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error(transparent)]
    Transport(#[from] HttpError),

    #[error("rate limit status rejected the credential")]
    Unauthorized { body: String },

    #[error("rate limit status returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("malformed rate limit status: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A single rate limit resource entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitResource {
    /// Maximum requests allowed per period.
    pub limit: u64,
    /// Requests used in current period.
    #[serde(default)]
    pub used: u64,
    /// Remaining requests in current period.
    pub remaining: u64,
    /// Unix timestamp when the rate limit resets.
    pub reset: i64,
}

impl RateLimitResource {
    /// Get the reset time as a DateTime.
    pub fn reset_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.reset, 0).unwrap_or_else(Utc::now)
    }
}

/// Rate limit resources reported by `GET /rate_limit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRateLimits {
    /// Core API rate limit (non-search REST endpoints).
    pub core: RateLimitResource,
    /// Search API rate limit.
    #[serde(default)]
    pub search: Option<RateLimitResource>,
    /// GraphQL API rate limit.
    #[serde(default)]
    pub graphql: Option<RateLimitResource>,
    /// Code search API rate limit.
    #[serde(default)]
    pub code_search: Option<RateLimitResource>,
    /// Integration manifest API rate limit.
    #[serde(default)]
    pub integration_manifest: Option<RateLimitResource>,
    /// Dependency snapshots rate limit.
    #[serde(default)]
    pub dependency_snapshots: Option<RateLimitResource>,
}

impl GitHubRateLimits {
    /// All present resources as `(name, resource)` pairs.
    pub fn entries(&self) -> Vec<(&'static str, RateLimitResource)> {
        let mut items = vec![("core", self.core)];
        let optional = [
            ("search", self.search),
            ("graphql", self.graphql),
            ("code_search", self.code_search),
            ("integration_manifest", self.integration_manifest),
            ("dependency_snapshots", self.dependency_snapshots),
        ];
        items.extend(
            optional
                .into_iter()
                .filter_map(|(name, r)| r.map(|r| (name, r))),
        );
        items
    }
}

/// Full rate limit response from GitHub's API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitResponse {
    /// All rate limit resources.
    pub resources: GitHubRateLimits,
    /// Deprecated mirror of `resources.core`, still sent by GitHub.
    #[serde(default)]
    pub rate: Option<RateLimitResource>,
}

impl RateLimitResponse {
    /// The status of the bucket REST calls draw from.
    pub fn core_status(&self) -> RateLimitStatus {
        RateLimitStatus::from(self.resources.core)
    }
}

/// Snapshot of the core REST budget at the moment it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u64,
    pub remaining: u64,
    pub used: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitStatus {
    /// Whether fewer than `threshold` requests remain.
    #[inline]
    pub fn is_below(&self, threshold: u64) -> bool {
        self.remaining < threshold
    }

    /// The instant requests may resume, padded by `margin`.
    pub fn resume_at(&self, margin: Duration) -> DateTime<Utc> {
        pad(self.reset_at, margin)
    }
}

impl From<RateLimitResource> for RateLimitStatus {
    fn from(resource: RateLimitResource) -> Self {
        Self {
            limit: resource.limit,
            remaining: resource.remaining,
            used: resource.used,
            reset_at: resource.reset_at(),
        }
    }
}

/// Decode the body of `GET /rate_limit`.
pub fn parse_rate_limit_response(body: &[u8]) -> Result<RateLimitResponse, RateLimitError> {
    Ok(serde_json::from_slice(body)?)
}

/// Extract rate limit info from GitHub response headers.
pub fn parse_rate_limit_headers(headers: &HttpHeaders) -> Option<RateLimitStatus> {
    let limit = header_get(headers, "x-ratelimit-limit")?.parse::<u64>().ok()?;
    let remaining = header_get(headers, "x-ratelimit-remaining")?
        .parse::<u64>()
        .ok()?;
    let reset_at = parse_reset_header(headers)?;
    let used = header_get(headers, "x-ratelimit-used")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or_else(|| limit.saturating_sub(remaining));

    Some(RateLimitStatus {
        limit,
        remaining,
        used,
        reset_at,
    })
}

/// Read `x-ratelimit-reset` (Unix epoch seconds).
pub fn parse_reset_header(headers: &HttpHeaders) -> Option<DateTime<Utc>> {
    header_get(headers, "x-ratelimit-reset")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
}

/// Add a std duration to a timestamp, saturating on overflow.
pub fn pad(at: DateTime<Utc>, margin: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(margin)
        .ok()
        .and_then(|m| at.checked_add_signed(m))
        .unwrap_or(at)
}

/// How long to sleep from `now` until `until`; zero if already past.
pub fn wait_duration(until: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    until
        .signed_duration_since(now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
