//! GitHub REST API specifics.
//!
//! # Module Structure
//!
//! - [`error`] - Error envelope decoding and response classification
//! - [`rate_limit`] - Rate limit status types, header parsing and wait math

pub mod error;
pub mod rate_limit;

pub use error::{Classification, ErrorEnvelope, ResetHint, classify};
pub use rate_limit::{
    GitHubRateLimits, RATE_LIMIT_PATH, RateLimitError, RateLimitResource, RateLimitResponse,
    RateLimitStatus, parse_rate_limit_headers, parse_rate_limit_response,
};

/// Default REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Media type GitHub recommends for REST requests.
pub const ACCEPT_HEADER: &str = "application/vnd.github+json";

/// REST API version pinned on every request.
pub const API_VERSION: &str = "2022-11-28";
